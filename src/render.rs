use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::types::CombinedRecord;
use geo::{LineString, MultiPolygon};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use rayon::prelude::*;
use std::f64::consts::PI;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub low: Rgba<u8>,
    pub high: Rgba<u8>,
    pub edge: Rgba<u8>,
}

impl MapStyle {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            padding: config.padding,
            low: hex_to_rgba(&config.low_color),
            high: hex_to_rgba(&config.high_color),
            edge: hex_to_rgba(&config.edge_color),
        }
    }
}

impl Default for MapStyle {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

/// Region rings in pixel space, with the fill colour for its value.
struct ProjectedRegion {
    rings: Vec<Vec<(f64, f64)>>,
    fill: Rgba<u8>,
}

/// Renders one polygon per row, coloured by value, as a PNG.
///
/// Rows without geometry are ignored. An empty view gives a blank canvas.
pub fn render_choropleth(rows: &[&CombinedRecord], style: &MapStyle) -> Result<Vec<u8>> {
    let img = rasterize(rows, style);

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(buf)
}

pub fn rasterize(rows: &[&CombinedRecord], style: &MapStyle) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(style.width, style.height, BACKGROUND);

    let shapes: Vec<(&MultiPolygon<f64>, f64)> = rows
        .iter()
        .filter_map(|r| r.geometry.as_deref().map(|g| (g, r.value)))
        .collect();
    if shapes.is_empty() {
        return img;
    }

    let (min_v, max_v) = shapes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));

    let Some(projection) = Projection::fit(shapes.iter().map(|(g, _)| *g), style) else {
        return img;
    };

    let regions: Vec<ProjectedRegion> = shapes
        .iter()
        .map(|(geometry, value)| {
            let t = if max_v > min_v { (value - min_v) / (max_v - min_v) } else { 1.0 };
            ProjectedRegion {
                rings: rings_of(geometry)
                    .map(|ring| ring.coords().map(|c| projection.apply(c.x, c.y)).collect())
                    .collect(),
                fill: lerp(style.low, style.high, t),
            }
        })
        .collect();

    // Scanline fill, one image row per task
    let row_len = (style.width * 4) as usize;
    let pixels: &mut [u8] = &mut img;
    pixels.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        let scan_y = y as f64 + 0.5;
        for region in &regions {
            for (x0, x1) in spans(&region.rings, scan_y) {
                let start = (x0 - 0.5).ceil().max(0.0) as usize;
                let end = ((x1 - 0.5).floor() as i64).min(style.width as i64 - 1);
                if end < start as i64 {
                    continue;
                }
                for px in start..=end as usize {
                    row[px * 4..px * 4 + 4].copy_from_slice(&region.fill.0);
                }
            }
        }
    });

    for region in &regions {
        for ring in &region.rings {
            for pair in ring.windows(2) {
                draw_line(&mut img, pair[0], pair[1], style.edge);
            }
        }
    }

    img
}

fn rings_of(geometry: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
}

/// Even-odd spans of all rings along a horizontal line.
fn spans(rings: &[Vec<(f64, f64)>], y: f64) -> Vec<(f64, f64)> {
    let mut xs = Vec::new();
    for ring in rings {
        for edge in ring.windows(2) {
            let ((ax, ay), (bx, by)) = (edge[0], edge[1]);
            if (ay <= y && by > y) || (by <= y && ay > y) {
                xs.push(ax + (y - ay) / (by - ay) * (bx - ax));
            }
        }
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.chunks_exact(2).map(|p| (p[0], p[1])).collect()
}

fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let (mut x0, mut y0) = (from.0.floor() as i64, from.1.floor() as i64);
    let (x1, y1) = (to.0.floor() as i64, to.1.floor() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < img.width() && (y0 as u32) < img.height() {
            img.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Web Mercator, scaled and centred to fit the canvas minus padding.
struct Projection {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    fn fit<'a>(geometries: impl Iterator<Item = &'a MultiPolygon<f64>>, style: &MapStyle) -> Option<Self> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for geometry in geometries {
            for ring in rings_of(geometry) {
                for c in ring.coords() {
                    let (x, y) = mercator(c.x, c.y);
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }
        if !min_x.is_finite() || !min_y.is_finite() {
            return None;
        }

        let avail_w = (style.width.saturating_sub(2 * style.padding)).max(1) as f64;
        let avail_h = (style.height.saturating_sub(2 * style.padding)).max(1) as f64;
        let span_x = (max_x - min_x).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);
        let scale = (avail_w / span_x).min(avail_h / span_y);

        Some(Self {
            scale,
            offset_x: (style.width as f64 - span_x * scale) / 2.0 - min_x * scale,
            offset_y: (style.height as f64 - span_y * scale) / 2.0 - min_y * scale,
        })
    }

    fn apply(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = mercator(lon, lat);
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }
}

/// Unit-square Web Mercator; y grows southwards like pixel rows.
fn mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0;
    (x, y)
}

pub(crate) fn lerp(low: Rgba<u8>, high: Rgba<u8>, t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgba([mix(low[0], high[0]), mix(low[1], high[1]), mix(low[2], high[2]), 255])
}

pub fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    Rgba([channel(0), channel(2), channel(4), 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use std::sync::Arc;

    fn record(region: &str, value: f64, x: f64) -> CombinedRecord {
        CombinedRecord {
            indicator: "Households with electricity".to_string(),
            indicator_id: None,
            region: region.to_string(),
            survey_year: 2019,
            value,
            geometry: Some(Arc::new(MultiPolygon::new(vec![polygon![
                (x: x, y: 8.0),
                (x: x + 2.0, y: 8.0),
                (x: x + 2.0, y: 10.0),
                (x: x, y: 10.0),
                (x: x, y: 8.0),
            ]]))),
        }
    }

    fn style() -> MapStyle {
        MapStyle {
            width: 200,
            height: 100,
            padding: 0,
            ..MapStyle::default()
        }
    }

    #[test]
    fn test_hex_to_rgba() {
        assert_eq!(hex_to_rgba("#3f007d"), Rgba([0x3f, 0x00, 0x7d, 255]));
        assert_eq!(hex_to_rgba("fcfbfd"), Rgba([0xfc, 0xfb, 0xfd, 255]));
        assert_eq!(hex_to_rgba("#12"), Rgba([0x12, 0, 0, 255]));
    }

    #[test]
    fn test_lerp_endpoints() {
        let low = Rgba([0, 0, 0, 255]);
        let high = Rgba([200, 100, 50, 255]);
        assert_eq!(lerp(low, high, 0.0), low);
        assert_eq!(lerp(low, high, 1.0), high);
        assert_eq!(lerp(low, high, 0.5), Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn test_empty_view_is_blank() {
        let img = rasterize(&[], &style());
        assert!(img.pixels().all(|p| *p == BACKGROUND));
        let png = render_choropleth(&[], &style()).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_regions_coloured_by_value() {
        let low = record("Afar", 10.0, 38.0);
        let high = record("Tigray", 90.0, 40.0);
        let style = style();
        let img = rasterize(&[&low, &high], &style);

        // Two adjacent squares fill the 200x100 canvas side by side
        assert_eq!(*img.get_pixel(50, 50), style.low);
        assert_eq!(*img.get_pixel(150, 50), style.high);
    }

    #[test]
    fn test_rows_without_geometry_ignored() {
        let mut unmapped = record("SNNPR", 50.0, 0.0);
        unmapped.geometry = None;
        let img = rasterize(&[&unmapped], &style());
        assert!(img.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_spans_even_odd() {
        let outer = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        let hole = vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)];
        let s = spans(&[outer.clone(), hole], 5.0);
        assert_eq!(s, vec![(0.0, 4.0), (6.0, 10.0)]);
        assert!(spans(&[outer], 20.0).is_empty());
    }
}

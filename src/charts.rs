//! SVG bar and trend charts.

use crate::render::{lerp, MapStyle};
use crate::types::CombinedRecord;
use crate::views::TrendSeries;
use image::Rgba;
use std::fmt::Write;

const FONT: &str = "font-family=\"sans-serif\"";
const TREND_PALETTE: [&str; 5] = ["#eac435", "#49416d", "#e08d79", "#23967f", "#4971C0"];

const BAR_WIDTH: f64 = 560.0;
const BAR_ROW: f64 = 28.0;
const BAR_LABEL_W: f64 = 150.0;
const BAR_VALUE_W: f64 = 60.0;

const TREND_WIDTH: f64 = 760.0;
const TREND_HEIGHT: f64 = 420.0;
const TREND_MARGIN_L: f64 = 60.0;
const TREND_MARGIN_R: f64 = 130.0;
const TREND_MARGIN_T: f64 = 40.0;
const TREND_MARGIN_B: f64 = 40.0;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn rgba_hex(c: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

/// Gridline spacing of 1, 2 or 5 times a power of ten, about `target` steps up to `max`.
fn tick_step(max: f64, target: f64) -> f64 {
    let raw = max / target;
    let base = 10f64.powi(raw.log10().floor() as i32);
    let f = raw / base;
    let nice = if f <= 1.0 {
        1.0
    } else if f <= 2.0 {
        2.0
    } else if f <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * base
}

fn empty_chart(width: f64, height: f64) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\
         <text x=\"{x}\" y=\"{y}\" text-anchor=\"middle\" {FONT} font-size=\"14\" fill=\"#666\">No data</text></svg>",
        w = width,
        h = height,
        x = width / 2.0,
        y = height / 2.0,
    )
}

/// Horizontal bars in the given order (callers pass highest first), coloured on the map ramp.
pub fn bar_chart_svg(rows: &[&CombinedRecord], style: &MapStyle) -> String {
    if rows.is_empty() {
        return empty_chart(BAR_WIDTH, 120.0);
    }

    let height = rows.len() as f64 * BAR_ROW + 20.0;
    let plot_w = BAR_WIDTH - BAR_LABEL_W - BAR_VALUE_W;
    let (min_v, max_v) = rows
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r.value), hi.max(r.value)));
    let scale_max = max_v.max(f64::EPSILON);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = BAR_WIDTH,
        h = height
    );

    for (i, row) in rows.iter().enumerate() {
        let y = 10.0 + i as f64 * BAR_ROW;
        let len = (row.value.max(0.0) / scale_max) * plot_w;
        let t = if max_v > min_v { (row.value - min_v) / (max_v - min_v) } else { 1.0 };
        let fill = rgba_hex(lerp(style.low, style.high, t));
        let label = escape(&row.region);

        let _ = write!(
            svg,
            "<text x=\"{lx:.1}\" y=\"{ty:.1}\" text-anchor=\"end\" {FONT} font-size=\"12\">{label}</text>\
             <rect x=\"{bx:.1}\" y=\"{y:.1}\" width=\"{len:.1}\" height=\"{bh:.1}\" fill=\"{fill}\" stroke=\"grey\" stroke-width=\"1\"/>\
             <text x=\"{vx:.1}\" y=\"{ty:.1}\" {FONT} font-size=\"12\">{value:.1}</text>",
            lx = BAR_LABEL_W - 6.0,
            ty = y + BAR_ROW * 0.6,
            bx = BAR_LABEL_W,
            bh = BAR_ROW - 6.0,
            vx = BAR_LABEL_W + len + 4.0,
            value = row.value,
        );
    }

    svg.push_str("</svg>");
    svg
}

/// One line per region across survey years, labelled at its last point.
pub fn trend_chart_svg(series: &[TrendSeries]) -> String {
    let points = series.iter().flat_map(|s| s.points.iter());
    let (min_year, max_year, max_value) = points.fold(
        (i32::MAX, i32::MIN, 0.0f64),
        |(lo, hi, v), (year, value)| (lo.min(*year), hi.max(*year), v.max(*value)),
    );
    if min_year > max_year {
        return empty_chart(TREND_WIDTH, TREND_HEIGHT);
    }

    let plot_w = TREND_WIDTH - TREND_MARGIN_L - TREND_MARGIN_R;
    let plot_h = TREND_HEIGHT - TREND_MARGIN_T - TREND_MARGIN_B;
    let top = if max_value.is_finite() { max_value.max(10.0) } else { 10.0 };
    let step = tick_step(top, 5.0);
    let ticks = (top / step).ceil() as usize;
    let y_max = ticks as f64 * step;

    let x_of = |year: i32| {
        if max_year == min_year {
            TREND_MARGIN_L + plot_w / 2.0
        } else {
            TREND_MARGIN_L + (year - min_year) as f64 / (max_year - min_year) as f64 * plot_w
        }
    };
    let y_of = |value: f64| TREND_MARGIN_T + plot_h - (value / y_max) * plot_h;

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\
         <text x=\"{cx}\" y=\"22\" text-anchor=\"middle\" {FONT} font-size=\"15\">Trends Over Time by Region</text>",
        w = TREND_WIDTH,
        h = TREND_HEIGHT,
        cx = TREND_WIDTH / 2.0,
    );

    for i in 0..=ticks {
        let tick = i as f64 * step;
        let y = y_of(tick);
        let _ = write!(
            svg,
            "<line x1=\"{x0}\" y1=\"{y:.1}\" x2=\"{x1}\" y2=\"{y:.1}\" stroke=\"#e5e5e5\"/>\
             <text x=\"{tx}\" y=\"{ty:.1}\" text-anchor=\"end\" {FONT} font-size=\"11\">{tick}</text>",
            x0 = TREND_MARGIN_L,
            x1 = TREND_MARGIN_L + plot_w,
            tx = TREND_MARGIN_L - 6.0,
            ty = y + 4.0,
        );
    }

    let mut years: Vec<i32> = series.iter().flat_map(|s| s.points.iter().map(|p| p.0)).collect();
    years.sort_unstable();
    years.dedup();
    for year in years {
        let _ = write!(
            svg,
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"middle\" {FONT} font-size=\"11\">{year}</text>",
            x = x_of(year),
            y = TREND_HEIGHT - TREND_MARGIN_B + 16.0,
        );
    }

    let _ = write!(
        svg,
        "<text x=\"14\" y=\"{y}\" transform=\"rotate(-90 14 {y})\" text-anchor=\"middle\" {FONT} font-size=\"12\">Value (%)</text>",
        y = TREND_MARGIN_T + plot_h / 2.0,
    );

    for (i, s) in series.iter().enumerate() {
        let color = TREND_PALETTE[i % TREND_PALETTE.len()];
        let coords: Vec<String> = s
            .points
            .iter()
            .map(|(year, value)| format!("{:.1},{:.1}", x_of(*year), y_of(*value)))
            .collect();

        let _ = write!(
            svg,
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>",
            coords.join(" "),
            color
        );
        for (year, value) in &s.points {
            let _ = write!(
                svg,
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{}\"><title>{} {}: {:.1}</title></circle>",
                x_of(*year),
                y_of(*value),
                color,
                escape(&s.region),
                year,
                value
            );
        }
        if let Some((year, value)) = s.points.last() {
            let _ = write!(
                svg,
                "<text x=\"{:.1}\" y=\"{:.1}\" {FONT} font-size=\"9\">{}</text>",
                x_of(*year) + 6.0,
                y_of(*value) + 3.0,
                escape(&s.region)
            );
        }
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(region: &str, value: f64) -> CombinedRecord {
        CombinedRecord {
            indicator: "Households with electricity".to_string(),
            indicator_id: None,
            region: region.to_string(),
            survey_year: 2019,
            value,
            geometry: None,
        }
    }

    #[test]
    fn test_empty_charts_say_no_data() {
        assert!(bar_chart_svg(&[], &MapStyle::default()).contains("No data"));
        assert!(trend_chart_svg(&[]).contains("No data"));
        let no_points = TrendSeries { region: "Afar".to_string(), points: Vec::new() };
        assert!(trend_chart_svg(&[no_points]).contains("No data"));
    }

    #[test]
    fn test_bar_chart_has_one_bar_per_row() {
        let a = record("Addis Ababa", 99.2);
        let b = record("Afar", 22.5);
        let svg = bar_chart_svg(&[&a, &b], &MapStyle::default());
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains(">99.2<"));
        assert!(svg.contains(">22.5<"));
        // Highest value first, darkest colour
        assert!(svg.find("Addis Ababa").unwrap() < svg.find("Afar").unwrap());
        assert!(svg.contains("fill=\"#3f007d\""));
    }

    #[test]
    fn test_labels_escaped() {
        let r = record("A<b>&c", 1.0);
        let svg = bar_chart_svg(&[&r], &MapStyle::default());
        assert!(svg.contains("A&lt;b&gt;&amp;c"));
    }

    #[test]
    fn test_trend_chart_lines_and_labels() {
        let series = vec![
            TrendSeries { region: "Afar".to_string(), points: vec![(2011, 9.0), (2019, 22.5)] },
            TrendSeries { region: "Tigray".to_string(), points: vec![(2016, 41.2)] },
        ];
        let svg = trend_chart_svg(&series);
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains(">2011<") && svg.contains(">2016<") && svg.contains(">2019<"));
        assert!(svg.contains("stroke=\"#eac435\""));
        assert!(svg.contains("stroke=\"#49416d\""));
    }

    #[test]
    fn test_tick_step() {
        assert_eq!(tick_step(10.0, 5.0), 2.0);
        assert_eq!(tick_step(100.0, 5.0), 20.0);
        assert_eq!(tick_step(47.0, 5.0), 10.0);
        assert_eq!(tick_step(1.0e7, 5.0), 2.0e6);
    }

    #[test]
    fn test_trend_grid_bounded_for_large_values() {
        let series = vec![TrendSeries { region: "Afar".to_string(), points: vec![(2016, 1.0e7)] }];
        let svg = trend_chart_svg(&series);
        let gridlines = svg.matches("<line").count();
        assert!((2..=11).contains(&gridlines), "{} gridlines", gridlines);
        assert!(svg.len() < 10_000);
        assert!(svg.contains(">10000000<"));
    }

    #[test]
    fn test_trend_grid_percent_scale() {
        let series = vec![TrendSeries { region: "Afar".to_string(), points: vec![(2016, 99.2)] }];
        let svg = trend_chart_svg(&series);
        assert_eq!(svg.matches("<line").count(), 6);
        assert!(svg.contains(">0<") && svg.contains(">100<"));
    }
}

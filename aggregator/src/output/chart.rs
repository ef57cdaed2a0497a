//! SVG chart generation
//!
//! Renders stacked time-series panels with plotters: lines, dots and bars over
//! dates, with optional horizontal reference lines. Panels without data say so
//! instead of drawing an empty axis.

use crate::series::DailySeries;
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

pub use plotters::style::RGBColor;
use std::path::Path;
use tracing::info;

const WIDTH: u32 = 1200;
const PANEL_HEIGHT: u32 = 300;
const TITLE_HEIGHT: u32 = 50;
const FONT: &str = "sans-serif";

pub const BLUE: RGBColor = RGBColor(31, 119, 180);
pub const ORANGE: RGBColor = RGBColor(255, 127, 14);
pub const GREEN: RGBColor = RGBColor(44, 160, 44);
pub const RED: RGBColor = RGBColor(214, 39, 40);
pub const PURPLE: RGBColor = RGBColor(148, 103, 189);
pub const GREY: RGBColor = RGBColor(127, 127, 127);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Line,
    Dots,
    Bars,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub label: String,
    pub points: Vec<(NaiveDate, f64)>,
    pub mark: Mark,
    pub color: RGBColor,
}

#[derive(Debug, Clone)]
pub struct ReferenceLine {
    pub value: f64,
    pub label: String,
    pub color: RGBColor,
}

/// One chart panel sharing a date axis
#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub unit: String,
    pub layers: Vec<Layer>,
    pub references: Vec<ReferenceLine>,
}

impl Panel {
    pub fn new(title: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            unit: unit.into(),
            layers: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn layer(mut self, label: &str, series: &DailySeries, mark: Mark, color: RGBColor) -> Self {
        self.layers.push(Layer {
            label: label.to_string(),
            points: series.points().to_vec(),
            mark,
            color,
        });
        self
    }

    pub fn line(self, label: &str, series: &DailySeries, color: RGBColor) -> Self {
        self.layer(label, series, Mark::Line, color)
    }

    pub fn dots(self, label: &str, series: &DailySeries, color: RGBColor) -> Self {
        self.layer(label, series, Mark::Dots, color)
    }

    pub fn bars(self, label: &str, series: &DailySeries, color: RGBColor) -> Self {
        self.layer(label, series, Mark::Bars, color)
    }

    pub fn reference(mut self, value: f64, label: &str, color: RGBColor) -> Self {
        self.references.push(ReferenceLine {
            value,
            label: label.to_string(),
            color,
        });
        self
    }

    pub fn has_data(&self) -> bool {
        self.layers.iter().any(|l| !l.points.is_empty())
    }

    fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self.layers.iter().flat_map(|l| l.points.iter().map(|(d, _)| *d));
        dates.fold(None, |range, d| match range {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }

    fn value_range(&self) -> Option<(f64, f64)> {
        let values = self
            .layers
            .iter()
            .flat_map(|l| l.points.iter().map(|(_, v)| *v))
            .chain(self.references.iter().map(|r| r.value));
        let (lo, hi) = values.fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

        let bars = self.layers.iter().any(|l| l.mark == Mark::Bars);
        let pad = if hi > lo { (hi - lo) * 0.05 } else { hi.abs().max(1.0) * 0.05 };
        let lo = if bars && lo >= 0.0 { 0.0 } else { lo - pad };
        Some((lo, hi + pad))
    }
}

fn date_label(first: NaiveDate, offset: f64) -> String {
    (first + Duration::days(offset.round() as i64))
        .format("%Y-%m-%d")
        .to_string()
}

/// Draw the title and every panel onto `root`, one panel per row
fn draw_panels<DB>(root: &DrawingArea<DB, Shift>, title: &str, panels: &[Panel]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let body = root.titled(title, (FONT, 26))?;
    if panels.is_empty() {
        return Ok(());
    }

    let areas = body.split_evenly((panels.len(), 1));
    for (panel, area) in panels.iter().zip(areas.iter()) {
        draw_panel(area, panel)?;
    }
    root.present()?;
    Ok(())
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, panel: &Panel) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let caption = format!("{} ({})", panel.title, panel.unit);
    let (Some((first, last)), Some((lo, hi))) = (panel.date_range(), panel.value_range()) else {
        let inner = area.titled(&caption, (FONT, 18))?;
        let (w, h) = inner.dim_in_pixel();
        let style = TextStyle::from((FONT, 18).into_font())
            .color(&GREY)
            .pos(Pos::new(HPos::Center, VPos::Center));
        inner.draw(&Text::new("No data", (w as i32 / 2, h as i32 / 2), style))?;
        return Ok(());
    };

    let span = (last - first).num_days() as f64;
    let x_range = -0.5..span + 0.5;
    let x_of = |d: &NaiveDate| (*d - first).num_days() as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(&caption, (FONT, 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), lo..hi)?;
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&|x: &f64| date_label(first, *x))
        .y_desc(panel.unit.as_str())
        .draw()?;

    for layer in &panel.layers {
        if layer.points.is_empty() {
            continue;
        }
        let color = layer.color;
        match layer.mark {
            Mark::Line => {
                chart
                    .draw_series(LineSeries::new(
                        layer.points.iter().map(|(d, v)| (x_of(d), *v)),
                        color.stroke_width(2),
                    ))?
                    .label(layer.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
            Mark::Dots => {
                chart
                    .draw_series(
                        layer
                            .points
                            .iter()
                            .map(|(d, v)| Circle::new((x_of(d), *v), 3, color.mix(0.6).filled())),
                    )?
                    .label(layer.label.as_str())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
            }
            Mark::Bars => {
                let base = lo.max(0.0);
                chart
                    .draw_series(layer.points.iter().map(|(d, v)| {
                        let x = x_of(d);
                        Rectangle::new([(x - 0.4, base), (x + 0.4, *v)], color.mix(0.7).filled())
                    }))?
                    .label(layer.label.as_str())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
            }
        }
    }

    for reference in &panel.references {
        let color = reference.color;
        chart
            .draw_series(LineSeries::new(
                vec![(x_range.start, reference.value), (x_range.end, reference.value)],
                color.stroke_width(1),
            ))?
            .label(reference.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(1)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn canvas_size(panels: &[Panel]) -> (u32, u32) {
    (WIDTH, TITLE_HEIGHT + PANEL_HEIGHT * panels.len().max(1) as u32)
}

/// Render panels stacked vertically into an SVG document
pub fn render_svg(title: &str, panels: &[Panel]) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, canvas_size(panels)).into_drawing_area();
        draw_panels(&root, title, panels)?;
    }
    Ok(svg)
}

/// Render panels into an SVG file
pub fn render_panels(title: &str, panels: &[Panel], output_path: &Path) -> Result<()> {
    info!("Generating chart: {}", output_path.display());

    let root = SVGBackend::new(output_path, canvas_size(panels)).into_drawing_area();
    draw_panels(&root, title, panels)?;

    info!("Chart written to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> DailySeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DailySeries::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v))
                .collect(),
        )
    }

    #[test]
    fn test_render_svg_contains_layers() {
        let panel = Panel::new("Oxygen", "%")
            .line("Daily", &series(&[96.0, 97.0, 95.5]), BLUE)
            .dots("Readings", &series(&[96.0, 97.0]), ORANGE)
            .reference(95.0, "Low", RED);
        let svg = render_svg("Dashboard", &[panel]).unwrap();

        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("<polyline"));
        assert!(svg.matches("<circle").count() >= 2);
        assert!(svg.contains("Oxygen (%)"));
        assert!(svg.contains("Low"));
        assert!(!svg.contains("No data"));
    }

    #[test]
    fn test_empty_panel_says_no_data() {
        let panel = Panel::new("Sleep", "hours").bars("Nightly", &DailySeries::default(), PURPLE);
        assert!(!panel.has_data());
        let svg = render_svg("Dashboard", &[panel]).unwrap();
        assert!(svg.contains("No data"));
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn test_single_point_panel() {
        let panel = Panel::new("Steps", "steps").bars("Daily", &series(&[8000.0]), GREEN);
        let svg = render_svg("Activity", &[panel]).unwrap();
        assert!(svg.contains("<rect"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_value_range_pads_and_anchors_bars() {
        let bars = Panel::new("Steps", "steps").bars("Daily", &series(&[4000.0, 8000.0]), GREEN);
        let (lo, hi) = bars.value_range().unwrap();
        assert_eq!(lo, 0.0);
        assert!(hi > 8000.0);

        let line = Panel::new("HRV", "ms")
            .line("Daily", &series(&[40.0, 50.0]), BLUE)
            .reference(30.0, "Healthy", GREEN);
        let (lo, hi) = line.value_range().unwrap();
        assert!(lo < 30.0);
        assert!(hi > 50.0);
    }

    #[test]
    fn test_render_panels_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let panel = Panel::new("HRV", "ms").line("Daily", &series(&[40.0, 42.0]), BLUE);
        render_panels("HRV", &[panel], &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("HRV"));
    }
}

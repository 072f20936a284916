//! Per-month PNG scatter charts.
//!
//! Proton density against time, each normal reading coloured by proton
//! speed, extreme anomalies drawn as large red crosses.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use image::{Rgb, RgbImage};

use crate::color::{SpeedScale, ANOMALY_RGB};
use crate::data::filter::sanitize;
use crate::data::model::{Feature, Label, MonthlyTable, Record};
use crate::detect::stats::quantile;
use crate::detect::Detection;
use crate::error::Result;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 800;
const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 40;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 60;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

/// `<graphs_dir>/<year>/<year>_month_<MM>.png`
pub fn chart_path(graphs_dir: &Path, year_label: &str, month: u32) -> PathBuf {
    graphs_dir
        .join(year_label)
        .join(format!("{year_label}_month_{month:02}.png"))
}

/// Y-axis limits from the 1st/99th density percentiles, floored at 0.1.
pub fn density_limits(valid: &MonthlyTable) -> (f64, f64) {
    let densities = valid.values(Feature::ProtonDensity);
    let low = quantile(&densities, 0.01).max(0.1);
    let high = quantile(&densities, 0.99);
    if high.is_finite() && high > low {
        (low, high)
    } else {
        (low, low + 1.0)
    }
}

/// Render one month to `path`, creating parent directories.
///
/// `raw` is the month as partitioned (used for axis limits), `detection`
/// the pipeline result for it.
pub fn render_month_chart(raw: &MonthlyTable, detection: &Detection, path: &Path) -> Result<()> {
    let valid = sanitize(raw);
    let (y_min, y_max) = density_limits(&valid);

    let (start, end) = match (valid.records.first(), valid.records.last()) {
        (Some(first), Some(last)) => (first.datetime, last.datetime),
        _ => {
            let t = raw
                .records
                .first()
                .map(|r| r.datetime)
                .unwrap_or_default();
            (t, t)
        }
    };

    let mut canvas = Canvas::new(start, end, y_min, y_max);
    canvas.draw_grid();

    let normal: Vec<&Record> = match &detection.labels {
        Some(labels) => detection
            .table
            .records
            .iter()
            .zip(labels)
            .filter(|(_, l)| **l == Label::Normal)
            .map(|(r, _)| r)
            .collect(),
        None => detection.table.records.iter().filter(|r| r.is_valid()).collect(),
    };

    let scale = SpeedScale::from_values(normal.iter().filter_map(|r| r.proton_speed));
    for record in &normal {
        let (Some(density), Some(speed)) = (record.proton_density, record.proton_speed) else {
            continue;
        };
        let color = scale.map_or([70, 110, 180], |s| s.color_for(speed));
        canvas.dot(record.datetime, density, Rgb(color));
    }

    for anomaly in &detection.anomalies {
        canvas.cross(anomaly.datetime, anomaly.proton_density, Rgb(ANOMALY_RGB));
    }

    canvas.draw_frame();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.image.save(path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Raster canvas with a data → pixel transform
// ---------------------------------------------------------------------------

struct Canvas {
    image: RgbImage,
    start: NaiveDateTime,
    span_secs: f64,
    y_min: f64,
    y_max: f64,
}

impl Canvas {
    fn new(start: NaiveDateTime, end: NaiveDateTime, y_min: f64, y_max: f64) -> Self {
        let span_secs = ((end - start).num_seconds() as f64).max(1.0);
        Canvas {
            image: RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND),
            start,
            span_secs,
            y_min,
            y_max,
        }
    }

    fn plot_width() -> f64 {
        f64::from(WIDTH - MARGIN_LEFT - MARGIN_RIGHT)
    }

    fn plot_height() -> f64 {
        f64::from(HEIGHT - MARGIN_TOP - MARGIN_BOTTOM)
    }

    /// Pixel position of a data point, `None` outside the plot area.
    fn to_pixel(&self, t: NaiveDateTime, y: f64) -> Option<(i64, i64)> {
        let fx = (t - self.start).num_seconds() as f64 / self.span_secs;
        let fy = (y - self.y_min) / (self.y_max - self.y_min);
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        let px = f64::from(MARGIN_LEFT) + fx * Self::plot_width();
        let py = f64::from(MARGIN_TOP) + (1.0 - fy) * Self::plot_height();
        Some((px.round() as i64, py.round() as i64))
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(WIDTH) && y < i64::from(HEIGHT) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn dot(&mut self, t: NaiveDateTime, y: f64, color: Rgb<u8>) {
        let Some((cx, cy)) = self.to_pixel(t, y) else {
            return;
        };
        for dx in -2i64..=2 {
            for dy in -2i64..=2 {
                if dx * dx + dy * dy <= 5 {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn cross(&mut self, t: NaiveDateTime, y: f64, color: Rgb<u8>) {
        let Some((cx, cy)) = self.to_pixel(t, y) else {
            return;
        };
        for d in -9i64..=9 {
            for w in -1i64..=1 {
                self.put(cx + d + w, cy + d, color);
                self.put(cx + d + w, cy - d, color);
            }
        }
    }

    fn draw_grid(&mut self) {
        let left = i64::from(MARGIN_LEFT);
        let right = i64::from(WIDTH - MARGIN_RIGHT);
        let top = i64::from(MARGIN_TOP);
        let bottom = i64::from(HEIGHT - MARGIN_BOTTOM);

        for i in 1..5 {
            let y = top + (bottom - top) * i / 5;
            for x in left..right {
                self.put(x, y, GRID);
            }
        }

        // One vertical line per day boundary.
        let mut day = self.start.date().and_hms_opt(0, 0, 0).unwrap_or(self.start) + Duration::days(1);
        let end = self.start + Duration::seconds(self.span_secs as i64);
        while day < end {
            if let Some((x, _)) = self.to_pixel(day, self.y_min) {
                for y in top..bottom {
                    self.put(x, y, GRID);
                }
            }
            day += Duration::days(1);
        }
    }

    fn draw_frame(&mut self) {
        let left = i64::from(MARGIN_LEFT);
        let right = i64::from(WIDTH - MARGIN_RIGHT);
        let top = i64::from(MARGIN_TOP);
        let bottom = i64::from(HEIGHT - MARGIN_BOTTOM);
        for x in left..=right {
            self.put(x, top, AXIS);
            self.put(x, bottom, AXIS);
        }
        for y in top..=bottom {
            self.put(left, y, AXIS);
            self.put(right, y, AXIS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::detect::detect_anomalies;
    use chrono::NaiveDate;

    fn month(n: usize) -> MonthlyTable {
        let base = NaiveDate::from_ymd_opt(2005, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        MonthlyTable::new(
            2005,
            1,
            (0..n)
                .map(|i| {
                    let t = i as f64;
                    Record::new(
                        base + Duration::minutes(10 * i as i64),
                        4.0 + (t * 0.3).sin(),
                        450.0 + 40.0 * (t * 0.05).cos(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn chart_path_layout() {
        let p = chart_path(Path::new("/out/Monthly_graphs"), "2005", 3);
        assert_eq!(p, PathBuf::from("/out/Monthly_graphs/2005/2005_month_03.png"));
    }

    #[test]
    fn limits_are_floored() {
        let mut t = month(100);
        for r in &mut t.records {
            r.proton_density = Some(0.01);
        }
        let (low, high) = density_limits(&t);
        assert_eq!(low, 0.1);
        assert!(high > low);
    }

    #[test]
    fn renders_png_of_expected_size() {
        let raw = month(300);
        let detection = detect_anomalies(&raw, &DetectionConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = chart_path(dir.path(), "2005", 1);

        render_month_chart(&raw, &detection, &path).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (WIDTH, HEIGHT));
    }
}

use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Speed colour ramp
// ---------------------------------------------------------------------------

/// Colour used for highlighted anomalies.
pub const ANOMALY_RGB: [u8; 3] = [220, 30, 30];

/// Convert an HSL triple (hue in degrees) to 8-bit sRGB.
fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    [
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

/// Maps proton speeds onto a purple → teal → yellow ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedScale {
    pub min: f64,
    pub max: f64,
}

impl SpeedScale {
    /// Scale spanning the finite values in `speeds`.
    pub fn from_values(speeds: impl IntoIterator<Item = f64>) -> Option<Self> {
        let (min, max) = speeds
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        (min <= max).then_some(SpeedScale { min, max })
    }

    /// Position of `speed` on the scale, clamped to `[0, 1]`.
    pub fn fraction(&self, speed: f64) -> f32 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            return 0.5;
        }
        ((speed - self.min) / range).clamp(0.0, 1.0) as f32
    }

    pub fn color_for(&self, speed: f64) -> [u8; 3] {
        let t = self.fraction(speed);
        hsl_to_rgb(280.0 - 220.0 * t, 0.75, 0.30 + 0.30 * t)
    }

    /// `n` evenly spaced (speed, colour) stops for legends and binning.
    pub fn stops(&self, n: usize) -> Vec<(f64, [u8; 3])> {
        if n == 0 {
            return Vec::new();
        }
        (0..n)
            .map(|i| {
                let t = if n == 1 { 0.5 } else { i as f64 / (n - 1) as f64 };
                let speed = self.min + t * (self.max - self.min);
                (speed, self.color_for(speed))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_spans_finite_values() {
        let scale = SpeedScale::from_values([450.0, f64::NAN, 300.0, 700.0]).unwrap();
        assert_eq!((scale.min, scale.max), (300.0, 700.0));
        assert_eq!(scale.fraction(300.0), 0.0);
        assert_eq!(scale.fraction(900.0), 1.0);
        assert!(SpeedScale::from_values(Vec::new()).is_none());
    }

    #[test]
    fn ends_of_ramp_differ() {
        let scale = SpeedScale { min: 300.0, max: 700.0 };
        assert_ne!(scale.color_for(300.0), scale.color_for(700.0));
        assert_eq!(scale.stops(5).len(), 5);
    }

    #[test]
    fn flat_scale_uses_midpoint() {
        let scale = SpeedScale { min: 400.0, max: 400.0 };
        assert_eq!(scale.fraction(400.0), 0.5);
    }
}

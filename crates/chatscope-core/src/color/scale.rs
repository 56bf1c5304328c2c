//! Continuous color scales and the HSL adjustments used for theming.

use super::Rgb;

/// Scalar-to-color scale applied to a category's `t` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScale {
    /// Google's Turbo rainbow, perceptually smooth with a wide hue range
    #[default]
    Turbo,
    /// Cyclic rainbow; `t = 0` and `t = 1` meet
    Sinebow,
}

impl ColorScale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "turbo" => Some(Self::Turbo),
            "sinebow" => Some(Self::Sinebow),
            _ => None,
        }
    }

    pub fn interpolate(&self, t: f64) -> Rgb {
        match self {
            Self::Turbo => turbo(t),
            Self::Sinebow => sinebow(t),
        }
    }
}

fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Polynomial approximation of Turbo (same coefficients as d3-scale-chromatic).
pub fn turbo(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let r = 34.61 + t * (1172.33 - t * (10793.56 - t * (33300.12 - t * (38394.49 - t * 14825.05))));
    let g = 23.31 + t * (557.33 + t * (1225.33 - t * (3574.96 - t * (1073.77 + t * 707.56))));
    let b = 27.2 + t * (3211.1 - t * (15327.97 - t * (27814.0 - t * (22569.18 - t * 6838.66))));
    Rgb::new(channel(r), channel(g), channel(b))
}

pub fn sinebow(t: f64) -> Rgb {
    use std::f64::consts::PI;
    let t = 0.5 - t.clamp(0.0, 1.0);
    let r = (PI * t).sin().powi(2);
    let g = (PI * (t + 1.0 / 3.0)).sin().powi(2);
    let b = (PI * (t + 2.0 / 3.0)).sin().powi(2);
    Rgb::new(channel(255.0 * r), channel(255.0 * g), channel(255.0 * b))
}

// ===== HSL =====

/// Hue in degrees, saturation and lightness in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl From<Rgb> for Hsl {
    fn from(rgb: Rgb) -> Self {
        let r = rgb.r as f64 / 255.0;
        let g = rgb.g as f64 / 255.0;
        let b = rgb.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let delta = max - min;

        if delta == 0.0 {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let s = if l < 0.5 { delta / (max + min) } else { delta / (2.0 - max - min) };
        let h = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        Hsl { h: h * 60.0, s, l }
    }
}

impl From<Hsl> for Rgb {
    fn from(hsl: Hsl) -> Self {
        let Hsl { h, s, l } = hsl;
        if s == 0.0 {
            let v = channel(l * 255.0);
            return Rgb::new(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let h = h.rem_euclid(360.0) / 360.0;

        let hue = |mut t: f64| {
            if t < 0.0 {
                t += 1.0;
            }
            if t > 1.0 {
                t -= 1.0;
            }
            if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            }
        };

        Rgb::new(
            channel(hue(h + 1.0 / 3.0) * 255.0),
            channel(hue(h) * 255.0),
            channel(hue(h - 1.0 / 3.0) * 255.0),
        )
    }
}

//! Deterministic category-to-color assignment.
//!
//! Labels are sorted lexicographically (never by frequency) and spread evenly
//! over `[0, 1]`; the scalar is then mapped through a [`ColorScale`]. The theme
//! only touches lightness and saturation, so a label keeps the same `t` and the
//! same hue across theme switches.

mod scale;

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

pub use scale::{sinebow, turbo, ColorScale, Hsl};

/// Color returned for labels that were not part of the assignment
pub const NEUTRAL: Rgb = Rgb::new(160, 160, 160);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// RGBA in `[0, 1]` with the given alpha.
    pub fn to_unit(&self, alpha: f32) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha.clamp(0.0, 1.0),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn adjust(&self, color: Rgb) -> Rgb {
        let mut hsl = Hsl::from(color);
        match self {
            // Lift the darkest scale ends off a dark background
            Self::Dark => {
                hsl.l = (0.15 + hsl.l * 0.85).min(0.85);
            }
            // Deepen and saturate so pale colors stay visible on white
            Self::Light => {
                hsl.l = (hsl.l * 0.8).min(0.6);
                hsl.s = (hsl.s * 1.15).min(1.0);
            }
        }
        Rgb::from(hsl)
    }
}

/// Immutable label → scalar mapping for one dataset.
#[derive(Debug, Clone, Default)]
pub struct ColorAssignment {
    labels: Vec<String>,
    scale: ColorScale,
}

impl ColorAssignment {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_scale(labels, ColorScale::default())
    }

    pub fn with_scale<I, S>(labels: I, scale: ColorScale) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: BTreeSet<String> = labels
            .into_iter()
            .map(Into::into)
            .filter(|label: &String| !label.is_empty())
            .collect();
        Self {
            labels: labels.into_iter().collect(),
            scale,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn scale(&self) -> ColorScale {
        self.scale
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|probe| probe.as_str().cmp(label)).ok()
    }

    pub fn t_for_index(&self, index: usize) -> f64 {
        let denominator = self.labels.len().saturating_sub(1).max(1);
        index as f64 / denominator as f64
    }

    /// Scalar in `[0, 1]` for `label`; unknown labels read as `0.0`.
    pub fn value_of(&self, label: &str) -> f64 {
        self.index_of(label).map(|i| self.t_for_index(i)).unwrap_or(0.0)
    }

    pub fn color_of(&self, label: &str, theme: Theme) -> Rgb {
        match self.index_of(label) {
            Some(index) => self.color_at(index, theme),
            None => NEUTRAL,
        }
    }

    pub fn color_at(&self, index: usize, theme: Theme) -> Rgb {
        if index >= self.labels.len() {
            return NEUTRAL;
        }
        theme.adjust(self.scale.interpolate(self.t_for_index(index)))
    }

    /// One color per label, in label order; this is what legends and renderers share.
    pub fn palette(&self, theme: Theme) -> Vec<Rgb> {
        (0..self.labels.len()).map(|i| self.color_at(i, theme)).collect()
    }
}

/// Process-wide holder of the current dataset's [`ColorAssignment`].
///
/// The first `get_or_init` after creation (or after `reset`) computes the
/// assignment; later calls return the same `Arc` regardless of their input.
#[derive(Debug, Default)]
pub struct ColorService {
    current: RwLock<Option<Arc<ColorAssignment>>>,
}

impl ColorService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<ColorService> {
        static SERVICE: OnceLock<Arc<ColorService>> = OnceLock::new();
        Arc::clone(SERVICE.get_or_init(|| Arc::new(ColorService::new())))
    }

    pub fn get_or_init<I, S>(&self, labels: I, scale: ColorScale) -> Arc<ColorAssignment>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(existing) = self.current.read().as_ref() {
            return Arc::clone(existing);
        }

        let mut guard = self.current.write();
        if let Some(existing) = guard.as_ref() {
            return Arc::clone(existing);
        }
        let assignment = Arc::new(ColorAssignment::with_scale(labels, scale));
        tracing::info!(labels = assignment.len(), "color map initialized");
        *guard = Some(Arc::clone(&assignment));
        assignment
    }

    pub fn current(&self) -> Option<Arc<ColorAssignment>> {
        self.current.read().clone()
    }

    /// Forget the current assignment; the next dataset computes a fresh one.
    pub fn reset(&self) {
        *self.current.write() = None;
    }
}

//! Interface of the host-provided render surface.

use super::camera::Camera;
use crate::color::Rgb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStyle {
    pub color: Rgb,
    pub size: f32,
    pub opacity: f32,
}

/// One full set of points handed to [`Renderer::draw`].
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub category: &'a [u32],
    pub styles: &'a [PointStyle],
}

impl Frame<'_> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// A scatter surface. Indices always refer to positions in the last drawn frame.
///
/// Implementations may move the camera on `select` (auto-framing); callers
/// that care restore it themselves.
pub trait Renderer {
    /// Replace everything drawn. The renderer copies what it needs.
    fn draw(&mut self, frame: Frame<'_>);

    fn camera(&self) -> Camera;

    fn set_camera(&mut self, camera: Camera);

    fn select(&mut self, indices: &[usize]);

    fn deselect(&mut self);

    /// Show only `indices`; everything else is hidden until `unfilter`.
    fn filter(&mut self, indices: &[usize]);

    fn unfilter(&mut self);

    /// Per-point styles, same length as the drawn frame.
    fn set_style(&mut self, styles: &[PointStyle]);

    fn resize(&mut self, width: u16, height: u16);

    /// Release all resources. No other method is called afterwards.
    fn destroy(&mut self);
}

//! Braille scatter surface implementing the core [`Renderer`].

use std::collections::BTreeMap;

use chatscope_core::color::{Rgb, Theme};
use chatscope_core::viz::{Camera, Frame, PointStyle, Renderer};
use ratatui::layout::Rect;
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Context, Line, Points};
use ratatui::widgets::{Block, Widget};

use crate::theme;

pub struct CanvasRenderer {
    camera: Camera,
    x: Vec<f32>,
    y: Vec<f32>,
    styles: Vec<PointStyle>,
    /// `None` when nothing is filtered out
    visible: Option<Vec<bool>>,
    selected: Vec<usize>,
    size: (u16, u16),
    base_size: f32,
    theme: Theme,
    released: bool,
}

type Buckets = BTreeMap<(u8, u8, u8), Vec<(f64, f64)>>;

impl CanvasRenderer {
    pub fn new(base_size: f32, theme: Theme) -> Self {
        Self {
            camera: Camera::default(),
            x: Vec::new(),
            y: Vec::new(),
            styles: Vec::new(),
            visible: None,
            selected: Vec::new(),
            size: (0, 0),
            base_size,
            theme,
            released: false,
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    fn is_visible(&self, index: usize) -> bool {
        self.visible
            .as_ref()
            .map_or(true, |mask| mask.get(index).copied().unwrap_or(false))
    }

    /// World-space size of one braille dot on the current surface.
    fn dot(&self) -> (f64, f64) {
        let (width, height) = match self.size {
            (0, _) | (_, 0) => (80, 24),
            size => size,
        };
        let [x0, x1] = self.camera.x_bounds();
        let [y0, y1] = self.camera.y_bounds();
        ((x1 - x0) / (width as f64 * 2.0), (y1 - y0) / (height as f64 * 4.0))
    }

    fn push_point(&self, coords: &mut Vec<(f64, f64)>, index: usize, enlarged: bool) {
        let (x, y) = (self.x[index] as f64, self.y[index] as f64);
        coords.push((x, y));
        if enlarged {
            let (dx, dy) = self.dot();
            coords.extend([(x - dx, y), (x + dx, y), (x, y - dy), (x, y + dy)]);
        }
    }

    fn buckets(&self) -> Buckets {
        let background = theme::background_rgb(self.theme);
        let mut buckets = Buckets::new();
        for (index, style) in self.styles.iter().enumerate().take(self.x.len()) {
            if !self.is_visible(index) {
                continue;
            }
            let Rgb { r, g, b } = theme::blend(style.color, background, style.opacity);
            let coords = buckets.entry((r, g, b)).or_default();
            self.push_point(coords, index, style.size > self.base_size);
        }
        buckets
    }

    fn selected_coords(&self) -> Vec<(f64, f64)> {
        let mut coords = Vec::with_capacity(self.selected.len() * 5);
        for &index in &self.selected {
            if index < self.x.len() && self.is_visible(index) {
                self.push_point(&mut coords, index, true);
            }
        }
        coords
    }

    /// Canvas widget for the current frame, with an optional lasso path on top.
    pub fn widget<'a>(&'a self, block: Block<'a>, lasso: Option<&'a [[f32; 2]]>) -> impl Widget + 'a {
        let buckets = self.buckets();
        let selected = self.selected_coords();
        let [x0, x1] = self.camera.x_bounds();
        let [y0, y1] = self.camera.y_bounds();

        Canvas::default()
            .block(block)
            .background_color(theme::background(self.theme))
            .marker(Marker::Braille)
            .x_bounds([x0, x1])
            .y_bounds([y0, y1])
            .paint(move |ctx: &mut Context<'_>| {
                for ((r, g, b), coords) in &buckets {
                    ctx.draw(&Points {
                        coords,
                        color: ratatui::style::Color::Rgb(*r, *g, *b),
                    });
                }
                ctx.layer();
                ctx.draw(&Points {
                    coords: &selected,
                    color: theme::SELECTION,
                });
                if let Some(path) = lasso {
                    for pair in path.windows(2) {
                        ctx.draw(&Line {
                            x1: pair[0][0] as f64,
                            y1: pair[0][1] as f64,
                            x2: pair[1][0] as f64,
                            y2: pair[1][1] as f64,
                            color: theme::LASSO,
                        });
                    }
                }
            })
    }

    /// Map a terminal cell inside `area` to world coordinates.
    pub fn to_world(&self, area: Rect, column: u16, row: u16) -> Option<[f32; 2]> {
        if area.width == 0
            || area.height == 0
            || column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return None;
        }
        let fx = ((column - area.x) as f64 + 0.5) / area.width as f64;
        let fy = ((row - area.y) as f64 + 0.5) / area.height as f64;
        let [x0, x1] = self.camera.x_bounds();
        let [y0, y1] = self.camera.y_bounds();
        Some([(x0 + fx * (x1 - x0)) as f32, (y1 - fy * (y1 - y0)) as f32])
    }

    /// Pick radius covering roughly one terminal cell.
    pub fn pick_radius(&self, area: Rect) -> f32 {
        let [x0, x1] = self.camera.x_bounds();
        ((x1 - x0) / area.width.max(1) as f64) as f32
    }
}

impl Renderer for CanvasRenderer {
    fn draw(&mut self, frame: Frame<'_>) {
        self.x = frame.x.to_vec();
        self.y = frame.y.to_vec();
        self.styles = frame.styles.to_vec();
        self.visible = None;
        self.selected.clear();
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn select(&mut self, indices: &[usize]) {
        self.selected = indices.to_vec();

        // Frame the selection the way interactive scatter surfaces do
        let (sum_x, sum_y, n) = self
            .selected
            .iter()
            .filter(|&&i| i < self.x.len())
            .fold((0.0f32, 0.0f32, 0usize), |(sx, sy, n), &i| (sx + self.x[i], sy + self.y[i], n + 1));
        if n > 0 {
            self.camera = self.camera.centered_on([sum_x / n as f32, sum_y / n as f32]);
        }
    }

    fn deselect(&mut self) {
        self.selected.clear();
    }

    fn filter(&mut self, indices: &[usize]) {
        let mut mask = vec![false; self.x.len()];
        for &i in indices {
            if let Some(slot) = mask.get_mut(i) {
                *slot = true;
            }
        }
        self.visible = Some(mask);
    }

    fn unfilter(&mut self) {
        self.visible = None;
    }

    fn set_style(&mut self, styles: &[PointStyle]) {
        self.styles = styles.to_vec();
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
    }

    fn destroy(&mut self) {
        self.x = Vec::new();
        self.y = Vec::new();
        self.styles = Vec::new();
        self.visible = None;
        self.selected = Vec::new();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(opacity: f32, size: f32) -> PointStyle {
        PointStyle {
            color: Rgb::new(200, 100, 0),
            size,
            opacity,
        }
    }

    fn drawn() -> CanvasRenderer {
        let mut renderer = CanvasRenderer::new(2.0, Theme::Dark);
        let styles = [style(1.0, 2.0), style(1.0, 2.0), style(0.5, 2.0)];
        renderer.draw(Frame {
            x: &[-0.5, 0.0, 0.5],
            y: &[0.0, 0.5, -0.5],
            category: &[0, 0, 1],
            styles: &styles,
        });
        renderer
    }

    #[test]
    fn test_center_cell_maps_to_camera_target() {
        let renderer = drawn();
        let area = Rect::new(10, 5, 21, 11);
        let [x, y] = renderer.to_world(area, 20, 10).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
        assert!(renderer.to_world(area, 0, 0).is_none());
    }

    #[test]
    fn test_buckets_group_by_blended_color() {
        let renderer = drawn();
        let buckets = renderer.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&(200, 100, 0)].len(), 2);
        assert_eq!(buckets[&(100, 50, 0)].len(), 1);
    }

    #[test]
    fn test_filter_hides_points() {
        let mut renderer = drawn();
        renderer.filter(&[1]);
        let total: usize = renderer.buckets().values().map(Vec::len).sum();
        assert_eq!(total, 1);
        renderer.unfilter();
        let total: usize = renderer.buckets().values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_select_auto_frames() {
        let mut renderer = drawn();
        renderer.select(&[0, 2]);
        assert_eq!(renderer.camera().target, [0.0, -0.25]);
    }

    #[test]
    fn test_destroy_releases_buffers() {
        let mut renderer = drawn();
        renderer.destroy();
        assert!(renderer.is_released());
        assert_eq!(renderer.len(), 0);
    }
}

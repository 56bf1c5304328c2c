/// Pan/zoom state of the render surface, in point space.
///
/// The visible region is `target ± distance` on both axes, so the default
/// camera shows the whole `[-1, 1]` square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: [f32; 2],
    pub distance: f32,
}

/// Closest the camera may zoom in
pub const MIN_DISTANCE: f32 = 0.01;

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: [0.0, 0.0],
            distance: 1.0,
        }
    }
}

impl Camera {
    pub fn new(target: [f32; 2], distance: f32) -> Self {
        Self {
            target,
            distance: distance.max(MIN_DISTANCE),
        }
    }

    /// Same zoom, centered on `point`.
    pub fn centered_on(&self, point: [f32; 2]) -> Self {
        Self {
            target: point,
            distance: self.distance,
        }
    }

    /// Frame the horizontal span `[min_x, max_x]` at vertical center 0.
    pub fn framing(min_x: f32, max_x: f32) -> Self {
        let (min_x, max_x) = if min_x <= max_x { (min_x, max_x) } else { (max_x, min_x) };
        Self::new([(min_x + max_x) / 2.0, 0.0], (max_x - min_x) / 2.0)
    }

    pub fn zoomed(&self, factor: f32) -> Self {
        Self::new(self.target, self.distance * factor)
    }

    pub fn panned(&self, dx: f32, dy: f32) -> Self {
        Self {
            target: [self.target[0] + dx * self.distance, self.target[1] + dy * self.distance],
            distance: self.distance,
        }
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [(self.target[0] - self.distance) as f64, (self.target[0] + self.distance) as f64]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        [(self.target[1] - self.distance) as f64, (self.target[1] + self.distance) as f64]
    }
}

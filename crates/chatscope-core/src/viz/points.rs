/// Columnar point buffers; all three arrays always have the same length.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    x: Vec<f32>,
    y: Vec<f32>,
    category: Vec<u32>,
}

impl PointSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            category: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, x: f32, y: f32, category: u32) {
        self.x.push(x);
        self.y.push(y);
        self.category.push(category);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn position(&self, index: usize) -> Option<[f32; 2]> {
        Some([*self.x.get(index)?, *self.y.get(index)?])
    }

    pub fn category(&self, index: usize) -> Option<u32> {
        self.category.get(index).copied()
    }

    pub(crate) fn xs(&self) -> &[f32] {
        &self.x
    }

    pub(crate) fn ys(&self) -> &[f32] {
        &self.y
    }

    pub(crate) fn categories(&self) -> &[u32] {
        &self.category
    }

    /// Release the buffers entirely, not just their contents.
    pub fn clear(&mut self) {
        self.x = Vec::new();
        self.y = Vec::new();
        self.category = Vec::new();
    }
}

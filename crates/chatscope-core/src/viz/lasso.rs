//! Free-form polygon hit testing for lasso selection.

/// Even-odd ray casting. Points exactly on an edge may land on either side.
pub fn point_in_polygon(point: [f32; 2], polygon: &[[f32; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let [px, py] = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Axis-aligned bounds of `polygon` as `(min, max)`, used to skip points cheaply.
pub fn bounding_box(polygon: &[[f32; 2]]) -> Option<([f32; 2], [f32; 2])> {
    let first = polygon.first()?;
    let mut min = *first;
    let mut max = *first;
    for [x, y] in polygon.iter().skip(1) {
        min = [min[0].min(*x), min[1].min(*y)];
        max = [max[0].max(*x), max[1].max(*y)];
    }
    Some((min, max))
}

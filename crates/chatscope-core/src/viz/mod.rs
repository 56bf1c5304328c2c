//! Interactive scatter visualization of message records.
//!
//! Records become points: x is the message time across the dataset's time
//! extent, y is the time of day (UTC) with a little jitter, and the category is
//! the sender's color index. The visualization owns the point buffers and all
//! interaction state; the host only supplies a [`Renderer`].
//!
//! Each load runs `Idle → Validating → Transforming → StreamingDraw → Ready`.
//! Large loads are split into batches that the host drives with [`step`] (or
//! [`run_to_completion`]); nothing is drawn until the last batch is done, and a
//! new load cancels whatever batches the previous one still had queued.
//!
//! [`step`]: Visualization::step
//! [`run_to_completion`]: Visualization::run_to_completion

mod camera;
mod lasso;
mod navigation;
mod points;
mod queue;
mod renderer;

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use camera::{Camera, MIN_DISTANCE};
pub use lasso::{bounding_box, point_in_polygon};
pub use navigation::{Direction, TimeIndex};
pub use points::PointSet;
pub use queue::BatchQueue;
pub use renderer::{Frame, PointStyle, Renderer};

use crate::color::{ColorAssignment, ColorService, Rgb, Theme};
use crate::config::{FilterPolicy, VisualizationConfig};
use crate::error::{Error, Result};
use crate::models::{parse_timestamp, time_of_day_fraction, Record, RecordRef};

/// Share of the matched time span added on each side when focusing
const FOCUS_PADDING: f64 = 0.1;
/// Zoom used when focusing on matches that share a single instant
const FOCUS_MIN_DISTANCE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VizState {
    Idle,
    Validating,
    Transforming,
    StreamingDraw,
    Ready,
}

/// Diagnostics for one load; dropped records are never an error on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub total: usize,
    pub valid: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    /// No transform is queued
    Idle,
    Pending { completed: usize, total: usize },
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    /// Most recently selected point
    pub primary: Option<usize>,
    pub selected: Vec<usize>,
    pub multi_select: bool,
    pub hovered: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewMode {
    All,
    Filtered(Vec<usize>),
    Highlighted(Vec<usize>),
}

impl ViewMode {
    fn matches(&self) -> Option<&[usize]> {
        match self {
            Self::All => None,
            Self::Filtered(indices) | Self::Highlighted(indices) => Some(indices),
        }
    }
}

/// Linear map from a padded time domain (ms) onto `[-1, 1]`.
#[derive(Debug, Clone, Copy)]
struct TimeScale {
    start: f64,
    end: f64,
}

impl TimeScale {
    fn new(min_ms: i64, max_ms: i64, padding: f64) -> Self {
        let pad = (max_ms - min_ms) as f64 * padding;
        Self {
            start: min_ms as f64 - pad,
            end: max_ms as f64 + pad,
        }
    }

    fn to_x(&self, ms: f64) -> f32 {
        let width = self.end - self.start;
        if width <= 0.0 {
            return 0.0;
        }
        (((ms - self.start) / width) * 2.0 - 1.0) as f32
    }
}

struct Entry {
    record: RecordRef,
    time: DateTime<Utc>,
    label: String,
}

struct TransformJob {
    entries: Vec<Entry>,
    queue: BatchQueue,
    scale: TimeScale,
    rng: StdRng,
    staged: PointSet,
    assignment: Arc<ColorAssignment>,
    summary: LoadSummary,
}

impl TransformJob {
    fn transform(&mut self, range: Range<usize>, jitter: f32) {
        for entry in &self.entries[range] {
            let x = self.scale.to_x(entry.time.timestamp_millis() as f64);
            let jitter = if jitter > 0.0 { self.rng.gen_range(-jitter..=jitter) } else { 0.0 };
            let y = ((time_of_day_fraction(&entry.time) * 2.0 - 1.0) as f32 + jitter).clamp(-1.0, 1.0);
            let category = self
                .assignment
                .index_of(&entry.label)
                .unwrap_or(self.assignment.len()) as u32;
            self.staged.push(x, y, category);
        }
    }
}

pub struct Visualization<R: Renderer> {
    renderer: R,
    colors: Arc<ColorService>,
    config: VisualizationConfig,
    state: VizState,
    job: Option<TransformJob>,

    records: Vec<RecordRef>,
    times: Vec<DateTime<Utc>>,
    points: PointSet,
    styles: Vec<PointStyle>,
    index: TimeIndex,
    scale: Option<TimeScale>,
    assignment: Option<Arc<ColorAssignment>>,
    summary: LoadSummary,

    selection: SelectionState,
    view: ViewMode,
    destroyed: bool,
}

impl<R: Renderer> Visualization<R> {
    pub fn new(renderer: R, colors: Arc<ColorService>, config: VisualizationConfig) -> Self {
        Self {
            renderer,
            colors,
            config,
            state: VizState::Idle,
            job: None,
            records: Vec::new(),
            times: Vec::new(),
            points: PointSet::default(),
            styles: Vec::new(),
            index: TimeIndex::default(),
            scale: None,
            assignment: None,
            summary: LoadSummary::default(),
            selection: SelectionState::default(),
            view: ViewMode::All,
            destroyed: false,
        }
    }

    // ===== Accessors =====

    pub fn state(&self) -> VizState {
        self.state
    }

    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn camera(&self) -> Camera {
        self.renderer.camera()
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.renderer.set_camera(camera);
    }

    pub fn record(&self, index: usize) -> Option<&RecordRef> {
        self.records.get(index)
    }

    pub fn position(&self, index: usize) -> Option<[f32; 2]> {
        self.points.position(index)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn primary_record(&self) -> Option<RecordRef> {
        self.selection.primary.and_then(|i| self.records.get(i)).cloned()
    }

    pub fn selected_records(&self) -> Vec<RecordRef> {
        self.selection
            .selected
            .iter()
            .filter_map(|&i| self.records.get(i).cloned())
            .collect()
    }

    /// Indices the current filter or highlight applies to, if any.
    pub fn matches(&self) -> Option<&[usize]> {
        self.view.matches()
    }

    /// Sender labels with their colors under the current theme.
    pub fn legend(&self) -> Vec<(String, Rgb)> {
        match &self.assignment {
            Some(assignment) => assignment
                .labels()
                .iter()
                .cloned()
                .zip(assignment.palette(self.config.theme))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Cancellation handle of the queued transform, if one is pending.
    pub fn transform_token(&self) -> Option<CancellationToken> {
        self.job.as_ref().map(|job| job.queue.token())
    }

    // ===== Loading =====

    /// Validate `records` and queue the transform. Drawing happens in [`step`](Self::step).
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn load(&mut self, records: Vec<RecordRef>) -> Result<LoadSummary> {
        if self.destroyed {
            return Err(Error::Validation("visualization has been destroyed".to_string()));
        }

        let previous = self.state;
        self.state = VizState::Validating;

        let total = records.len();
        let entries: Vec<Entry> = records
            .into_iter()
            .filter_map(|record| {
                let time = record.timestamp_value().and_then(parse_timestamp)?;
                let label = record.sender_or_unknown();
                Some(Entry { record, time, label })
            })
            .collect();

        let summary = LoadSummary {
            total,
            valid: entries.len(),
            dropped: total - entries.len(),
        };

        let (Some(min), Some(max)) = (
            entries.iter().map(|e| e.time.timestamp_millis()).min(),
            entries.iter().map(|e| e.time.timestamp_millis()).max(),
        ) else {
            self.state = previous;
            warn!(total, "no record has a parseable timestamp");
            return Err(Error::Validation(format!("none of {total} records has a parseable timestamp")));
        };

        if summary.dropped > 0 {
            debug!(dropped = summary.dropped, "records without a parseable timestamp skipped");
        }

        if let Some(mut previous_job) = self.job.take() {
            previous_job.queue.cancel();
            debug!("pending transform cancelled by new load");
        }

        let assignment = self
            .colors
            .get_or_init(entries.iter().map(|e| e.label.clone()), self.config.scale);
        let queue = BatchQueue::plan(entries.len(), self.config.batch_size, self.config.streaming_threshold);
        info!(
            total,
            valid = summary.valid,
            dropped = summary.dropped,
            batches = queue.total_batches(),
            "transform queued"
        );

        self.job = Some(TransformJob {
            staged: PointSet::with_capacity(entries.len()),
            entries,
            queue,
            scale: TimeScale::new(min, max, self.config.x_padding),
            rng: StdRng::seed_from_u64(self.config.jitter_seed),
            assignment,
            summary,
        });
        self.state = VizState::Transforming;
        Ok(summary)
    }

    /// Process one batch of the queued transform.
    pub fn step(&mut self) -> TransformStatus {
        let Some(job) = self.job.as_mut() else {
            return TransformStatus::Idle;
        };

        let Some(range) = job.queue.next_batch() else {
            self.job = None;
            self.state = if self.points.is_empty() { VizState::Idle } else { VizState::Ready };
            return TransformStatus::Cancelled;
        };

        job.transform(range, self.config.jitter);
        if job.queue.remaining() > 0 {
            let status = TransformStatus::Pending {
                completed: job.queue.completed(),
                total: job.queue.total_batches(),
            };
            self.state = VizState::StreamingDraw;
            return status;
        }

        if let Some(job) = self.job.take() {
            self.finish(job);
        }
        TransformStatus::Complete
    }

    /// Drive the queued transform to the end, pausing between batches.
    pub async fn run_to_completion(&mut self) -> TransformStatus {
        loop {
            match self.step() {
                TransformStatus::Pending { .. } => {
                    let token = self.transform_token().unwrap_or_default();
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.batch_delay) => {}
                        _ = token.cancelled() => {}
                    }
                }
                status => return status,
            }
        }
    }

    fn finish(&mut self, job: TransformJob) {
        let TransformJob {
            entries,
            staged,
            scale,
            assignment,
            summary,
            ..
        } = job;

        self.times = entries.iter().map(|e| e.time).collect();
        self.records = entries.into_iter().map(|e| e.record).collect();
        self.index = TimeIndex::build(&self.times);
        self.points = staged;
        self.scale = Some(scale);
        self.assignment = Some(assignment);
        self.summary = summary;
        self.selection = SelectionState {
            multi_select: self.selection.multi_select,
            ..SelectionState::default()
        };
        self.view = ViewMode::All;
        self.styles = self.base_styles();

        self.renderer.deselect();
        self.renderer.unfilter();
        self.renderer.draw(Frame {
            x: self.points.xs(),
            y: self.points.ys(),
            category: self.points.categories(),
            styles: &self.styles,
        });
        self.state = VizState::Ready;
        info!(points = self.points.len(), "points drawn");
    }

    // ===== Styling =====

    fn base_styles(&self) -> Vec<PointStyle> {
        let palette = self
            .assignment
            .as_ref()
            .map(|a| a.palette(self.config.theme))
            .unwrap_or_default();
        self.points
            .categories()
            .iter()
            .map(|&category| PointStyle {
                color: palette
                    .get(category as usize)
                    .copied()
                    .unwrap_or(crate::color::NEUTRAL),
                size: self.config.point_size,
                opacity: self.config.opacity,
            })
            .collect()
    }

    fn match_mask(&self, indices: &[usize]) -> Vec<bool> {
        let mut mask = vec![false; self.points.len()];
        for &i in indices {
            if let Some(slot) = mask.get_mut(i) {
                *slot = true;
            }
        }
        mask
    }

    fn restyle(&mut self) {
        let mut styles = self.base_styles();
        let (matches, enlarge) = match &self.view {
            ViewMode::All => (None, false),
            ViewMode::Filtered(indices) => (Some(self.match_mask(indices)), false),
            ViewMode::Highlighted(indices) => (Some(self.match_mask(indices)), true),
        };

        if let Some(mask) = matches {
            for (style, matched) in styles.iter_mut().zip(mask) {
                if matched {
                    if enlarge {
                        style.size = self.config.point_size_highlighted;
                        style.opacity = 1.0;
                    }
                } else if self.config.filter_policy == FilterPolicy::Dim {
                    style.opacity = self.config.opacity_dimmed;
                }
            }
        }

        self.styles = styles;
        self.renderer.set_style(&self.styles);
    }

    fn apply_view(&mut self) {
        match (self.config.filter_policy, self.view.matches()) {
            (FilterPolicy::Hide, Some(indices)) => self.renderer.filter(indices),
            _ => self.renderer.unfilter(),
        }
        self.restyle();
    }

    /// Switch theme; colors change, color identities do not.
    pub fn set_theme(&mut self, theme: Theme) {
        self.config.theme = theme;
        if !self.points.is_empty() {
            self.restyle();
        }
    }

    pub fn is_visible(&self, index: usize) -> bool {
        if index >= self.points.len() {
            return false;
        }
        match (self.config.filter_policy, self.view.matches()) {
            (FilterPolicy::Hide, Some(indices)) => indices.contains(&index),
            _ => true,
        }
    }

    // ===== Selection =====

    fn valid_unique(&self, indices: &[usize]) -> Vec<usize> {
        let mut seen = HashSet::new();
        indices
            .iter()
            .copied()
            .filter(|&i| i < self.points.len() && seen.insert(i))
            .collect()
    }

    pub fn set_multi_select(&mut self, enabled: bool) {
        self.selection.multi_select = enabled;
    }

    pub fn hover(&mut self, index: Option<usize>) {
        self.selection.hovered = index.filter(|&i| i < self.points.len());
    }

    /// Select one point, replacing the selection unless multi-select is on.
    pub fn click(&mut self, index: usize) -> bool {
        self.select_point(index, self.selection.multi_select)
    }

    /// Add one point to the selection, leaving the multi-select mode as it is.
    pub fn add_to_selection(&mut self, index: usize) -> bool {
        self.select_point(index, true)
    }

    fn select_point(&mut self, index: usize, additive: bool) -> bool {
        if index >= self.points.len() {
            return false;
        }

        let camera = self.renderer.camera();
        if !additive {
            self.selection.selected.clear();
        }
        if !self.selection.selected.contains(&index) {
            self.selection.selected.push(index);
        }
        self.selection.primary = Some(index);
        self.renderer.select(&self.selection.selected);
        self.renderer.set_camera(camera);
        true
    }

    /// Select exactly `indices` (out-of-range entries are ignored) and enter
    /// multi-select. Returns how many points were selected.
    pub fn lasso(&mut self, indices: &[usize]) -> usize {
        let valid = self.valid_unique(indices);
        if valid.is_empty() {
            return 0;
        }

        let camera = self.renderer.camera();
        self.selection.multi_select = true;
        self.selection.primary = valid.last().copied();
        self.selection.selected = valid;
        self.renderer.select(&self.selection.selected);
        self.renderer.set_camera(camera);
        debug!(selected = self.selection.selected.len(), "lasso selection");
        self.selection.selected.len()
    }

    /// Lasso every visible point inside `polygon` (point space).
    pub fn lasso_path(&mut self, polygon: &[[f32; 2]]) -> usize {
        let Some((min, max)) = bounding_box(polygon) else {
            return 0;
        };
        let inside: Vec<usize> = (0..self.points.len())
            .filter(|&i| self.is_visible(i))
            .filter(|&i| {
                self.points.position(i).is_some_and(|p| {
                    p[0] >= min[0] && p[0] <= max[0] && p[1] >= min[1] && p[1] <= max[1] && point_in_polygon(p, polygon)
                })
            })
            .collect();
        self.lasso(&inside)
    }

    pub fn clear_selection(&mut self) {
        self.selection.selected.clear();
        self.selection.primary = None;
        self.renderer.deselect();
    }

    /// Nearest visible point within `radius` of `(x, y)`.
    pub fn point_at(&self, x: f32, y: f32, radius: f32) -> Option<usize> {
        let radius_sq = radius * radius;
        (0..self.points.len())
            .filter(|&i| self.is_visible(i))
            .filter_map(|i| {
                let [px, py] = self.points.position(i)?;
                let distance = (px - x).powi(2) + (py - y).powi(2);
                (distance <= radius_sq).then_some((i, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    // ===== Filtering =====

    /// Restrict the view to `indices` under the configured [`FilterPolicy`].
    /// An empty set resets the view. The camera does not move.
    pub fn apply_filter(&mut self, indices: &[usize]) {
        let matched = self.valid_unique(indices);
        if matched.is_empty() {
            self.reset_view();
            return;
        }
        let camera = self.renderer.camera();
        self.view = ViewMode::Filtered(matched);
        self.apply_view();
        self.renderer.set_camera(camera);
    }

    /// Like [`apply_filter`](Self::apply_filter), but matches are also enlarged.
    pub fn highlight_search(&mut self, indices: &[usize]) {
        let matched = self.valid_unique(indices);
        if matched.is_empty() {
            self.reset_view();
            return;
        }
        let camera = self.renderer.camera();
        self.view = ViewMode::Highlighted(matched);
        self.apply_view();
        self.renderer.set_camera(camera);
    }

    /// Highlight `indices` and frame the camera on their time extent.
    pub fn focus(&mut self, indices: &[usize]) -> Option<Camera> {
        let matched = self.valid_unique(indices);
        let scale = self.scale?;
        let (min, max) = matched.iter().fold((i64::MAX, i64::MIN), |(lo, hi), &i| {
            let ms = self.times[i].timestamp_millis();
            (lo.min(ms), hi.max(ms))
        });
        if matched.is_empty() {
            self.reset_view();
            return None;
        }

        self.view = ViewMode::Highlighted(matched);
        self.apply_view();

        let padding = (max - min) as f64 * FOCUS_PADDING;
        let from = scale.to_x(min as f64 - padding);
        let to = scale.to_x(max as f64 + padding);
        let mut camera = Camera::framing(from, to);
        if camera.distance < FOCUS_MIN_DISTANCE {
            camera = Camera::new(camera.target, FOCUS_MIN_DISTANCE);
        }
        self.renderer.set_camera(camera);
        Some(camera)
    }

    /// Back to all points with category colors; clears the selection, keeps the camera.
    pub fn reset_view(&mut self) {
        let camera = self.renderer.camera();
        self.view = ViewMode::All;
        self.selection.selected.clear();
        self.selection.primary = None;
        self.renderer.unfilter();
        self.renderer.deselect();
        self.styles = self.base_styles();
        self.renderer.set_style(&self.styles);
        self.renderer.set_camera(camera);
    }

    /// Point indices whose timestamp and sender match one of `rows`.
    ///
    /// Rows from a query are separate allocations, so they are matched by
    /// content rather than identity.
    pub fn indices_matching(&self, rows: &[Record]) -> Vec<usize> {
        let mut by_key: HashMap<(i64, String), Vec<usize>> = HashMap::new();
        for (i, (time, record)) in self.times.iter().zip(&self.records).enumerate() {
            by_key
                .entry((time.timestamp_millis(), record.sender_or_unknown()))
                .or_default()
                .push(i);
        }

        let mut indices: Vec<usize> = rows
            .iter()
            .filter_map(|row| {
                let time = row.timestamp_value().and_then(parse_timestamp)?;
                by_key.get(&(time.timestamp_millis(), row.sender_or_unknown()))
            })
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    // ===== Navigation =====

    /// Move the selection to the chronologically adjacent point.
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let current = self.primary_record()?;
        self.navigate_from(&current, direction)
    }

    /// Like [`navigate`](Self::navigate), starting from any record, which is
    /// located by identity, then exact timestamp, then nearest timestamp.
    pub fn navigate_from(&mut self, record: &RecordRef, direction: Direction) -> Option<usize> {
        let position = self.index.locate(record, &self.records)?;
        let target = self.index.step(position, direction)?;

        self.selection.selected = vec![target];
        self.selection.primary = Some(target);
        self.renderer.select(&self.selection.selected);

        if let Some(point) = self.points.position(target) {
            let camera = self.renderer.camera().centered_on(point);
            self.renderer.set_camera(camera);
        }
        Some(target)
    }

    // ===== Lifecycle =====

    pub fn on_resize(&mut self, width: u16, height: u16) {
        if !self.destroyed {
            self.renderer.resize(width, height);
        }
    }

    /// Cancel pending batches, free the point buffers and release the renderer.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if let Some(mut job) = self.job.take() {
            job.queue.cancel();
        }
        self.points.clear();
        self.records = Vec::new();
        self.times = Vec::new();
        self.styles = Vec::new();
        self.index = TimeIndex::default();
        self.scale = None;
        self.selection = SelectionState::default();
        self.view = ViewMode::All;
        self.renderer.destroy();
        self.destroyed = true;
        self.state = VizState::Idle;
        debug!("visualization destroyed");
    }
}

impl<R: Renderer> Drop for Visualization<R> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingRenderer {
        camera: Camera,
        draws: usize,
        drawn: usize,
        selected: Vec<usize>,
        filtered: Option<Vec<usize>>,
        styles: Vec<PointStyle>,
        size: (u16, u16),
        /// Mimic surfaces that jump to the selection on their own
        auto_frame: bool,
        destroyed: Arc<AtomicBool>,
    }

    impl Renderer for RecordingRenderer {
        fn draw(&mut self, frame: Frame<'_>) {
            self.draws += 1;
            self.drawn = frame.len();
            self.styles = frame.styles.to_vec();
        }

        fn camera(&self) -> Camera {
            self.camera
        }

        fn set_camera(&mut self, camera: Camera) {
            self.camera = camera;
        }

        fn select(&mut self, indices: &[usize]) {
            self.selected = indices.to_vec();
            if self.auto_frame {
                self.camera = Camera::new([5.0, 5.0], 0.1);
            }
        }

        fn deselect(&mut self) {
            self.selected.clear();
        }

        fn filter(&mut self, indices: &[usize]) {
            self.filtered = Some(indices.to_vec());
        }

        fn unfilter(&mut self) {
            self.filtered = None;
        }

        fn set_style(&mut self, styles: &[PointStyle]) {
            self.styles = styles.to_vec();
        }

        fn resize(&mut self, width: u16, height: u16) {
            self.size = (width, height);
        }

        fn destroy(&mut self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    fn record(date: &str, from: &str) -> RecordRef {
        Arc::new(Record::from_value(json!({ "date": date, "from": from, "text": "hi" })).unwrap())
    }

    fn many_records(n: usize) -> Vec<RecordRef> {
        (0..n)
            .map(|i| {
                let value = json!({
                    "date": 1_700_000_000_000i64 + i as i64 * 60_000,
                    "from": format!("user{}", i % 5),
                });
                Arc::new(Record::from_value(value).unwrap())
            })
            .collect()
    }

    fn viz_with(renderer: RecordingRenderer, config: VisualizationConfig) -> Visualization<RecordingRenderer> {
        Visualization::new(renderer, Arc::new(ColorService::new()), config)
    }

    fn viz() -> Visualization<RecordingRenderer> {
        viz_with(RecordingRenderer::default(), VisualizationConfig::default())
    }

    fn ready(records: Vec<RecordRef>) -> Visualization<RecordingRenderer> {
        let mut viz = viz();
        viz.load(records).unwrap();
        while viz.step() != TransformStatus::Complete {}
        viz
    }

    fn trio() -> Vec<RecordRef> {
        // Deliberately out of time order: T2, T3, T1
        vec![
            record("2024-03-02T12:00:00", "bob"),
            record("2024-03-03T12:00:00", "carol"),
            record("2024-03-01T12:00:00", "alice"),
        ]
    }

    // ===== Loading =====

    #[test]
    fn test_small_load_draws_once() {
        let mut records = trio();
        records.push(record("not a date", "dave"));

        let mut viz = viz();
        let summary = viz.load(records).unwrap();
        assert_eq!(summary, LoadSummary { total: 4, valid: 3, dropped: 1 });
        assert_eq!(viz.state(), VizState::Transforming);
        assert_eq!(viz.renderer().draws, 0);

        assert_eq!(viz.step(), TransformStatus::Complete);
        assert_eq!(viz.state(), VizState::Ready);
        assert_eq!(viz.renderer().draws, 1);
        assert_eq!(viz.renderer().drawn, 3);
        assert_eq!(viz.step(), TransformStatus::Idle);
    }

    #[test]
    fn test_streaming_load_draws_only_on_last_batch() {
        let mut viz = viz();
        viz.load(many_records(2_500)).unwrap();

        assert_eq!(viz.step(), TransformStatus::Pending { completed: 1, total: 3 });
        assert_eq!(viz.state(), VizState::StreamingDraw);
        assert_eq!(viz.step(), TransformStatus::Pending { completed: 2, total: 3 });
        assert_eq!(viz.renderer().draws, 0);
        assert_eq!(viz.step(), TransformStatus::Complete);
        assert_eq!(viz.renderer().draws, 1);
        assert_eq!(viz.renderer().drawn, 2_500);
        assert_eq!(viz.len(), 2_500);
    }

    #[test]
    fn test_new_load_cancels_pending_batches() {
        let mut viz = viz();
        viz.load(many_records(2_500)).unwrap();
        viz.step();
        let first = viz.transform_token().unwrap();

        viz.load(many_records(10)).unwrap();
        assert!(first.is_cancelled());
        assert_eq!(viz.step(), TransformStatus::Complete);
        assert_eq!(viz.len(), 10);
        assert_eq!(viz.renderer().draws, 1);
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let mut viz = viz();
        viz.load(many_records(2_500)).unwrap();
        assert_eq!(viz.run_to_completion().await, TransformStatus::Complete);
        assert_eq!(viz.state(), VizState::Ready);
        assert_eq!(viz.renderer().draws, 1);
    }

    #[test]
    fn test_external_cancel_stops_transform() {
        let mut viz = viz();
        viz.load(many_records(2_500)).unwrap();
        viz.step();
        viz.transform_token().unwrap().cancel();
        assert_eq!(viz.step(), TransformStatus::Cancelled);
        assert_eq!(viz.state(), VizState::Idle);
        assert_eq!(viz.renderer().draws, 0);
    }

    #[test]
    fn test_no_valid_timestamps_is_validation_error() {
        let mut viz = viz();
        let err = viz.load(vec![record("garbage", "a"), record("", "b")]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(viz.state(), VizState::Idle);
    }

    #[test]
    fn test_x_is_monotonic_in_time_and_y_in_range() {
        let mut records = many_records(300);
        records.reverse();
        let viz = ready(records);

        let mut order: Vec<usize> = (0..viz.len()).collect();
        order.sort_by_key(|&i| viz.times[i]);
        let xs: Vec<f32> = order.iter().map(|&i| viz.points.xs()[i]).collect();
        assert!(xs.windows(2).all(|w| w[0] <= w[1]));
        assert!(xs[0] > -1.0 && xs[xs.len() - 1] < 1.0, "padding keeps points off the edges");
        assert!(viz.points.ys().iter().all(|y| (-1.0..=1.0).contains(y)));
    }

    #[test]
    fn test_single_instant_maps_to_center() {
        let viz = ready(vec![record("2024-01-01T00:00:00", "a"), record("2024-01-01T00:00:00", "b")]);
        assert!(viz.points.xs().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_jitter_is_reproducible() {
        let a = ready(many_records(50));
        let b = ready(many_records(50));
        assert_eq!(a.points.ys(), b.points.ys());
    }

    #[test]
    fn test_categories_follow_color_assignment() {
        let viz = ready(trio());
        let legend = viz.legend();
        let labels: Vec<&str> = legend.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["alice", "bob", "carol"]);
        // bob is record 0
        assert_eq!(viz.points.category(0), Some(1));
        assert_eq!(viz.renderer().styles[0].color, legend[1].1);
    }

    // ===== Selection =====

    #[test]
    fn test_click_replaces_selection_and_keeps_camera() {
        let renderer = RecordingRenderer {
            auto_frame: true,
            ..RecordingRenderer::default()
        };
        let mut viz = viz_with(renderer, VisualizationConfig::default());
        viz.load(trio()).unwrap();
        viz.step();
        let before = viz.camera();

        assert!(viz.click(0));
        assert!(viz.click(1));
        assert_eq!(viz.selection().selected, vec![1]);
        assert_eq!(viz.camera(), before);

        viz.set_multi_select(true);
        viz.click(2);
        viz.click(2);
        assert_eq!(viz.selection().selected, vec![1, 2]);
        assert_eq!(viz.selection().primary, Some(2));
        assert!(!viz.click(42));
    }

    #[test]
    fn test_add_to_selection_keeps_mode() {
        let mut viz = viz_with(RecordingRenderer::default(), VisualizationConfig::default());
        viz.load(trio()).unwrap();
        viz.step();

        viz.click(0);
        assert!(viz.add_to_selection(1));
        assert_eq!(viz.selection().selected, vec![0, 1]);
        assert!(!viz.selection().multi_select);

        viz.click(2);
        assert_eq!(viz.selection().selected, vec![2]);
    }

    #[test]
    fn test_lasso_then_reset() {
        let renderer = RecordingRenderer {
            auto_frame: true,
            camera: Camera::new([0.3, -0.2], 0.4),
            ..RecordingRenderer::default()
        };
        let mut viz = viz_with(renderer, VisualizationConfig::default());
        viz.load(trio()).unwrap();
        viz.step();
        let original_styles = viz.renderer().styles.clone();
        let before = viz.camera();

        assert_eq!(viz.lasso(&[2, 0, 2, 99]), 2);
        assert_eq!(viz.selection().selected, vec![2, 0]);
        assert_eq!(viz.selection().primary, Some(0));
        assert!(viz.selection().multi_select);
        assert_eq!(viz.camera(), before);
        let selected: Vec<_> = viz.selected_records();
        assert!(Arc::ptr_eq(&selected[0], viz.record(2).unwrap()));

        viz.highlight_search(&[1]);
        viz.reset_view();
        assert!(viz.selection().selected.is_empty());
        assert_eq!(viz.renderer().filtered, None);
        assert_eq!(viz.renderer().styles, original_styles);
        assert_eq!(viz.camera(), before);
    }

    #[test]
    fn test_lasso_path_selects_points_inside() {
        let mut viz = ready(trio());
        let target = viz.position(1).unwrap();
        let polygon = [
            [target[0] - 0.05, target[1] - 0.05],
            [target[0] + 0.05, target[1] - 0.05],
            [target[0] + 0.05, target[1] + 0.05],
            [target[0] - 0.05, target[1] + 0.05],
        ];
        assert_eq!(viz.lasso_path(&polygon), 1);
        assert_eq!(viz.selection().selected, vec![1]);
    }

    #[test]
    fn test_point_at_finds_nearest() {
        let viz = ready(trio());
        let [x, y] = viz.position(2).unwrap();
        assert_eq!(viz.point_at(x + 0.001, y, 0.01), Some(2));
        assert_eq!(viz.point_at(5.0, 5.0, 0.01), None);
    }

    // ===== Filtering =====

    #[test]
    fn test_dim_policy_keeps_points_rendered() {
        let mut viz = ready(trio());
        viz.apply_filter(&[0]);

        let styles = &viz.renderer().styles;
        assert_eq!(viz.renderer().filtered, None);
        assert_eq!(styles[0].opacity, viz.config().opacity);
        assert_eq!(styles[1].opacity, viz.config().opacity_dimmed);
        assert_eq!(viz.matches(), Some(&[0][..]));
    }

    #[test]
    fn test_hide_policy_filters_renderer() {
        let config = VisualizationConfig {
            filter_policy: FilterPolicy::Hide,
            ..VisualizationConfig::default()
        };
        let mut viz = viz_with(RecordingRenderer::default(), config);
        viz.load(trio()).unwrap();
        viz.step();

        viz.apply_filter(&[2, 0]);
        assert_eq!(viz.renderer().filtered, Some(vec![2, 0]));
        assert!(!viz.is_visible(1));
        // Hidden points cannot be picked
        let [x, y] = viz.position(1).unwrap();
        assert_eq!(viz.point_at(x, y, 0.001), None);
    }

    #[test]
    fn test_highlight_enlarges_matches() {
        let mut viz = ready(trio());
        let camera = viz.camera();
        viz.highlight_search(&[1]);

        let styles = &viz.renderer().styles;
        assert_eq!(styles[1].size, viz.config().point_size_highlighted);
        assert_eq!(styles[1].opacity, 1.0);
        assert_eq!(styles[0].size, viz.config().point_size);
        assert_eq!(styles[0].opacity, viz.config().opacity_dimmed);
        assert_eq!(viz.camera(), camera);
    }

    #[test]
    fn test_empty_filter_resets_and_keeps_camera() {
        let mut viz = ready(trio());
        viz.set_camera(Camera::new([0.5, 0.5], 0.25));
        viz.apply_filter(&[0]);
        viz.apply_filter(&[]);
        assert_eq!(viz.matches(), None);
        assert_eq!(viz.camera(), Camera::new([0.5, 0.5], 0.25));
    }

    #[test]
    fn test_focus_frames_matched_extent() {
        let mut viz = ready(many_records(100));
        let camera = viz.focus(&[10, 20]).unwrap();
        let x10 = viz.position(10).unwrap()[0];
        let x20 = viz.position(20).unwrap()[0];

        assert!((camera.target[0] - (x10 + x20) / 2.0).abs() < 1e-4);
        assert!(camera.distance > (x20 - x10) / 2.0);
        assert_eq!(viz.renderer().camera, camera);
        assert!(viz.focus(&[]).is_none());
    }

    #[test]
    fn test_theme_switch_recolors() {
        let mut viz = ready(trio());
        let dark = viz.renderer().styles[0].color;
        viz.set_theme(Theme::Light);
        assert_ne!(viz.renderer().styles[0].color, dark);
    }

    #[test]
    fn test_indices_matching_by_time_and_sender() {
        let viz = ready(trio());
        let rows = vec![
            Record::from_value(json!({ "date": "2024-03-03T12:00:00", "sender": "carol" })).unwrap(),
            Record::from_value(json!({ "date": "2024-03-03T12:00:00", "sender": "mallory" })).unwrap(),
        ];
        assert_eq!(viz.indices_matching(&rows), vec![1]);
    }

    // ===== Navigation =====

    #[test]
    fn test_navigation_wraps_in_time_order() {
        let mut viz = ready(trio());
        // Indices: 0 = T2, 1 = T3, 2 = T1
        viz.click(0);

        assert_eq!(viz.navigate(Direction::Next), Some(1));
        assert_eq!(viz.camera().target, viz.position(1).unwrap());
        assert_eq!(viz.navigate(Direction::Next), Some(2));
        assert_eq!(viz.navigate(Direction::Previous), Some(1));
        assert_eq!(viz.selection().selected, vec![1]);
    }

    #[test]
    fn test_navigate_from_foreign_record() {
        let mut viz = ready(trio());
        let probe = record("2024-03-02T11:00:00", "nobody");
        assert_eq!(viz.navigate_from(&probe, Direction::Next), Some(1));
    }

    #[test]
    fn test_navigate_without_selection_is_noop() {
        let mut viz = ready(trio());
        assert_eq!(viz.navigate(Direction::Next), None);
    }

    // ===== Lifecycle =====

    #[test]
    fn test_destroy_cancels_and_releases() {
        let mut viz = viz();
        viz.load(many_records(2_500)).unwrap();
        viz.step();
        let token = viz.transform_token().unwrap();

        viz.on_resize(80, 24);
        assert_eq!(viz.renderer().size, (80, 24));

        viz.destroy();
        assert!(token.is_cancelled());
        assert!(viz.renderer().destroyed.load(Ordering::SeqCst));
        assert!(viz.is_empty());
        assert!(viz.load(many_records(1)).is_err());
    }

    #[test]
    fn test_drop_releases_renderer() {
        let flag = Arc::new(AtomicBool::new(false));
        let renderer = RecordingRenderer {
            destroyed: Arc::clone(&flag),
            ..RecordingRenderer::default()
        };
        drop(viz_with(renderer, VisualizationConfig::default()));
        assert!(flag.load(Ordering::SeqCst));
    }
}

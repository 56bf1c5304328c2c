use std::sync::Arc;

use chatscope_core::color::Theme;
use chatscope_core::storage::{FetchOptions, FetchProgress};
use chatscope_core::viz::{Camera, Direction, TransformStatus, Visualization};
use chatscope_core::{LoadReport, SearchFilters, SearchReport, SnapshotPipeline};
use ratatui::layout::Rect;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::canvas::CanvasRenderer;

/// Results of background work, delivered to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    Progress(FetchProgress),
    Loaded(LoadReport),
    Searched { term: String, report: SearchReport },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Filters,
}

/// Editable filter fields, in display order.
pub const FILTER_FIELDS: [&str; 4] = ["From (YYYY-MM-DD)", "To (YYYY-MM-DD)", "Sender", "Chat"];

#[derive(Debug, Clone, Default)]
pub struct FilterForm {
    pub values: [String; 4],
    pub focused: usize,
}

impl FilterForm {
    pub fn to_filters(&self) -> SearchFilters {
        SearchFilters::new()
            .with_date_range(self.values[0].clone(), self.values[1].clone())
            .with_sender(self.values[2].clone())
            .with_chat(self.values[3].clone())
    }

    pub fn focused_mut(&mut self) -> &mut String {
        &mut self.values[self.focused]
    }

    pub fn focus_next(&mut self) {
        self.focused = (self.focused + 1) % self.values.len();
    }

    pub fn focus_prev(&mut self) {
        self.focused = (self.focused + self.values.len() - 1) % self.values.len();
    }

    pub fn clear(&mut self) {
        self.values = Default::default();
    }
}

pub struct App {
    pub running: bool,
    pub pending_quit: bool,
    pub mode: InputMode,
    pub viz: Visualization<CanvasRenderer>,
    pub term: String,
    pub filters: FilterForm,
    pub loading: bool,
    pub searching: bool,
    pub error: Option<String>,
    pub status: Option<String>,
    pub progress: Option<FetchProgress>,
    pub transform: TransformStatus,
    pub match_count: Option<usize>,
    /// Canvas area from the last render, for mouse mapping
    pub canvas_area: Rect,
    /// Lasso path in world coordinates while dragging
    pub drag: Option<Vec<[f32; 2]>>,
    /// The press that started the drag held Shift
    drag_additive: bool,
    pipeline: Arc<SnapshotPipeline>,
    fetch: FetchOptions,
    events_tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        pipeline: Arc<SnapshotPipeline>,
        fetch: FetchOptions,
    ) -> (Self, UnboundedReceiver<AppEvent>) {
        let config = pipeline.config().viz.clone();
        let renderer = CanvasRenderer::new(config.point_size, config.theme);
        let viz = Visualization::new(renderer, Arc::clone(pipeline.colors()), config);
        let (events_tx, events_rx) = unbounded_channel();

        let app = Self {
            running: true,
            pending_quit: false,
            mode: InputMode::Normal,
            viz,
            term: String::new(),
            filters: FilterForm::default(),
            loading: false,
            searching: false,
            error: None,
            status: None,
            progress: None,
            transform: TransformStatus::Idle,
            match_count: None,
            canvas_area: Rect::default(),
            drag: None,
            drag_additive: false,
            pipeline,
            fetch,
            events_tx,
        };
        (app, events_rx)
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn theme(&self) -> Theme {
        self.viz.config().theme
    }

    // ===== Background work =====

    /// Start a snapshot load; `force_fresh` bypasses and clears the cache.
    pub fn start_load(&mut self, force_fresh: bool) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.error = None;
        self.progress = None;
        self.set_status(if force_fresh { "Refetching snapshot…" } else { "Loading snapshot…" });

        let (progress_tx, mut progress_rx) = unbounded_channel();
        let options = FetchOptions {
            force_fresh: force_fresh || self.fetch.force_fresh,
            progress: Some(progress_tx),
            ..self.fetch.clone()
        };
        // Fresh fetch applies to the first load only
        self.fetch.force_fresh = false;

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                if events.send(AppEvent::Progress(progress)).is_err() {
                    break;
                }
            }
        });

        let pipeline = Arc::clone(&self.pipeline);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let report = pipeline.load(options).await;
            let _ = events.send(AppEvent::Loaded(report));
        });
    }

    /// Run the current term and filters against the loaded table.
    pub fn start_search(&mut self) {
        let term = self.term.trim().to_string();
        let filters = self.filters.to_filters();
        if term.is_empty() && filters.is_empty() {
            self.match_count = None;
            self.viz.reset_view();
            self.set_status("Showing all messages");
            return;
        }

        self.searching = true;
        let pipeline = Arc::clone(&self.pipeline);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let report = pipeline.search(&term, &filters).await;
            let _ = events.send(AppEvent::Searched { term, report });
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Progress(progress) => self.progress = Some(progress),
            AppEvent::Loaded(report) => self.on_loaded(report),
            AppEvent::Searched { term, report } => self.on_searched(&term, report),
        }
    }

    fn on_loaded(&mut self, report: LoadReport) {
        self.loading = false;
        self.progress = None;
        if !report.success {
            self.error = report.error.or_else(|| Some("Snapshot load failed".to_string()));
            return;
        }

        self.match_count = None;
        match self.viz.load(report.rows) {
            Ok(summary) => {
                info!(valid = summary.valid, dropped = summary.dropped, "records handed to visualization");
                let source = report.source.map(|s| format!("{s:?}").to_lowercase()).unwrap_or_default();
                let dropped = if summary.dropped > 0 {
                    format!(" ({} without timestamp skipped)", summary.dropped)
                } else {
                    String::new()
                };
                self.set_status(format!("{} points from {source}{dropped}", summary.valid));
            }
            Err(e) => {
                warn!(error = %e, "visualization rejected snapshot");
                self.error = Some(e.to_string());
            }
        }
    }

    fn on_searched(&mut self, term: &str, report: SearchReport) {
        self.searching = false;
        if !report.success {
            self.error = report.error.or_else(|| Some("Search failed".to_string()));
            return;
        }
        self.error = None;

        let indices = self.viz.indices_matching(&report.matches);
        debug!(term, rows = report.matches.len(), points = indices.len(), "search mapped to points");
        if term.is_empty() {
            self.viz.apply_filter(&indices);
        } else {
            self.viz.highlight_search(&indices);
        }
        self.match_count = Some(indices.len());

        let capped = if report.truncated { " (capped)" } else { "" };
        self.set_status(format!("{} matching messages{capped}", report.matches.len()));
    }

    /// Advance the streaming transform by one batch.
    pub fn tick(&mut self) {
        match self.viz.step() {
            TransformStatus::Idle => {}
            TransformStatus::Complete | TransformStatus::Cancelled => self.transform = TransformStatus::Idle,
            pending => self.transform = pending,
        }
    }

    /// Keep the surface size in sync with the last rendered canvas area.
    pub fn set_canvas_area(&mut self, area: Rect) {
        if area != self.canvas_area {
            self.canvas_area = area;
            self.viz.on_resize(area.width, area.height);
        }
    }

    // ===== Interaction =====

    pub fn navigate(&mut self, direction: Direction) {
        if self.viz.navigate(direction).is_none() {
            self.set_status("Select a point first");
        }
    }

    pub fn focus_matches(&mut self) {
        let Some(indices) = self.viz.matches().map(<[usize]>::to_vec) else {
            self.set_status("No search results to focus");
            return;
        };
        self.viz.focus(&indices);
    }

    pub fn reset_view(&mut self) {
        self.match_count = None;
        self.viz.reset_view();
    }

    pub fn zoom(&mut self, factor: f32) {
        let camera = self.viz.camera().zoomed(factor);
        self.viz.set_camera(camera);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        let camera = self.viz.camera().panned(dx, dy);
        self.viz.set_camera(camera);
    }

    pub fn home_camera(&mut self) {
        self.viz.set_camera(Camera::default());
    }

    pub fn toggle_multi_select(&mut self) {
        let enabled = !self.viz.selection().multi_select;
        self.viz.set_multi_select(enabled);
        self.set_status(if enabled { "Multi-select on" } else { "Multi-select off" });
    }

    pub fn toggle_theme(&mut self) {
        let theme = match self.theme() {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        };
        self.viz.renderer_mut().set_theme(theme);
        self.viz.set_theme(theme);
    }

    pub fn point_under(&self, column: u16, row: u16) -> Option<usize> {
        let renderer = self.viz.renderer();
        let [x, y] = renderer.to_world(self.canvas_area, column, row)?;
        self.viz.point_at(x, y, renderer.pick_radius(self.canvas_area))
    }

    /// Start a press; `additive` presses add to the selection on release.
    pub fn begin_drag(&mut self, column: u16, row: u16, additive: bool) {
        self.drag_additive = additive;
        self.drag = self
            .viz
            .renderer()
            .to_world(self.canvas_area, column, row)
            .map(|point| vec![point]);
    }

    pub fn extend_drag(&mut self, column: u16, row: u16) {
        let point = self.viz.renderer().to_world(self.canvas_area, column, row);
        if let (Some(path), Some(point)) = (self.drag.as_mut(), point) {
            if path.last() != Some(&point) {
                path.push(point);
            }
        }
    }

    /// Finish a press: a path of three or more cells is a lasso, anything else a click.
    pub fn end_drag(&mut self, column: u16, row: u16) {
        let path = self.drag.take().unwrap_or_default();
        let additive = std::mem::take(&mut self.drag_additive);
        if path.len() >= 3 {
            let count = self.viz.lasso_path(&path);
            self.set_status(format!("{count} points lassoed"));
        } else if let Some(index) = self.point_under(column, row) {
            self.select_point(index, additive);
        } else if !additive && !self.viz.selection().multi_select {
            self.viz.clear_selection();
        }
    }

    fn select_point(&mut self, index: usize, additive: bool) {
        if additive {
            self.viz.add_to_selection(index);
        } else {
            self.viz.click(index);
        }
    }
}

//! One open file and everything a viewer keeps about it.
//!
//! The session owns the buffered window, the background loader, the active
//! filters, collapse mode and the page table. All state changes go through
//! `&mut self`; background work reports back over channels that are drained
//! by [`ViewerSession::poll`].

use crate::buffer::{BackgroundLoader, Delivery, FileWindow, LoaderEvent};
use crate::collapse::{CollapseEngine, DisplayRow};
use crate::config::Settings;
use crate::error::{Result, ViewerError};
use crate::filter::pipeline::{self, CompiledFilter, FilteredView};
use crate::filter::state::{FilterField, FilterState};
use crate::mutate::export_records;
use crate::pagination::task::{Generation, PageCalculation, PageEvent};
use crate::pagination::{JumpResolution, PageCount, PagePlanner, PageRange, PageTable};
use crate::protocol::{jump_window_start, parse_target_time, percent, LoadStage, Response};
use crate::reader::{LineScanner, LineSource};
use crate::record::{LogRecord, SharedRecord};
use crate::stats::{StatisticsSnapshot, StatisticsSummary};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What happened to a filter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The view now shows `matched` records.
    Applied { matched: usize },
    /// The filter needs the whole file; it takes effect once loading completes.
    Deferred,
}

/// A displayed row that owns its records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PageRow {
    Line(LogRecord),
    Group {
        pattern_length: usize,
        repeat_count: usize,
        first_line_number: usize,
        last_line_number: usize,
        pattern: Vec<LogRecord>,
    },
}

impl PageRow {
    fn from_display(row: &DisplayRow<'_>) -> Self {
        match row {
            DisplayRow::Line(record) => PageRow::Line(LogRecord::clone(record)),
            DisplayRow::Group(group) => PageRow::Group {
                pattern_length: group.pattern_length,
                repeat_count: group.repeat_count,
                first_line_number: group.first_line_number(),
                last_line_number: group.last_line_number(),
                pattern: group.pattern().iter().map(|r| LogRecord::clone(r)).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub page: usize,
    pub page_count: PageCount,
    /// View indices covered by this page.
    pub range: PageRange,
    pub rows: Vec<PageRow>,
}

pub struct ViewerSession {
    name: String,
    source: Arc<dyn LineSource>,
    settings: Settings,
    total_lines: usize,
    window: FileWindow,
    loader: Option<BackgroundLoader>,
    filter: FilterState,
    /// Filter waiting for the whole file to be buffered.
    filter_pending: bool,
    view: FilteredView,
    collapse: Option<CollapseEngine>,
    planner: PagePlanner,
    pages: PageTable,
    generation: Generation,
    page_task: Option<PageCalculation>,
    current_page: usize,
    stats: Option<StatisticsSnapshot>,
}

impl ViewerSession {
    /// Open `path` and load its first window.
    ///
    /// Returns the session with the `fileLoaded` response for the host.
    pub fn open(path: &Path, settings: Settings) -> Result<(Self, Response)> {
        let scanner = LineScanner::open(path)?;
        let file_size = scanner.file_size()?;
        let name = scanner.file_name();
        let session = Self::from_source(name, Arc::new(scanner), settings)?;
        let response = session.loaded_response(file_size);
        Ok((session, response))
    }

    /// Build a session over any line source.
    ///
    /// Sources with at most `full_load_threshold` lines are read whole;
    /// larger ones get `initial_window` lines and a background loader for
    /// the rest.
    pub fn from_source(
        name: impl Into<String>,
        source: Arc<dyn LineSource>,
        settings: Settings,
    ) -> Result<Self> {
        let total_lines = source.total_lines()?;
        let initial = if total_lines <= settings.full_load_threshold {
            total_lines
        } else {
            settings.initial_window
        };
        let records = source.read_range(0, initial)?;
        let window = FileWindow::with_records(0, records);
        let view = FilteredView::identity(window.records());

        let mut session = Self {
            name: name.into(),
            source,
            planner: PagePlanner::new(settings.page_size),
            settings,
            total_lines,
            window,
            loader: None,
            filter: FilterState::default(),
            filter_pending: false,
            view,
            collapse: None,
            pages: PageTable::default(),
            generation: Generation::new(),
            page_task: None,
            current_page: 1,
            stats: None,
        };
        session.start_loader();
        log::debug!(
            "opened {}: {} lines, {} buffered",
            session.name,
            session.total_lines,
            session.window.len()
        );
        Ok(session)
    }

    fn loaded_response(&self, file_size: u64) -> Response {
        Response::FileLoaded {
            file_name: self.name.clone(),
            file_size,
            total_lines: self.total_lines,
            lines: clone_records(self.window.records()),
            all_loaded: self.is_fully_loaded(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn window(&self) -> &FileWindow {
        &self.window
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn is_filter_pending(&self) -> bool {
        self.filter_pending
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapse.is_some()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_table(&self) -> &PageTable {
        &self.pages
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.window.covers_file(self.total_lines)
    }

    /// True while the loader or a page calculation is still running.
    pub fn is_busy(&self) -> bool {
        self.loader.is_some() || self.page_task.is_some()
    }

    /// Spawn a loader for whatever follows the window, if anything does.
    fn start_loader(&mut self) {
        self.loader = None;
        let from = self.window.end();
        if from >= self.total_lines {
            return;
        }
        self.loader = Some(BackgroundLoader::spawn(
            Arc::clone(&self.source),
            from,
            self.total_lines,
            self.settings.loader_config(),
        ));
    }

    /// Make sure the loader will eventually buffer the whole file.
    ///
    /// A window rebased away from line 1 is dropped and reloaded from the start.
    fn ensure_full_load(&mut self) {
        if self.is_fully_loaded() {
            return;
        }
        if self.window.base_offset() > 0 {
            log::debug!(
                "window starts at line {}; reloading {} from the start",
                self.window.base_offset() + 1,
                self.name
            );
            self.window.clear();
            self.stats = None;
            self.start_loader();
        } else if self.loader.is_none() {
            self.start_loader();
        }
    }

    /// Drain background events and apply them. Returns the messages a host
    /// would forward to its view.
    pub fn poll(&mut self) -> Vec<Response> {
        let mut out = Vec::new();
        self.drain_loader(&mut out);
        self.drain_pages(&mut out);
        out
    }

    fn drain_loader(&mut self, out: &mut Vec<Response>) {
        let mut window_changed = false;
        let mut finished = false;

        while let Some(event) = self.loader.as_mut().and_then(|l| l.try_next()) {
            match event {
                LoaderEvent::Chunk { start, records } => {
                    out.push(Response::MoreLines {
                        start_line: start,
                        lines: records.clone(),
                    });
                    match self.window.deliver(start, records) {
                        Delivery::Appended { count } => {
                            if let Some(stats) = self.stats.as_mut() {
                                let new = &self.window.records()[self.window.len() - count..];
                                stats.extend(new.iter().map(|r| r.as_ref()));
                            }
                        }
                        Delivery::Rebased { .. } => self.stats = None,
                    }
                    out.push(Response::LoadingProgress {
                        progress: percent(self.window.end(), self.total_lines),
                        current: self.window.end(),
                        total: self.total_lines,
                        stage: LoadStage::Lines,
                    });
                    window_changed = true;
                }
                LoaderEvent::Complete { loaded } => {
                    log::debug!("background load of {} finished at line {}", self.name, loaded);
                    finished = true;
                }
                LoaderEvent::Error(message) => {
                    log::warn!("background load of {} failed: {}", self.name, message);
                    out.push(Response::Error {
                        kind: "io".to_string(),
                        message,
                    });
                    if self.filter_pending {
                        // The rest of the file will not arrive; filter what there is.
                        log::warn!(
                            "applying filter to the {} buffered lines of {}",
                            self.window.len(),
                            self.name
                        );
                        self.filter_pending = false;
                        self.current_page = 1;
                        window_changed = true;
                    }
                    finished = true;
                }
            }
        }

        if finished || self.loader.as_ref().is_some_and(|l| l.is_finished()) {
            self.loader = None;
        }
        if window_changed {
            if let Err(err) = self.refresh_view() {
                out.push(Response::error(&err));
            }
        }
    }

    fn drain_pages(&mut self, out: &mut Vec<Response>) {
        let current = self.generation.current();
        while let Some(event) = self.page_task.as_mut().and_then(|t| t.try_next()) {
            match event {
                PageEvent::Batch {
                    generation,
                    pages,
                    progress,
                } => {
                    if generation != current {
                        log::debug!("dropping page batch from stale generation {}", generation);
                        continue;
                    }
                    let mut last = 0;
                    for (page, range) in pages {
                        self.pages.insert(page, range);
                        last = page;
                    }
                    out.push(Response::LoadingProgress {
                        progress,
                        current: last,
                        total: self.page_count().pages,
                        stage: LoadStage::Pages,
                    });
                }
                PageEvent::Complete {
                    generation,
                    total_pages,
                } => {
                    if generation == current {
                        out.push(Response::LoadingProgress {
                            progress: 100,
                            current: total_pages,
                            total: total_pages,
                            stage: LoadStage::Pages,
                        });
                    }
                }
                PageEvent::Error(message) => {
                    log::warn!("page calculation failed: {}", message);
                    out.push(Response::Error {
                        kind: "io".to_string(),
                        message,
                    });
                }
            }
        }
        if self.page_task.as_ref().is_some_and(|t| t.is_finished()) {
            self.page_task = None;
        }
    }

    /// Poll until background work settles or `timeout` elapses.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> Vec<Response> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        loop {
            out.extend(self.poll());
            if !self.is_busy() || Instant::now() >= deadline {
                return out;
            }
            thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    /// Recompute the view from the window after the window changed.
    fn refresh_view(&mut self) -> Result<()> {
        if self.filter_pending && self.is_fully_loaded() {
            self.filter_pending = false;
            self.current_page = 1;
        }
        self.view = if self.filter_pending {
            FilteredView::identity(self.window.records())
        } else {
            pipeline::apply(&self.filter, self.window.records())?
        };
        self.invalidate_pages();
        Ok(())
    }

    /// Drop every computed page and, in collapse mode, start computing anew.
    fn invalidate_pages(&mut self) {
        self.generation.bump();
        self.pages.clear();
        self.page_task = None;

        if let Some(engine) = self.collapse {
            self.page_task = Some(PageCalculation::spawn(
                self.view.snapshot(),
                self.planner,
                engine,
                1,
                0,
                self.generation.ticket(),
                self.settings.page_task_config(),
            ));
        }
    }

    /// Replace the active filters.
    ///
    /// A malformed keyword pattern is rejected before anything changes. A
    /// non-empty filter over a partially buffered file is deferred until the
    /// whole file has been loaded.
    pub fn set_filter(&mut self, state: FilterState) -> Result<FilterOutcome> {
        let state = state.normalized();
        CompiledFilter::compile(&state)?;
        self.filter = state;
        self.current_page = 1;

        if !self.filter.is_identity() && !self.is_fully_loaded() {
            self.filter_pending = true;
            self.ensure_full_load();
            self.view = FilteredView::identity(self.window.records());
            self.invalidate_pages();
            log::debug!("filter on {} deferred until fully loaded", self.name);
            return Ok(FilterOutcome::Deferred);
        }

        self.filter_pending = false;
        self.refresh_view()?;
        Ok(FilterOutcome::Applied {
            matched: self.view.len(),
        })
    }

    pub fn clear_filter_field(&mut self, field: FilterField) -> Result<FilterOutcome> {
        let mut state = self.filter.clone();
        state.clear(field);
        self.set_filter(state)
    }

    pub fn clear_filters(&mut self) -> Result<FilterOutcome> {
        self.set_filter(FilterState::default())
    }

    /// Turn collapse mode on or off. Changing it resets to page 1.
    pub fn set_collapse(&mut self, enabled: bool) {
        if enabled == self.collapse.is_some() {
            return;
        }
        self.collapse =
            enabled.then(|| CollapseEngine::new(self.settings.collapse_min_repeat_count));
        self.current_page = 1;
        self.invalidate_pages();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size.max(1) == self.planner.page_size() {
            return;
        }
        self.planner = PagePlanner::new(page_size);
        self.settings.page_size = self.planner.page_size();
        self.current_page = 1;
        self.invalidate_pages();
    }

    pub fn page_count(&self) -> PageCount {
        let collapsed = self.collapse.is_some();
        let file_lines = (!collapsed && !self.view.is_filtered() && self.window.base_offset() > 0)
            .then_some(self.total_lines);
        self.planner
            .page_count(&self.pages, self.view.len(), collapsed, file_lines)
    }

    /// Select page `page`, computing any missing collapse pages before it.
    pub fn go_to_page(&mut self, page: usize) -> Result<PageRange> {
        let range = self
            .planner
            .page_range(&mut self.pages, page, self.view.records(), self.collapse.as_ref())
            .ok_or_else(|| ViewerError::InvalidArgument(format!("page {} is out of range", page)))?;
        self.current_page = page;
        Ok(range)
    }

    /// The rows of the current page.
    pub fn render_page(&mut self) -> RenderedPage {
        let page = self.current_page;
        let range = self
            .planner
            .page_range(&mut self.pages, page, self.view.records(), self.collapse.as_ref())
            .unwrap_or(PageRange { start: 0, end: 0 });
        let slice = &self.view.records()[range.start..range.end];
        let rows = match &self.collapse {
            Some(engine) => engine
                .collapse(slice)
                .iter()
                .map(PageRow::from_display)
                .collect(),
            None => slice.iter().map(|r| PageRow::Line(LogRecord::clone(r))).collect(),
        };
        RenderedPage {
            page,
            page_count: self.page_count(),
            range,
            rows,
        }
    }

    /// Select the page showing `line_number` (1-based).
    ///
    /// A line hidden by the filters clears them. A line outside the buffered
    /// window rebases the window half a page above it and restarts the loader
    /// from the window's end. Only a line past the end of the file resolves
    /// to an estimated page.
    pub fn jump_to_line(&mut self, line_number: usize) -> Result<JumpResolution> {
        let resolution = self.resolve_line(line_number);
        if resolution.exact || line_number == 0 || line_number > self.total_lines {
            if !resolution.exact {
                log::warn!(
                    "line {} is past the end of {}; page {} is an estimate",
                    line_number,
                    self.name,
                    resolution.page
                );
            }
            self.current_page = resolution.page;
            return Ok(resolution);
        }

        if self.window.contains_line(line_number) {
            log::debug!("line {} is filtered out; clearing filters", line_number);
            self.filter = FilterState::default();
            self.filter_pending = false;
            self.refresh_view()?;
        } else {
            let start = jump_window_start(line_number - 1, self.planner.page_size());
            self.rebase_window(start)?;
        }

        let resolution = self.resolve_line(line_number);
        self.current_page = resolution.page;
        Ok(resolution)
    }

    fn resolve_line(&mut self, line_number: usize) -> JumpResolution {
        self.planner.resolve_line(
            &mut self.pages,
            self.view.records(),
            line_number,
            self.collapse.as_ref(),
        )
    }

    /// Replace the window with `initial_window` lines from 0-based `start`,
    /// clear the filters and continue loading from the new window's end.
    fn rebase_window(&mut self, start: usize) -> Result<Vec<LogRecord>> {
        let records = self.source.read_range(start, self.settings.initial_window)?;
        let lines = records.clone();
        log::debug!(
            "rebasing window of {} to line {} ({} lines)",
            self.name,
            start + 1,
            records.len()
        );

        self.loader = None;
        self.window.replace(start, records);
        self.stats = None;
        self.filter = FilterState::default();
        self.filter_pending = false;
        self.current_page = 1;
        self.refresh_view()?;
        self.start_loader();
        Ok(lines)
    }

    /// Move the window to the first record at or after `time`.
    ///
    /// The window is rebased to start half a page above the target and the
    /// loader continues from its end. Active filters are cleared.
    pub fn jump_to_time(&mut self, time: &str) -> Result<Response> {
        let target = parse_target_time(time)?;
        let Some(found) = self.source.find_first_at_or_after(target)? else {
            return Ok(Response::JumpToTimeResult {
                success: false,
                target_line_number: None,
                lines: Vec::new(),
                start_line: 0,
            });
        };

        let start = jump_window_start(found.index(), self.planner.page_size());
        let lines = self.rebase_window(start)?;
        self.jump_to_line(found.line_number)?;

        Ok(Response::JumpToTimeResult {
            success: true,
            target_line_number: Some(found.line_number),
            lines,
            start_line: start,
        })
    }

    /// Statistics over the buffered window.
    ///
    /// Built once on first use and extended as chunks arrive.
    pub fn statistics(&mut self) -> StatisticsSummary {
        let window = &self.window;
        self.stats
            .get_or_insert_with(|| StatisticsSnapshot::par_from_records(window.records()))
            .summary(self.settings.top_n)
    }

    /// Write the current view's raw lines to `path`.
    pub fn export_view(&self, path: &Path) -> Result<usize> {
        export_records(self.view.records().iter().map(|r| r.as_ref()), path)
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.generation.bump();
    }
}

fn clone_records(records: &[SharedRecord]) -> Vec<LogRecord> {
    records.iter().map(|r| LogRecord::clone(r)).collect()
}

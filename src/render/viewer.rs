//! Coordinated display for many simultaneous runs
//!
//! The viewer owns the terminal: registered runners are switched to
//! managed mode and their frames are pulled into a single status tree
//! repainted by one render tick. Stopping paints a final tree and a
//! plain summary that survives in scrollback.

use colored::Colorize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::frame::TestRenderer;
use super::term::{self, InlineRegion, TermRegion};
use super::{format_elapsed, SPINNER_FRAMES};
use crate::case::TestCase;
use crate::runner::TestRunner;

/// Viewer-assigned handle for one registered test, distinct from the
/// caller-chosen test id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderId(u64);

/// Lifecycle phase of one tracked test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

struct ExecutionState {
    case: TestCase,
    name: String,
    status: TestStatus,
    started: Option<Instant>,
    ended: Option<Instant>,
    error: Option<String>,
    url: Option<String>,
    renderer: Option<TestRenderer>,
}

impl ExecutionState {
    fn elapsed(&self) -> Option<Duration> {
        let started = self.started?;
        Some(match self.ended {
            Some(ended) => ended.duration_since(started),
            None => started.elapsed(),
        })
    }
}

struct FileEntry {
    path: String,
    ungrouped: Vec<RenderId>,
    groups: Vec<GroupEntry>,
}

struct GroupEntry {
    name: String,
    tests: Vec<RenderId>,
}

struct ViewerState {
    tests: HashMap<RenderId, ExecutionState>,
    files: Vec<FileEntry>,
    active: HashMap<RenderId, TestRunner>,
    next_id: u64,
    spinner_phase: usize,
    region: TermRegion,
    task: Option<JoinHandle<()>>,
    tick: Duration,
    stopped: bool,
}

/// Tracks and renders a whole suite of runs
///
/// Cloning yields another handle to the same viewer.
#[derive(Clone)]
pub struct TestViewer {
    inner: Arc<Mutex<ViewerState>>,
}

impl TestViewer {
    /// Viewer writing to stdout, repainting every `tick`
    pub fn new(tick: Duration) -> Self {
        Self::build(tick, InlineRegion::stdout())
    }

    /// Viewer writing to an arbitrary stream instead of stdout
    pub fn with_writer(tick: Duration, out: Box<dyn Write + Send>) -> Self {
        Self::build(tick, InlineRegion::new(out))
    }

    fn build(tick: Duration, region: TermRegion) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewerState {
                tests: HashMap::new(),
                files: Vec::new(),
                active: HashMap::new(),
                next_id: 0,
                spinner_phase: 0,
                region,
                task: None,
                tick,
                stopped: false,
            })),
        }
    }

    /// Register a test under its file and optional group
    ///
    /// Registration order fixes the display order.
    pub fn add_test(&self, file: &str, group: Option<&str>, case: &TestCase) -> RenderId {
        let mut state = self.lock();
        let id = RenderId(state.next_id);
        state.next_id += 1;
        state.tests.insert(
            id,
            ExecutionState {
                name: case.id().to_string(),
                case: case.clone(),
                status: TestStatus::Pending,
                started: None,
                ended: None,
                error: None,
                url: None,
                renderer: None,
            },
        );

        let file_index = match state.files.iter().position(|f| f.path == file) {
            Some(index) => index,
            None => {
                state.files.push(FileEntry {
                    path: file.to_string(),
                    ungrouped: Vec::new(),
                    groups: Vec::new(),
                });
                state.files.len() - 1
            }
        };
        match group {
            None => state.files[file_index].ungrouped.push(id),
            Some(name) => {
                let groups = &mut state.files[file_index].groups;
                match groups.iter_mut().find(|g| g.name == name) {
                    Some(group) => group.tests.push(id),
                    None => groups.push(GroupEntry {
                        name: name.to_string(),
                        tests: vec![id],
                    }),
                }
            }
        }
        id
    }

    /// Take over a runner's display
    ///
    /// The runner goes managed, a dedicated renderer is created on first
    /// registration and fed through the runner's progress callback, and
    /// the effective URL is captured as soon as it is known.
    pub fn register_runtime(&self, id: RenderId, runner: &TestRunner) {
        runner.set_managed(true);

        let renderer = {
            let mut state = self.lock();
            let tick = state.tick;
            let test = match state.tests.get_mut(&id) {
                Some(test) => test,
                None => {
                    tracing::warn!("No registered test for render id {:?}", id);
                    return;
                }
            };
            if let Some(existing) = &test.renderer {
                existing.clone()
            } else {
                let renderer = TestRenderer::new(test.case.name(), test.case.url());
                renderer.set_managed(true);
                renderer.start(tick);
                test.renderer = Some(renderer.clone());
                renderer
            }
        };

        runner.on_start({
            let inner = self.inner.clone();
            let renderer = renderer.clone();
            move |submitted| {
                renderer.set_url(&submitted.effective_url);
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(test) = state.tests.get_mut(&id) {
                    test.url = Some(submitted.effective_url.clone());
                }
            }
        });
        runner.on_progress({
            let renderer = renderer.clone();
            move |run| renderer.update(run)
        });

        // Submission may already have happened; callbacks never replay.
        if let Some(submitted) = runner.submitted() {
            renderer.set_url(&submitted.effective_url);
            let mut state = self.lock();
            if let Some(test) = state.tests.get_mut(&id) {
                test.url = Some(submitted.effective_url);
            }
        }

        self.lock().active.insert(id, runner.clone());
    }

    /// Release a runner and end its renderer's animation tick
    ///
    /// The renderer itself is kept so its last frame stays available
    /// for the final summary.
    pub fn unregister_runtime(&self, id: RenderId) {
        let (runner, renderer) = {
            let mut state = self.lock();
            let runner = state.active.remove(&id);
            let renderer = state.tests.get(&id).and_then(|test| test.renderer.clone());
            (runner, renderer)
        };
        if let Some(renderer) = renderer {
            renderer.stop();
        }
        if let Some(runner) = runner {
            runner.set_managed(false);
        }
    }

    /// Record a lifecycle transition for one test
    pub fn update_status(&self, id: RenderId, status: TestStatus, error: Option<String>) {
        let mut state = self.lock();
        let test = match state.tests.get_mut(&id) {
            Some(test) => test,
            None => {
                tracing::warn!("No registered test for render id {:?}", id);
                return;
            }
        };
        test.status = status;
        match status {
            TestStatus::Running => {
                test.started = Some(Instant::now());
                if test.url.is_none() {
                    test.url = Some(test.case.url().to_string());
                }
            }
            TestStatus::Passed | TestStatus::Failed => {
                test.ended = Some(Instant::now());
                test.error = error;
            }
            TestStatus::Pending => {}
        }
    }

    /// Begin repainting the status tree; repeated calls have no effect
    pub fn start(&self) {
        let mut state = self.lock();
        if state.task.is_some() || state.stopped {
            return;
        }
        let tick = state.tick;
        let inner = self.inner.clone();
        state.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                render_and_paint(&inner);
            }
        }));
    }

    /// Cancel the render tick along with every registered renderer's
    /// tick, paint a final tree and print the summary
    ///
    /// Safe to call any number of times; only the first call prints.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        for test in state.tests.values() {
            if let Some(renderer) = &test.renderer {
                renderer.stop();
            }
        }
        let text = compose_tree(&mut state);
        let width = term::terminal_width();
        if let Err(e) = state.region.update(&text, width) {
            tracing::debug!("Status tree write failed: {}", e);
        }
        let summary = summary_text(&state);
        if !summary.is_empty() {
            if let Err(e) = state.region.append(&summary) {
                tracing::debug!("Summary write failed: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn render_and_paint(inner: &Mutex<ViewerState>) {
    let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if state.stopped {
        return;
    }
    let text = compose_tree(&mut state);
    let width = term::terminal_width();
    if let Err(e) = state.region.update(&text, width) {
        tracing::debug!("Status tree write failed: {}", e);
    }
}

fn tree_order(state: &ViewerState) -> Vec<RenderId> {
    let mut order = Vec::new();
    for file in &state.files {
        order.extend(file.ungrouped.iter().copied());
        for group in &file.groups {
            order.extend(group.tests.iter().copied());
        }
    }
    order
}

fn compose_tree(state: &mut ViewerState) -> String {
    state.spinner_phase = (state.spinner_phase + 1) % SPINNER_FRAMES.len();
    let spinner = SPINNER_FRAMES[state.spinner_phase];

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut pending = 0usize;
    let mut running: Vec<RenderId> = Vec::new();
    for id in tree_order(state) {
        if let Some(test) = state.tests.get(&id) {
            match test.status {
                TestStatus::Passed => passed += 1,
                TestStatus::Failed => failed += 1,
                TestStatus::Pending => pending += 1,
                TestStatus::Running => running.push(id),
            }
        }
    }

    let total = state.tests.len();
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "{}",
        format!("=== Running {} test{} ===", total, plural(total))
            .cyan()
            .bold()
    ));
    lines.push(format!(
        "{} {} {} {}",
        format!("✓ {passed} passed").green(),
        format!("✗ {failed} failed").red(),
        format!("◌ {} running", running.len()).cyan(),
        format!("◯ {pending} pending").dimmed(),
    ));
    lines.push(String::new());

    for file in &state.files {
        lines.push(format!("{} {}", "▣".cyan(), file.path.bold()));
        for id in &file.ungrouped {
            if let Some(test) = state.tests.get(id) {
                lines.push(test_line(test, spinner, 2));
            }
        }
        for group in &file.groups {
            lines.push(format!("  {} {}", "◉".cyan(), group.name.bold()));
            for id in &group.tests {
                if let Some(test) = state.tests.get(id) {
                    lines.push(test_line(test, spinner, 4));
                }
            }
        }
    }

    if !running.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}", "=== Currently Running Tests ===".cyan().bold()));
        lines.push(String::new());
        for id in &running {
            if let Some(test) = state.tests.get(id) {
                if let Some(renderer) = &test.renderer {
                    lines.push(format!("{}", format!("[Test: {}]", test.name).cyan()));
                    for line in renderer.rendered_output().lines() {
                        lines.push(format!("  {line}"));
                    }
                    lines.push(String::new());
                }
            }
        }
    }

    lines.join("\n")
}

fn test_line(test: &ExecutionState, spinner: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let glyph = match test.status {
        TestStatus::Pending => "◯".dimmed().to_string(),
        TestStatus::Running => spinner.cyan().to_string(),
        TestStatus::Passed => "✓".green().to_string(),
        TestStatus::Failed => "✗".red().to_string(),
    };
    let name = match test.status {
        TestStatus::Running => test.name.cyan().to_string(),
        _ => test.name.normal().to_string(),
    };
    let mut line = format!("{pad}{glyph} {name}");
    if let Some(elapsed) = test.elapsed() {
        line.push_str(&format!(
            " {}",
            format!("[{}]", format_elapsed(elapsed)).dimmed()
        ));
    }
    if test.status != TestStatus::Pending {
        if let Some(url) = &test.url {
            line.push_str(&format!(" {}", format!("→ {url}").dimmed()));
        }
    }
    line
}

fn summary_text(state: &ViewerState) -> String {
    let failed: Vec<&ExecutionState> = tree_order(state)
        .iter()
        .filter_map(|id| state.tests.get(id))
        .filter(|test| test.status == TestStatus::Failed)
        .collect();
    let total = state.tests.len();

    let mut lines: Vec<String> = Vec::new();
    if !failed.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "{}",
            format!("{} test{} failed:", failed.len(), plural(failed.len()))
                .red()
                .bold()
        ));
        for test in failed {
            lines.push(format!("  {} {}", "✗".red(), test.name));
            if let Some(error) = &test.error {
                lines.push(format!("    {}", error.dimmed()));
            }
        }
    } else if total > 0 {
        lines.push(String::new());
        lines.push(format!(
            "{}",
            format!("All {} test{} passed!", total, plural(total))
                .green()
                .bold()
        ));
    }
    lines.join("\n")
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

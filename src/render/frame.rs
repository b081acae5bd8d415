//! Live frame rendering for a single run
//!
//! The renderer animates on its own tick, independent of the poll
//! cadence, so the spinner stays smooth while the orchestrator waits on
//! the network. In managed mode it keeps composing frames but leaves
//! all terminal writes to the coordinator.

use colored::{ColoredString, Colorize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::term::{self, InlineRegion, TermRegion};
use super::{format_elapsed, SPINNER_FRAMES};
use crate::api::types::{RunStatus, Severity};
use crate::runner::snapshot::RunResult;

/// Actions shown at the bottom of a frame
const RECENT_ACTIONS: usize = 5;

/// Characters inside the progress bar
const BAR_WIDTH: usize = 30;

/// Renders one test's live frame on an animation tick
///
/// Cloning yields another handle to the same renderer.
#[derive(Clone)]
pub struct TestRenderer {
    state: Arc<Mutex<RenderState>>,
}

struct RenderState {
    name: String,
    url: String,
    last: Option<RunResult>,
    spinner_phase: usize,
    started: Instant,
    active: bool,
    managed: bool,
    frame: String,
    region: TermRegion,
    task: Option<JoinHandle<()>>,
}

impl TestRenderer {
    pub fn new(name: &str, url: &str) -> Self {
        Self::build(name, url, InlineRegion::stdout())
    }

    #[cfg(test)]
    pub(crate) fn with_region(name: &str, url: &str, region: TermRegion) -> Self {
        Self::build(name, url, region)
    }

    fn build(name: &str, url: &str, region: TermRegion) -> Self {
        let mut state = RenderState {
            name: name.to_string(),
            url: url.to_string(),
            last: None,
            spinner_phase: 0,
            started: Instant::now(),
            active: false,
            managed: false,
            frame: String::new(),
            region,
            task: None,
        };
        state.frame = compose(&state);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Begin the animation tick; repeated calls have no effect
    ///
    /// The tick stops by itself once a final snapshot has been shown.
    pub fn start(&self, tick: Duration) {
        let mut state = self.lock();
        if state.task.is_some() {
            return;
        }
        state.active = true;
        let renderer = self.clone();
        state.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !renderer.tick_once() {
                    break;
                }
            }
        }));
    }

    /// Cancel the tick and paint one final frame
    ///
    /// Safe to call any number of times.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.active = false;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        let frame = compose(&state);
        state.frame = frame;
        if !state.managed && state.last.is_some() {
            let width = term::terminal_width();
            let text = state.frame.clone();
            if let Err(e) = state.region.update(&text, width) {
                tracing::debug!("Frame write failed: {}", e);
            }
        }
    }

    /// Replace the snapshot the next frames draw from
    pub fn update(&self, run: &RunResult) {
        let mut state = self.lock();
        state.last = Some(run.clone());
        let frame = compose(&state);
        state.frame = frame;
    }

    /// Replace the URL shown in the frame header
    pub fn set_url(&self, url: &str) {
        let mut state = self.lock();
        state.url = url.to_string();
        let frame = compose(&state);
        state.frame = frame;
    }

    /// Toggle managed mode; a managed renderer never writes the terminal
    pub fn set_managed(&self, managed: bool) {
        self.lock().managed = managed;
    }

    /// The most recently composed frame
    pub fn rendered_output(&self) -> String {
        self.lock().frame.clone()
    }

    /// One animation tick; returns false once ticking should stop
    fn tick_once(&self) -> bool {
        let mut state = self.lock();
        if !state.active {
            return false;
        }
        state.spinner_phase = (state.spinner_phase + 1) % SPINNER_FRAMES.len();
        let frame = compose(&state);
        state.frame = frame;
        if !state.managed {
            let width = term::terminal_width();
            let text = state.frame.clone();
            if let Err(e) = state.region.update(&text, width) {
                tracing::debug!("Frame write failed: {}", e);
            }
        }
        let done = state.last.as_ref().map(|r| r.is_done()).unwrap_or(false);
        if done {
            state.active = false;
        }
        !done
    }

    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compose(state: &RenderState) -> String {
    let mut lines: Vec<String> = Vec::new();
    let spinner = SPINNER_FRAMES[state.spinner_phase % SPINNER_FRAMES.len()];

    let run = match &state.last {
        Some(run) => run,
        None => {
            lines.push(format!("{} Test: {}", spinner.cyan(), state.name.bold()));
            lines.push(String::new());
            lines.push(format!("{}", "Test run starting...".dimmed()));
            return lines.join("\n");
        }
    };

    let status = if run.is_done() {
        if run.has_passed() {
            "PASSED".green().bold().to_string()
        } else {
            "FAILED".red().bold().to_string()
        }
    } else {
        "RUNNING".cyan().to_string()
    };
    let spinner_prefix = if run.is_done() {
        String::new()
    } else {
        format!("{} ", spinner.cyan())
    };
    lines.push(format!(
        "{}Test: {} [{}] {}",
        spinner_prefix,
        state.name.bold(),
        status,
        format_elapsed(state.started.elapsed()).dimmed()
    ));

    let steps = &run.raw().steps;
    let active = run.active_step_index();
    let current = active.map(|i| i + 1).unwrap_or(0);
    lines.push(format!(
        "{} Step {}/{} | Actions: {}",
        progress_bar(current, steps.len()),
        current,
        steps.len(),
        run.raw().actions.len()
    ));
    lines.push(format!("URL: {}", state.url.dimmed()));

    if !steps.is_empty() {
        lines.push(String::new());
        lines.push("Progress:".to_string());
        for (index, step) in steps.iter().enumerate() {
            let marker = if active == Some(index) { "→" } else { " " };
            lines.push(format!(
                "{} {} Step {}: {}",
                marker,
                status_glyph(step.status),
                index + 1,
                step.description
            ));
            for check in &step.checks {
                lines.push(format!(
                    "    {} Check: {}",
                    status_glyph(check.status),
                    check.description
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push("Recent Actions:".to_string());
    let actions = &run.raw().actions;
    if actions.is_empty() {
        lines.push(format!("  {}", "No actions yet".dimmed()));
    } else {
        let start = actions.len().saturating_sub(RECENT_ACTIONS);
        for action in &actions[start..] {
            let entry = format!("  - {}: {}", action.variant, action.description);
            lines.push(format!("{}", entry.dimmed()));
        }
    }

    let problems = run.problems();
    if !problems.is_empty() {
        lines.push(String::new());
        lines.push("Problems:".to_string());
        for problem in problems {
            lines.push(format!(
                "  {} {} ({})",
                severity_glyph(problem.severity),
                problem.title,
                problem.severity
            ));
            lines.push(format!("    Expected: {}", problem.expected_result));
            lines.push(format!("    Actual: {}", problem.actual_result));
        }
    }

    let warnings = run.warnings();
    if !warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for warning in warnings {
            lines.push(format!(
                "  {} {} ({})",
                "●".yellow(),
                warning.title,
                warning.severity
            ));
        }
    }

    if run.is_aborted() {
        lines.push(String::new());
        let reason = run.aborted_reason().unwrap_or("no reason given");
        lines.push(format!("{}", format!("Run aborted: {reason}").red()));
    }

    lines.join("\n")
}

fn status_glyph(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Passed => "✓".green(),
        RunStatus::Failed => "✗".red(),
        RunStatus::Pending => "⋯".dimmed(),
    }
}

fn severity_glyph(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "●".bright_red().bold(),
        Severity::High => "●".red(),
        Severity::Medium => "●".yellow(),
        Severity::Low => "●".green(),
        Severity::Cosmetic => "●".blue(),
    }
}

fn progress_bar(current: usize, total: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(BAR_WIDTH + 1));
    }
    let filled = ((current * BAR_WIDTH) / total).min(BAR_WIDTH);
    format!("[{}>{}]", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{
        Action, ActionVariant, Category, CheckResult, Problem, RunPayload, StepResult,
    };
    use std::io::{self, Write};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn renderer_with_buf(name: &str) -> (TestRenderer, SharedBuf) {
        let buf = SharedBuf::default();
        let region = InlineRegion::new(Box::new(buf.clone()) as Box<dyn Write + Send>);
        (TestRenderer::with_region(name, "http://localhost:3000", region), buf)
    }

    fn step(description: &str, status: RunStatus, checks: Vec<CheckResult>) -> StepResult {
        StepResult {
            description: description.to_string(),
            status,
            last_action_index: 0,
            checks,
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn check(description: &str, status: RunStatus) -> CheckResult {
        CheckResult {
            description: description.to_string(),
            status,
            last_action_index: 0,
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn running_snapshot() -> RunResult {
        RunResult::new(RunPayload {
            id: "run-1".to_string(),
            created_at: "2026-01-05T12:00:00Z".to_string(),
            actions: vec![Action {
                variant: ActionVariant::Click,
                description: "Pressed the login button".to_string(),
                screenshot_url: None,
            }],
            steps: vec![
                step(
                    "Log in",
                    RunStatus::Passed,
                    vec![check("Dashboard is visible", RunStatus::Passed)],
                ),
                step("Open settings", RunStatus::Pending, Vec::new()),
            ],
            start_screenshot_url: None,
            is_done: false,
            aborted: false,
            aborted_reason: None,
        })
    }

    fn finished_snapshot(passed: bool) -> RunResult {
        let status = if passed {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        RunResult::new(RunPayload {
            id: "run-1".to_string(),
            created_at: "2026-01-05T12:00:00Z".to_string(),
            actions: Vec::new(),
            steps: vec![step("Log in", status, Vec::new())],
            start_screenshot_url: None,
            is_done: true,
            aborted: false,
            aborted_reason: None,
        })
    }

    #[test]
    fn placeholder_frame_before_any_snapshot() {
        let (renderer, _) = renderer_with_buf("Login flow");
        let frame = renderer.rendered_output();
        assert!(frame.contains("Login flow"));
        assert!(frame.contains("Test run starting..."));
    }

    #[test]
    fn frames_show_steps_checks_and_the_active_marker() {
        let (renderer, _) = renderer_with_buf("Login flow");
        renderer.update(&running_snapshot());
        let frame = renderer.rendered_output();
        assert!(frame.contains("RUNNING"));
        assert!(frame.contains("Step 1: Log in"));
        assert!(frame.contains("Check: Dashboard is visible"));
        assert!(frame.contains("→"), "active step carries the arrow marker");
        assert!(frame.contains("Step 2/2"));
        assert!(frame.contains("- click: Pressed the login button"));
        assert!(frame.contains("URL: http://localhost:3000"));
    }

    #[test]
    fn finished_frames_drop_the_spinner() {
        let (renderer, _) = renderer_with_buf("Login flow");
        renderer.update(&finished_snapshot(true));
        let frame = renderer.rendered_output();
        assert!(frame.contains("PASSED"));
        for glyph in SPINNER_FRAMES {
            assert!(!frame.contains(glyph));
        }
    }

    #[test]
    fn failed_frames_show_problems_with_expected_and_actual() {
        let (renderer, _) = renderer_with_buf("Checkout");
        let mut payload = finished_snapshot(false).raw().clone();
        payload.steps[0].problems = vec![Problem {
            title: "Cart total is wrong".to_string(),
            severity: Severity::High,
            category: Category::Functional,
            expected_result: "Total shows $10".to_string(),
            actual_result: "Total shows $12".to_string(),
            action_index: 0,
            is_fatal: true,
        }];
        renderer.update(&RunResult::new(payload));
        let frame = renderer.rendered_output();
        assert!(frame.contains("FAILED"));
        assert!(frame.contains("Cart total is wrong (high)"));
        assert!(frame.contains("Expected: Total shows $10"));
        assert!(frame.contains("Actual: Total shows $12"));
    }

    #[test]
    fn managed_renderers_compose_but_never_write() {
        let (renderer, buf) = renderer_with_buf("Login flow");
        renderer.set_managed(true);
        renderer.update(&running_snapshot());
        renderer.tick_once();
        renderer.stop();
        assert!(buf.contents().is_empty());
        assert!(renderer.rendered_output().contains("Step 1: Log in"));
    }

    #[test]
    fn standalone_stop_paints_one_final_frame() {
        let (renderer, buf) = renderer_with_buf("Login flow");
        renderer.update(&finished_snapshot(true));
        renderer.stop();
        renderer.stop();
        let written = buf.contents();
        assert!(written.contains("PASSED"));
    }

    #[test]
    fn ticks_stop_themselves_after_a_final_snapshot() {
        let (renderer, _) = renderer_with_buf("Login flow");
        renderer.set_managed(true);
        renderer.lock().active = true;
        renderer.update(&running_snapshot());
        assert!(renderer.tick_once());
        renderer.update(&finished_snapshot(true));
        assert!(!renderer.tick_once(), "final snapshot ends the tick loop");
        assert!(!renderer.tick_once(), "inactive renderer stays stopped");
    }

    #[test]
    fn progress_bar_handles_empty_and_full_runs() {
        assert_eq!(progress_bar(0, 0).len(), BAR_WIDTH + 3);
        let full = progress_bar(4, 4);
        assert!(full.starts_with('['));
        assert!(full.contains("==============================>"));
        let empty = progress_bar(0, 4);
        assert!(empty.contains("[>"));
    }

    #[test]
    fn updating_the_url_changes_the_header() {
        let (renderer, _) = renderer_with_buf("Login flow");
        renderer.update(&running_snapshot());
        renderer.set_url("https://abc.tunnel.example");
        assert!(renderer
            .rendered_output()
            .contains("https://abc.tunnel.example"));
    }
}

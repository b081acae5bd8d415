//! Run orchestration
//!
//! `TestRunner` submits a validated test case, polls the run strictly
//! sequentially, diffs consecutive snapshots to drive callbacks and the
//! live display, and resolves a shared completion signal exactly once.
//! For local targets it opens a reverse tunnel first and submits the
//! tunnel's public URL instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use super::snapshot::RunResult;
use crate::api::types::Problem;
use crate::api::RunService;
use crate::case::{SubmittedTest, TestCase};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::render::frame::TestRenderer;
use crate::tunnel::{self, TunnelConnector, TunnelSession};

type Outcome = Result<RunResult>;

type StartCallback = Arc<dyn Fn(&SubmittedTest) + Send + Sync>;
type ProgressCallback = Arc<dyn Fn(&RunResult) + Send + Sync>;
type ReportCallback = Arc<dyn Fn(&Problem) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    start: Option<StartCallback>,
    progress: Option<ProgressCallback>,
    problem: Option<ReportCallback>,
    warning: Option<ReportCallback>,
}

/// Tuning for one run
#[derive(Clone)]
pub struct RunnerOptions {
    /// Delay between consecutive status polls
    pub poll_interval: Duration,

    /// Animation tick period for an attached display
    pub frame_interval: Duration,

    /// Reject the run when its first problem appears
    pub fail_fast_on_problem: bool,

    /// Reject the run when its first warning appears
    pub fail_fast_on_warning: bool,

    /// Connector used to expose local targets; `None` submits the
    /// draft URL unchanged
    pub tunnel: Option<Arc<dyn TunnelConnector>>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            frame_interval: Duration::from_millis(100),
            fail_fast_on_problem: false,
            fail_fast_on_warning: false,
            tunnel: None,
        }
    }
}

impl RunnerOptions {
    /// Intervals and fail-fast flags from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            frame_interval: config.tick_interval(),
            fail_fast_on_problem: config.runner.fail_fast_on_problem,
            fail_fast_on_warning: config.runner.fail_fast_on_warning,
            tunnel: None,
        }
    }
}

/// Drives one remote test run from submission to completion
///
/// Cloning yields another handle to the same run. Callback setters
/// register at most one callback each and never replay events that
/// happened before registration.
#[derive(Clone)]
pub struct TestRunner {
    shared: Arc<RunnerShared>,
}

struct RunnerShared {
    case: TestCase,
    service: Arc<dyn RunService>,
    options: RunnerOptions,
    callbacks: Mutex<Callbacks>,
    submitted: Mutex<Option<SubmittedTest>>,
    display: Mutex<Option<TestRenderer>>,
    managed: AtomicBool,
    completion: watch::Sender<Option<Outcome>>,
}

impl TestRunner {
    /// Validate, submit and begin polling `case` immediately
    pub fn start(case: TestCase, service: Arc<dyn RunService>, options: RunnerOptions) -> Self {
        let (completion, _) = watch::channel(None);
        let shared = Arc::new(RunnerShared {
            case,
            service,
            options,
            callbacks: Mutex::new(Callbacks::default()),
            submitted: Mutex::new(None),
            display: Mutex::new(None),
            managed: AtomicBool::new(false),
            completion,
        });
        tokio::spawn({
            let shared = shared.clone();
            async move { shared.run().await }
        });
        Self { shared }
    }

    /// Register the callback invoked once submission succeeds
    pub fn on_start(&self, callback: impl Fn(&SubmittedTest) + Send + Sync + 'static) -> &Self {
        self.lock_callbacks().start = Some(Arc::new(callback));
        self
    }

    /// Register the callback invoked when a poll's content changes
    pub fn on_progress(&self, callback: impl Fn(&RunResult) + Send + Sync + 'static) -> &Self {
        self.lock_callbacks().progress = Some(Arc::new(callback));
        self
    }

    /// Register the callback invoked once per newly reported problem
    pub fn on_problem(&self, callback: impl Fn(&Problem) + Send + Sync + 'static) -> &Self {
        self.lock_callbacks().problem = Some(Arc::new(callback));
        self
    }

    /// Register the callback invoked once per newly reported warning
    pub fn on_warning(&self, callback: impl Fn(&Problem) + Send + Sync + 'static) -> &Self {
        self.lock_callbacks().warning = Some(Arc::new(callback));
        self
    }

    /// Attach a live display, creating it on first use
    ///
    /// The display starts ticking immediately, before the first
    /// snapshot arrives. Attaching after completion shows the final
    /// state.
    pub fn attach_display(&self) -> &Self {
        let mut display = self
            .shared
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if display.is_none() {
            let renderer = TestRenderer::new(self.shared.case.name(), self.shared.case.url());
            renderer.set_managed(self.shared.managed.load(Ordering::Relaxed));
            if let Some(submitted) = self
                .shared
                .submitted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
            {
                renderer.set_url(&submitted.effective_url);
            }
            match self.shared.completion.borrow().as_ref() {
                Some(Ok(result)) => {
                    renderer.update(result);
                    renderer.stop();
                }
                Some(Err(_)) => renderer.stop(),
                None => renderer.start(self.shared.options.frame_interval),
            }
            *display = Some(renderer);
        }
        self
    }

    /// The attached display, if any
    pub fn display(&self) -> Option<TestRenderer> {
        self.shared
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand terminal ownership to an external coordinator
    ///
    /// A managed runner's display keeps composing frames but performs
    /// no terminal writes of its own.
    pub fn set_managed(&self, managed: bool) {
        self.shared.managed.store(managed, Ordering::Relaxed);
        if let Some(renderer) = self.display() {
            renderer.set_managed(managed);
        }
    }

    /// The test case this runner was started with
    pub fn case(&self) -> &TestCase {
        &self.shared.case
    }

    /// Identity assigned at submission, once available
    pub fn submitted(&self) -> Option<SubmittedTest> {
        self.shared
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait for the run to finish
    ///
    /// Any number of callers may wait; each observes the same outcome.
    /// By the time this returns, cleanup has already run.
    pub async fn wait(&self) -> Result<RunResult> {
        let mut rx = self.shared.completion.subscribe();
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(outcome) = current.as_ref() {
                    return outcome.clone();
                }
            }
            if rx.changed().await.is_err() {
                return Err(Error::internal("run ended without an outcome"));
            }
        }
    }

    fn lock_callbacks(&self) -> std::sync::MutexGuard<'_, Callbacks> {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunnerShared {
    async fn run(self: Arc<Self>) {
        let mut session: Option<Box<dyn TunnelSession>> = None;
        let outcome = self.drive(&mut session).await;
        self.finish(outcome, session).await;
    }

    async fn drive(&self, session: &mut Option<Box<dyn TunnelSession>>) -> Outcome {
        self.case.validate()?;

        let mut effective_url = self.case.url().to_string();
        if let Some(connector) = &self.options.tunnel {
            if tunnel::is_local_url(&effective_url) {
                let target = tunnel::tunnel_target(&effective_url)?;
                tracing::info!("Target '{}' is local, opening tunnel", effective_url);
                let opened = connector.connect(&target).await?;
                effective_url = opened.public_url().to_string();
                *session = Some(opened);
            }
        }

        let payload = self.case.to_payload(&effective_url);
        let response = self.service.submit_run(&payload).await?;
        let submitted = SubmittedTest {
            run_id: response.id,
            internal_id: response.internal_id,
            effective_url,
        };
        tracing::info!("Test '{}' submitted as run {}", self.case.id(), submitted.run_id);
        self.record_submission(&submitted);

        let mut last_fingerprint: Option<String> = None;
        let mut seen_warnings = 0usize;
        let mut seen_problems = 0usize;

        loop {
            let payload = self.service.run_status(&submitted.run_id).await?;
            let result = RunResult::new(payload);

            let fingerprint = result.fingerprint();
            if last_fingerprint.as_deref() != Some(fingerprint.as_str()) {
                self.dispatch_progress(&result);
            }

            // Warning and problem lists only ever grow within a run, so
            // new entries are exactly the tail beyond the last count.
            let warnings = result.warnings();
            for warning in warnings.iter().skip(seen_warnings) {
                self.dispatch_warning(warning);
                if self.options.fail_fast_on_warning {
                    return Err(Error::WarningFailFast((*warning).clone()));
                }
            }

            let problems = result.problems();
            for problem in problems.iter().skip(seen_problems) {
                self.dispatch_problem(problem);
                if self.options.fail_fast_on_problem {
                    return Err(Error::ProblemFailFast((*problem).clone()));
                }
            }

            seen_warnings = warnings.len();
            seen_problems = problems.len();
            last_fingerprint = Some(fingerprint);

            if result.is_done() {
                return Ok(result);
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// Teardown on every path: final frame, tunnel close, then the
    /// completion broadcast. Runs exactly once per runner.
    async fn finish(&self, outcome: Outcome, session: Option<Box<dyn TunnelSession>>) {
        let display = self
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(renderer) = display {
            if let Ok(result) = &outcome {
                renderer.update(result);
            }
            renderer.stop();
        }

        if let Some(session) = session {
            if let Err(e) = session.disconnect().await {
                tracing::warn!("Tunnel disconnect failed: {}", e);
            }
        }

        match &outcome {
            Ok(result) => {
                tracing::info!(
                    "Run {} finished: {}",
                    result.run_id(),
                    if result.has_passed() { "passed" } else { "failed" }
                );
            }
            Err(e) => tracing::warn!("Test '{}' failed: {}", self.case.id(), e),
        }

        self.completion.send_replace(Some(outcome));

        // A display attached while teardown was running missed the stop
        // above; settle it now that the outcome is visible.
        let display = self
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(renderer) = display {
            if let Some(Ok(result)) = self.completion.borrow().as_ref() {
                renderer.update(result);
            }
            renderer.stop();
        }
    }

    fn record_submission(&self, submitted: &SubmittedTest) {
        *self
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(submitted.clone());

        let display = self
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(renderer) = display {
            renderer.set_url(&submitted.effective_url);
        }

        let start = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start
            .clone();
        if let Some(callback) = start {
            callback(submitted);
        }
    }

    fn dispatch_progress(&self, result: &RunResult) {
        let progress = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .progress
            .clone();
        if let Some(callback) = progress {
            callback(result);
        }

        let display = self
            .display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(renderer) = display {
            renderer.update(result);
        }
    }

    fn dispatch_warning(&self, warning: &Problem) {
        tracing::debug!("Warning reported: {}", warning.title);
        let callback = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .warning
            .clone();
        if let Some(callback) = callback {
            callback(warning);
        }
    }

    fn dispatch_problem(&self, problem: &Problem) {
        tracing::debug!("Problem reported: {}", problem.title);
        let callback = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .problem
            .clone();
        if let Some(callback) = callback {
            callback(problem);
        }
    }
}

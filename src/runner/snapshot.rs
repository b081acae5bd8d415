//! Immutable view over one polled run state
//!
//! A fresh `RunResult` wraps every poll response. All queries derive
//! from the payload on demand; nothing is cached across polls.

use sha2::{Digest, Sha256};

use crate::api::types::{Problem, RunPayload, RunStatus};

/// One polled state of a run
#[derive(Debug, Clone)]
pub struct RunResult {
    data: RunPayload,
}

impl RunResult {
    pub fn new(data: RunPayload) -> Self {
        Self { data }
    }

    /// The raw payload this snapshot wraps
    pub fn raw(&self) -> &RunPayload {
        &self.data
    }

    pub fn run_id(&self) -> &str {
        &self.data.id
    }

    /// Whether execution has finished; a done snapshot is final
    pub fn is_done(&self) -> bool {
        self.data.is_done
    }

    pub fn is_aborted(&self) -> bool {
        self.data.aborted
    }

    pub fn aborted_reason(&self) -> Option<&str> {
        self.data.aborted_reason.as_deref()
    }

    /// Whether the run has passed so far
    ///
    /// The last check of the last step decides; a step without checks
    /// falls back to its own status. A run with no steps counts as
    /// passed.
    pub fn has_passed(&self) -> bool {
        let last_step = match self.data.steps.last() {
            Some(step) => step,
            None => return true,
        };
        match last_step.checks.last() {
            Some(last_check) => last_check.status == RunStatus::Passed,
            None => last_step.status == RunStatus::Passed,
        }
    }

    /// All problems reported so far, in document order
    ///
    /// Each step's own problems come before its checks' problems.
    pub fn problems(&self) -> Vec<&Problem> {
        let mut problems = Vec::new();
        for step in &self.data.steps {
            problems.extend(step.problems.iter());
            for check in &step.checks {
                problems.extend(check.problems.iter());
            }
        }
        problems
    }

    pub fn has_problems(&self) -> bool {
        !self.problems().is_empty()
    }

    /// All warnings reported so far, in the same document order as
    /// [`problems`](Self::problems)
    pub fn warnings(&self) -> Vec<&Problem> {
        let mut warnings = Vec::new();
        for step in &self.data.steps {
            warnings.extend(step.warnings.iter());
            for check in &step.checks {
                warnings.extend(check.warnings.iter());
            }
        }
        warnings
    }

    /// Index of the step currently being executed: the first pending
    /// step, or the last step once none are pending
    pub fn active_step_index(&self) -> Option<usize> {
        if self.data.steps.is_empty() {
            return None;
        }
        match self
            .data
            .steps
            .iter()
            .position(|step| step.status == RunStatus::Pending)
        {
            Some(index) => Some(index),
            None => Some(self.data.steps.len() - 1),
        }
    }

    /// Content hash over the full payload, used for change detection
    /// between consecutive polls
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.data).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Short description of why the run failed, for summaries
    pub fn failure_summary(&self) -> Option<String> {
        if self.is_aborted() {
            return Some(match self.aborted_reason() {
                Some(reason) => format!("Run aborted: {reason}"),
                None => "Run aborted".to_string(),
            });
        }
        if self.has_passed() {
            return None;
        }
        let problems = self.problems();
        let headline = problems
            .iter()
            .find(|p| p.is_fatal)
            .or_else(|| problems.first());
        Some(match headline {
            Some(problem) => format!("[{}] {}", problem.severity, problem.title),
            None => "Test did not pass".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Category, CheckResult, Severity, StepResult};

    fn payload(steps: Vec<StepResult>) -> RunPayload {
        RunPayload {
            id: "run-1".to_string(),
            created_at: "2026-01-05T12:00:00Z".to_string(),
            actions: Vec::new(),
            steps,
            start_screenshot_url: None,
            is_done: false,
            aborted: false,
            aborted_reason: None,
        }
    }

    fn step(status: RunStatus) -> StepResult {
        StepResult {
            description: "step".to_string(),
            status,
            last_action_index: 0,
            checks: Vec::new(),
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn check(status: RunStatus) -> CheckResult {
        CheckResult {
            description: "check".to_string(),
            status,
            last_action_index: 0,
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn problem(title: &str) -> Problem {
        Problem {
            title: title.to_string(),
            severity: Severity::Medium,
            category: Category::Functional,
            expected_result: "expected".to_string(),
            actual_result: "actual".to_string(),
            action_index: 0,
            is_fatal: false,
        }
    }

    #[test]
    fn no_steps_counts_as_passed() {
        assert!(RunResult::new(payload(Vec::new())).has_passed());
    }

    #[test]
    fn last_check_of_last_step_decides_the_outcome() {
        let mut failing = step(RunStatus::Passed);
        failing.checks = vec![check(RunStatus::Passed), check(RunStatus::Failed)];
        let result = RunResult::new(payload(vec![step(RunStatus::Passed), failing]));
        assert!(!result.has_passed());

        let mut passing = step(RunStatus::Failed);
        passing.checks = vec![check(RunStatus::Passed)];
        let result = RunResult::new(payload(vec![passing]));
        assert!(result.has_passed());
    }

    #[test]
    fn steps_without_checks_fall_back_to_step_status() {
        let result = RunResult::new(payload(vec![step(RunStatus::Failed)]));
        assert!(!result.has_passed());
        let result = RunResult::new(payload(vec![step(RunStatus::Passed)]));
        assert!(result.has_passed());
    }

    #[test]
    fn problems_keep_document_order_step_before_checks() {
        let mut first = step(RunStatus::Passed);
        first.problems = vec![problem("step problem")];
        let mut checked = check(RunStatus::Failed);
        checked.problems = vec![problem("check problem")];
        first.checks = vec![checked];

        let mut second = step(RunStatus::Pending);
        second.problems = vec![problem("later problem")];

        let result = RunResult::new(payload(vec![first, second]));
        let titles: Vec<&str> = result.problems().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["step problem", "check problem", "later problem"]);
    }

    #[test]
    fn warnings_collect_like_problems() {
        let mut entry = step(RunStatus::Pending);
        entry.warnings = vec![problem("slow response")];
        let mut checked = check(RunStatus::Pending);
        checked.warnings = vec![problem("layout shift")];
        entry.checks = vec![checked];

        let result = RunResult::new(payload(vec![entry]));
        let titles: Vec<&str> = result.warnings().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["slow response", "layout shift"]);
        assert!(!result.has_problems());
    }

    #[test]
    fn active_step_is_first_pending_else_last() {
        let result = RunResult::new(payload(vec![
            step(RunStatus::Passed),
            step(RunStatus::Pending),
            step(RunStatus::Pending),
        ]));
        assert_eq!(result.active_step_index(), Some(1));

        let result = RunResult::new(payload(vec![
            step(RunStatus::Passed),
            step(RunStatus::Failed),
        ]));
        assert_eq!(result.active_step_index(), Some(1));

        assert_eq!(RunResult::new(payload(Vec::new())).active_step_index(), None);
    }

    #[test]
    fn fingerprint_is_stable_for_identical_payloads() {
        let a = RunResult::new(payload(vec![step(RunStatus::Pending)]));
        let b = RunResult::new(payload(vec![step(RunStatus::Pending)]));
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = RunResult::new(payload(vec![step(RunStatus::Passed)]));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn failure_summary_reports_aborts_and_fatal_problems_first() {
        let mut aborted = payload(Vec::new());
        aborted.aborted = true;
        aborted.aborted_reason = Some("executor crashed".to_string());
        let summary = RunResult::new(aborted).failure_summary().unwrap();
        assert!(summary.contains("executor crashed"));

        let mut failing = step(RunStatus::Failed);
        let mut fatal = problem("page never loaded");
        fatal.is_fatal = true;
        failing.problems = vec![problem("minor issue"), fatal];
        let summary = RunResult::new(payload(vec![failing]))
            .failure_summary()
            .unwrap();
        assert!(summary.contains("page never loaded"));

        let passing = RunResult::new(payload(Vec::new()));
        assert!(passing.failure_summary().is_none());
    }
}

//! Wire types for the remote execution API
//!
//! Shapes mirror the service's JSON payloads. Within one run, the step,
//! check, problem and warning lists only ever grow between polls; the
//! orchestrator relies on that to diff by position.

use serde::{Deserialize, Serialize};
use std::fmt;

// === Submission Payloads ===

/// One key/value input available to a step
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDataEntry {
    pub key: String,
    pub value: String,
    /// Sensitive values are masked in every log line and rendered frame
    #[serde(default)]
    pub sensitive: bool,
}

impl fmt::Debug for TestDataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDataEntry")
            .field("key", &self.key)
            .field("value", if self.sensitive { &"***" } else { &self.value })
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

/// Input data attached to one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<TestDataEntry>,

    /// Free-form notes for the executor
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub other: String,
}

impl TestData {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.other.is_empty()
    }
}

/// One step of a submitted test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<String>,

    #[serde(default, skip_serializing_if = "TestData::is_empty")]
    pub test_data: TestData,
}

/// A complete test case as submitted for execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasePayload {
    /// Caller-chosen test id
    pub id: String,
    pub name: String,
    /// Target URL; the tunnel URL when the original target was local
    pub url: String,
    pub steps: Vec<StepPayload>,
}

/// Response to a run submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Service-issued run id, used for all status polls
    pub id: String,

    /// Remote-assigned id of the stored test definition
    #[serde(default)]
    pub internal_id: Option<String>,
}

// === Run Status Payloads ===

/// Execution status of a run, step or check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Passed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunStatus::Pending => "pending",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// How serious a reported problem is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Cosmetic,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Cosmetic => "cosmetic",
        };
        f.write_str(text)
    }
}

/// Broad classification of a reported problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Visual,
    Functional,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Category::Visual => "visual",
            Category::Functional => "functional",
        };
        f.write_str(text)
    }
}

/// Kind of browser action the executor performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVariant {
    Load,
    Click,
    Hover,
    Type,
    Scroll,
    Wait,
    Back,
}

impl fmt::Display for ActionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionVariant::Load => "load",
            ActionVariant::Click => "click",
            ActionVariant::Hover => "hover",
            ActionVariant::Type => "type",
            ActionVariant::Scroll => "scroll",
            ActionVariant::Wait => "wait",
            ActionVariant::Back => "back",
        };
        f.write_str(text)
    }
}

/// A defect reported during a run
///
/// The same shape carries warnings, which are notable events that do not
/// fail the run on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    pub severity: Severity,
    pub category: Category,
    pub expected_result: String,
    pub actual_result: String,

    /// Index into the run's action list where this was observed
    #[serde(default)]
    pub action_index: usize,

    /// Whether this problem fails the test by itself
    #[serde(default)]
    pub is_fatal: bool,
}

/// One browser action taken by the remote executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub variant: ActionVariant,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
}

/// Result of one check within a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub description: String,
    pub status: RunStatus,

    #[serde(default)]
    pub last_action_index: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<Problem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Problem>,
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub description: String,
    pub status: RunStatus,

    #[serde(default)]
    pub last_action_index: usize,

    #[serde(default)]
    pub checks: Vec<CheckResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<Problem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Problem>,
}

/// Full state of a run as returned by one status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPayload {
    /// Service-issued run id
    pub id: String,
    pub created_at: String,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub steps: Vec<StepResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_screenshot_url: Option<String>,

    /// Set once execution has finished; the payload carrying it is final
    pub is_done: bool,

    #[serde(default)]
    pub aborted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_entries_are_masked_in_debug_output() {
        let entry = TestDataEntry {
            key: "password".to_string(),
            value: "hunter2".to_string(),
            sensitive: true,
        };
        let rendered = format!("{entry:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
        assert!(rendered.contains("password"));
    }

    #[test]
    fn plain_entries_keep_their_value_in_debug_output() {
        let entry = TestDataEntry {
            key: "username".to_string(),
            value: "test_user".to_string(),
            sensitive: false,
        };
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("test_user"));
    }

    #[test]
    fn run_payloads_accept_minimal_service_responses() {
        let json = r#"{
            "id": "run-1",
            "created_at": "2026-01-05T12:00:00Z",
            "actions": [],
            "steps": [],
            "is_done": false,
            "aborted": false
        }"#;
        let payload: RunPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.id, "run-1");
        assert!(!payload.is_done);
        assert!(payload.start_screenshot_url.is_none());
    }

    #[test]
    fn step_results_default_missing_problem_lists() {
        let json = r#"{
            "description": "Open the landing page",
            "status": "pending",
            "last_action_index": 0,
            "checks": [
                {"description": "Hero image loads", "status": "pending", "last_action_index": 0}
            ]
        }"#;
        let step: StepResult = serde_json::from_str(json).unwrap();
        assert!(step.problems.is_empty());
        assert!(step.warnings.is_empty());
        assert_eq!(step.checks.len(), 1);
        assert_eq!(step.checks[0].status, RunStatus::Pending);
    }

    #[test]
    fn empty_step_data_is_omitted_from_submissions() {
        let step = StepPayload {
            description: "Click the login button".to_string(),
            checks: vec!["Form is visible".to_string()],
            test_data: TestData::default(),
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(!json.contains("test_data"));
    }

    #[test]
    fn severity_values_round_trip_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}

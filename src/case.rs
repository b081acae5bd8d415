//! Test case construction and validation
//!
//! A `TestCase` is a draft: steps, checks and input data are collected
//! through builder methods, validated locally, and only serialized at
//! submission time. Submission itself never mutates the draft; the
//! identity a run acquires lives on [`SubmittedTest`].

use url::Url;

use crate::api::types::{CasePayload, StepPayload, TestData, TestDataEntry};
use crate::common::{Error, Result};

/// A user-authored test case
#[derive(Debug, Clone)]
pub struct TestCase {
    id: String,
    name: String,
    url: String,
    steps: Vec<TestStep>,
}

impl TestCase {
    /// Create a test case targeting `url`; the display name defaults to the id
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            url: url.into(),
            steps: Vec::new(),
        }
    }

    /// Replace the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a step and return it for chained configuration
    pub fn add_step(&mut self, description: impl Into<String>) -> &mut TestStep {
        self.steps.push(TestStep::new(description));
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    /// Structural validation, run before anything touches the network
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("test id must not be empty"));
        }
        let parsed = Url::parse(&self.url)
            .map_err(|e| Error::validation(format!("invalid target URL '{}': {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "target URL '{}' must use http or https",
                self.url
            )));
        }
        if self.steps.is_empty() {
            return Err(Error::validation(format!("test '{}' has no steps", self.id)));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.description.trim().is_empty() {
                return Err(Error::validation(format!(
                    "step {} of test '{}' has an empty description",
                    index + 1,
                    self.id
                )));
            }
            if step.checks.iter().any(|c| c.trim().is_empty()) {
                return Err(Error::validation(format!(
                    "step {} of test '{}' has an empty check",
                    index + 1,
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Serialize for submission, substituting `effective_url` for the
    /// draft URL when a tunnel is in place
    pub(crate) fn to_payload(&self, effective_url: &str) -> CasePayload {
        CasePayload {
            id: self.id.clone(),
            name: self.name.clone(),
            url: effective_url.to_string(),
            steps: self.steps.iter().map(TestStep::to_payload).collect(),
        }
    }
}

/// One step of a test case
///
/// Plain and secure data entries merge into a single list at submission;
/// secure values stay masked in all diagnostic output.
#[derive(Debug, Clone)]
pub struct TestStep {
    description: String,
    checks: Vec<String>,
    data: Vec<TestDataEntry>,
}

impl TestStep {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            checks: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Add a natural-language check evaluated after the step runs
    pub fn check(&mut self, description: impl Into<String>) -> &mut Self {
        self.checks.push(description.into());
        self
    }

    /// Attach plain input data
    pub fn data(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.data.push(TestDataEntry {
            key: key.into(),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    /// Attach sensitive input data, masked in all output
    pub fn secure_data(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.data.push(TestDataEntry {
            key: key.into(),
            value: value.into(),
            sensitive: true,
        });
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn checks(&self) -> &[String] {
        &self.checks
    }

    fn to_payload(&self) -> StepPayload {
        StepPayload {
            description: self.description.clone(),
            checks: self.checks.clone(),
            test_data: TestData {
                data: self.data.clone(),
                other: String::new(),
            },
        }
    }
}

/// Identity a test acquires at submission
///
/// Produced exactly once per run; the draft `TestCase` never changes.
#[derive(Debug, Clone)]
pub struct SubmittedTest {
    /// Service-issued run id
    pub run_id: String,

    /// Remote-assigned id of the stored test definition
    pub internal_id: Option<String>,

    /// URL the remote executor targets; differs from the draft URL when
    /// the target is exposed through a tunnel
    pub effective_url: String,
}

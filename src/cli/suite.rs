//! Declarative test files
//!
//! A test file lists cases in YAML, optionally sorted into named groups:
//!
//! ```yaml
//! tests:
//!   - id: login
//!     url: http://localhost:3000
//!     steps:
//!       - description: Log in to the app
//!         checks:
//!           - Dashboard is visible
//!         data:
//!           username: test_user
//!         secure_data:
//!           password: hunter2
//! groups:
//!   - name: checkout
//!     tests:
//!       - id: buy-item
//!         url: http://localhost:3000/shop
//!         steps:
//!           - description: Add an item to the cart and pay
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::case::TestCase;
use crate::common::{Error, Result};

/// One parsed test file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestSuite {
    /// Tests outside any group
    #[serde(default)]
    pub tests: Vec<TestSpec>,

    #[serde(default)]
    pub groups: Vec<TestGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestGroup {
    pub name: String,

    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

/// One test as written in a file
#[derive(Debug, Clone, Deserialize)]
pub struct TestSpec {
    pub id: String,

    /// Display name; the id is used when absent
    #[serde(default)]
    pub name: Option<String>,

    pub url: String,

    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    pub description: String,

    #[serde(default)]
    pub checks: Vec<String>,

    #[serde(default)]
    pub data: BTreeMap<String, String>,

    /// Values the executor may use but that never appear in output
    #[serde(default)]
    pub secure_data: BTreeMap<String, String>,
}

impl TestSuite {
    /// All tests in file order: ungrouped first, then group by group
    pub fn entries(&self) -> impl Iterator<Item = (Option<&str>, &TestSpec)> {
        let ungrouped = self.tests.iter().map(|test| (None, test));
        let grouped = self.groups.iter().flat_map(|group| {
            group
                .tests
                .iter()
                .map(move |test| (Some(group.name.as_str()), test))
        });
        ungrouped.chain(grouped)
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.groups.iter().all(|g| g.tests.is_empty())
    }
}

impl TestSpec {
    /// Build the runnable case this spec describes
    pub fn to_case(&self) -> TestCase {
        let mut case = TestCase::new(&self.id, &self.url);
        if let Some(name) = &self.name {
            case = case.with_name(name);
        }
        for step in &self.steps {
            let built = case.add_step(&step.description);
            for check in &step.checks {
                built.check(check);
            }
            for (key, value) in &step.data {
                built.data(key, value);
            }
            for (key, value) in &step.secure_data {
                built.secure_data(key, value);
            }
        }
        case
    }
}

/// Parse one test file
pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::SuiteParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&text).map_err(|e| Error::SuiteParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

//! CLI command handling
//!
//! Dispatches CLI commands: loads config and test files, drives one
//! runner per test under a shared viewer, and formats validation output.

pub mod discover;
pub mod suite;

use colored::Colorize;
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{ApiClient, RunService};
use crate::case::TestCase;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::render::{RenderId, TestStatus, TestViewer};
use crate::runner::{RunnerOptions, TestRunner};
use crate::tunnel::HttpTunnelConnector;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            paths,
            workers,
            fail_fast,
        } => run(paths, workers, fail_fast).await,

        Commands::Validate { paths } => validate(paths),
    }
}

async fn run(paths: Vec<PathBuf>, workers: usize, fail_fast: bool) -> Result<()> {
    let config = Config::load()?;
    let api_key = config.api_key()?;

    let files = discover::discover(&paths)?;
    if files.is_empty() {
        println!("No test files found");
        return Ok(());
    }

    let service: Arc<dyn RunService> = Arc::new(ApiClient::new(
        &config.api.base_url,
        &api_key,
        config.api_timeout(),
    )?);

    let mut options = RunnerOptions::from_config(&config);
    if fail_fast {
        options.fail_fast_on_problem = true;
    }
    if config.tunnel.enabled {
        options.tunnel = Some(Arc::new(HttpTunnelConnector::new(&config.tunnel.server_url)));
    }

    // Register everything up front so the tree shows pending tests from
    // the first frame.
    let viewer = TestViewer::new(config.tick_interval());
    let mut planned: Vec<(RenderId, TestCase)> = Vec::new();
    for file in &files {
        let label = display_label(file);
        let parsed = suite::load_suite(file)?;
        for (group, spec) in parsed.entries() {
            let case = spec.to_case();
            let id = viewer.add_test(&label, group, &case);
            planned.push((id, case));
        }
    }

    if planned.is_empty() {
        println!("No tests found in {} file(s)", files.len());
        return Ok(());
    }

    let total = planned.len();
    viewer.start();

    let outcomes = stream::iter(planned.into_iter().map(|(id, case)| {
        let viewer = viewer.clone();
        let service = service.clone();
        let options = options.clone();
        async move { run_one(&viewer, id, case, service, options).await }
    }))
    .buffer_unordered(workers.max(1))
    .collect::<Vec<bool>>()
    .await;

    viewer.stop();

    let failed = outcomes.iter().filter(|passed| !**passed).count();
    if failed > 0 {
        return Err(Error::TestsFailed { failed, total });
    }
    Ok(())
}

/// Run one test to completion, reporting transitions to the viewer
async fn run_one(
    viewer: &TestViewer,
    id: RenderId,
    case: TestCase,
    service: Arc<dyn RunService>,
    options: RunnerOptions,
) -> bool {
    viewer.update_status(id, TestStatus::Running, None);
    let runner = TestRunner::start(case, service, options);
    viewer.register_runtime(id, &runner);
    let outcome = runner.wait().await;
    viewer.unregister_runtime(id);

    match outcome {
        Ok(result) => match result.failure_summary() {
            None => {
                viewer.update_status(id, TestStatus::Passed, None);
                true
            }
            Some(summary) => {
                viewer.update_status(id, TestStatus::Failed, Some(summary));
                false
            }
        },
        Err(e) => {
            viewer.update_status(id, TestStatus::Failed, Some(e.to_string()));
            false
        }
    }
}

fn validate(paths: Vec<PathBuf>) -> Result<()> {
    let files = discover::discover(&paths)?;
    if files.is_empty() {
        println!("No test files found");
        return Ok(());
    }

    let mut bad_files = 0usize;
    let mut bad_tests = 0usize;
    let mut total = 0usize;
    for file in &files {
        let label = display_label(file);
        match suite::load_suite(file) {
            Err(e) => {
                bad_files += 1;
                println!("{} {}", "✗".red(), label);
                println!("    {e}");
            }
            Ok(parsed) => {
                let mut messages = Vec::new();
                for (_, spec) in parsed.entries() {
                    total += 1;
                    if let Err(e) = spec.to_case().validate() {
                        messages.push(e.to_string());
                    }
                }
                if messages.is_empty() {
                    println!("{} {}", "✓".green(), label);
                } else {
                    bad_tests += messages.len();
                    println!("{} {}", "✗".red(), label);
                    for message in messages {
                        println!("    {message}");
                    }
                }
            }
        }
    }

    if bad_files > 0 || bad_tests > 0 {
        let mut parts = Vec::new();
        if bad_files > 0 {
            parts.push(format!(
                "{bad_files} of {} test file(s) failed to parse",
                files.len()
            ));
        }
        if bad_tests > 0 {
            parts.push(format!("{bad_tests} of {total} test(s) failed validation"));
        }
        return Err(Error::validation(parts.join("; ")));
    }
    println!("All {total} test(s) are valid");
    Ok(())
}

fn display_label(path: &Path) -> String {
    let text = path.display().to_string();
    match text.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_drop_the_leading_current_dir() {
        assert_eq!(display_label(Path::new("./suites/a.yaml")), "suites/a.yaml");
        assert_eq!(display_label(Path::new("suites/a.yaml")), "suites/a.yaml");
        assert_eq!(display_label(Path::new("/abs/a.yaml")), "/abs/a.yaml");
    }

    #[test]
    fn validation_counts_unparseable_files_apart_from_tests() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.remotest.yaml");
        std::fs::write(&broken, "tests: [").unwrap();

        let err = validate(vec![broken]).unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("1 of 1 test file(s) failed to parse"),
            "{message}"
        );
        assert!(!message.contains("of 0"), "{message}");
    }

    #[test]
    fn validation_reports_file_and_test_failures_separately() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.remotest.yaml"), "tests: [").unwrap();
        std::fs::write(
            dir.path().join("cases.remotest.yaml"),
            r#"
tests:
  - id: bad-proto
    url: ftp://example.com
    steps:
      - description: Open the page
"#,
        )
        .unwrap();

        let err = validate(vec![dir.path().to_path_buf()]).unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("1 of 2 test file(s) failed to parse"),
            "{message}"
        );
        assert!(
            message.contains("1 of 1 test(s) failed validation"),
            "{message}"
        );
    }
}

//! Test-file discovery
//!
//! Finds declarative test files under the paths given on the command
//! line. Directories are walked recursively; explicit files are taken
//! as given so odd names still work.

use crate::common::{Error, Result};
use std::path::{Path, PathBuf};

/// Suffixes a file must carry to be picked up by the directory walk
pub const TEST_FILE_SUFFIXES: [&str; 2] = [".remotest.yaml", ".remotest.yml"];

const SKIPPED_DIRS: [&str; 3] = ["node_modules", "target", "dist"];

/// Find test files under the given paths
///
/// With no paths the current directory is searched. Results are sorted
/// and deduplicated so run order is stable.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if paths.is_empty() {
        walk(Path::new("."), &mut found)?;
    } else {
        for path in paths {
            if path.is_dir() {
                walk(path, &mut found)?;
            } else if path.is_file() {
                found.push(path.clone());
            } else {
                return Err(Error::config(format!(
                    "No such file or directory: {}",
                    path.display()
                )));
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk(&path, found)?;
        } else if is_test_file(&name) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_test_file(name: &str) -> bool {
    TEST_FILE_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

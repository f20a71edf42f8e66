#![allow(dead_code)]

use sable_core::config::{BudgetConfig, ToolConfig};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes an executable `/bin/sh` script standing in for the external
/// tool and returns its path.
pub fn tool_script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-tool");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn tool_config(binary: &Path) -> ToolConfig {
    ToolConfig {
        binary: binary.to_string_lossy().to_string(),
        model: None,
        credential_dir: None,
    }
}

/// Budgets tightened so failure-path tests finish quickly.
pub fn fast_budget() -> BudgetConfig {
    BudgetConfig {
        attempt_timeout_secs: 5,
        interactive_timeout_secs: 5,
        max_output_bytes: 1024 * 1024,
    }
}

/// Number of prompt files currently in the temp dir.
pub fn prompt_file_count() -> usize {
    fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("sable-prompt-")
        })
        .count()
}

/// Waits (briefly) for the prompt-file count to drop back to a baseline,
/// tolerating concurrent tests that have their own files in flight.
pub async fn wait_for_prompt_files(baseline: usize) -> bool {
    for _ in 0..40 {
        if prompt_file_count() <= baseline {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

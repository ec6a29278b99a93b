// SPDX-License-Identifier: MIT OR Apache-2.0

//! Git-backed enumeration helpers.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use crate::util::normalize_rel_path;

/// Tracked-file count above which the untracked query is skipped; it
/// dominates latency on very large repositories.
pub const UNTRACKED_QUERY_LIMIT: usize = 50_000;

const SUBQUERY_TIMEOUT: Duration = Duration::from_secs(2);

static REPO_CACHE: Mutex<Option<HashMap<PathBuf, bool>>> = Mutex::new(None);

/// Whether `root` sits inside a git work tree. Memoised per process.
pub fn is_work_tree(root: &Path) -> bool {
    let key = root.to_path_buf();
    if let Ok(guard) = REPO_CACHE.lock() {
        if let Some(cache) = guard.as_ref() {
            if let Some(&known) = cache.get(&key) {
                return known;
            }
        }
    }

    let inside = run_git_quick(root, &["rev-parse", "--is-inside-work-tree"])
        .map(|out| out.trim() == "true")
        .unwrap_or(false);

    if let Ok(mut guard) = REPO_CACHE.lock() {
        guard.get_or_insert_with(HashMap::new).insert(key, inside);
    }
    inside
}

/// Clear the work-tree memo. Tests only.
pub fn reset_repo_cache() {
    if let Ok(mut guard) = REPO_CACHE.lock() {
        *guard = None;
    }
}

/// Tracked files, repo-relative with forward slashes.
pub fn tracked_files(root: &Path) -> Result<Vec<String>> {
    let output = run_git_bytes(root, &["ls-files", "-z"])?;
    Ok(split_null(&output))
}

/// Untracked-but-not-ignored files.
pub fn untracked_files(root: &Path) -> Result<Vec<String>> {
    let output = run_git_bytes(root, &["ls-files", "-z", "--others", "--exclude-standard"])?;
    Ok(split_null(&output))
}

/// Paths with uncommitted modifications (staged or not) plus untracked
/// files, from `git status --porcelain`. Empty outside a repository.
pub fn modified_files(root: &Path) -> Vec<String> {
    let Ok(output) = run_git_quick(root, &["status", "--porcelain"]) else {
        return Vec::new();
    };

    let mut paths = Vec::new();
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let path = line[3..].trim();
        // Renames are reported as "old -> new"; keep the new side.
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        let normalized = normalize_rel_path(path.trim_matches('"'));
        if !normalized.is_empty() {
            paths.push(normalized);
        }
    }
    paths.sort();
    paths.dedup();
    paths
}

fn split_null(output: &[u8]) -> Vec<String> {
    output
        .split(|b| *b == 0)
        .filter_map(|chunk| {
            if chunk.is_empty() {
                return None;
            }
            let raw = String::from_utf8_lossy(chunk);
            let normalized = normalize_rel_path(&raw);
            if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            }
        })
        .collect()
}

/// Bulk git invocation (ls-files). No per-process deadline: the
/// pipeline-level scan timeout already bounds it, and output can exceed
/// the pipe buffer on large repositories.
fn run_git_bytes(root: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .context("failed to spawn git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(output.stdout)
}

/// Quick sub-query (rev-parse, status) with a hard 2-second deadline so
/// a hung subprocess cannot stall the scan; the child is killed on
/// timeout.
fn run_git_quick(root: &Path, args: &[&str]) -> Result<String> {
    let mut child = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn git")?;

    let start = std::time::Instant::now();
    loop {
        match child.try_wait().context("failed to wait for git")? {
            Some(status) => {
                let output = child
                    .wait_with_output()
                    .context("failed to collect git output")?;
                if !status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    bail!("git {:?} failed: {}", args, stderr.trim());
                }
                return Ok(String::from_utf8_lossy(&output.stdout).to_string());
            }
            None => {
                if start.elapsed() > SUBQUERY_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    bail!("git {:?} timed out", args);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        run(dir, &["init", "-q"]);
        run(dir, &["config", "user.email", "test@example.com"]);
        run(dir, &["config", "user.name", "test"]);
    }

    #[test]
    fn work_tree_detection_and_cache_reset() {
        let dir = TempDir::new().expect("tempdir");
        reset_repo_cache();
        assert!(!is_work_tree(dir.path()));

        init_repo(dir.path());
        // Memoised answer survives until an explicit reset.
        assert!(!is_work_tree(dir.path()));
        reset_repo_cache();
        assert!(is_work_tree(dir.path()));
        reset_repo_cache();
    }

    #[test]
    fn tracked_and_untracked_enumeration() {
        let dir = TempDir::new().expect("tempdir");
        init_repo(dir.path());

        std::fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}\n").expect("write");
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-q", "-m", "seed"]);

        std::fs::write(dir.path().join("src/new.rs"), "pub fn b() {}\n").expect("write");

        let tracked = tracked_files(dir.path()).expect("tracked");
        assert_eq!(tracked, vec!["src/lib.rs".to_string()]);

        let untracked = untracked_files(dir.path()).expect("untracked");
        assert_eq!(untracked, vec!["src/new.rs".to_string()]);
    }

    #[test]
    fn modified_files_reports_dirty_paths() {
        let dir = TempDir::new().expect("tempdir");
        init_repo(dir.path());

        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").expect("write");
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-q", "-m", "seed"]);

        std::fs::write(dir.path().join("a.rs"), "fn a() { let _ = 1; }\n").expect("rewrite");
        std::fs::write(dir.path().join("b.rs"), "fn b() {}\n").expect("write new");

        let modified = modified_files(dir.path());
        assert!(modified.contains(&"a.rs".to_string()));
        assert!(modified.contains(&"b.rs".to_string()));
    }
}

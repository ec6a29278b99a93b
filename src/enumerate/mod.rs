// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate-file enumeration with cascading strategies.
//!
//! Order: git (tracked + untracked), a native find binary, then the glob
//! walker. Any strategy failing falls through to the next; total failure
//! yields an empty list and a stderr diagnostic, never an error.

pub mod git;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use crate::util::{normalize_rel_path, relative_path};

/// Prefixes always skipped, checked at the path start and as interior
/// segments. Kept small and ordered hot-first.
const IGNORED_PREFIXES: &[&str] = &[
    "node_modules/",
    ".git/",
    "dist/",
    "build/",
    "out/",
    ".next/",
    "coverage/",
    "target/",
    "vendor/",
    "__pycache__/",
    ".cache/",
    ".venv/",
    ".mantic/",
    "Windows/",
    "$Recycle.Bin/",
    "AppData/",
    "Program Files/",
];

/// Path components that mark an OS-protected directory; scanning inside
/// one is refused with a diagnostic.
const PROTECTED_ROOTS: &[&str] = &["Windows", "$Recycle.Bin", "AppData", "Program Files"];

const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Git,
    FindBinary,
    Walker,
    None,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Git => "git",
            Strategy::FindBinary => "find",
            Strategy::Walker => "walker",
            Strategy::None => "none",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumerateOptions {
    /// Extra glob patterns appended to the built-in ignore set.
    pub extra_ignore: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Enumeration {
    /// Repo-relative forward-slash paths, sorted.
    pub files: Vec<String>,
    pub strategy: Strategy,
}

impl Enumeration {
    fn empty() -> Self {
        Self {
            files: Vec::new(),
            strategy: Strategy::None,
        }
    }
}

/// Enumerate candidate files under `root`.
pub fn enumerate(root: &Path, options: &EnumerateOptions) -> Enumeration {
    if is_protected_root(root) {
        eprintln!(
            "mantic: refusing to scan OS-protected directory {}",
            root.display()
        );
        return Enumeration::empty();
    }

    let glob_ignore = compile_globs(&options.extra_ignore);

    if git::is_work_tree(root) {
        match enumerate_git(root) {
            Ok(files) => {
                return Enumeration {
                    files: finish(files, &glob_ignore),
                    strategy: Strategy::Git,
                }
            }
            Err(err) => eprintln!("mantic: git enumeration failed, falling back: {err:#}"),
        }
    }

    if let Some(finder) = find_binary() {
        match enumerate_find(root, finder) {
            Ok(files) => {
                return Enumeration {
                    files: finish(files, &glob_ignore),
                    strategy: Strategy::FindBinary,
                }
            }
            Err(err) => eprintln!("mantic: {finder} enumeration failed, falling back: {err:#}"),
        }
    }

    let files = enumerate_walk(root);
    if files.is_empty() && !root.is_dir() {
        eprintln!("mantic: nothing to scan at {}", root.display());
        return Enumeration::empty();
    }
    Enumeration {
        files: finish(files, &glob_ignore),
        strategy: Strategy::Walker,
    }
}

/// Enumerate on a worker thread with a hard deadline. A timeout yields an
/// empty result rather than a partial one.
pub fn enumerate_with_timeout(
    root: &Path,
    options: EnumerateOptions,
    timeout: Duration,
) -> Enumeration {
    let root = root.to_path_buf();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let result = enumerate(&root, &options);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            eprintln!(
                "mantic: scan exceeded {}ms, returning no files",
                timeout.as_millis()
            );
            Enumeration::empty()
        }
    }
}

fn enumerate_git(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut files = git::tracked_files(root)?;
    if files.len() <= git::UNTRACKED_QUERY_LIMIT {
        files.extend(git::untracked_files(root)?);
    }
    Ok(files)
}

fn enumerate_find(root: &Path, finder: &str) -> anyhow::Result<Vec<String>> {
    let output = match finder {
        "fd" => Command::new("fd")
            .args(["--type", "f", "--print0", "."])
            .arg(root)
            .stdin(Stdio::null())
            .output()?,
        _ => Command::new("find")
            .arg(root)
            .args(["-type", "f", "-print0"])
            .stdin(Stdio::null())
            .output()?,
    };

    if !output.status.success() {
        anyhow::bail!("{finder} exited with {}", output.status);
    }

    let mut files = Vec::new();
    for chunk in output.stdout.split(|b| *b == 0) {
        if chunk.is_empty() {
            continue;
        }
        let raw = String::from_utf8_lossy(chunk);
        let abs = PathBuf::from(raw.as_ref());
        if let Some(rel) = relative_path(root, &abs) {
            files.push(rel);
        }
    }
    Ok(files)
}

fn enumerate_walk(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .follow_links(false)
        .max_depth(Some(DEFAULT_MAX_DEPTH))
        .ignore(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .build();

    let mut denied = 0usize;
    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                if err.to_string().contains("permission denied")
                    || err.to_string().contains("Permission denied")
                {
                    denied += 1;
                } else {
                    eprintln!("mantic: walk error: {err}");
                }
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path()) {
            files.push(rel);
        }
    }
    if denied > 0 {
        eprintln!("mantic: skipped {denied} unreadable entries (permission denied)");
    }
    files
}

/// Sort, dedupe and apply ignore filtering.
fn finish(mut files: Vec<String>, glob_ignore: &Option<GlobSet>) -> Vec<String> {
    files = files
        .into_iter()
        .map(|f| normalize_rel_path(&f))
        .filter(|f| !f.is_empty() && !is_ignored(f, glob_ignore))
        .collect();
    files.sort();
    files.dedup();
    files
}

fn is_ignored(path: &str, glob_ignore: &Option<GlobSet>) -> bool {
    for prefix in IGNORED_PREFIXES {
        if path.starts_with(prefix) || path.contains(&format!("/{prefix}")) {
            return true;
        }
    }
    if let Some(set) = glob_ignore {
        if set.is_match(path) {
            return true;
        }
    }
    false
}

fn compile_globs(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                any = true;
            }
            Err(err) => eprintln!("mantic: ignoring bad glob '{pattern}': {err}"),
        }
    }
    if !any {
        return None;
    }
    builder.build().ok()
}

fn is_protected_root(root: &Path) -> bool {
    root.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| PROTECTED_ROOTS.contains(&s))
            .unwrap_or(false)
    })
}

/// Probe for a usable find binary on PATH. Memoised per process; the
/// probe itself differs by OS but the contract does not.
fn find_binary() -> Option<&'static str> {
    static PROBE: OnceLock<Option<&'static str>> = OnceLock::new();
    *PROBE.get_or_init(|| {
        for candidate in ["fd", "find"] {
            if binary_on_path(candidate) {
                return Some(candidate);
            }
        }
        None
    })
}

#[cfg(windows)]
fn binary_on_path(name: &str) -> bool {
    Command::new("where.exe")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn binary_on_path(name: &str) -> bool {
    Command::new("sh")
        .args(["-c", &format!("command -v {name}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

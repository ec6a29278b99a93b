// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental index refresh.
//!
//! Compares the current enumeration against the persisted index, then
//! re-parses only what changed. Unchanged entries are moved over without
//! touching the file again.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::index::parse::{language_for_path, parse_source};
use crate::index::{detect_project, detect_tech_stack, CacheIndex, FileEntry};
use crate::util::{mtime_ms, now_ms};

/// Bounded fan-out for stat and parse work.
const PARSE_WORKERS: usize = 50;

/// Paths partitioned by how they changed since the last scan. The three
/// sets are disjoint by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSets {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub index: CacheIndex,
    pub sets: DiffSets,
    /// Files whose parse failed this round; recorded, never fatal.
    pub parse_failures: usize,
}

/// Bring the index up to date with `files` (the current enumeration).
pub fn refresh(root: &Path, files: &[String], previous: Option<CacheIndex>) -> RefreshOutcome {
    let mut old = previous.unwrap_or_else(|| CacheIndex::new(root));
    let stats = stat_all(root, files);

    let mut sets = DiffSets::default();
    let mut next: BTreeMap<String, FileEntry> = BTreeMap::new();
    let mut to_parse: Vec<(String, u64, u64)> = Vec::new();

    for path in files {
        let Some(&(mtime, size)) = stats.get(path.as_str()) else {
            // Raced with a delete between enumeration and stat.
            continue;
        };

        match old.files.remove(path) {
            Some(existing) if existing.mtime_ms == mtime && existing.size == size => {
                next.insert(path.clone(), existing);
            }
            Some(_) => {
                sets.modified.push(path.clone());
                to_parse.push((path.clone(), mtime, size));
            }
            None => {
                sets.added.push(path.clone());
                to_parse.push((path.clone(), mtime, size));
            }
        }
    }

    sets.deleted = old.files.into_keys().collect();
    sets.added.sort();
    sets.modified.sort();
    sets.deleted.sort();

    let parsed = parse_batch(root, &to_parse);
    let mut parse_failures = 0usize;
    for entry in parsed {
        if entry.parse_error.is_some() {
            parse_failures += 1;
        }
        next.insert(entry.path.clone(), entry);
    }

    let mut index = CacheIndex::new(root);
    index.last_scan_ms = now_ms();
    index.tech_stack = detect_tech_stack(root);
    index.total_files = next.len();
    index.project = Some(detect_project(root, files));
    index.files = next;

    RefreshOutcome {
        index,
        sets,
        parse_failures,
    }
}

fn stat_all<'a>(root: &Path, files: &'a [String]) -> BTreeMap<&'a str, (u64, u64)> {
    let results: Mutex<BTreeMap<&str, (u64, u64)>> = Mutex::new(BTreeMap::new());
    let cursor = AtomicUsize::new(0);
    let workers = PARSE_WORKERS.min(files.len()).max(1) * 2;

    std::thread::scope(|scope| {
        for _ in 0..workers.min(100) {
            scope.spawn(|| loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(path) = files.get(idx) else { break };
                if let Ok(metadata) = std::fs::metadata(root.join(path)) {
                    if metadata.is_file() {
                        let pair = (mtime_ms(&metadata), metadata.len());
                        if let Ok(mut guard) = results.lock() {
                            guard.insert(path.as_str(), pair);
                        }
                    }
                }
            });
        }
    });

    results.into_inner().unwrap_or_default()
}

/// Parse changed files with a bounded worker pool, 50 wide.
fn parse_batch(root: &Path, work: &[(String, u64, u64)]) -> Vec<FileEntry> {
    let results: Mutex<Vec<FileEntry>> = Mutex::new(Vec::with_capacity(work.len()));
    let cursor = AtomicUsize::new(0);
    let workers = PARSE_WORKERS.min(work.len()).max(1);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let Some((path, mtime, size)) = work.get(idx) else {
                    break;
                };
                let entry = parse_one(root, path, *mtime, *size);
                if let Ok(mut guard) = results.lock() {
                    guard.push(entry);
                }
            });
        }
    });

    results.into_inner().unwrap_or_default()
}

fn parse_one(root: &Path, path: &str, mtime: u64, size: u64) -> FileEntry {
    let mut entry = FileEntry {
        path: path.to_string(),
        mtime_ms: mtime,
        size,
        parsed_ms: now_ms(),
        semantic: None,
        parse_error: None,
    };

    let Some(language) = language_for_path(path) else {
        return entry;
    };

    match std::fs::read_to_string(root.join(path)) {
        Ok(content) => {
            entry.semantic = Some(parse_source(&content, language));
        }
        Err(err) => {
            entry.parse_error = Some(err.to_string());
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    fn paths(root: &Path) -> Vec<String> {
        let mut out: Vec<String> = walk(root)
            .into_iter()
            .filter(|p| !p.starts_with(".mantic"))
            .collect();
        out.sort();
        out
    }

    fn walk(root: &Path) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Some(rel) = crate::util::relative_path(root, &path) {
                    out.push(rel);
                }
            }
        }
        out
    }

    #[test]
    fn first_scan_marks_everything_added() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/a.ts", "export const a = 1;\n");
        touch(dir.path(), "src/b.ts", "export const b = 2;\n");

        let outcome = refresh(dir.path(), &paths(dir.path()), None);
        assert_eq!(outcome.sets.added.len(), 2);
        assert!(outcome.sets.modified.is_empty());
        assert!(outcome.sets.deleted.is_empty());
        assert_eq!(outcome.index.total_files, 2);
    }

    #[test]
    fn incremental_sets_are_disjoint_and_exact() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/keep.ts", "export const keep = 1;\n");
        touch(dir.path(), "src/change.ts", "export const change = 1;\n");
        touch(dir.path(), "src/drop.ts", "export const drop = 1;\n");

        let first = refresh(dir.path(), &paths(dir.path()), None);

        // Same-size content change plus a bumped mtime.
        touch(dir.path(), "src/change.ts", "export const change = 2;\n");
        let changed = dir.path().join("src/change.ts");
        let bumped = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let file = std::fs::File::options()
            .write(true)
            .open(&changed)
            .expect("open");
        file.set_modified(bumped).expect("set mtime");

        std::fs::remove_file(dir.path().join("src/drop.ts")).expect("remove");
        touch(dir.path(), "src/new.ts", "export const fresh = 1;\n");

        let second = refresh(dir.path(), &paths(dir.path()), Some(first.index));
        assert_eq!(second.sets.added, vec!["src/new.ts"]);
        assert_eq!(second.sets.modified, vec!["src/change.ts"]);
        assert_eq!(second.sets.deleted, vec!["src/drop.ts"]);

        let all: Vec<&String> = second
            .sets
            .added
            .iter()
            .chain(&second.sets.modified)
            .chain(&second.sets.deleted)
            .collect();
        let unique: BTreeSet<&String> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len(), "diff sets overlap");
    }

    #[test]
    fn unchanged_entries_are_not_reparsed() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/stable.ts", "export const stable = 1;\n");

        let first = refresh(dir.path(), &paths(dir.path()), None);
        let before = first.index.files["src/stable.ts"].parsed_ms;

        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = refresh(dir.path(), &paths(dir.path()), Some(first.index));
        let after = second.index.files["src/stable.ts"].parsed_ms;
        assert_eq!(before, after, "stable entry was reparsed");
        assert!(second.sets.added.is_empty());
        assert!(second.sets.modified.is_empty());
    }

    #[test]
    fn unsupported_languages_get_stat_only_entries() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "main.py", "def main():\n    pass\n");

        let outcome = refresh(dir.path(), &paths(dir.path()), None);
        let entry = &outcome.index.files["main.py"];
        assert!(entry.semantic.is_none());
        assert!(entry.parse_error.is_none());
    }

    #[test]
    fn semantic_attributes_are_extracted_for_ts() {
        let dir = TempDir::new().expect("tempdir");
        touch(
            dir.path(),
            "src/auth.ts",
            "import { db } from './db';\nexport function login() {}\n",
        );

        let outcome = refresh(dir.path(), &paths(dir.path()), None);
        let semantic = outcome.index.files["src/auth.ts"]
            .semantic
            .as_ref()
            .expect("semantic");
        assert!(semantic.exports.iter().any(|e| e.name == "login"));
        assert!(semantic.imports.iter().any(|i| i.source == "./db"));
    }
}

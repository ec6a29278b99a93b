// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted semantic index.
//!
//! A JSON document under `.mantic/index.json` mapping repo-relative paths
//! to stat signatures and extracted identifiers. It is authoritative only
//! when its version and project root match the running scan; anything
//! else is discarded and rebuilt.

pub mod parse;
pub mod refresh;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::errors::IndexInvalidError;
use crate::util::{atomic_write_bytes, mtime_ms, now_ms, STATE_DIR};
use parse::ParsedSource;

/// Index schema is tied to the crate version; a mismatch discards it.
pub const INDEX_VERSION: &str = env!("CARGO_PKG_VERSION");

const INDEX_FILE: &str = "index.json";
const MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;
const LRU_CAPACITY: usize = 3;
const LRU_TTL_SECS: u64 = 5 * 60;

const PACKAGE_MANIFESTS: &[&str] = &["package.json", "Cargo.toml", "pyproject.toml", "go.mod"];

/// One indexed file: stat signature plus extracted identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub mtime_ms: u64,
    pub size: u64,
    pub parsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<ParsedSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheIndex {
    pub version: String,
    pub last_scan_ms: u64,
    pub project_root: String,
    pub tech_stack: String,
    pub total_files: usize,
    pub files: BTreeMap<String, FileEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectMeta>,
}

impl CacheIndex {
    pub fn new(root: &Path) -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            last_scan_ms: 0,
            project_root: root_string(root),
            tech_stack: String::new(),
            total_files: 0,
            files: BTreeMap::new(),
            project: None,
        }
    }

    /// Entries whose mtime falls within the trailing window, for recency
    /// boosting.
    pub fn recent_paths(&self, window_ms: u64) -> Vec<String> {
        let now = now_ms();
        self.files
            .values()
            .filter(|e| now.saturating_sub(e.mtime_ms) <= window_ms)
            .map(|e| e.path.clone())
            .collect()
    }
}

fn root_string(root: &Path) -> String {
    root.canonicalize()
        .unwrap_or_else(|_| root.to_path_buf())
        .to_string_lossy()
        .to_string()
}

pub fn index_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(INDEX_FILE)
}

/// Load and validate the persisted index for `root`.
///
/// Returns None (never an error) when the file is missing, corrupt, from
/// another version, for another root, older than 24 hours, or older than
/// the package manifest. Corruption is reported once on stderr; routine
/// invalidation is silent.
pub fn load(root: &Path) -> Option<CacheIndex> {
    match try_load(root) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("mantic: {err}");
            None
        }
    }
}

/// Load the index, distinguishing a corrupt document from a routine
/// miss. A missing file and every silent-invalidation condition are
/// `Ok(None)`; unparsable JSON is the typed error.
pub fn try_load(root: &Path) -> std::result::Result<Option<CacheIndex>, IndexInvalidError> {
    let path = index_path(root);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    let index: CacheIndex = serde_json::from_str(&content).map_err(|err| IndexInvalidError {
        index_path: path.display().to_string(),
        reason: format!("unreadable JSON: {err}"),
    })?;

    if index.version != INDEX_VERSION {
        return Ok(None);
    }
    if index.project_root != root_string(root) {
        return Ok(None);
    }
    if now_ms().saturating_sub(index.last_scan_ms) > MAX_AGE_MS {
        return Ok(None);
    }
    if manifest_mtime_ms(root) > index.last_scan_ms {
        // Tech stack may have changed; force a full rebuild.
        return Ok(None);
    }

    Ok(Some(index))
}

/// Persist the index atomically, plus a `.gitignore` companion so the
/// state directory stays out of version control by default.
pub fn save(root: &Path, index: &CacheIndex) -> Result<()> {
    let path = index_path(root);
    let content = serde_json::to_string_pretty(index).context("serialize index")?;
    atomic_write_bytes(&path, content.as_bytes())?;

    let gitignore = root.join(STATE_DIR).join(".gitignore");
    if !gitignore.exists() {
        atomic_write_bytes(&gitignore, b"*\n!.gitignore\n")?;
    }
    Ok(())
}

/// Newest mtime across recognised package manifests in the root.
fn manifest_mtime_ms(root: &Path) -> u64 {
    PACKAGE_MANIFESTS
        .iter()
        .filter_map(|name| std::fs::metadata(root.join(name)).ok())
        .map(|m| mtime_ms(&m))
        .max()
        .unwrap_or(0)
}

struct LruSlot {
    root: PathBuf,
    loaded_at: Instant,
    index: Arc<CacheIndex>,
}

static LRU: Mutex<Vec<LruSlot>> = Mutex::new(Vec::new());

/// Load through a small in-process LRU so repeated queries inside one
/// process skip the disk read for five minutes.
pub fn load_cached(root: &Path) -> Option<Arc<CacheIndex>> {
    let key = root.to_path_buf();
    if let Ok(mut guard) = LRU.lock() {
        if let Some(pos) = guard.iter().position(|slot| slot.root == key) {
            if guard[pos].loaded_at.elapsed().as_secs() < LRU_TTL_SECS {
                let slot = guard.remove(pos);
                let index = Arc::clone(&slot.index);
                guard.push(slot);
                return Some(index);
            }
            guard.remove(pos);
        }
    }

    let index = Arc::new(load(root)?);
    store_cached(root, Arc::clone(&index));
    Some(index)
}

/// Replace the cached copy after a refresh.
pub fn store_cached(root: &Path, index: Arc<CacheIndex>) {
    if let Ok(mut guard) = LRU.lock() {
        let key = root.to_path_buf();
        guard.retain(|slot| slot.root != key);
        if guard.len() >= LRU_CAPACITY {
            guard.remove(0);
        }
        guard.push(LruSlot {
            root: key,
            loaded_at: Instant::now(),
            index,
        });
    }
}

/// Drop all cached indexes. Tests only.
pub fn reset_cache() {
    if let Ok(mut guard) = LRU.lock() {
        guard.clear();
    }
}

/// Detect the tech stack from marker files in the root.
pub fn detect_tech_stack(root: &Path) -> String {
    let mut stack = Vec::new();
    if root.join("package.json").exists() {
        if root.join("tsconfig.json").exists() {
            stack.push("typescript");
        } else {
            stack.push("javascript");
        }
        stack.push("node");
    }
    if root.join("Cargo.toml").exists() {
        stack.push("rust");
    }
    if root.join("go.mod").exists() {
        stack.push("go");
    }
    if root.join("pyproject.toml").exists() || root.join("requirements.txt").exists() {
        stack.push("python");
    }
    if stack.is_empty() {
        "unknown".to_string()
    } else {
        stack.join("+")
    }
}

/// Coarse project shape: monorepo / app / library, plus capability flags.
pub fn detect_project(root: &Path, files: &[String]) -> ProjectMeta {
    let monorepo = files
        .iter()
        .any(|f| f.starts_with("packages/") || f.starts_with("apps/"));
    let has_tests = files
        .iter()
        .any(|f| matches!(crate::classify::classify(f), crate::classify::FileKind::Test));
    let has_ci = files.iter().any(|f| f.starts_with(".github/workflows/"));

    let mut capabilities = Vec::new();
    if has_tests {
        capabilities.push("tests".to_string());
    }
    if has_ci {
        capabilities.push("ci".to_string());
    }

    ProjectMeta {
        project_type: if monorepo { "monorepo" } else { "app" }.to_string(),
        capabilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: &str, mtime: u64) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            mtime_ms: mtime,
            size: 10,
            parsed_ms: mtime,
            semantic: None,
            parse_error: None,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms();
        index.tech_stack = "typescript+node".to_string();
        index.total_files = 1;
        index
            .files
            .insert("src/a.ts".to_string(), entry("src/a.ts", 1));

        save(dir.path(), &index).expect("save");
        let loaded = load(dir.path()).expect("load");
        assert_eq!(loaded, index);
        assert!(dir.path().join(".mantic/.gitignore").exists());
    }

    #[test]
    fn version_mismatch_discards_index() {
        let dir = TempDir::new().expect("tempdir");
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms();
        index.version = "0.0.0-other".to_string();
        save(dir.path(), &index).expect("save");
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn foreign_root_discards_index() {
        let dir = TempDir::new().expect("tempdir");
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms();
        index.project_root = "/somewhere/else".to_string();
        save(dir.path(), &index).expect("save");
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn stale_index_discarded_after_24h() {
        let dir = TempDir::new().expect("tempdir");
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms().saturating_sub(MAX_AGE_MS + 1000);
        save(dir.path(), &index).expect("save");
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn newer_package_manifest_invalidates() {
        let dir = TempDir::new().expect("tempdir");
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms().saturating_sub(60_000);
        save(dir.path(), &index).expect("save");
        assert!(load(dir.path()).is_some());

        std::fs::write(dir.path().join("package.json"), "{}\n").expect("write manifest");
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn corrupt_index_is_discarded_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let path = index_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(load(dir.path()).is_none());

        let err = try_load(dir.path()).expect_err("corruption is typed");
        assert!(err.reason.contains("unreadable JSON"));
        assert!(err.index_path.contains("index.json"));
    }

    #[test]
    fn missing_index_is_a_miss_not_corruption() {
        let dir = TempDir::new().expect("tempdir");
        assert!(try_load(dir.path()).expect("no error").is_none());
    }

    #[test]
    fn lru_returns_same_instance_within_ttl() {
        let dir = TempDir::new().expect("tempdir");
        reset_cache();
        let mut index = CacheIndex::new(dir.path());
        index.last_scan_ms = now_ms();
        save(dir.path(), &index).expect("save");

        let first = load_cached(dir.path()).expect("first load");
        let second = load_cached(dir.path()).expect("second load");
        assert!(Arc::ptr_eq(&first, &second));
        reset_cache();
    }

    #[test]
    fn tech_stack_detection() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("package.json"), "{}").expect("write");
        std::fs::write(dir.path().join("tsconfig.json"), "{}").expect("write");
        assert_eq!(detect_tech_stack(dir.path()), "typescript+node");
    }
}

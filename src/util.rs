// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared path and filesystem helpers.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Directory holding all persisted mantic state, relative to the scan root.
pub const STATE_DIR: &str = ".mantic";

/// Normalize a relative path string: forward slashes, no `.`/`..` segments.
pub fn normalize_rel_path(input: &str) -> String {
    let path = input.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            if !parts.is_empty() {
                parts.pop();
            }
            continue;
        }
        parts.push(part);
    }

    parts.join("/")
}

/// Relative forward-slash path of `abs` under `root`, if any.
pub fn relative_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let path = normalize_rel_path(&rel.to_string_lossy());
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Current wall clock as Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// mtime of a file as Unix milliseconds, 0 when unavailable.
pub fn mtime_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Write bytes to `path` via a temp file in the same directory plus rename,
/// so readers never observe a partial document.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("cannot atomically write {} without parent", path.display());
    };
    std::fs::create_dir_all(parent)?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("mantic"),
        std::process::id(),
        nonce
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", tmp_path.display()))?;
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        if path.exists() {
            let _ = std::fs::remove_file(path);
            std::fs::rename(&tmp_path, path).with_context(|| {
                format!(
                    "failed to replace {} with {} after rename error: {err}",
                    path.display(),
                    tmp_path.display()
                )
            })?;
        } else {
            return Err(err.into());
        }
    }

    Ok(())
}

/// Short hex id derived from process-local entropy.
pub fn short_id(len: usize) -> String {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let payload = format!("{}:{}", std::process::id(), nonce);
    let hash = blake3::hash(payload.as_bytes());
    hash.to_hex()[..len].to_string()
}

/// Levenshtein edit distance, used for close-match suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in [0,1]: edit distance over the longer string, with a floor
/// for whole-substring containment so `ButtonXyzzy` still surfaces `Button`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let edit = 1.0 - levenshtein(a, b) as f64 / longest as f64;

    let la = a.to_ascii_lowercase();
    let lb = b.to_ascii_lowercase();
    let shorter = la.chars().count().min(lb.chars().count());
    if shorter >= 4 && (la.contains(&lb) || lb.contains(&la)) {
        return edit.max(0.75);
    }
    edit
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata-only structural scoring.
//!
//! Every signal here derives from the path, the classification and the
//! intent. No file is opened in the hot path, and the final ordering is
//! total: score descending, then byte-wise path ascending.

pub mod weights;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classify::{classify, FileKind};
use crate::intent::IntentAnalysis;
use weights::{
    directory_weights, extension_weight, BOILERPLATE_STEMS, BUSINESS_SUFFIXES,
    ELIMINATED_EXTENSIONS, IMPL_DIRS,
};

/// Candidate count beyond which scoring shards across worker threads.
const PARALLEL_THRESHOLD: usize = 50_000;

/// Default number of scored files retained internally.
pub const DEFAULT_TOP_K: usize = 100;

/// One matched line inside a file, found by the smart filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMatch {
    pub line: usize,
    pub content: String,
    pub matched_keyword: String,
}

/// Optional stat-derived metadata attached to returned files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub bytes: u64,
    pub lines_estimate: u64,
    pub tokens_estimate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_ms: Option<u64>,
    pub confidence: f64,
}

/// A ranked file with explainable reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredFile {
    pub path: String,
    pub relevance_score: f64,
    pub match_reasons: Vec<String>,
    #[serde(skip)]
    pub kind: FileKind,
    pub file_type: String,
    pub is_imported: bool,
    pub is_exported: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub excerpts: Vec<LineMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<crate::graph::ImpactSummary>,
}

impl ScoredFile {
    fn new(path: &str, kind: FileKind) -> Self {
        Self {
            path: path.to_string(),
            relevance_score: 0.0,
            match_reasons: Vec::new(),
            kind,
            file_type: kind.as_str().to_string(),
            is_imported: false,
            is_exported: false,
            excerpts: Vec::new(),
            metadata: None,
            impact: None,
        }
    }

    pub fn push_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.match_reasons.iter().any(|r| *r == reason) {
            self.match_reasons.push(reason);
        }
    }
}

/// Session-supplied additive boost for a path.
#[derive(Debug, Clone)]
pub struct Boost {
    pub amount: f64,
    pub reason: String,
}

/// Score candidates against an intent. `boosts` come from the session
/// manager and are applied additively before clamping.
pub fn score_files(
    candidates: &[String],
    intent: &IntentAnalysis,
    boosts: &HashMap<String, Boost>,
    top_k: usize,
) -> Vec<ScoredFile> {
    let mut scored = if candidates.len() > PARALLEL_THRESHOLD {
        score_sharded(candidates, intent, boosts)
    } else {
        candidates
            .iter()
            .filter_map(|path| score_one(path, intent, boosts))
            .collect::<Vec<_>>()
    };

    sort_scored(&mut scored);
    scored.truncate(top_k);
    scored
}

/// Stable total order: score descending, path ascending byte-wise.
pub fn sort_scored(scored: &mut [ScoredFile]) {
    scored.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn score_sharded(
    candidates: &[String],
    intent: &IntentAnalysis,
    boosts: &HashMap<String, Boost>,
) -> Vec<ScoredFile> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .max(2);
    let chunk_size = candidates.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .filter_map(|path| score_one(path, intent, boosts))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut merged = Vec::with_capacity(candidates.len());
        for handle in handles {
            merged.extend(handle.join().unwrap_or_default());
        }
        merged
    })
}

fn score_one(
    path: &str,
    intent: &IntentAnalysis,
    boosts: &HashMap<String, Boost>,
) -> Option<ScoredFile> {
    if is_eliminated(path) {
        return None;
    }

    let kind = classify(path);
    let mut file = ScoredFile::new(path, kind);
    let non_impl = !matches!(kind, FileKind::Code | FileKind::Config);

    let stem = file_stem(path);
    let stem_folded = fold_identifier(&stem);
    let stem_words: Vec<&str> = stem.split(['-', '_']).filter(|w| !w.is_empty()).collect();

    let mut score = 0.0_f64;

    for keyword in &intent.keywords {
        let kw = keyword.to_ascii_lowercase();
        let kw_folded = fold_identifier(&kw);
        if kw_folded.is_empty() {
            continue;
        }

        if stem_folded == kw_folded {
            score += if non_impl { 110.0 } else { 100.0 };
            file.push_reason(format!("exact-file:{keyword}"));
        } else if stem.contains(&kw) {
            score += if non_impl { 55.0 } else { 50.0 };
            file.push_reason("filename-match");
        } else if stem_words.iter().any(|w| *w == kw) {
            score += if non_impl { 33.0 } else { 30.0 };
            file.push_reason("keyword-match");
        }
    }

    let mut dir_weight = 0.0;
    for entry in directory_weights(intent.category) {
        if dir_matches(path, entry.prefix) {
            dir_weight += entry.weight;
        }
    }
    if dir_weight > 0.0 {
        score += 20.0 * dir_weight;
        file.push_reason("category-dir");
    }

    if IMPL_DIRS.iter().any(|d| dir_matches(path, d)) {
        score += 40.0;
        file.push_reason("impl-dir");
    }

    let lower = path.to_ascii_lowercase();
    if BUSINESS_SUFFIXES.iter().any(|s| lower.contains(s)) {
        score *= 1.5;
        file.push_reason("business-logic");
    }
    if BOILERPLATE_STEMS.contains(&stem_folded.as_str()) {
        score *= 0.3;
        file.push_reason("boilerplate");
    }

    score *= extension_weight(path);

    let depth = path.matches('/').count();
    if depth > 5 {
        score -= (depth - 5) as f64;
    }

    match kind {
        FileKind::Code | FileKind::Config => {
            score += 30.0;
            file.push_reason("canonical");
        }
        FileKind::Test => {
            score -= 40.0;
            file.push_reason("deprioritized:test");
        }
        FileKind::Docs => {
            score -= 50.0;
            file.push_reason("deprioritized:docs");
        }
        _ => {}
    }

    if let Some(boost) = boosts.get(path) {
        score += boost.amount;
        file.push_reason(boost.reason.clone());
    }

    file.relevance_score = score.max(0.0);
    Some(file)
}

fn is_eliminated(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let lower = basename.to_ascii_lowercase();
    if lower.ends_with(".min.js") || lower.ends_with(".min.css") {
        return true;
    }
    match lower.rsplit('.').next() {
        Some(ext) if ext != lower => ELIMINATED_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

fn file_stem(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let stem = match basename.rfind('.') {
        Some(idx) if idx > 0 => &basename[..idx],
        _ => basename,
    };
    stem.to_ascii_lowercase()
}

/// Fold an identifier for exact comparison: lowercase, separators removed,
/// so `ScriptController` matches `script_controller`.
fn fold_identifier(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn dir_matches(path: &str, dir: &str) -> bool {
    path.starts_with(dir) || path.contains(&format!("/{dir}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::analyze;

    fn score_all(paths: &[&str], query: &str) -> Vec<ScoredFile> {
        let intent = analyze(query);
        let candidates: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        score_files(&candidates, &intent, &HashMap::new(), DEFAULT_TOP_K)
    }

    #[test]
    fn scores_are_clamped_non_negative() {
        let scored = score_all(&["docs/notes.md"], "payment");
        assert!(scored.iter().all(|f| f.relevance_score >= 0.0));
    }

    #[test]
    fn implementation_outranks_its_test() {
        let scored = score_all(
            &[
                "src/auth/login.ts",
                "src/auth/login.test.ts",
                "docs/auth.md",
                "README.md",
            ],
            "authentication logic",
        );
        assert_eq!(scored[0].path, "src/auth/login.ts");
        let test_rank = scored
            .iter()
            .position(|f| f.path == "src/auth/login.test.ts")
            .expect("test file present");
        assert!(test_rank > 0);
        assert!(scored[test_rank].relevance_score < scored[0].relevance_score);
    }

    #[test]
    fn pascal_case_keyword_matches_snake_case_file() {
        let scored = score_all(
            &[
                "content/renderer/bindings/core/v8/script_controller.h",
                "content/renderer/bindings/core/v8/script_controller.cc",
                "content/renderer/media/audio_sink.cc",
            ],
            "ScriptController",
        );
        assert_eq!(
            scored[0].path,
            "content/renderer/bindings/core/v8/script_controller.cc"
        );
        assert_eq!(
            scored[1].path,
            "content/renderer/bindings/core/v8/script_controller.h"
        );
        assert!(scored[0].relevance_score > scored[2].relevance_score);
        assert!(scored[0]
            .match_reasons
            .iter()
            .any(|r| r.starts_with("exact-file:")));
    }

    #[test]
    fn ordering_ties_break_on_path() {
        let scored = score_all(&["src/b.ts", "src/a.ts"], "");
        assert_eq!(scored[0].path, "src/a.ts");
        assert_eq!(scored[1].path, "src/b.ts");
        assert_eq!(scored[0].relevance_score, scored[1].relevance_score);
    }

    #[test]
    fn binary_and_lock_files_are_eliminated() {
        let scored = score_all(
            &["logo.png", "yarn.lock", "debug.log", "src/app.css.map", "src/ok.ts"],
            "logo",
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].path, "src/ok.ts");
    }

    #[test]
    fn business_logic_multiplier_applies() {
        let scored = score_all(
            &["src/payments/stripe.service.ts", "src/payments/refund.ts"],
            "stripe payment",
        );
        assert_eq!(scored[0].path, "src/payments/stripe.service.ts");
        assert!(scored[0].match_reasons.iter().any(|r| r == "business-logic"));
        let plain = score_all(&["src/payments/stripe.ts"], "stripe payment");
        assert!(plain[0].relevance_score > 0.0);
    }

    #[test]
    fn boilerplate_names_are_downweighted() {
        let scored = score_all(
            &["src/checkout/index.ts", "src/checkout/cart.ts"],
            "checkout cart",
        );
        assert_eq!(scored[0].path, "src/checkout/cart.ts");
        let index = scored.iter().find(|f| f.path == "src/checkout/index.ts").unwrap();
        assert!(index.match_reasons.iter().any(|r| r == "boilerplate"));
    }

    #[test]
    fn depth_penalty_beyond_five_levels() {
        let shallow = score_all(&["src/a/b/core.ts"], "")[0].relevance_score;
        let deep = score_all(&["src/a/b/c/d/e/f/core.ts"], "")[0].relevance_score;
        assert!(deep < shallow);
    }

    #[test]
    fn session_boost_is_additive_with_reason() {
        let intent = analyze("login");
        let mut boosts = HashMap::new();
        boosts.insert(
            "src/auth/login.ts".to_string(),
            Boost {
                amount: 70.0,
                reason: "context-carryover".to_string(),
            },
        );
        let candidates = vec!["src/auth/login.ts".to_string()];
        let with = score_files(&candidates, &intent, &boosts, DEFAULT_TOP_K);
        let without = score_files(&candidates, &intent, &HashMap::new(), DEFAULT_TOP_K);
        assert!(
            (with[0].relevance_score - without[0].relevance_score - 70.0).abs() < 1e-9
        );
        assert!(with[0].match_reasons.iter().any(|r| r == "context-carryover"));
    }

    #[test]
    fn deterministic_across_runs() {
        let paths = &[
            "src/auth/login.ts",
            "src/auth/token.ts",
            "src/components/LoginForm.tsx",
            "config/auth.yml",
        ];
        let a = score_all(paths, "login token");
        let b = score_all(paths, "login token");
        let a_pairs: Vec<_> = a.iter().map(|f| (&f.path, f.relevance_score)).collect();
        let b_pairs: Vec<_> = b.iter().map(|f| (&f.path, f.relevance_score)).collect();
        assert_eq!(a_pairs, b_pairs);
    }
}

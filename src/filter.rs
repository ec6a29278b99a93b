// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index-aware rescoring (the smart filter).
//!
//! Runs only when the semantic index is fresh and the intent is confident
//! enough. Constraints are data: each variant carries a static cost and a
//! selectivity estimate, and they are applied cheapest-information-first
//! with an early exit once enough strong candidates exist.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::index::CacheIndex;
use crate::intent::{Category, IntentAnalysis};
use crate::score::{sort_scored, LineMatch, ScoredFile};
use crate::util::{atomic_write_bytes, now_ms, STATE_DIR};

const RECENT_INDEX_WINDOW_MS: u64 = 10 * 60 * 1000;
const RECENCY_BOOST: f64 = 200.0;
const CARRYOVER_BOOST: f64 = 150.0;
const LEARNED_BOOST: f64 = 25.0;
const EARLY_EXIT_SCORE: f64 = 50.0;
const EARLY_EXIT_COUNT: usize = 5;
const LINE_DETECT_FILES: usize = 10;
const LINE_DETECT_MATCHES: usize = 3;

/// Keywords too generic to drive exact-line detection.
const GENERIC_UI_TERMS: &[&str] = &[
    "button", "component", "page", "view", "form", "modal", "screen", "input", "icon", "menu",
    "file", "code",
];

/// One filter constraint. Cost and selectivity are static properties of
/// the variant, not of any instance state.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Usage,
    Import(String),
    Export(String),
    ComponentType(String),
    Keyword(String),
    PathMatch(String),
}

impl Constraint {
    pub fn cost(&self) -> f64 {
        match self {
            Constraint::Usage => 8.0,
            Constraint::ComponentType(_) => 5.0,
            Constraint::Import(_) | Constraint::Export(_) => 2.0,
            Constraint::Keyword(_) | Constraint::PathMatch(_) => 1.0,
        }
    }

    pub fn selectivity(&self) -> f64 {
        match self {
            Constraint::Usage => 0.9,
            Constraint::Export(_) => 0.7,
            Constraint::Import(_) => 0.6,
            Constraint::ComponentType(_) => 0.5,
            Constraint::Keyword(_) => 0.3,
            Constraint::PathMatch(_) => 0.2,
        }
    }

    fn rank(&self) -> f64 {
        self.selectivity() / (self.cost() + 0.1)
    }
}

/// Legacy one-shot pointer at `.mantic/session.json`, used only as a
/// carryover hint between consecutive queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPointer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request: Option<LastRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRequest {
    pub prompt: String,
    pub keywords: Vec<String>,
    pub top_files: Vec<String>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPatterns {
    #[serde(default)]
    pub patterns: Vec<LearnedPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub keywords: Vec<String>,
    pub paths: Vec<String>,
    pub usage_count: u64,
}

pub struct FilterContext<'a> {
    pub root: &'a Path,
    pub index: &'a CacheIndex,
    pub intent: &'a IntentAnalysis,
    /// Paths reported dirty by version control.
    pub git_modified: &'a [String],
}

/// Whether the smart filter should replace the structural output.
pub fn is_applicable(intent: &IntentAnalysis) -> bool {
    intent.confidence > 0.5 && intent.category != Category::General
}

/// Re-score `scored` using the semantic index.
pub fn smart_filter(mut scored: Vec<ScoredFile>, ctx: &FilterContext) -> Vec<ScoredFile> {
    let constraints = build_constraints(ctx.intent);

    for constraint in &constraints {
        apply_constraint(&mut scored, constraint, ctx);
        let strong = scored
            .iter()
            .filter(|f| f.relevance_score > EARLY_EXIT_SCORE)
            .count();
        if strong >= EARLY_EXIT_COUNT {
            break;
        }
    }

    apply_recency(&mut scored, ctx);
    scored = apply_carryover(scored, ctx);
    apply_learned_patterns(&mut scored, ctx);

    for file in &mut scored {
        file.relevance_score = file.relevance_score.max(0.0);
    }
    sort_scored(&mut scored);
    scored
}

/// Usage goes first on selectivity grounds; the rest are ordered by
/// selectivity per unit cost.
fn build_constraints(intent: &IntentAnalysis) -> Vec<Constraint> {
    let mut rest: Vec<Constraint> = Vec::new();
    for keyword in &intent.keywords {
        let kw = keyword.to_ascii_lowercase();
        rest.push(Constraint::Import(kw.clone()));
        rest.push(Constraint::Export(kw.clone()));
        if intent.category == Category::Ui {
            rest.push(Constraint::ComponentType(kw.clone()));
        }
        rest.push(Constraint::Keyword(kw.clone()));
        rest.push(Constraint::PathMatch(kw));
    }
    rest.sort_by(|a, b| {
        b.rank()
            .partial_cmp(&a.rank())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut constraints = vec![Constraint::Usage];
    constraints.extend(rest);
    constraints
}

fn apply_constraint(scored: &mut [ScoredFile], constraint: &Constraint, ctx: &FilterContext) {
    match constraint {
        Constraint::Usage => apply_usage(scored, ctx),
        Constraint::Import(kw) => {
            for file in scored.iter_mut() {
                let Some(semantic) = semantic_of(ctx.index, &file.path) else {
                    continue;
                };
                let hit = semantic.imports.iter().any(|i| {
                    i.source.to_ascii_lowercase().contains(kw)
                        || i.names.iter().any(|n| n.to_ascii_lowercase().contains(kw))
                });
                if hit {
                    file.relevance_score += 20.0;
                    file.push_reason(format!("imports:{kw}"));
                }
            }
        }
        Constraint::Export(kw) => {
            for file in scored.iter_mut() {
                let Some(semantic) = semantic_of(ctx.index, &file.path) else {
                    continue;
                };
                let hit = semantic
                    .exports
                    .iter()
                    .any(|e| e.name.to_ascii_lowercase().contains(kw));
                if hit {
                    file.relevance_score += 25.0;
                    file.push_reason(format!("exports:{kw}"));
                }
            }
        }
        Constraint::ComponentType(kw) => {
            for file in scored.iter_mut() {
                let Some(semantic) = semantic_of(ctx.index, &file.path) else {
                    continue;
                };
                if semantic
                    .components
                    .iter()
                    .any(|c| c.to_ascii_lowercase().contains(kw))
                {
                    file.relevance_score += 15.0;
                    file.push_reason(format!("component:{kw}"));
                }
            }
        }
        Constraint::Keyword(kw) => {
            for file in scored.iter_mut() {
                let Some(semantic) = semantic_of(ctx.index, &file.path) else {
                    continue;
                };
                if semantic.keywords.iter().any(|k| k == kw) {
                    file.relevance_score += 5.0;
                    file.push_reason(format!("keyword:{kw}"));
                }
            }
        }
        Constraint::PathMatch(kw) => {
            for file in scored.iter_mut() {
                let stem = file
                    .path
                    .rsplit('/')
                    .next()
                    .and_then(|b| b.split('.').next())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if stem == *kw {
                    file.relevance_score += 100.0;
                    file.push_reason(format!("exact-file:{kw}"));
                } else if file.path.to_ascii_lowercase().contains(kw) {
                    file.relevance_score += 3.0;
                }
            }
        }
    }
}

/// Usage: the file exports something and at least one other indexed file
/// imports it (basename heuristic). Only judged for files the index
/// actually parsed.
fn apply_usage(scored: &mut [ScoredFile], ctx: &FilterContext) {
    let mut imported_stems: HashSet<String> = HashSet::new();
    for entry in ctx.index.files.values() {
        let Some(semantic) = entry.semantic.as_ref() else {
            continue;
        };
        for import in &semantic.imports {
            let stem = import
                .source
                .rsplit('/')
                .next()
                .unwrap_or(&import.source)
                .split('.')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if !stem.is_empty() {
                imported_stems.insert(stem);
            }
        }
    }

    for file in scored.iter_mut() {
        let Some(semantic) = semantic_of(ctx.index, &file.path) else {
            continue;
        };
        let has_exports = !semantic.exports.is_empty();
        let stem = file
            .path
            .rsplit('/')
            .next()
            .and_then(|b| b.split('.').next())
            .unwrap_or("")
            .to_ascii_lowercase();
        let is_imported = imported_stems.contains(&stem);

        file.is_exported = has_exports;
        file.is_imported = is_imported;

        if has_exports && is_imported {
            file.relevance_score += 30.0;
            file.push_reason("in-use");
        } else {
            file.relevance_score -= 50.0;
        }
    }
}

fn semantic_of<'a>(
    index: &'a CacheIndex,
    path: &str,
) -> Option<&'a crate::index::parse::ParsedSource> {
    index.files.get(path).and_then(|e| e.semantic.as_ref())
}

/// +200 for files modified in version control or touched within the last
/// ten minutes according to the index.
fn apply_recency(scored: &mut [ScoredFile], ctx: &FilterContext) {
    let mut recent: BTreeSet<String> = ctx.git_modified.iter().cloned().collect();
    for path in ctx.index.recent_paths(RECENT_INDEX_WINDOW_MS) {
        recent.insert(path);
    }

    for file in scored.iter_mut() {
        if recent.contains(&file.path) {
            file.relevance_score += RECENCY_BOOST;
            file.push_reason("recently-modified");
        }
    }
}

/// Keyword-overlap carryover from the previous query. High overlap keeps
/// only the prior files; moderate overlap boosts them.
fn apply_carryover(scored: Vec<ScoredFile>, ctx: &FilterContext) -> Vec<ScoredFile> {
    let Some(last) = load_legacy_pointer(ctx.root) else {
        return scored;
    };
    if last.top_files.is_empty() || ctx.intent.keywords.is_empty() {
        return scored;
    }

    let prior: HashSet<String> = last
        .keywords
        .iter()
        .map(|k| k.to_ascii_lowercase())
        .collect();
    let overlapping = ctx
        .intent
        .keywords
        .iter()
        .filter(|k| prior.contains(&k.to_ascii_lowercase()))
        .count();
    let overlap = overlapping as f64 / ctx.intent.keywords.len() as f64;

    let prior_files: HashSet<&str> = last.top_files.iter().map(String::as_str).collect();

    if overlap > 0.75 {
        let mut kept: Vec<ScoredFile> = scored
            .into_iter()
            .filter(|f| prior_files.contains(f.path.as_str()))
            .collect();
        for file in &mut kept {
            file.push_reason("context-carryover");
        }
        return kept;
    }

    let mut scored = scored;
    if overlap > 0.3 {
        for file in &mut scored {
            if prior_files.contains(file.path.as_str()) {
                file.relevance_score += CARRYOVER_BOOST;
                file.push_reason("context-carryover");
            }
        }
    }
    scored
}

fn apply_learned_patterns(scored: &mut [ScoredFile], ctx: &FilterContext) {
    let Some(patterns) = load_patterns(ctx.root) else {
        return;
    };
    let signature = keyword_signature(&ctx.intent.keywords);
    let Some(pattern) = patterns.patterns.iter().find(|p| p.keywords == signature) else {
        return;
    };

    let remembered: HashSet<&str> = pattern.paths.iter().map(String::as_str).collect();
    for file in scored.iter_mut() {
        if remembered.contains(file.path.as_str()) {
            file.relevance_score += LEARNED_BOOST;
            file.push_reason("learned-pattern");
        }
    }
}

fn keyword_signature(keywords: &[String]) -> Vec<String> {
    let mut signature: Vec<String> = keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
    signature.sort();
    signature.dedup();
    signature
}

fn patterns_path(root: &Path) -> std::path::PathBuf {
    root.join(STATE_DIR).join("search-patterns.json")
}

fn legacy_pointer_path(root: &Path) -> std::path::PathBuf {
    root.join(STATE_DIR).join("session.json")
}

fn load_patterns(root: &Path) -> Option<LearnedPatterns> {
    let content = std::fs::read_to_string(patterns_path(root)).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn load_legacy_pointer(root: &Path) -> Option<LastRequest> {
    let content = std::fs::read_to_string(legacy_pointer_path(root)).ok()?;
    let pointer: LegacyPointer = serde_json::from_str(&content).ok()?;
    pointer.last_request
}

pub fn save_legacy_pointer(root: &Path, prompt: &str, keywords: &[String], top_files: &[String]) {
    let pointer = LegacyPointer {
        last_request: Some(LastRequest {
            prompt: prompt.to_string(),
            keywords: keywords.to_vec(),
            top_files: top_files.to_vec(),
            timestamp: now_ms(),
        }),
    };
    if let Ok(content) = serde_json::to_string_pretty(&pointer) {
        if let Err(err) = atomic_write_bytes(&legacy_pointer_path(root), content.as_bytes()) {
            eprintln!("mantic: failed to save query pointer: {err:#}");
        }
    }
}

/// Remember which paths satisfied this keyword set, bumping the usage
/// count on repeats.
pub fn record_success(root: &Path, keywords: &[String], top_files: &[String]) {
    if keywords.is_empty() || top_files.is_empty() {
        return;
    }
    let signature = keyword_signature(keywords);
    let mut patterns = load_patterns(root).unwrap_or_default();

    match patterns
        .patterns
        .iter_mut()
        .find(|p| p.keywords == signature)
    {
        Some(existing) => {
            existing.usage_count += 1;
            existing.paths = top_files.to_vec();
        }
        None => patterns.patterns.push(LearnedPattern {
            keywords: signature,
            paths: top_files.to_vec(),
            usage_count: 1,
        }),
    }

    if let Ok(content) = serde_json::to_string_pretty(&patterns) {
        if let Err(err) = atomic_write_bytes(&patterns_path(root), content.as_bytes()) {
            eprintln!("mantic: failed to save search patterns: {err:#}");
        }
    }
}

/// For the strongest files, stream the content and surface up to three
/// matching lines for the primary keyword. JSX text beats prop lines,
/// prop lines beat plain string literals.
pub fn detect_lines(root: &Path, scored: &mut [ScoredFile], keywords: &[String]) {
    let Some(primary) = primary_keyword(keywords) else {
        return;
    };
    let needle = primary.to_ascii_lowercase();

    for file in scored.iter_mut().take(LINE_DETECT_FILES) {
        let Ok(content) = std::fs::read_to_string(root.join(&file.path)) else {
            continue;
        };

        let mut candidates: Vec<(i32, usize, String)> = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let lower = line.to_ascii_lowercase();
            if !lower.contains(&needle) {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('*') {
                continue;
            }
            candidates.push((line_priority(trimmed, &needle), idx + 1, trimmed.to_string()));
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates.truncate(LINE_DETECT_MATCHES);
        candidates.sort_by_key(|c| c.1);

        file.excerpts = candidates
            .into_iter()
            .map(|(_, line, content)| LineMatch {
                line,
                content,
                matched_keyword: primary.clone(),
            })
            .collect();
    }
}

/// First keyword that is neither a generic UI term nor filename-shaped.
fn primary_keyword(keywords: &[String]) -> Option<String> {
    keywords
        .iter()
        .find(|k| {
            let lower = k.to_ascii_lowercase();
            !k.contains('.') && !GENERIC_UI_TERMS.contains(&lower.as_str())
        })
        .or_else(|| keywords.first())
        .cloned()
}

fn line_priority(line: &str, needle: &str) -> i32 {
    let lower = line.to_ascii_lowercase();

    // Any occurrence sitting between a closing '>' and the next '<' is
    // JSX text content.
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(needle) {
        let pos = search_from + rel;
        let before = &lower[..pos];
        let after = &lower[pos + needle.len()..];
        let opened = before.rfind('<');
        let closed = before.rfind('>');
        if closed.is_some() && closed > opened && after.contains('<') {
            return 3;
        }
        search_from = pos + needle.len();
    }

    if lower.contains("={") || lower.contains("=\"") {
        return 2;
    }
    if lower.contains(&format!("'{needle}")) || lower.contains(&format!("\"{needle}")) {
        return 1;
    }
    0
}

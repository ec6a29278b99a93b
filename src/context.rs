// SPDX-License-Identifier: MIT OR Apache-2.0

//! Final result assembly: intent summary, ranked files with metadata,
//! advisory warnings, and entity validation against what actually exists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::classify::{canonical_basename, classify, FileKind};
use crate::index::CacheIndex;
use crate::intent::IntentAnalysis;
use crate::score::{FileMetadata, ScoredFile};
use crate::util::{mtime_ms, similarity};

const SIMILARITY_THRESHOLD: f64 = 0.7;
const HALLUCINATION_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSummary {
    pub category: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    pub entity_count: usize,
    pub found_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub project_type: String,
    pub tech_stack: String,
    pub total_scanned: usize,
    pub files_returned: usize,
    pub time_ms: u64,
    pub has_git_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitState {
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_files: Vec<String>,
}

/// The complete machine-readable search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub intent: IntentSummary,
    pub files: Vec<ScoredFile>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_state: Option<GitState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

/// Attach stat-derived metadata and per-file confidence to the survivors.
///
/// Confidence compares each score against the cohort median and mean:
/// `clamp((s/median * 0.6 + s/mean * 0.4) / 2, 0, 1)`.
pub fn attach_metadata(root: &Path, files: &mut [ScoredFile]) {
    let mut scores: Vec<f64> = files
        .iter()
        .map(|f| f.relevance_score)
        .filter(|s| *s > 0.0)
        .collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median = if scores.is_empty() {
        0.0
    } else {
        scores[scores.len() / 2]
    };
    let mean = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    for file in files.iter_mut() {
        let confidence = if median > 0.0 && mean > 0.0 {
            ((file.relevance_score / median * 0.6 + file.relevance_score / mean * 0.4) / 2.0)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };

        let Ok(stat) = std::fs::metadata(root.join(&file.path)) else {
            continue;
        };
        let bytes = stat.len();
        file.metadata = Some(FileMetadata {
            bytes,
            lines_estimate: bytes / 40,
            tokens_estimate: bytes / 4,
            modified_ms: Some(mtime_ms(&stat)),
            created_ms: stat
                .created()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64),
            confidence,
        });
    }
}

/// Canonical-duplicate analysis over the result set.
///
/// When a canonical file and its derivative both rank, the derivative is
/// advisory noise; when only derivatives rank, point at the canonical.
pub fn duplicate_warnings(files: &[ScoredFile], all_files: &[String]) -> Vec<Warning> {
    let mut groups: BTreeMap<String, Vec<&ScoredFile>> = BTreeMap::new();
    for file in files {
        groups
            .entry(canonical_basename(&file.path))
            .or_default()
            .push(file);
    }

    let mut warnings = Vec::new();
    for (basename, members) in groups {
        if basename.is_empty() {
            continue;
        }
        let canonical: Vec<&&ScoredFile> =
            members.iter().filter(|f| f.kind.is_canonical()).collect();
        let tests: Vec<&&ScoredFile> = members
            .iter()
            .filter(|f| f.kind == FileKind::Test)
            .collect();
        let docs: Vec<&&ScoredFile> = members
            .iter()
            .filter(|f| f.kind == FileKind::Docs)
            .collect();

        if let Some(first_canonical) = canonical.first() {
            for test in &tests {
                warnings.push(Warning {
                    kind: "duplicate_test".to_string(),
                    message: format!(
                        "{} is the test companion of {}",
                        test.path, first_canonical.path
                    ),
                    suggestions: vec![first_canonical.path.clone()],
                });
            }
            for doc in &docs {
                warnings.push(Warning {
                    kind: "duplicate_docs".to_string(),
                    message: format!(
                        "{} documents {}",
                        doc.path, first_canonical.path
                    ),
                    suggestions: vec![first_canonical.path.clone()],
                });
            }
        } else if !tests.is_empty() || !docs.is_empty() {
            let nearest = all_files
                .iter()
                .filter(|p| classify(p).is_canonical())
                .find(|p| canonical_basename(p) == basename);
            if let Some(nearest) = nearest {
                let derivative = tests
                    .first()
                    .map(|f| f.path.clone())
                    .or_else(|| docs.first().map(|f| f.path.clone()))
                    .unwrap_or_default();
                warnings.push(Warning {
                    kind: "prefer_canonical".to_string(),
                    message: format!(
                        "only derivative files matched for '{basename}'; {derivative} shadows {nearest}"
                    ),
                    suggestions: vec![nearest.clone()],
                });
            }
        }
    }

    warnings
}

/// Validate extracted entities against enumerated paths and indexed
/// symbols, suggesting close matches for anything unresolved.
pub fn validate_entities(
    intent: &IntentAnalysis,
    all_files: &[String],
    index: Option<&CacheIndex>,
) -> (Option<Validation>, Vec<Warning>) {
    let entity_count = intent.entities.total();
    if entity_count == 0 {
        return (None, Vec::new());
    }

    let mut known: Vec<String> = Vec::new();
    for path in all_files {
        let basename = path.rsplit('/').next().unwrap_or(path);
        known.push(basename.to_string());
        if let Some(idx) = basename.rfind('.') {
            if idx > 0 {
                known.push(basename[..idx].to_string());
            }
        }
        known.push(canonical_basename(path));
    }
    if let Some(index) = index {
        for entry in index.files.values() {
            if let Some(semantic) = &entry.semantic {
                known.extend(semantic.exports.iter().map(|e| e.name.clone()));
                known.extend(semantic.components.iter().cloned());
                known.extend(semantic.classes.iter().cloned());
                known.extend(semantic.functions.iter().map(|f| f.name.clone()));
                known.extend(semantic.types.iter().cloned());
            }
        }
    }
    known.sort();
    known.dedup();

    let mut warnings = Vec::new();
    let mut found = 0usize;

    for (bucket, entity) in intent.entities.iter_all() {
        let resolved = known.iter().any(|k| k.eq_ignore_ascii_case(entity));
        if resolved {
            found += 1;
            continue;
        }

        let mut suggestions: Vec<(f64, String)> = known
            .iter()
            .filter_map(|k| {
                let sim = similarity(entity, k);
                if sim >= SIMILARITY_THRESHOLD {
                    Some((sim, k.clone()))
                } else {
                    None
                }
            })
            .collect();
        suggestions.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        suggestions.truncate(3);

        warnings.push(Warning {
            kind: format!("{bucket}_not_found"),
            message: format!("'{entity}' was not found in this repository"),
            suggestions: suggestions.into_iter().map(|(_, s)| s).collect(),
        });
    }

    let unresolved_ratio = (entity_count - found) as f64 / entity_count as f64;
    let validation = Validation {
        is_valid: unresolved_ratio <= HALLUCINATION_RATIO,
        entity_count,
        found_count: found,
    };

    (Some(validation), warnings)
}

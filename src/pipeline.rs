// SPDX-License-Identifier: MIT OR Apache-2.0

//! The search pipeline: enumerate, analyse, score, refine, assemble.
//!
//! Both the CLI and the MCP server call into `run_search`; neither shells
//! out to the other.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::classify::{classify, FileKind};
use crate::config::Config;
use crate::context::{
    attach_metadata, duplicate_warnings, validate_entities, GitState, IntentSummary,
    ResponseMetadata, SearchResponse,
};
use crate::enumerate::{enumerate_with_timeout, git, EnumerateOptions, Strategy};
use crate::filter::{
    detect_lines, is_applicable, record_success, save_legacy_pointer, smart_filter, FilterContext,
};
use crate::graph::{analyze_impact, DependencyGraph};
use crate::index;
use crate::intent::analyze;
use crate::score::{score_files, Boost, DEFAULT_TOP_K};
use crate::session::{boost_candidates, SessionStore, ViewedFile};

/// Mutually exclusive file-type filters from the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Code,
    Config,
    Test,
}

impl TypeFilter {
    fn keeps(self, kind: FileKind) -> bool {
        match self {
            // Tests are still source code; they stay under --code, merely
            // deprioritised by the scorer.
            TypeFilter::Code => matches!(kind, FileKind::Code | FileKind::Test),
            TypeFilter::Config => kind == FileKind::Config,
            TypeFilter::Test => kind == FileKind::Test,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub root: PathBuf,
    pub filter: Option<TypeFilter>,
    pub include_generated: bool,
    pub impact: bool,
    pub session: Option<String>,
    pub max_files: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: &str, root: &Path) -> Self {
        Self {
            query: query.to_string(),
            root: root.to_path_buf(),
            filter: None,
            include_generated: false,
            impact: false,
            session: None,
            max_files: None,
        }
    }
}

/// Run one query end to end.
pub fn run_search(request: &SearchRequest) -> Result<SearchResponse> {
    let start = Instant::now();
    let config = Config::load_for_dir(&request.root);
    let max_files = config.merge_max_files(request.max_files);

    // A named session must exist before we score, so its boosts apply.
    let store = SessionStore::new(&request.root);
    let mut session = match &request.session {
        Some(id_or_name) => Some(store.load_required(id_or_name)?),
        None => None,
    };

    let enumeration = enumerate_with_timeout(
        &request.root,
        EnumerateOptions {
            extra_ignore: config.ignore_patterns.clone(),
        },
        config.scan_timeout(),
    );

    let intent = analyze(&request.query);

    let git_modified = if enumeration.strategy == Strategy::Git {
        git::modified_files(&request.root)
    } else {
        Vec::new()
    };

    let candidates: Vec<String> = enumeration
        .files
        .iter()
        .filter(|path| {
            let kind = classify(path);
            if kind == FileKind::Generated && !request.include_generated {
                return false;
            }
            match request.filter {
                Some(filter) => filter.keeps(kind),
                None => true,
            }
        })
        .cloned()
        .collect();

    let boosts: HashMap<String, Boost> = session
        .as_ref()
        .map(|s| {
            boost_candidates(s)
                .into_iter()
                .map(|c| {
                    (
                        c.path,
                        Boost {
                            amount: c.boost_factor,
                            reason: c.reason,
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let top_k = max_files.max(DEFAULT_TOP_K);
    let mut scored = score_files(&candidates, &intent, &boosts, top_k);

    // Maintain the semantic index; a failure here degrades to purely
    // structural results instead of aborting the query.
    let fresh_index = if enumeration.files.is_empty() {
        None
    } else {
        refresh_index(&request.root, &enumeration.files)
    };

    let mut smart_filtered = false;
    if let Some(index) = fresh_index.as_deref() {
        if is_applicable(&intent) {
            let ctx = FilterContext {
                root: &request.root,
                index,
                intent: &intent,
                git_modified: &git_modified,
            };
            scored = smart_filter(scored, &ctx);
            smart_filtered = true;
        }
    }

    scored.truncate(max_files);

    if request.impact {
        let graph = DependencyGraph::build(&request.root, &enumeration.files);
        for file in &mut scored {
            file.impact = Some(analyze_impact(&graph, &file.path, &enumeration.files));
        }
    }

    if smart_filtered {
        detect_lines(&request.root, &mut scored, &intent.keywords);
    }
    attach_metadata(&request.root, &mut scored);

    let mut warnings = duplicate_warnings(&scored, &enumeration.files);
    let (validation, entity_warnings) =
        validate_entities(&intent, &enumeration.files, fresh_index.as_deref());
    warnings.extend(entity_warnings);

    // Recording happens strictly after scoring; boosts never feed back
    // into the ranking of the query that produced them.
    if let Some(session) = session.as_mut() {
        store
            .record_query(session, &request.query, scored.len())
            .context("record session query")?;
        let views: Vec<ViewedFile> = scored
            .iter()
            .take(10)
            .map(|f| ViewedFile {
                path: f.path.clone(),
                relevance_score: f.relevance_score,
                blast_radius: f.impact.as_ref().map(|i| i.blast_radius.clone()),
            })
            .collect();
        store
            .record_file_views(session, &views)
            .context("record session views")?;
    }

    if !scored.is_empty() && !enumeration.files.is_empty() {
        let top_paths: Vec<String> = scored.iter().take(10).map(|f| f.path.clone()).collect();
        save_legacy_pointer(&request.root, &request.query, &intent.keywords, &top_paths);
        if smart_filtered {
            let learned: Vec<String> = top_paths.iter().take(5).cloned().collect();
            record_success(&request.root, &intent.keywords, &learned);
        }
    }

    let (project_type, tech_stack) = match fresh_index.as_deref() {
        Some(index) => (
            index
                .project
                .as_ref()
                .map(|p| p.project_type.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            index.tech_stack.clone(),
        ),
        None => (
            "unknown".to_string(),
            index::detect_tech_stack(&request.root),
        ),
    };

    let git_state = if enumeration.strategy == Strategy::Git {
        Some(GitState {
            strategy: enumeration.strategy.as_str().to_string(),
            modified_files: git_modified.iter().take(50).cloned().collect(),
        })
    } else {
        None
    };

    Ok(SearchResponse {
        query: request.query.clone(),
        intent: IntentSummary {
            category: intent.category.as_str().to_string(),
            confidence: intent.confidence,
            keywords: intent.keywords.clone(),
            sub_category: intent.sub_category.clone(),
        },
        metadata: ResponseMetadata {
            project_type,
            tech_stack,
            total_scanned: enumeration.files.len(),
            files_returned: scored.len(),
            time_ms: start.elapsed().as_millis() as u64,
            has_git_changes: !git_modified.is_empty(),
        },
        files: scored,
        git_state,
        warnings,
        validation,
    })
}

/// Load (through the LRU), incrementally refresh, persist and re-cache
/// the semantic index. Returns None when the root cannot hold state.
fn refresh_index(root: &Path, files: &[String]) -> Option<Arc<index::CacheIndex>> {
    let previous = index::load_cached(root).map(|arc| (*arc).clone());
    let outcome = index::refresh::refresh(root, files, previous);

    if outcome.parse_failures > 0 {
        eprintln!(
            "mantic: {} file(s) could not be parsed; their attributes are stale",
            outcome.parse_failures
        );
    }

    let shared = Arc::new(outcome.index);
    match index::save(root, shared.as_ref()) {
        Ok(()) => index::store_cached(root, Arc::clone(&shared)),
        Err(err) => eprintln!("mantic: index not persisted: {err:#}"),
    }
    Some(shared)
}

/// Attach scored-file views to a session by hand, for the MCP
/// `session_record_view` tool.
pub fn record_views(root: &Path, id_or_name: &str, paths: &[String]) -> Result<usize> {
    let store = SessionStore::new(root);
    let mut session = store.load_required(id_or_name)?;
    let views: Vec<ViewedFile> = paths
        .iter()
        .map(|p| ViewedFile {
            path: p.clone(),
            relevance_score: 0.0,
            blast_radius: None,
        })
        .collect();
    store.record_file_views(&mut session, &views)?;
    Ok(views.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    fn auth_fixture(root: &Path) {
        touch(root, "src/auth/login.ts", "export function login() {}\n");
        touch(root, "src/auth/login.test.ts", "import { login } from './login';\n");
        touch(root, "docs/auth.md", "# Auth\n");
        touch(root, "README.md", "# Project\n");
    }

    #[test]
    fn auth_scenario_ranks_implementation_first() {
        let dir = TempDir::new().expect("tempdir");
        auth_fixture(dir.path());

        let mut request = SearchRequest::new("authentication logic", dir.path());
        request.filter = Some(TypeFilter::Code);
        let response = run_search(&request).expect("search");

        assert_eq!(response.intent.category, "auth");
        assert!(response.intent.confidence >= 0.75);
        assert_eq!(response.files[0].path, "src/auth/login.ts");
        let test_file = response
            .files
            .iter()
            .find(|f| f.path == "src/auth/login.test.ts")
            .expect("test file present under --code");
        assert!(test_file.relevance_score < response.files[0].relevance_score);
        assert!(!response.files.iter().any(|f| f.path == "docs/auth.md"));
        assert!(response.warnings.iter().any(|w| w.kind == "duplicate_test"));
    }

    #[test]
    fn empty_repo_returns_empty_files_not_error() {
        let dir = TempDir::new().expect("tempdir");
        let response = run_search(&SearchRequest::new("anything", dir.path())).expect("search");
        assert!(response.files.is_empty());
        assert_eq!(response.metadata.files_returned, 0);
    }

    #[test]
    fn empty_query_still_returns_ranked_files() {
        let dir = TempDir::new().expect("tempdir");
        auth_fixture(dir.path());

        let response = run_search(&SearchRequest::new("", dir.path())).expect("search");
        assert_eq!(response.intent.category, "general");
        assert_eq!(response.intent.confidence, 0.0);
        assert!(!response.files.is_empty());
    }

    #[test]
    fn unknown_session_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        auth_fixture(dir.path());
        let mut request = SearchRequest::new("login", dir.path());
        request.session = Some("missing-session".to_string());
        assert!(run_search(&request).is_err());
    }

    #[test]
    fn generated_files_are_dropped_by_default() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/app.min.js", "x\n");
        touch(dir.path(), "src/app.ts", "export const app = 1;\n");

        let response = run_search(&SearchRequest::new("app", dir.path())).expect("search");
        assert!(response.files.iter().all(|f| f.path != "src/app.min.js"));
    }
}

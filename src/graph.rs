// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-query dependency graph and impact analysis.
//!
//! Imports are extracted with the same best-effort regexes the index
//! uses, resolved against the candidate set, and inverted into a
//! dependents map. The graph is ephemeral; nothing here persists.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use crate::classify::{classify, FileKind};

const MAX_DIRECT: usize = 20;
const MAX_INDIRECT: usize = 10;
const MAX_RELATED_CONFIG: usize = 5;

const CONFIG_BASENAMES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "webpack.config.js",
    "vite.config.ts",
    "vite.config.js",
    "jest.config.js",
    "babel.config.js",
    ".env",
    "docker-compose.yml",
];

const RESOLVE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ""];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_dynamic: bool,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FileNode {
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<String>,
    pub dependents: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, FileNode>,
    /// resolved path -> set of importer paths
    pub reverse: BTreeMap<String, BTreeSet<String>>,
}

/// Summary attached to a scored file when impact analysis is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub direct_dependents: Vec<String>,
    pub indirect_dependents: Vec<String>,
    pub related_tests: Vec<String>,
    pub related_config: Vec<String>,
    pub blast_score: u32,
    pub blast_radius: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:import\s+(?:[\w$*{},\s]+?\s+from\s+)?|export\s+[\w$*{},\s]+?\s+from\s+|require\(\s*)['"]([^'"]+)['"]"#,
        )
        .unwrap()
    })
}

fn dynamic_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap())
}

fn export_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"export\s+(?:async\s+)?(?:default\s+)?(?:function|const|let|var|class|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
        )
        .unwrap()
    })
}

fn import_names_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}]*)\}").unwrap())
}

impl DependencyGraph {
    /// Build an import graph over `files`, reading each supported source
    /// file once. Unreadable files are skipped.
    pub fn build(root: &Path, files: &[String]) -> Self {
        let mut graph = DependencyGraph::default();
        let candidates: BTreeSet<&str> = files.iter().map(String::as_str).collect();

        for file in files {
            if crate::index::parse::language_for_path(file).is_none() {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(root.join(file)) else {
                continue;
            };
            let node = extract_node(&content);
            graph.nodes.insert(file.clone(), node);
        }

        let edges: Vec<(String, String)> = graph
            .nodes
            .iter()
            .flat_map(|(importer, node)| {
                node.imports
                    .iter()
                    .filter_map(|imp| {
                        resolve_import(importer, &imp.source, &candidates)
                            .map(|target| (target, importer.clone()))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        for (target, importer) in edges {
            if target != importer {
                graph.reverse.entry(target).or_default().insert(importer);
            }
        }

        let reverse = graph.reverse.clone();
        for (target, importers) in &reverse {
            if let Some(node) = graph.nodes.get_mut(target) {
                node.dependents = importers.iter().cloned().collect();
            }
        }

        graph
    }

    pub fn dependents_of(&self, path: &str) -> Vec<String> {
        self.reverse
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn extract_node(content: &str) -> FileNode {
    let mut node = FileNode::default();

    for (line_idx, line) in content.lines().enumerate() {
        for caps in import_line_re().captures_iter(line) {
            let source = caps[1].to_string();
            let names = import_names_re()
                .captures(line)
                .map(|c| {
                    c[1].split(',')
                        .filter_map(|n| {
                            let n = n.split_whitespace().next().unwrap_or("");
                            if n.is_empty() {
                                None
                            } else {
                                Some(n.to_string())
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            let is_default = line.trim_start().starts_with("import ")
                && !line.contains('{')
                && !line.contains('*')
                && line.contains(" from ");
            node.imports.push(ImportRecord {
                source,
                names,
                is_default,
                is_dynamic: false,
                line: line_idx + 1,
            });
        }

        for caps in dynamic_import_re().captures_iter(line) {
            let source = caps[1].to_string();
            if !node
                .imports
                .iter()
                .any(|i| i.source == source && i.line == line_idx + 1)
            {
                node.imports.push(ImportRecord {
                    source,
                    names: Vec::new(),
                    is_default: false,
                    is_dynamic: true,
                    line: line_idx + 1,
                });
            }
        }

        for caps in export_name_re().captures_iter(line) {
            let name = caps[1].to_string();
            if !node.exports.contains(&name) {
                node.exports.push(name);
            }
        }
    }

    node
}

/// Resolve a relative or aliased import against the candidate set.
/// External packages resolve to None and are ignored.
fn resolve_import(importer: &str, source: &str, candidates: &BTreeSet<&str>) -> Option<String> {
    let base = if let Some(aliased) = source.strip_prefix("@/") {
        format!("src/{aliased}")
    } else if source.starts_with("./") || source.starts_with("../") {
        let dir = match importer.rfind('/') {
            Some(idx) => &importer[..idx],
            None => "",
        };
        crate::util::normalize_rel_path(&format!("{dir}/{source}"))
    } else {
        return None;
    };

    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{base}{ext}");
        if candidates.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    for ext in ["ts", "tsx", "js", "jsx"] {
        let candidate = format!("{base}/index.{ext}");
        if candidates.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    None
}

/// Compute the impact summary for one file.
pub fn analyze_impact(graph: &DependencyGraph, path: &str, files: &[String]) -> ImpactSummary {
    let direct_all = graph.dependents_of(path);
    let direct: Vec<String> = direct_all.iter().take(MAX_DIRECT).cloned().collect();

    let direct_set: BTreeSet<&str> = direct_all.iter().map(String::as_str).collect();
    let mut indirect: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for dep in &direct_all {
        for second in graph.dependents_of(dep) {
            if second != path && !direct_set.contains(second.as_str()) && seen.insert(second.clone())
            {
                indirect.push(second);
                if indirect.len() >= MAX_INDIRECT {
                    break;
                }
            }
        }
        if indirect.len() >= MAX_INDIRECT {
            break;
        }
    }
    indirect.sort();

    let related_tests = find_related_tests(path, files);
    let related_config: Vec<String> = files
        .iter()
        .filter(|f| {
            let basename = f.rsplit('/').next().unwrap_or(f);
            CONFIG_BASENAMES.contains(&basename)
        })
        .take(MAX_RELATED_CONFIG)
        .cloned()
        .collect();

    let blast_score = (10 * direct.len() + 3 * indirect.len() + 2 * related_tests.len()).min(100) as u32;
    let blast_radius = match blast_score {
        0..=19 => "small",
        20..=49 => "medium",
        50..=79 => "large",
        _ => "critical",
    }
    .to_string();

    let mut warnings = Vec::new();
    let kind = classify(path);
    if direct_all.is_empty() && kind != FileKind::Test {
        warnings.push("no dependents found; possibly dead code".to_string());
    }
    if direct_all.len() > MAX_DIRECT {
        warnings.push(format!(
            "high coupling: {} direct dependents",
            direct_all.len()
        ));
    }
    if related_tests.is_empty() && blast_radius != "small" {
        warnings.push("no tests found for this file".to_string());
    }
    if blast_radius == "critical" {
        warnings.push("critical blast radius; proceed with caution".to_string());
    }

    ImpactSummary {
        direct_dependents: direct,
        indirect_dependents: indirect,
        related_tests,
        related_config,
        blast_score,
        blast_radius,
        warnings,
    }
}

/// Candidate test locations by basename transformation, then a scan for
/// basename containment across the whole file list.
fn find_related_tests(path: &str, files: &[String]) -> Vec<String> {
    let file_set: BTreeSet<&str> = files.iter().map(String::as_str).collect();
    let (dir, basename) = match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    };
    let (stem, ext) = match basename.rfind('.') {
        Some(idx) => (&basename[..idx], &basename[idx + 1..]),
        None => (basename, ""),
    };

    let mut tests: Vec<String> = Vec::new();
    let mut push = |candidate: String, tests: &mut Vec<String>| {
        if file_set.contains(candidate.as_str()) && !tests.contains(&candidate) {
            tests.push(candidate);
        }
    };

    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    };
    push(format!("{prefix}{stem}.test.{ext}"), &mut tests);
    push(format!("{prefix}{stem}.spec.{ext}"), &mut tests);
    push(format!("{prefix}__tests__/{stem}.{ext}"), &mut tests);
    push(format!("{prefix}__tests__/{stem}.test.{ext}"), &mut tests);
    if let Some(swapped) = swap_segment(path, "/src/", "/tests/") {
        push(swapped, &mut tests);
    }
    if let Some(swapped) = swap_segment(path, "/src/", "/test/") {
        push(swapped, &mut tests);
    }
    push(format!("tests/{stem}.test.{ext}"), &mut tests);

    for file in files {
        if classify(file) != FileKind::Test {
            continue;
        }
        let candidate_base = file.rsplit('/').next().unwrap_or(file);
        if candidate_base.contains(stem) && !tests.contains(file) {
            tests.push(file.clone());
        }
    }

    tests.sort();
    tests.dedup();
    tests
}

fn swap_segment(path: &str, from: &str, to: &str) -> Option<String> {
    let rooted = format!("/{path}");
    if rooted.contains(from) {
        Some(rooted.replacen(from, to, 1).trim_start_matches('/').to_string())
    } else {
        None
    }
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

    fn fixture(root: &Path) -> Vec<String> {
        touch(
            root,
            "src/services/stripe.service.ts",
            "export function charge() {}\nexport const refund = () => {};\n",
        );
        touch(
            root,
            "src/checkout.ts",
            "import { charge } from './services/stripe.service';\n",
        );
        touch(
            root,
            "src/cart.ts",
            "import { charge } from '@/services/stripe.service';\n",
        );
        touch(
            root,
            "src/admin/billing.ts",
            "import { refund } from '../services/stripe.service';\n",
        );
        touch(
            root,
            "src/orders.ts",
            "import { checkout } from './checkout';\n",
        );
        touch(root, "src/unrelated.ts", "export const x = 1;\n");
        touch(
            root,
            "tests/stripe.service.test.ts",
            "import { charge } from '../src/services/stripe.service';\n",
        );
        vec![
            "src/services/stripe.service.ts".to_string(),
            "src/checkout.ts".to_string(),
            "src/cart.ts".to_string(),
            "src/admin/billing.ts".to_string(),
            "src/orders.ts".to_string(),
            "src/unrelated.ts".to_string(),
            "tests/stripe.service.test.ts".to_string(),
        ]
    }

    #[test]
    fn resolves_relative_alias_and_index_imports() {
        let dir = TempDir::new().expect("tempdir");
        let files = fixture(dir.path());
        let graph = DependencyGraph::build(dir.path(), &files);

        let dependents = graph.dependents_of("src/services/stripe.service.ts");
        assert!(dependents.contains(&"src/checkout.ts".to_string()));
        assert!(dependents.contains(&"src/cart.ts".to_string()));
        assert!(dependents.contains(&"src/admin/billing.ts".to_string()));
    }

    #[test]
    fn externals_are_ignored() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/a.ts", "import React from 'react';\n");
        let files = vec!["src/a.ts".to_string()];
        let graph = DependencyGraph::build(dir.path(), &files);
        assert!(graph.reverse.is_empty());
    }

    #[test]
    fn impact_counts_and_blast_radius() {
        let dir = TempDir::new().expect("tempdir");
        let files = fixture(dir.path());
        let graph = DependencyGraph::build(dir.path(), &files);

        let impact = analyze_impact(&graph, "src/services/stripe.service.ts", &files);
        // Three source importers plus the test file import.
        assert!(impact.direct_dependents.len() >= 3);
        assert!(impact
            .related_tests
            .contains(&"tests/stripe.service.test.ts".to_string()));
        assert!(impact.blast_score >= 30);
        assert!(impact.warnings.is_empty() || !impact.blast_radius.is_empty());
    }

    #[test]
    fn indirect_dependents_exclude_direct_and_primary() {
        let dir = TempDir::new().expect("tempdir");
        let files = fixture(dir.path());
        let graph = DependencyGraph::build(dir.path(), &files);

        let impact = analyze_impact(&graph, "src/services/stripe.service.ts", &files);
        // orders.ts imports checkout.ts which imports the service.
        assert!(impact
            .indirect_dependents
            .contains(&"src/orders.ts".to_string()));
        assert!(!impact
            .indirect_dependents
            .iter()
            .any(|p| impact.direct_dependents.contains(p)));
    }

    #[test]
    fn dead_code_warning_for_unimported_file() {
        let dir = TempDir::new().expect("tempdir");
        let files = fixture(dir.path());
        let graph = DependencyGraph::build(dir.path(), &files);

        let impact = analyze_impact(&graph, "src/unrelated.ts", &files);
        assert!(impact.direct_dependents.is_empty());
        assert_eq!(impact.blast_radius, "small");
        assert!(impact
            .warnings
            .iter()
            .any(|w| w.contains("possibly dead code")));
    }

    #[test]
    fn import_records_capture_lines_and_names() {
        let node = extract_node(
            "import { a, b } from './x';\nconst y = await import('./lazy');\n",
        );
        assert_eq!(node.imports[0].line, 1);
        assert_eq!(node.imports[0].names, vec!["a", "b"]);
        let dynamic = node.imports.iter().find(|i| i.is_dynamic).expect("dynamic");
        assert_eq!(dynamic.line, 2);
        assert_eq!(dynamic.source, "./lazy");
    }
}

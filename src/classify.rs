// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-only file classification.
//!
//! Classification is a pure function of the relative path: no stat, no
//! content reads, and two runs always agree.

use serde::{Deserialize, Serialize};

/// What a path is, judged from its shape alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Generated,
    Test,
    Docs,
    Config,
    Code,
    #[default]
    Other,
}

impl FileKind {
    /// Deprioritisation weight: higher survives longer in ranked output.
    pub fn priority(self) -> u32 {
        match self {
            FileKind::Code => 100,
            FileKind::Config => 50,
            FileKind::Test => 30,
            FileKind::Other => 20,
            FileKind::Docs => 10,
            FileKind::Generated => 0,
        }
    }

    /// Implementation and configuration files are canonical; tests, docs
    /// and generated artefacts are derivative.
    pub fn is_canonical(self) -> bool {
        matches!(self, FileKind::Code | FileKind::Config)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Generated => "generated",
            FileKind::Test => "test",
            FileKind::Docs => "docs",
            FileKind::Config => "config",
            FileKind::Code => "code",
            FileKind::Other => "other",
        }
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.lock",
    "poetry.lock",
    "composer.lock",
    "gemfile.lock",
    "go.sum",
];

const GENERATED_DIRS: &[&str] = &[
    "dist/",
    "build/",
    "out/",
    ".next/",
    "coverage/",
    "node_modules/",
    "target/",
    "__pycache__/",
    ".cache/",
];

const TEST_DIRS: &[&str] = &[
    "test/",
    "tests/",
    "__tests__/",
    "spec/",
    "e2e/",
    "__mocks__/",
    "mocks/",
];

const CONFIG_BASENAMES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "jsconfig.json",
    "cargo.toml",
    "pyproject.toml",
    "go.mod",
    "makefile",
    "dockerfile",
    "containerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".babelrc",
    ".nvmrc",
    ".editorconfig",
];

const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "rs", "java", "rb", "php", "c", "h",
    "cpp", "cc", "hpp", "cs", "swift", "kt", "kts", "scala", "lua", "sh", "sql", "vue", "svelte",
    "html", "css", "scss",
];

/// Classify a repository-relative path.
///
/// Priority order matters: a lock file inside `tests/` is still generated,
/// and `docs/conf.py` is still code.
pub fn classify(path: &str) -> FileKind {
    let lower = path.to_ascii_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or(&lower);
    let ext = basename.rsplit('.').next().filter(|e| *e != basename);

    // Generated artefacts first: lock files, logs, maps, minified
    // bundles, build output, declaration files.
    if LOCK_FILES.contains(&basename)
        || matches!(ext, Some("log") | Some("map"))
        || basename.ends_with(".min.js")
        || basename.ends_with(".min.css")
        || basename.ends_with(".d.ts")
        || GENERATED_DIRS.iter().any(|d| dir_matches(&lower, d))
    {
        return FileKind::Generated;
    }

    if TEST_DIRS.iter().any(|d| dir_matches(&lower, d))
        || basename.contains(".test.")
        || basename.contains(".spec.")
        || basename.contains(".e2e.")
        || stem_of(basename).ends_with("_test")
        || stem_of(basename).starts_with("test_")
    {
        return FileKind::Test;
    }

    if basename.starts_with("readme")
        || basename.starts_with("changelog")
        || basename.starts_with("license")
        || basename.starts_with("contributing")
        || dir_matches(&lower, "docs/")
        || dir_matches(&lower, "doc/")
        || matches!(ext, Some("md") | Some("mdx"))
    {
        return FileKind::Docs;
    }

    if CONFIG_BASENAMES.contains(&basename)
        || basename.contains(".config.")
        || basename.starts_with(".env")
        || basename.starts_with(".eslintrc")
        || basename.starts_with(".prettierrc")
        || matches!(ext, Some("yml") | Some("yaml") | Some("toml") | Some("ini"))
    {
        return FileKind::Config;
    }

    if let Some(ext) = ext {
        if CODE_EXTENSIONS.contains(&ext) {
            return FileKind::Code;
        }
    }

    FileKind::Other
}

/// True when `dir` (with trailing slash) starts the path or appears as an
/// interior segment.
fn dir_matches(path: &str, dir: &str) -> bool {
    path.starts_with(dir) || path.contains(&format!("/{dir}"))
}

fn stem_of(basename: &str) -> &str {
    match basename.rfind('.') {
        Some(idx) if idx > 0 => &basename[..idx],
        _ => basename,
    }
}

/// Basename with extension and derivative suffixes stripped, so that
/// `login.test.ts`, `login.spec.tsx` and `login.ts` all share a key.
pub fn canonical_basename(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let mut stem = stem_of(basename).to_string();

    for suffix in [".test", ".spec", ".e2e", ".stories", ".d"] {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped.to_string();
            break;
        }
    }

    stem.to_ascii_lowercase()
}

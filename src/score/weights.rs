// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static weight tables consumed by the structural scorer.

use crate::intent::Category;

/// Directory weight, matched at the path start or as an interior segment.
pub struct DirWeight {
    pub prefix: &'static str,
    pub weight: f64,
}

pub fn directory_weights(category: Category) -> &'static [DirWeight] {
    match category {
        Category::Ui => &[
            DirWeight { prefix: "components/", weight: 1.0 },
            DirWeight { prefix: "ui/", weight: 1.0 },
            DirWeight { prefix: "pages/", weight: 0.9 },
            DirWeight { prefix: "views/", weight: 0.9 },
            DirWeight { prefix: "layouts/", weight: 0.8 },
            DirWeight { prefix: "app/", weight: 0.7 },
        ],
        Category::Auth => &[
            DirWeight { prefix: "auth/", weight: 1.0 },
            DirWeight { prefix: "authentication/", weight: 1.0 },
            DirWeight { prefix: "login/", weight: 0.9 },
            DirWeight { prefix: "session/", weight: 0.8 },
            DirWeight { prefix: "guards/", weight: 0.8 },
            DirWeight { prefix: "security/", weight: 0.8 },
            DirWeight { prefix: "middleware/", weight: 0.7 },
        ],
        Category::Styling => &[
            DirWeight { prefix: "styles/", weight: 1.0 },
            DirWeight { prefix: "css/", weight: 1.0 },
            DirWeight { prefix: "themes/", weight: 0.9 },
            DirWeight { prefix: "assets/", weight: 0.5 },
        ],
        Category::Performance => &[
            DirWeight { prefix: "perf/", weight: 1.0 },
            DirWeight { prefix: "optimization/", weight: 0.9 },
            DirWeight { prefix: "cache/", weight: 0.8 },
            DirWeight { prefix: "workers/", weight: 0.7 },
        ],
        Category::Backend => &[
            DirWeight { prefix: "api/", weight: 1.0 },
            DirWeight { prefix: "server/", weight: 1.0 },
            DirWeight { prefix: "services/", weight: 0.9 },
            DirWeight { prefix: "controllers/", weight: 0.9 },
            DirWeight { prefix: "routes/", weight: 0.9 },
            DirWeight { prefix: "handlers/", weight: 0.9 },
            DirWeight { prefix: "db/", weight: 0.8 },
            DirWeight { prefix: "database/", weight: 0.8 },
            DirWeight { prefix: "models/", weight: 0.8 },
            DirWeight { prefix: "features/", weight: 0.7 },
            DirWeight { prefix: "packages/", weight: 0.6 },
            DirWeight { prefix: "apps/", weight: 0.6 },
        ],
        Category::Testing => &[
            DirWeight { prefix: "tests/", weight: 1.0 },
            DirWeight { prefix: "test/", weight: 1.0 },
            DirWeight { prefix: "__tests__/", weight: 1.0 },
            DirWeight { prefix: "e2e/", weight: 0.9 },
            DirWeight { prefix: "spec/", weight: 0.9 },
            DirWeight { prefix: "mocks/", weight: 0.7 },
        ],
        Category::Config => &[
            DirWeight { prefix: "config/", weight: 1.0 },
            DirWeight { prefix: "deploy/", weight: 0.8 },
            DirWeight { prefix: "ci/", weight: 0.8 },
            DirWeight { prefix: ".github/", weight: 0.7 },
            DirWeight { prefix: "scripts/", weight: 0.6 },
        ],
        Category::General => &[],
    }
}

/// Implementation directories earning a one-time bonus.
pub const IMPL_DIRS: &[&str] = &[
    "src/", "lib/", "modules/", "services/", "api/", "server/", "core/", "features/",
];

/// Business-logic filename infixes, multiplicative ×1.5.
pub const BUSINESS_SUFFIXES: &[&str] = &[
    ".service.",
    ".controller.",
    ".handler.",
    ".repository.",
    ".manager.",
    ".provider.",
    ".helper.",
    ".util.",
    ".utils.",
    ".model.",
    ".schema.",
];

/// Framework boilerplate stems, multiplicative ×0.3.
pub const BOILERPLATE_STEMS: &[&str] = &["page", "layout", "route", "index", "app", "main"];

/// Config basenames that keep full weight despite having no extension.
pub const IMPORTANT_NO_EXT: &[&str] = &["makefile", "dockerfile", "containerfile", "justfile"];

/// Extensions eliminated before scoring: binary assets, fonts, maps,
/// locks and logs carry no structural signal.
pub const ELIMINATED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "bmp", "woff", "woff2", "ttf", "otf",
    "eot", "map", "lock", "log", "zip", "gz", "tar", "pdf", "mp4", "mp3", "wasm",
];

pub fn extension_weight(path: &str) -> f64 {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let Some(ext) = basename.rsplit('.').next().filter(|e| *e != basename) else {
        if IMPORTANT_NO_EXT.contains(&basename.to_ascii_lowercase().as_str()) {
            return 1.0;
        }
        return 0.5;
    };

    match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" => 1.0,
        "js" | "jsx" | "mjs" | "cjs" => 0.9,
        "py" | "go" | "rs" => 1.0,
        "md" | "mdx" => 0.05,
        "yml" | "yaml" => 0.8,
        "java" | "rb" | "php" | "c" | "cc" | "cpp" | "cs" | "swift" | "kt" => 0.6,
        "h" | "hpp" => 0.4,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_weights_order_cc_below_ts() {
        assert_eq!(extension_weight("a/b.ts"), 1.0);
        assert_eq!(extension_weight("a/b.jsx"), 0.9);
        assert_eq!(extension_weight("a/b.md"), 0.05);
        assert_eq!(extension_weight("Makefile"), 1.0);
        assert_eq!(extension_weight("a/b.unknown"), 0.5);
        assert!(extension_weight("a/b.cc") > extension_weight("a/b.h"));
    }

    #[test]
    fn backend_weights_cover_monorepo_layouts() {
        let weights = directory_weights(crate::intent::Category::Backend);
        for name in ["packages/", "apps/", "features/"] {
            assert!(
                weights.iter().any(|w| w.prefix == name && w.weight > 0.0),
                "{name} missing"
            );
        }
    }
}

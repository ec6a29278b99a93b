// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort identifier extraction via regex.
//!
//! Supported source flavours are the JS/TS family. The extraction does
//! not need to be syntactically exact; it only feeds ranking signals.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub name: String,
    /// function / class / const / type / interface / default / variable
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_exported: bool,
}

/// Identifiers pulled out of one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSource {
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// Domain terms worth caching as per-file keywords.
const KEY_TERMS: &[&str] = &[
    "auth", "login", "logout", "signup", "password", "token", "session", "payment", "stripe",
    "cart", "checkout", "user", "profile", "account", "dashboard", "search", "filter", "sort",
    "upload", "download", "notification", "email", "api", "cache", "modal", "form", "button",
    "nav", "theme", "settings", "admin", "error", "retry", "queue", "webhook",
];

pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?;
    match ext {
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "js" | "mjs" | "cjs" => Some("javascript"),
        "jsx" => Some("jsx"),
        _ => None,
    }
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

cached_regex!(
    export_decl_re,
    r"(?m)^\s*export\s+(?:async\s+)?(function|class|const|let|var|type|interface|enum)\s+([A-Za-z_$][\w$]*)"
);
cached_regex!(
    export_default_re,
    r"(?m)^\s*export\s+default\s+(?:async\s+)?(?:function\s+|class\s+)?([A-Za-z_$][\w$]*)?"
);
cached_regex!(export_group_re, r"export\s*\{([^}]+)\}");
cached_regex!(
    import_from_re,
    r#"import\s+(.+?)\s+from\s+['"]([^'"]+)['"]"#
);
cached_regex!(import_bare_re, r#"import\s+['"]([^'"]+)['"]"#);
cached_regex!(import_dynamic_re, r#"import\(\s*['"]([^'"]+)['"]\s*\)"#);
cached_regex!(
    require_re,
    r#"(?:const|let|var)\s+(\{[^}]*\}|[A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#
);
cached_regex!(
    function_re,
    r"(?m)^\s*(export\s+)?(?:default\s+)?(async\s+)?function\s+([A-Za-z_$][\w$]*)"
);
cached_regex!(
    arrow_fn_re,
    r"(?m)^\s*(export\s+)?(?:const|let)\s+([A-Za-z_$][\w$]*)\s*=\s*(async\s+)?\([^)]*\)\s*=>"
);
cached_regex!(class_re, r"(?m)^\s*(?:export\s+)?class\s+([A-Za-z_$][\w$]*)");
cached_regex!(
    type_re,
    r"(?m)^\s*(?:export\s+)?(?:type|interface)\s+([A-Za-z_$][\w$]*)"
);
cached_regex!(
    component_class_re,
    r"class\s+([A-Z][\w$]*)\s+extends\s+(?:React\.)?(?:Pure)?Component"
);
cached_regex!(jsx_text_re, r">([^<>{}\n]{3,60})<");
cached_regex!(string_literal_re, r#"['"]([^'"\n]{3,60})['"]"#);

/// Extract identifiers from one source file. Never fails; an unparsable
/// file simply produces fewer attributes.
pub fn parse_source(content: &str, language: &str) -> ParsedSource {
    let mut parsed = ParsedSource {
        language: language.to_string(),
        ..Default::default()
    };

    for caps in export_decl_re().captures_iter(content) {
        let kind = match &caps[1] {
            "function" => "function",
            "class" => "class",
            "const" => "const",
            "type" | "enum" => "type",
            "interface" => "interface",
            _ => "variable",
        };
        push_export(&mut parsed.exports, &caps[2], kind);
    }

    for caps in export_default_re().captures_iter(content) {
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "default".to_string());
        push_export(&mut parsed.exports, &name, "default");
    }

    for caps in export_group_re().captures_iter(content) {
        for part in caps[1].split(',') {
            let name = part.split_whitespace().next().unwrap_or("");
            if !name.is_empty() && name != "default" {
                push_export(&mut parsed.exports, name, "variable");
            }
        }
    }

    for caps in import_from_re().captures_iter(content) {
        let clause = caps[1].trim();
        let source = caps[2].to_string();
        let mut names = Vec::new();
        let mut is_default = false;

        for piece in split_import_clause(clause) {
            if piece.starts_with('{') {
                for name in piece.trim_matches(['{', '}']).split(',') {
                    let name = name.split_whitespace().next().unwrap_or("");
                    if !name.is_empty() {
                        names.push(name.to_string());
                    }
                }
            } else if piece.starts_with('*') {
                if let Some(alias) = piece.split_whitespace().last() {
                    names.push(alias.to_string());
                }
            } else if !piece.is_empty() && piece != "type" {
                is_default = true;
                names.push(piece.to_string());
            }
        }

        parsed.imports.push(ImportEntry {
            source,
            names,
            is_default,
            is_dynamic: false,
        });
    }

    for caps in import_bare_re().captures_iter(content) {
        let source = caps[1].to_string();
        if !parsed.imports.iter().any(|i| i.source == source) {
            parsed.imports.push(ImportEntry {
                source,
                names: Vec::new(),
                is_default: false,
                is_dynamic: false,
            });
        }
    }

    for caps in import_dynamic_re().captures_iter(content) {
        parsed.imports.push(ImportEntry {
            source: caps[1].to_string(),
            names: Vec::new(),
            is_default: false,
            is_dynamic: true,
        });
    }

    for caps in require_re().captures_iter(content) {
        let clause = caps[1].trim();
        let mut names = Vec::new();
        let mut is_default = false;
        if clause.starts_with('{') {
            for name in clause.trim_matches(['{', '}']).split(',') {
                let name = name.split_whitespace().next().unwrap_or("");
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        } else {
            is_default = true;
            names.push(clause.to_string());
        }
        parsed.imports.push(ImportEntry {
            source: caps[2].to_string(),
            names,
            is_default,
            is_dynamic: false,
        });
    }

    for caps in function_re().captures_iter(content) {
        let name = caps[3].to_string();
        let entry = FunctionEntry {
            is_async: caps.get(2).is_some(),
            is_exported: caps.get(1).is_some(),
            name: name.clone(),
        };
        if !parsed.functions.iter().any(|f| f.name == entry.name) {
            parsed.functions.push(entry);
        }
        if is_component_name(&name) {
            push_dedup(&mut parsed.components, &name);
        }
    }

    for caps in arrow_fn_re().captures_iter(content) {
        let name = caps[2].to_string();
        let entry = FunctionEntry {
            is_async: caps.get(3).is_some(),
            is_exported: caps.get(1).is_some(),
            name: name.clone(),
        };
        if !parsed.functions.iter().any(|f| f.name == entry.name) {
            parsed.functions.push(entry);
        }
        if is_component_name(&name) {
            push_dedup(&mut parsed.components, &name);
        }
    }

    for caps in class_re().captures_iter(content) {
        push_dedup(&mut parsed.classes, &caps[1]);
    }
    for caps in component_class_re().captures_iter(content) {
        push_dedup(&mut parsed.components, &caps[1]);
    }
    for caps in type_re().captures_iter(content) {
        push_dedup(&mut parsed.types, &caps[1]);
    }

    collect_keywords(content, language, &mut parsed.keywords);

    parsed
}

fn split_import_clause(clause: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in clause.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                pieces.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces
}

fn collect_keywords(content: &str, language: &str, out: &mut Vec<String>) {
    let lower = content.to_ascii_lowercase();
    for term in KEY_TERMS {
        if lower.contains(term) {
            push_dedup(out, term);
        }
    }

    let jsx = matches!(language, "tsx" | "jsx");
    let texts = if jsx {
        jsx_text_re()
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .collect::<Vec<_>>()
    } else {
        Vec::new()
    };
    for text in texts
        .iter()
        .map(String::as_str)
        .chain(string_literal_re().captures_iter(content).map(|c| {
            // borrow dance: literals are re-found below
            c.get(1).map(|m| m.as_str()).unwrap_or("")
        }))
    {
        let lowered = text.to_ascii_lowercase();
        for term in KEY_TERMS {
            if lowered.contains(term) {
                push_dedup(out, term);
            }
        }
    }
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

fn push_export(exports: &mut Vec<ExportEntry>, name: &str, kind: &str) {
    if !exports.iter().any(|e| e.name == name) {
        exports.push(ExportEntry {
            name: name.to_string(),
            kind: kind.to_string(),
        });
    }
}

fn push_dedup(bucket: &mut Vec<String>, value: &str) {
    if !bucket.iter().any(|v| v == value) {
        bucket.push(value.to_string());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query-intent analysis: category, ranked keywords, extracted entities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Closed set of query categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ui,
    Auth,
    Styling,
    Performance,
    Backend,
    Testing,
    Config,
    General,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ui => "ui",
            Category::Auth => "auth",
            Category::Styling => "styling",
            Category::Performance => "performance",
            Category::Backend => "backend",
            Category::Testing => "testing",
            Category::Config => "config",
            Category::General => "general",
        }
    }
}

/// Entities pulled out of the query, bucketed for later validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    pub files: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub components: Vec<String>,
    pub errors: Vec<String>,
}

impl Entities {
    pub fn total(&self) -> usize {
        self.files.len()
            + self.functions.len()
            + self.classes.len()
            + self.components.len()
            + self.errors.len()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.files
            .iter()
            .map(|e| ("file", e))
            .chain(self.functions.iter().map(|e| ("function", e)))
            .chain(self.classes.iter().map(|e| ("class", e)))
            .chain(self.components.iter().map(|e| ("component", e)))
            .chain(self.errors.iter().map(|e| ("error", e)))
    }
}

/// Result of analysing one free-form query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub category: Category,
    pub keywords: Vec<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub entities: Entities,
}

struct CategorySpec {
    category: Category,
    pattern: &'static str,
    sub_patterns: &'static [(&'static str, &'static str)],
}

static CATEGORY_SPECS: &[CategorySpec] = &[
    CategorySpec {
        category: Category::Ui,
        pattern: r"^(button|modal|form|input|dropdown|component|render|view|page|screen|layout|navbar|sidebar|menu|dialog|tooltip|icon|widget|tab|card)$",
        sub_patterns: &[
            ("form", r"^(form|input|field|validation)$"),
            ("navigation", r"^(navbar|sidebar|menu|nav|tab)$"),
            ("overlay", r"^(modal|dialog|tooltip|popover)$"),
        ],
    },
    CategorySpec {
        category: Category::Auth,
        pattern: r"^(auth|authentication|authorization|login|logout|signin|signup|session|token|password|oauth|jwt|credential|permission|role|access)$",
        sub_patterns: &[
            ("login", r"^(login|signin)$"),
            ("registration", r"^(signup|register|registration)$"),
            ("token", r"^(token|jwt|oauth)$"),
            ("permissions", r"^(permission|role|access)$"),
        ],
    },
    CategorySpec {
        category: Category::Styling,
        pattern: r"^(style|styling|css|scss|sass|theme|color|colour|font|margin|padding|responsive|tailwind|animation|darkmode|dark-mode)$",
        sub_patterns: &[
            ("theme", r"^(theme|darkmode|dark-mode|color|colour)$"),
            ("layout", r"^(margin|padding|responsive)$"),
        ],
    },
    CategorySpec {
        category: Category::Performance,
        pattern: r"^(performance|slow|optimize|optimise|optimization|cache|caching|lazy|memo|memoize|bundle|latency|speed|profile|profiling|bottleneck)$",
        sub_patterns: &[
            ("caching", r"^(cache|caching|memo|memoize)$"),
            ("loading", r"^(lazy|bundle|speed|latency)$"),
        ],
    },
    CategorySpec {
        category: Category::Backend,
        pattern: r"^(api|endpoint|server|backend|database|db|migration|service|controller|route|handler|middleware|queue|worker|webhook|graphql|rest|payment|stripe)$",
        sub_patterns: &[
            ("api", r"^(api|endpoint|route|rest|graphql)$"),
            ("data", r"^(database|db|migration)$"),
            ("jobs", r"^(queue|worker|webhook)$"),
        ],
    },
    CategorySpec {
        category: Category::Testing,
        pattern: r"^(test|testing|spec|mock|stub|fixture|coverage|e2e|unit|integration|assert|assertion)$",
        sub_patterns: &[
            ("unit", r"^(unit|mock|stub)$"),
            ("e2e", r"^(e2e|integration)$"),
        ],
    },
    CategorySpec {
        category: Category::Config,
        pattern: r"^(config|configuration|setting|settings|env|environment|deploy|deployment|build|webpack|vite|docker|ci|pipeline|dependency|dependencies)$",
        sub_patterns: &[
            ("build", r"^(build|webpack|vite)$"),
            ("deploy", r"^(deploy|deployment|docker|ci|pipeline)$"),
        ],
    },
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "as", "and", "or", "but", "not", "no", "this", "that", "these",
    "those", "it", "its", "my", "our", "your", "their", "his", "her", "i", "we", "you", "they",
    "he", "she", "me", "us", "them", "what", "where", "when", "why", "how", "which", "who",
    "whose", "does", "do", "did", "done", "can", "could", "should", "would", "will", "shall",
    "fix", "add", "remove", "update", "change", "make", "get", "set", "find", "show", "use",
    "need", "want", "implement", "create", "delete", "locate", "defined", "logic", "code",
    "file", "files", "issue", "bug", "problem", "broken", "work", "working",
];

const HOST_API_ALLOW: &[&str] = &[
    "localStorage",
    "sessionStorage",
    "setTimeout",
    "setInterval",
    "requestAnimationFrame",
    "innerHTML",
    "addEventListener",
    "querySelector",
];

const CLASS_MARKERS: &[&str] = &[
    "Service", "Controller", "Manager", "Handler", "Repository", "Provider", "Factory", "Client",
    "Store", "Gateway",
];

fn kebab_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]+-[a-z0-9-]+\b").unwrap())
}

fn pascal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z]+\b").unwrap())
}

fn camel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]+[A-Z][a-zA-Z0-9]*\b").unwrap())
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b[\w./-]+\.(?:ts|tsx|js|jsx|mjs|cjs|py|go|rs|rb|php|java|css|scss|json|ya?ml|toml|md|html|vue|svelte)\b",
        )
        .unwrap()
    })
}

fn error_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:[A-Z][a-zA-Z]*Error|E[A-Z]{2,}|[45]\d{2})\b").unwrap())
}

/// Analyse a free-form query into category, keywords and entities.
pub fn analyze(query: &str) -> IntentAnalysis {
    let keywords = extract_keywords(query);
    let entities = extract_entities(query);
    let (category, confidence, sub_category) = categorize(&keywords);

    IntentAnalysis {
        category,
        keywords,
        confidence,
        sub_category,
        entities,
    }
}

/// Keyword extraction: multi-part identifiers survive tokenisation, stop
/// words and trivial suffixes are dropped, first-seen order is preserved
/// with filename-shaped tokens ahead of generic terms.
fn extract_keywords(query: &str) -> Vec<String> {
    let mut preserved: Vec<String> = Vec::new();

    for m in filename_re().find_iter(query) {
        preserved.push(m.as_str().to_string());
    }
    for m in kebab_re().find_iter(&query.to_ascii_lowercase()) {
        preserved.push(m.as_str().to_string());
    }
    for m in pascal_re().find_iter(query) {
        preserved.push(m.as_str().to_string());
    }

    let mut keywords: Vec<String> = Vec::new();
    let mut push_unique = |kw: String, out: &mut Vec<String>| {
        let lower = kw.to_ascii_lowercase();
        if !out.iter().any(|k| k.to_ascii_lowercase() == lower) {
            out.push(kw);
        }
    };

    for token in &preserved {
        push_unique(token.clone(), &mut keywords);
    }

    for raw in query
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
    {
        if raw.is_empty() || STOP_WORDS.contains(&raw) {
            continue;
        }
        let stemmed = strip_suffix(raw);
        if stemmed.len() < 2 || STOP_WORDS.contains(&stemmed.as_str()) {
            continue;
        }
        push_unique(stemmed, &mut keywords);
    }

    keywords
}

fn strip_suffix(token: &str) -> String {
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

/// Pick the winning category by token match count; ties go to the category
/// whose longest matched token is longest, then to declaration order.
fn categorize(keywords: &[String]) -> (Category, f64, Option<String>) {
    static COMPILED: OnceLock<Vec<(Regex, Vec<(&'static str, Regex)>)>> = OnceLock::new();
    let compiled = COMPILED.get_or_init(|| {
        CATEGORY_SPECS
            .iter()
            .map(|spec| {
                let main = Regex::new(spec.pattern).unwrap();
                let subs = spec
                    .sub_patterns
                    .iter()
                    .map(|(name, pat)| (*name, Regex::new(pat).unwrap()))
                    .collect();
                (main, subs)
            })
            .collect()
    });

    let lowered: Vec<String> = keywords.iter().map(|k| k.to_ascii_lowercase()).collect();

    let mut scores: Vec<(usize, usize, usize)> = Vec::new();
    for (idx, (main, _)) in compiled.iter().enumerate() {
        let matched: Vec<&String> = lowered.iter().filter(|k| main.is_match(k)).collect();
        let longest = matched.iter().map(|k| k.len()).max().unwrap_or(0);
        scores.push((idx, matched.len(), longest));
    }

    let matching = scores.iter().filter(|(_, count, _)| *count > 0).count();
    let best = scores
        .iter()
        .filter(|(_, count, _)| *count > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)).then(b.0.cmp(&a.0)));

    let Some(&(idx, count, _)) = best else {
        return (Category::General, 0.0, None);
    };

    let mut confidence: f64 = match count {
        1 => 0.75,
        2 => 0.85,
        _ => 0.95,
    };
    match matching.saturating_sub(1) {
        0 => {}
        1 => confidence *= 0.85,
        _ => confidence *= 0.70,
    }
    confidence = confidence.clamp(0.0, 1.0);

    let sub_category = compiled[idx]
        .1
        .iter()
        .find(|(_, re)| lowered.iter().any(|k| re.is_match(k)))
        .map(|(name, _)| name.to_string());

    (CATEGORY_SPECS[idx].category, confidence, sub_category)
}

fn extract_entities(query: &str) -> Entities {
    let mut entities = Entities::default();

    for m in filename_re().find_iter(query) {
        push_dedup(&mut entities.files, m.as_str());
    }

    for m in error_token_re().find_iter(query) {
        push_dedup(&mut entities.errors, m.as_str());
    }

    for m in pascal_re().find_iter(query) {
        let token = m.as_str();
        if entities.errors.iter().any(|e| e == token) {
            continue;
        }
        // The suffix list decides class-ness; any other PascalCase token
        // (Button-like markers included) reads as a component.
        if CLASS_MARKERS.iter().any(|s| token.ends_with(s)) {
            push_dedup(&mut entities.classes, token);
        } else {
            push_dedup(&mut entities.components, token);
        }
    }

    for m in camel_re().find_iter(query) {
        let token = m.as_str();
        if HOST_API_ALLOW.contains(&token) {
            continue;
        }
        push_dedup(&mut entities.functions, token);
    }

    entities
}

fn push_dedup(bucket: &mut Vec<String>, value: &str) {
    if !bucket.iter().any(|v| v == value) {
        bucket.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_general_with_zero_confidence() {
        let intent = analyze("");
        assert_eq!(intent.category, Category::General);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.keywords.is_empty());
    }

    #[test]
    fn auth_query_hits_auth_with_confidence() {
        let intent = analyze("authentication logic");
        assert_eq!(intent.category, Category::Auth);
        assert!(intent.confidence >= 0.75, "got {}", intent.confidence);
        assert!(intent.keywords.iter().any(|k| k == "authentication"));
    }

    #[test]
    fn pascal_case_is_preserved_as_keyword() {
        let intent = analyze("ScriptController");
        assert_eq!(intent.category, Category::General);
        assert!(intent.keywords.iter().any(|k| k == "ScriptController"));
    }

    #[test]
    fn kebab_tokens_survive_tokenisation() {
        let intent = analyze("dark-mode toggle");
        assert!(intent.keywords.iter().any(|k| k == "dark-mode"));
    }

    #[test]
    fn multi_category_query_is_discounted() {
        let single = analyze("login");
        let mixed = analyze("login button");
        assert!(mixed.confidence < single.confidence);
    }

    #[test]
    fn three_matches_reach_high_confidence() {
        let intent = analyze("login logout token");
        assert_eq!(intent.category, Category::Auth);
        assert!((intent.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn sub_category_first_match_wins() {
        let intent = analyze("login session");
        assert_eq!(intent.category, Category::Auth);
        assert_eq!(intent.sub_category.as_deref(), Some("login"));
    }

    #[test]
    fn stop_words_and_suffixes_are_stripped() {
        let intent = analyze("fix the failing buttons");
        assert!(intent.keywords.iter().any(|k| k == "button"));
        assert!(!intent.keywords.iter().any(|k| k == "fix" || k == "the"));
    }

    #[test]
    fn filenames_rank_ahead_of_generic_terms() {
        let intent = analyze("update login.ts handler");
        assert_eq!(intent.keywords[0], "login.ts");
        assert!(intent.entities.files.iter().any(|f| f == "login.ts"));
    }

    #[test]
    fn entities_partition_components_and_classes() {
        let entities = extract_entities("LoginButton uses AuthService and getUser");
        assert!(entities.components.iter().any(|c| c == "LoginButton"));
        assert!(entities.classes.iter().any(|c| c == "AuthService"));
        assert!(entities.functions.iter().any(|f| f == "getUser"));
    }

    #[test]
    fn error_tokens_detected() {
        let entities = extract_entities("TypeError and ENOENT after 404");
        assert!(entities.errors.iter().any(|e| e == "TypeError"));
        assert!(entities.errors.iter().any(|e| e == "ENOENT"));
        assert!(entities.errors.iter().any(|e| e == "404"));
    }

    #[test]
    fn confidence_is_deterministic() {
        let a = analyze("stripe payment");
        let b = analyze("stripe payment");
        assert_eq!(a.category, b.category);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.keywords, b.keywords);
    }
}

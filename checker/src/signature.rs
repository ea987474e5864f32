// signature.rs — Function signature extraction from C source
//
// Extracts function definitions from a C source file at the text level.
// No C parsing: comments are stripped, whitespace is squeezed, and a single
// pattern picks out `<return type> <name>(<args>) {`. Comment-like text
// inside string or char literals is not recognized as such.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

// ── Data types ──────────────────────────────────────────────────────────────

/// Signature of one function definition found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: String,
    /// Normalized argument types in declaration order (`int*`, `unsigned long`).
    pub arg_types: Vec<String>,
}

// ── Function table ──────────────────────────────────────────────────────────

/// Name → signature map for one source file.
///
/// A later definition with the same name replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionSignature>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every function definition from raw C source text.
    pub fn from_source(source: &str) -> Self {
        let cleaned = clean_source(source);
        let mut table = Self::new();
        for sig in scan_definitions(&cleaned) {
            table.insert(sig);
        }
        table
    }

    pub fn insert(&mut self, sig: FunctionSignature) {
        self.functions.insert(sig.name.clone(), sig);
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ── Cleaning ────────────────────────────────────────────────────────────────

fn line_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//.*").expect("static pattern"))
}

fn block_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static pattern"))
}

fn space_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +").expect("static pattern"))
}

/// Strip comments and squeeze whitespace.
///
/// Order matters: `//` comments go first, so a `/*` that only appears
/// after `//` never opens a block comment.
pub fn clean_source(source: &str) -> String {
    let s = line_comment().replace_all(source, "");
    let s = block_comment().replace_all(&s, "");
    let s = s.replace('\t', " ");
    space_run().replace_all(&s, " ").into_owned()
}

// ── Scanner ─────────────────────────────────────────────────────────────────

fn definition_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<return_type>[a-zA-Z_][a-zA-Z0-9_ \*]*)\s+",
            r"(?P<name>[a-zA-Z_][a-zA-Z0-9_]*)\s*",
            r"\((?P<args>[^\)]*)\)\s*\{",
        ))
        .expect("static pattern")
    })
}

/// Scan cleaned source for function definitions, in source order.
/// Bare declarations (no opening brace) are not matched. The return type
/// never spans a line break, so a preceding `#define` line cannot leak into it.
fn scan_definitions(cleaned: &str) -> Vec<FunctionSignature> {
    definition_pattern()
        .captures_iter(cleaned)
        .map(|c| {
            let args = c["args"].trim();
            let arg_types = if args.is_empty() {
                Vec::new()
            } else {
                args.split(',').map(normalize_argument).collect()
            };
            FunctionSignature {
                name: c["name"].trim().to_string(),
                return_type: c["return_type"].trim().to_string(),
                arg_types,
            }
        })
        .collect()
}

/// Reduce one parameter declaration to its type.
///
/// With a `*`, the parameter name after the last `*` is dropped and the star
/// run is fused onto the base, so `int *x`, `int* x` and `int * x` all give
/// `int*`. Without one, the trailing parameter-name token is dropped.
pub fn normalize_argument(arg: &str) -> String {
    let arg = arg.trim();
    match arg.rfind('*') {
        Some(last_star) => {
            let typed = &arg[..=last_star];
            let base = typed.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
            let stars = typed[base.len()..].matches('*').count();
            let mut out = base.split_whitespace().collect::<Vec<_>>().join(" ");
            out.push_str(&"*".repeat(stars));
            out
        }
        None => match arg.rsplit_once(' ') {
            Some((base, _name)) => base.trim().to_string(),
            None => arg.to_string(),
        },
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

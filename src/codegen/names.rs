//! Identifier rendering
//!
//! Total case-conversion functions from declared schema names to Rust
//! identifiers, plus keyword escaping. Declared names arrive in whatever
//! case the dialect author used (SCREAMING_SNAKE for messages and enums by
//! convention, but nothing enforces that), so every function here must cope
//! with empty input, digits, and runs of separators.

use std::collections::HashSet;

/// Naming knobs, fed from the `[naming]` configuration section
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Uppercase forms kept intact in PascalCase output ("GPS" -> "GPSStatus")
    pub acronyms: HashSet<String>,
    /// Keep SCREAMING_SNAKE enum entry names as declared instead of
    /// PascalCasing them
    pub preserve_screaming_case: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            acronyms: ["ID", "GPS", "IMU", "UAV", "URL", "API"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preserve_screaming_case: true,
        }
    }
}

/// Split a declared name into lowercase word segments at separators and
/// case boundaries. "GPSStatus2" -> ["gps", "status2"]
fn segments(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // lower->upper boundary, or the last capital of an acronym run
            // followed by a lowercase tail (GPSStatus -> gps|status)
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Render a declared name as snake_case
pub fn to_snake_case(input: &str) -> String {
    let name = segments(input).join("_");
    prefix_if_leading_digit(name)
}

/// Render a declared name as PascalCase, keeping configured acronyms
/// uppercase
pub fn to_pascal_case(input: &str, naming: &NamingConfig) -> String {
    let mut name = String::new();
    for segment in segments(input) {
        let upper = segment.to_uppercase();
        if naming.acronyms.contains(&upper) {
            name.push_str(&upper);
        } else {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
        }
    }
    prefix_if_leading_digit(name)
}

/// A Rust identifier cannot start with a digit
fn prefix_if_leading_digit(name: String) -> String {
    if name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        format!("_{}", name)
    } else {
        name
    }
}

/// True for names already in SCREAMING_SNAKE form
pub fn is_screaming_case(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Rust keywords (strict and reserved) that need escaping in generated
/// identifiers
pub const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Escape a rendered identifier that collides with a Rust keyword. The few
/// keywords that cannot appear as raw identifiers get a trailing underscore
/// instead.
pub fn escape_keyword(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{}_", name),
        k if RUST_KEYWORDS.contains(&k) => format!("r#{}", k),
        _ => name.to_string(),
    }
}

//! Diagnostics
//!
//! Collects the semantic problems found while resolving and planning
//! conversions, so one run can report every independent field problem
//! instead of stopping at the first.

use std::fmt;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Reference resolution ===
    /// Mapping references a message id absent from a dialect
    UnresolvedMessageId,
    /// Mapping references a field absent from its message
    UnresolvedField,
    /// Field references an enum absent from its dialect
    UnresolvedEnum,
    /// Default uses a symbolic key with no registered provider
    UnresolvedProvider,
    /// Default literal matches no entry of the field's enum
    UnresolvedEnumValue,

    // === Planning ===
    /// Target field left without any assignment
    IncompleteMapping,
    /// Target field assigned more than once
    ConflictingAssignment,
    /// Assignment the generated code cannot express (array or cross-class)
    UnsupportedAssignment,

    // === Consistency ===
    /// Declared source_name does not match the resolved message
    NameMismatch,
    /// Identity conversion between fields with different unit labels
    UnitMismatch,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedMessageId => "E101",
            Self::UnresolvedField => "E102",
            Self::UnresolvedEnum => "E103",
            Self::UnresolvedProvider => "E104",
            Self::UnresolvedEnumValue => "E105",
            Self::IncompleteMapping => "E106",
            Self::ConflictingAssignment => "E107",
            Self::UnsupportedAssignment => "E108",
            Self::NameMismatch => "W101",
            Self::UnitMismatch => "W102",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnresolvedMessageId
            | Self::UnresolvedField
            | Self::UnresolvedEnum
            | Self::UnresolvedProvider
            | Self::UnresolvedEnumValue
            | Self::IncompleteMapping
            | Self::ConflictingAssignment
            | Self::UnsupportedAssignment => Severity::Error,

            Self::NameMismatch | Self::UnitMismatch => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Where the problem was found, e.g. a document path or a
    /// "SOURCE -> TARGET" conversion pair
    pub origin: String,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Effective severity; defaults to the code's severity but can be
    /// promoted (strict_units)
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Additional context (e.g., suggestions, document locations)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(origin: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            code,
            severity: code.severity(),
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Promote this item to an error regardless of its code's default
    pub fn as_error(mut self) -> Self {
        self.severity = Severity::Error;
        self
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code, self.severity, self.message, self.origin
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from the resolve and plan passes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Add an error with the code's default severity forced to error
    pub fn error(
        &mut self,
        origin: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(origin, code, message).as_error());
    }

    /// Add a warning-severity item
    pub fn warning(
        &mut self,
        origin: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        let mut item = DiagnosticItem::new(origin, code, message);
        item.severity = Severity::Warning;
        self.push(item);
    }

    /// Target field with no mapping and no default
    pub fn incomplete_mapping(&mut self, origin: impl Into<String>, field: &str) {
        self.push(DiagnosticItem::new(
            origin,
            DiagnosticCode::IncompleteMapping,
            format!("target field '{}' has no mapping or default", field),
        ));
    }

    /// Target field assigned a second time
    pub fn conflicting_assignment(
        &mut self,
        origin: impl Into<String>,
        field: &str,
        first: &str,
        second: &str,
    ) {
        self.push(
            DiagnosticItem::new(
                origin,
                DiagnosticCode::ConflictingAssignment,
                format!("target field '{}' is assigned more than once", field),
            )
            .with_context(format!("first assignment: {}", first))
            .with_context(format!("second assignment: {}", second)),
        );
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    /// Get all errors
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    /// Get total count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

/// Best fuzzy match among `candidates` for a name that failed to resolve,
/// used for "did you mean" hints. Matches both directions so typos with an
/// extra character still hit; ties break lexicographically so hints are
/// deterministic.
pub fn closest_match<'a>(
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    candidates
        .into_iter()
        .filter_map(|c| {
            matcher
                .fuzzy_match(c, input)
                .or_else(|| matcher.fuzzy_match(input, c))
                .map(|score| (score, c))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(a.1)))
        .map(|(_, c)| c.to_string())
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(
            DiagnosticCode::IncompleteMapping.severity(),
            Severity::Error
        );
        assert_eq!(DiagnosticCode::UnitMismatch.severity(), Severity::Warning);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.incomplete_mapping("HEARTBEAT -> PULSE", "callsign");
        diags.warning(
            "map.xml",
            DiagnosticCode::NameMismatch,
            "declared name does not match",
        );

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_severity_promotion() {
        let item = DiagnosticItem::new(
            "a -> b",
            DiagnosticCode::UnitMismatch,
            "identity conversion between degE7 and degrees",
        )
        .as_error();

        assert_eq!(item.severity, Severity::Error);

        let mut diags = Diagnostics::new();
        diags.push(item);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_closest_match_suggests_near_name() {
        let fields = ["lat", "lon", "time_boot_ms", "hdg"];
        assert_eq!(
            closest_match("latt", fields.iter().copied()),
            Some("lat".to_string())
        );
        assert_eq!(closest_match("qqq", fields.iter().copied()), None);
    }

    #[test]
    fn test_format_all_lists_context() {
        let mut diags = Diagnostics::new();
        diags.conflicting_assignment(
            "GLOBAL_POSITION_INT -> LATITUDE_LONGITUDE",
            "lat",
            "mapping from 'lat'",
            "default '0'",
        );

        let text = diags.format_all();
        assert!(text.contains("E107"));
        assert!(text.contains("first assignment: mapping from 'lat'"));
        assert!(text.contains("1 error(s)"));
    }
}

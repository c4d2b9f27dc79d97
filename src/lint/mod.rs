//! Dialect Structure Linting
//!
//! Reports structural smells that do not stop message compilation: messages
//! with no fields, numeric fields without a unit label, duplicate entry
//! values inside one enum, enums no field ever references, and field names
//! that break the dialect naming convention.
//!
//! Only parse failures are errors. Everything else is a warning, so CI can
//! gate on exit status without blocking on style findings.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::dialect::{loader, DialectModel};

/// Result of linting one dialect document
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub file: String,
    pub errors: Vec<LintFinding>,
    pub warnings: Vec<LintFinding>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

/// One finding, anchored to the message/enum/field it concerns
#[derive(Debug, Serialize)]
pub struct LintFinding {
    pub code: &'static str,
    pub message: String,
    pub item: String,
}

/// The dialect structure linter
pub struct DialectLinter {
    /// Convention for wire field names
    field_name_pattern: Regex,
}

impl Default for DialectLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectLinter {
    pub fn new() -> Self {
        Self {
            field_name_pattern: Regex::new(r"^[a-z][a-z0-9_]*$").unwrap(),
        }
    }

    /// Lint a loaded dialect model
    pub fn lint(&self, file: &str, model: &DialectModel) -> LintResult {
        let mut result = LintResult {
            file: file.to_string(),
            ..Default::default()
        };

        let mut referenced_enums: HashSet<&str> = HashSet::new();

        for message in model.messages() {
            if message.fields.is_empty() {
                result.warnings.push(LintFinding {
                    code: "EMPTY_MESSAGE",
                    message: format!("message '{}' (id {}) declares no fields", message.name, message.id),
                    item: message.name.clone(),
                });
            }
            for field in &message.fields {
                let item = format!("{}.{}", message.name, field.name);
                if let Some(enum_name) = &field.enum_ref {
                    referenced_enums.insert(enum_name.as_str());
                } else if field.ty.is_numeric() && field.units.is_none() {
                    result.warnings.push(LintFinding {
                        code: "MISSING_UNITS",
                        message: format!("numeric field '{}' carries no unit label", field.name),
                        item: item.clone(),
                    });
                }
                if !self.field_name_pattern.is_match(&field.name) {
                    result.warnings.push(LintFinding {
                        code: "FIELD_NAME_STYLE",
                        message: format!("field name '{}' is not lower snake case", field.name),
                        item,
                    });
                }
            }
        }

        for schema in model.enums() {
            let mut seen: Vec<(i64, &str)> = Vec::new();
            for entry in &schema.entries {
                match seen.iter().find(|(value, _)| *value == entry.value) {
                    Some((_, first)) => result.warnings.push(LintFinding {
                        code: "DUPLICATE_ENUM_VALUE",
                        message: format!(
                            "value {} already used by entry '{}'",
                            entry.value, first
                        ),
                        item: format!("{}.{}", schema.name, entry.name),
                    }),
                    None => seen.push((entry.value, &entry.name)),
                }
            }
            if !referenced_enums.contains(schema.name.as_str()) {
                result.warnings.push(LintFinding {
                    code: "UNUSED_ENUM",
                    message: format!("enum '{}' is not referenced by any field", schema.name),
                    item: schema.name.clone(),
                });
            }
        }

        result
    }
}

/// Lint every given path. Directories are scanned recursively for `.xml`
/// documents; plain files are linted as-is. One result per document, in a
/// stable order.
pub fn lint_paths(paths: &[PathBuf]) -> Vec<LintResult> {
    let linter = DialectLinter::new();
    let mut results = Vec::new();

    for file in expand_paths(paths) {
        let label = file.to_string_lossy().to_string();
        match loader::load(&file) {
            Ok(model) => results.push(linter.lint(&label, &model)),
            Err(e) => results.push(LintResult {
                file: label,
                errors: vec![LintFinding {
                    code: "PARSE",
                    message: e.to_string(),
                    item: String::new(),
                }],
                warnings: Vec::new(),
            }),
        }
    }

    results
}

fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().map(|x| x == "xml").unwrap_or(false))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

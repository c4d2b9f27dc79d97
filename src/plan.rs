//! Conversion planning
//!
//! Turns resolved mapping buckets into ConversionUnits: for every
//! (source message, target message) pair, each assignable target field is
//! matched with exactly one assignment source and the result is ordered by
//! the target message's field declaration order, which is what makes the
//! emitted converters deterministic. Diagnostics are accumulated across all
//! units so one run reports every independent problem; units that planned
//! cleanly are still returned alongside the diagnostics.

use crate::dialect::{DialectModel, FieldSchema, FieldType, MessageSchema};
use crate::diagnostics::{closest_match, DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::mapping::{ConversionTemplate, DefaultExpr, MappingBucket, MappingSet, ProviderKind};

/// Field name reserved for the pipeline-supplied provenance value
pub const PROVENANCE_FIELD: &str = "source_system";

// =============================================================================
// Planned output
// =============================================================================

/// Where one target field's value comes from
#[derive(Debug, Clone)]
pub enum AssignmentSource {
    /// A source-dialect field pushed through a conversion template
    Mapped {
        source_field: FieldSchema,
        conversion: ConversionTemplate,
    },
    /// A constant or provider value, no source field involved
    Defaulted { value: PlannedDefault },
}

/// A default with plan-time resolution already applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedDefault {
    /// Literal text, rendered verbatim inside a cast
    Literal(String),
    /// Literal resolved against the target field's enum
    EnumVariant { enum_name: String, entry_name: String },
    /// Symbolic provider resolved to a support helper
    Provider(ProviderKind),
}

/// One target field together with its assignment source
#[derive(Debug, Clone)]
pub struct PlannedAssignment {
    pub target_field: FieldSchema,
    pub source: AssignmentSource,
}

/// Everything needed to convert one source message into one target message
#[derive(Debug, Clone)]
pub struct ConversionUnit {
    pub source_id: u32,
    pub source_name: String,
    pub target_id: u32,
    pub target_name: String,
    /// In target field declaration order; array fields are absent (the
    /// emitter zero-fills them)
    pub assignments: Vec<PlannedAssignment>,
}

/// Planner output: cleanly planned units plus everything worth reporting.
/// A bucket that produced any error diagnostic contributes no unit.
#[derive(Debug)]
pub struct ConversionPlan {
    pub units: Vec<ConversionUnit>,
    pub diagnostics: Diagnostics,
}

impl ConversionPlan {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Planner knobs, fed from the `[resolver]` configuration section
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Treat unit-label mismatches as errors instead of warnings
    pub strict_units: bool,
}

// =============================================================================
// Planning
// =============================================================================

/// Plan every bucket of `mappings` against the two models.
pub fn plan(
    mappings: &MappingSet,
    source: &DialectModel,
    target: &DialectModel,
    options: PlanOptions,
) -> ConversionPlan {
    let mut diagnostics = Diagnostics::new();
    let mut units = Vec::new();
    let origin = mappings.file().display().to_string();

    for bucket in mappings.buckets() {
        if let Some(unit) = plan_bucket(bucket, source, target, options, &origin, &mut diagnostics)
        {
            units.push(unit);
        }
    }

    ConversionPlan { units, diagnostics }
}

/// Plan one bucket. Returns None when any error diagnostic was recorded for
/// it, leaving clean buckets unaffected.
fn plan_bucket(
    bucket: &MappingBucket,
    source: &DialectModel,
    target: &DialectModel,
    options: PlanOptions,
    origin: &str,
    diags: &mut Diagnostics,
) -> Option<ConversionUnit> {
    // The resolver only builds buckets for ids present in both models
    let (Some(source_msg), Some(target_msg)) = (
        source.message_by_id(bucket.source_id),
        target.message_by_id(bucket.target_id),
    ) else {
        return None;
    };

    let errors_before = diags.error_count();
    let unit_label = format!(
        "{} (id {}) -> {} (id {})",
        source_msg.name, bucket.source_id, target_msg.name, bucket.target_id
    );

    if target_msg.field(PROVENANCE_FIELD).is_some() {
        diags.push(
            DiagnosticItem::new(
                origin.to_string(),
                DiagnosticCode::ConflictingAssignment,
                format!(
                    "target message '{}' declares reserved field '{}'",
                    target_msg.name, PROVENANCE_FIELD
                ),
            )
            .with_context(unit_label.clone()),
        );
    }

    // target field name -> (source, document location of the winning entry)
    let mut assigned: Vec<(String, AssignmentSource, String)> = Vec::new();

    for mapping in &bucket.mappings {
        let Some(source_field) = lookup_field(
            diags,
            origin,
            source_msg,
            &mapping.source_field,
            "source",
            &mapping.location,
        ) else {
            continue;
        };
        let Some(target_field) = lookup_field(
            diags,
            origin,
            target_msg,
            &mapping.target_field,
            "target",
            &mapping.location,
        ) else {
            continue;
        };

        if source_field.is_array() || target_field.is_array() {
            diags.push(
                DiagnosticItem::new(
                    origin.to_string(),
                    DiagnosticCode::UnsupportedAssignment,
                    format!(
                        "array field '{}' cannot be assigned through a mapping",
                        if source_field.is_array() {
                            &mapping.source_field
                        } else {
                            &mapping.target_field
                        }
                    ),
                )
                .with_context(mapping.location.clone()),
            );
            continue;
        }

        if !classes_compatible(source_field.ty, target_field.ty) {
            diags.push(
                DiagnosticItem::new(
                    origin.to_string(),
                    DiagnosticCode::UnsupportedAssignment,
                    format!(
                        "cannot assign {} field '{}' to {} field '{}'",
                        type_class(source_field.ty),
                        mapping.source_field,
                        type_class(target_field.ty),
                        mapping.target_field
                    ),
                )
                .with_context(mapping.location.clone()),
            );
            continue;
        }

        check_units(diags, origin, options, source_field, target_field, &mapping.conversion, &mapping.location);

        record_assignment(
            diags,
            origin,
            &mut assigned,
            &mapping.target_field,
            AssignmentSource::Mapped {
                source_field: source_field.clone(),
                conversion: mapping.conversion.clone(),
            },
            &mapping.location,
        );
    }

    for default in &bucket.defaults {
        let Some(target_field) = lookup_field(
            diags,
            origin,
            target_msg,
            &default.target_field,
            "target",
            &default.location,
        ) else {
            continue;
        };

        if target_field.is_array() {
            diags.push(
                DiagnosticItem::new(
                    origin.to_string(),
                    DiagnosticCode::UnsupportedAssignment,
                    format!(
                        "array field '{}' cannot be assigned through a default",
                        default.target_field
                    ),
                )
                .with_context(default.location.clone()),
            );
            continue;
        }

        let Some(value) = plan_default(diags, origin, target, target_field, &default.value, &default.location)
        else {
            continue;
        };

        record_assignment(
            diags,
            origin,
            &mut assigned,
            &default.target_field,
            AssignmentSource::Defaulted { value },
            &default.location,
        );
    }

    // Declaration-order walk: this fixes the emitted field order and surfaces
    // anything left unassigned
    let mut assignments = Vec::with_capacity(target_msg.fields.len());
    for field in &target_msg.fields {
        if field.name == PROVENANCE_FIELD {
            // Already reported above
            continue;
        }
        if field.is_array() {
            if field.enum_ref.is_some() {
                diags.push(
                    DiagnosticItem::new(
                        origin.to_string(),
                        DiagnosticCode::UnsupportedAssignment,
                        format!(
                            "enum array field '{}' is not supported in a converted message",
                            field.name
                        ),
                    )
                    .with_context(unit_label.clone()),
                );
            }
            // Zero-filled by the emitter, never mapped
            continue;
        }
        match assigned.iter().position(|(name, _, _)| name == &field.name) {
            Some(idx) => {
                let (_, src, _) = assigned.swap_remove(idx);
                assignments.push(PlannedAssignment {
                    target_field: field.clone(),
                    source: src,
                });
            }
            None => {
                diags.push(
                    DiagnosticItem::new(
                        origin.to_string(),
                        DiagnosticCode::IncompleteMapping,
                        format!(
                            "target field '{}' of message '{}' (id {}) has no mapping or default",
                            field.name, target_msg.name, target_msg.id
                        ),
                    )
                    .with_context(unit_label.clone()),
                );
            }
        }
    }

    if diags.error_count() > errors_before {
        return None;
    }

    Some(ConversionUnit {
        source_id: bucket.source_id,
        source_name: source_msg.name.clone(),
        target_id: bucket.target_id,
        target_name: target_msg.name.clone(),
        assignments,
    })
}

fn lookup_field<'a>(
    diags: &mut Diagnostics,
    origin: &str,
    message: &'a MessageSchema,
    field: &str,
    role: &str,
    location: &str,
) -> Option<&'a FieldSchema> {
    match message.field(field) {
        Some(found) => Some(found),
        None => {
            let mut item = DiagnosticItem::new(
                origin.to_string(),
                DiagnosticCode::UnresolvedField,
                format!(
                    "{} field '{}' not found on message '{}' (id {})",
                    role, field, message.name, message.id
                ),
            )
            .with_context(location.to_string());
            if let Some(near) = closest_match(field, message.field_names()) {
                item = item.with_context(format!("did you mean '{}'?", near));
            }
            diags.push(item);
            None
        }
    }
}

fn record_assignment(
    diags: &mut Diagnostics,
    origin: &str,
    assigned: &mut Vec<(String, AssignmentSource, String)>,
    field: &str,
    source: AssignmentSource,
    location: &str,
) {
    if let Some((_, _, first)) = assigned.iter().find(|(name, _, _)| name == field) {
        diags.conflicting_assignment(origin.to_string(), field, first, location);
        return;
    }
    assigned.push((field.to_string(), source, location.to_string()));
}

/// Resolve a raw default against the target field: enum literals become
/// variant references, providers require a plain numeric field.
fn plan_default(
    diags: &mut Diagnostics,
    origin: &str,
    target: &DialectModel,
    field: &FieldSchema,
    value: &DefaultExpr,
    location: &str,
) -> Option<PlannedDefault> {
    match value {
        DefaultExpr::Provider(provider) => {
            if !field.ty.is_numeric() || field.enum_ref.is_some() {
                diags.push(
                    DiagnosticItem::new(
                        origin.to_string(),
                        DiagnosticCode::UnsupportedAssignment,
                        format!(
                            "provider default '{}' requires a plain numeric target field, but '{}' is not",
                            provider.key(),
                            field.name
                        ),
                    )
                    .with_context(location.to_string()),
                );
                return None;
            }
            Some(PlannedDefault::Provider(*provider))
        }
        DefaultExpr::Literal(text) => match &field.enum_ref {
            Some(enum_name) => {
                // Enum references were checked at load time
                let schema = target.enum_by_name(enum_name)?;
                let entry = schema.entry_by_name(text).or_else(|| {
                    text.parse::<i64>()
                        .ok()
                        .and_then(|v| schema.entry_by_value(v))
                });
                // The emitter keeps only the first entry per value, so a
                // name match is folded onto that entry
                let entry = entry.and_then(|e| schema.entry_by_value(e.value));
                match entry {
                    Some(entry) => Some(PlannedDefault::EnumVariant {
                        enum_name: enum_name.clone(),
                        entry_name: entry.name.clone(),
                    }),
                    None => {
                        diags.push(
                            DiagnosticItem::new(
                                origin.to_string(),
                                DiagnosticCode::UnresolvedEnumValue,
                                format!(
                                    "default '{}' matches no entry of enum '{}' (field '{}')",
                                    text, enum_name, field.name
                                ),
                            )
                            .with_context(location.to_string()),
                        );
                        None
                    }
                }
            }
            None => {
                if field.ty == FieldType::Char && text.chars().count() != 1 {
                    diags.push(
                        DiagnosticItem::new(
                            origin.to_string(),
                            DiagnosticCode::UnsupportedAssignment,
                            format!(
                                "default '{}' for char field '{}' must be exactly one character",
                                text, field.name
                            ),
                        )
                        .with_context(location.to_string()),
                    );
                    return None;
                }
                Some(PlannedDefault::Literal(text.clone()))
            }
        },
    }
}

fn check_units(
    diags: &mut Diagnostics,
    origin: &str,
    options: PlanOptions,
    source_field: &FieldSchema,
    target_field: &FieldSchema,
    conversion: &ConversionTemplate,
    location: &str,
) {
    if !conversion.is_identity() {
        return;
    }
    let (Some(source_units), Some(target_units)) = (&source_field.units, &target_field.units)
    else {
        return;
    };
    if source_units == target_units {
        return;
    }
    let mut item = DiagnosticItem::new(
        origin.to_string(),
        DiagnosticCode::UnitMismatch,
        format!(
            "'{}' [{}] maps to '{}' [{}] without a conversion",
            source_field.name, source_units, target_field.name, target_units
        ),
    )
    .with_context(location.to_string());
    if options.strict_units {
        item = item.as_error();
    }
    diags.push(item);
}

/// Coarse class compatibility: numeric-to-numeric, string-to-string,
/// char-to-char
fn classes_compatible(source: FieldType, target: FieldType) -> bool {
    if target.is_numeric() {
        source.is_numeric()
    } else {
        source == target
    }
}

fn type_class(ty: FieldType) -> &'static str {
    if ty.is_numeric() {
        "numeric"
    } else if ty == FieldType::Char {
        "char"
    } else {
        "string"
    }
}

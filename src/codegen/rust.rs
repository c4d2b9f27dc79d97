//! Rust artifact rendering
//!
//! Pure, deterministic rendering of DialectModel entities and planned
//! ConversionUnits into Rust source text. The renderer only receives
//! already-resolved model data; identical input always yields byte-identical
//! output. Everything here returns strings, the writing happens in the
//! orchestration layer.

use std::collections::{BTreeSet, HashSet};

use crate::dialect::{DialectModel, EnumSchema, FieldSchema, FieldType};
use crate::plan::{AssignmentSource, ConversionUnit, PlannedDefault};

use super::names::{escape_keyword, is_screaming_case, to_pascal_case, to_snake_case, NamingConfig};

const DOC_WIDTH: usize = 76;

// =============================================================================
// Rendered names
// =============================================================================

/// File stem and type name chosen for one message or enum
#[derive(Debug, Clone)]
pub struct NamedItem {
    pub stem: String,
    pub type_name: String,
}

/// All rendering names for one target dialect, collision-free
#[derive(Debug)]
pub struct TargetNames {
    /// Parallel to `DialectModel::messages`
    pub messages: Vec<NamedItem>,
    /// Parallel to `DialectModel::enums`
    pub enums: Vec<NamedItem>,
    /// The sum type covering every target message
    pub sum_type: String,
}

impl TargetNames {
    pub fn build(target: &DialectModel, naming: &NamingConfig) -> Self {
        let sum_type = format!("{}Message", to_pascal_case(target.name(), naming));

        // mod.rs and convert.rs are always emitted; the generated base file
        // also introduces these type names
        let mut used_stems: HashSet<String> =
            ["mod", "convert"].iter().map(|s| s.to_string()).collect();
        let mut used_types: HashSet<String> =
            ["SourceRecord", "ConvertError", "ConvertFn"].iter().map(|s| s.to_string()).collect();
        used_types.insert(sum_type.clone());

        let messages = target
            .messages()
            .iter()
            .map(|msg| {
                let stem_base = non_empty(to_snake_case(&msg.name), || format!("message_{}", msg.id));
                let type_base =
                    non_empty(to_pascal_case(&msg.name, naming), || format!("Message{}", msg.id));
                NamedItem {
                    stem: unique_name(stem_base, &mut used_stems),
                    type_name: unique_name(type_base, &mut used_types),
                }
            })
            .collect();

        let enums = target
            .enums()
            .iter()
            .map(|schema| {
                let mut stem = non_empty(to_snake_case(&schema.name), || "unnamed".to_string());
                let mut type_name =
                    non_empty(to_pascal_case(&schema.name, naming), || "Unnamed".to_string());
                // Enums colliding with a message take an Enum suffix before
                // the numeric fallback kicks in
                if used_stems.contains(&stem) {
                    stem.push_str("_enum");
                }
                if used_types.contains(&type_name) {
                    type_name.push_str("Enum");
                }
                NamedItem {
                    stem: unique_name(stem, &mut used_stems),
                    type_name: unique_name(type_name, &mut used_types),
                }
            })
            .collect();

        Self {
            messages,
            enums,
            sum_type,
        }
    }

    fn enum_index(&self, target: &DialectModel, declared: &str) -> Option<usize> {
        target.enums().iter().position(|e| e.name == declared)
    }

    /// Rust type name for a declared enum
    pub fn enum_type(&self, target: &DialectModel, declared: &str) -> Option<&str> {
        self.enum_index(target, declared)
            .map(|i| self.enums[i].type_name.as_str())
    }
}

fn non_empty(name: String, fallback: impl FnOnce() -> String) -> String {
    if name.is_empty() {
        fallback()
    } else {
        name
    }
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Renders every artifact for one (source, target) dialect pair
pub struct Renderer<'a> {
    source: &'a DialectModel,
    target: &'a DialectModel,
    naming: &'a NamingConfig,
    serde_derives: bool,
    header: String,
    names: TargetNames,
}

impl<'a> Renderer<'a> {
    pub fn new(
        source: &'a DialectModel,
        target: &'a DialectModel,
        naming: &'a NamingConfig,
        serde_derives: bool,
        header_note: &str,
    ) -> Self {
        let mut header = String::from("// Generated by bridgegen - DO NOT EDIT.\n");
        header.push_str(&format!(
            "// Source dialect: {}. Target dialect: {}.\n",
            source.name(),
            target.name()
        ));
        if !header_note.is_empty() {
            header.push_str(&format!("// {}\n", header_note));
        }
        let names = TargetNames::build(target, naming);
        Self {
            source,
            target,
            naming,
            serde_derives,
            header,
            names,
        }
    }

    pub fn names(&self) -> &TargetNames {
        &self.names
    }

    // -------------------------------------------------------------------------
    // Message record files
    // -------------------------------------------------------------------------

    /// Render the record struct file for the target message at `index`
    pub fn render_message(&self, index: usize) -> String {
        let msg = &self.target.messages()[index];
        let item = &self.names.messages[index];
        let mut out = self.header.clone();
        out.push('\n');

        let mut imports: BTreeSet<&str> = BTreeSet::new();
        for field in &msg.fields {
            if let Some(enum_name) = &field.enum_ref {
                if let Some(ty) = self.names.enum_type(self.target, enum_name) {
                    imports.insert(ty);
                }
            }
        }
        if self.serde_derives {
            out.push_str("use serde::{Deserialize, Serialize};\n");
        }
        if !imports.is_empty() {
            let list: Vec<&str> = imports.into_iter().collect();
            out.push_str(&format!("use super::{{{}}};\n", list.join(", ")));
        }
        if self.serde_derives || msg.fields.iter().any(|f| f.enum_ref.is_some()) {
            out.push('\n');
        }

        push_doc(&mut out, "", &msg.description);
        out.push_str(&self.struct_derives());
        out.push_str(&format!("pub struct {} {{\n", item.type_name));
        out.push_str("    /// Identifier of the system the source message came from\n");
        out.push_str("    pub source_system: u32,\n");
        for field in &msg.fields {
            let doc = match &field.units {
                Some(units) if !field.description.is_empty() => {
                    format!("{} [{}]", field.description, units)
                }
                Some(units) => format!("[{}]", units),
                None => field.description.clone(),
            };
            push_doc(&mut out, "    ", &doc);
            out.push_str(&format!(
                "    pub {}: {},\n",
                self.field_ident(field),
                self.field_rust_type(field)
            ));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl {} {{\n", item.type_name));
        out.push_str(&format!("    pub const ID: u32 = {};\n", msg.id));
        out.push_str(&format!("    pub const NAME: &'static str = {:?};\n", msg.name));
        out.push_str("}\n");
        out
    }

    fn struct_derives(&self) -> String {
        if self.serde_derives {
            "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n".to_string()
        } else {
            "#[derive(Debug, Clone, PartialEq)]\n".to_string()
        }
    }

    fn field_ident(&self, field: &FieldSchema) -> String {
        escape_keyword(&non_empty(to_snake_case(&field.name), || "field".to_string()))
    }

    fn field_rust_type(&self, field: &FieldSchema) -> String {
        let base = match &field.enum_ref {
            Some(enum_name) => self
                .names
                .enum_type(self.target, enum_name)
                .unwrap_or(field.ty.rust_type())
                .to_string(),
            None => field.ty.rust_type().to_string(),
        };
        match field.array_len {
            Some(len) => format!("[{}; {}]", base, len),
            None => base,
        }
    }

    // -------------------------------------------------------------------------
    // Enum files
    // -------------------------------------------------------------------------

    /// Render the enum file for the target enum at `index`
    pub fn render_enum(&self, index: usize) -> String {
        let schema = &self.target.enums()[index];
        let item = &self.names.enums[index];
        let mut out = self.header.clone();
        out.push('\n');
        if self.serde_derives {
            out.push_str("use serde::{Deserialize, Serialize};\n\n");
        }

        // Rust rejects duplicate discriminants, so only the first entry per
        // value is rendered
        let entries = dedup_entries(schema);
        let variants: Vec<String> = entries
            .iter()
            .map(|e| self.variant_ident(&e.name))
            .collect();

        push_doc(&mut out, "", &schema.description);
        if variants.iter().any(|v| is_screaming_case(v)) {
            out.push_str("#[allow(non_camel_case_types)]\n");
        }
        if self.serde_derives {
            out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]\n");
        } else {
            out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
        }
        out.push_str("#[repr(i64)]\n");
        out.push_str(&format!("pub enum {} {{\n", item.type_name));
        for (entry, variant) in entries.iter().zip(&variants) {
            push_doc(&mut out, "    ", &entry.description);
            out.push_str(&format!("    {} = {},\n", variant, entry.value));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl {} {{\n", item.type_name));
        out.push_str("    /// Match a raw wire value against the declared entries\n");
        out.push_str("    pub fn from_value(value: i64) -> Option<Self> {\n");
        out.push_str("        match value {\n");
        for (entry, variant) in entries.iter().zip(&variants) {
            out.push_str(&format!("            {} => Some(Self::{}),\n", entry.value, variant));
        }
        out.push_str("            _ => None,\n");
        out.push_str("        }\n");
        out.push_str("    }\n\n");
        out.push_str("    /// The declared wire value of this entry\n");
        out.push_str("    pub fn value(self) -> i64 {\n");
        out.push_str("        self as i64\n");
        out.push_str("    }\n");
        out.push_str("}\n");
        out
    }

    fn variant_ident(&self, declared: &str) -> String {
        let name = if self.naming.preserve_screaming_case && is_screaming_case(declared) {
            declared.to_string()
        } else {
            non_empty(to_pascal_case(declared, self.naming), || "Entry".to_string())
        };
        escape_keyword(&name)
    }

    // -------------------------------------------------------------------------
    // Base file (mod.rs)
    // -------------------------------------------------------------------------

    pub fn render_base(&self) -> String {
        let mut out = self.header.clone();
        out.push('\n');
        if self.serde_derives {
            out.push_str("use serde::{Deserialize, Serialize};\n\n");
        }

        // Module declarations and re-exports, sorted by stem
        let mut modules: Vec<(&str, Option<&str>)> = vec![("convert", None)];
        for item in &self.names.messages {
            modules.push((&item.stem, Some(&item.type_name)));
        }
        for item in &self.names.enums {
            modules.push((&item.stem, Some(&item.type_name)));
        }
        modules.sort_by_key(|(stem, _)| *stem);

        for (stem, _) in &modules {
            out.push_str(&format!("pub mod {};\n", stem));
        }
        out.push('\n');
        for (stem, ty) in &modules {
            match ty {
                Some(ty) => out.push_str(&format!("pub use self::{}::{};\n", stem, ty)),
                None => out.push_str(&format!(
                    "pub use self::{}::{{convert, converter_for, CONVERTERS}};\n",
                    stem
                )),
            }
        }
        out.push('\n');

        out.push_str("/// Dialect the wire records come from\n");
        out.push_str(&format!("pub const SOURCE_DIALECT: &str = {:?};\n", self.source.name()));
        out.push_str("/// Dialect the converted records belong to\n");
        out.push_str(&format!("pub const TARGET_DIALECT: &str = {:?};\n\n", self.target.name()));

        self.push_source_record_trait(&mut out);
        self.push_convert_error(&mut out);
        self.push_sum_type(&mut out);
        self.push_support_helpers(&mut out);
        out
    }

    fn push_source_record_trait(&self, out: &mut String) {
        out.push_str("/// A decoded wire record, addressable by field name.\n");
        out.push_str("///\n");
        out.push_str("/// The transport layer implements this for whatever record structure\n");
        out.push_str("/// its decoder produces; converters only read through it.\n");
        out.push_str("pub trait SourceRecord {\n");
        out.push_str("    /// Numeric message id within the source dialect\n");
        out.push_str("    fn message_id(&self) -> u32;\n");
        out.push_str("    /// Identifier of the system that sent the record\n");
        out.push_str("    fn source_system(&self) -> u32;\n");
        out.push_str("    fn get_int(&self, field: &str) -> Option<i64>;\n");
        out.push_str("    fn get_uint(&self, field: &str) -> Option<u64>;\n");
        out.push_str("    fn get_float(&self, field: &str) -> Option<f64>;\n");
        out.push_str("    fn get_char(&self, field: &str) -> Option<char>;\n");
        out.push_str("    fn get_str(&self, field: &str) -> Option<&str>;\n");
        out.push_str("}\n\n");
    }

    fn push_convert_error(&self, out: &mut String) {
        out.push_str("/// Conversion failure raised by generated converters.\n");
        out.push_str("#[derive(Debug, Clone, PartialEq, Eq)]\n");
        out.push_str("pub enum ConvertError {\n");
        out.push_str("    /// The wire record is missing a field the conversion needs\n");
        out.push_str("    MissingField {\n");
        out.push_str("        message: &'static str,\n");
        out.push_str("        field: &'static str,\n");
        out.push_str("    },\n");
        out.push_str("    /// A raw value matched no declared enum entry\n");
        out.push_str("    InvalidEnumValue {\n");
        out.push_str("        message: &'static str,\n");
        out.push_str("        field: &'static str,\n");
        out.push_str("        value: i64,\n");
        out.push_str("    },\n");
        out.push_str("}\n\n");
        out.push_str("impl std::fmt::Display for ConvertError {\n");
        out.push_str("    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {\n");
        out.push_str("        match self {\n");
        out.push_str("            Self::MissingField { message, field } => {\n");
        out.push_str("                write!(f, \"{}: missing field '{}'\", message, field)\n");
        out.push_str("            }\n");
        out.push_str("            Self::InvalidEnumValue { message, field, value } => {\n");
        out.push_str(
            "                write!(f, \"{}: value {} matches no enum entry for '{}'\", message, value, field)\n",
        );
        out.push_str("            }\n");
        out.push_str("        }\n");
        out.push_str("    }\n");
        out.push_str("}\n\n");
        out.push_str("impl std::error::Error for ConvertError {}\n\n");
    }

    fn push_sum_type(&self, out: &mut String) {
        // Variants sorted by message id
        let mut order: Vec<usize> = (0..self.target.messages().len()).collect();
        order.sort_by_key(|&i| self.target.messages()[i].id);

        out.push_str(&format!(
            "/// One converted record of the {} dialect.\n",
            self.target.name()
        ));
        if self.serde_derives {
            out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
        } else {
            out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
        }
        out.push_str(&format!("pub enum {} {{\n", self.names.sum_type));
        for &i in &order {
            let ty = &self.names.messages[i].type_name;
            out.push_str(&format!("    {}({}),\n", ty, ty));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl {} {{\n", self.names.sum_type));
        if order.is_empty() {
            out.push_str("    /// Target message id of this record\n");
            out.push_str("    pub fn message_id(&self) -> u32 {\n");
            out.push_str("        match *self {}\n");
            out.push_str("    }\n\n");
            out.push_str("    /// Declared name of the target message\n");
            out.push_str("    pub fn message_name(&self) -> &'static str {\n");
            out.push_str("        match *self {}\n");
            out.push_str("    }\n\n");
            out.push_str("    /// System the originating source message came from\n");
            out.push_str("    pub fn source_system(&self) -> u32 {\n");
            out.push_str("        match *self {}\n");
            out.push_str("    }\n");
        } else {
            out.push_str("    /// Target message id of this record\n");
            out.push_str("    pub fn message_id(&self) -> u32 {\n");
            out.push_str("        match self {\n");
            for &i in &order {
                let ty = &self.names.messages[i].type_name;
                out.push_str(&format!("            Self::{}(_) => {}::ID,\n", ty, ty));
            }
            out.push_str("        }\n");
            out.push_str("    }\n\n");
            out.push_str("    /// Declared name of the target message\n");
            out.push_str("    pub fn message_name(&self) -> &'static str {\n");
            out.push_str("        match self {\n");
            for &i in &order {
                let ty = &self.names.messages[i].type_name;
                out.push_str(&format!("            Self::{}(_) => {}::NAME,\n", ty, ty));
            }
            out.push_str("        }\n");
            out.push_str("    }\n\n");
            out.push_str("    /// System the originating source message came from\n");
            out.push_str("    pub fn source_system(&self) -> u32 {\n");
            out.push_str("        match self {\n");
            for &i in &order {
                let ty = &self.names.messages[i].type_name;
                out.push_str(&format!("            Self::{}(m) => m.source_system,\n", ty));
            }
            out.push_str("        }\n");
            out.push_str("    }\n");
        }
        out.push_str("}\n\n");
    }

    fn push_support_helpers(&self, out: &mut String) {
        out.push_str("/// Microseconds since the Unix epoch\n");
        out.push_str("pub fn now_epoch_us() -> u64 {\n");
        out.push_str("    std::time::SystemTime::now()\n");
        out.push_str("        .duration_since(std::time::UNIX_EPOCH)\n");
        out.push_str("        .map(|d| d.as_micros() as u64)\n");
        out.push_str("        .unwrap_or(0)\n");
        out.push_str("}\n\n");
        out.push_str("/// Milliseconds since the Unix epoch\n");
        out.push_str("pub fn now_epoch_ms() -> u64 {\n");
        out.push_str("    now_epoch_us() / 1_000\n");
        out.push_str("}\n\n");
        out.push_str("/// Seconds since the Unix epoch\n");
        out.push_str("pub fn now_epoch_s() -> u64 {\n");
        out.push_str("    now_epoch_us() / 1_000_000\n");
        out.push_str("}\n\n");
        out.push_str("static BOOT_EPOCH_US: std::sync::OnceLock<u64> = std::sync::OnceLock::new();\n\n");
        out.push_str("/// Convert a time-since-boot timestamp to an absolute epoch timestamp.\n");
        out.push_str("/// The source system's boot instant is anchored on the first call and\n");
        out.push_str("/// reused afterwards, keeping converted timestamps monotonic.\n");
        out.push_str("pub fn boot_ms_to_epoch_us(boot_ms: u64) -> u64 {\n");
        out.push_str("    let anchor = *BOOT_EPOCH_US\n");
        out.push_str("        .get_or_init(|| now_epoch_us().saturating_sub(boot_ms.saturating_mul(1_000)));\n");
        out.push_str("    anchor.saturating_add(boot_ms.saturating_mul(1_000))\n");
        out.push_str("}\n");
    }

    // -------------------------------------------------------------------------
    // Dispatch file (convert.rs)
    // -------------------------------------------------------------------------

    pub fn render_convert(&self, units: &[ConversionUnit]) -> String {
        let mut out = self.header.clone();
        out.push('\n');
        out.push_str("use super::*;\n\n");
        out.push_str("/// Converter signature shared by every dispatch-table entry.\n");
        out.push_str(&format!(
            "pub type ConvertFn = fn(&dyn SourceRecord) -> Result<Vec<{}>, ConvertError>;\n\n",
            self.names.sum_type
        ));

        // Deterministic order regardless of mapping document order
        let mut ordered: Vec<&ConversionUnit> = units.iter().collect();
        ordered.sort_by_key(|u| (u.source_id, u.target_id));

        for &unit in &ordered {
            self.push_unit_fn(&mut out, unit);
        }

        let mut by_source: Vec<(u32, Vec<&ConversionUnit>)> = Vec::new();
        for &unit in &ordered {
            match by_source.iter_mut().find(|(id, _)| *id == unit.source_id) {
                Some((_, group)) => group.push(unit),
                None => by_source.push((unit.source_id, vec![unit])),
            }
        }

        for (source_id, group) in &by_source {
            let name = self.aggregate_fn_name(*source_id, group);
            out.push_str(&format!(
                "fn {}(record: &dyn SourceRecord) -> Result<Vec<{}>, ConvertError> {{\n",
                name, self.names.sum_type
            ));
            out.push_str("    Ok(vec![\n");
            for &unit in group {
                out.push_str(&format!("        {}(record)?,\n", self.unit_fn_name(unit)));
            }
            out.push_str("    ])\n");
            out.push_str("}\n\n");
        }

        out.push_str("/// Dispatch table, sorted by source message id.\n");
        out.push_str("pub static CONVERTERS: &[(u32, ConvertFn)] = &[\n");
        for (source_id, group) in &by_source {
            out.push_str(&format!(
                "    ({}, {}),\n",
                source_id,
                self.aggregate_fn_name(*source_id, group)
            ));
        }
        out.push_str("];\n\n");

        out.push_str("/// Look up the converter for a source message id.\n");
        out.push_str("pub fn converter_for(source_id: u32) -> Option<ConvertFn> {\n");
        out.push_str("    CONVERTERS\n");
        out.push_str("        .binary_search_by_key(&source_id, |(id, _)| *id)\n");
        out.push_str("        .ok()\n");
        out.push_str("        .map(|idx| CONVERTERS[idx].1)\n");
        out.push_str("}\n\n");
        out.push_str("/// Convert a wire record into every target message mapped from its id.\n");
        out.push_str("/// Records with no mapped converter yield an empty list.\n");
        out.push_str(&format!(
            "pub fn convert(record: &dyn SourceRecord) -> Result<Vec<{}>, ConvertError> {{\n",
            self.names.sum_type
        ));
        out.push_str("    match converter_for(record.message_id()) {\n");
        out.push_str("        Some(f) => f(record),\n");
        out.push_str("        None => Ok(Vec::new()),\n");
        out.push_str("    }\n");
        out.push_str("}\n");
        out
    }

    fn unit_fn_name(&self, unit: &ConversionUnit) -> String {
        format!(
            "{}_to_{}",
            non_empty(to_snake_case(&unit.source_name), || format!("id{}", unit.source_id)),
            non_empty(to_snake_case(&unit.target_name), || format!("id{}", unit.target_id))
        )
    }

    fn aggregate_fn_name(&self, source_id: u32, group: &[&ConversionUnit]) -> String {
        let name = group
            .first()
            .map(|u| non_empty(to_snake_case(&u.source_name), || format!("id{}", source_id)))
            .unwrap_or_else(|| format!("id{}", source_id));
        format!("convert_{}", name)
    }

    fn push_unit_fn(&self, out: &mut String, unit: &ConversionUnit) {
        let Some(target_index) = self
            .target
            .messages()
            .iter()
            .position(|m| m.id == unit.target_id)
        else {
            return;
        };
        let target_msg = &self.target.messages()[target_index];
        let target_ty = &self.names.messages[target_index].type_name;

        out.push_str(&format!(
            "/// {} (id {}) -> {} (id {})\n",
            unit.source_name, unit.source_id, unit.target_name, unit.target_id
        ));
        out.push_str(&format!(
            "pub fn {}(record: &dyn SourceRecord) -> Result<{}, ConvertError> {{\n",
            self.unit_fn_name(unit),
            self.names.sum_type
        ));

        // unit.assignments is in declaration order with array fields absent;
        // walk the declared fields and zip the two streams back together
        let mut assignments = unit.assignments.iter();
        let mut idents = Vec::with_capacity(target_msg.fields.len());
        for field in &target_msg.fields {
            let ident = self.field_ident(field);
            if field.is_array() {
                out.push_str(&format!("    let {} = {};\n", ident, zero_fill(field)));
                idents.push(ident);
                continue;
            }
            let Some(assignment) = assignments.next() else {
                continue;
            };
            match &assignment.source {
                AssignmentSource::Mapped {
                    source_field,
                    conversion,
                } => {
                    self.push_mapped(out, &ident, unit, source_field, field, conversion.as_str());
                }
                AssignmentSource::Defaulted { value } => {
                    out.push_str(&format!(
                        "    let {} = {};\n",
                        ident,
                        self.default_expr(field, value)
                    ));
                }
            }
            idents.push(ident);
        }

        out.push_str(&format!(
            "    Ok({}::{}({} {{\n",
            self.names.sum_type, target_ty, target_ty
        ));
        out.push_str("        source_system: record.source_system(),\n");
        for ident in &idents {
            out.push_str(&format!("        {},\n", ident));
        }
        out.push_str("    }))\n");
        out.push_str("}\n\n");
    }

    /// The accessor-bind-template block for one mapped assignment. The
    /// conversion template lands verbatim with `value` already cast into the
    /// target field's primitive domain.
    fn push_mapped(
        &self,
        out: &mut String,
        ident: &str,
        unit: &ConversionUnit,
        source_field: &FieldSchema,
        target_field: &FieldSchema,
        template: &str,
    ) {
        let cast = match target_field.ty {
            FieldType::String => ".to_string()".to_string(),
            FieldType::Char => String::new(),
            _ => format!(" as {}", target_field.ty.rust_type()),
        };
        out.push_str(&format!("    let {} = {{\n", ident));
        out.push_str("        let value = record\n");
        out.push_str(&format!(
            "            .{}({:?})\n",
            accessor(source_field.ty),
            source_field.name
        ));
        out.push_str("            .ok_or(ConvertError::MissingField {\n");
        out.push_str(&format!("                message: {:?},\n", unit.source_name));
        out.push_str(&format!("                field: {:?},\n", source_field.name));
        out.push_str(&format!("            }})?{};\n", cast));
        match &target_field.enum_ref {
            Some(enum_name) => {
                let enum_ty = self
                    .names
                    .enum_type(self.target, enum_name)
                    .unwrap_or("i64");
                out.push_str(&format!("        let raw = ({}) as i64;\n", template));
                out.push_str(&format!(
                    "        {}::from_value(raw).ok_or(ConvertError::InvalidEnumValue {{\n",
                    enum_ty
                ));
                out.push_str(&format!("            message: {:?},\n", unit.source_name));
                out.push_str(&format!("            field: {:?},\n", target_field.name));
                out.push_str("            value: raw,\n");
                out.push_str("        })?\n");
            }
            None => {
                out.push_str(&format!("        {}\n", template));
            }
        }
        out.push_str("    };\n");
    }

    fn default_expr(&self, field: &FieldSchema, value: &PlannedDefault) -> String {
        match value {
            PlannedDefault::EnumVariant {
                enum_name,
                entry_name,
            } => {
                let ty = self
                    .names
                    .enum_type(self.target, enum_name)
                    .unwrap_or("i64");
                format!("{}::{}", ty, self.variant_ident(entry_name))
            }
            PlannedDefault::Provider(provider) => {
                format!("{} as {}", provider.helper_call(), field.ty.rust_type())
            }
            PlannedDefault::Literal(text) => match field.ty {
                FieldType::String => format!("{:?}.to_string()", text),
                FieldType::Char => format!("{:?}", text.chars().next().unwrap_or('\0')),
                _ => format!("({}) as {}", text, field.ty.rust_type()),
            },
        }
    }
}

// =============================================================================
// Shared rendering helpers
// =============================================================================

fn accessor(ty: FieldType) -> &'static str {
    if ty.is_unsigned() {
        "get_uint"
    } else if ty.is_signed() {
        "get_int"
    } else if ty.is_float() {
        "get_float"
    } else if ty == FieldType::Char {
        "get_char"
    } else {
        "get_str"
    }
}

/// Fill expression for an unmapped array field. Enum arrays never reach
/// here: the planner rejects units whose target declares one. Spelled out
/// per length because `Default` stops at 32 elements.
fn zero_fill(field: &FieldSchema) -> String {
    let len = field.array_len.unwrap_or(0);
    match field.ty {
        FieldType::Float32 | FieldType::Float64 => format!("[0.0; {}]", len),
        FieldType::Char => format!("['\\0'; {}]", len),
        FieldType::String => "std::array::from_fn(|_| String::new())".to_string(),
        _ => format!("[0; {}]", len),
    }
}

/// First entry per discriminant value, declaration order preserved
fn dedup_entries(schema: &EnumSchema) -> Vec<&crate::dialect::EnumEntry> {
    let mut seen = HashSet::new();
    schema
        .entries
        .iter()
        .filter(|e| seen.insert(e.value))
        .collect()
}

/// Word-wrapped doc comment lines at the given indent
fn push_doc(out: &mut String, indent: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    let width = DOC_WIDTH.saturating_sub(indent.len() + 4).max(20);
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            out.push_str(&format!("{}/// {}\n", indent, line));
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        out.push_str(&format!("{}/// {}\n", indent, line));
    }
}

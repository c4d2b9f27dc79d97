//! Dialect model
//!
//! The immutable in-memory form of one protocol dialect: its messages and
//! enums, merged from a root document plus its includes, indexed by both
//! numeric id and declared name. Built once by the loader, then only read.

pub mod loader;

use std::collections::HashMap;

use serde::Serialize;

use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};

// =============================================================================
// Field types
// =============================================================================

/// Closed set of wire primitive types a field can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    String,
}

impl FieldType {
    /// Parse a declared wire type name, without any array suffix.
    /// `float`/`float32` and `double`/`float64` are accepted as aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "uint8_t" => Some(Self::UInt8),
            "uint16_t" => Some(Self::UInt16),
            "uint32_t" => Some(Self::UInt32),
            "uint64_t" => Some(Self::UInt64),
            "int8_t" => Some(Self::Int8),
            "int16_t" => Some(Self::Int16),
            "int32_t" => Some(Self::Int32),
            "int64_t" => Some(Self::Int64),
            "float" | "float32" => Some(Self::Float32),
            "double" | "float64" => Some(Self::Float64),
            "char" => Some(Self::Char),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Canonical wire spelling
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8_t",
            Self::UInt16 => "uint16_t",
            Self::UInt32 => "uint32_t",
            Self::UInt64 => "uint64_t",
            Self::Int8 => "int8_t",
            Self::Int16 => "int16_t",
            Self::Int32 => "int32_t",
            Self::Int64 => "int64_t",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Char => "char",
            Self::String => "string",
        }
    }

    /// The Rust type generated records use for this primitive
    pub fn rust_type(&self) -> &'static str {
        match self {
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Char => "char",
            Self::String => "String",
        }
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_unsigned() || self.is_signed()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }
}

// =============================================================================
// Schema entities
// =============================================================================

/// One declared field of a message
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub ty: FieldType,
    /// Fixed array length for `type[N]` declarations
    pub array_len: Option<usize>,
    /// Unit label, e.g. "degE7" or "m/s"
    pub units: Option<String>,
    /// Name of an enum in the same dialect this field's values come from
    pub enum_ref: Option<String>,
    /// Declared after the message's extension marker
    pub extension: bool,
    pub description: String,
}

impl FieldSchema {
    pub fn is_array(&self) -> bool {
        self.array_len.is_some()
    }
}

/// One named value of an enum
#[derive(Debug, Clone, Serialize)]
pub struct EnumEntry {
    pub name: String,
    pub value: i64,
    pub description: String,
}

/// A declared enum: named integer values, not necessarily contiguous
#[derive(Debug, Clone, Serialize)]
pub struct EnumSchema {
    pub name: String,
    pub description: String,
    pub entries: Vec<EnumEntry>,
}

impl EnumSchema {
    pub fn entry_by_value(&self, value: i64) -> Option<&EnumEntry> {
        self.entries.iter().find(|e| e.value == value)
    }

    pub fn entry_by_name(&self, name: &str) -> Option<&EnumEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// A declared message: core fields in declaration order, extension fields after
#[derive(Debug, Clone, Serialize)]
pub struct MessageSchema {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl MessageSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names, for suggestion lookups
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

// =============================================================================
// Dialect model
// =============================================================================

/// The merged, immutable message set of one dialect
#[derive(Debug, Clone, Serialize)]
pub struct DialectModel {
    name: String,
    version: Option<String>,
    messages: Vec<MessageSchema>,
    enums: Vec<EnumSchema>,
    #[serde(skip)]
    message_by_id: HashMap<u32, usize>,
    #[serde(skip)]
    message_by_name: HashMap<String, usize>,
    #[serde(skip)]
    enum_by_name: HashMap<String, usize>,
}

impl DialectModel {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            messages: Vec::new(),
            enums: Vec::new(),
            message_by_id: HashMap::new(),
            message_by_name: HashMap::new(),
            enum_by_name: HashMap::new(),
        }
    }

    /// Dialect display name (the root document's file stem)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared document version, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub(crate) fn set_version(&mut self, version: Option<String>) {
        // First seen wins, like every other merged definition
        if self.version.is_none() {
            self.version = version;
        }
    }

    /// Add a message unless its id or name is already taken.
    /// Returns false when the duplicate was skipped.
    pub(crate) fn push_message(&mut self, message: MessageSchema) -> bool {
        if self.message_by_id.contains_key(&message.id)
            || self.message_by_name.contains_key(&message.name)
        {
            return false;
        }
        let idx = self.messages.len();
        self.message_by_id.insert(message.id, idx);
        self.message_by_name.insert(message.name.clone(), idx);
        self.messages.push(message);
        true
    }

    /// Add an enum unless its name is already taken.
    /// Returns false when the duplicate was skipped.
    pub(crate) fn push_enum(&mut self, decl: EnumSchema) -> bool {
        if self.enum_by_name.contains_key(&decl.name) {
            return false;
        }
        let idx = self.enums.len();
        self.enum_by_name.insert(decl.name.clone(), idx);
        self.enums.push(decl);
        true
    }

    pub fn message_by_id(&self, id: u32) -> Option<&MessageSchema> {
        self.message_by_id.get(&id).map(|&i| &self.messages[i])
    }

    pub fn message_by_name(&self, name: &str) -> Option<&MessageSchema> {
        self.message_by_name.get(name).map(|&i| &self.messages[i])
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumSchema> {
        self.enum_by_name.get(name).map(|&i| &self.enums[i])
    }

    /// Messages in merge order (root document first, includes after)
    pub fn messages(&self) -> &[MessageSchema] {
        &self.messages
    }

    /// Enums in merge order
    pub fn enums(&self) -> &[EnumSchema] {
        &self.enums
    }

    /// Message names, for suggestion lookups
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.name.as_str())
    }

    /// Check that every field-level enum reference names an enum that made it
    /// into the merged model. One diagnostic per offending field.
    pub fn check_enum_refs(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for message in &self.messages {
            for field in &message.fields {
                if let Some(enum_name) = &field.enum_ref {
                    if !self.enum_by_name.contains_key(enum_name) {
                        diags.push(
                            DiagnosticItem::new(
                                self.name.clone(),
                                DiagnosticCode::UnresolvedEnum,
                                format!(
                                    "field '{}.{}' references unknown enum '{}'",
                                    message.name, field.name, enum_name
                                ),
                            )
                            .with_context(format!("message id {}", message.id)),
                        );
                    }
                }
            }
        }
        diags
    }
}

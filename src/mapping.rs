//! Mapping document resolution
//!
//! Parses the conversion mapping document and resolves every referenced
//! message id against the two dialect models, grouping field mappings and
//! defaults into per-(source, target) buckets. Field-level resolution is
//! the planner's job; this stage only guarantees that both messages of each
//! bucket exist. Every unresolved id in the document is collected before the
//! stage fails, so one run reports them all.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::dialect::DialectModel;
use crate::diagnostics::{closest_match, DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::error::{Error, Result};

// =============================================================================
// Conversion templates and defaults
// =============================================================================

/// A conversion expression template: opaque text containing the placeholder
/// token exactly once at an identifier boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTemplate(String);

impl ConversionTemplate {
    /// The token standing for "the resolved source value"
    pub const PLACEHOLDER: &'static str = "value";

    /// Accepts a template with exactly one placeholder occurrence
    pub fn parse(raw: &str) -> Option<Self> {
        if placeholder_count(raw) == 1 {
            Some(Self(raw.trim().to_string()))
        } else {
            None
        }
    }

    /// The identity template used when no conversion attribute is given
    pub fn identity() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Self::PLACEHOLDER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn placeholder_count(raw: &str) -> usize {
    let token = ConversionTemplate::PLACEHOLDER;
    let bytes = raw.as_bytes();
    let mut count = 0;
    let mut offset = 0;
    while let Some(pos) = raw[offset..].find(token) {
        let start = offset + pos;
        let end = start + token.len();
        let bounded_left = start == 0 || !is_ident_byte(bytes[start - 1]);
        let bounded_right = end == raw.len() || !is_ident_byte(bytes[end]);
        if bounded_left && bounded_right {
            count += 1;
        }
        offset = end;
    }
    count
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Named default-value providers a `default_value` may reference with an
/// `@` key instead of a literal. The table is closed: each key maps onto a
/// helper emitted into every generated bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Wall-clock microseconds since the Unix epoch
    NowEpochUs,
    /// Wall-clock milliseconds since the Unix epoch
    NowEpochMs,
    /// Wall-clock seconds since the Unix epoch
    NowEpochS,
}

impl ProviderKind {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "@now_us" => Some(Self::NowEpochUs),
            "@now_ms" => Some(Self::NowEpochMs),
            "@now_s" => Some(Self::NowEpochS),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::NowEpochUs => "@now_us",
            Self::NowEpochMs => "@now_ms",
            Self::NowEpochS => "@now_s",
        }
    }

    /// The call rendered into generated converter bodies
    pub fn helper_call(&self) -> &'static str {
        match self {
            Self::NowEpochUs => "now_epoch_us()",
            Self::NowEpochMs => "now_epoch_ms()",
            Self::NowEpochS => "now_epoch_s()",
        }
    }

    pub const ALL: [ProviderKind; 3] = [Self::NowEpochUs, Self::NowEpochMs, Self::NowEpochS];
}

/// What a `default_value` entry assigns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultExpr {
    /// Literal text, preserved verbatim
    Literal(String),
    /// Symbolic key resolved through the provider table
    Provider(ProviderKind),
}

// =============================================================================
// Resolved mapping entries
// =============================================================================

/// One field mapping, message ids already resolved
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub source_message_id: u32,
    pub source_field: String,
    pub target_message_id: u32,
    pub target_field: String,
    pub conversion: ConversionTemplate,
    /// Document position, for diagnostics
    pub location: String,
}

/// One literal or provider default, message id already resolved
#[derive(Debug, Clone)]
pub struct FieldDefault {
    pub target_message_id: u32,
    pub target_field: String,
    pub value: DefaultExpr,
    /// Document position, for diagnostics
    pub location: String,
}

/// All entries for one (source message, target message) pair, in document
/// order
#[derive(Debug, Clone)]
pub struct MappingBucket {
    pub source_id: u32,
    pub target_id: u32,
    pub mappings: Vec<FieldMapping>,
    pub defaults: Vec<FieldDefault>,
}

/// The resolved mapping document: buckets in first-reference document order
/// plus any non-fatal diagnostics (name mismatches) the caller should report.
#[derive(Debug)]
pub struct MappingSet {
    file: PathBuf,
    buckets: Vec<MappingBucket>,
    warnings: Diagnostics,
}

impl MappingSet {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn buckets(&self) -> &[MappingBucket] {
        &self.buckets
    }

    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Diagnostics {
        std::mem::take(&mut self.warnings)
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Parse the mapping document at `path` and resolve its message ids against
/// the source and target models.
pub fn resolve(path: &Path, source: &DialectModel, target: &DialectModel) -> Result<MappingSet> {
    let text = fs::read_to_string(path).map_err(|e| Error::Parse {
        file: path.to_path_buf(),
        location: "-".to_string(),
        reason: format!("cannot read document: {}", e),
    })?;

    let doc = Document::parse(&text).map_err(|e| {
        let pos = e.pos();
        Error::Parse {
            file: path.to_path_buf(),
            location: format!("line {}:{}", pos.row, pos.col),
            reason: e.to_string(),
        }
    })?;

    let root = doc.root_element();
    let conversions = if root.has_tag_name("conversions") {
        root
    } else {
        root.children()
            .filter(Node::is_element)
            .find(|n| n.has_tag_name("conversions"))
            .ok_or_else(|| Error::Parse {
                file: path.to_path_buf(),
                location: "-".to_string(),
                reason: "missing <conversions> element".to_string(),
            })?
    };

    let mut diags = Diagnostics::new();
    let mut buckets: Vec<MappingBucket> = Vec::new();
    let origin = path.display().to_string();

    for message in conversions
        .children()
        .filter(|n| n.has_tag_name("message"))
    {
        let source_id_raw = require_attr(path, &doc, message, "source_id")?;
        let source_id: u32 = source_id_raw.parse().map_err(|_| {
            parse_error(
                path,
                &doc,
                message,
                format!("invalid source_id '{}'", source_id_raw),
            )
        })?;

        let declared_name = message.attribute("source_name");
        let source_message = source.message_by_id(source_id);

        match source_message {
            None => {
                let mut item = DiagnosticItem::new(
                    origin.clone(),
                    DiagnosticCode::UnresolvedMessageId,
                    format!(
                        "source message id {} not found in dialect '{}'",
                        source_id,
                        source.name()
                    ),
                )
                .with_context(location_of(&doc, message));
                if let Some(name) = declared_name {
                    if let Some(by_name) = source.message_by_name(name) {
                        item = item.with_context(format!(
                            "message '{}' exists with id {}",
                            name, by_name.id
                        ));
                    } else if let Some(near) = closest_match(name, source.message_names()) {
                        item = item.with_context(format!("did you mean '{}'?", near));
                    }
                }
                diags.push(item);
            }
            Some(resolved) => {
                if let Some(name) = declared_name {
                    if name != resolved.name {
                        diags.warning(
                            origin.clone(),
                            DiagnosticCode::NameMismatch,
                            format!(
                                "source_name '{}' does not match message id {} ('{}')",
                                name, source_id, resolved.name
                            ),
                        );
                    }
                }
            }
        }

        for entry in message.children().filter(Node::is_element) {
            match entry.tag_name().name() {
                "mapping" => {
                    let source_field = require_attr(path, &doc, entry, "source_field")?.to_string();
                    let target_field = require_attr(path, &doc, entry, "target_field")?.to_string();
                    let target_id = parse_target_id(path, &doc, entry)?;
                    let conversion = match entry.attribute("conversion") {
                        Some(raw) => ConversionTemplate::parse(raw).ok_or_else(|| {
                            parse_error(
                                path,
                                &doc,
                                entry,
                                format!(
                                    "conversion template '{}' must contain the placeholder '{}' exactly once",
                                    raw,
                                    ConversionTemplate::PLACEHOLDER
                                ),
                            )
                        })?,
                        None => ConversionTemplate::identity(),
                    };

                    let target_ok = check_target(&mut diags, &origin, &doc, entry, target, target_id);
                    if source_message.is_some() && target_ok {
                        bucket_for(&mut buckets, source_id, target_id)
                            .mappings
                            .push(FieldMapping {
                                source_message_id: source_id,
                                source_field,
                                target_message_id: target_id,
                                target_field,
                                conversion,
                                location: location_of(&doc, entry),
                            });
                    }
                }
                "default_value" => {
                    let target_field = require_attr(path, &doc, entry, "target_field")?.to_string();
                    let target_id = parse_target_id(path, &doc, entry)?;
                    let raw_value = require_attr(path, &doc, entry, "value")?;

                    let value = if let Some(key) = raw_value.strip_prefix('@') {
                        match ProviderKind::from_key(raw_value) {
                            Some(provider) => DefaultExpr::Provider(provider),
                            None => {
                                let known = ProviderKind::ALL
                                    .iter()
                                    .map(|p| p.key())
                                    .collect::<Vec<_>>()
                                    .join(", ");
                                diags.push(
                                    DiagnosticItem::new(
                                        origin.clone(),
                                        DiagnosticCode::UnresolvedProvider,
                                        format!("unknown default provider '@{}'", key),
                                    )
                                    .with_context(location_of(&doc, entry))
                                    .with_context(format!("known providers: {}", known)),
                                );
                                continue;
                            }
                        }
                    } else {
                        DefaultExpr::Literal(raw_value.to_string())
                    };

                    let target_ok = check_target(&mut diags, &origin, &doc, entry, target, target_id);
                    if source_message.is_some() && target_ok {
                        bucket_for(&mut buckets, source_id, target_id)
                            .defaults
                            .push(FieldDefault {
                                target_message_id: target_id,
                                target_field,
                                value,
                                location: location_of(&doc, entry),
                            });
                    }
                }
                _ => {}
            }
        }
    }

    if diags.has_errors() {
        return Err(Error::Semantic(diags));
    }

    Ok(MappingSet {
        file: path.to_path_buf(),
        buckets,
        warnings: diags,
    })
}

/// Resolve the target id, recording a diagnostic when it is unknown.
/// Returns whether the id resolved.
fn check_target(
    diags: &mut Diagnostics,
    origin: &str,
    doc: &Document,
    entry: Node,
    target: &DialectModel,
    target_id: u32,
) -> bool {
    if target.message_by_id(target_id).is_some() {
        return true;
    }
    diags.push(
        DiagnosticItem::new(
            origin.to_string(),
            DiagnosticCode::UnresolvedMessageId,
            format!(
                "target message id {} not found in dialect '{}'",
                target_id,
                target.name()
            ),
        )
        .with_context(location_of(doc, entry)),
    );
    false
}

fn parse_target_id(path: &Path, doc: &Document, entry: Node) -> Result<u32> {
    let raw = require_attr(path, doc, entry, "target_id")?;
    raw.parse()
        .map_err(|_| parse_error(path, doc, entry, format!("invalid target_id '{}'", raw)))
}

fn bucket_for(buckets: &mut Vec<MappingBucket>, source_id: u32, target_id: u32) -> &mut MappingBucket {
    if let Some(idx) = buckets
        .iter()
        .position(|b| b.source_id == source_id && b.target_id == target_id)
    {
        return &mut buckets[idx];
    }
    buckets.push(MappingBucket {
        source_id,
        target_id,
        mappings: Vec::new(),
        defaults: Vec::new(),
    });
    buckets.last_mut().unwrap()
}

fn location_of(doc: &Document, node: Node) -> String {
    let pos = doc.text_pos_at(node.range().start);
    format!("line {}:{}", pos.row, pos.col)
}

fn require_attr<'a>(file: &Path, doc: &Document, node: Node<'a, '_>, attr: &str) -> Result<&'a str> {
    node.attribute(attr).ok_or_else(|| {
        parse_error(
            file,
            doc,
            node,
            format!(
                "<{}> missing required attribute '{}'",
                node.tag_name().name(),
                attr
            ),
        )
    })
}

fn parse_error(file: &Path, doc: &Document, node: Node, reason: impl Into<String>) -> Error {
    let pos = doc.text_pos_at(node.range().start);
    Error::Parse {
        file: file.to_path_buf(),
        location: format!("line {}:{}", pos.row, pos.col),
        reason: reason.into(),
    }
}

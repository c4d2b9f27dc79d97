//! Dialect document loading
//!
//! Parses dialect XML into a [`DialectModel`], following `include` elements
//! recursively. The merge is a pure fold: each document's definitions are
//! added to a model passed by value, root document first, then includes in
//! document order, so the first-seen definition always wins. The set of
//! documents visited on the current include branch travels with the
//! recursion to reject cycles; a hard depth bound backs it up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node};
use tracing::debug;

use crate::dialect::{DialectModel, EnumEntry, EnumSchema, FieldSchema, FieldType, MessageSchema};
use crate::error::{Error, Result};

/// Upper bound on documents along one include branch
pub const MAX_INCLUDE_DEPTH: usize = 500;

/// Load a dialect from its root document. The dialect's display name is the
/// root document's file stem.
pub fn load(root: &Path) -> Result<DialectModel> {
    let name = root
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dialect".to_string());

    let model = merge_document(root, Vec::new(), DialectModel::new(name))?;
    debug!(
        dialect = model.name(),
        messages = model.messages().len(),
        enums = model.enums().len(),
        "dialect loaded"
    );

    let diags = model.check_enum_refs();
    if diags.has_errors() {
        return Err(Error::Semantic(diags));
    }
    Ok(model)
}

/// Merge one document (and, recursively, its includes) into `model`.
///
/// `visited` is the chain of canonical paths already open on this branch;
/// sibling includes get their own copy, so diamond-shaped include graphs are
/// fine and only true cycles are rejected.
fn merge_document(path: &Path, visited: Vec<PathBuf>, mut model: DialectModel) -> Result<DialectModel> {
    let canonical = fs::canonicalize(path).map_err(|e| Error::Parse {
        file: path.to_path_buf(),
        location: "-".to_string(),
        reason: format!("cannot open document: {}", e),
    })?;

    if visited.contains(&canonical) {
        let chain = visited
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(Error::IncludeCycle {
            file: canonical,
            chain,
        });
    }
    if visited.len() >= MAX_INCLUDE_DEPTH {
        return Err(Error::IncludeDepth {
            file: canonical,
            limit: MAX_INCLUDE_DEPTH,
        });
    }

    let text = fs::read_to_string(&canonical).map_err(|e| Error::Parse {
        file: canonical.clone(),
        location: "-".to_string(),
        reason: format!("cannot read document: {}", e),
    })?;

    let doc = Document::parse(&text).map_err(|e| {
        let pos = e.pos();
        Error::Parse {
            file: canonical.clone(),
            location: format!("line {}:{}", pos.row, pos.col),
            reason: e.to_string(),
        }
    })?;

    debug!(file = %canonical.display(), depth = visited.len(), "merging dialect document");

    let root = doc.root_element();
    let mut includes = Vec::new();

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "version" => model.set_version(child.text().map(|t| t.trim().to_string())),
            "include" => {
                let target = child.text().map(str::trim).unwrap_or_default();
                if target.is_empty() {
                    return Err(parse_error(&canonical, &doc, child, "empty <include> element"));
                }
                includes.push(resolve_include(&canonical, target));
            }
            "enums" => {
                for decl in child.children().filter(|n| n.has_tag_name("enum")) {
                    let parsed = parse_enum(&canonical, &doc, decl)?;
                    // Duplicate across includes: first seen wins, silently
                    model.push_enum(parsed);
                }
            }
            "messages" => {
                for decl in child.children().filter(|n| n.has_tag_name("message")) {
                    let parsed = parse_message(&canonical, &doc, decl)?;
                    model.push_message(parsed);
                }
            }
            _ => {}
        }
    }

    let mut branch = visited;
    branch.push(canonical);
    for include in includes {
        model = merge_document(&include, branch.clone(), model)?;
    }

    Ok(model)
}

/// Include paths are relative to the including document's directory
fn resolve_include(including: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        including
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(target)
    }
}

fn parse_message(file: &Path, doc: &Document, node: Node) -> Result<MessageSchema> {
    let id_raw = require_attr(file, doc, node, "id")?;
    let id: u32 = id_raw.parse().map_err(|_| {
        parse_error(file, doc, node, format!("invalid message id '{}'", id_raw))
    })?;
    let name = require_attr(file, doc, node, "name")?.to_string();

    let mut description = String::new();
    let mut fields: Vec<FieldSchema> = Vec::new();
    let mut in_extensions = false;

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "description" => description = normalize_text(child.text().unwrap_or_default()),
            "extensions" => in_extensions = true,
            "field" => {
                let field = parse_field(file, doc, child, &name, in_extensions)?;
                if fields.iter().any(|f| f.name == field.name) {
                    return Err(parse_error(
                        file,
                        doc,
                        child,
                        format!("duplicate field '{}' in message '{}'", field.name, name),
                    ));
                }
                fields.push(field);
            }
            _ => {}
        }
    }

    Ok(MessageSchema {
        id,
        name,
        description,
        fields,
    })
}

fn parse_field(
    file: &Path,
    doc: &Document,
    node: Node,
    message: &str,
    extension: bool,
) -> Result<FieldSchema> {
    let raw_type = require_attr(file, doc, node, "type")?;
    let name = require_attr(file, doc, node, "name")?.to_string();

    let (ty, array_len) = parse_field_type(raw_type).ok_or_else(|| {
        parse_error(
            file,
            doc,
            node,
            format!(
                "unknown type '{}' for field '{}' in message '{}'",
                raw_type, name, message
            ),
        )
    })?;

    Ok(FieldSchema {
        name,
        ty,
        array_len,
        units: node.attribute("units").map(str::to_string),
        enum_ref: node.attribute("enum").map(str::to_string),
        extension,
        description: normalize_text(node.text().unwrap_or_default()),
    })
}

fn parse_enum(file: &Path, doc: &Document, node: Node) -> Result<EnumSchema> {
    let name = require_attr(file, doc, node, "name")?.to_string();
    let mut description = String::new();
    let mut entries: Vec<EnumEntry> = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "description" => description = normalize_text(child.text().unwrap_or_default()),
            "entry" => {
                let entry_name = require_attr(file, doc, child, "name")?.to_string();
                let value_raw = require_attr(file, doc, child, "value")?;
                let value: i64 = value_raw.parse().map_err(|_| {
                    parse_error(
                        file,
                        doc,
                        child,
                        format!(
                            "invalid value '{}' for entry '{}' in enum '{}'",
                            value_raw, entry_name, name
                        ),
                    )
                })?;
                if entries.iter().any(|e| e.name == entry_name) {
                    return Err(parse_error(
                        file,
                        doc,
                        child,
                        format!("duplicate entry name '{}' in enum '{}'", entry_name, name),
                    ));
                }
                let entry_description = child
                    .children()
                    .find(|n| n.has_tag_name("description"))
                    .and_then(|n| n.text())
                    .map(normalize_text)
                    .unwrap_or_default();
                entries.push(EnumEntry {
                    name: entry_name,
                    value,
                    description: entry_description,
                });
            }
            _ => {}
        }
    }

    Ok(EnumSchema {
        name,
        description,
        entries,
    })
}

/// Split an optional `[N]` array suffix off a declared type.
/// Returns None for unknown base types and non-positive or junk lengths.
fn parse_field_type(raw: &str) -> Option<(FieldType, Option<usize>)> {
    match raw.find('[') {
        Some(open) => {
            if !raw.ends_with(']') {
                return None;
            }
            let base = FieldType::parse(&raw[..open])?;
            let len: usize = raw[open + 1..raw.len() - 1].parse().ok()?;
            if len == 0 {
                return None;
            }
            Some((base, Some(len)))
        }
        None => FieldType::parse(raw).map(|ty| (ty, None)),
    }
}

/// Collapse whitespace runs so multi-line XML descriptions become one line
fn normalize_text(text: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    ws.replace_all(text.trim(), " ").into_owned()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const BASIC: &str = r#"
<dialect>
  <version>3</version>
  <enums>
    <enum name="VEHICLE_KIND">
      <description>Kind of
         vehicle.</description>
      <entry value="0" name="VEHICLE_KIND_ROTORCRAFT">
        <description>Any rotary wing.</description>
      </entry>
      <entry value="4" name="VEHICLE_KIND_FIXED_WING"/>
    </enum>
  </enums>
  <messages>
    <message id="33" name="GLOBAL_POSITION_INT">
      <description>Filtered position.</description>
      <field type="uint32_t" name="time_boot_ms" units="ms">Time since boot.</field>
      <field type="int32_t" name="lat" units="degE7">Latitude.</field>
      <field type="uint8_t" name="kind" enum="VEHICLE_KIND">Vehicle kind.</field>
      <extensions/>
      <field type="uint8_t[8]" name="tag">Opaque tag.</field>
    </message>
  </messages>
</dialect>
"#;

    #[test]
    fn test_parses_messages_enums_and_version() {
        let dir = TempDir::new().unwrap();
        let root = write_doc(&dir, "basic.xml", BASIC);

        let model = load(&root).unwrap();
        assert_eq!(model.name(), "basic");
        assert_eq!(model.version(), Some("3"));

        let msg = model.message_by_id(33).unwrap();
        assert_eq!(msg.name, "GLOBAL_POSITION_INT");
        assert_eq!(msg.fields.len(), 4);
        assert_eq!(msg.fields[1].units.as_deref(), Some("degE7"));
        assert_eq!(msg.fields[2].enum_ref.as_deref(), Some("VEHICLE_KIND"));

        let decl = model.enum_by_name("VEHICLE_KIND").unwrap();
        assert_eq!(decl.entries.len(), 2);
        assert_eq!(decl.description, "Kind of vehicle.");
    }

    #[test]
    fn test_array_type_resolves_base_and_length() {
        let dir = TempDir::new().unwrap();
        let root = write_doc(&dir, "basic.xml", BASIC);

        let model = load(&root).unwrap();
        let tag = model.message_by_id(33).unwrap().field("tag").unwrap();
        assert_eq!(tag.ty, FieldType::UInt8);
        assert_eq!(tag.array_len, Some(8));
        assert!(tag.extension);
    }

    #[test]
    fn test_extension_marker_splits_fields() {
        let dir = TempDir::new().unwrap();
        let root = write_doc(&dir, "basic.xml", BASIC);

        let model = load(&root).unwrap();
        let msg = model.message_by_id(33).unwrap();
        assert!(!msg.fields[0].extension);
        assert!(msg.fields[3].extension);
    }

    #[test]
    fn test_include_merge_first_seen_wins() {
        let dir = TempDir::new().unwrap();
        write_doc(
            &dir,
            "base.xml",
            r#"<dialect>
  <messages>
    <message id="0" name="HEARTBEAT">
      <field type="uint8_t" name="status">Status byte from base.</field>
      <field type="uint8_t" name="extra">Only in base.</field>
    </message>
    <message id="5" name="PING">
      <field type="uint32_t" name="seq">Sequence.</field>
    </message>
  </messages>
</dialect>"#,
        );
        let root = write_doc(
            &dir,
            "root.xml",
            r#"<dialect>
  <include>base.xml</include>
  <messages>
    <message id="0" name="HEARTBEAT">
      <field type="uint8_t" name="status">Status byte from root.</field>
    </message>
  </messages>
</dialect>"#,
        );

        let model = load(&root).unwrap();
        // Root's HEARTBEAT wins; base's duplicate is skipped silently
        let heartbeat = model.message_by_id(0).unwrap();
        assert_eq!(heartbeat.fields.len(), 1);
        assert_eq!(heartbeat.fields[0].description, "Status byte from root.");
        // Non-conflicting include content is merged
        assert!(model.message_by_id(5).is_some());
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_doc(
            &dir,
            "a.xml",
            r#"<dialect><include>b.xml</include></dialect>"#,
        );
        let root = write_doc(
            &dir,
            "b.xml",
            r#"<dialect><include>a.xml</include></dialect>"#,
        );

        match load(&root) {
            Err(Error::IncludeCycle { file, .. }) => {
                assert!(file.ends_with("b.xml"));
            }
            other => panic!("Expected IncludeCycle, got {:?}", other.map(|m| m.name().to_string())),
        }
    }

    #[test]
    fn test_diamond_include_is_fine() {
        let dir = TempDir::new().unwrap();
        write_doc(
            &dir,
            "shared.xml",
            r#"<dialect>
  <messages>
    <message id="9" name="SHARED">
      <field type="uint8_t" name="x">X.</field>
    </message>
  </messages>
</dialect>"#,
        );
        write_doc(
            &dir,
            "left.xml",
            r#"<dialect><include>shared.xml</include></dialect>"#,
        );
        write_doc(
            &dir,
            "right.xml",
            r#"<dialect><include>shared.xml</include></dialect>"#,
        );
        let root = write_doc(
            &dir,
            "top.xml",
            r#"<dialect>
  <include>left.xml</include>
  <include>right.xml</include>
</dialect>"#,
        );

        let model = load(&root).unwrap();
        assert_eq!(model.messages().len(), 1);
        assert!(model.message_by_id(9).is_some());
    }

    #[test]
    fn test_missing_attribute_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let root = write_doc(
            &dir,
            "bad.xml",
            r#"<dialect>
  <messages>
    <message id="1">
      <field type="uint8_t" name="x">X.</field>
    </message>
  </messages>
</dialect>"#,
        );

        match load(&root) {
            Err(Error::Parse { reason, .. }) => {
                assert!(reason.contains("'name'"), "unexpected reason: {}", reason);
            }
            other => panic!(
                "Expected Parse error, got {:?}",
                other.map(|m| m.name().to_string())
            ),
        }
    }

    #[test]
    fn test_bad_array_length_is_parse_error() {
        assert!(parse_field_type("uint8_t[8]").is_some());
        assert!(parse_field_type("uint8_t[0]").is_none());
        assert!(parse_field_type("uint8_t[x]").is_none());
        assert!(parse_field_type("uint8_t[8").is_none());
        assert!(parse_field_type("uint9_t").is_none());

        let dir = TempDir::new().unwrap();
        let root = write_doc(
            &dir,
            "bad.xml",
            r#"<dialect>
  <messages>
    <message id="1" name="M">
      <field type="uint8_t[zero]" name="x">X.</field>
    </message>
  </messages>
</dialect>"#,
        );
        assert!(matches!(load(&root), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_unresolved_enum_ref_fails_after_merge() {
        let dir = TempDir::new().unwrap();
        let root = write_doc(
            &dir,
            "bad_ref.xml",
            r#"<dialect>
  <messages>
    <message id="1" name="M">
      <field type="uint8_t" name="kind" enum="NOT_DECLARED">Kind.</field>
    </message>
  </messages>
</dialect>"#,
        );

        match load(&root) {
            Err(Error::Semantic(diags)) => {
                assert!(diags.format_all().contains("NOT_DECLARED"));
            }
            other => panic!(
                "Expected Semantic error, got {:?}",
                other.map(|m| m.name().to_string())
            ),
        }
    }

    #[test]
    fn test_description_whitespace_is_normalized() {
        assert_eq!(normalize_text("  a\n   b\t c "), "a b c");
        assert_eq!(normalize_text(""), "");
    }
}

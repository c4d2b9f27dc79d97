//! Pipeline Tests
//!
//! End-to-end runs over the XML fixtures: load both dialects, resolve the
//! mapping document, plan the conversion units and generate the artifact
//! bundle, asserting on the planned structure and the emitted text.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use bridgegen::codegen::{self, EmitOptions, GeneratedBundle};
use bridgegen::dialect::{loader, DialectModel, FieldType};
use bridgegen::error::Error;
use bridgegen::mapping;
use bridgegen::plan::{self, AssignmentSource, ConversionPlan, PlanOptions, PlannedDefault};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_pair() -> (DialectModel, DialectModel) {
    let source = loader::load(&fixture("common.xml")).unwrap();
    let target = loader::load(&fixture("hellenic.xml")).unwrap();
    (source, target)
}

fn planned(mapping_file: &str) -> (DialectModel, DialectModel, ConversionPlan) {
    let (source, target) = load_pair();
    let set = mapping::resolve(&fixture(mapping_file), &source, &target).unwrap();
    let plan = plan::plan(&set, &source, &target, PlanOptions::default());
    (source, target, plan)
}

fn bundle() -> GeneratedBundle {
    let (source, target, plan) = planned("mapping_ok.xml");
    assert!(!plan.has_errors(), "{}", plan.diagnostics.format_all());
    codegen::generate(&source, &target, &plan.units, &EmitOptions::default())
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_include_merge_first_seen_wins() {
    let (source, _) = load_pair();
    assert_eq!(source.name(), "common");
    assert_eq!(source.version(), Some("3"));

    // The root's GLOBAL_POSITION_INT wins over the include's redeclaration
    let gpi = source.message_by_id(33).unwrap();
    assert_eq!(gpi.name, "GLOBAL_POSITION_INT");
    assert_eq!(gpi.fields.len(), 6);
    assert!(gpi.field("should_not_exist").is_none());

    // Non-conflicting include content is merged in
    let attitude = source.message_by_id(30).unwrap();
    assert_eq!(attitude.name, "ATTITUDE");
    assert_eq!(attitude.fields.len(), 5);
}

#[test]
fn test_array_field_resolves_base_type_and_length() {
    let (source, _) = load_pair();
    let tag = source.message_by_id(33).unwrap().field("tag").unwrap();
    assert_eq!(tag.ty, FieldType::UInt8);
    assert_eq!(tag.array_len, Some(8));
    assert!(tag.extension);
}

#[test]
fn test_include_cycle_is_rejected() {
    match loader::load(&fixture("cycle_a.xml")) {
        Err(Error::IncludeCycle { file, chain }) => {
            assert!(file.ends_with("cycle_a.xml"));
            assert!(chain.contains("cycle_a.xml"));
            assert!(chain.contains("cycle_b.xml"));
        }
        other => panic!("Expected IncludeCycle, got {:?}", other.map(|m| m.name().to_string())),
    }
}

// =============================================================================
// Planning
// =============================================================================

#[test]
fn test_position_unit_resolves_three_assignments_in_declared_order() {
    let (_, target, plan) = planned("mapping_ok.xml");
    assert!(!plan.has_errors(), "{}", plan.diagnostics.format_all());

    let unit = plan
        .units
        .iter()
        .find(|u| u.source_id == 33 && u.target_id == 0)
        .unwrap();
    assert_eq!(unit.source_name, "GLOBAL_POSITION_INT");
    assert_eq!(unit.target_name, "LATITUDE_LONGITUDE");
    assert_eq!(unit.assignments.len(), 3);

    // Mapping document order was lat, time_usec, reference_frame; emission
    // order is the target message's declaration order
    let order: Vec<&str> = unit
        .assignments
        .iter()
        .map(|a| a.target_field.name.as_str())
        .collect();
    assert_eq!(order, vec!["time_usec", "lat", "reference_frame"]);

    let frame = &unit.assignments[2];
    match &frame.source {
        AssignmentSource::Defaulted { value } => {
            assert_eq!(*value, PlannedDefault::Literal("2".to_string()));
        }
        other => panic!("Expected Defaulted, got {:?}", other),
    }

    // Completeness: the assigned set is exactly the declared non-array set
    let declared = target.message_by_id(0).unwrap();
    let declared_names: Vec<&str> = declared
        .fields
        .iter()
        .filter(|f| !f.is_array())
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(order, declared_names);
}

#[test]
fn test_every_unit_covers_its_target_field_set() {
    let (_, target, plan) = planned("mapping_ok.xml");
    assert_eq!(plan.units.len(), 2);

    for unit in &plan.units {
        let declared = target.message_by_id(unit.target_id).unwrap();
        let expected: Vec<&str> = declared
            .fields
            .iter()
            .filter(|f| !f.is_array())
            .map(|f| f.name.as_str())
            .collect();
        let assigned: Vec<&str> = unit
            .assignments
            .iter()
            .map(|a| a.target_field.name.as_str())
            .collect();
        assert_eq!(assigned, expected, "unit {} -> {}", unit.source_id, unit.target_id);
    }
}

#[test]
fn test_incomplete_mapping_names_the_missing_field() {
    let (_, _, plan) = planned("mapping_incomplete.xml");
    assert!(plan.has_errors());

    let text = plan.diagnostics.format_all();
    assert!(text.contains("E106"), "{}", text);
    assert!(text.contains("'priority'"), "{}", text);
    assert!(text.contains("ANNOUNCE"), "{}", text);

    // The complete (33, 0) unit still plans; the failed one contributes none
    assert_eq!(plan.units.len(), 1);
    assert_eq!(plan.units[0].source_id, 33);
    assert_eq!(plan.units[0].target_id, 0);
}

#[test]
fn test_conflicting_assignment_names_the_field() {
    let (_, _, plan) = planned("mapping_conflict.xml");
    assert!(plan.has_errors());
    assert!(plan.units.is_empty());

    let text = plan.diagnostics.format_all();
    assert!(text.contains("E107"), "{}", text);
    assert!(text.contains("'lat'"), "{}", text);
}

#[test]
fn test_unresolved_source_field_cites_name_and_suggests() {
    let dir = TempDir::new().unwrap();
    let map_path = dir.path().join("typo.xml");
    fs::write(
        &map_path,
        r#"<conversions>
  <message source_id="33" source_name="GLOBAL_POSITION_INT">
    <mapping source_field="latitude" target_id="0" target_field="lat"
             conversion="value / 10000000.0"/>
    <mapping source_field="time_boot_ms" target_id="0" target_field="time_usec"
             conversion="boot_ms_to_epoch_us(value)"/>
    <default_value target_id="0" target_field="reference_frame" value="2"/>
  </message>
</conversions>"#,
    )
    .unwrap();

    let (source, target) = load_pair();
    let set = mapping::resolve(&map_path, &source, &target).unwrap();
    let plan = plan::plan(&set, &source, &target, PlanOptions::default());

    assert!(plan.has_errors());
    let text = plan.diagnostics.format_all();
    assert!(text.contains("E102"), "{}", text);
    assert!(text.contains("'latitude'"), "{}", text);
    assert!(text.contains("did you mean 'lat'?"), "{}", text);
}

// =============================================================================
// Generation
// =============================================================================

#[test]
fn test_bundle_layout_is_stable() {
    let bundle = bundle();
    let paths: Vec<&str> = bundle.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "mod.rs",
            "convert.rs",
            "announce.rs",
            "frame_status.rs",
            "latitude_longitude.rs",
            "reference_frame.rs",
            "manifest.json",
        ]
    );
    assert_eq!(bundle.message_count, 3);
    assert_eq!(bundle.enum_count, 1);
    assert_eq!(bundle.unit_count, 2);
}

#[test]
fn test_record_struct_carries_provenance_first() {
    let bundle = bundle();
    let record = &bundle.file("latitude_longitude.rs").unwrap().content;

    assert!(record.starts_with("// Generated by bridgegen - DO NOT EDIT.\n"));
    assert!(record.contains("pub struct LatitudeLongitude {"));
    assert!(record.contains("/// Latitude. [degrees]"));
    assert!(record.contains("pub const ID: u32 = 0;"));
    assert!(record.contains("pub const NAME: &'static str = \"LATITUDE_LONGITUDE\";"));

    let idx = |s: &str| record.find(s).unwrap();
    assert!(idx("pub source_system: u32") < idx("pub time_usec: u64"));
    assert!(idx("pub time_usec: u64") < idx("pub lat: f64"));
    assert!(idx("pub lat: f64") < idx("pub reference_frame: u8"));
}

#[test]
fn test_converter_preserves_templates_and_literal_default() {
    let bundle = bundle();
    let convert = &bundle.file("convert.rs").unwrap().content;

    let f = convert
        .find("pub fn global_position_int_to_latitude_longitude")
        .unwrap();
    let body = &convert[f..];

    // Accessor is typed from the source field, the binding is pre-cast into
    // the target domain, and the template text lands verbatim
    assert!(body.contains(".get_uint(\"time_boot_ms\")"));
    assert!(body.contains("boot_ms_to_epoch_us(value)"));
    assert!(body.contains(".get_int(\"lat\")"));
    assert!(body.contains("})? as f64;"));
    assert!(body.contains("value / 10000000.0"));
    assert!(body.contains("let reference_frame = (2) as u8;"));

    // Bindings follow the target declaration order
    let idx = |s: &str| body.find(s).unwrap();
    assert!(idx("let time_usec") < idx("let lat"));
    assert!(idx("let lat") < idx("let reference_frame"));
    assert!(body.contains("source_system: record.source_system(),"));
}

#[test]
fn test_enum_mapping_checks_wire_value_and_arrays_zero_fill() {
    let bundle = bundle();
    let convert = &bundle.file("convert.rs").unwrap().content;

    let f = convert.find("pub fn attitude_to_frame_status").unwrap();
    let body = &convert[f..];

    assert!(body.contains("let time_usec = now_epoch_us() as u64;"));
    assert!(body.contains(".get_uint(\"kind\")"));
    assert!(body.contains("ReferenceFrame::from_value(raw).ok_or(ConvertError::InvalidEnumValue {"));
    assert!(body.contains("let pad = [0; 4];"));
}

#[test]
fn test_dispatch_table_is_sorted_and_complete() {
    let bundle = bundle();
    let convert = &bundle.file("convert.rs").unwrap().content;

    let table = "pub static CONVERTERS: &[(u32, ConvertFn)] = &[\n    (30, convert_attitude),\n    (33, convert_global_position_int),\n];";
    assert!(convert.contains(table), "{}", convert);
    assert!(convert.contains("pub fn converter_for(source_id: u32) -> Option<ConvertFn> {"));
    // Unmapped ids fall through to an empty conversion set
    assert!(convert.contains("None => Ok(Vec::new()),"));
}

#[test]
fn test_base_file_declares_modules_and_support() {
    let bundle = bundle();
    let base = &bundle.file("mod.rs").unwrap().content;

    let idx = |s: &str| base.find(s).unwrap();
    assert!(idx("pub mod announce;") < idx("pub mod convert;"));
    assert!(idx("pub mod convert;") < idx("pub mod frame_status;"));
    assert!(idx("pub mod frame_status;") < idx("pub mod latitude_longitude;"));
    assert!(idx("pub mod latitude_longitude;") < idx("pub mod reference_frame;"));

    assert!(base.contains("pub use self::convert::{convert, converter_for, CONVERTERS};"));
    assert!(base.contains("pub const SOURCE_DIALECT: &str = \"common\";"));
    assert!(base.contains("pub const TARGET_DIALECT: &str = \"hellenic\";"));
    assert!(base.contains("pub trait SourceRecord {"));
    assert!(base.contains("pub enum ConvertError {"));
    assert!(base.contains("pub enum HellenicMessage {"));
    assert!(base.contains("pub fn boot_ms_to_epoch_us(boot_ms: u64) -> u64 {"));
}

#[test]
fn test_manifest_lists_every_artifact_with_checksum() {
    let bundle = bundle();
    let manifest = &bundle.file("manifest.json").unwrap().content;
    let value: serde_json::Value = serde_json::from_str(manifest).unwrap();

    assert_eq!(value["source_dialect"], "common");
    assert_eq!(value["target_dialect"], "hellenic");
    assert_eq!(value["messages"], 3);
    assert_eq!(value["enums"], 1);
    assert_eq!(value["converters"], 2);

    let files = value["files"].as_array().unwrap();
    assert_eq!(files.len(), bundle.files.len() - 1);
    for entry in files {
        let sha = entry["sha256"].as_str().unwrap();
        assert_eq!(sha.len(), 64);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

// =============================================================================
// Determinism and drift
// =============================================================================

#[test]
fn test_generation_is_byte_deterministic() {
    let first = bundle();
    let second = bundle();
    assert_eq!(first.files, second.files);

    let dir = TempDir::new().unwrap();
    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    first.write_to(&out_a).unwrap();
    second.write_to(&out_b).unwrap();
    for file in &first.files {
        let a = fs::read(out_a.join(&file.path)).unwrap();
        let b = fs::read(out_b.join(&file.path)).unwrap();
        assert_eq!(a, b, "artifact {} diverged", file.path);
    }
}

#[test]
fn test_drift_check_reports_missing_and_stale() {
    let bundle = bundle();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("generated");
    bundle.write_to(&out).unwrap();

    let clean = bundle.check_drift(&out);
    assert!(clean.is_clean());
    assert_eq!(clean.clean, bundle.files.len());

    fs::remove_file(out.join("announce.rs")).unwrap();
    let convert_path = out.join("convert.rs");
    let mut edited = fs::read_to_string(&convert_path).unwrap();
    edited.push_str("// hand edit\n");
    fs::write(&convert_path, edited).unwrap();

    let report = bundle.check_drift(&out);
    assert!(!report.is_clean());
    assert_eq!(report.missing, vec!["announce.rs".to_string()]);
    assert_eq!(report.stale.len(), 1);
    assert_eq!(report.stale[0].path, "convert.rs");
    assert!(report.stale[0].diff.contains("-// hand edit"));
}

//! Code generation orchestration
//!
//! Turns a resolved dialect pair plus its conversion plan into the artifact
//! bundle: one record module per target message, one enum module per target
//! enum, the dialect base module (`mod.rs`), the converter dispatch module
//! (`convert.rs`) and a `manifest.json` describing every emitted file. The
//! bundle is assembled fully in memory; writing and drift checking operate
//! on the assembled bundle so both see exactly the same bytes.

pub mod names;
pub mod rust;

use std::fs;
use std::path::Path;

use serde::Serialize;
use similar::TextDiff;
use tracing::debug;

use crate::checksum::Checksum;
use crate::dialect::DialectModel;
use crate::plan::ConversionUnit;
use crate::Result;

use self::names::NamingConfig;
use self::rust::Renderer;

/// The manifest is always the last file of a bundle
pub const MANIFEST_PATH: &str = "manifest.json";

/// Emitter knobs that sit above the dialect content itself
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    pub naming: NamingConfig,
    /// Derive `Serialize`/`Deserialize` on generated records and enums
    pub serde_derives: bool,
    /// Extra fixed comment line appended to every generated file header
    pub file_header_note: String,
}

/// One emitted artifact, path relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// The complete artifact set for one generation run
#[derive(Debug)]
pub struct GeneratedBundle {
    /// `mod.rs`, `convert.rs`, leaf modules sorted by path, manifest last
    pub files: Vec<GeneratedFile>,
    pub message_count: usize,
    pub enum_count: usize,
    pub unit_count: usize,
}

impl GeneratedBundle {
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Write every artifact under `out_dir`, creating it if needed
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir)?;
        for file in &self.files {
            fs::write(out_dir.join(&file.path), &file.content)?;
            debug!(path = %file.path, bytes = file.content.len(), "wrote artifact");
        }
        Ok(())
    }

    /// Compare every artifact against the file currently under `out_dir`
    /// without writing anything
    pub fn check_drift(&self, out_dir: &Path) -> DriftReport {
        let mut report = DriftReport::default();
        for file in &self.files {
            let on_disk = match fs::read_to_string(out_dir.join(&file.path)) {
                Ok(text) => text,
                Err(_) => {
                    report.missing.push(file.path.clone());
                    continue;
                }
            };
            if on_disk == file.content {
                report.clean += 1;
                continue;
            }
            let text_diff = TextDiff::from_lines(&on_disk, &file.content);
            let diff = text_diff
                .unified_diff()
                .header("current", "generated")
                .to_string();
            report.stale.push(StaleArtifact {
                path: file.path.clone(),
                diff,
            });
        }
        report
    }
}

/// Outcome of a `--check` run against an existing output directory
#[derive(Debug, Default)]
pub struct DriftReport {
    pub missing: Vec<String>,
    pub stale: Vec<StaleArtifact>,
    pub clean: usize,
}

/// An on-disk artifact that no longer matches what generation produces
#[derive(Debug)]
pub struct StaleArtifact {
    pub path: String,
    pub diff: String,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

#[derive(Serialize)]
struct Manifest<'a> {
    source_dialect: &'a str,
    target_dialect: &'a str,
    messages: usize,
    enums: usize,
    converters: usize,
    files: Vec<ManifestEntry>,
}

#[derive(Serialize)]
struct ManifestEntry {
    path: String,
    sha256: Checksum,
}

fn render_manifest(
    source: &DialectModel,
    target: &DialectModel,
    files: &[GeneratedFile],
    unit_count: usize,
) -> String {
    let mut entries: Vec<ManifestEntry> = files
        .iter()
        .map(|f| ManifestEntry {
            path: f.path.clone(),
            sha256: Checksum::from_content(&f.content),
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let manifest = Manifest {
        source_dialect: source.name(),
        target_dialect: target.name(),
        messages: target.messages().len(),
        enums: target.enums().len(),
        converters: unit_count,
        files: entries,
    };
    let mut body = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    body.push('\n');
    body
}

/// Render the full artifact bundle for one dialect pair
pub fn generate(
    source: &DialectModel,
    target: &DialectModel,
    units: &[ConversionUnit],
    options: &EmitOptions,
) -> GeneratedBundle {
    let renderer = Renderer::new(
        source,
        target,
        &options.naming,
        options.serde_derives,
        &options.file_header_note,
    );

    let mut files = vec![
        GeneratedFile {
            path: "mod.rs".to_string(),
            content: renderer.render_base(),
        },
        GeneratedFile {
            path: "convert.rs".to_string(),
            content: renderer.render_convert(units),
        },
    ];

    let mut leaves = Vec::new();
    for index in 0..target.messages().len() {
        leaves.push(GeneratedFile {
            path: format!("{}.rs", renderer.names().messages[index].stem),
            content: renderer.render_message(index),
        });
    }
    for index in 0..target.enums().len() {
        leaves.push(GeneratedFile {
            path: format!("{}.rs", renderer.names().enums[index].stem),
            content: renderer.render_enum(index),
        });
    }
    leaves.sort_by(|a, b| a.path.cmp(&b.path));
    files.extend(leaves);

    let manifest = render_manifest(source, target, &files, units.len());
    files.push(GeneratedFile {
        path: MANIFEST_PATH.to_string(),
        content: manifest,
    });

    GeneratedBundle {
        files,
        message_count: target.messages().len(),
        enum_count: target.enums().len(),
        unit_count: units.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::loader;
    use crate::mapping;
    use crate::plan::{self, PlanOptions};
    use tempfile::TempDir;

    const SOURCE: &str = r#"<dialect><messages>
  <message id="33" name="GLOBAL_POSITION_INT">
    <field type="int32_t" name="lat" units="degE7"/>
    <field type="int32_t" name="lon" units="degE7"/>
  </message>
</messages></dialect>"#;

    const TARGET: &str = r#"<dialect>
  <enums>
    <enum name="REFERENCE_FRAME">
      <entry value="2" name="REFERENCE_FRAME_GEODETIC"/>
    </enum>
  </enums>
  <messages>
    <message id="0" name="LATITUDE_LONGITUDE">
      <field type="float64" name="lat" units="degrees"/>
      <field type="float64" name="lon" units="degrees"/>
      <field type="uint8_t" name="frame" enum="REFERENCE_FRAME"/>
    </message>
  </messages>
</dialect>"#;

    const MAPPING: &str = r#"<conversions>
  <message source_id="33">
    <mapping source_field="lat" target_id="0" target_field="lat"
             conversion="value / 10000000.0"/>
    <mapping source_field="lon" target_id="0" target_field="lon"
             conversion="value / 10000000.0"/>
    <default_value target_id="0" target_field="frame" value="2"/>
  </message>
</conversions>"#;

    fn bundle(dir: &TempDir) -> GeneratedBundle {
        let source_path = dir.path().join("common.xml");
        let target_path = dir.path().join("hellenic.xml");
        let map_path = dir.path().join("map.xml");
        fs::write(&source_path, SOURCE).unwrap();
        fs::write(&target_path, TARGET).unwrap();
        fs::write(&map_path, MAPPING).unwrap();
        let source = loader::load(&source_path).unwrap();
        let target = loader::load(&target_path).unwrap();
        let set = mapping::resolve(&map_path, &source, &target).unwrap();
        let plan = plan::plan(&set, &source, &target, PlanOptions::default());
        assert!(!plan.has_errors(), "{}", plan.diagnostics.format_all());
        generate(&source, &target, &plan.units, &EmitOptions::default())
    }

    #[test]
    fn test_bundle_file_layout() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle(&dir);

        let paths: Vec<&str> = bundle.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "mod.rs",
                "convert.rs",
                "latitude_longitude.rs",
                "reference_frame.rs",
                "manifest.json",
            ]
        );
        assert_eq!(bundle.message_count, 1);
        assert_eq!(bundle.enum_count, 1);
        assert_eq!(bundle.unit_count, 1);
        assert!(bundle.file("latitude_longitude.rs").is_some());
        assert!(bundle.file("attitude.rs").is_none());
    }

    #[test]
    fn test_manifest_contents() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle(&dir);

        let manifest = bundle.file(MANIFEST_PATH).unwrap();
        let value: serde_json::Value = serde_json::from_str(&manifest.content).unwrap();
        assert_eq!(value["source_dialect"], "common");
        assert_eq!(value["target_dialect"], "hellenic");
        assert_eq!(value["messages"], 1);
        assert_eq!(value["enums"], 1);
        assert_eq!(value["converters"], 1);

        let files = value["files"].as_array().unwrap();
        // Every artifact except the manifest itself, sorted by path
        assert_eq!(files.len(), bundle.files.len() - 1);
        let listed: Vec<&str> = files.iter().map(|e| e["path"].as_str().unwrap()).collect();
        let mut sorted = listed.clone();
        sorted.sort_unstable();
        assert_eq!(listed, sorted);
        assert!(!listed.contains(&MANIFEST_PATH));

        for entry in files {
            let path = entry["path"].as_str().unwrap();
            let expected = Checksum::from_content(&bundle.file(path).unwrap().content);
            assert_eq!(entry["sha256"].as_str().unwrap(), expected.as_str());
        }
    }

    #[test]
    fn test_write_then_clean_drift() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle(&dir);
        let out = dir.path().join("generated");

        bundle.write_to(&out).unwrap();
        let report = bundle.check_drift(&out);
        assert!(report.is_clean());
        assert_eq!(report.clean, bundle.files.len());
    }

    #[test]
    fn test_drift_detects_missing_and_stale() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle(&dir);
        let out = dir.path().join("generated");
        bundle.write_to(&out).unwrap();

        fs::remove_file(out.join("reference_frame.rs")).unwrap();
        let stale_path = out.join("convert.rs");
        let mut edited = fs::read_to_string(&stale_path).unwrap();
        edited.push_str("// local edit\n");
        fs::write(&stale_path, edited).unwrap();

        let report = bundle.check_drift(&out);
        assert!(!report.is_clean());
        assert_eq!(report.missing, vec!["reference_frame.rs".to_string()]);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].path, "convert.rs");
        assert!(report.stale[0].diff.contains("-// local edit"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();
        let first = bundle(&dir1);
        let second = bundle(&dir2);
        assert_eq!(first.files, second.files);
    }
}

//! Configuration management for the message compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bridgegen.toml)
//! - Environment variables (BRIDGEGEN__*)
//!
//! ## Example config file (bridgegen.toml):
//! ```toml
//! [naming]
//! acronyms = ["ID", "GPS", "IMU", "UAV", "URL", "API"]
//! preserve_screaming_case = true
//!
//! [emit]
//! serde_derives = false
//! file_header_note = ""
//!
//! [resolver]
//! strict_units = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codegen::names::NamingConfig;
use crate::codegen::EmitOptions;
use crate::plan::PlanOptions;

/// Main configuration for the generator
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratorConfig {
    /// Generated identifier shaping
    #[serde(default)]
    pub naming: NamingSection,

    /// Artifact emission settings
    #[serde(default)]
    pub emit: EmitSection,

    /// Mapping resolution settings
    #[serde(default)]
    pub resolver: ResolverSection,
}

/// Identifier shaping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingSection {
    /// Name segments kept fully uppercase in PascalCase identifiers
    #[serde(default = "default_acronyms")]
    pub acronyms: Vec<String>,

    /// Keep SCREAMING_SNAKE enum entry names as declared
    #[serde(default = "default_true")]
    pub preserve_screaming_case: bool,
}

/// Artifact emission configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmitSection {
    /// Derive `Serialize`/`Deserialize` on generated records and enums
    #[serde(default)]
    pub serde_derives: bool,

    /// Extra fixed comment line appended to the generated file header
    #[serde(default)]
    pub file_header_note: String,
}

/// Mapping resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolverSection {
    /// Treat unit-label mismatches without a conversion as errors
    #[serde(default)]
    pub strict_units: bool,
}

// Default value functions
fn default_acronyms() -> Vec<String> {
    ["ID", "GPS", "IMU", "UAV", "URL", "API"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for NamingSection {
    fn default() -> Self {
        Self {
            acronyms: default_acronyms(),
            preserve_screaming_case: true,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally forcing a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["bridgegen.toml", ".bridgegen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "bridgegen", "bridgegen") {
            let xdg_config = config_dir.config_dir().join("bridgegen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // Load from environment variables (BRIDGEGEN__*)
        builder = builder.add_source(
            Environment::with_prefix("BRIDGEGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Identifier shaping settings in the form the name mapper consumes
    pub fn naming_config(&self) -> NamingConfig {
        NamingConfig {
            acronyms: self
                .naming
                .acronyms
                .iter()
                .map(|s| s.to_uppercase())
                .collect(),
            preserve_screaming_case: self.naming.preserve_screaming_case,
        }
    }

    /// Emitter settings in the form the code generator consumes
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            naming: self.naming_config(),
            serde_derives: self.emit.serde_derives,
            file_header_note: self.emit.file_header_note.clone(),
        }
    }

    /// Resolution settings in the form the planner consumes
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            strict_units: self.resolver.strict_units,
        }
    }
}

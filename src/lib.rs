//! Bridgegen
//!
//! A schema-driven message compiler: two wire-protocol dialect descriptions
//! plus a field-level mapping document go in, deterministic Rust conversion
//! code comes out.
//!
//! ## Features
//!
//! - **Cycle-safe loading**: dialect include graphs merge first-seen-wins
//! - **Batch diagnostics**: every unresolved reference in a run is reported,
//!   with close-name suggestions, before the run fails
//! - **Deterministic output**: identical inputs produce identical bytes
//! - **Drift checking**: committed artifacts are verified against the schemas
//!
//! ## Pipeline
//!
//! ```text
//! source.xml ──┐
//! target.xml ──┼─ load -> resolve -> plan -> emit ──> out/
//! mapping.xml ─┘                                      ├── mod.rs
//!                                                     ├── convert.rs
//!                                                     ├── <message>.rs ...
//!                                                     ├── <enum>.rs ...
//!                                                     └── manifest.json
//! ```
//!
//! The stages are plain functions over plain data: [`dialect::loader::load`]
//! builds a [`DialectModel`] per dialect, [`mapping::resolve`] checks the
//! mapping document against both models, [`plan::plan`] turns the resolved
//! mappings into per-message conversion plans, and [`codegen::generate`]
//! renders the artifact bundle.

pub mod checksum;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod lint;
pub mod mapping;
pub mod plan;

pub use checksum::Checksum;
pub use config::GeneratorConfig;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use dialect::{DialectModel, EnumSchema, FieldSchema, FieldType, MessageSchema};
pub use error::{Error, Result};

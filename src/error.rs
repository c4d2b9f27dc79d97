//! Error types for the conversion compiler

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler errors.
///
/// Document-level parse failures and include cycles are fatal and abort the
/// run immediately. Semantic problems (unresolved references, incomplete
/// mappings, conflicting assignments) are accumulated into one [`Diagnostics`]
/// batch so a single run reports every independent problem.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error in {file}: {location}: {reason}", file = .file.display())]
    Parse {
        file: PathBuf,
        /// Element path or line:column inside the document
        location: String,
        reason: String,
    },

    #[error("Include cycle: {file} is already on this include branch ({chain})", file = .file.display())]
    IncludeCycle { file: PathBuf, chain: String },

    #[error("Include depth limit of {limit} exceeded at {file}", file = .file.display())]
    IncludeDepth { file: PathBuf, limit: usize },

    #[error("{0}")]
    Semantic(Diagnostics),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

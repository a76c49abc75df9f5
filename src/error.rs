//! Error taxonomy for the panel pipeline.
//!
//! Only genuinely fatal conditions are errors: missing required columns,
//! unreadable inputs, unwritable outputs, and a broken run manifest.
//! Duplicate join keys and failed arithmetic guards are data-quality
//! conditions handled inline (median collapse and null results), never
//! raised through this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("schema error in {path}: {message}")]
    Schema { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid run manifest {path}: {message}")]
    Manifest { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, PanelError>;

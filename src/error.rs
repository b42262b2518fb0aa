//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Categorie di errori:
//! - `Configuration`: opzioni non valide o mancanti, fatale prima del batch
//! - `Probe`: identità dell'immagine non determinabile, il target viene saltato
//! - `ToolFailed` / `ToolTimeout`: tool esterno fallito, il target conta come fallito
//! - `MissingDependency`: capacità opzionale assente (es. decoder per il tint)
//! - `Database`: errori del driver PostgreSQL
//! - `InvalidColor`: specifica colore non risolvibile
//!
//! Solo `Configuration` interrompe l'esecuzione: tutti gli altri vengono
//! convertiti in un esito per singolo target dal `BatchRunner`.

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for batch image processing
#[derive(thiserror::Error, Debug)]
pub enum MagoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "tint")]
    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot identify {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} timed out after {elapsed:?}")]
    ToolTimeout { tool: String, elapsed: Duration },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

impl MagoError {
    /// Shorthand for building a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for errors that must abort the run before any target is touched
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

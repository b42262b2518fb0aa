//! # External-Tool Bridge
//!
//! Interfaccia verso i programmi esterni che fanno il lavoro sui pixel:
//! conversione, quantizzazione della palette, probe e ripristino mtime.
//!
//! Ogni metodo restituisce un risultato strutturato: un exit status diverso
//! da zero diventa `MagoError::ToolFailed`, mai un panic. Cosa fare del
//! fallimento lo decide il `BatchRunner`.
//!
//! - `imagemagick`: implementazione reale con `tokio::process::Command`

pub mod imagemagick;

pub use imagemagick::MagickTool;

use crate::error::MagoError;
use std::path::Path;
use std::time::SystemTime;

/// Parameters forwarded to a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Re-encode quality 0-100
    pub quality: Option<u8>,
    /// ImageMagick geometry, a bare number is a target width
    pub resize: Option<String>,
    pub monochrome: bool,
    /// Drop colour information but keep the alpha channel
    pub desaturate: bool,
}

/// Capability for everything delegated to external programs.
///
/// Calls are awaited one at a time by the runner; implementations do not
/// need to be shareable across tasks.
#[allow(async_fn_in_trait)]
pub trait ExternalTool {
    /// Convert `src` into `dest`, the output format follows `dest`'s extension
    async fn convert(&self, src: &Path, dest: &Path, options: &ConvertOptions) -> Result<(), MagoError>;

    /// Quantize a PNG palette in place
    async fn quantize(&self, path: &Path, quality: Option<u8>) -> Result<(), MagoError>;

    /// Set the modification time of `path`
    async fn touch(&self, path: &Path, modified: SystemTime) -> Result<(), MagoError>;

    /// Raw identify output, formatted with [`crate::probe::IDENTIFY_FORMAT`]
    async fn probe(&self, path: &Path) -> Result<String, MagoError>;
}

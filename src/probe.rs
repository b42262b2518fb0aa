//! # Identity Prober
//!
//! Ricava larghezza, altezza, formato e trasparenza di un'immagine
//! interrogando `identify` attraverso il bridge verso i tool esterni.
//!
//! Il formato richiesto a `identify` è `%w,%h,%m,%A`: l'ultimo campo è il
//! descrittore del canale alpha. `Blend` (alpha graduato) e `True`/`On`
//! (alpha binario) indicano un'immagine trasparente; `False`, `Off`,
//! `Undefined` no.
//!
//! Un probe fallito non produce mai valori di default: il chiamante deve
//! saltare il target.

use crate::error::MagoError;
use crate::tools::ExternalTool;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// `identify -format` template understood by [`ImageIdentity::parse`]
pub const IDENTIFY_FORMAT: &str = "%w,%h,%m,%A\n";

/// What a probe found out about an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageIdentity {
    pub width: u32,
    pub height: Option<u32>,
    /// Lowercase format token, e.g. `png`, `jpeg`
    pub format: Option<String>,
    pub is_transparent: bool,
}

impl ImageIdentity {
    /// Parse the raw `identify` output. Multi-frame images report one line
    /// per frame; the first frame describes the image.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let line = raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| "empty identify output".to_string())?;

        let mut fields = line.splitn(4, ',').map(str::trim);

        let width = fields
            .next()
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(|| format!("no width in identify output '{}'", line))?;
        let height = fields.next().and_then(|h| h.parse::<u32>().ok());
        let format = fields
            .next()
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
        let is_transparent = fields.next().map(is_transparent_descriptor).unwrap_or(false);

        Ok(Self {
            width,
            height,
            format,
            is_transparent,
        })
    }

    /// Width and height, when both are known
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.height.map(|h| (self.width, h))
    }
}

/// Classify an alpha-channel descriptor as reported by ImageMagick
pub fn is_transparent_descriptor(descriptor: &str) -> bool {
    matches!(
        descriptor.trim().to_ascii_lowercase().as_str(),
        "blend" | "true" | "on" | "activate" | "set"
    )
}

/// Identify `path` through the external tool
pub async fn probe<T: ExternalTool>(tool: &T, path: &Path) -> Result<ImageIdentity, MagoError> {
    let raw = tool.probe(path).await?;
    let identity = ImageIdentity::parse(&raw).map_err(|reason| MagoError::Probe {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!("Probed {}: {:?}", path.display(), identity);
    Ok(identity)
}

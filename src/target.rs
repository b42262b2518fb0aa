//! # Targets
//!
//! Un target è un'immagine da elaborare: un file su disco oppure una riga
//! del database, identificata dal suo id.
//!
//! I path passati da command line mantengono il loro ordine; una directory
//! viene espansa ricorsivamente (ordine per path) nei file immagine che
//! contiene.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One image to process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    File { path: PathBuf },
    Row { id: i64 },
}

impl Target {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    pub fn row(id: i64) -> Self {
        Self::Row { id }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::Row { id } => write!(f, "id: {}", id),
        }
    }
}

/// Check if a file has a supported image extension
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| {
            matches!(
                ext.as_str(),
                "jpg" | "jpeg" | "png" | "gif" | "webp" | "tiff" | "tif" | "bmp"
            )
        })
}

/// Expand command-line paths into file targets.
///
/// Files are kept as given, even when missing, so the runner reports them.
/// Directories contribute their images sorted by path.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            if !path.exists() {
                warn!("{} does not exist", path.display());
            }
            files.push(path.clone());
            continue;
        }

        let before = files.len();
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if is_image(entry.path()) {
                files.push(entry.into_path());
            }
        }
        debug!("{} expanded to {} images", path.display(), files.len() - before);
    }

    files
}

//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `Subprogram`, l'operazione richiesta dalla command line
//! - Definisce `RunConfiguration` con tutte le opzioni riconosciute
//! - Valida le opzioni una sola volta, prima di toccare qualsiasi target
//! - Fornisce valori di default sensati (colore "black", timeout 120s)
//!
//! ## Validazione:
//! - `quality` deve essere 0-100
//! - `to_format` deve essere uno dei formati supportati
//! - `convert` richiede `to_format`
//! - `resizer-db` richiede una DSN `psql:`
//! - `tint` richiede un colore risolvibile
//!
//! Una configurazione valida è immutabile per tutta la durata del run: il
//! `BatchRunner` e il motore di policy la ricevono per riferimento.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = RunConfiguration {
//!     subprogram: Subprogram::Resizer,
//!     max_width: Some(1600),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::MagoError;
use crate::tint::resolve_color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Output formats accepted by `-f`
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "tiff", "bmp"];

/// The operation requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subprogram {
    Resizer,
    ResizerDb,
    Pngquant,
    Png2jpeg,
    Convert,
    Tint,
}

impl Subprogram {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resizer => "resizer",
            Self::ResizerDb => "resizer-db",
            Self::Pngquant => "pngquant",
            Self::Png2jpeg => "png2jpeg",
            Self::Convert => "convert",
            Self::Tint => "tint",
        }
    }

    /// Whether a target must be identified before a plan can be made.
    /// `convert` and `tint` act unconditionally.
    pub fn requires_probe(&self) -> bool {
        !matches!(self, Self::Convert | Self::Tint)
    }

    /// Whether targets come from the database rather than the command line
    pub fn uses_database(&self) -> bool {
        matches!(self, Self::ResizerDb)
    }
}

impl fmt::Display for Subprogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subprogram {
    type Err = MagoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resizer" => Ok(Self::Resizer),
            "resizer-db" => Ok(Self::ResizerDb),
            "pngquant" => Ok(Self::Pngquant),
            "png2jpeg" => Ok(Self::Png2jpeg),
            "convert" => Ok(Self::Convert),
            "tint" => Ok(Self::Tint),
            other => Err(MagoError::config(format!("invalid subprogram: {}", other))),
        }
    }
}

/// Exact frame dimensions, parsed from `WxH`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for FrameSize {
    type Err = MagoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MagoError::config(format!("invalid size '{}', expected WxH", s));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        Ok(Self {
            width: w.trim().parse().map_err(|_| invalid())?,
            height: h.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolved options for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub subprogram: Subprogram,
    /// Input files or directories, in command-line order
    pub paths: Vec<PathBuf>,
    /// Width threshold above which an image is resized (`-m`)
    pub max_width: Option<u32>,
    /// Explicit target width for resizer-db (`-s`), lower priority than `max_width`
    pub size: Option<u32>,
    /// Target format (`-f`)
    pub to_format: Option<String>,
    /// Re-encode quality 0-100 (`-q`)
    pub quality: Option<u8>,
    /// ImageMagick geometry for the convert subprogram (`-resize`)
    pub resize: Option<String>,
    /// Inserted before the new extension by the convert subprogram (`-suffix`)
    pub suffix: String,
    /// Only quantize images with exactly these dimensions (`-if-size`)
    pub if_size: Option<FrameSize>,
    /// `psql:<connection>:<table>:<column>` (`-d`)
    pub dsn: Option<String>,
    /// Restrict resizer-db to a single row
    pub rowid: Option<i64>,
    /// Tint colour, hex or named
    pub color: String,
    pub keep_mtime: bool,
    pub keep_extension: bool,
    pub optimize_png: bool,
    pub monochrome: bool,
    pub desaturate: bool,
    pub if_opaque: bool,
    /// Run every decision and transform but never persist the result
    pub dry_run: bool,
    pub verbose: bool,
    /// Emit one JSON object per event on stdout
    pub json_output: bool,
    /// Upper bound for a single external tool invocation, in seconds
    pub timeout_secs: u64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            subprogram: Subprogram::Resizer,
            paths: Vec::new(),
            max_width: None,
            size: None,
            to_format: None,
            quality: None,
            resize: None,
            suffix: String::new(),
            if_size: None,
            dsn: None,
            rowid: None,
            color: "black".to_string(),
            keep_mtime: false,
            keep_extension: false,
            optimize_png: false,
            monochrome: false,
            desaturate: false,
            if_opaque: false,
            dry_run: false,
            verbose: false,
            json_output: false,
            timeout_secs: 120,
        }
    }
}

impl RunConfiguration {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), MagoError> {
        if let Some(quality) = self.quality {
            if quality > 100 {
                return Err(MagoError::config("quality must be between 0 and 100"));
            }
        }

        if let Some(ref format) = self.to_format {
            if !SUPPORTED_FORMATS.contains(&format.as_str()) {
                return Err(MagoError::config(format!(
                    "unsupported format '{}', expected one of: {}",
                    format,
                    SUPPORTED_FORMATS.join("|")
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(MagoError::config("timeout must be greater than 0"));
        }

        match self.subprogram {
            Subprogram::Convert if self.to_format.is_none() => {
                return Err(MagoError::config("-f <format> is required to convert"));
            }
            Subprogram::ResizerDb => match self.dsn {
                None => return Err(MagoError::config("-d <dsn> is required by resizer-db")),
                Some(ref dsn) if !dsn.starts_with("psql:") => {
                    return Err(MagoError::config(format!("unsupported database source: {}", dsn)));
                }
                Some(_) => {}
            },
            Subprogram::Tint => {
                resolve_color(&self.color).map_err(|e| MagoError::config(e.to_string()))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Per-invocation bound for external tools
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RunConfiguration::default();
        assert_eq!(config.color, "black");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.suffix, "");
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_convert_requires_format() {
        let mut config = RunConfiguration {
            subprogram: Subprogram::Convert,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());

        config.to_format = Some("webp".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunConfiguration {
            quality: Some(101),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.quality = Some(100);
        config.to_format = Some("xcf".to_string());
        assert!(config.validate().is_err());

        config.to_format = Some("png".to_string());
        assert!(config.validate().is_ok());

        config.subprogram = Subprogram::ResizerDb;
        assert!(config.validate().is_err());
        config.dsn = Some("mysql:x:y:z".to_string());
        assert!(config.validate().is_err());
        config.dsn = Some("psql:dbname=test:photos:data".to_string());
        assert!(config.validate().is_ok());

        config.subprogram = Subprogram::Tint;
        config.color = "not-a-colour".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_subprogram_parsing() {
        assert_eq!("resizer-db".parse::<Subprogram>().unwrap(), Subprogram::ResizerDb);
        assert_eq!("png2jpeg".parse::<Subprogram>().unwrap(), Subprogram::Png2jpeg);
        let err = "shrink".parse::<Subprogram>().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: invalid subprogram: shrink");
        assert!(!Subprogram::Tint.requires_probe());
        assert!(Subprogram::Pngquant.requires_probe());
    }

    #[test]
    fn test_frame_size_parsing() {
        let size: FrameSize = "200x100".parse().unwrap();
        assert_eq!(size, FrameSize { width: 200, height: 100 });
        assert_eq!(size.to_string(), "200x100");
        assert!("200".parse::<FrameSize>().is_err());
        assert!("ax100".parse::<FrameSize>().is_err());
    }
}

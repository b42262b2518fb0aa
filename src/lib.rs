//! # Mago Library
//!
//! Modulo principale della libreria: espone le API pubbliche usate da
//! `main.rs` e dai test di integrazione.
//!
//! ## Architettura dei moduli:
//! - `cli`: Parsing degli argomenti e costruzione della configurazione
//! - `config`: `RunConfiguration`, subprogram e validazione
//! - `error`: Tipi di errore custom
//! - `probe`: Identità di un'immagine (larghezza, altezza, formato, alpha)
//! - `policy`: Decisione per target (skip / resize / convert / quantize / tint)
//! - `runner`: Orchestratore sequenziale del batch
//! - `tools`: Bridge verso i programmi esterni (ImageMagick, pngquant, touch)
//! - `tool_resolver`: Ricerca dei binari esterni
//! - `tint`: Sostituzione colore sui pixel non trasparenti
//! - `database`: Sorgente di blob PostgreSQL
//! - `target`: File e righe da elaborare
//! - `progress`: Totali, righe di avanzamento e riepilogo
//! - `json_output`: Output strutturato `--json`
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use mago::{BatchRunner, MagickTool, RunConfiguration, Subprogram, ToolResolver};
//!
//! let config = RunConfiguration {
//!     subprogram: Subprogram::Resizer,
//!     max_width: Some(1600),
//!     ..Default::default()
//! };
//! let tool = MagickTool::new(ToolResolver::from_env(), config.tool_timeout());
//! let mut runner = BatchRunner::new(config, tool)?;
//! let totals = runner.run_files(&paths).await;
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod json_output;
pub mod policy;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod target;
pub mod tint;
pub mod tool_resolver;
pub mod tools;
pub mod utils;

pub use cli::Args;
pub use config::{FrameSize, RunConfiguration, Subprogram};
pub use database::{BlobStore, Dsn, MemoryBlobStore, PgBlobStore};
pub use error::MagoError;
pub use policy::{plan, Action, ConversionPlan, SkipReason};
pub use probe::ImageIdentity;
pub use progress::{BatchTotals, Outcome};
pub use runner::BatchRunner;
pub use target::{expand_paths, Target};
pub use tool_resolver::ToolResolver;
pub use tools::{ConvertOptions, ExternalTool, MagickTool};

//! # Mago - Main Entry Point
//!
//! Punto di ingresso dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Validazione della configurazione, prima di toccare qualsiasi target
//! - Avvio del `BatchRunner` su file o righe del database
//!
//! ## Exit code:
//! - `0`: batch completato, anche con fallimenti sui singoli target
//! - `1`: errore di configurazione, subprogram non valido, database non raggiungibile

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mago::{
    expand_paths, Args, BatchRunner, Dsn, MagickTool, PgBlobStore, RunConfiguration, ToolResolver,
};

/// Environment variable holding a tracing filter
const LOG_ENV: &str = "MAGO_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse_normalized();

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.into_configuration() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(config: RunConfiguration) -> Result<()> {
    let tool = MagickTool::new(ToolResolver::from_env(), config.tool_timeout());

    if config.subprogram.uses_database() {
        let dsn: Dsn = config.dsn.as_deref().unwrap_or_default().parse()?;
        let mut store = PgBlobStore::connect(&dsn)
            .await
            .with_context(|| format!("cannot connect to {}", dsn.connection))?;
        let mut runner = BatchRunner::new(config, tool)?;
        runner.run_database(&mut store).await?;
    } else {
        let paths = expand_paths(&config.paths);
        let mut runner = BatchRunner::new(config, tool)?;
        runner.run_files(&paths).await;
    }

    Ok(())
}

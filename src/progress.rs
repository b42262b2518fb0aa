//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress reporting e i totali del batch.
//!
//! ## Componenti principali:
//! - `Outcome`: esito di un singolo target (processed / skipped / failed)
//! - `BatchTotals`: contatori e byte prima/dopo, accumulati in modo monotono
//! - `Reporter`: decide come mostrare l'avanzamento
//!
//! ## Modalità di output:
//! - **verbose** (`-v`): una riga per target su stdout
//! - **default**: progress bar `indicatif` su stderr
//! - **json** (`--json`): un messaggio JSON per evento su stdout
//!
//! Gli errori per target vanno sempre su stderr tramite `tracing`, separati
//! dal normale avanzamento.
//!
//! ## Righe per target:
//! ```text
//! photos/a.jpg 1048576 -> 524288 (50%)
//! 20480 --> 10240 (id: 7)
//! ```
//!
//! ## Riepilogo:
//! ```text
//! total: 1069056 --> 534528
//! saved: 50.00%
//! processed: 2, skipped: 0, failed: 0
//! ```

use crate::config::{RunConfiguration, Subprogram};
use crate::json_output::JsonMessage;
use crate::target::Target;
use crate::utils::{format_size, savings_percent};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::error;

/// Result of processing one target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Processed { before: u64, after: u64 },
    Skipped { reason: String },
    Failed { error: String },
}

impl Outcome {
    pub fn skipped(reason: impl ToString) -> Self {
        Self::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }
}

/// Statistics accumulated over one run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl BatchTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Processed { before, after } => {
                self.processed += 1;
                self.bytes_before += before;
                self.bytes_after += after;
            }
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    /// `None` when nothing was measured before
    pub fn savings_percent(&self) -> Option<f64> {
        savings_percent(self.bytes_before, self.bytes_after)
    }

    /// Lines printed at the end of a batch. The percentage line only
    /// appears when there were bytes to compare against.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("total: {} --> {}", self.bytes_before, self.bytes_after)];
        if let Some(percent) = self.savings_percent() {
            lines.push(format!(
                "saved: {:.2}% ({})",
                percent,
                format_size(self.bytes_before.saturating_sub(self.bytes_after))
            ));
        }
        lines.push(format!(
            "processed: {}, skipped: {}, failed: {}",
            self.processed, self.skipped, self.failed
        ));
        lines
    }
}

/// Line describing one target, `None` for outcomes only reported as diagnostics
pub fn item_line(target: &Target, outcome: &Outcome) -> Option<String> {
    match (target, outcome) {
        (Target::File { path }, Outcome::Processed { before, after }) => Some(match savings_percent(*before, *after) {
            Some(percent) => format!("{} {} -> {} ({:.0}%)", path.display(), before, after, percent),
            None => format!("{} {} -> {}", path.display(), before, after),
        }),
        (Target::Row { id }, Outcome::Processed { before, after }) => {
            Some(format!("{} --> {} (id: {})", before, after, id))
        }
        (target, Outcome::Skipped { reason }) => Some(format!("{} skipped: {}", target, reason)),
        (_, Outcome::Failed { .. }) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportMode {
    Lines,
    Bar,
    Json,
}

/// Emits per-target progress and the final summary
pub struct Reporter {
    mode: ReportMode,
    bar: ProgressBar,
}

impl Reporter {
    pub fn new(config: &RunConfiguration) -> Self {
        let mode = if config.json_output {
            ReportMode::Json
        } else if config.verbose {
            ReportMode::Lines
        } else {
            ReportMode::Bar
        };
        Self {
            mode,
            bar: ProgressBar::hidden(),
        }
    }

    /// Announce the batch
    pub fn start(&mut self, subprogram: Subprogram, total_targets: usize, dry_run: bool) {
        match self.mode {
            ReportMode::Json => JsonMessage::Start {
                subprogram,
                total_targets,
                dry_run,
            }
            .emit(),
            ReportMode::Bar => {
                let bar = ProgressBar::new(total_targets as u64);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    bar.set_style(style.progress_chars("=>-"));
                }
                self.bar = bar;
            }
            ReportMode::Lines => {}
        }
    }

    /// Report one finished target
    pub fn item(&self, target: &Target, outcome: &Outcome) {
        if let Outcome::Failed { error: message } = outcome {
            error!("{} failed: {}", target, message);
        }

        match self.mode {
            ReportMode::Json => JsonMessage::Item {
                target: target.to_string(),
                outcome,
            }
            .emit(),
            ReportMode::Lines => {
                if let Some(line) = item_line(target, outcome) {
                    println!("{}", line);
                }
            }
            ReportMode::Bar => {
                self.bar.set_message(target.to_string());
                self.bar.inc(1);
            }
        }
    }

    /// Print the summary
    pub fn finish(&self, totals: &BatchTotals) {
        match self.mode {
            ReportMode::Json => JsonMessage::Summary {
                totals,
                savings_percent: totals.savings_percent(),
            }
            .emit(),
            ReportMode::Lines | ReportMode::Bar => {
                self.bar.finish_and_clear();
                for line in totals.summary_lines() {
                    println!("{}", line);
                }
            }
        }
    }
}

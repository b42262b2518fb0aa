//! # JSON Output Module
//!
//! Output strutturato (`--json`): un oggetto JSON per riga su stdout,
//! pensato per chi invoca il tool da un altro programma.
//!
//! ## Tipi di messaggi:
//! - `start`: inizio del batch
//! - `item`: esito di un singolo target
//! - `summary`: totali finali

use crate::config::Subprogram;
use crate::progress::{BatchTotals, Outcome};
use serde::Serialize;

/// One line of JSON output
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage<'a> {
    Start {
        subprogram: Subprogram,
        total_targets: usize,
        dry_run: bool,
    },
    Item {
        target: String,
        #[serde(flatten)]
        outcome: &'a Outcome,
    },
    Summary {
        #[serde(flatten)]
        totals: &'a BatchTotals,
        savings_percent: Option<f64>,
    },
}

impl JsonMessage<'_> {
    /// Serialize to a single line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"type\":\"error\",\"message\":\"{}\"}}", e)
        })
    }

    /// Emit the message on stdout
    pub fn emit(&self) {
        println!("{}", self.to_line());
    }
}

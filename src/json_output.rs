//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per comunicazione con
//! front-end esterni (GUI che lanciano il binario come processo figlio).
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout per ogni evento del run
//! - Implementa `ProgressReporter`, quindi si collega al controller come il reporter da terminale
//! - I log vanno su stderr: stdout contiene solo messaggi JSON
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del run con la configurazione effettiva
//! - `file_complete`: Fine elaborazione di un file (disposizione, esito, dimensioni)
//! - `complete`: Fine del run con statistiche finali
//! - `error`: Errore che impedisce l'avvio del run

use crate::config::RunConfig;
use crate::file_manager::FileManager;
use crate::progress::{ProgressReporter, RunSummary};
use crate::task::Outcome;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del run
    #[serde(rename = "start")]
    Start {
        input_dir: PathBuf,
        output_dir: PathBuf,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        disposition: String,
        result: String,
        original_size: u64,
        output_size: u64,
        reduction_percent: f64,
        elapsed_ms: u64,
        error: Option<String>,
    },

    /// Run terminato (completato o fermato)
    #[serde(rename = "complete")]
    Complete {
        files_processed: u64,
        files_compressed: u64,
        files_copied: u64,
        files_skipped: u64,
        fallbacks: u64,
        errors: u64,
        discarded: u64,
        total_bytes_in: u64,
        total_bytes_out: u64,
        duration_seconds: f64,
        stopped: bool,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub max_width: u32,
    pub jpeg_quality: u8,
    pub workers: usize,
}

impl From<&RunConfig> for JsonConfig {
    fn from(config: &RunConfig) -> Self {
        Self {
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
            workers: config.effective_workers(),
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(config: &RunConfig) -> Self {
        Self::Start {
            input_dir: config.input_root.clone(),
            output_dir: config.output_root.clone(),
            config: JsonConfig::from(config),
        }
    }

    pub fn file_complete(outcome: &Outcome) -> Self {
        Self::FileComplete {
            path: outcome.task.relative_path.clone(),
            disposition: outcome.disposition.as_str().to_string(),
            result: outcome.kind.as_str().to_string(),
            original_size: outcome.bytes_in,
            output_size: outcome.bytes_out,
            reduction_percent: FileManager::calculate_reduction(outcome.bytes_in, outcome.bytes_out),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            error: outcome.error.clone(),
        }
    }

    pub fn complete(summary: &RunSummary) -> Self {
        Self::Complete {
            files_processed: summary.files_processed(),
            files_compressed: summary.compressed,
            files_copied: summary.copied,
            files_skipped: summary.skipped,
            fallbacks: summary.fallbacks,
            errors: summary.failed,
            discarded: summary.discarded,
            total_bytes_in: summary.bytes_in,
            total_bytes_out: summary.bytes_out,
            duration_seconds: summary.elapsed_seconds,
            stopped: summary.stopped,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

/// Reporter che scrive JSON lines su stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl ProgressReporter for JsonReporter {
    fn on_run_started(&self, config: &RunConfig) {
        JsonMessage::start(config).emit();
    }

    fn on_task_outcome(&self, outcome: &Outcome) {
        JsonMessage::file_complete(outcome).emit();
    }

    fn on_run_finished(&self, summary: &RunSummary) {
        JsonMessage::complete(summary).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Disposition, OutcomeKind, Task};
    use serde_json::{json, Value};
    use std::time::Duration;

    #[test]
    fn test_file_complete_message() {
        let outcome = Outcome {
            task: Task {
                index: 4,
                input_path: PathBuf::from("/in/sub/big.jpg"),
                relative_path: PathBuf::from("sub/big.jpg"),
            },
            disposition: Disposition::Compress,
            kind: OutcomeKind::FailedFallbackToCopy,
            bytes_in: 400,
            bytes_out: 400,
            elapsed: Duration::from_millis(12),
            error: Some("cannot encode".to_string()),
        };

        let value = serde_json::to_value(JsonMessage::file_complete(&outcome)).unwrap();
        assert_eq!(value["type"], "file_complete");
        assert_eq!(value["path"], "sub/big.jpg");
        assert_eq!(value["disposition"], "compress");
        assert_eq!(value["result"], "failed_fallback_to_copy");
        assert_eq!(value["reduction_percent"], json!(0.0));
        assert_eq!(value["elapsed_ms"], 12);
        assert_eq!(value["error"], "cannot encode");
    }

    #[test]
    fn test_start_and_complete_messages() {
        let config = RunConfig {
            workers: 3,
            ..RunConfig::new("/photos", "/small")
        };
        let start = serde_json::to_value(JsonMessage::start(&config)).unwrap();
        assert_eq!(start["type"], "start");
        assert_eq!(start["config"]["max_width"], 2160);
        assert_eq!(start["config"]["workers"], 3);

        let summary = RunSummary {
            compressed: 2,
            skipped: 1,
            discarded: 5,
            bytes_in: 100,
            bytes_out: 40,
            stopped: true,
            ..RunSummary::default()
        };
        let complete = serde_json::to_value(JsonMessage::complete(&summary)).unwrap();
        assert_eq!(complete["type"], "complete");
        assert_eq!(complete["files_processed"], 3);
        assert_eq!(complete["discarded"], 5);
        assert_eq!(complete["stopped"], Value::Bool(true));
    }

    #[test]
    fn test_messages_parse_back() {
        let line = serde_json::to_string(&JsonMessage::error("bad root".to_string(), None)).unwrap();
        let parsed: JsonMessage = serde_json::from_str(&line).unwrap();
        assert!(matches!(parsed, JsonMessage::Error { ref message, .. } if message == "bad root"));
    }
}

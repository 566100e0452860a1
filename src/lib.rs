//! # JPEG Batch Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per le GUI che incorporano il core
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del run e validazione parametri
//! - `error`: Tipi di errore custom
//! - `task`: Task, disposizioni ed esiti che attraversano la pipeline
//! - `file_manager`: Enumerazione dei file e scritture atomiche
//! - `classifier`: Decisione Skip / Copy / Compress per ogni file
//! - `image_processor`: Probe della larghezza e ricompressione JPEG
//! - `optimizer`: Controller, worker pool e aggregazione
//! - `progress`: Interfaccia reporter e statistiche
//! - `json_output`: Reporter JSON lines per front-end esterni
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use jpeg_batch_compressor::{ImageTranscoder, ProgressManager, RunConfig, RunController};
//!
//! let controller = RunController::new(Arc::new(ImageTranscoder::default()), Arc::new(ProgressManager::new()));
//! controller.start(RunConfig::new("/photos", "/photos-small"))?;
//! let summary = controller.wait().await;
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod task;

pub use config::RunConfig;
pub use error::{RunError, TranscodeError};
pub use image_processor::{ImageTranscoder, Transcoder};
pub use json_output::JsonReporter;
pub use optimizer::{RunController, RunState};
pub use progress::{ProgressManager, ProgressReporter, RunSummary, SilentReporter};
pub use task::{Disposition, Outcome, OutcomeKind, Task};

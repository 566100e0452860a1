//! # Optimizer Module
//!
//! Pipeline del run, separata in sottomoduli:
//! - `run_controller`: Macchina a stati Start/Stop e orchestrazione del run
//! - `worker_pool`: Coda limitata e worker concorrenti
//! - `task_optimizer`: Worker per singoli file
//! - `progress_tracker`: Aggregazione degli esiti
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod path_resolver;
pub mod progress_tracker;
pub mod run_controller;
pub mod task_optimizer;
pub mod worker_pool;

pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use run_controller::{stop_channel, RunController, RunState, StopHandle, StopSignal};
pub use task_optimizer::TaskOptimizer;
pub use worker_pool::{ProductionReport, WorkerPool};

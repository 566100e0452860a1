//! # JPEG Batch Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Creazione della configurazione e avvio del run controller
//! - Ctrl-C richiede uno stop cooperativo invece di terminare il processo
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, larghezza, worker, qualità)
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO o DEBUG a seconda del flag verbose)
//! 3. Avvia il run; errori di avvio terminano con exit code non zero
//! 4. Attende la fine del run o Ctrl-C (stop, poi attesa del drain)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! jpeg-compressor /path/to/photos /path/to/small --max-width 1080 --num-workers 8 --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jpeg_batch_compressor::{
    config::{default_workers, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_WIDTH},
    json_output::JsonMessage,
    ImageTranscoder, JsonReporter, ProgressManager, ProgressReporter, RunConfig, RunController,
};

#[derive(Parser)]
#[command(name = "jpeg-compressor")]
#[command(about = "Mirror a photo tree, shrinking JPEGs wider than a maximum width; safe to interrupt and re-run")]
struct Args {
    /// Directory containing the photos to compress
    input_dir: PathBuf,

    /// Directory receiving the mirrored tree (created if missing)
    output_dir: PathBuf,

    /// Maximum output width in pixels
    #[arg(short = 'w', long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// Number of parallel workers (defaults to available cores)
    #[arg(short = 'n', long)]
    num_workers: Option<usize>,

    /// JPEG quality used when re-encoding (1-100)
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Emit JSON lines on stdout instead of a progress bar
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let workers = args.num_workers.unwrap_or_else(default_workers).max(1);
    let config = RunConfig {
        max_width: args.max_width,
        workers,
        jpeg_quality: args.quality,
        queue_capacity: workers * 2,
        ..RunConfig::new(&args.input_dir, &args.output_dir)
    };

    let reporter: Arc<dyn ProgressReporter> = if args.json {
        Arc::new(JsonReporter)
    } else {
        Arc::new(ProgressManager::new())
    };
    let transcoder = Arc::new(ImageTranscoder::new(config.jpeg_quality));
    let controller = RunController::new(transcoder, reporter);

    if let Err(e) = controller.start(config) {
        if args.json {
            JsonMessage::error("Run could not start".to_string(), Some(e.to_string())).emit();
        }
        return Err(e).context("Failed to start compression run");
    }

    let controller = Arc::new(controller);
    let interrupt = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, waiting for in-flight files to finish (Ctrl-C again to abort)");
                controller.stop();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        })
    };

    let summary = controller.wait().await;
    interrupt.abort();

    if let Some(summary) = summary {
        if summary.failed > 0 {
            warn!("{} files could not be written, re-run to retry them", summary.failed);
        }
        if summary.stopped {
            info!("Run stopped; re-run the same command to resume");
        }
    }

    Ok(())
}

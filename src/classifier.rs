//! # File Classifier Module
//!
//! Decide cosa fare di un singolo file di input, senza toccare il worker pool.
//!
//! ## Regole (valutate in ordine):
//! 1. Calcola il path speculare sotto la output root (stesso nome file)
//! 2. Se l'output esiste già → `Skip` (resume: mai sovrascrivere)
//! 3. Estensione non JPEG (case-insensitive) → `Copy`
//! 4. Probe della larghezza: se ≤ `max_width` → `Copy`
//! 5. Altrimenti → `Compress`
//!
//! Le uniche operazioni sul filesystem sono il controllo di esistenza e il probe,
//! entrambi in sola lettura. Un probe fallito produce `Copy` con motivo
//! `ProbeFailed`, che il worker registra come fallback.

use crate::error::TranscodeError;
use crate::image_processor::Transcoder;
use crate::optimizer::path_resolver::PathResolver;
use crate::task::Disposition;
use std::path::{Path, PathBuf};

/// Extensions eligible for re-encoding, compared case-insensitively
pub const COMPRESSIBLE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Why the classifier picked a disposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    OutputExists,
    NotCompressible,
    WithinWidth { width: u32 },
    ProbeFailed(TranscodeError),
    TooWide { width: u32 },
}

/// Classifier verdict for one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub disposition: Disposition,
    pub output_path: PathBuf,
    pub reason: Reason,
}

/// Check if a file has a compressible extension
pub fn is_compressible(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| COMPRESSIBLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Decide the disposition of `input_path`
pub fn classify(
    input_path: &Path,
    relative_path: &Path,
    output_root: &Path,
    max_width: u32,
    transcoder: &dyn Transcoder,
) -> Classification {
    let output_path = PathResolver::mirrored_path(output_root, relative_path);

    // symlink_metadata so a dangling link at the output path still counts as present
    if output_path.symlink_metadata().is_ok() {
        return Classification {
            disposition: Disposition::Skip,
            output_path,
            reason: Reason::OutputExists,
        };
    }

    if !is_compressible(input_path) {
        return Classification {
            disposition: Disposition::Copy,
            output_path,
            reason: Reason::NotCompressible,
        };
    }

    let (disposition, reason) = match transcoder.probe_width(input_path) {
        Ok(width) if width <= max_width => (Disposition::Copy, Reason::WithinWidth { width }),
        Ok(width) => (Disposition::Compress, Reason::TooWide { width }),
        Err(e) => (Disposition::Copy, Reason::ProbeFailed(e)),
    };

    Classification {
        disposition,
        output_path,
        reason,
    }
}

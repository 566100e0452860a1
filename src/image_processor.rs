//! # Image Transcoder Module
//!
//! Questo modulo espone la capacità di transcodifica usata dai worker.
//!
//! ## Responsabilità:
//! - Definisce il trait `Transcoder` (probe della larghezza + compressione)
//! - Fornisce `ImageTranscoder`, implementazione in-process basata sul crate `image`
//! - Calcola le dimensioni di output preservando l'aspect ratio
//!
//! ## Strategia di compressione:
//! - **Solo resize**: la qualità resta alta (default 95), si riduce solo la larghezza
//! - **Lanczos3**: filtro di miglior qualità per il downscaling
//! - **Mai ingrandire**: se l'immagine è già abbastanza stretta viene solo ri-codificata
//!
//! ## Gestione errori:
//! - `Unreadable`: il file non si apre o non si decodifica
//! - `EncodeFailure`: la codifica JPEG fallisce
//!
//! Il worker tratta entrambi come "file non elaborabile" e ripiega su una copia.

use crate::error::TranscodeError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::ColorType;
use std::path::Path;
use tracing::debug;

/// Decode / downsample / re-encode capability consumed by the workers.
///
/// Implementations are called from blocking worker threads and must be shareable
/// across them.
pub trait Transcoder: Send + Sync {
    /// Pixel width of the image, ideally without decoding the pixel data
    fn probe_width(&self, path: &Path) -> Result<u32, TranscodeError>;

    /// Encoded bytes of the image downsampled to at most `max_width` pixels wide
    fn compress(&self, path: &Path, max_width: u32) -> Result<Vec<u8>, TranscodeError>;
}

/// Transcoder backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    jpeg_quality: u8,
}

impl ImageTranscoder {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_JPEG_QUALITY)
    }
}

impl Transcoder for ImageTranscoder {
    fn probe_width(&self, path: &Path) -> Result<u32, TranscodeError> {
        let reader = open_reader(path)?;
        let (width, _) = reader
            .into_dimensions()
            .map_err(|e| TranscodeError::Unreadable(format!("{}: {}", path.display(), e)))?;
        Ok(width)
    }

    fn compress(&self, path: &Path, max_width: u32) -> Result<Vec<u8>, TranscodeError> {
        let image = open_reader(path)?
            .decode()
            .map_err(|e| TranscodeError::Unreadable(format!("{}: {}", path.display(), e)))?;

        let (width, height) = (image.width(), image.height());
        let (target_width, target_height) = scaled_dimensions(width, height, max_width);

        let image = if target_width < width {
            debug!(
                "Resizing {} from {}x{} to {}x{}",
                path.display(),
                width,
                height,
                target_width,
                target_height
            );
            image.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| TranscodeError::EncodeFailure(format!("{}: {}", path.display(), e)))?;

        Ok(buffer)
    }
}

/// Open an image and detect its format from the content rather than the extension
fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, TranscodeError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| TranscodeError::Unreadable(format!("{}: {}", path.display(), e)))
}

/// Output dimensions for an image constrained to `max_width`, never enlarging
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let ratio = max_width as f64 / width as f64;
    let scaled_height = ((height as f64) * ratio).round().max(1.0) as u32;
    (max_width, scaled_height)
}

//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e le scritture su disco.
//!
//! ## Responsabilità:
//! - Enumerazione ricorsiva e lazy dei file di input (`TaskEnumerator`)
//! - Calcolo del path relativo di ogni file per la struttura speculare
//! - Scritture atomiche (file temporaneo + rename) per copie e output compressi
//! - Formattazione human-readable delle dimensioni
//!
//! ## Regole di enumerazione:
//! - Visita depth-first, nomi ordinati all'interno di ogni directory
//! - Solo file regolari: directory, symlink e file speciali non producono task
//! - Se la output root sta dentro la input root, quel sottoalbero viene escluso
//! - Entry illeggibili vengono loggate e ignorate
//!
//! ## Sicurezza operazioni:
//! - Un output esistente è sempre completo: si scrive in un temporaneo nella
//!   stessa directory e poi si rinomina sul path finale
//! - I permessi dell'output vengono copiati dal file sorgente
//!
//! ## Esempio:
//! ```rust,ignore
//! let enumerator = TaskEnumerator::new(Path::new("/photos"))?;
//! for task in enumerator.tasks() {
//!     println!("{} -> {}", task.index, task.relative_path.display());
//! }
//! ```

use crate::error::RunError;
use crate::optimizer::path_resolver::PathResolver;
use crate::task::Task;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Produces one `Task` per regular file under an input root
#[derive(Debug, Clone)]
pub struct TaskEnumerator {
    input_root: PathBuf,
    excluded: Option<PathBuf>,
}

impl TaskEnumerator {
    /// Validate and canonicalize the input root
    pub fn new(input_root: &Path) -> Result<Self, RunError> {
        let is_dir = fs::metadata(input_root).map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(RunError::InvalidInputRoot(input_root.to_path_buf()));
        }
        let input_root = input_root
            .canonicalize()
            .map_err(|_| RunError::InvalidInputRoot(input_root.to_path_buf()))?;

        Ok(Self {
            input_root,
            excluded: None,
        })
    }

    /// Prune `dir` from the walk when it lies inside the input root
    pub fn excluding(mut self, dir: &Path) -> Self {
        if dir.starts_with(&self.input_root) && dir != self.input_root {
            debug!("Excluding output tree from enumeration: {}", dir.display());
            self.excluded = Some(dir.to_path_buf());
        }
        self
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    /// Fresh lazy pass over the tree; every call starts a new walk
    pub fn tasks(&self) -> impl Iterator<Item = Task> + Send + 'static {
        let root = self.input_root.clone();
        let excluded = self.excluded.clone();

        WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| match &excluded {
                Some(dir) => entry.path() != dir.as_path(),
                None => true,
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let relative_path = PathResolver::relative_path(&root, entry.path())?;
                Some((entry.into_path(), relative_path))
            })
            .enumerate()
            .map(|(index, (input_path, relative_path))| Task {
                index: index as u64,
                input_path,
                relative_path,
            })
    }
}

/// Manages output writes and size formatting
pub struct FileManager;

impl FileManager {
    /// Byte-for-byte copy of `source` onto `dest`, atomically. Returns bytes written.
    pub fn copy_atomic(source: &Path, dest: &Path) -> io::Result<u64> {
        let mut temp = Self::temp_beside(dest)?;
        let mut input = File::open(source)?;
        let written = io::copy(&mut input, temp.as_file_mut())?;
        Self::persist(temp, source, dest)?;
        Ok(written)
    }

    /// Write `bytes` onto `dest` atomically, taking permissions from `source`
    pub fn write_atomic(source: &Path, dest: &Path, bytes: &[u8]) -> io::Result<u64> {
        let mut temp = Self::temp_beside(dest)?;
        temp.write_all(bytes)?;
        Self::persist(temp, source, dest)?;
        Ok(bytes.len() as u64)
    }

    fn temp_beside(dest: &Path) -> io::Result<NamedTempFile> {
        PathResolver::ensure_parent_dirs(dest)?;
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        NamedTempFile::new_in(dir)
    }

    fn persist(temp: NamedTempFile, source: &Path, dest: &Path) -> io::Result<()> {
        temp.as_file().sync_all()?;
        if let Ok(metadata) = fs::metadata(source) {
            fs::set_permissions(temp.path(), metadata.permissions())?;
        }
        temp.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

//! # Path Resolution Module
//!
//! Centralizza la logica di calcolo dei path speculari.
//! Il path relativo di un input viene rigiocato sotto la output root
//! senza cambiare nome né estensione.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Path relativo di un file rispetto alla root di input
    pub fn relative_path(input_root: &Path, input_path: &Path) -> Option<PathBuf> {
        input_path
            .strip_prefix(input_root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Path speculare: `output_root` + path relativo
    pub fn mirrored_path(output_root: &Path, relative_path: &Path) -> PathBuf {
        output_root.join(relative_path)
    }

    /// Crea le directory parent se necessario (idempotente)
    pub fn ensure_parent_dirs(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                debug!("Creating output directory: {}", parent.display());
            }
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mirrored_path_keeps_nesting_and_name() {
        let relative = PathResolver::relative_path(Path::new("/root"), Path::new("/root/a/b/c.jpg")).unwrap();
        assert_eq!(relative, PathBuf::from("a/b/c.jpg"));
        assert_eq!(
            PathResolver::mirrored_path(Path::new("/out"), &relative),
            PathBuf::from("/out/a/b/c.jpg")
        );
    }

    #[test]
    fn test_relative_path_outside_root() {
        assert!(PathResolver::relative_path(Path::new("/root"), Path::new("/elsewhere/x.jpg")).is_none());
        assert!(PathResolver::relative_path(Path::new("/root"), Path::new("/root")).is_none());
    }

    #[test]
    fn test_ensure_parent_dirs_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b").join("c.jpg");

        PathResolver::ensure_parent_dirs(&target).unwrap();
        assert!(temp_dir.path().join("a/b").is_dir());

        PathResolver::ensure_parent_dirs(&target).unwrap();
        assert!(!target.exists());
    }
}

//! Path management for Picsou
//!
//! ## Path Resolution Order
//!
//! 1. `PICSOU_DATA_DIR` environment variable (if set)
//! 2. The platform configuration directory from `directories::ProjectDirs`
//!    (`~/.config/picsou` on Linux)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{PicsouError, PicsouResult};

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "PICSOU_DATA_DIR";

/// Default document file name inside the data directory
pub const DEFAULT_DOCUMENT: &str = "picsou.json";

/// Manages all paths used by Picsou
#[derive(Debug, Clone)]
pub struct PicsouPaths {
    base_dir: PathBuf,
}

impl PicsouPaths {
    /// Resolve the base directory from the environment or the platform
    pub fn new() -> PicsouResult<Self> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) => PathBuf::from(custom),
            None => resolve_default_path()?,
        };
        Ok(Self { base_dir })
    }

    /// Create PicsouPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding documents
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Document used when no `--file` is given and settings name none
    pub fn default_document(&self) -> PathBuf {
        self.data_dir().join(DEFAULT_DOCUMENT)
    }

    /// Create the base and data directories
    pub fn ensure_directories(&self) -> PicsouResult<()> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| PicsouError::Io(format!("Failed to create base directory: {}", e)))?;
        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| PicsouError::Io(format!("Failed to create data directory: {}", e)))?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> PicsouResult<PathBuf> {
    ProjectDirs::from("", "", "picsou")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| PicsouError::Config("Could not determine a home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = PicsouPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(
            paths.default_document(),
            temp_dir.path().join("data").join("picsou.json")
        );
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(DATA_DIR_ENV, temp_dir.path());

        let paths = PicsouPaths::new().unwrap();
        assert_eq!(paths.base_dir(), temp_dir.path());

        std::env::remove_var(DATA_DIR_ENV);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = PicsouPaths::with_base_dir(temp_dir.path().join("nested"));

        assert!(!paths.is_initialized());
        paths.ensure_directories().unwrap();
        assert!(paths.data_dir().exists());
    }
}

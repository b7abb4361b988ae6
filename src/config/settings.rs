//! User settings for Picsou
//!
//! Holds the key-derivation cost used for new users and password changes,
//! the document opened by default, and import/export preferences.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::paths::PicsouPaths;
use crate::crypto::KdfCost;
use crate::error::{PicsouError, PicsouResult};
use crate::storage::file_io::{read_json, write_json_atomic};

/// User settings for Picsou
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Document used when `--file` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_document: Option<PathBuf>,

    /// Argon2id cost for new key wraps
    #[serde(default)]
    pub kdf: KdfCost,

    /// Field delimiter for CSV import/export
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

fn default_schema_version() -> u32 {
    1
}

fn default_csv_delimiter() -> char {
    ','
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            default_document: None,
            kdf: KdfCost::default(),
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if the file doesn't exist yet
    pub fn load_or_create(paths: &PicsouPaths) -> PicsouResult<Self> {
        read_json(paths.settings_file()).map_err(|e| match e {
            PicsouError::Storage(msg) => {
                PicsouError::Config(format!("Failed to load settings: {}", msg))
            }
            other => other,
        })
    }

    pub fn save(&self, paths: &PicsouPaths) -> PicsouResult<()> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Document path to use when none is given on the command line
    pub fn document_path(&self, paths: &PicsouPaths) -> PathBuf {
        self.default_document
            .clone()
            .unwrap_or_else(|| paths.default_document())
    }

    /// CSV delimiter as the single byte the csv crate expects
    pub fn csv_delimiter_byte(&self) -> PicsouResult<u8> {
        u8::try_from(self.csv_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PicsouError::Config(format!(
                    "CSV delimiter must be an ASCII character, got {:?}",
                    self.csv_delimiter
                ))
            })
    }
}

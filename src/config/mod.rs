//! Configuration module for Picsou
//!
//! - Base directory resolution
//! - Settings persistence (KDF cost, default document, CSV delimiter)

pub mod paths;
pub mod settings;

pub use paths::PicsouPaths;
pub use settings::Settings;

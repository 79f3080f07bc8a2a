use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("IO error while {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Cannot read content directory {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    #[error("Failed to load theme '{locator}': {message}")]
    ThemeLoad { locator: String, message: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Component parse error: {message}")]
    ComponentParse { message: String },

    #[error("Unknown component '{name}'")]
    UnknownComponent { name: String },

    #[error("Component render error in '{name}': {message}")]
    ComponentRender { name: String, message: String },

    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, FolioError>;

pub trait IoContext<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| FolioError::Io {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

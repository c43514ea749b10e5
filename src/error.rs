//! Error types for the clone pipeline.
//!
//! Only [`CloneError`] is fatal to a job. [`FetchError`] is scoped to a single
//! asset and is reported as a warning while the pipeline carries on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a clone job
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CloneError {
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while retrieving a single asset
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Errors raised by a snapshot provider
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Page returned HTTP {0}")]
    Status(u16),
    #[error("Page did not load within {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_converts_into_clone_error() {
        let err: CloneError = RenderError::Status(502).into();
        assert_eq!(err.to_string(), "Render failed: Page returned HTTP 502");
    }

    #[test]
    fn test_write_error_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CloneError::write("/tmp/out/index.html", io);
        let message = err.to_string();
        assert!(message.contains("index.html"));
        assert!(message.contains("denied"));
    }
}

//! Error types for Fitmark operations.
//!
//! This module defines the main error type [`FitmarkError`] which represents
//! everything that can go wrong while parsing, pruning, or rendering a
//! document. The public generation entry points never return these errors
//! directly; they are folded into an error-bearing
//! [`GenerationResult`](crate::GenerationResult) instead.
//!
//! # Example
//!
//! ```rust
//! use fitmark_core::{FitmarkError, Result};
//!
//! fn require_markup(html: &str) -> Result<&str> {
//!     if html.is_empty() {
//!         return Err(FitmarkError::HtmlParseError("empty document".to_string()));
//!     }
//!     Ok(html)
//! }
//!
//! assert!(require_markup("").is_err());
//! ```

use thiserror::Error;

/// Main error type for content pruning and Markdown generation.
#[derive(Error, Debug)]
pub enum FitmarkError {
    /// HTML parsing errors.
    ///
    /// Returned when the parsed tree is unusable, e.g. no element could be
    /// found to anchor the walk.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// The rendering collaborator failed to turn HTML into Markdown.
    #[error("Failed to render Markdown: {0}")]
    RenderError(String),

    /// Configuration values that cannot be honored.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// File write errors.
    ///
    /// Wraps standard I/O errors for file operations.
    #[error("Failed to write to file: {0}")]
    WriteError(#[from] std::io::Error),

    /// JSON (de)serialization of configuration or results failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for FitmarkError.
///
/// This is a convenience alias for `std::result::Result<T, FitmarkError>`.
pub type Result<T> = std::result::Result<T, FitmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FitmarkError::InvalidConfig("unknown threshold type: sometimes".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_render_error_display() {
        let err = FitmarkError::RenderError("bad token".to_string());
        assert_eq!(err.to_string(), "Failed to render Markdown: bad token");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: FitmarkError = io.into();
        assert!(matches!(err, FitmarkError::WriteError(_)));
        assert!(err.to_string().contains("disk full"));
    }
}

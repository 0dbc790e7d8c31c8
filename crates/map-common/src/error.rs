//! Error types for the map generation pipeline.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// How far a failure reaches within a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Abort the whole product for this run.
    Batch,
    /// Skip one (variant, resolution) unit and carry on with the rest.
    Unit,
}

/// Primary error type for map generation.
#[derive(Debug, Error)]
pub enum MapError {
    // === Data Errors ===
    #[error("Dataset '{0}' has no usable samples")]
    EmptyDataset(String),

    #[error("Invalid sample on line {line}: {message}")]
    InvalidSample { line: usize, message: String },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid color ramp: {0}")]
    InvalidRamp(String),

    // === Rendering Errors ===
    #[error(
        "Layer '{layer}' is {actual_width}x{actual_height}, canvas is {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        layer: String,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferLength { expected: usize, actual: usize },

    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    // === External Tool Errors ===
    #[error("Rasterizer failed: {0}")]
    Rasterizer(String),

    #[error("Rasterizer timed out after {0:?}")]
    RasterizerTimeout(Duration),

    #[error("Worker task failed: {0}")]
    Worker(String),

    // === Configuration Errors ===
    #[error("Invalid resolution '{0}', expected WIDTHxHEIGHT")]
    InvalidResolution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl MapError {
    /// Classify the error for the dispatcher's skip-or-abort decision.
    ///
    /// Anything that invalidates the shared inputs of a product (its samples,
    /// grid, ramp or configuration) is batch-fatal; everything that only touches
    /// one rendered size is unit-fatal.
    pub fn scope(&self) -> ErrorScope {
        match self {
            MapError::EmptyDataset(_)
            | MapError::InvalidSample { .. }
            | MapError::InvalidGrid(_)
            | MapError::InvalidRamp(_)
            | MapError::Config(_) => ErrorScope::Batch,

            MapError::DimensionMismatch { .. }
            | MapError::PixelBufferLength { .. }
            | MapError::InvalidBitmap(_)
            | MapError::Compression(_)
            | MapError::Rasterizer(_)
            | MapError::RasterizerTimeout(_)
            | MapError::Worker(_)
            | MapError::InvalidResolution(_)
            | MapError::Io(_) => ErrorScope::Unit,
        }
    }

    /// Shorthand for a dimension mismatch between a layer and its canvas.
    pub fn dimension_mismatch(
        layer: impl Into<String>,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> Self {
        MapError::DimensionMismatch {
            layer: layer.into(),
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for MapError {
    fn from(err: std::io::Error) -> Self {
        MapError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Config(format!("JSON error: {}", err))
    }
}

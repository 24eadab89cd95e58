//! Error types for the map layer.

use thiserror::Error;

/// Map layer error type
#[derive(Error, Debug)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("map header not found")]
    MissingHeader,

    #[error("failed to parse map header, expected `<width> <height> <resolution>`")]
    MalformedHeader,

    #[error("map dimensions must be positive")]
    InvalidDimensions,

    #[error("map resolution must be positive")]
    InvalidResolution,

    #[error("failed to parse map cell value `{0}`")]
    MalformedCell(String),

    #[error("map file ended after {got} of {expected} cells")]
    TruncatedCells { got: usize, expected: usize },

    #[error("cell buffer holds {got} values but metadata describes {expected}")]
    SizeMismatch { got: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, MapError>;

//! Centralized CLI error handling with user-friendly messages.

use thiserror::Error;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    /// The pyramid build or tile access failed.
    #[error("{0}")]
    Pyramid(#[from] gigatile::PyramidError),

    /// The input could not be decoded at all.
    #[error("{0}")]
    Decoder(#[from] gigatile::DecoderError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the extracted tile image failed.
    #[error("could not write tile image: {0}")]
    Image(String),

    /// Bad command-line usage not caught by the parser.
    #[error("{0}")]
    Usage(String),
}

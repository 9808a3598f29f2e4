//! Error types for pyramid construction and tile access.
//!
//! A build carries a single sticky failure: once any operation fails,
//! every later operation on the same pyramid returns a clone of the
//! original error. All variants therefore hold owned, cloneable data
//! rather than source errors.

use thiserror::Error;

/// Errors surfaced by the pyramid builder and tile provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PyramidError {
    /// File create/preallocate/map/truncate/fsync failure. Fatal to the build.
    #[error("I/O error: {0}")]
    Io(String),

    /// The decoder reported a non-recoverable error. Fatal to the build.
    #[error("decoder error: {0}")]
    Decoder(String),

    /// The build was cancelled before completion.
    #[error("build cancelled")]
    Cancelled,

    /// Tile request outside the pyramid's level/row/col range. Non-fatal.
    #[error("tile out of range: level {level}, row {row}, col {col}")]
    OutOfRange { level: usize, row: u32, col: u32 },
}

impl From<std::io::Error> for PyramidError {
    fn from(err: std::io::Error) -> Self {
        PyramidError::Io(err.to_string())
    }
}

/// Errors reported by decoder adapters.
///
/// "Needs more input" is not an error in the streaming contract; the
/// scanline trait expresses it by decoding zero rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecoderError {
    /// Malformed header or irrecoverable data corruption.
    #[error("corrupt image data: {0}")]
    Corrupt(String),

    /// The input is not a format this adapter handles.
    #[error("unsupported image format: {0}")]
    Unsupported(String),

    /// End of input before the full image was decoded.
    #[error("truncated image stream")]
    Truncated,
}

impl From<DecoderError> for PyramidError {
    fn from(err: DecoderError) -> Self {
        PyramidError::Decoder(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = PyramidError::from(io);
        assert_eq!(err, PyramidError::Io("no such file".to_string()));
    }

    #[test]
    fn test_decoder_error_conversion() {
        let err = PyramidError::from(DecoderError::Truncated);
        assert_eq!(
            format!("{}", err),
            "decoder error: truncated image stream"
        );
    }

    #[test]
    fn test_out_of_range_display() {
        let err = PyramidError::OutOfRange {
            level: 2,
            row: 4,
            col: 7,
        };
        assert_eq!(format!("{}", err), "tile out of range: level 2, row 4, col 7");
    }
}

//! Error types for OxiBench operations.
//!
//! A single error type covers codec stream validation, parameter checks,
//! image comparison and experiment execution. Codec calls fail as a whole;
//! the experiment runner catches errors per configuration and records them.

use std::io;
use thiserror::Error;

/// The main error type for OxiBench operations.
#[derive(Debug, Error)]
pub enum OxiBenchError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stream ended before a field or code could be read completely.
    #[error("Truncated stream: needed {needed} more bits at bit position {bit_position}")]
    TruncatedStream {
        /// Number of bits that were still required.
        needed: u64,
        /// Bit position where reading stopped.
        bit_position: u64,
    },

    /// A bit pattern or table that cannot appear in a valid stream.
    #[error("Invalid code at bit position {bit_position}: {message}")]
    InvalidCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
        /// Description of what was wrong.
        message: String,
    },

    /// Wavelet family name not present in the registry.
    #[error("Unsupported wavelet: {name}")]
    UnsupportedWavelet {
        /// The requested family name.
        name: String,
    },

    /// Parameter outside its valid range.
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// Two images that must share a shape do not.
    #[error(
        "Dimension mismatch: {expected_width}x{expected_height}x{expected_channels} vs {found_width}x{found_height}x{found_channels}"
    )]
    DimensionMismatch {
        /// Width of the reference image.
        expected_width: usize,
        /// Height of the reference image.
        expected_height: usize,
        /// Channels of the reference image.
        expected_channels: usize,
        /// Width of the compared image.
        found_width: usize,
        /// Height of the compared image.
        found_height: usize,
        /// Channels of the compared image.
        found_channels: usize,
    },

    /// Invalid stream header.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// A working buffer could not be allocated.
    #[error("Resource exhausted: could not reserve {requested} bytes")]
    ResourceExhausted {
        /// Number of bytes requested.
        requested: usize,
    },

    /// A configuration failed inside a worker.
    #[error("Worker failure for {configuration}: {reason}")]
    WorkerFailure {
        /// Label of the failing configuration.
        configuration: String,
        /// Failure description.
        reason: String,
    },

    /// The batch was cancelled before the configuration ran.
    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias for OxiBench operations.
pub type Result<T> = std::result::Result<T, OxiBenchError>;

impl OxiBenchError {
    /// Create a truncated stream error.
    pub fn truncated(needed: u64, bit_position: u64) -> Self {
        Self::TruncatedStream {
            needed,
            bit_position,
        }
    }

    /// Create an invalid code error.
    pub fn invalid_code(bit_position: u64, message: impl Into<String>) -> Self {
        Self::InvalidCode {
            bit_position,
            message: message.into(),
        }
    }

    /// Create an unsupported wavelet error.
    pub fn unsupported_wavelet(name: impl Into<String>) -> Self {
        Self::UnsupportedWavelet { name: name.into() }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error from `(width, height, channels)` shapes.
    pub fn dimension_mismatch(
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    ) -> Self {
        Self::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            expected_channels: expected.2,
            found_width: found.0,
            found_height: found.1,
            found_channels: found.2,
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a resource exhausted error.
    pub fn resource_exhausted(requested: usize) -> Self {
        Self::ResourceExhausted { requested }
    }

    /// Create a worker failure error.
    pub fn worker_failure(configuration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerFailure {
            configuration: configuration.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Whether the error describes a corrupt or truncated codec stream.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. } | Self::InvalidCode { .. } | Self::InvalidHeader { .. }
        )
    }
}

/// Reserve a zero-filled buffer, reporting allocation failure as an error.
pub fn try_alloc<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| OxiBenchError::resource_exhausted(len.saturating_mul(size_of::<T>())))?;
    buf.resize(len, T::default());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiBenchError::truncated(8, 120);
        assert!(err.to_string().contains("Truncated stream"));

        let err = OxiBenchError::unsupported_wavelet("mexh");
        assert!(err.to_string().contains("mexh"));

        let err = OxiBenchError::dimension_mismatch((8, 8, 1), (8, 4, 1));
        assert!(err.to_string().contains("8x8x1 vs 8x4x1"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiBenchError = io_err.into();
        assert!(matches!(err, OxiBenchError::Io(_)));
    }

    #[test]
    fn test_classification() {
        assert!(OxiBenchError::resource_exhausted(1 << 40).is_transient());
        assert!(!OxiBenchError::Cancelled.is_transient());
        assert!(OxiBenchError::invalid_code(0, "bad").is_format_error());
        assert!(!OxiBenchError::invalid_parameter("step", "negative").is_format_error());
    }

    #[test]
    fn test_try_alloc() {
        let buf: Vec<f64> = try_alloc(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&v| v == 0.0));

        let err = try_alloc::<u64>(usize::MAX / 4).unwrap_err();
        assert!(err.is_transient());
    }
}

//! Error types for buffer construction and codec calls.

use std::io;

use thiserror::Error;

use crate::limits::LimitExceeded;

/// Errors from constructing or copying an [`ImageBuffer`](crate::ImageBuffer).
///
/// A failed allocation never produces a buffer; decode failures are the one
/// exception and are stored inside [`ImageBuffer::Failed`](crate::ImageBuffer::Failed)
/// instead of being returned as this type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BufferError {
    /// Width or height is not positive, or the channel count is outside `1..=4`.
    #[error("invalid dimensions {width}x{height} with {channels} channels")]
    InvalidDimension {
        /// Requested width.
        width: i64,
        /// Requested height.
        height: i64,
        /// Requested channel count.
        channels: i64,
    },
    /// Pixel memory could not be obtained (or its size overflows `usize`).
    #[error("failed to allocate {bytes} bytes of pixel memory")]
    AllocationFailure {
        /// Requested allocation size, saturated at `usize::MAX`.
        bytes: usize,
    },
    /// Row stride is smaller than `width * channels`.
    #[error("stride {stride} is smaller than row size {row_bytes}")]
    StrideTooSmall {
        /// Given stride in bytes.
        stride: usize,
        /// Minimum row size in bytes.
        row_bytes: usize,
    },
    /// Pixel data is too short for the given dimensions and stride.
    #[error("pixel data has {len} bytes, needs {required}")]
    InsufficientData {
        /// Bytes supplied.
        len: usize,
        /// Bytes required.
        required: usize,
    },
    /// The codec rejected the input. Carries the codec's reason verbatim.
    #[error("{0}")]
    DecodeFailure(String),
    /// The buffer holds no pixel data.
    #[error("buffer has no pixel data")]
    InvalidState,
}

/// Failure reported by a [`Codec`](crate::Codec).
///
/// The `Display` text is the human-readable reason that ends up in a
/// [`Failed`](crate::ImageBuffer::Failed) buffer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Reading or writing the underlying file failed.
    #[error("can't open {path}: {source}")]
    Io {
        /// Path that was being accessed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The format (or the pixel layout for that format) is not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The input is corrupt or not an image.
    #[error("{0}")]
    Malformed(String),
    /// Pixel data handed to or returned by the codec did not fit a buffer.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// A configured resource limit was exceeded.
    #[error(transparent)]
    Limit(#[from] LimitExceeded),
    /// Arguments were rejected before reaching the codec.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl CodecError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

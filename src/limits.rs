//! Resource limits for gateway decode and encode calls.
//!
//! [`ResourceLimits`] caps what a single decode or encode may consume.
//! [`LimitExceeded`] is returned when a check fails. The gateway checks
//! the input size first, then probed dimensions, so oversized images are
//! rejected before any pixel memory is allocated.

use thiserror::Error;

use crate::ImageInfo;

/// Resource limits for decode/encode operations.
///
/// All fields are optional; `None` means no limit for that resource.
///
/// # Example
///
/// ```
/// use zenraster::ResourceLimits;
///
/// let limits = ResourceLimits::none()
///     .with_max_pixels(64_000_000)
///     .with_max_memory(256 * 1024 * 1024);
/// assert!(limits.has_any());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResourceLimits {
    /// Maximum total pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum decoded pixel memory in bytes.
    pub max_memory_bytes: Option<u64>,
    /// Maximum encoded output size in bytes (encode only).
    pub max_output_bytes: Option<u64>,
    /// Maximum image width in pixels.
    pub max_width: Option<u32>,
    /// Maximum image height in pixels.
    pub max_height: Option<u32>,
    /// Maximum input size in bytes (decode only).
    pub max_file_size: Option<u64>,
}

impl ResourceLimits {
    /// No limits (all fields `None`).
    pub fn none() -> Self {
        Self::default()
    }

    /// Set maximum total pixels.
    pub fn with_max_pixels(mut self, max: u64) -> Self {
        self.max_pixels = Some(max);
        self
    }

    /// Set maximum decoded pixel memory in bytes.
    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Set maximum encoded output size in bytes.
    pub fn with_max_output(mut self, bytes: u64) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }

    /// Set maximum image width in pixels.
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Set maximum image height in pixels.
    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    /// Set maximum input size in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Whether any limits are set.
    pub fn has_any(&self) -> bool {
        self.bounds_image()
            || self.max_output_bytes.is_some()
            || self.max_file_size.is_some()
    }

    /// Whether a decode needs the header probed before pixels are decoded.
    pub fn bounds_image(&self) -> bool {
        self.max_width.is_some()
            || self.max_height.is_some()
            || self.max_pixels.is_some()
            || self.max_memory_bytes.is_some()
    }

    // --- Checks ---

    /// Check probed geometry before decode.
    ///
    /// Width, height and pixel count are checked in that order, then the
    /// decoded size at `channels` bytes per pixel.
    pub fn check_image_info(&self, info: &ImageInfo, channels: usize) -> Result<(), LimitExceeded> {
        let (w, h) = (info.width, info.height);
        within(w, self.max_width, |actual, max| LimitExceeded::Width { actual, max })?;
        within(h, self.max_height, |actual, max| LimitExceeded::Height { actual, max })?;
        let pixels = u64::from(w) * u64::from(h);
        within(pixels, self.max_pixels, |actual, max| LimitExceeded::Pixels { actual, max })?;
        let bytes = pixels.saturating_mul(channels as u64);
        within(bytes, self.max_memory_bytes, |actual, max| LimitExceeded::Memory { actual, max })
    }

    /// Check the encoded input length before decode.
    pub fn check_file_size(&self, bytes: u64) -> Result<(), LimitExceeded> {
        within(bytes, self.max_file_size, |actual, max| LimitExceeded::FileSize { actual, max })
    }

    /// Check the encoded output length before it is written.
    pub fn check_output_size(&self, bytes: u64) -> Result<(), LimitExceeded> {
        within(bytes, self.max_output_bytes, |actual, max| {
            LimitExceeded::OutputSize { actual, max }
        })
    }
}

fn within<T: PartialOrd + Copy>(
    actual: T,
    max: Option<T>,
    exceeded: impl FnOnce(T, T) -> LimitExceeded,
) -> Result<(), LimitExceeded> {
    match max {
        Some(max) if actual > max => Err(exceeded(actual, max)),
        _ => Ok(()),
    }
}

/// A resource limit was exceeded.
///
/// Each variant carries the actual value and the limit that was exceeded.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LimitExceeded {
    /// Image width exceeded `max_width`.
    #[error("width {actual} exceeds limit {max}")]
    Width {
        /// Actual width.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Image height exceeded `max_height`.
    #[error("height {actual} exceeds limit {max}")]
    Height {
        /// Actual height.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Pixel count exceeded `max_pixels`.
    #[error("pixel count {actual} exceeds limit {max}")]
    Pixels {
        /// Actual pixel count.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Memory exceeded `max_memory_bytes`.
    #[error("memory {actual} bytes exceeds limit {max}")]
    Memory {
        /// Estimated memory in bytes.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Input size exceeded `max_file_size`.
    #[error("file size {actual} bytes exceeds limit {max}")]
    FileSize {
        /// Actual input size in bytes.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Encoded output exceeded `max_output_bytes`.
    #[error("output size {actual} bytes exceeds limit {max}")]
    OutputSize {
        /// Actual output size in bytes.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
}

//! Image metadata returned by probing and decoding.

use crate::{ChannelLayout, ImageFormat};

/// Header-level facts about an encoded image.
///
/// Obtained without materializing pixel data.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Native channel count (1=gray, 2=gray+alpha, 3=RGB, 4=RGBA).
    pub channels: u8,
    /// Detected container format, if the codec reports one.
    pub format: Option<ImageFormat>,
}

impl ImageInfo {
    /// Create a new `ImageInfo` with no format attached.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
            format: None,
        }
    }

    /// Set the detected format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Channel layout for the native channel count, if it is one of the four
    /// supported layouts.
    pub fn layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(i32::from(self.channels))
    }

    /// `(width, height, channels)` as reported by the probe.
    pub fn dimensions(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.channels)
    }
}

//! Encode and decode output types.

use crate::{ChannelLayout, ImageFormat, ImageInfo};

/// Output from an encode operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOutput {
    data: Vec<u8>,
    format: ImageFormat,
}

impl EncodeOutput {
    /// Create a new encode output.
    pub fn new(data: Vec<u8>, format: ImageFormat) -> Self {
        Self { data, format }
    }

    /// Consume and return the encoded bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Borrow the encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Encoded byte count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the output is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The format that was used for encoding.
    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl AsRef<[u8]> for EncodeOutput {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Output from a decode operation: tightly packed 8-bit pixels plus the
/// geometry they were decoded at.
///
/// `layout` is the resolved channel layout (the forced one, if the caller
/// asked for a conversion), which may differ from `info.channels`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeOutput {
    pixels: Vec<u8>,
    layout: ChannelLayout,
    info: ImageInfo,
}

impl DecodeOutput {
    /// Create a new decode output.
    pub fn new(pixels: Vec<u8>, layout: ChannelLayout, info: ImageInfo) -> Self {
        Self {
            pixels,
            layout,
            info,
        }
    }

    /// Image metadata.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Channel layout of the decoded pixels.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Borrow the decoded pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume and return the pixel bytes with their layout and metadata.
    pub fn into_parts(self) -> (Vec<u8>, ChannelLayout, ImageInfo) {
        (self.pixels, self.layout, self.info)
    }
}

//! The codec seam.
//!
//! [`Codec`] is the boundary to whatever library does the byte-level format
//! work. The gateway never parses image bytes itself; it only moves pixels
//! between [`ImageBuffer`](crate::ImageBuffer)s and a `Codec`, and turns the
//! codec's failures into buffer state or boolean results.
//!
//! [`ImageCodec`](crate::ImageCodec) is the production implementation.
//! Tests substitute their own.

use std::fs;
use std::path::Path;

use crate::{
    ChannelLayout, CodecError, DecodeOutput, EncodeOutput, ImageFormat, ImageInfo, PixelSlice,
};

/// Format decode/encode collaborator.
///
/// Implementations return failures by value, so a failure reason is never
/// shared between calls. The gateway still serializes calls into a codec,
/// so implementations need not be reentrant.
pub trait Codec: Send {
    /// Formats this codec can decode, in display order.
    fn supported_formats(&self) -> &'static [ImageFormat];

    /// Probe dimensions and native channel count (header parse only).
    ///
    /// This MUST NOT decode pixels.
    fn probe_header(&self, data: &[u8]) -> Result<ImageInfo, CodecError>;

    /// Probe a file.
    ///
    /// Default: reads the whole file and delegates to
    /// [`probe_header`](Codec::probe_header). Codecs that can stop after the
    /// header should override.
    fn probe_path(&self, path: &Path) -> Result<ImageInfo, CodecError> {
        let data = fs::read(path).map_err(|e| CodecError::io(path, e))?;
        self.probe_header(&data)
    }

    /// Decode to tightly packed 8-bit pixels.
    ///
    /// `channels` of `None` keeps the native channel count; `Some` converts
    /// to that layout.
    fn decode(
        &self,
        data: &[u8],
        channels: Option<ChannelLayout>,
    ) -> Result<DecodeOutput, CodecError>;

    /// Decode a file.
    ///
    /// Default: reads the file and delegates to [`decode`](Codec::decode).
    fn decode_path(
        &self,
        path: &Path,
        channels: Option<ChannelLayout>,
    ) -> Result<DecodeOutput, CodecError> {
        let data = fs::read(path).map_err(|e| CodecError::io(path, e))?;
        self.decode(&data, channels)
    }

    /// Encode pixels. `quality` is already clamped to `1..=100` and only
    /// meaningful for [`ImageFormat::Jpeg`].
    fn encode(
        &self,
        pixels: PixelSlice<'_>,
        format: ImageFormat,
        quality: u8,
    ) -> Result<EncodeOutput, CodecError>;
}

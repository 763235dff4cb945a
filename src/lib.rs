//! In-memory 8-bit raster images and a gateway to an image codec.
//!
//! - [`ImageBuffer`]: an image that is empty, loaded with pixels, or failed
//!   with a decode reason
//! - [`Raster`]: the owned pixel grid behind a loaded buffer
//! - [`CodecGateway`]: decode files or memory into buffers, probe headers,
//!   and encode buffers or raw pixel memory to PNG, BMP, TGA or JPEG
//! - [`Codec`]: the seam to the library doing the format work;
//!   [`ImageCodec`] is the production implementation
//! - [`ResourceLimits`]: caps on input size, dimensions and memory
//!
//! Pixels are 8-bit, interleaved, row-major with no padding. Channel counts
//! 1 through 4 map to gray, gray+alpha, RGB and RGBA.

#![forbid(unsafe_code)]

mod buffer;
mod error;
mod format;
mod gateway;
mod image_codec;
mod info;
mod limits;
mod output;
mod traits;

pub use buffer::{ChannelLayout, ImageBuffer, PixelSlice, Raster};
pub use error::{BufferError, CodecError};
pub use format::ImageFormat;
pub use gateway::{CodecGateway, DEFAULT_JPEG_QUALITY};
pub use image_codec::ImageCodec;
pub use info::ImageInfo;
pub use limits::{LimitExceeded, ResourceLimits};
pub use output::{DecodeOutput, EncodeOutput};
pub use traits::Codec;

// Re-exports for pixel access.
pub use imgref::{Img, ImgRef};
pub use rgb;
pub use rgb::{Rgb, Rgba};

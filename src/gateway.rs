//! Bridge between [`ImageBuffer`]s and a [`Codec`].
//!
//! The gateway owns the two failure conventions:
//!
//! - decode failures land inside the returned buffer as
//!   [`ImageBuffer::Failed`], with the codec's reason copied out verbatim;
//! - encode failures are reported only through a `false` return, and the
//!   source buffer is never touched.
//!
//! Each method has a `try_*` twin returning the underlying [`CodecError`]
//! for callers that want the reason behind a `false`.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::{
    ChannelLayout, Codec, CodecError, DecodeOutput, EncodeOutput, ImageBuffer, ImageCodec,
    ImageFormat, ImageInfo, PixelSlice, Raster, ResourceLimits,
};

/// JPEG quality used when the caller passes none.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Decode/encode entry points over a serialized [`Codec`].
///
/// Every call into the codec holds an internal lock, so a single gateway can
/// be shared between threads even when the codec itself is not reentrant.
///
/// # Example
///
/// ```no_run
/// use zenraster::{CodecGateway, ImageFormat, Rgba};
///
/// let gateway = CodecGateway::new();
/// let mut image = gateway.decode_file("photo.jpg", 3);
/// if let Some(reason) = image.error() {
///     eprintln!("decode failed: {reason}");
///     return;
/// }
/// image.fill_rect(0, 0, 16, 16, Rgba::new(255, 0, 0, 255));
/// image.flip_vertical();
/// assert!(gateway.encode_file("out.png", &image, ImageFormat::Png, None));
/// ```
#[derive(Debug)]
pub struct CodecGateway<C = ImageCodec> {
    codec: Mutex<C>,
    limits: ResourceLimits,
}

impl CodecGateway<ImageCodec> {
    /// Gateway over the `image`-crate codec, without resource limits.
    pub fn new() -> Self {
        Self::with_codec(ImageCodec::new())
    }
}

impl Default for CodecGateway<ImageCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> CodecGateway<C> {
    /// Gateway over a custom codec.
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec: Mutex::new(codec),
            limits: ResourceLimits::none(),
        }
    }

    /// Apply resource limits to every subsequent decode and encode.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Configured limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Consume the gateway and return its codec.
    pub fn into_codec(self) -> C {
        self.codec.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn codec(&self) -> MutexGuard<'_, C> {
        // A panic inside a codec call leaves no state behind worth protecting.
        self.codec.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Decode ---

    /// Decode the file at `path`.
    ///
    /// `desired_channels` is `0` for the format's native channel count, or
    /// `1..=4` to convert. Returns a [`Loaded`](ImageBuffer::Loaded) buffer,
    /// or a [`Failed`](ImageBuffer::Failed) one carrying the reason.
    pub fn decode_file(&self, path: impl AsRef<Path>, desired_channels: i32) -> ImageBuffer {
        let path = path.as_ref();
        match self.try_decode_file(path, desired_channels) {
            Ok(raster) => {
                debug!("decoded {}: {raster:?}", path.display());
                raster.into()
            }
            Err(err) => {
                warn!("failed to decode {}: {err}", path.display());
                ImageBuffer::Failed(err.to_string())
            }
        }
    }

    /// [`decode_file`](Self::decode_file), returning the error instead of a
    /// failed buffer.
    pub fn try_decode_file(
        &self,
        path: impl AsRef<Path>,
        desired_channels: i32,
    ) -> Result<Raster, CodecError> {
        let path = path.as_ref();
        let channels = resolve_channels(desired_channels)?;
        let codec = self.codec();
        if self.limits.max_file_size.is_some() {
            let len = fs::metadata(path)
                .map_err(|e| CodecError::io(path, e))?
                .len();
            self.limits.check_file_size(len)?;
        }
        if self.limits.bounds_image() {
            self.check_info(&codec.probe_path(path)?, channels)?;
        }
        let output = codec.decode_path(path, channels)?;
        drop(codec);
        into_raster(output)
    }

    /// Decode an in-memory encoded image. Same contract as
    /// [`decode_file`](Self::decode_file).
    pub fn decode_memory(&self, bytes: &[u8], desired_channels: i32) -> ImageBuffer {
        match self.try_decode_memory(bytes, desired_channels) {
            Ok(raster) => {
                debug!("decoded {} bytes: {raster:?}", bytes.len());
                raster.into()
            }
            Err(err) => {
                warn!("failed to decode {} bytes: {err}", bytes.len());
                ImageBuffer::Failed(err.to_string())
            }
        }
    }

    /// [`decode_memory`](Self::decode_memory), returning the error instead of
    /// a failed buffer.
    pub fn try_decode_memory(
        &self,
        bytes: &[u8],
        desired_channels: i32,
    ) -> Result<Raster, CodecError> {
        let channels = resolve_channels(desired_channels)?;
        self.limits.check_file_size(bytes.len() as u64)?;
        let codec = self.codec();
        if self.limits.bounds_image() {
            self.check_info(&codec.probe_header(bytes)?, channels)?;
        }
        let output = codec.decode(bytes, channels)?;
        drop(codec);
        into_raster(output)
    }

    fn check_info(
        &self,
        info: &ImageInfo,
        channels: Option<ChannelLayout>,
    ) -> Result<(), CodecError> {
        let bytes_per_pixel = channels.map_or(usize::from(info.channels), ChannelLayout::channels);
        self.limits.check_image_info(info, bytes_per_pixel)?;
        Ok(())
    }

    // --- Probe ---

    /// Width, height and native channel count of the image at `path`, or
    /// `None` if it is unreadable or not an image. Never decodes pixels.
    pub fn probe(&self, path: impl AsRef<Path>) -> Option<ImageInfo> {
        let path = path.as_ref();
        match self.codec().probe_path(path) {
            Ok(info) => {
                debug!(
                    "probed {}: {}x{} with {} channels",
                    path.display(),
                    info.width,
                    info.height,
                    info.channels
                );
                Some(info)
            }
            Err(err) => {
                debug!("probe of {} failed: {err}", path.display());
                None
            }
        }
    }

    /// Whether `path` holds an image the codec recognizes.
    pub fn is_valid_image(&self, path: impl AsRef<Path>) -> bool {
        self.probe(path).is_some()
    }

    /// Comma-separated names of the formats the codec can decode.
    pub fn supported_formats(&self) -> String {
        self.codec()
            .supported_formats()
            .iter()
            .map(|format| format.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    // --- Encode ---

    /// Write `buffer` to `path` in `format`.
    ///
    /// `quality` is clamped into `1..=100` and only used for
    /// [`ImageFormat::Jpeg`]; `None` means [`DEFAULT_JPEG_QUALITY`].
    /// Returns `false` if the buffer is not loaded, the path is empty, the
    /// format cannot be encoded, or the codec or filesystem fails.
    pub fn encode_file(
        &self,
        path: impl AsRef<Path>,
        buffer: &ImageBuffer,
        format: ImageFormat,
        quality: Option<i32>,
    ) -> bool {
        let path = path.as_ref();
        self.try_encode_file(path, buffer, format, quality)
            .inspect_err(|err| warn!("failed to write {}: {err}", path.display()))
            .is_ok()
    }

    /// [`encode_file`](Self::encode_file), returning the error instead of
    /// `false`.
    pub fn try_encode_file(
        &self,
        path: impl AsRef<Path>,
        buffer: &ImageBuffer,
        format: ImageFormat,
        quality: Option<i32>,
    ) -> Result<(), CodecError> {
        let path = non_empty(path.as_ref())?;
        let raster = loaded(buffer)?;
        self.write(path, raster.as_slice(), format, quality)
    }

    /// Encode `buffer` to bytes in memory.
    pub fn encode_to_vec(
        &self,
        buffer: &ImageBuffer,
        format: ImageFormat,
        quality: Option<i32>,
    ) -> Result<EncodeOutput, CodecError> {
        self.encode_slice(loaded(buffer)?.as_slice(), format, quality)
    }

    /// Write caller-held pixel memory to `path` as PNG.
    ///
    /// `stride` is the byte distance between row starts; `0` means rows are
    /// tightly packed. Fails unless `width > 0` and `height > 0`.
    pub fn encode_raw_png(
        &self,
        path: impl AsRef<Path>,
        width: i32,
        height: i32,
        channels: i32,
        pixels: &[u8],
        stride: i32,
    ) -> bool {
        let path = path.as_ref();
        self.try_encode_raw_png(path, width, height, channels, pixels, stride)
            .inspect_err(|err| warn!("failed to write {}: {err}", path.display()))
            .is_ok()
    }

    /// [`encode_raw_png`](Self::encode_raw_png), returning the error instead
    /// of `false`.
    pub fn try_encode_raw_png(
        &self,
        path: impl AsRef<Path>,
        width: i32,
        height: i32,
        channels: i32,
        pixels: &[u8],
        stride: i32,
    ) -> Result<(), CodecError> {
        let path = non_empty(path.as_ref())?;
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(CodecError::InvalidInput("width and height must be positive"));
        };
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidInput("width and height must be positive"));
        }
        let layout = ChannelLayout::from_count(channels)
            .ok_or(CodecError::InvalidInput("channels must be 1..=4"))?;
        let stride = match usize::try_from(stride) {
            Ok(0) => width as usize * layout.channels(),
            Ok(stride) => stride,
            Err(_) => return Err(CodecError::InvalidInput("stride must not be negative")),
        };
        let slice = PixelSlice::new(pixels, width, height, stride, layout)?;
        self.write(path, slice, ImageFormat::Png, None)
    }

    fn write(
        &self,
        path: &Path,
        pixels: PixelSlice<'_>,
        format: ImageFormat,
        quality: Option<i32>,
    ) -> Result<(), CodecError> {
        let output = self.encode_slice(pixels, format, quality)?;
        fs::write(path, output.bytes()).map_err(|e| CodecError::io(path, e))?;
        debug!(
            "wrote {} ({} bytes, {})",
            path.display(),
            output.len(),
            output.format()
        );
        Ok(())
    }

    fn encode_slice(
        &self,
        pixels: PixelSlice<'_>,
        format: ImageFormat,
        quality: Option<i32>,
    ) -> Result<EncodeOutput, CodecError> {
        if !format.can_encode() {
            return Err(CodecError::Unsupported(format!("{format} encoding")));
        }
        let quality = clamp_quality(quality);
        let output = self.codec().encode(pixels, format, quality)?;
        self.limits.check_output_size(output.len() as u64)?;
        Ok(output)
    }
}

/// `0` keeps native channels; `1..=4` forces a layout.
fn resolve_channels(desired: i32) -> Result<Option<ChannelLayout>, CodecError> {
    if desired == 0 {
        return Ok(None);
    }
    ChannelLayout::from_count(desired)
        .map(Some)
        .ok_or(CodecError::InvalidInput("desired channels must be 0..=4"))
}

fn clamp_quality(quality: Option<i32>) -> u8 {
    quality.map_or(DEFAULT_JPEG_QUALITY, |q| q.clamp(1, 100) as u8)
}

fn into_raster(output: DecodeOutput) -> Result<Raster, CodecError> {
    let (pixels, layout, info) = output.into_parts();
    Ok(Raster::from_vec(pixels, info.width, info.height, layout)?)
}

fn loaded(buffer: &ImageBuffer) -> Result<&Raster, CodecError> {
    buffer
        .raster()
        .ok_or(CodecError::InvalidInput("buffer has no pixel data"))
}

fn non_empty(path: &Path) -> Result<&Path, CodecError> {
    if path.as_os_str().is_empty() {
        return Err(CodecError::InvalidInput("path is empty"));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferError, Rgba};

    /// Fake format: `[width, height, channels, fill]` header, no pixel data.
    /// Encoding emits `[quality, width, height, channels]` followed by the
    /// packed pixels.
    #[derive(Default)]
    struct FakeCodec {
        short_output: bool,
    }

    impl FakeCodec {
        fn parse(data: &[u8]) -> Result<(u32, u32, u8, u8), CodecError> {
            match data {
                [w, h, c, fill, ..] if *w > 0 && *h > 0 => {
                    Ok((u32::from(*w), u32::from(*h), *c, *fill))
                }
                _ => Err(CodecError::Malformed("not a fake image".into())),
            }
        }
    }

    impl Codec for FakeCodec {
        fn supported_formats(&self) -> &'static [ImageFormat] {
            &[ImageFormat::Png, ImageFormat::Pnm]
        }

        fn probe_header(&self, data: &[u8]) -> Result<ImageInfo, CodecError> {
            let (w, h, c, _) = Self::parse(data)?;
            Ok(ImageInfo::new(w, h, c))
        }

        fn decode(
            &self,
            data: &[u8],
            channels: Option<ChannelLayout>,
        ) -> Result<DecodeOutput, CodecError> {
            let (w, h, c, fill) = Self::parse(data)?;
            let layout = match channels {
                Some(layout) => layout,
                None => ChannelLayout::from_count(c.into())
                    .ok_or_else(|| CodecError::Unsupported(format!("{c} channels")))?,
            };
            let mut len = (w * h) as usize * layout.channels();
            if self.short_output {
                len -= 1;
            }
            Ok(DecodeOutput::new(vec![fill; len], layout, ImageInfo::new(w, h, c)))
        }

        fn encode(
            &self,
            pixels: PixelSlice<'_>,
            format: ImageFormat,
            quality: u8,
        ) -> Result<EncodeOutput, CodecError> {
            let mut out = vec![
                quality,
                pixels.width() as u8,
                pixels.rows() as u8,
                pixels.layout().channels() as u8,
            ];
            out.extend_from_slice(&pixels.to_contiguous());
            Ok(EncodeOutput::new(out, format))
        }
    }

    fn gateway() -> CodecGateway<FakeCodec> {
        CodecGateway::with_codec(FakeCodec::default())
    }

    // --- Decode ---

    #[test]
    fn decode_memory_native_channels() {
        let buf = gateway().decode_memory(&[3, 2, 4, 9], 0);
        assert!(buf.is_loaded());
        assert_eq!((buf.width(), buf.height(), buf.channels()), (3, 2, 4));
        assert_eq!(buf.stride(), 12);
        assert_eq!(buf.get_pixel(2, 1).unwrap(), &[9, 9, 9, 9]);
    }

    #[test]
    fn decode_memory_forced_channels() {
        let buf = gateway().decode_memory(&[3, 2, 4, 9], 1);
        assert_eq!(buf.channels(), 1);
        assert_eq!(buf.stride(), 3);
    }

    #[test]
    fn decode_failure_keeps_reason_verbatim() {
        let buf = gateway().decode_memory(b"x", 0);
        assert!(buf.is_failed());
        assert_eq!(buf.error(), Some("not a fake image"));
        assert_eq!(buf.try_clone(), Err(BufferError::InvalidState));
    }

    #[test]
    fn bad_desired_channels_fail_the_buffer() {
        for desired in [-1, 5] {
            let buf = gateway().decode_memory(&[1, 1, 3, 0], desired);
            assert!(buf.is_failed(), "desired {desired}");
        }
    }

    #[test]
    fn short_decoder_output_is_a_decode_failure() {
        let gw = CodecGateway::with_codec(FakeCodec { short_output: true });
        let buf = gw.decode_memory(&[2, 2, 3, 0], 0);
        assert_eq!(buf.error(), Some("decoder returned 11 bytes, expected 12"));
    }

    #[test]
    fn decode_missing_file_fails_with_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.img");
        let buf = gateway().decode_file(&path, 0);
        let reason = buf.error().unwrap();
        assert!(!reason.is_empty());
        assert!(reason.contains("missing.img"), "{reason}");
        assert_eq!(buf.try_clone(), Err(BufferError::InvalidState));
    }

    #[test]
    fn decode_file_reads_through_codec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.img");
        fs::write(&path, [2, 3, 3, 7]).unwrap();
        let buf = gateway().decode_file(&path, 0);
        assert_eq!((buf.width(), buf.height(), buf.channels()), (2, 3, 3));
    }

    // --- Limits ---

    #[test]
    fn limits_reject_before_decode() {
        let gw = gateway().with_limits(ResourceLimits::none().with_max_width(2));
        let buf = gw.decode_memory(&[3, 1, 1, 0], 0);
        assert_eq!(buf.error(), Some("width 3 exceeds limit 2"));
        assert!(gw.decode_memory(&[2, 1, 1, 0], 0).is_loaded());
    }

    #[test]
    fn memory_limit_uses_forced_channels() {
        let gw = gateway().with_limits(ResourceLimits::none().with_max_memory(12));
        assert!(gw.decode_memory(&[2, 2, 4, 0], 3).is_loaded());
        assert!(gw.decode_memory(&[2, 2, 3, 0], 4).is_failed());
    }

    #[test]
    fn file_size_limit_applies_to_memory_input() {
        let gw = gateway().with_limits(ResourceLimits::none().with_max_file_size(4));
        assert!(gw.decode_memory(&[1, 1, 1, 0], 0).is_loaded());
        let buf = gw.decode_memory(&[1, 1, 1, 0, 0], 0);
        assert_eq!(buf.error(), Some("file size 5 bytes exceeds limit 4"));
    }

    #[test]
    fn output_limit_fails_encode() {
        let gw = gateway().with_limits(ResourceLimits::none().with_max_output(8));
        let buf = ImageBuffer::allocate(2, 2, 1).unwrap();
        assert!(gw.encode_to_vec(&buf, ImageFormat::Png, None).is_ok());
        let big = ImageBuffer::allocate(4, 4, 1).unwrap();
        assert!(matches!(
            gw.encode_to_vec(&big, ImageFormat::Png, None),
            Err(CodecError::Limit(_))
        ));
    }

    // --- Probe ---

    #[test]
    fn probe_reports_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.img");
        fs::write(&path, [5, 6, 2, 0]).unwrap();
        let gw = gateway();
        assert_eq!(gw.probe(&path).unwrap().dimensions(), (5, 6, 2));
        assert!(gw.is_valid_image(&path));
        assert!(gw.probe(dir.path().join("nope")).is_none());
        assert!(!gw.is_valid_image(dir.path().join("nope")));
    }

    #[test]
    fn supported_formats_lists_codec_formats() {
        assert_eq!(gateway().supported_formats(), "PNG, PNM");
    }

    // --- Encode ---

    #[test]
    fn quality_is_clamped() {
        let gw = gateway();
        let buf = ImageBuffer::allocate(1, 1, 3).unwrap();
        let quality = |q| gw.encode_to_vec(&buf, ImageFormat::Jpeg, q).unwrap().bytes()[0];
        assert_eq!(quality(None), DEFAULT_JPEG_QUALITY);
        assert_eq!(quality(Some(0)), 1);
        assert_eq!(quality(Some(-50)), 1);
        assert_eq!(quality(Some(55)), 55);
        assert_eq!(quality(Some(1000)), 100);
    }

    #[test]
    fn encode_file_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut buf = ImageBuffer::allocate(2, 1, 3).unwrap();
        buf.set_pixel(1, 0, Rgba::new(1, 2, 3, 4));
        assert!(gateway().encode_file(&path, &buf, ImageFormat::Png, Some(5)));
        assert_eq!(fs::read(&path).unwrap(), [5, 2, 1, 3, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn encode_failures_leave_buffer_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway();
        let buf = ImageBuffer::allocate(2, 2, 4).unwrap();
        let before = buf.try_clone().unwrap();

        assert!(!gw.encode_file("", &buf, ImageFormat::Png, None));
        assert!(!gw.encode_file(dir.path().join("a.gif"), &buf, ImageFormat::Gif, None));
        assert!(!gw.encode_file(
            dir.path().join("no/such/dir/a.png"),
            &buf,
            ImageFormat::Png,
            None
        ));
        assert_eq!(buf, before);

        for unloaded in [ImageBuffer::Empty, ImageBuffer::failed("bad")] {
            assert!(!gw.encode_file(dir.path().join("b.png"), &unloaded, ImageFormat::Png, None));
        }
        assert!(!dir.path().join("b.png").exists());
    }

    #[test]
    fn raw_png_strips_stride_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.png");
        let pixels = [1, 2, 0xEE, 3, 4, 0xEE];
        assert!(gateway().encode_raw_png(&path, 2, 2, 1, &pixels, 3));
        assert_eq!(fs::read(&path).unwrap(), [90, 2, 2, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn raw_png_zero_stride_means_packed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.png");
        assert!(gateway().encode_raw_png(&path, 2, 1, 2, &[1, 2, 3, 4], 0));
        assert_eq!(fs::read(&path).unwrap(), [90, 2, 1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn raw_png_rejects_bad_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        let gw = gateway();
        let pixels = [0u8; 16];
        assert!(!gw.encode_raw_png(&path, 0, 2, 1, &pixels, 0));
        assert!(!gw.encode_raw_png(&path, 2, -1, 1, &pixels, 0));
        assert!(!gw.encode_raw_png(&path, 2, 2, 5, &pixels, 0));
        assert!(!gw.encode_raw_png(&path, 2, 2, 1, &pixels, -4));
        assert!(!gw.encode_raw_png(&path, 4, 4, 4, &pixels, 0));
        assert!(!gw.encode_raw_png("", 2, 2, 1, &pixels, 0));
        assert!(matches!(
            gw.try_encode_raw_png(&path, 4, 2, 1, &pixels, 3),
            Err(CodecError::Buffer(BufferError::StrideTooSmall { .. }))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn gateway_is_shareable() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<CodecGateway<FakeCodec>>();
        assert_sync::<CodecGateway>();
        assert_sync::<ImageBuffer>();
    }
}

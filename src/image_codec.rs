//! [`Codec`] implementation backed by the `image` crate.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek};
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageReader};

use crate::{
    ChannelLayout, Codec, CodecError, DecodeOutput, EncodeOutput, ImageFormat, ImageInfo,
    PixelSlice,
};

const DECODABLE: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Tga,
    ImageFormat::Gif,
    ImageFormat::Hdr,
    ImageFormat::Pnm,
];

/// Longest signature [`ImageFormat::detect`] looks at.
const SNIFF_LEN: usize = 16;

/// Production codec: decodes PNG, JPEG, BMP, TGA, GIF, HDR and PNM; encodes
/// PNG, BMP, TGA and JPEG.
///
/// Decoded samples are always 8-bit. JPEG output drops any alpha channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCodec;

impl ImageCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn supported_formats(&self) -> &'static [ImageFormat] {
        DECODABLE
    }

    fn probe_header(&self, data: &[u8]) -> Result<ImageInfo, CodecError> {
        probe_reader(reader_for_bytes(data)?)
    }

    fn probe_path(&self, path: &Path) -> Result<ImageInfo, CodecError> {
        probe_reader(reader_for_path(path)?)
    }

    fn decode(
        &self,
        data: &[u8],
        channels: Option<ChannelLayout>,
    ) -> Result<DecodeOutput, CodecError> {
        decode_reader(reader_for_bytes(data)?, channels)
    }

    fn decode_path(
        &self,
        path: &Path,
        channels: Option<ChannelLayout>,
    ) -> Result<DecodeOutput, CodecError> {
        decode_reader(reader_for_path(path)?, channels)
    }

    fn encode(
        &self,
        pixels: PixelSlice<'_>,
        format: ImageFormat,
        quality: u8,
    ) -> Result<EncodeOutput, CodecError> {
        let (width, height) = (pixels.width(), pixels.rows());
        let layout = pixels.layout();
        let packed = pixels.to_contiguous();
        let mut out = Vec::new();
        let written = match format {
            ImageFormat::Png => {
                PngEncoder::new(&mut out).write_image(&packed, width, height, color_type(layout))
            }
            ImageFormat::Bmp => {
                BmpEncoder::new(&mut out).write_image(&packed, width, height, color_type(layout))
            }
            ImageFormat::Tga => {
                TgaEncoder::new(&mut out).write_image(&packed, width, height, color_type(layout))
            }
            ImageFormat::Jpeg => {
                let opaque = strip_alpha(&packed, layout);
                JpegEncoder::new_with_quality(&mut out, quality).write_image(
                    &opaque,
                    width,
                    height,
                    color_type(layout.without_alpha()),
                )
            }
            other => return Err(CodecError::Unsupported(format!("{other} encoding"))),
        };
        written.map_err(map_image_error)?;
        Ok(EncodeOutput::new(out, format))
    }
}

/// Guess the format from content. Recognized but undecodable signatures are
/// rejected by name; TGA has no signature, so anything unrecognized is
/// handed to the TGA decoder as a last resort.
fn reader_for_bytes(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
    let detected = ImageFormat::detect(data);
    ensure_decodable(detected)?;
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    if reader.format().is_some() || detected.is_some() {
        return Ok(reader);
    }
    Ok(ImageReader::with_format(
        Cursor::new(data),
        image::ImageFormat::Tga,
    ))
}

/// Content wins over the extension; the extension only decides when the
/// header is unrecognized.
fn reader_for_path(path: &Path) -> Result<ImageReader<BufReader<File>>, CodecError> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .and_then(|file| file.take(SNIFF_LEN as u64).read_to_end(&mut header))
        .map_err(|e| CodecError::io(path, e))?;
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension);
    ensure_decodable(ImageFormat::detect(&header).or(by_extension))?;
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| CodecError::io(path, e))
}

fn ensure_decodable(format: Option<ImageFormat>) -> Result<(), CodecError> {
    match format {
        Some(format) if !DECODABLE.contains(&format) => {
            Err(CodecError::Unsupported(format!("{format} decoding")))
        }
        _ => Ok(()),
    }
}

fn probe_reader<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<ImageInfo, CodecError> {
    let format = reader.format().and_then(from_image_format);
    let decoder = reader.into_decoder().map_err(map_image_error)?;
    let (width, height) = decoder.dimensions();
    let info = ImageInfo::new(width, height, decoder.color_type().channel_count());
    Ok(match format {
        Some(format) => info.with_format(format),
        None => info,
    })
}

fn decode_reader<R: BufRead + Seek>(
    reader: ImageReader<R>,
    channels: Option<ChannelLayout>,
) -> Result<DecodeOutput, CodecError> {
    let format = reader.format().and_then(from_image_format);
    let image = reader.decode().map_err(map_image_error)?;
    let native = image.color().channel_count();
    let layout = match channels {
        Some(layout) => layout,
        None => ChannelLayout::from_count(native.into())
            .ok_or_else(|| CodecError::Unsupported(format!("{native} channels")))?,
    };
    let (width, height) = (image.width(), image.height());
    let pixels = match layout {
        ChannelLayout::Gray => image.into_luma8().into_raw(),
        ChannelLayout::GrayAlpha => image.into_luma_alpha8().into_raw(),
        ChannelLayout::Rgb => image.into_rgb8().into_raw(),
        ChannelLayout::Rgba => image.into_rgba8().into_raw(),
    };
    let info = ImageInfo::new(width, height, native);
    let info = match format {
        Some(format) => info.with_format(format),
        None => info,
    };
    Ok(DecodeOutput::new(pixels, layout, info))
}

fn color_type(layout: ChannelLayout) -> ExtendedColorType {
    match layout {
        ChannelLayout::Gray => ExtendedColorType::L8,
        ChannelLayout::GrayAlpha => ExtendedColorType::La8,
        ChannelLayout::Rgb => ExtendedColorType::Rgb8,
        ChannelLayout::Rgba => ExtendedColorType::Rgba8,
    }
}

fn strip_alpha(packed: &[u8], layout: ChannelLayout) -> Cow<'_, [u8]> {
    if !layout.has_alpha() {
        return Cow::Borrowed(packed);
    }
    let channels = layout.channels();
    Cow::Owned(
        packed
            .chunks_exact(channels)
            .flat_map(|pixel| &pixel[..channels - 1])
            .copied()
            .collect(),
    )
}

fn from_image_format(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
        image::ImageFormat::Tga => Some(ImageFormat::Tga),
        image::ImageFormat::Gif => Some(ImageFormat::Gif),
        image::ImageFormat::Hdr => Some(ImageFormat::Hdr),
        image::ImageFormat::Pnm => Some(ImageFormat::Pnm),
        _ => None,
    }
}

fn map_image_error(err: ImageError) -> CodecError {
    match err {
        ImageError::Unsupported(_) => CodecError::Unsupported(err.to_string()),
        _ => CodecError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(layout: ChannelLayout, format: ImageFormat) -> EncodeOutput {
        let data: Vec<u8> = (0..4 * 3 * layout.channels()).map(|i| (i * 11) as u8).collect();
        let slice = PixelSlice::new(&data, 4, 3, 4 * layout.channels(), layout).unwrap();
        ImageCodec.encode(slice, format, 90).unwrap()
    }

    #[test]
    fn png_roundtrip_keeps_native_channels() {
        for channels in 1..=4 {
            let layout = ChannelLayout::from_count(channels).unwrap();
            let encoded = encode(layout, ImageFormat::Png);
            assert_eq!(ImageFormat::detect(encoded.bytes()), Some(ImageFormat::Png));

            let info = ImageCodec.probe_header(encoded.bytes()).unwrap();
            assert_eq!(info.dimensions(), (4, 3, channels as u8));
            assert_eq!(info.format, Some(ImageFormat::Png));

            let decoded = ImageCodec.decode(encoded.bytes(), None).unwrap();
            assert_eq!(decoded.layout(), layout);
            let expected: Vec<u8> = (0..4 * 3 * layout.channels()).map(|i| (i * 11) as u8).collect();
            assert_eq!(decoded.pixels(), &expected[..]);
        }
    }

    #[test]
    fn forced_channels_convert() {
        let encoded = encode(ChannelLayout::Rgb, ImageFormat::Png);
        let decoded = ImageCodec
            .decode(encoded.bytes(), Some(ChannelLayout::Rgba))
            .unwrap();
        assert_eq!(decoded.layout(), ChannelLayout::Rgba);
        assert_eq!(decoded.info().channels, 3);
        assert_eq!(decoded.pixels().len(), 4 * 3 * 4);
        assert!(decoded.pixels().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn tga_without_signature_decodes() {
        let encoded = encode(ChannelLayout::Rgba, ImageFormat::Tga);
        assert_eq!(ImageFormat::detect(encoded.bytes()), None);
        let decoded = ImageCodec.decode(encoded.bytes(), None).unwrap();
        assert_eq!(decoded.info().dimensions(), (4, 3, 4));
    }

    #[test]
    fn bmp_roundtrip() {
        let encoded = encode(ChannelLayout::Rgb, ImageFormat::Bmp);
        assert_eq!(ImageFormat::detect(encoded.bytes()), Some(ImageFormat::Bmp));
        let decoded = ImageCodec.decode(encoded.bytes(), Some(ChannelLayout::Rgb)).unwrap();
        assert_eq!(decoded.pixels(), encode_source(ChannelLayout::Rgb));
    }

    fn encode_source(layout: ChannelLayout) -> Vec<u8> {
        (0..4 * 3 * layout.channels()).map(|i| (i * 11) as u8).collect()
    }

    #[test]
    fn jpeg_drops_alpha() {
        for layout in [ChannelLayout::GrayAlpha, ChannelLayout::Rgba] {
            let encoded = encode(layout, ImageFormat::Jpeg);
            assert_eq!(ImageFormat::detect(encoded.bytes()), Some(ImageFormat::Jpeg));
            let info = ImageCodec.probe_header(encoded.bytes()).unwrap();
            assert_eq!(info.channels as usize, layout.channels() - 1);
        }
    }

    #[test]
    fn strip_alpha_borrows_opaque_layouts() {
        assert!(matches!(strip_alpha(&[1, 2, 3], ChannelLayout::Rgb), Cow::Borrowed(_)));
        assert_eq!(
            &*strip_alpha(&[1, 2, 3, 4, 5, 6, 7, 8], ChannelLayout::Rgba),
            &[1, 2, 3, 5, 6, 7]
        );
        assert_eq!(&*strip_alpha(&[1, 2, 3, 4], ChannelLayout::GrayAlpha), &[1, 3]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ImageCodec.decode(b"definitely not an image", None).is_err());
        assert!(ImageCodec.probe_header(&[]).is_err());
    }

    #[test]
    fn known_undecodable_signatures_are_named() {
        let mut psd = b"8BPS\x00\x01".to_vec();
        psd.resize(26, 0);
        let pic = [0x53, 0x80, 0xF6, 0x34, 0, 0, 0, 0];
        for (data, name) in [(&psd[..], "PSD"), (&pic[..], "PIC")] {
            let err = ImageCodec.decode(data, None).unwrap_err();
            assert!(matches!(err, CodecError::Unsupported(_)), "{err}");
            assert_eq!(err.to_string(), format!("unsupported: {name} decoding"));
            assert!(ImageCodec.probe_header(data).is_err());
        }
    }

    #[test]
    fn undecodable_file_is_named_by_content_or_extension() {
        let dir = tempfile::tempdir().unwrap();
        let by_content = dir.path().join("layers.bin");
        std::fs::write(&by_content, b"8BPS\x00\x01\x00\x00").unwrap();
        let by_extension = dir.path().join("scene.pic");
        std::fs::write(&by_extension, b"????????").unwrap();

        let err = ImageCodec.decode_path(&by_content, None).unwrap_err();
        assert_eq!(err.to_string(), "unsupported: PSD decoding");
        let err = ImageCodec.probe_path(&by_extension).unwrap_err();
        assert_eq!(err.to_string(), "unsupported: PIC decoding");
    }

    #[test]
    fn tga_file_decodes_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tga");
        std::fs::write(&path, encode(ChannelLayout::Rgb, ImageFormat::Tga).bytes()).unwrap();
        let decoded = ImageCodec.decode_path(&path, None).unwrap();
        assert_eq!(decoded.pixels(), encode_source(ChannelLayout::Rgb));
    }

    #[test]
    fn decode_only_formats_cannot_encode() {
        let data = [0u8; 3];
        let slice = PixelSlice::new(&data, 1, 1, 3, ChannelLayout::Rgb).unwrap();
        assert!(matches!(
            ImageCodec.encode(slice, ImageFormat::Gif, 90),
            Err(CodecError::Unsupported(_))
        ));
    }
}

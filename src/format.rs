//! Image format detection and naming.

/// Raster formats known to the gateway.
///
/// Every variant except [`Tga`](Self::Tga) can be recognized from its
/// signature. [`ImageCodec`](crate::ImageCodec) decodes all of them except
/// [`Psd`](Self::Psd) and [`Pic`](Self::Pic), which it rejects as
/// unsupported by name. Only [`Png`](Self::Png), [`Bmp`](Self::Bmp),
/// [`Tga`](Self::Tga) and [`Jpeg`](Self::Jpeg) can be encoded.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
    Tga,
    Gif,
    Psd,
    Hdr,
    Pic,
    Pnm,
}

impl ImageFormat {
    /// Every format.
    pub const ALL: &'static [ImageFormat] = &[
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::Bmp,
        ImageFormat::Tga,
        ImageFormat::Gif,
        ImageFormat::Psd,
        ImageFormat::Hdr,
        ImageFormat::Pic,
        ImageFormat::Pnm,
    ];

    /// Detect format from magic bytes. Returns `None` if unrecognized.
    ///
    /// TGA has no signature and is never detected here.
    pub fn detect(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.len() >= 8 && data[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF] {
            return Some(ImageFormat::Jpeg);
        }

        // GIF: "GIF87a" or "GIF89a"
        if data.len() >= 6
            && data[..3] == *b"GIF"
            && data[3] == b'8'
            && (data[4] == b'7' || data[4] == b'9')
            && data[5] == b'a'
        {
            return Some(ImageFormat::Gif);
        }

        if data.len() >= 2 && data[..2] == *b"BM" {
            return Some(ImageFormat::Bmp);
        }

        if data.len() >= 4 && data[..4] == *b"8BPS" {
            return Some(ImageFormat::Psd);
        }

        // Radiance: "#?RADIANCE" or "#?RGBE"
        if data.starts_with(b"#?RADIANCE") || data.starts_with(b"#?RGBE") {
            return Some(ImageFormat::Hdr);
        }

        // Softimage PIC
        if data.len() >= 4 && data[..4] == [0x53, 0x80, 0xF6, 0x34] {
            return Some(ImageFormat::Pic);
        }

        // PNM family: P1-P7
        if data.len() >= 2 && data[0] == b'P' && matches!(data[1], b'1'..=b'7') {
            return Some(ImageFormat::Pnm);
        }

        None
    }

    /// Detect format from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let lower = ext.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&lower.as_str()))
    }

    /// Upper-case display name.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Tga => "TGA",
            ImageFormat::Gif => "GIF",
            ImageFormat::Psd => "PSD",
            ImageFormat::Hdr => "HDR",
            ImageFormat::Pic => "PIC",
            ImageFormat::Pnm => "PNM",
        }
    }

    /// Common file extensions.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["png"],
            ImageFormat::Jpeg => &["jpg", "jpeg", "jpe", "jfif"],
            ImageFormat::Bmp => &["bmp"],
            ImageFormat::Tga => &["tga"],
            ImageFormat::Gif => &["gif"],
            ImageFormat::Psd => &["psd"],
            ImageFormat::Hdr => &["hdr"],
            ImageFormat::Pic => &["pic"],
            ImageFormat::Pnm => &["pnm", "ppm", "pgm", "pbm", "pam"],
        }
    }

    /// Whether buffers can be written in this format.
    pub fn can_encode(self) -> bool {
        matches!(
            self,
            ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tga | ImageFormat::Jpeg
        )
    }

    /// Whether the encoder takes a quality setting.
    pub fn uses_quality(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }
}

impl core::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

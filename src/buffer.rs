//! Owned 8-bit raster buffers.
//!
//! [`ImageBuffer`] is the unit of ownership for one image in memory. It is
//! always in exactly one of three states: [`Empty`](ImageBuffer::Empty),
//! [`Loaded`](ImageBuffer::Loaded) with a [`Raster`], or
//! [`Failed`](ImageBuffer::Failed) with the reason a decode was rejected.
//! Pixel operations only act on loaded buffers and are silent no-ops
//! otherwise.
//!
//! Rows are tightly packed: `stride == width * channels`.

use std::borrow::Cow;
use std::fmt;

use imgref::{Img, ImgRef};
use rgb::{FromSlice, Rgb, Rgba};

use crate::error::BufferError;

// ---------------------------------------------------------------------------
// ChannelLayout
// ---------------------------------------------------------------------------

/// Channel layout (number and meaning of channels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelLayout {
    /// Single luminance channel.
    Gray = 1,
    /// Luminance + alpha.
    GrayAlpha = 2,
    /// Red, green, blue.
    Rgb = 3,
    /// Red, green, blue, alpha.
    Rgba = 4,
}

impl ChannelLayout {
    /// Layout for a raw channel count. `None` outside `1..=4`.
    pub const fn from_count(channels: i32) -> Option<Self> {
        match channels {
            1 => Some(Self::Gray),
            2 => Some(Self::GrayAlpha),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Number of channels (and bytes) per pixel.
    #[inline]
    pub const fn channels(self) -> usize {
        self as usize
    }

    /// Whether this layout includes an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::GrayAlpha | Self::Rgba)
    }

    /// The same layout without its alpha channel.
    #[inline]
    pub const fn without_alpha(self) -> Self {
        match self {
            Self::Gray | Self::GrayAlpha => Self::Gray,
            Self::Rgb | Self::Rgba => Self::Rgb,
        }
    }
}

// ---------------------------------------------------------------------------
// PixelSlice (borrowed, immutable)
// ---------------------------------------------------------------------------

/// Borrowed view of 8-bit pixel rows, possibly with row padding.
///
/// Encoders take this instead of a [`Raster`] so callers holding pixel
/// memory outside an [`ImageBuffer`] can encode it directly.
#[derive(Clone, Copy)]
pub struct PixelSlice<'a> {
    data: &'a [u8],
    width: u32,
    rows: u32,
    stride: usize,
    layout: ChannelLayout,
}

impl<'a> PixelSlice<'a> {
    /// Create a new pixel slice with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero, the stride is smaller
    /// than `width * channels`, or the data is too small.
    pub fn new(
        data: &'a [u8],
        width: u32,
        rows: u32,
        stride: usize,
        layout: ChannelLayout,
    ) -> Result<Self, BufferError> {
        if width == 0 || rows == 0 {
            return Err(BufferError::InvalidDimension {
                width: width.into(),
                height: rows.into(),
                channels: layout.channels() as i64,
            });
        }
        let row_bytes = (width as usize)
            .checked_mul(layout.channels())
            .ok_or(BufferError::AllocationFailure { bytes: usize::MAX })?;
        if stride < row_bytes {
            return Err(BufferError::StrideTooSmall { stride, row_bytes });
        }
        let required = (rows as usize - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or(BufferError::AllocationFailure { bytes: usize::MAX })?;
        if data.len() < required {
            return Err(BufferError::InsufficientData {
                len: data.len(),
                required,
            });
        }
        Ok(Self {
            data,
            width,
            rows,
            stride,
            layout,
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in this slice.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Byte stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Channel layout of every pixel.
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Pixel bytes for row `y` (no padding, exactly `width * channels` bytes).
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let data: &'a [u8] = self.data;
        let start = y as usize * self.stride;
        &data[start..start + self.row_bytes()]
    }

    /// Tightly packed pixel bytes. Borrows when the rows carry no padding.
    pub fn to_contiguous(&self) -> Cow<'a, [u8]> {
        let row_bytes = self.row_bytes();
        let data: &'a [u8] = self.data;
        if self.stride == row_bytes {
            return Cow::Borrowed(&data[..row_bytes * self.rows as usize]);
        }
        let mut packed = Vec::with_capacity(row_bytes * self.rows as usize);
        for y in 0..self.rows {
            packed.extend_from_slice(self.row(y));
        }
        Cow::Owned(packed)
    }

    #[inline]
    fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.channels()
    }
}

impl fmt::Debug for PixelSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelSlice({}x{}, {:?}, stride {})",
            self.width, self.rows, self.layout, self.stride
        )
    }
}

// ---------------------------------------------------------------------------
// Raster (owned pixel data)
// ---------------------------------------------------------------------------

/// Owned, tightly packed 8-bit pixels in row-major, top-to-bottom order.
///
/// Invariant: `width > 0`, `height > 0`, and
/// `data.len() == width * height * channels`.
#[derive(PartialEq, Eq)]
pub struct Raster {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: ChannelLayout,
}

impl Raster {
    /// Allocate a zero-filled raster.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidDimension`] if `width` or `height` is not
    /// positive or `channels` is outside `1..=4`;
    /// [`BufferError::AllocationFailure`] if the memory cannot be reserved.
    pub fn new(width: i32, height: i32, channels: i32) -> Result<Self, BufferError> {
        let invalid = || BufferError::InvalidDimension {
            width: width.into(),
            height: height.into(),
            channels: channels.into(),
        };
        let (Ok(w), Ok(h), Some(layout)) = (
            u32::try_from(width),
            u32::try_from(height),
            ChannelLayout::from_count(channels),
        ) else {
            return Err(invalid());
        };
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        let len = byte_len(w, h, layout)?;
        let mut data = reserve(len)?;
        data.resize(len, 0);
        Ok(Self {
            data,
            width: w,
            height: h,
            layout,
        })
    }

    /// Wrap decoder output as a raster.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidDimension`] for a zero dimension;
    /// [`BufferError::DecodeFailure`] if `data` is not exactly
    /// `width * height * channels` bytes.
    pub fn from_vec(
        data: Vec<u8>,
        width: u32,
        height: u32,
        layout: ChannelLayout,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimension {
                width: width.into(),
                height: height.into(),
                channels: layout.channels() as i64,
            });
        }
        let expected = byte_len(width, height, layout)?;
        if data.len() != expected {
            return Err(BufferError::DecodeFailure(format!(
                "decoder returned {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            layout,
        })
    }

    /// Independent copy with the same geometry and pixel bytes.
    ///
    /// # Errors
    ///
    /// [`BufferError::AllocationFailure`] if the memory cannot be reserved.
    pub fn try_clone(&self) -> Result<Self, BufferError> {
        let mut data = reserve(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            data,
            width: self.width,
            height: self.height,
            layout: self.layout,
        })
    }

    /// Consume the raster and return the backing `Vec<u8>`.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout.
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Bytes per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// All pixel bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// All pixel bytes, mutable. The length is fixed.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrow the full raster as a [`PixelSlice`] for encoding.
    pub fn as_slice(&self) -> PixelSlice<'_> {
        PixelSlice {
            data: &self.data,
            width: self.width,
            rows: self.height,
            stride: self.stride(),
            layout: self.layout,
        }
    }

    /// Pixel bytes of row `y`, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        self.data.chunks_exact(self.stride()).nth(y as usize)
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.stride())
    }

    /// Typed view of a [`Gray`](ChannelLayout::Gray) raster.
    pub fn as_gray8(&self) -> Option<ImgRef<'_, u8>> {
        (self.layout == ChannelLayout::Gray)
            .then(|| Img::new(&self.data[..], self.width as usize, self.height as usize))
    }

    /// Typed view of an [`Rgb`](ChannelLayout::Rgb) raster.
    pub fn as_rgb8(&self) -> Option<ImgRef<'_, Rgb<u8>>> {
        (self.layout == ChannelLayout::Rgb)
            .then(|| Img::new(self.data.as_rgb(), self.width as usize, self.height as usize))
    }

    /// Typed view of an [`Rgba`](ChannelLayout::Rgba) raster.
    pub fn as_rgba8(&self) -> Option<ImgRef<'_, Rgba<u8>>> {
        (self.layout == ChannelLayout::Rgba)
            .then(|| Img::new(self.data.as_rgba(), self.width as usize, self.height as usize))
    }

    // --- Pixel access ---

    /// The `channels` bytes at `(x, y)`, or `None` when out of range.
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<&[u8]> {
        let start = self.offset(x, y)?;
        Some(&self.data[start..start + self.channels()])
    }

    /// Mutable bytes at `(x, y)`, or `None` when out of range.
    pub fn pixel_mut(&mut self, x: i32, y: i32) -> Option<&mut [u8]> {
        let start = self.offset(x, y)?;
        let end = start + self.channels();
        Some(&mut self.data[start..end])
    }

    /// Write `color` at `(x, y)`, one channel per byte of the layout.
    ///
    /// Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if let Some(pixel) = self.pixel_mut(x, y) {
            write_color(pixel, color);
        }
    }

    /// Write `color` to every pixel.
    pub fn fill(&mut self, color: Rgba<u8>) {
        let channels = self.channels();
        for pixel in self.data.chunks_exact_mut(channels) {
            write_color(pixel, color);
        }
    }

    /// Write `color` to `[x, x+w) × [y, y+h)` clipped to the raster.
    ///
    /// A rectangle that misses the raster entirely changes nothing.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba<u8>) {
        let Some((x0, x1)) = clip_span(x, w, self.width) else {
            return;
        };
        let Some((y0, y1)) = clip_span(y, h, self.height) else {
            return;
        };
        let channels = self.channels();
        let stride = self.stride();
        for row in self.data.chunks_exact_mut(stride).skip(y0).take(y1 - y0) {
            for pixel in row[x0 * channels..x1 * channels].chunks_exact_mut(channels) {
                write_color(pixel, color);
            }
        }
    }

    // --- In-place transforms ---

    /// Reverse the row order. The middle row of an odd height stays put.
    pub fn flip_vertical(&mut self) {
        let stride = self.stride();
        let height = self.height as usize;
        for y in 0..height / 2 {
            let (top, bottom) = self.data.split_at_mut((height - 1 - y) * stride);
            top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Reverse the pixel order within each row. Pixels move as whole units.
    pub fn flip_horizontal(&mut self) {
        let channels = self.channels();
        let width = self.width as usize;
        let stride = self.stride();
        for row in self.data.chunks_exact_mut(stride) {
            for x in 0..width / 2 {
                let (left, right) = row.split_at_mut((width - 1 - x) * channels);
                left[x * channels..(x + 1) * channels].swap_with_slice(&mut right[..channels]);
            }
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        Some(y as usize * self.stride() + x as usize * self.channels())
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Raster({}x{}, {:?})",
            self.width, self.height, self.layout
        )
    }
}

fn byte_len(width: u32, height: u32, layout: ChannelLayout) -> Result<usize, BufferError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(layout.channels()))
        .ok_or(BufferError::AllocationFailure { bytes: usize::MAX })
}

fn reserve(len: usize) -> Result<Vec<u8>, BufferError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| BufferError::AllocationFailure { bytes: len })?;
    Ok(data)
}

/// Channel 0 takes `r`; `g`, `b`, `a` follow only while the pixel has room.
#[inline]
fn write_color(pixel: &mut [u8], color: Rgba<u8>) {
    let rgba = [color.r, color.g, color.b, color.a];
    pixel.copy_from_slice(&rgba[..pixel.len()]);
}

/// Clip `[start, start + len)` to `[0, limit)`. `None` when empty.
fn clip_span(start: i32, len: i32, limit: u32) -> Option<(usize, usize)> {
    let end = (i64::from(start) + i64::from(len)).min(i64::from(limit));
    let start = i64::from(start).max(0);
    (start < end).then_some((start as usize, end as usize))
}

// ---------------------------------------------------------------------------
// ImageBuffer
// ---------------------------------------------------------------------------

/// One raster image in memory.
///
/// Decoding never returns an error directly: a rejected input produces a
/// [`Failed`](Self::Failed) buffer carrying the codec's reason, so check
/// the state before using pixels. Allocation problems, by contrast, are
/// returned as [`BufferError`] and never produce a buffer.
///
/// There is no `Clone`; copies go through [`try_clone`](Self::try_clone),
/// which refuses buffers without pixels and reports allocation failure.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum ImageBuffer {
    /// Never populated, or released.
    #[default]
    Empty,
    /// Holds valid pixel data.
    Loaded(Raster),
    /// A decode attempt failed; holds the reason.
    Failed(String),
}

impl ImageBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// # Errors
    ///
    /// See [`Raster::new`].
    pub fn allocate(width: i32, height: i32, channels: i32) -> Result<Self, BufferError> {
        Raster::new(width, height, channels).map(Self::Loaded)
    }

    /// A buffer in the failed state.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Independent deep copy of a loaded buffer.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidState`] if the buffer has no pixel data;
    /// [`BufferError::AllocationFailure`] if the copy cannot be allocated.
    pub fn try_clone(&self) -> Result<Self, BufferError> {
        match self {
            Self::Loaded(raster) => raster.try_clone().map(Self::Loaded),
            Self::Empty | Self::Failed(_) => Err(BufferError::InvalidState),
        }
    }

    /// Drop pixel data and error message together. Always leaves the
    /// buffer [`Empty`](Self::Empty).
    pub fn release(&mut self) {
        *self = Self::Empty;
    }

    // --- State ---

    /// Whether the buffer is [`Empty`](Self::Empty).
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the buffer holds pixel data.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Whether a decode failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure reason of a [`Failed`](Self::Failed) buffer.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// The pixel data of a [`Loaded`](Self::Loaded) buffer.
    pub fn raster(&self) -> Option<&Raster> {
        match self {
            Self::Loaded(raster) => Some(raster),
            _ => None,
        }
    }

    /// Mutable pixel data of a [`Loaded`](Self::Loaded) buffer.
    pub fn raster_mut(&mut self) -> Option<&mut Raster> {
        match self {
            Self::Loaded(raster) => Some(raster),
            _ => None,
        }
    }

    /// Width in pixels, 0 without pixel data.
    pub fn width(&self) -> u32 {
        self.raster().map_or(0, Raster::width)
    }

    /// Height in pixels, 0 without pixel data.
    pub fn height(&self) -> u32 {
        self.raster().map_or(0, Raster::height)
    }

    /// Channels per pixel, 0 without pixel data.
    pub fn channels(&self) -> usize {
        self.raster().map_or(0, Raster::channels)
    }

    /// Bytes per row, 0 without pixel data.
    pub fn stride(&self) -> usize {
        self.raster().map_or(0, Raster::stride)
    }

    /// All pixel bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.raster().map(Raster::as_bytes)
    }

    // --- Pixel operations (no-ops unless loaded) ---

    /// See [`Raster::get_pixel`].
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<&[u8]> {
        self.raster()?.get_pixel(x, y)
    }

    /// See [`Raster::set_pixel`].
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if let Some(raster) = self.raster_mut() {
            raster.set_pixel(x, y, color);
        }
    }

    /// See [`Raster::fill`].
    pub fn fill(&mut self, color: Rgba<u8>) {
        if let Some(raster) = self.raster_mut() {
            raster.fill(color);
        }
    }

    /// See [`Raster::fill_rect`].
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgba<u8>) {
        if let Some(raster) = self.raster_mut() {
            raster.fill_rect(x, y, w, h, color);
        }
    }

    /// See [`Raster::flip_vertical`].
    pub fn flip_vertical(&mut self) {
        if let Some(raster) = self.raster_mut() {
            raster.flip_vertical();
        }
    }

    /// See [`Raster::flip_horizontal`].
    pub fn flip_horizontal(&mut self) {
        if let Some(raster) = self.raster_mut() {
            raster.flip_horizontal();
        }
    }
}

impl From<Raster> for ImageBuffer {
    fn from(raster: Raster) -> Self {
        Self::Loaded(raster)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

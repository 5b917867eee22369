// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! CPU-side pixel data.

This module holds everything that exists before a device is involved:

- [`Image`] - a plain pixel buffer with dimensions.  A [`crate::texture::GpuTexture`]
  owns one until its upload hands the pixels to the device.
- [`Surface`] - a raw surface payload produced by an external rasterizer, with its
  own row pitch and channel order.
- [`ImageDecoder`] - the decode collaborator; [`PngDecoder`] is the stock implementation.

# Example

```
use texture_manager::software::Image;

let board = Image::checkerboard(8, 8, 4).unwrap();
assert_eq!(board.as_bytes().len(), 8 * 8 * 4);
// adjacent pixels differ
assert_ne!(board.pixel(0, 0), board.pixel(1, 0));
```
*/

use std::fmt::Debug;
use std::path::Path;

use crate::error::Error;
use crate::imp::UnpackLayout;
use crate::pixel_formats::ClientFormat;
use crate::pixel_formats::png_support;

/// Diagnostic color used for placeholder textures.
const MAGENTA: [u8; 4] = [255, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// A CPU pixel buffer, tightly packed, row-major, origin top-left.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    buffer: Vec<u8>,
}

impl Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_pixel", &self.bytes_per_pixel)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

fn allocate(width: u32, height: u32, bytes_per_pixel: u32) -> Result<Vec<u8>, Error> {
    let oom = Error::OutOfMemory { width, height };
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(bytes_per_pixel as usize))
        .ok_or(Error::OutOfMemory { width, height })?;
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| oom)?;
    buffer.resize(len, 0);
    Ok(buffer)
}

impl Image {
    /// Allocates a zero-filled image.
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32) -> Result<Self, Error> {
        Ok(Image {
            width,
            height,
            bytes_per_pixel,
            buffer: allocate(width, height, bytes_per_pixel)?,
        })
    }

    /// Wraps an existing buffer.
    ///
    /// # Panics
    /// Panics if `buffer` is not exactly `width * height * bytes_per_pixel` bytes.
    pub fn from_bytes(width: u32, height: u32, bytes_per_pixel: u32, buffer: Vec<u8>) -> Self {
        assert_eq!(
            buffer.len(),
            width as usize * height as usize * bytes_per_pixel as usize,
            "buffer length does not match {width}x{height}x{bytes_per_pixel}"
        );
        Image {
            width,
            height,
            bytes_per_pixel,
            buffer,
        }
    }

    /// Allocates an image filled with a magenta/black checkerboard.
    ///
    /// The pattern is deterministic and alternates every pixel, so a texture
    /// that failed to load is impossible to mistake for real content.
    pub fn checkerboard(width: u32, height: u32, bytes_per_pixel: u32) -> Result<Self, Error> {
        let mut image = Image::new(width, height, bytes_per_pixel)?;
        let bpp = bytes_per_pixel as usize;
        for y in 0..height {
            for x in 0..width {
                let color = if (x + y) % 2 == 0 { MAGENTA } else { BLACK };
                let offset = (y as usize * width as usize + x as usize) * bpp;
                for (c, byte) in image.buffer[offset..offset + bpp].iter_mut().enumerate() {
                    *byte = color[c % 4];
                }
            }
        }
        Ok(image)
    }

    /// Allocates a four-channel image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, Error> {
        let mut image = Image::new(width, height, 4)?;
        for pixel in image.buffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
        Ok(image)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bytes_per_pixel
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.bytes_per_pixel as usize;
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.buffer[offset..offset + bpp]
    }

    /// Replaces this image with the `w`x`h` rectangle of `source` whose top-left is `(x, y)`.
    ///
    /// # Panics
    /// Panics if the rectangle does not fit inside `source`.
    pub fn guillotine(&mut self, source: &Image, x: u32, y: u32, w: u32, h: u32) -> Result<(), Error> {
        assert!(
            x + w <= source.width && y + h <= source.height,
            "guillotine rect ({x},{y}) {w}x{h} exceeds {}x{}",
            source.width,
            source.height
        );
        let bpp = source.bytes_per_pixel as usize;
        let mut buffer = allocate(w, h, source.bytes_per_pixel)?;
        let row_bytes = w as usize * bpp;
        for row in 0..h as usize {
            let src = ((y as usize + row) * source.width as usize + x as usize) * bpp;
            let dst = row * row_bytes;
            buffer[dst..dst + row_bytes].copy_from_slice(&source.buffer[src..src + row_bytes]);
        }
        self.width = w;
        self.height = h;
        self.bytes_per_pixel = source.bytes_per_pixel;
        self.buffer = buffer;
        Ok(())
    }

    /// Writes the CPU buffer to `path` as PNG.
    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        let color_type = png_support::png_color_type(self.bytes_per_pixel).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no PNG color type for {} bytes per pixel", self.bytes_per_pixel),
            ))
        })?;
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        png_support::encode(file, self.width, self.height, color_type, &self.buffer)
            .map_err(std::io::Error::other)?;
        Ok(())
    }
}

/// Errors from the decode collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode PNG: {0}")]
    Png(#[from] png::DecodingError),
}

/// Decode collaborator: turns a path into an [`Image`].
pub trait ImageDecoder: Send + Sync + Debug {
    fn decode(&self, path: &Path) -> Result<Image, DecodeError>;
}

/// Decodes PNG files into four-channel [`Image`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngDecoder;

impl ImageDecoder for PngDecoder {
    fn decode(&self, path: &Path) -> Result<Image, DecodeError> {
        let data = std::fs::read(path)?;
        let (width, height, rgba) = png_support::decode_rgba8(&data)?;
        Ok(Image::from_bytes(width, height, 4, rgba))
    }
}

/// Channel layout of a [`Surface`].
///
/// `red_mask` follows the little-endian packed-pixel convention: `0x0000_00ff`
/// means red is the first byte of each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub bytes_per_pixel: u32,
    pub red_mask: u32,
}

impl SurfaceFormat {
    pub const RGBA32: SurfaceFormat = SurfaceFormat { bytes_per_pixel: 4, red_mask: 0x0000_00ff };
    pub const BGRA32: SurfaceFormat = SurfaceFormat { bytes_per_pixel: 4, red_mask: 0x00ff_0000 };
    pub const RGB24: SurfaceFormat = SurfaceFormat { bytes_per_pixel: 3, red_mask: 0x0000_00ff };
    pub const BGR24: SurfaceFormat = SurfaceFormat { bytes_per_pixel: 3, red_mask: 0x00ff_0000 };

    /// Infers the client layout, or `None` for channel counts other than 3 and 4.
    pub fn client_format(&self) -> Option<ClientFormat> {
        let red_first = self.red_mask == 0x0000_00ff;
        match (self.bytes_per_pixel, red_first) {
            (4, true) => Some(ClientFormat::Rgba8),
            (4, false) => Some(ClientFormat::Bgra8),
            (3, true) => Some(ClientFormat::Rgb8),
            (3, false) => Some(ClientFormat::Bgr8),
            _ => None,
        }
    }
}

/// A raw surface payload handed over by an external rasterizer.
///
/// Rows may be padded: `pitch` is the distance in bytes between row starts.
/// A release hook, if installed, runs exactly once when the surface is dropped,
/// whichever upload path ends up consuming it.
pub struct Surface {
    width: u32,
    height: u32,
    pitch: u32,
    format: SurfaceFormat,
    pixels: Vec<u8>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pitch", &self.pitch)
            .field("format", &self.format)
            .field("pixels_len", &self.pixels.len())
            .finish()
    }
}

impl Surface {
    /// # Panics
    /// Panics if `pixels` is shorter than `pitch * height`, or `pitch` cannot hold a row.
    pub fn new(width: u32, height: u32, pitch: u32, format: SurfaceFormat, pixels: Vec<u8>) -> Self {
        assert!(
            pitch >= width * format.bytes_per_pixel,
            "pitch {pitch} too small for {width} pixels"
        );
        assert!(
            pixels.len() >= pitch as usize * height as usize,
            "surface data is {} bytes, expected at least {}",
            pixels.len(),
            pitch as usize * height as usize
        );
        Surface {
            width,
            height,
            pitch,
            format,
            pixels,
            on_release: None,
        }
    }

    /// Tightly packed surface.
    pub fn packed(width: u32, height: u32, format: SurfaceFormat, pixels: Vec<u8>) -> Self {
        Surface::new(width, height, width * format.bytes_per_pixel, format, pixels)
    }

    /// Installs a hook that runs when the surface is released.
    pub fn with_release_hook<F: FnOnce() + Send + 'static>(mut self, hook: F) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Row alignment and row length to communicate to the device.
    ///
    /// Alignment is the largest power of two up to 8 dividing the pitch.  When
    /// rounding a row up to that alignment still leaves a whole alignment unit
    /// of padding, the true row length in pixels is reported too.
    pub fn unpack_layout(&self) -> UnpackLayout {
        let mut alignment = 8;
        while self.pitch % alignment != 0 {
            alignment >>= 1;
        }
        let row_bytes = self.width * self.format.bytes_per_pixel;
        let expected_pitch = row_bytes.div_ceil(alignment) * alignment;
        let row_length = if self.pitch - expected_pitch >= alignment {
            Some(self.pitch / self.format.bytes_per_pixel)
        } else {
            None
        };
        UnpackLayout {
            alignment,
            row_length,
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

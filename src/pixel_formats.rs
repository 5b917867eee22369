// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Translation from portable texture options to native device enumerations.
//!
//! This module is the pixel format translator.  Everything here is a pure
//! function: no device access, no state.  Backends consume the results through
//! the [`crate::imp::Device`] trait.
//!
//! The native vocabulary is wgpu's.  Storage formats are
//! [`wgpu::TextureFormat`], wrap modes are [`wgpu::AddressMode`], and filters
//! are [`wgpu::FilterMode`] pairs (see [`SamplerFilter`]).
//!
//! # Formats
//!
//! | Portable          | Storage                    | Compressed substitute        |
//! |-------------------|----------------------------|------------------------------|
//! | [`Format::Rgba`]      | `Rgba8Unorm`           | `Bc3RgbaUnorm`               |
//! | [`Format::Red`]       | `R8Unorm`              | `Bc4RUnorm`                  |
//! | [`Format::Srgb`]      | `Rgba8UnormSrgb`       | `Bc3RgbaUnormSrgb`           |
//! | [`Format::SrgbAlpha`] | `Rgba8UnormSrgb`       | `Bc3RgbaUnormSrgb`           |
//! | [`Format::Rgb32F`]    | `Rgba32Float`          | none                         |
//!
//! wgpu has no three-channel storage, so `Srgb` is stored with an alpha
//! channel, exactly like `SrgbAlpha`.
//!
//! ```
//! use texture_manager::options::Format;
//! use texture_manager::pixel_formats::{compress, translate};
//!
//! let native = translate(Format::Rgba);
//! assert_eq!(native, wgpu::TextureFormat::Rgba8Unorm);
//! assert_eq!(compress(native), wgpu::TextureFormat::Bc3RgbaUnorm);
//! ```

pub(crate) mod png_support;

use crate::imp::SamplerFilter;
use crate::options::{DataType, Filter, Format, TextureOptions, Wrap};

/// Layout of the bytes handed to [`crate::imp::Device::upload_image`].
///
/// This is the CPU side of an upload, the counterpart of the storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Bgr8,
    R8,
}

impl ClientFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            ClientFormat::Rgba8 | ClientFormat::Bgra8 => 4,
            ClientFormat::Rgb8 | ClientFormat::Bgr8 => 3,
            ClientFormat::R8 => 1,
        }
    }
}

/// Maps a portable format onto native storage.
pub const fn translate(format: Format) -> wgpu::TextureFormat {
    match format {
        Format::Rgba => wgpu::TextureFormat::Rgba8Unorm,
        Format::Red => wgpu::TextureFormat::R8Unorm,
        Format::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        Format::SrgbAlpha => wgpu::TextureFormat::Rgba8UnormSrgb,
        Format::Rgb32F => wgpu::TextureFormat::Rgba32Float,
    }
}

/// Maps a portable format onto the layout of the CPU buffer.
///
/// The CPU side is always bytes ([`DataType::UnsignedByte`]); `Rgb32F` only
/// describes storage, so its client layout is four bytes like `Rgba`.
pub const fn client_format(format: Format, data_type: DataType) -> ClientFormat {
    match (format, data_type) {
        (Format::Red, DataType::UnsignedByte) => ClientFormat::R8,
        (Format::Rgba | Format::Srgb | Format::SrgbAlpha | Format::Rgb32F, DataType::UnsignedByte) => {
            ClientFormat::Rgba8
        }
    }
}

/// Substitutes a compressed storage format for an uncompressed one.
///
/// Formats without a compressed counterpart pass through unchanged.
pub fn compress(native: wgpu::TextureFormat) -> wgpu::TextureFormat {
    match native {
        wgpu::TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Bc3RgbaUnorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Bc3RgbaUnormSrgb,
        wgpu::TextureFormat::R8Unorm => wgpu::TextureFormat::Bc4RUnorm,
        other => {
            logwise::trace_sync!(
                "no compressed substitute for {format}",
                format = logwise::privacy::LogIt(&other)
            );
            other
        }
    }
}

/// Inverse of [`compress`], for backends that cannot encode compressed data on upload.
pub fn decompressed(native: wgpu::TextureFormat) -> wgpu::TextureFormat {
    match native {
        wgpu::TextureFormat::Bc3RgbaUnorm => wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Bc3RgbaUnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bc4RUnorm => wgpu::TextureFormat::R8Unorm,
        other => other,
    }
}

/// Storage requested by `options`, with the compressed substitution applied
/// when the options ask for compression and the texture is not editable.
pub fn storage_format(options: &TextureOptions) -> wgpu::TextureFormat {
    let native = translate(options.internal_format);
    if options.should_compress() {
        compress(native)
    } else {
        native
    }
}

pub const fn filter(filter: Filter) -> SamplerFilter {
    use wgpu::FilterMode::{Linear, Nearest};
    match filter {
        Filter::Nearest => SamplerFilter { texel: Nearest, mipmap: None },
        Filter::Linear => SamplerFilter { texel: Linear, mipmap: None },
        Filter::LinearMipmap => SamplerFilter { texel: Linear, mipmap: Some(Linear) },
        Filter::NearestMipmap => SamplerFilter { texel: Nearest, mipmap: Some(Nearest) },
        Filter::NearestLinearMipmap => SamplerFilter { texel: Nearest, mipmap: Some(Linear) },
        Filter::LinearNearestMipmap => SamplerFilter { texel: Linear, mipmap: Some(Nearest) },
    }
}

pub const fn wrap(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

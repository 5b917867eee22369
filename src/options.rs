// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Portable upload options.
//!
//! [`TextureOptions`] describes how a CPU pixel buffer becomes a device texture:
//! wrap modes, filters, pixel formats, and a few flags controlling *when* and
//! *how* the upload happens.
//!
//! Options double as part of the [`crate::cache::TextureCache`] key.  Two
//! options values that only differ in [`TextureOptions::compressed`] or
//! [`TextureOptions::instant_upload`] compare equal and hash identically,
//! because those flags affect how the resource is produced, not what it is.

use std::hash::{Hash, Hasher};

/// Texture target.  Only 2D textures go through [`TextureOptions`];
/// arrays use [`crate::texture_array::TextureArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    Texture2D,
}

/// Addressing mode for coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    #[default]
    Repeat,
    ClampToEdge,
}

/// Minification / magnification filter.
///
/// The four `*Mipmap` variants name the texel filter first and the
/// filter *between* mip levels second, so `NearestLinearMipmap` samples
/// the nearest texel of each level and blends linearly across levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
    LinearMipmap,
    NearestMipmap,
    NearestLinearMipmap,
    LinearNearestMipmap,
}

impl Filter {
    /// Whether sampling with this filter reads lower mip levels.
    pub const fn uses_mipmaps(self) -> bool {
        matches!(
            self,
            Filter::LinearMipmap
                | Filter::NearestMipmap
                | Filter::NearestLinearMipmap
                | Filter::LinearNearestMipmap
        )
    }
}

/// Portable pixel format, used both for the layout of the CPU buffer and
/// for the requested storage on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Rgba,
    Red,
    Rgb32F,
    Srgb,
    SrgbAlpha,
}

/// Component type of the CPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    UnsignedByte,
}

/// Upload options for a [`crate::texture::GpuTexture`].
#[derive(Debug, Clone, Copy)]
pub struct TextureOptions {
    pub target: Target,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub format: Format,
    pub internal_format: Format,
    pub data_type: DataType,
    /// Keep the CPU buffer after upload so the texture can be edited and re-uploaded.
    pub editable: bool,
    /// Ask the device for compressed storage.  Only honored for non-editable textures.
    pub compressed: bool,
    /// Upload on the calling thread even when the texture is cache-managed.
    pub instant_upload: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        TextureOptions {
            target: Target::Texture2D,
            wrap_s: Wrap::Repeat,
            wrap_t: Wrap::Repeat,
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            format: Format::Rgba,
            internal_format: Format::Rgba,
            data_type: DataType::UnsignedByte,
            editable: false,
            compressed: true,
            instant_upload: false,
        }
    }
}

impl TextureOptions {
    /// Starts a builder from the default options.
    pub fn builder() -> TextureOptionsBuilder {
        TextureOptionsBuilder {
            options: TextureOptions::default(),
        }
    }

    /// Whether either filter needs a mip chain.
    pub fn wants_mipmaps(&self) -> bool {
        self.min_filter.uses_mipmaps() || self.mag_filter.uses_mipmaps()
    }

    /// Whether the upload should request compressed storage.
    pub fn should_compress(&self) -> bool {
        self.compressed && !self.editable
    }

    fn identity(&self) -> (Target, Wrap, Wrap, Filter, Filter, Format, Format, DataType, bool) {
        (
            self.target,
            self.wrap_s,
            self.wrap_t,
            self.min_filter,
            self.mag_filter,
            self.format,
            self.internal_format,
            self.data_type,
            self.editable,
        )
    }
}

impl PartialEq for TextureOptions {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TextureOptions {}

impl Hash for TextureOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Fluent construction of [`TextureOptions`].
#[derive(Debug, Clone, Copy)]
pub struct TextureOptionsBuilder {
    options: TextureOptions,
}

impl TextureOptionsBuilder {
    pub fn wrap(mut self, wrap_s: Wrap, wrap_t: Wrap) -> Self {
        self.options.wrap_s = wrap_s;
        self.options.wrap_t = wrap_t;
        self
    }

    pub fn filters(mut self, min_filter: Filter, mag_filter: Filter) -> Self {
        self.options.min_filter = min_filter;
        self.options.mag_filter = mag_filter;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.options.format = format;
        self
    }

    pub fn internal_format(mut self, internal_format: Format) -> Self {
        self.options.internal_format = internal_format;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.options.data_type = data_type;
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.options.editable = editable;
        self
    }

    pub fn compressed(mut self, compressed: bool) -> Self {
        self.options.compressed = compressed;
        self
    }

    pub fn instant_upload(mut self, instant_upload: bool) -> Self {
        self.options.instant_upload = instant_upload;
        self
    }

    pub fn build(self) -> TextureOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(options: &TextureOptions) -> u64 {
        let mut hasher = DefaultHasher::new();
        options.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn production_flags_do_not_affect_identity() {
        let a = TextureOptions::builder().compressed(true).instant_upload(false).build();
        let b = TextureOptions::builder().compressed(false).instant_upload(true).build();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn editable_is_part_of_identity() {
        let a = TextureOptions::default();
        let b = TextureOptions::builder().editable(true).build();
        assert_ne!(a, b);
    }

    #[test]
    fn mipmap_detection() {
        let plain = TextureOptions::default();
        assert!(!plain.wants_mipmaps());
        let mipped = TextureOptions::builder()
            .filters(Filter::NearestLinearMipmap, Filter::Linear)
            .build();
        assert!(mipped.wants_mipmaps());
    }

    #[test]
    fn compression_requires_non_editable() {
        assert!(TextureOptions::default().should_compress());
        assert!(!TextureOptions::builder().editable(true).build().should_compress());
        assert!(!TextureOptions::builder().compressed(false).build().should_compress());
    }
}

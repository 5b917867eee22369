// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The device seam.
//!
//! [`Device`] is the opaque graphics interface the texture manager drives.  Every
//! method must be called from the thread that owns the device context; the
//! upload queue exists so producer threads never have to.
//!
//! Two backends ship with the crate:
//! - [`SoftwareDevice`], an in-memory device that records every call.  Always built.
//! - `WgpuDevice`, backed by a real `wgpu::Device` and `wgpu::Queue`.  Behind the
//!   `backend_wgpu` feature (on by default).

use std::fmt::Debug;
use std::num::NonZeroU64;

use crate::options::DataType;
use crate::pixel_formats::ClientFormat;

pub(crate) mod convert;
pub mod software;

pub use software::SoftwareDevice;

#[cfg(feature = "backend_wgpu")]
mod wgpu;

#[cfg(feature = "backend_wgpu")]
pub use self::wgpu::WgpuDevice;

/// Handle to a device-resident texture.  Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(NonZeroU64);

impl TextureId {
    pub(crate) fn from_counter(counter: &mut u64) -> TextureId {
        *counter += 1;
        //counter starts at 0 and only grows
        TextureId(NonZeroU64::new(*counter).unwrap_or(NonZeroU64::MIN))
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// Texture coordinate axis for wrap modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    S,
    T,
}

/// Which filter [`Device::set_filter`] configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Min,
    Mag,
}

/// A native filter: the texel filter plus, for mipmapped filters, the filter between levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerFilter {
    pub texel: ::wgpu::FilterMode,
    pub mipmap: Option<::wgpu::FilterMode>,
}

impl Default for SamplerFilter {
    fn default() -> Self {
        SamplerFilter {
            texel: ::wgpu::FilterMode::Nearest,
            mipmap: None,
        }
    }
}

/// How source rows are laid out in memory.
///
/// Rows start on `alignment`-byte boundaries.  `row_length`, when set, is the
/// true row length in pixels and overrides the upload width for stride purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnpackLayout {
    pub alignment: u32,
    pub row_length: Option<u32>,
}

impl UnpackLayout {
    /// Tightly packed rows.
    pub const PACKED: UnpackLayout = UnpackLayout {
        alignment: 1,
        row_length: None,
    };

    /// Distance in bytes between row starts for an upload of `width` pixels.
    pub fn row_stride(&self, width: u32, bytes_per_pixel: u32) -> usize {
        let pixels = self.row_length.unwrap_or(width) as usize;
        let alignment = self.alignment.max(1) as usize;
        (pixels * bytes_per_pixel as usize).div_ceil(alignment) * alignment
    }
}

/// Arguments of a 2D image upload.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub client_format: ClientFormat,
    /// Requested storage.  May be a compressed format the device is free to decline.
    pub storage_format: ::wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub data_type: DataType,
    pub layout: UnpackLayout,
    pub data: &'a [u8],
}

/// Arguments of one array layer upload.
#[derive(Debug, Clone, Copy)]
pub struct LayerUpload<'a> {
    pub layer: u32,
    pub client_format: ClientFormat,
    pub width: u32,
    pub height: u32,
    pub layout: UnpackLayout,
    pub data: &'a [u8],
}

/// Opaque graphics device.
///
/// Implementations treat unknown texture ids as a no-op; device faults are
/// logged, never returned.
pub trait Device: Send + Sync + Debug {
    /// Reserves a new texture id.  Storage is allocated by the first upload.
    fn create_texture(&self) -> TextureId;
    /// Makes `texture` current for subsequent draws.
    fn bind_texture(&self, texture: TextureId);
    /// (Re)allocates 2D storage for `texture` and fills mip level 0.
    fn upload_image(&self, texture: TextureId, upload: &ImageUpload<'_>);
    /// Allocates array storage with a fixed layer count.
    fn allocate_array(
        &self,
        texture: TextureId,
        storage_format: ::wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
    );
    /// Fills one layer of an array allocated by [`Device::allocate_array`].
    fn upload_layer(&self, texture: TextureId, upload: &LayerUpload<'_>);
    fn set_wrap(&self, texture: TextureId, axis: Axis, mode: ::wgpu::AddressMode);
    fn set_filter(&self, texture: TextureId, kind: FilterKind, filter: SamplerFilter);
    fn generate_mipmaps(&self, texture: TextureId);
    /// Whether the storage of `texture` actually ended up compressed.
    fn is_compressed(&self, texture: TextureId) -> bool;
    fn delete_texture(&self, texture: TextureId);
    /// Reads mip level 0 (layer 0) back in `format`.  Empty if `texture` has no storage.
    fn read_pixels(&self, texture: TextureId, format: ClientFormat) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_stride() {
        assert_eq!(UnpackLayout::PACKED.row_stride(3, 4), 12);
        let aligned = UnpackLayout { alignment: 8, row_length: None };
        assert_eq!(aligned.row_stride(5, 3), 16);
        let long = UnpackLayout { alignment: 4, row_length: Some(16) };
        assert_eq!(long.row_stride(2, 4), 64);
    }

    #[test]
    fn ids_are_nonzero_and_increasing() {
        let mut counter = 0;
        let a = TextureId::from_counter(&mut counter);
        let b = TextureId::from_counter(&mut counter);
        assert_eq!(a.get(), 1);
        assert!(b > a);
    }
}

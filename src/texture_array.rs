// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Tiled images uploaded as one array texture.
//!
//! A [`TextureArray`] cuts its image into `tiles_x * tiles_y` equal tiles and
//! uploads tile `(tx, ty)` as layer `ty * tiles_x + tx`.  The tile grid, and
//! with it the layer count, is fixed at construction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Error;
use crate::imp::{Axis, FilterKind, LayerUpload, TextureId, UnpackLayout};
use crate::options::{Filter, Format, Wrap};
use crate::pixel_formats::{self, ClientFormat};
use crate::session::Session;
use crate::software::{Image, ImageDecoder};

fn client_format_for(bytes_per_pixel: u32) -> Option<ClientFormat> {
    match bytes_per_pixel {
        4 => Some(ClientFormat::Rgba8),
        3 => Some(ClientFormat::Rgb8),
        1 => Some(ClientFormat::R8),
        _ => None,
    }
}

#[derive(Debug)]
pub struct TextureArray {
    session: Arc<Session>,
    image: Image,
    tiles_x: u32,
    tiles_y: u32,
    handle: Mutex<Option<TextureId>>,
}

impl TextureArray {
    /// # Panics
    /// Panics if either tile count is zero.  The image dimensions are expected
    /// to divide evenly by the tile counts; leftover pixels are never uploaded.
    pub fn new(session: &Arc<Session>, image: Image, tiles_x: u32, tiles_y: u32) -> Self {
        assert!(tiles_x > 0 && tiles_y > 0, "tile grid must be non-empty");
        debug_assert!(
            image.width() % tiles_x == 0 && image.height() % tiles_y == 0,
            "{}x{} image does not split into {tiles_x}x{tiles_y} tiles",
            image.width(),
            image.height()
        );
        TextureArray {
            session: session.clone(),
            image,
            tiles_x,
            tiles_y,
            handle: Mutex::new(None),
        }
    }

    pub fn from_path(
        session: &Arc<Session>,
        path: &Path,
        tiles_x: u32,
        tiles_y: u32,
        decoder: &dyn ImageDecoder,
    ) -> Result<Self, Error> {
        let image = decoder.decode(path).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(TextureArray::new(session, image, tiles_x, tiles_y))
    }

    fn lock(&self) -> MutexGuard<'_, Option<TextureId>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn layers(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// Pixel size of one tile.
    pub fn tile_size(&self) -> (u32, u32) {
        (self.image.width() / self.tiles_x, self.image.height() / self.tiles_y)
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn handle(&self) -> Option<TextureId> {
        *self.lock()
    }

    /// Allocates the array texture and uploads every tile.  Device thread only.
    pub fn upload(&self) {
        let Some(client_format) = client_format_for(self.image.bytes_per_pixel()) else {
            logwise::warn_sync!(
                "cannot upload {bpp}-byte pixels as an array",
                bpp = self.image.bytes_per_pixel()
            );
            return;
        };
        let device = self.session.device();
        let mut handle = self.lock();
        if let Some(old) = handle.take() {
            device.delete_texture(old);
        }

        let id = device.create_texture();
        let (tile_w, tile_h) = self.tile_size();
        device.allocate_array(
            id,
            pixel_formats::translate(Format::Rgba),
            tile_w,
            tile_h,
            self.layers(),
        );
        device.set_filter(id, FilterKind::Min, pixel_formats::filter(Filter::Linear));
        device.set_filter(id, FilterKind::Mag, pixel_formats::filter(Filter::Linear));
        device.set_wrap(id, Axis::S, pixel_formats::wrap(Wrap::Repeat));
        device.set_wrap(id, Axis::T, pixel_formats::wrap(Wrap::Repeat));

        //rows of a tile are rows of the parent image
        let layout = UnpackLayout {
            alignment: 1,
            row_length: Some(self.image.width()),
        };
        let bpp = self.image.bytes_per_pixel() as usize;
        let width = self.image.width() as usize;
        let bytes = self.image.as_bytes();
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let offset = (ty as usize * tile_h as usize * width + tx as usize * tile_w as usize) * bpp;
                device.upload_layer(
                    id,
                    &LayerUpload {
                        layer: ty * self.tiles_x + tx,
                        client_format,
                        width: tile_w,
                        height: tile_h,
                        layout,
                        data: &bytes[offset..],
                    },
                );
            }
        }
        *handle = Some(id);
    }

    pub fn bind(&self) {
        if let Some(id) = self.handle() {
            self.session.device().bind_texture(id);
        }
    }
}

impl Drop for TextureArray {
    fn drop(&mut self) {
        let handle = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = handle.take() {
            self.session.device().delete_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftwareDevice;
    use crate::session::SessionConfig;

    #[test]
    fn tile_geometry() {
        let session = Session::new(Arc::new(SoftwareDevice::new()), SessionConfig::default());
        let array = TextureArray::new(&session, Image::new(64, 32, 4).unwrap(), 4, 2);
        assert_eq!(array.layers(), 8);
        assert_eq!(array.tile_size(), (16, 16));
    }

    #[test]
    fn sampler_state_and_reupload() {
        let device = Arc::new(SoftwareDevice::new());
        let session = Session::new(device.clone(), SessionConfig::default());
        let array = TextureArray::new(&session, Image::new(4, 4, 4).unwrap(), 2, 2);
        array.upload();
        let first = array.handle().unwrap();
        let linear = pixel_formats::filter(Filter::Linear);
        assert_eq!(device.filters(first), Some((linear, linear)));
        assert_eq!(device.wrap(first), Some([wgpu::AddressMode::Repeat; 2]));
        assert_eq!(device.mip_levels(first), 1);
        array.upload();
        assert_eq!(device.live_textures(), vec![array.handle().unwrap()]);
        drop(array);
        assert!(device.live_textures().is_empty());
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! [`Device`] over a real `wgpu::Device` / `wgpu::Queue` pair.
//!
//! wgpu has no notion of a "current" texture or of sampler state living on the
//! texture, so this backend keeps both on the side: [`WgpuDevice::bound_texture`]
//! reports what was last bound, and [`WgpuDevice::sampler`] builds a
//! `wgpu::Sampler` from the wrap/filter state recorded per texture.
//!
//! wgpu cannot encode block-compressed data on upload.  Compressed storage
//! requests are stored uncompressed and reported as such through
//! [`Device::is_compressed`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::imp::convert;
use crate::imp::{Axis, Device, FilterKind, ImageUpload, LayerUpload, SamplerFilter, TextureId};
use crate::pixel_formats::{ClientFormat, decompressed};

mod sampler;
mod texture;

use texture::Slot;

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    textures: HashMap<TextureId, Slot>,
    bound: Option<TextureId>,
}

/// wgpu-backed device.
#[derive(Debug)]
pub struct WgpuDevice {
    device: ::wgpu::Device,
    queue: ::wgpu::Queue,
    state: Mutex<State>,
}

impl WgpuDevice {
    pub fn new(device: ::wgpu::Device, queue: ::wgpu::Queue) -> Self {
        WgpuDevice {
            device,
            queue,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The texture most recently passed to [`Device::bind_texture`], if still alive.
    pub fn bound_texture(&self) -> Option<TextureId> {
        self.lock().bound
    }

    /// The wgpu texture behind `texture`, once storage exists.
    pub fn texture(&self, texture: TextureId) -> Option<::wgpu::Texture> {
        self.lock().textures.get(&texture).and_then(|s| s.texture.clone())
    }

    /// A sampler reflecting the wrap and filter state of `texture`.
    pub fn sampler(&self, texture: TextureId) -> Option<::wgpu::Sampler> {
        let mut state = self.lock();
        let slot = state.textures.get_mut(&texture)?;
        Some(slot.sampler(&self.device))
    }

    /// Storage bytes of one mip level of one layer, rows tightly packed.
    ///
    /// `None` when the texture, level or layer does not exist.
    pub fn read_back(&self, texture: TextureId, layer: u32, mip_level: u32) -> Option<Vec<u8>> {
        let state = self.lock();
        state
            .textures
            .get(&texture)?
            .read_level(&self.device, &self.queue, mip_level, layer)
    }

    /// Number of mip levels allocated for `texture`.
    pub fn mip_level_count(&self, texture: TextureId) -> Option<u32> {
        self.lock().textures.get(&texture).map(|s| s.mip_level_count)
    }
}

fn missing(texture: TextureId, op: &'static str) {
    logwise::warn_sync!(
        "{op} on unknown texture {texture}",
        op = op,
        texture = texture.get()
    );
}

impl Device for WgpuDevice {
    fn create_texture(&self) -> TextureId {
        let mut state = self.lock();
        let id = TextureId::from_counter(&mut state.next_id);
        state.textures.insert(id, Slot::empty());
        logwise::trace_sync!("wgpu create_texture {id}", id = id.get());
        id
    }

    fn bind_texture(&self, texture: TextureId) {
        let mut state = self.lock();
        if state.textures.contains_key(&texture) {
            state.bound = Some(texture);
        } else {
            missing(texture, "bind_texture");
        }
    }

    fn upload_image(&self, texture: TextureId, upload: &ImageUpload<'_>) {
        let mut state = self.lock();
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "upload_image");
            return;
        };
        let storage = decompressed(upload.storage_format);
        if upload.storage_format.is_compressed() {
            logwise::trace_sync!(
                "wgpu stores {requested} as {storage}",
                requested = logwise::privacy::LogIt(&upload.storage_format),
                storage = logwise::privacy::LogIt(&storage)
            );
        }
        let packed = convert::gather_rows(
            upload.data,
            upload.width,
            upload.height,
            upload.client_format.bytes_per_pixel(),
            upload.layout,
        );
        let bytes = convert::to_storage(&packed, upload.client_format, storage);
        let mip_level_count = convert::mip_level_count(upload.width, upload.height);
        slot.allocate(&self.device, storage, upload.width, upload.height, 1, mip_level_count);
        slot.write_level(&self.queue, 0, 0, upload.width, upload.height, &bytes);
    }

    fn allocate_array(
        &self,
        texture: TextureId,
        storage_format: ::wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
    ) {
        let mut state = self.lock();
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "allocate_array");
            return;
        };
        slot.allocate(&self.device, decompressed(storage_format), width, height, layers, 1);
    }

    fn upload_layer(&self, texture: TextureId, upload: &LayerUpload<'_>) {
        let mut state = self.lock();
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "upload_layer");
            return;
        };
        let packed = convert::gather_rows(
            upload.data,
            upload.width,
            upload.height,
            upload.client_format.bytes_per_pixel(),
            upload.layout,
        );
        let bytes = convert::to_storage(&packed, upload.client_format, slot.format);
        slot.write_level(&self.queue, 0, upload.layer, upload.width, upload.height, &bytes);
    }

    fn set_wrap(&self, texture: TextureId, axis: Axis, mode: ::wgpu::AddressMode) {
        let mut state = self.lock();
        match state.textures.get_mut(&texture) {
            Some(slot) => slot.set_wrap(axis, mode),
            None => missing(texture, "set_wrap"),
        }
    }

    fn set_filter(&self, texture: TextureId, kind: FilterKind, filter: SamplerFilter) {
        let mut state = self.lock();
        match state.textures.get_mut(&texture) {
            Some(slot) => slot.set_filter(kind, filter),
            None => missing(texture, "set_filter"),
        }
    }

    fn generate_mipmaps(&self, texture: TextureId) {
        let mut state = self.lock();
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "generate_mipmaps");
            return;
        };
        let Some(mut level) = slot.read_level(&self.device, &self.queue, 0, 0) else {
            return;
        };
        let (mut width, mut height) = (slot.width, slot.height);
        for mip_level in 1..slot.mip_level_count {
            let (next, w, h) = convert::downsample(&level, width, height, slot.format);
            slot.write_level(&self.queue, mip_level, 0, w, h, &next);
            (level, width, height) = (next, w, h);
        }
    }

    fn is_compressed(&self, _texture: TextureId) -> bool {
        false
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.lock();
        match state.textures.remove(&texture) {
            Some(slot) => slot.destroy(),
            None => missing(texture, "delete_texture"),
        }
        if state.bound == Some(texture) {
            state.bound = None;
        }
    }

    fn read_pixels(&self, texture: TextureId, format: ClientFormat) -> Vec<u8> {
        let state = self.lock();
        let Some(slot) = state.textures.get(&texture) else {
            missing(texture, "read_pixels");
            return Vec::new();
        };
        match slot.read_level(&self.device, &self.queue, 0, 0) {
            Some(bytes) => convert::from_storage(&bytes, slot.format, format),
            None => Vec::new(),
        }
    }
}

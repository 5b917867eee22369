// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! An in-memory [`Device`].

`SoftwareDevice` keeps every texture as plain bytes, generates mipmaps on the
CPU, and records each call it receives.  It is the device used for headless
runs and for tests, where the call log is the side channel that shows what the
texture manager actually asked for and in which order.

The call log grows with every call.  Long headless runs should drain it with
[`SoftwareDevice::clear_log`] from time to time.

```
use texture_manager::imp::{Device, SoftwareDevice};

let device = SoftwareDevice::new();
let id = device.create_texture();
device.delete_texture(id);
assert!(device.live_textures().is_empty());
```
*/

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::imp::convert;
use crate::imp::{Axis, Device, FilterKind, ImageUpload, LayerUpload, SamplerFilter, TextureId};
use crate::pixel_formats::{ClientFormat, decompressed};

/// One call received by a [`SoftwareDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Create(TextureId),
    Bind(TextureId),
    UploadImage {
        texture: TextureId,
        width: u32,
        height: u32,
        client_format: ClientFormat,
        storage_format: wgpu::TextureFormat,
    },
    AllocateArray {
        texture: TextureId,
        width: u32,
        height: u32,
        layers: u32,
    },
    UploadLayer {
        texture: TextureId,
        layer: u32,
    },
    SetWrap {
        texture: TextureId,
        axis: Axis,
        mode: wgpu::AddressMode,
    },
    SetFilter {
        texture: TextureId,
        kind: FilterKind,
        filter: SamplerFilter,
    },
    GenerateMipmaps(TextureId),
    Delete(TextureId),
    ReadPixels(TextureId),
}

#[derive(Debug)]
struct SoftTexture {
    storage_format: Option<wgpu::TextureFormat>,
    width: u32,
    height: u32,
    /// Level 0 of each layer, in the uncompressed storage layout.
    layers: Vec<Vec<u8>>,
    /// Levels 1.. of layer 0.
    mips: Vec<Vec<u8>>,
    wrap: [wgpu::AddressMode; 2],
    min_filter: SamplerFilter,
    mag_filter: SamplerFilter,
    compressed: bool,
}

impl SoftTexture {
    fn empty() -> Self {
        SoftTexture {
            storage_format: None,
            width: 0,
            height: 0,
            layers: Vec::new(),
            mips: Vec::new(),
            wrap: [wgpu::AddressMode::Repeat; 2],
            min_filter: SamplerFilter::default(),
            mag_filter: SamplerFilter::default(),
            compressed: false,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    textures: HashMap<TextureId, SoftTexture>,
    bound: Option<TextureId>,
    calls: Vec<DeviceCall>,
    uploads: Vec<TextureId>,
    supports_compression: bool,
}

/// In-memory device that records every call.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    state: Mutex<State>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether compressed storage requests are honored.  Off by default.
    pub fn set_supports_compression(&self, supports: bool) {
        self.lock().supports_compression = supports;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Targets of [`Device::upload_image`], oldest first.
    pub fn uploads(&self) -> Vec<TextureId> {
        self.lock().uploads.clone()
    }

    /// Forgets the recorded calls and upload order.  Texture contents are kept.
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.uploads.clear();
    }

    /// Ids that have been created and not deleted.
    pub fn live_textures(&self) -> Vec<TextureId> {
        let mut ids: Vec<_> = self.lock().textures.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn bound(&self) -> Option<TextureId> {
        self.lock().bound
    }

    /// Storage format actually in use, compressed if the request was honored.
    pub fn storage_format(&self, texture: TextureId) -> Option<wgpu::TextureFormat> {
        self.lock().textures.get(&texture).and_then(|t| t.storage_format)
    }

    pub fn size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.lock().textures.get(&texture).map(|t| (t.width, t.height))
    }

    /// Level 0 of `layer` in the uncompressed storage layout.
    pub fn layer_bytes(&self, texture: TextureId, layer: u32) -> Option<Vec<u8>> {
        self.lock()
            .textures
            .get(&texture)
            .and_then(|t| t.layers.get(layer as usize).cloned())
    }

    pub fn layer_count(&self, texture: TextureId) -> usize {
        self.lock().textures.get(&texture).map_or(0, |t| t.layers.len())
    }

    /// Number of mip levels, including level 0.
    pub fn mip_levels(&self, texture: TextureId) -> usize {
        self.lock()
            .textures
            .get(&texture)
            .map_or(0, |t| if t.layers.is_empty() { 0 } else { 1 + t.mips.len() })
    }

    pub fn wrap(&self, texture: TextureId) -> Option<[wgpu::AddressMode; 2]> {
        self.lock().textures.get(&texture).map(|t| t.wrap)
    }

    /// `(min, mag)` filters.
    pub fn filters(&self, texture: TextureId) -> Option<(SamplerFilter, SamplerFilter)> {
        self.lock()
            .textures
            .get(&texture)
            .map(|t| (t.min_filter, t.mag_filter))
    }
}

fn missing(texture: TextureId, op: &'static str) {
    logwise::warn_sync!(
        "{op} on unknown texture {texture}",
        op = op,
        texture = texture.get()
    );
}

impl Device for SoftwareDevice {
    fn create_texture(&self) -> TextureId {
        let mut state = self.lock();
        let id = TextureId::from_counter(&mut state.next_id);
        state.textures.insert(id, SoftTexture::empty());
        state.calls.push(DeviceCall::Create(id));
        id
    }

    fn bind_texture(&self, texture: TextureId) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::Bind(texture));
        if state.textures.contains_key(&texture) {
            state.bound = Some(texture);
        } else {
            missing(texture, "bind_texture");
        }
    }

    fn upload_image(&self, texture: TextureId, upload: &ImageUpload<'_>) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::UploadImage {
            texture,
            width: upload.width,
            height: upload.height,
            client_format: upload.client_format,
            storage_format: upload.storage_format,
        });
        state.uploads.push(texture);
        let supports_compression = state.supports_compression;
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "upload_image");
            return;
        };
        let requested = upload.storage_format;
        let compressed = requested.is_compressed() && supports_compression;
        let storage = decompressed(requested);
        let packed = convert::gather_rows(
            upload.data,
            upload.width,
            upload.height,
            upload.client_format.bytes_per_pixel(),
            upload.layout,
        );
        slot.layers = vec![convert::to_storage(&packed, upload.client_format, storage)];
        slot.mips.clear();
        slot.width = upload.width;
        slot.height = upload.height;
        slot.compressed = compressed;
        slot.storage_format = Some(if compressed { requested } else { storage });
    }

    fn allocate_array(
        &self,
        texture: TextureId,
        storage_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
    ) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::AllocateArray {
            texture,
            width,
            height,
            layers,
        });
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "allocate_array");
            return;
        };
        let storage = decompressed(storage_format);
        let layer_len = width as usize * height as usize * convert::storage_bytes_per_pixel(storage) as usize;
        slot.layers = vec![vec![0u8; layer_len]; layers as usize];
        slot.mips.clear();
        slot.width = width;
        slot.height = height;
        slot.compressed = false;
        slot.storage_format = Some(storage);
    }

    fn upload_layer(&self, texture: TextureId, upload: &LayerUpload<'_>) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::UploadLayer {
            texture,
            layer: upload.layer,
        });
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "upload_layer");
            return;
        };
        let Some(storage) = slot.storage_format else {
            logwise::warn_sync!("upload_layer before allocate_array");
            return;
        };
        if upload.layer as usize >= slot.layers.len() {
            logwise::warn_sync!(
                "layer {layer} out of range ({count} layers)",
                layer = upload.layer,
                count = slot.layers.len()
            );
            return;
        }
        let packed = convert::gather_rows(
            upload.data,
            upload.width,
            upload.height,
            upload.client_format.bytes_per_pixel(),
            upload.layout,
        );
        slot.layers[upload.layer as usize] = convert::to_storage(&packed, upload.client_format, storage);
    }

    fn set_wrap(&self, texture: TextureId, axis: Axis, mode: wgpu::AddressMode) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::SetWrap { texture, axis, mode });
        match state.textures.get_mut(&texture) {
            Some(slot) => match axis {
                Axis::S => slot.wrap[0] = mode,
                Axis::T => slot.wrap[1] = mode,
            },
            None => missing(texture, "set_wrap"),
        }
    }

    fn set_filter(&self, texture: TextureId, kind: FilterKind, filter: SamplerFilter) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::SetFilter {
            texture,
            kind,
            filter,
        });
        match state.textures.get_mut(&texture) {
            Some(slot) => match kind {
                FilterKind::Min => slot.min_filter = filter,
                FilterKind::Mag => slot.mag_filter = filter,
            },
            None => missing(texture, "set_filter"),
        }
    }

    fn generate_mipmaps(&self, texture: TextureId) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::GenerateMipmaps(texture));
        let Some(slot) = state.textures.get_mut(&texture) else {
            missing(texture, "generate_mipmaps");
            return;
        };
        let (Some(storage), Some(base)) = (slot.storage_format, slot.layers.first()) else {
            return;
        };
        let storage = decompressed(storage);
        let mut mips = Vec::new();
        let (mut level, mut width, mut height) = (base.clone(), slot.width, slot.height);
        for _ in 1..convert::mip_level_count(slot.width, slot.height) {
            let (next, w, h) = convert::downsample(&level, width, height, storage);
            mips.push(next.clone());
            (level, width, height) = (next, w, h);
        }
        slot.mips = mips;
    }

    fn is_compressed(&self, texture: TextureId) -> bool {
        self.lock().textures.get(&texture).is_some_and(|t| t.compressed)
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.lock();
        state.calls.push(DeviceCall::Delete(texture));
        if state.textures.remove(&texture).is_none() {
            missing(texture, "delete_texture");
        }
        if state.bound == Some(texture) {
            state.bound = None;
        }
    }

    fn read_pixels(&self, texture: TextureId, format: ClientFormat) -> Vec<u8> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::ReadPixels(texture));
        let Some(slot) = state.textures.get(&texture) else {
            missing(texture, "read_pixels");
            return Vec::new();
        };
        match (slot.storage_format, slot.layers.first()) {
            (Some(storage), Some(base)) => convert::from_storage(base, decompressed(storage), format),
            _ => Vec::new(),
        }
    }
}

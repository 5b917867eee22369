// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::convert;
use crate::imp::{Axis, FilterKind, SamplerFilter};
use wgpu::{Extent3d, TexelCopyBufferLayout, TexelCopyTextureInfo};

/// Per-texture bookkeeping for [`super::WgpuDevice`].
#[derive(Debug)]
pub(super) struct Slot {
    pub(super) texture: Option<wgpu::Texture>,
    pub(super) format: wgpu::TextureFormat,
    pub(super) width: u32,
    pub(super) height: u32,
    pub(super) layers: u32,
    pub(super) mip_level_count: u32,
    pub(super) wrap: [wgpu::AddressMode; 2],
    pub(super) min_filter: SamplerFilter,
    pub(super) mag_filter: SamplerFilter,
    pub(super) sampler: Option<wgpu::Sampler>,
}

impl Slot {
    pub(super) fn empty() -> Self {
        Slot {
            texture: None,
            format: wgpu::TextureFormat::Rgba8Unorm,
            width: 0,
            height: 0,
            layers: 0,
            mip_level_count: 0,
            wrap: [wgpu::AddressMode::Repeat; 2],
            min_filter: SamplerFilter::default(),
            mag_filter: SamplerFilter::default(),
            sampler: None,
        }
    }

    fn get_texture_descriptor(
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
        mip_level_count: u32,
    ) -> wgpu::TextureDescriptor<'static> {
        wgpu::TextureDescriptor {
            label: Some("texture_manager"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        }
    }

    /// Replaces any prior storage.
    pub(super) fn allocate(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
        mip_level_count: u32,
    ) {
        if let Some(old) = self.texture.take() {
            old.destroy();
        }
        let descriptor = Self::get_texture_descriptor(format, width, height, layers, mip_level_count);
        self.texture = Some(device.create_texture(&descriptor));
        self.format = format;
        self.width = width;
        self.height = height;
        self.layers = layers;
        self.mip_level_count = mip_level_count;
    }

    /// Writes tightly packed storage bytes into `mip_level` of `layer`.
    pub(super) fn write_level(
        &self,
        queue: &wgpu::Queue,
        mip_level: u32,
        layer: u32,
        width: u32,
        height: u32,
        bytes: &[u8],
    ) {
        let Some(texture) = &self.texture else {
            logwise::warn_sync!("write to texture without storage");
            return;
        };
        let bytes_per_row = width * convert::storage_bytes_per_pixel(self.format);
        queue.write_texture(
            TexelCopyTextureInfo {
                texture,
                mip_level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Reads `mip_level` of `layer` back as tightly packed storage bytes.
    ///
    /// Blocks until the GPU has finished the copy.
    pub(super) fn read_level(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mip_level: u32,
        layer: u32,
    ) -> Option<Vec<u8>> {
        let texture = self.texture.as_ref()?;
        if mip_level >= self.mip_level_count || layer >= self.layers {
            return None;
        }
        let width = (self.width >> mip_level).max(1);
        let height = (self.height >> mip_level).max(1);
        let row_bytes = width * convert::storage_bytes_per_pixel(self.format);
        let wgpu_bytes_per_row_256 = row_bytes
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture_manager readback"),
            size: (wgpu_bytes_per_row_256 * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture_manager readback"),
        });
        encoder.copy_texture_to_buffer(
            TexelCopyTextureInfo {
                texture,
                mip_level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu_bytes_per_row_256),
                    rows_per_image: None,
                },
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let (sender, mapped) = r#continue::continuation();
        staging.map_async(wgpu::MapMode::Read, .., move |result| {
            sender.send(result);
        });
        if let Err(err) = device.poll(wgpu::PollType::Wait) {
            logwise::error_sync!(
                "device poll failed during readback: {err}",
                err = logwise::privacy::LogIt(&err)
            );
            return None;
        }
        if let Err(err) = test_executors::spin_on(mapped) {
            logwise::error_sync!(
                "failed to map readback buffer: {err}",
                err = logwise::privacy::LogIt(&err)
            );
            return None;
        }

        let mut pixels = Vec::with_capacity(row_bytes as usize * height as usize);
        {
            let data = staging.slice(..).get_mapped_range();
            for row in 0..height as usize {
                let start = row * wgpu_bytes_per_row_256 as usize;
                pixels.extend_from_slice(&data[start..start + row_bytes as usize]);
            }
        }
        staging.unmap();
        Some(pixels)
    }

    pub(super) fn set_wrap(&mut self, axis: Axis, mode: wgpu::AddressMode) {
        match axis {
            Axis::S => self.wrap[0] = mode,
            Axis::T => self.wrap[1] = mode,
        }
        self.sampler = None;
    }

    pub(super) fn set_filter(&mut self, kind: FilterKind, filter: SamplerFilter) {
        match kind {
            FilterKind::Min => self.min_filter = filter,
            FilterKind::Mag => self.mag_filter = filter,
        }
        self.sampler = None;
    }

    pub(super) fn destroy(self) {
        if let Some(texture) = self.texture {
            texture.destroy();
        }
    }
}

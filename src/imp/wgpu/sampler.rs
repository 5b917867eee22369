// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{AddressMode, SamplerDescriptor};

use super::texture::Slot;

impl Slot {
    /// Sampler matching the recorded wrap and filter state, built on first use.
    pub(super) fn sampler(&mut self, device: &wgpu::Device) -> wgpu::Sampler {
        if let Some(sampler) = &self.sampler {
            return sampler.clone();
        }
        let mipmapped = self.min_filter.mipmap.is_some();
        let s = SamplerDescriptor {
            label: Some("texture_manager"),
            address_mode_u: self.wrap[0],
            address_mode_v: self.wrap[1],
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: self.mag_filter.texel,
            min_filter: self.min_filter.texel,
            mipmap_filter: self.min_filter.mipmap.unwrap_or(wgpu::FilterMode::Nearest),
            lod_min_clamp: 0.0,
            //without a mip filter, stay on level 0
            lod_max_clamp: if mipmapped { self.mip_level_count as f32 } else { 0.0 },
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        };
        let sampler = device.create_sampler(&s);
        self.sampler = Some(sampler.clone());
        sampler
    }
}

#![cfg(all(feature = "testing", feature = "backend_wgpu"))]
// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The wgpu backend against a real adapter.
//!
//! Widths are chosen so that rows are not a multiple of wgpu's 256-byte copy
//! alignment.

use std::sync::Arc;

use texture_manager::imp::{Device, WgpuDevice};
use texture_manager::options::{Filter, TextureOptions};
use texture_manager::pixel_formats::ClientFormat;
use texture_manager::session::{Session, SessionConfig};
use texture_manager::software::{Image, ImageDecoder, PngDecoder};
use texture_manager::texture::GpuTexture;
use texture_manager::texture_array::TextureArray;

fn gpu() -> Option<Arc<WgpuDevice>> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
    let adapter = match test_executors::spin_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())) {
        Ok(adapter) => adapter,
        Err(err) => {
            println!("no wgpu adapter, skipping: {err}");
            return None;
        }
    };
    let (device, queue) = test_executors::spin_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
        .expect("failed to create device");
    Some(Arc::new(WgpuDevice::new(device, queue)))
}

fn patterned(width: u32, height: u32) -> Image {
    let bytes = (0..width * height * 4)
        .map(|i| (i.wrapping_mul(7) % 253) as u8)
        .collect();
    Image::from_bytes(width, height, 4, bytes)
}

#[test]
fn width_63_reads_back_and_exports() {
    let Some(device) = gpu() else { return };
    let session = Session::new(device.clone(), SessionConfig::default());
    let original = patterned(63, 5);
    let texture = GpuTexture::from_image(&session, original.clone());
    texture.upload(TextureOptions::default());
    let id = texture.handle().unwrap();

    //compression requested by default, stored plain
    assert!(!device.is_compressed(id));
    assert_eq!(device.read_pixels(id, ClientFormat::Rgba8), original.as_bytes());

    let path = std::env::temp_dir().join(format!("texture_manager_{}_wgpu_63.png", std::process::id()));
    texture.export_to_file(&path).unwrap();
    assert_eq!(PngDecoder.decode(&path).unwrap(), original);
    std::fs::remove_file(&path).ok();
}

#[test]
fn mip_chain_written_per_level() {
    let Some(device) = gpu() else { return };
    let session = Session::new(device.clone(), SessionConfig::default());
    let color = [10, 20, 30, 255];
    let texture = GpuTexture::from_image(&session, Image::solid(63, 5, color).unwrap());
    texture.upload(TextureOptions::builder().filters(Filter::LinearMipmap, Filter::Linear).build());
    let id = texture.handle().unwrap();

    //63 -> 31 -> 15 -> 7 -> 3 -> 1
    assert_eq!(device.mip_level_count(id), Some(6));
    for level in 0..6 {
        let width = (63u32 >> level).max(1);
        let height = (5u32 >> level).max(1);
        let bytes = device.read_back(id, 0, level).unwrap();
        assert_eq!(bytes.len(), (width * height * 4) as usize, "level {level}");
        assert!(bytes.chunks_exact(4).all(|p| p == color), "level {level}");
    }
    assert!(device.read_back(id, 0, 6).is_none());
}

#[test]
fn array_layers_round_trip() {
    let Some(device) = gpu() else { return };
    let session = Session::new(device.clone(), SessionConfig::default());
    let image = patterned(126, 4);
    let array = TextureArray::new(&session, image.clone(), 2, 2);
    array.upload();
    let id = array.handle().unwrap();

    for ty in 0..2 {
        for tx in 0..2 {
            let mut expected = Vec::new();
            for y in ty * 2..(ty + 1) * 2 {
                for x in tx * 63..(tx + 1) * 63 {
                    expected.extend_from_slice(image.pixel(x, y));
                }
            }
            let layer = ty * 2 + tx;
            assert_eq!(device.read_back(id, layer, 0).unwrap(), expected, "layer {layer}");
        }
    }
    assert!(device.read_back(id, 4, 0).is_none());
}

#[test]
fn sampler_and_binding_follow_the_texture() {
    let Some(device) = gpu() else { return };
    let session = Session::new(device.clone(), SessionConfig::default());
    let texture = GpuTexture::from_image(&session, patterned(3, 3));
    texture.upload(TextureOptions::default());
    let id = texture.handle().unwrap();

    assert!(device.texture(id).is_some());
    assert!(device.sampler(id).is_some());
    texture.bind();
    assert_eq!(device.bound_texture(), Some(id));

    drop(texture);
    assert!(device.texture(id).is_none());
    assert!(device.sampler(id).is_none());
    assert_eq!(device.bound_texture(), None);
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel shuffling shared by the backends: unpacking padded rows, converting
//! client layouts into storage layouts and back, and box-filter mip reduction.

use crate::imp::UnpackLayout;
use crate::pixel_formats::ClientFormat;

/// Bytes per texel of an uncompressed storage format this crate produces.
pub(crate) fn storage_bytes_per_pixel(storage: wgpu::TextureFormat) -> u32 {
    match storage {
        wgpu::TextureFormat::R8Unorm => 1,
        wgpu::TextureFormat::Rgba32Float => 16,
        _ => 4,
    }
}

/// Copies `height` rows of `width` pixels out of a buffer laid out per `layout`.
///
/// Missing trailing bytes (a short final row) are zero-filled.
pub(crate) fn gather_rows(
    data: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    layout: UnpackLayout,
) -> Vec<u8> {
    let stride = layout.row_stride(width, bytes_per_pixel);
    let row_bytes = width as usize * bytes_per_pixel as usize;
    let mut packed = vec![0u8; row_bytes * height as usize];
    for row in 0..height as usize {
        let start = row * stride;
        if start >= data.len() {
            break;
        }
        let end = (start + row_bytes).min(data.len());
        packed[row * row_bytes..row * row_bytes + (end - start)].copy_from_slice(&data[start..end]);
    }
    packed
}

fn to_rgba8(packed: &[u8], client: ClientFormat) -> Vec<u8> {
    match client {
        ClientFormat::Rgba8 => packed.to_vec(),
        ClientFormat::Bgra8 => packed
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
        ClientFormat::Rgb8 => packed
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        ClientFormat::Bgr8 => packed
            .chunks_exact(3)
            .flat_map(|p| [p[2], p[1], p[0], 255])
            .collect(),
        ClientFormat::R8 => packed.iter().flat_map(|&r| [r, 0, 0, 255]).collect(),
    }
}

/// Converts tightly packed client pixels into the byte layout of `storage`.
///
/// `storage` must be uncompressed.
pub(crate) fn to_storage(packed: &[u8], client: ClientFormat, storage: wgpu::TextureFormat) -> Vec<u8> {
    match storage {
        wgpu::TextureFormat::R8Unorm => match client {
            ClientFormat::R8 => packed.to_vec(),
            _ => to_rgba8(packed, client).chunks_exact(4).map(|p| p[0]).collect(),
        },
        wgpu::TextureFormat::Rgba32Float => to_rgba8(packed, client)
            .iter()
            .flat_map(|&b| (b as f32 / 255.0).to_le_bytes())
            .collect(),
        _ => to_rgba8(packed, client),
    }
}

/// Converts storage bytes back into tightly packed client pixels.
pub(crate) fn from_storage(bytes: &[u8], storage: wgpu::TextureFormat, client: ClientFormat) -> Vec<u8> {
    let rgba: Vec<u8> = match storage {
        wgpu::TextureFormat::R8Unorm => bytes.iter().flat_map(|&r| [r, 0, 0, 255]).collect(),
        wgpu::TextureFormat::Rgba32Float => bytes
            .chunks_exact(4)
            .map(|c| {
                let v = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect(),
        _ => bytes.to_vec(),
    };
    match client {
        ClientFormat::Rgba8 => rgba,
        ClientFormat::Bgra8 => rgba
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
        ClientFormat::Rgb8 => rgba.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        ClientFormat::Bgr8 => rgba.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0]]).collect(),
        ClientFormat::R8 => rgba.chunks_exact(4).map(|p| p[0]).collect(),
    }
}

/// Number of levels in a full mip chain for a `width`x`height` base.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

/// Halves a storage-format level with a 2x2 box filter.
///
/// Odd edges reuse the last row/column.  Returns the new level and its size.
pub(crate) fn downsample(
    bytes: &[u8],
    width: u32,
    height: u32,
    storage: wgpu::TextureFormat,
) -> (Vec<u8>, u32, u32) {
    let bpp = storage_bytes_per_pixel(storage) as usize;
    let mip_width = (width / 2).max(1);
    let mip_height = (height / 2).max(1);
    let texel = |x: u32, y: u32| {
        let x = x.min(width - 1) as usize;
        let y = y.min(height - 1) as usize;
        let offset = (y * width as usize + x) * bpp;
        &bytes[offset..offset + bpp]
    };
    let mut out = Vec::with_capacity(mip_width as usize * mip_height as usize * bpp);
    for mip_y in 0..mip_height {
        for mip_x in 0..mip_width {
            let (bx, by) = (mip_x * 2, mip_y * 2);
            let quad = [texel(bx, by), texel(bx + 1, by), texel(bx, by + 1), texel(bx + 1, by + 1)];
            if storage == wgpu::TextureFormat::Rgba32Float {
                for channel in 0..4 {
                    let sum: f32 = quad
                        .iter()
                        .map(|t| {
                            let c = &t[channel * 4..channel * 4 + 4];
                            f32::from_le_bytes([c[0], c[1], c[2], c[3]])
                        })
                        .sum();
                    out.extend_from_slice(&(sum / 4.0).to_le_bytes());
                }
            } else {
                for channel in 0..bpp {
                    let sum: u32 = quad.iter().map(|t| t[channel] as u32).sum();
                    out.push((sum / 4) as u8);
                }
            }
        }
    }
    (out, mip_width, mip_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_strips_padding() {
        //2x2 RGB with 8-byte rows
        let data = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let layout = UnpackLayout { alignment: 8, row_length: None };
        let packed = gather_rows(&data, 2, 2, 3, layout);
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn bgra_swizzles_to_rgba() {
        let rgba = to_storage(&[3, 2, 1, 9], ClientFormat::Bgra8, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(rgba, vec![1, 2, 3, 9]);
        let rgb = to_storage(&[1, 2, 3], ClientFormat::Rgb8, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(rgb, vec![1, 2, 3, 255]);
    }

    #[test]
    fn float_storage_roundtrips_bytes() {
        let source = [0, 64, 128, 255];
        let stored = to_storage(&source, ClientFormat::Rgba8, wgpu::TextureFormat::Rgba32Float);
        assert_eq!(stored.len(), 16);
        let back = from_storage(&stored, wgpu::TextureFormat::Rgba32Float, ClientFormat::Rgba8);
        assert_eq!(back, source.to_vec());
    }

    #[test]
    fn red_reads_back_as_opaque_red() {
        let back = from_storage(&[7], wgpu::TextureFormat::R8Unorm, ClientFormat::Rgba8);
        assert_eq!(back, vec![7, 0, 0, 255]);
    }

    #[test]
    fn mip_chain() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(8, 8), 4);
        assert_eq!(mip_level_count(5, 3), 3);
        let level = [0, 100, 200, 40];
        let (half, w, h) = downsample(&level, 2, 2, wgpu::TextureFormat::R8Unorm);
        assert_eq!((w, h), (1, 1));
        assert_eq!(half, vec![85]);
    }
}

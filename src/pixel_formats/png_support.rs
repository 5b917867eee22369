// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::io::{Cursor, Write};
use png::{BitDepth, ColorType, Transformations};

/// PNG color type for a tightly packed 8-bit buffer with `bytes_per_pixel` channels.
pub(crate) fn png_color_type(bytes_per_pixel: u32) -> Option<ColorType> {
    match bytes_per_pixel {
        4 => Some(ColorType::Rgba),
        3 => Some(ColorType::Rgb),
        2 => Some(ColorType::GrayscaleAlpha),
        1 => Some(ColorType::Grayscale),
        _ => None,
    }
}

/// Decodes a PNG into tightly packed RGBA8.
///
/// Palette, grayscale and 16-bit images are normalized first, then widened to four channels.
pub(crate) fn decode_rgba8(data: &[u8]) -> Result<(u32, u32, Vec<u8>), png::DecodingError> {
    let mut decoder = png::Decoder::new(Cursor::new(data));
    decoder.set_transformations(Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let (color_type, _) = reader.output_color_type();
    let width = reader.info().width;
    let height = reader.info().height;
    let samples = color_type.samples();
    let mut frame = vec![0u8; width as usize * height as usize * samples];
    let info = reader.next_frame(&mut frame)?;
    frame.truncate(info.line_size * info.height as usize);

    let rgba = match color_type {
        ColorType::Rgba => frame,
        ColorType::Rgb => frame
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        ColorType::GrayscaleAlpha => frame
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        //normalize_to_color8 expands palettes, so Indexed does not reach here in practice
        ColorType::Grayscale | ColorType::Indexed => {
            frame.iter().flat_map(|&g| [g, g, g, 255]).collect()
        }
    };
    Ok((width, height, rgba))
}

/// Encodes a tightly packed 8-bit buffer as PNG.
pub(crate) fn encode<W: Write>(
    writer: W,
    width: u32,
    height: u32,
    color_type: ColorType,
    data: &[u8],
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(color_type);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    writer.finish()
}

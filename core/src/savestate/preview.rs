//! PNG encoding of frame previews.

use crate::core::frame::{BYTES_PER_PIXEL, FRAME_BYTES, FRAME_HEIGHT, FRAME_WIDTH, Frame};

use super::codec::CorruptStateError;

/// Encode a frame as an 8-bit RGB PNG.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, png::EncodingError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, FRAME_WIDTH as u32, FRAME_HEIGHT as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(frame.pixels())?;
        writer.finish()?;
    }
    Ok(out)
}

/// Decode a PNG preview back into a frame.
///
/// Accepts RGB, RGBA, grayscale and grayscale+alpha images (alpha is
/// discarded) but the dimensions must match the native frame size.
pub fn decode_png(bytes: &[u8]) -> Result<Frame, CorruptStateError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| CorruptStateError::Preview(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CorruptStateError::Preview(e.to_string()))?;

    if info.width as usize != FRAME_WIDTH || info.height as usize != FRAME_HEIGHT {
        return Err(CorruptStateError::Preview(format!(
            "preview is {}x{}, expected {FRAME_WIDTH}x{FRAME_HEIGHT}",
            info.width, info.height
        )));
    }

    let data = &buf[..info.buffer_size()];
    let mut rgb = Vec::with_capacity(FRAME_BYTES);
    match info.color_type {
        png::ColorType::Rgb => rgb.extend_from_slice(data),
        png::ColorType::Rgba => {
            for px in data.chunks_exact(4) {
                rgb.extend_from_slice(&px[..BYTES_PER_PIXEL]);
            }
        }
        png::ColorType::Grayscale => {
            for &g in data {
                rgb.extend_from_slice(&[g, g, g]);
            }
        }
        png::ColorType::GrayscaleAlpha => {
            for px in data.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
            }
        }
        other => {
            return Err(CorruptStateError::Preview(format!(
                "unsupported preview color type {other:?}"
            )));
        }
    }

    Frame::from_pixels(&rgb)
        .ok_or_else(|| CorruptStateError::Preview("preview pixel data truncated".into()))
}

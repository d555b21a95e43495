//! PNG to GIF transcoding.
//!
//! GIF is the lowest common denominator: an 8-bit palette format every
//! graphical browser ever shipped can show.

use image::codecs::gif::GifEncoder;
use image::{Frame, ImageFormat, RgbaImage};

use super::CaptureError;

pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, CaptureError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map(|img| img.to_rgba8())
        .map_err(|e| CaptureError::Decode(e.to_string()))
}

/// Quantize to a 256-colour palette and encode a single-frame GIF.
pub fn encode_gif(frame: RgbaImage, speed: i32) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    {
        // The trailer is written when the encoder is dropped.
        let mut encoder = GifEncoder::new_with_speed(&mut buf, speed.clamp(1, 30));
        encoder
            .encode_frame(Frame::new(frame))
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
    }
    Ok(buf)
}

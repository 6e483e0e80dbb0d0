//! Shared helpers for the integration tests: synthetic frames and packet
//! decoding.

#![allow(dead_code)]

use image::RgbImage;
use mjstream::{Frame, PixelFormat};

/// Packed NV12 frame with constant luma and neutral chroma.
pub fn nv12_frame(w: u32, h: u32, luma: u8) -> Frame {
    let mut f = Frame::new_raw(PixelFormat::Nv12, w, h).expect("raw frame");
    let y_len = (w * h) as usize;
    f.bytes[..y_len].fill(luma);
    f.bytes[y_len..].fill(0x80);
    f
}

/// Decode an emitted JPEG packet back to RGB for pixel checks.
pub fn decode(packet: &Frame) -> RgbImage {
    image::load_from_memory(packet.payload())
        .expect("emitted packet must decode")
        .to_rgb8()
}

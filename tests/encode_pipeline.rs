//! End-to-end encode scenarios through the software backend.
//!
//! These exercise the full staging -> overlay -> encode path and check the
//! emitted packets by decoding them again.

mod common;

use common::{decode, nv12_frame};
use image::RgbImage;
use mjstream::encoder::CpuJpegEncoder;
use mjstream::{Frame, PixelFormat, ScalePolicy, SharedState};

/// Mean (Y, U, V) of a decoded image under BT.601 limited range.
fn mean_yuv(img: &RgbImage) -> (f64, f64, f64) {
    let (mut sy, mut su, mut sv) = (0f64, 0f64, 0f64);
    for p in img.pixels() {
        let (r, g, b) = (p[0] as i64, p[1] as i64, p[2] as i64);
        sy += (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as f64;
        su += (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128) as f64;
        sv += (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128) as f64;
    }
    let n = (img.width() * img.height()) as f64;
    (sy / n, su / n, sv / n)
}

#[test]
fn grey_1080p_frame_emits_a_valid_packet() {
    let mut enc = CpuJpegEncoder::new("e2e", 80, ScalePolicy::Native, SharedState::new());
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(1920, 1080, 0x80), &mut out).unwrap();

    assert!(out.used >= 1024);
    assert_eq!(&out.bytes[..3], &[0xFF, 0xD8, 0xFF]);
    assert_eq!(&out.bytes[out.used - 2..out.used], &[0xFF, 0xD9]);

    let img = decode(&out);
    assert_eq!((img.width(), img.height()), (1920, 1080));
    let (y, _, _) = mean_yuv(&img);
    assert!((126.0..=130.0).contains(&y), "mean Y {}", y);
}

#[test]
fn high_quality_grey_round_trips_within_tolerance() {
    let mut enc = CpuJpegEncoder::new("e2e", 95, ScalePolicy::Native, SharedState::new());
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(640, 360, 0x80), &mut out).unwrap();

    let (y, u, v) = mean_yuv(&decode(&out));
    assert!((y - 128.0).abs() < 2.0, "mean Y {}", y);
    assert!((u - 128.0).abs() < 1.0, "mean U {}", u);
    assert!((v - 128.0).abs() < 1.0, "mean V {}", v);
}

#[test]
fn native_policy_downscales_4k_nv12_only() {
    let shared = SharedState::new();
    let mut enc = CpuJpegEncoder::new("e2e", 70, ScalePolicy::Native, shared.clone());
    let mut out = Frame::new_output();

    enc.compress(&nv12_frame(3840, 2160, 0x80), &mut out).unwrap();
    let cfg = enc.configured().unwrap();
    assert_eq!((cfg.width, cfg.height), (1920, 1080));
    assert_eq!(decode(&out).width(), 1920);

    enc.compress(&nv12_frame(1920, 1080, 0x80), &mut out).unwrap();
    let cfg = enc.configured().unwrap();
    assert_eq!((cfg.width, cfg.height), (1920, 1080));

    // Packed RGB never hits the downscaler, whatever its size.
    let mut bgr = Frame::new_raw(PixelFormat::Bgr24, 3840, 2160).unwrap();
    bgr.bytes.fill(0x40);
    let mut enc = CpuJpegEncoder::new("e2e", 70, ScalePolicy::Native, shared);
    enc.compress(&bgr, &mut out).unwrap();
    let cfg = enc.configured().unwrap();
    assert_eq!((cfg.width, cfg.height), (3840, 2160));
}

#[test]
fn frame_size_change_reconfigures_mid_stream() {
    let mut enc = CpuJpegEncoder::new("e2e", 80, ScalePolicy::P2160, SharedState::new());
    let mut out = Frame::new_output();

    enc.compress(&nv12_frame(1920, 1080, 0x80), &mut out).unwrap();
    assert_eq!(
        (enc.configured().unwrap().width, enc.configured().unwrap().height),
        (1920, 1080)
    );
    assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);

    enc.compress(&nv12_frame(2560, 1440, 0x80), &mut out).unwrap();
    let cfg = enc.configured().unwrap();
    assert_eq!((cfg.width, cfg.height), (2560, 1440));
    assert_eq!((cfg.hor_stride, cfg.ver_stride), (2560, 1440));
    assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(decode(&out).width(), 2560);
}

#[test]
fn overlay_text_survives_the_encode() {
    let shared = SharedState::with_bitmap_fonts();
    shared.overlay.update(|cfg| {
        cfg.enabled = true;
        cfg.text = "A".into();
        cfg.scale = 4;
        cfg.fg_y = 235;
        cfg.draw_bg = true;
        cfg.bg_alpha = 0;
        cfg.padding = 2;
    });
    let mut enc = CpuJpegEncoder::new("e2e", 90, ScalePolicy::Native, shared);
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(320, 240, 16), &mut out).unwrap();

    let img = decode(&out);
    // Somewhere in the glyph box there is near-white; the rest of the frame
    // stays near-black (the zero-alpha background box must not lighten it).
    let max_luma = img
        .pixels()
        .map(|p| p[0].max(p[1]).max(p[2]))
        .max()
        .unwrap();
    assert!(max_luma > 180, "glyph luma {}", max_luma);
    let corner = img.get_pixel(319, 239);
    assert!(corner[0] < 40, "corner {:?}", corner);
}

#[test]
fn packets_round_trip_through_the_filesystem() {
    let mut enc = CpuJpegEncoder::new("e2e", 80, ScalePolicy::Native, SharedState::new());
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(320, 240, 0x80), &mut out).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame-00000.jpg");
    std::fs::write(&path, out.payload()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
}

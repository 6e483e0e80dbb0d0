//! Blocking-mode scenarios: background upload, stream replacement, and the
//! raw-frame snapshot, driven through the control API the way the HTTP
//! layer would.

mod common;

use common::{decode, nv12_frame};
use image::RgbImage;
use mjstream::api;
use mjstream::encoder::CpuJpegEncoder;
use mjstream::{Frame, ScalePolicy, SharedState};

fn red_jpeg(w: u32, h: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(w, h, image::Rgb([255, 0, 0]));
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95)
        .encode_image(&img)
        .unwrap();
    out
}

#[test]
fn uploaded_background_replaces_the_stream() {
    let shared = SharedState::with_bitmap_fonts();
    let (w, h) = api::upload_background(&shared.blocking, &red_jpeg(320, 240), None).unwrap();
    assert_eq!((w, h), (320, 240));

    let snap = shared.blocking.snapshot();
    assert!(snap.bg_valid);
    assert_eq!((snap.bg_w, snap.bg_h), (320, 240));

    api::apply_blocking_params(&shared.blocking, [("enabled", "1")]).unwrap();

    let mut enc = CpuJpegEncoder::new("blocked", 90, ScalePolicy::Native, shared);
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(640, 360, 0x80), &mut out)
        .unwrap();

    let img = decode(&out);
    let centre = img.get_pixel(320, 180);
    assert!(centre[0] > 180, "centre {:?}", centre);
    assert!(centre[1] < 100 && centre[2] < 100, "centre {:?}", centre);
}

#[test]
fn blocking_archives_the_live_frame_for_snapshots() {
    let shared = SharedState::with_bitmap_fonts();
    api::apply_blocking_params(&shared.blocking, [("enabled", "1")]).unwrap();

    let src = nv12_frame(320, 180, 0x55);
    let mut enc = CpuJpegEncoder::new("blocked", 80, ScalePolicy::Native, shared.clone());
    let mut out = Frame::new_output();
    enc.compress(&src, &mut out).unwrap();

    let snap = api::raw_snapshot(&shared.blocking).expect("raw frame archived");
    assert_eq!((snap.width, snap.height), (320, 180));
    assert_eq!(snap.bytes, src.payload());

    // The outgoing packet shows the neutral blocking screen, not the live
    // picture: its luma is far darker than the 0x55 source.
    let img = decode(&out);
    let centre = img.get_pixel(160, 90);
    assert!(centre[0] < 60, "centre {:?}", centre);
}

#[test]
fn disabled_blocking_keeps_the_cache_empty() {
    let shared = SharedState::with_bitmap_fonts();
    let mut enc = CpuJpegEncoder::new("clear", 80, ScalePolicy::Native, shared.clone());
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(320, 180, 0x55), &mut out)
        .unwrap();
    assert!(api::raw_snapshot(&shared.blocking).is_none());
}

#[test]
fn vocab_and_stats_text_render_onto_the_blocking_screen() {
    let shared = SharedState::with_bitmap_fonts();
    api::apply_blocking_params(
        &shared.blocking,
        [
            ("enabled", "1"),
            ("text_vocab", "STREAM\\nBLOCKED"),
            ("text_stats", "clients: 0"),
            ("text_vocab_scale", "4"),
            ("text_stats_scale", "2"),
        ],
    )
    .unwrap();

    let mut enc = CpuJpegEncoder::new("blocked", 90, ScalePolicy::Native, shared);
    let mut out = Frame::new_output();
    enc.compress(&nv12_frame(640, 480, 0x80), &mut out)
        .unwrap();

    // The neutral screen is dark; the rendered text pushes some pixels far
    // above it.
    let img = decode(&out);
    let max_luma = img.pixels().map(|p| p[0]).max().unwrap();
    assert!(max_luma > 180, "text luma {}", max_luma);
}

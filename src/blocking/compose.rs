//! The blocking compositor: background, preview window, and text blocks
//! painted onto the encoder's NV12 input buffer.

use mj_scale::nv12::{downscale_nv12_into, fill_nv12};

use crate::blocking::{BlockingConfig, PreviewConfig, RawFrameCache};
use crate::frame::Frame;
use crate::overlay::font::{FaceKind, FontSet};
use crate::overlay::text::{draw_block, measure, Planes, TextStyle};

/// Padding around the blocking text boxes.
const BLOCK_PADDING: u32 = 10;
/// Minimum distance of a text box from the frame edges.
const EDGE_MARGIN: u32 = 10;
const PREVIEW_BORDER: u32 = 2;
const PREVIEW_MIN_W: u32 = 160;
const PREVIEW_MIN_H: u32 = 90;
/// Neutral dark grey used when no background image is stored.
const NEUTRAL_Y: u8 = 32;
const NEUTRAL_UV: u8 = 128;
const BORDER_LUMA: u8 = 235;

/// Composite the blocking screen into `planes`.
///
/// Layer order: background, raw-frame archive (before anything overwrites
/// state derived from the source), preview window, vocabulary text, stats
/// text. `src` is the live packed NV12 capture; `planes` is the encoder
/// input at its aligned strides.
pub fn composite(
    planes: &mut Planes<'_>,
    src: &Frame,
    cfg: &BlockingConfig,
    raw: &RawFrameCache,
    fonts: &FontSet,
) {
    let dst_w = planes.width;
    let dst_h = planes.height;

    if cfg.bg_valid && !cfg.background.is_empty() {
        let ok = downscale_nv12_into(
            &cfg.background,
            cfg.bg_w,
            cfg.bg_h,
            planes.y,
            planes.uv,
            planes.y_stride,
            0,
            0,
            dst_w & !1,
            dst_h & !1,
        )
        .is_ok();
        if !ok {
            fill_nv12(planes.y, planes.uv, NEUTRAL_Y, NEUTRAL_UV);
        }
    } else {
        fill_nv12(planes.y, planes.uv, NEUTRAL_Y, NEUTRAL_UV);
    }

    // Archive the live frame while it is still untouched by this pass.
    raw.store(src.payload(), src.width, src.height, src.stride);

    if let Some((px, py, pw, ph)) = preview_rect(&cfg.preview, dst_w, dst_h) {
        let ok = downscale_nv12_into(
            src.payload(),
            src.width,
            src.height,
            planes.y,
            planes.uv,
            planes.y_stride,
            px,
            py,
            pw,
            ph,
        )
        .is_ok();
        if ok {
            draw_preview_border(planes, px, py, pw, ph);
        }
    }

    let style = |scale: u32| TextStyle {
        scale,
        fg: (cfg.text_y, cfg.text_u, cfg.text_v),
        bg: Some((cfg.box_y, cfg.box_u, cfg.box_v, cfg.box_alpha)),
        padding: BLOCK_PADDING,
    };

    if !cfg.text_vocab.is_empty() {
        let scale = cfg.vocab_scale.clamp(1, 15);
        let (tw, th) = measure(fonts, FaceKind::Bold, &cfg.text_vocab, scale);
        if tw > 0 {
            let box_w = tw + 2 * BLOCK_PADDING;
            // Centred horizontally; vertically centred within the upper 60%
            // band of the frame.
            let x = clamp_to_edges(dst_w.saturating_sub(box_w) / 2, box_w, dst_w);
            let y = clamp_to_edges((dst_h * 6 / 10).saturating_sub(th) / 2, th, dst_h);
            draw_block(
                planes,
                fonts,
                FaceKind::Bold,
                x,
                y,
                &cfg.text_vocab,
                &style(scale),
            );
        }
    }

    if !cfg.text_stats.is_empty() {
        let scale = cfg.stats_scale.clamp(1, 10);
        let (tw, th) = measure(fonts, FaceKind::Mono, &cfg.text_stats, scale);
        if tw > 0 {
            let y = dst_h.saturating_sub(th + 30).max(EDGE_MARGIN);
            draw_block(
                planes,
                fonts,
                FaceKind::Mono,
                20,
                y,
                &cfg.text_stats,
                &style(scale),
            );
        }
    }
}

/// Resolve the preview window rectangle within the destination, or `None`
/// when the preview is disabled or degenerate.
///
/// Oversized previews are shrunk to a fifth of the fitting scale with a
/// 160x90 floor; negative coordinates anchor from the right/bottom edge.
/// Position and size are clamped in-frame and rounded down to even.
pub fn preview_rect(preview: &PreviewConfig, dst_w: u32, dst_h: u32) -> Option<(u32, u32, u32, u32)> {
    if !preview.enabled || preview.w == 0 || preview.h == 0 || dst_w < 2 || dst_h < 2 {
        return None;
    }
    let (mut pw, mut ph) = (preview.w, preview.h);
    if pw > dst_w || ph > dst_h {
        let fit = (dst_w as f32 / pw as f32).min(dst_h as f32 / ph as f32) * 0.2;
        pw = ((pw as f32 * fit) as u32).max(PREVIEW_MIN_W);
        ph = ((ph as f32 * fit) as u32).max(PREVIEW_MIN_H);
    }
    let pw = (pw.min(dst_w)) & !1;
    let ph = (ph.min(dst_h)) & !1;
    if pw < 2 || ph < 2 {
        return None;
    }

    let px = if preview.x < 0 {
        dst_w as i64 + preview.x as i64 - pw as i64
    } else {
        preview.x as i64
    };
    let py = if preview.y < 0 {
        dst_h as i64 + preview.y as i64 - ph as i64
    } else {
        preview.y as i64
    };
    let px = (px.clamp(0, (dst_w - pw) as i64) as u32) & !1;
    let py = (py.clamp(0, (dst_h - ph) as i64) as u32) & !1;
    Some((px, py, pw, ph))
}

fn draw_preview_border(planes: &mut Planes<'_>, x: u32, y: u32, w: u32, h: u32) {
    let stride = planes.y_stride;
    for row in 0..PREVIEW_BORDER.min(h) {
        let top = (y + row) as usize * stride + x as usize;
        planes.y[top..top + w as usize].fill(BORDER_LUMA);
        let bottom = (y + h - 1 - row) as usize * stride + x as usize;
        planes.y[bottom..bottom + w as usize].fill(BORDER_LUMA);
    }
    for row in 0..h {
        let off = (y + row) as usize * stride + x as usize;
        for col in 0..PREVIEW_BORDER.min(w) {
            planes.y[off + col as usize] = BORDER_LUMA;
            planes.y[off + (w - 1 - col) as usize] = BORDER_LUMA;
        }
    }
}

/// Keep a box of extent `extent` at least [`EDGE_MARGIN`] away from both
/// edges of a `limit`-wide axis.
fn clamp_to_edges(pos: u32, extent: u32, limit: u32) -> u32 {
    let max = limit.saturating_sub(extent + EDGE_MARGIN).max(EDGE_MARGIN);
    pos.clamp(EDGE_MARGIN, max)
}

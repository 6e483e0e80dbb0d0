//! Text overlay drawn onto the encoder's NV12 input buffer.
//!
//! The overlay state is shared between the HTTP control side (writer) and
//! the encoder workers (readers). Workers take a snapshot under the mutex at
//! the top of each frame and then render lock-free; a frame never observes a
//! half-applied update.

pub mod font;
pub mod text;

use std::str::FromStr;
use std::sync::Mutex;

use serde::Serialize;

use crate::overlay::font::{FaceKind, FontSet};
use crate::overlay::text::{draw_block, Planes, TextStyle};

/// Maximum overlay text length accepted from the control surface.
pub const MAX_TEXT: usize = 256;

/// Anchor for the overlay box within the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Explicit top-left corner from the config's `x`/`y` fields.
    Custom,
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tl" | "top_left" => Ok(Self::TopLeft),
            "tr" | "top_right" => Ok(Self::TopRight),
            "bl" | "bottom_left" => Ok(Self::BottomLeft),
            "br" | "bottom_right" => Ok(Self::BottomRight),
            "center" => Ok(Self::Center),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown overlay position: {}", other)),
        }
    }
}

/// Overlay configuration, snapshot-copied per frame.
#[derive(Clone, Debug, Serialize)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub text: String,
    pub position: OverlayPosition,
    pub x: u32,
    pub y: u32,
    /// Glyph magnification, 1..=10.
    pub scale: u32,
    pub fg_y: u8,
    pub fg_u: u8,
    pub fg_v: u8,
    pub draw_bg: bool,
    pub bg_y: u8,
    pub bg_u: u8,
    pub bg_v: u8,
    pub bg_alpha: u8,
    pub padding: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            position: OverlayPosition::TopLeft,
            x: 0,
            y: 0,
            scale: 1,
            fg_y: 235,
            fg_u: 128,
            fg_v: 128,
            draw_bg: true,
            bg_y: 16,
            bg_u: 128,
            bg_v: 128,
            bg_alpha: 200,
            padding: 10,
        }
    }
}

/// Shared overlay handle: one writer (control surface), many readers
/// (encoder workers).
pub struct OverlayState {
    cfg: Mutex<OverlayConfig>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            cfg: Mutex::new(OverlayConfig::default()),
        }
    }

    pub fn snapshot(&self) -> OverlayConfig {
        self.cfg.lock().expect("overlay mutex poisoned").clone()
    }

    /// Apply a mutation atomically; readers see either the old or the new
    /// snapshot, never a mix.
    pub fn update(&self, apply: impl FnOnce(&mut OverlayConfig)) {
        let mut cfg = self.cfg.lock().expect("overlay mutex poisoned");
        apply(&mut cfg);
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the overlay snapshot onto NV12 planes. No-op when disabled or the
/// text is empty.
pub fn render(planes: &mut Planes<'_>, cfg: &OverlayConfig, fonts: &FontSet) {
    if !cfg.enabled || cfg.text.is_empty() {
        return;
    }
    let scale = cfg.scale.clamp(1, 10);
    let (tw, th) = text::measure(fonts, FaceKind::Bold, &cfg.text, scale);
    if tw == 0 || th == 0 {
        return;
    }

    let box_w = tw + 2 * cfg.padding;
    let box_h = th + 2 * cfg.padding;
    let fw = planes.width;
    let fh = planes.height;
    let (x, y) = match cfg.position {
        OverlayPosition::TopLeft => (0, 0),
        OverlayPosition::TopRight => (fw.saturating_sub(box_w), 0),
        OverlayPosition::BottomLeft => (0, fh.saturating_sub(box_h)),
        OverlayPosition::BottomRight => {
            (fw.saturating_sub(box_w), fh.saturating_sub(box_h))
        }
        OverlayPosition::Center => (
            fw.saturating_sub(box_w) / 2,
            fh.saturating_sub(box_h) / 2,
        ),
        OverlayPosition::Custom => (
            cfg.x.min(fw.saturating_sub(box_w)),
            cfg.y.min(fh.saturating_sub(box_h)),
        ),
    };

    let style = TextStyle {
        scale,
        fg: (cfg.fg_y, cfg.fg_u, cfg.fg_v),
        bg: cfg
            .draw_bg
            .then_some((cfg.bg_y, cfg.bg_u, cfg.bg_v, cfg.bg_alpha)),
        padding: cfg.padding,
    };
    draw_block(planes, fonts, FaceKind::Bold, x, y, &cfg.text, &style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mj_scale::align16;

    fn planes_for(buf: &mut [u8], w: u32, h: u32) -> Planes<'_> {
        let stride = align16(w) as usize;
        let ver = align16(h) as usize;
        let (y, uv) = buf.split_at_mut(stride * ver);
        Planes {
            y,
            uv,
            y_stride: stride,
            uv_stride: stride,
            width: w,
            height: h,
        }
    }

    #[test]
    fn disabled_overlay_touches_nothing() {
        let mut buf = vec![16u8; 64 * 64 * 2];
        let mut planes = planes_for(&mut buf, 64, 64);
        let cfg = OverlayConfig {
            text: "A".into(),
            ..OverlayConfig::default()
        };
        let fonts = FontSet::without_truetype();
        render(&mut planes, &cfg, &fonts);
        assert!(buf.iter().all(|&b| b == 16));
    }

    #[test]
    fn opaque_glyph_pixels_take_foreground_luma() {
        // 64x64 all-black frame (Y=16); "A" at scale 1 with a transparent
        // background box must produce Y=235 exactly at glyph pixels and
        // leave the rest untouched.
        let stride = align16(64) as usize;
        let mut buf = vec![0u8; stride * 64 + stride * 32];
        buf[..stride * 64].fill(16);
        buf[stride * 64..].fill(128);
        let mut planes = planes_for(&mut buf, 64, 64);
        let cfg = OverlayConfig {
            enabled: true,
            text: "A".into(),
            scale: 1,
            fg_y: 235,
            draw_bg: true,
            bg_alpha: 0,
            padding: 2,
            ..OverlayConfig::default()
        };
        let fonts = FontSet::without_truetype();
        render(&mut planes, &cfg, &fonts);

        let y_plane = &buf[..stride * 64];
        let lit: usize = y_plane.iter().filter(|&&b| b == 235).count();
        assert!(lit > 0, "glyph should have set some pixels");
        // Every pixel is either untouched background or full foreground: a
        // zero-alpha box blend leaves Y unchanged and the bitmap glyph is
        // binary coverage.
        assert!(y_plane.iter().all(|&b| b == 16 || b == 235));
        // Far corner untouched.
        assert_eq!(y_plane[63 * stride + 63], 16);
    }

    #[test]
    fn snapshot_is_coherent_under_update() {
        let state = OverlayState::new();
        state.update(|c| {
            c.enabled = true;
            c.text = "cam-1".into();
            c.scale = 3;
        });
        let snap = state.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.text, "cam-1");
        assert_eq!(snap.scale, 3);
    }
}

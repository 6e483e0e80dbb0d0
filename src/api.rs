//! Control-surface semantics for the overlay and blocking endpoints.
//!
//! This module is transport-free: the HTTP layer hands in decoded query
//! parameters and request bodies, and gets back JSON snapshots or validation
//! errors. Mutations are all-or-nothing: every parameter is parsed and
//! validated against a staged copy first, and only a fully valid set is
//! committed, so a bad request leaves the previous configuration intact.

use serde_json::Value;

use crate::blocking::{
    background, BlockingConfig, BlockingState, MAX_STATS_TEXT, MAX_VOCAB_TEXT,
};
use crate::error::{EncodeError, Result as EncodeResult};
use crate::overlay::{OverlayState, MAX_TEXT};

/// JSON snapshot of the overlay configuration (`GET /overlay`).
pub fn overlay_snapshot(state: &OverlayState) -> Value {
    serde_json::to_value(state.snapshot()).unwrap_or(Value::Null)
}

/// JSON snapshot of the blocking configuration (`GET /blocking`). The
/// background bytes are omitted; only their validity and geometry appear.
pub fn blocking_snapshot(state: &BlockingState) -> Value {
    serde_json::to_value(state.snapshot()).unwrap_or(Value::Null)
}

/// Apply a set of overlay parameters (`GET /overlay/set?...`).
pub fn apply_overlay_params<'a>(
    state: &OverlayState,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<(), String> {
    let mut staged = state.snapshot();
    for (key, value) in params {
        match key {
            "enabled" => staged.enabled = parse_bool(key, value)?,
            "text" => {
                let text = decode_text(value);
                if text.len() > MAX_TEXT {
                    return Err(format!("text exceeds {} bytes", MAX_TEXT));
                }
                staged.text = text;
            }
            "position" => staged.position = value.parse()?,
            "x" => staged.x = parse_num(key, value)?,
            "y" => staged.y = parse_num(key, value)?,
            "scale" => staged.scale = parse_ranged(key, value, 1, 10)?,
            "y_color" => staged.fg_y = parse_num(key, value)?,
            "u_color" => staged.fg_u = parse_num(key, value)?,
            "v_color" => staged.fg_v = parse_num(key, value)?,
            "bg_enabled" => staged.draw_bg = parse_bool(key, value)?,
            "bg_y" => staged.bg_y = parse_num(key, value)?,
            "bg_u" => staged.bg_u = parse_num(key, value)?,
            "bg_v" => staged.bg_v = parse_num(key, value)?,
            "bg_alpha" => staged.bg_alpha = parse_num(key, value)?,
            "padding" => staged.padding = parse_ranged(key, value, 0, 64)?,
            other => return Err(format!("unknown overlay parameter: {}", other)),
        }
    }
    state.update(|cfg| *cfg = staged);
    Ok(())
}

/// Apply a set of blocking parameters (`GET /blocking/set?...`).
///
/// A truthy `clear` resets everything (including the background and the raw
/// frame cache) before the remaining parameters are applied.
pub fn apply_blocking_params<'a>(
    state: &BlockingState,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<(), String> {
    let params: Vec<(&str, &str)> = params.into_iter().collect();
    let clear = params
        .iter()
        .find(|(k, _)| *k == "clear")
        .map(|(k, v)| parse_bool(k, v))
        .transpose()?
        .unwrap_or(false);

    let mut staged = if clear {
        BlockingConfig::default()
    } else {
        state.snapshot()
    };

    for (key, value) in &params {
        match *key {
            "clear" => {}
            "enabled" => staged.enabled = parse_bool(key, value)?,
            "text_vocab" => {
                let text = decode_text(value);
                if text.len() > MAX_VOCAB_TEXT {
                    return Err(format!("text_vocab exceeds {} bytes", MAX_VOCAB_TEXT));
                }
                staged.text_vocab = text;
            }
            "text_stats" => {
                let text = decode_text(value);
                if text.len() > MAX_STATS_TEXT {
                    return Err(format!("text_stats exceeds {} bytes", MAX_STATS_TEXT));
                }
                staged.text_stats = text;
            }
            "text_vocab_scale" => staged.vocab_scale = parse_ranged(key, value, 1, 15)?,
            "text_stats_scale" => staged.stats_scale = parse_ranged(key, value, 1, 10)?,
            "preview_x" => staged.preview.x = parse_num(key, value)?,
            "preview_y" => staged.preview.y = parse_num(key, value)?,
            "preview_w" => staged.preview.w = parse_num(key, value)?,
            "preview_h" => staged.preview.h = parse_num(key, value)?,
            "preview_enabled" => staged.preview.enabled = parse_bool(key, value)?,
            "text_y" => staged.text_y = parse_num(key, value)?,
            "text_u" => staged.text_u = parse_num(key, value)?,
            "text_v" => staged.text_v = parse_num(key, value)?,
            "box_y" => staged.box_y = parse_num(key, value)?,
            "box_u" => staged.box_u = parse_num(key, value)?,
            "box_v" => staged.box_v = parse_num(key, value)?,
            "box_alpha" => staged.box_alpha = parse_num(key, value)?,
            other => return Err(format!("unknown blocking parameter: {}", other)),
        }
    }

    if clear {
        state.raw_cache().clear();
    }
    state.update(|cfg| *cfg = staged);
    Ok(())
}

/// Store a new blocking background (`POST /blocking/background`).
///
/// A body starting with the JPEG SOI marker is decoded as JPEG; anything
/// else is treated as raw NV12 and requires the `width`/`height` query
/// parameters.
pub fn upload_background(
    state: &BlockingState,
    body: &[u8],
    raw_geometry: Option<(u32, u32)>,
) -> EncodeResult<(u32, u32)> {
    if body.len() >= 2 && body[0] == 0xFF && body[1] == 0xD8 {
        return background::upload_jpeg(state, body);
    }
    match raw_geometry {
        Some((w, h)) => background::upload_raw_nv12(state, body, w, h),
        None => Err(EncodeError::jpeg_decode(
            "body is not a JPEG and no width/height was given",
        )),
    }
}

/// Copy of the last raw capture frame (`GET /snapshot/raw`).
pub struct RawSnapshot {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

pub fn raw_snapshot(state: &BlockingState) -> Option<RawSnapshot> {
    let guard = state.raw_cache().get()?;
    Some(RawSnapshot {
        bytes: guard.bytes().to_vec(),
        width: guard.width(),
        height: guard.height(),
        stride: guard.stride(),
    })
}

/// Text arrives URL-decoded from the transport; a literal `\n` sequence
/// stands for a newline.
fn decode_text(value: &str) -> String {
    value.replace("\\n", "\n")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("{}: expected a boolean, got {:?}", key, other)),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("{}: invalid number {:?}", key, value))
}

fn parse_ranged(key: &str, value: &str, min: u32, max: u32) -> Result<u32, String> {
    let n: u32 = parse_num(key, value)?;
    if (min..=max).contains(&n) {
        Ok(n)
    } else {
        Err(format!("{}: {} outside [{}, {}]", key, n, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayPosition;

    #[test]
    fn overlay_set_applies_a_subset() {
        let state = OverlayState::new();
        apply_overlay_params(
            &state,
            [
                ("enabled", "1"),
                ("text", "cam-1\\nline2"),
                ("position", "br"),
                ("scale", "3"),
            ],
        )
        .unwrap();
        let snap = state.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.text, "cam-1\nline2");
        assert_eq!(snap.position, OverlayPosition::BottomRight);
        assert_eq!(snap.scale, 3);
        // Untouched fields keep their defaults.
        assert_eq!(snap.fg_y, 235);
    }

    #[test]
    fn invalid_overlay_set_changes_nothing() {
        let state = OverlayState::new();
        let before = state.snapshot();
        let err = apply_overlay_params(&state, [("text", "hello"), ("scale", "11")]);
        assert!(err.is_err());
        let after = state.snapshot();
        assert_eq!(after.text, before.text);
        assert_eq!(after.scale, before.scale);
    }

    #[test]
    fn blocking_set_parses_negative_preview_anchors() {
        let state = BlockingState::new();
        apply_blocking_params(
            &state,
            [
                ("enabled", "1"),
                ("preview_x", "-40"),
                ("preview_y", "-40"),
                ("preview_w", "384"),
                ("preview_h", "216"),
                ("preview_enabled", "1"),
            ],
        )
        .unwrap();
        let snap = state.snapshot();
        assert!(snap.enabled);
        assert_eq!(snap.preview.x, -40);
        assert_eq!(snap.preview.w, 384);
        assert!(state.is_enabled_fast());
    }

    #[test]
    fn clear_resets_and_then_applies() {
        let state = BlockingState::new();
        apply_blocking_params(&state, [("enabled", "1"), ("text_vocab", "blocked")]).unwrap();
        apply_blocking_params(&state, [("clear", "1"), ("text_stats", "fps: 0")]).unwrap();
        let snap = state.snapshot();
        assert!(!snap.enabled);
        assert!(snap.text_vocab.is_empty());
        assert_eq!(snap.text_stats, "fps: 0");
    }

    #[test]
    fn snapshot_json_has_no_background_bytes() {
        let state = BlockingState::new();
        let json = blocking_snapshot(&state);
        assert!(json.get("background").is_none());
        assert_eq!(json["bg_valid"], serde_json::json!(false));
    }

    #[test]
    fn background_body_is_autodetected_by_magic() {
        let state = BlockingState::new();
        // Not a JPEG, no geometry: rejected.
        assert!(upload_background(&state, &[0u8; 64], None).is_err());
        // Raw NV12 with geometry: accepted.
        let nv12 = vec![0u8; 8 * 8 * 3 / 2];
        let (w, h) = upload_background(&state, &nv12, Some((8, 8))).unwrap();
        assert_eq!((w, h), (8, 8));
        assert!(state.snapshot().bg_valid);
    }
}

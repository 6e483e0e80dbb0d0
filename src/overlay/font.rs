//! Lazily loaded TrueType faces shared by all encoder workers.
//!
//! The rasteriser is treated as non-reentrant at the face level, so every
//! face operation happens under one process-wide mutex. The lock is held
//! only for the duration of a single text block's measurement or
//! rasterisation; text is small relative to encode cost.

use std::fs;
use std::sync::{Mutex, Once};

use rusttype::Font;

/// Base pixel size at overlay scale 1; multiplied by the text scale.
pub const BASE_FONT_SIZE: f32 = 16.0;

/// Which face a text block renders with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceKind {
    /// Proportional bold, used for overlay and vocabulary text.
    Bold,
    /// Monospace, used for stats text.
    Mono,
}

const BOLD_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
];

const MONO_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
];

enum FaceSlot {
    Unloaded,
    Loaded(Font<'static>),
    /// Load failed; the bitmap fallback is used from here on.
    Failed,
}

struct Faces {
    bold: FaceSlot,
    mono: FaceSlot,
}

/// The shared font handle. Constructed once and passed into the encoder
/// pool factory; cloned by reference everywhere else.
pub struct FontSet {
    faces: Mutex<Faces>,
    /// When set, TrueType loading is skipped entirely (bitmap-only mode,
    /// also used by tests for deterministic output).
    disabled: bool,
}

static FALLBACK_WARNING: Once = Once::new();

impl FontSet {
    pub fn new() -> Self {
        Self {
            faces: Mutex::new(Faces {
                bold: FaceSlot::Unloaded,
                mono: FaceSlot::Unloaded,
            }),
            disabled: false,
        }
    }

    /// A set that never loads TrueType faces; every draw takes the bitmap
    /// path.
    pub fn without_truetype() -> Self {
        Self {
            faces: Mutex::new(Faces {
                bold: FaceSlot::Failed,
                mono: FaceSlot::Failed,
            }),
            disabled: true,
        }
    }

    /// Run `op` against a face while holding the rasteriser lock.
    ///
    /// Returns `None` when the face is unavailable; callers fall back to the
    /// bitmap renderer. The first failed load is logged once.
    pub fn with_face<R>(&self, kind: FaceKind, op: impl FnOnce(&Font<'static>) -> R) -> Option<R> {
        if self.disabled {
            return None;
        }
        let mut faces = self.faces.lock().expect("font mutex poisoned");
        let slot = match kind {
            FaceKind::Bold => &mut faces.bold,
            FaceKind::Mono => &mut faces.mono,
        };
        if let FaceSlot::Unloaded = slot {
            *slot = match load_face(kind) {
                Some(font) => FaceSlot::Loaded(font),
                None => {
                    FALLBACK_WARNING.call_once(|| {
                        log::warn!(
                            "no TrueType face found for {:?}; using bitmap font fallback",
                            kind
                        );
                    });
                    FaceSlot::Failed
                }
            };
        }
        match slot {
            FaceSlot::Loaded(font) => Some(op(font)),
            _ => None,
        }
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self::new()
    }
}

fn load_face(kind: FaceKind) -> Option<Font<'static>> {
    let paths = match kind {
        FaceKind::Bold => BOLD_PATHS,
        FaceKind::Mono => MONO_PATHS,
    };
    for path in paths {
        if let Ok(bytes) = fs::read(path) {
            if let Some(font) = Font::try_from_vec(bytes) {
                return Some(font);
            }
            log::warn!("unusable TrueType data in {}", path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_set_always_falls_back() {
        let fonts = FontSet::without_truetype();
        assert!(fonts.with_face(FaceKind::Bold, |_| ()).is_none());
        assert!(fonts.with_face(FaceKind::Mono, |_| ()).is_none());
    }
}

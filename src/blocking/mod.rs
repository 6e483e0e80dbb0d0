//! Blocking mode: replace the outgoing picture with a composited screen.
//!
//! When blocking is enabled the compositor paints a background, an optional
//! scaled-down preview of the live capture, and two text blocks over the
//! encoder's input buffer. The live frame itself is archived in the raw
//! cache so a snapshot endpoint can still serve it.
//!
//! Configuration is mutex-protected and snapshot-copied per frame. The
//! `enabled` flag is mirrored into an atomic so the common "blocking off"
//! case costs one relaxed load and no lock on the encode hot path.

pub mod background;
pub mod compose;
pub mod raw_cache;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

pub use raw_cache::{RawFrameCache, RawFrameGuard};

/// Preallocated background slot bound: 4K 4:2:0.
pub const MAX_BACKGROUND_BYTES: usize = 3840 * 2160 * 3 / 2;
pub const MAX_VOCAB_TEXT: usize = 1024;
pub const MAX_STATS_TEXT: usize = 512;

/// Preview window placement. Negative coordinates anchor from the
/// right/bottom edge of the destination.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PreviewConfig {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub enabled: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            x: -40,
            y: -40,
            w: 384,
            h: 216,
            enabled: false,
        }
    }
}

/// Blocking-mode configuration, snapshot-copied per frame.
///
/// The background bytes live behind an `Arc` so a snapshot is a refcount
/// bump, not a 12 MiB copy; uploads swap the whole slot under the mutex.
#[derive(Clone, Debug, Serialize)]
pub struct BlockingConfig {
    pub enabled: bool,
    #[serde(skip)]
    pub background: Arc<Vec<u8>>,
    pub bg_w: u32,
    pub bg_h: u32,
    pub bg_valid: bool,
    pub preview: PreviewConfig,
    pub text_vocab: String,
    pub text_stats: String,
    /// Vocabulary text magnification, 1..=15.
    pub vocab_scale: u32,
    /// Stats text magnification, 1..=10.
    pub stats_scale: u32,
    pub text_y: u8,
    pub text_u: u8,
    pub text_v: u8,
    pub box_y: u8,
    pub box_u: u8,
    pub box_v: u8,
    pub box_alpha: u8,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            background: Arc::new(Vec::new()),
            bg_w: 0,
            bg_h: 0,
            bg_valid: false,
            preview: PreviewConfig::default(),
            text_vocab: String::new(),
            text_stats: String::new(),
            vocab_scale: 4,
            stats_scale: 2,
            text_y: 235,
            text_u: 128,
            text_v: 128,
            box_y: 16,
            box_u: 128,
            box_v: 128,
            box_alpha: 200,
        }
    }
}

/// Shared blocking handle: control surface writes, encoder workers read.
pub struct BlockingState {
    cfg: Mutex<BlockingConfig>,
    enabled_fast: AtomicBool,
    raw: RawFrameCache,
}

impl BlockingState {
    pub fn new() -> Self {
        Self {
            cfg: Mutex::new(BlockingConfig::default()),
            enabled_fast: AtomicBool::new(false),
            raw: RawFrameCache::new(),
        }
    }

    /// Lock-free check used once per frame before any blocking work.
    pub fn is_enabled_fast(&self) -> bool {
        self.enabled_fast.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BlockingConfig {
        self.cfg.lock().expect("blocking mutex poisoned").clone()
    }

    /// Apply a mutation atomically and republish the fast-path flag.
    pub fn update(&self, apply: impl FnOnce(&mut BlockingConfig)) {
        let mut cfg = self.cfg.lock().expect("blocking mutex poisoned");
        apply(&mut cfg);
        self.enabled_fast.store(cfg.enabled, Ordering::Release);
    }

    pub fn raw_cache(&self) -> &RawFrameCache {
        &self.raw
    }

    /// Reset to defaults, dropping background and cached raw frame.
    pub fn clear(&self) {
        self.update(|cfg| *cfg = BlockingConfig::default());
        self.raw.clear();
    }
}

impl Default for BlockingState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_flag_tracks_enabled() {
        let state = BlockingState::new();
        assert!(!state.is_enabled_fast());
        state.update(|c| c.enabled = true);
        assert!(state.is_enabled_fast());
        state.clear();
        assert!(!state.is_enabled_fast());
    }

    #[test]
    fn snapshot_shares_background_without_copying() {
        let state = BlockingState::new();
        state.update(|c| {
            c.background = Arc::new(vec![0u8; 64]);
            c.bg_valid = true;
        });
        let a = state.snapshot();
        let b = state.snapshot();
        assert!(Arc::ptr_eq(&a.background, &b.background));
    }
}

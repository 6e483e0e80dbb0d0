//! # mjstream
//!
//! Hardware-accelerated MJPEG frame-encoding pipeline for a streaming
//! server. Raw frames come in from a V4L2-class capture interface;
//! independently decodable JPEG packets come out for HTTP delivery.
//!
//! ## Architecture
//!
//! The pipeline is a straight line with optional stages:
//!
//! 1. **Staging**: the source frame is copied (and, for oversized NV12,
//!    downscaled) into an input buffer at hardware-aligned strides
//!    (`mj_scale` crate).
//! 2. **Blocking compositor**: when enabled, the staged picture is replaced
//!    by a background, a scaled preview window, and two text blocks
//!    ([`blocking`]).
//! 3. **Text overlay**: an optional TrueType/bitmap label is alpha-blended
//!    onto the staged NV12 planes ([`overlay`]).
//! 4. **Encode**: a software JPEG backend, or a vendor video-engine adapter
//!    behind the `mpp-hardware` feature ([`encoder`]).
//!
//! A [`pool::EncoderPool`] runs N workers, each owning one encoder
//! instance; the vendor context is not thread-safe and never leaves its
//! worker. The only cross-worker state is the read-mostly overlay/blocking
//! configuration in [`SharedState`], snapshot-copied under a mutex at the
//! top of every frame.
//!
//! ## Control surface
//!
//! The HTTP layer is an external collaborator; [`api`] implements the
//! endpoint semantics (JSON snapshots, validated parameter sets, background
//! upload, raw-frame snapshot) without a transport.

use std::sync::Arc;

pub mod api;
pub mod blocking;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod pool;

pub use config::StreamConfig;
pub use encoder::{Encoder, EncoderKind};
pub use error::{EncodeError, Result};
pub use frame::Frame;
pub use mj_scale::{PixelFormat, ScalePolicy};

use crate::blocking::BlockingState;
use crate::overlay::font::FontSet;
use crate::overlay::OverlayState;

/// Shared, read-mostly state every encoder worker consults per frame:
/// overlay and blocking configuration plus the process-wide font set.
///
/// Constructed once by the embedder and cloned into the pool factory;
/// clones are cheap handle copies.
#[derive(Clone)]
pub struct SharedState {
    pub overlay: Arc<OverlayState>,
    pub blocking: Arc<BlockingState>,
    pub fonts: Arc<FontSet>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            overlay: Arc::new(OverlayState::new()),
            blocking: Arc::new(BlockingState::new()),
            fonts: Arc::new(FontSet::new()),
        }
    }

    /// Variant that never loads TrueType faces; text rendering uses the
    /// built-in bitmap font. Used by tests for deterministic pixels.
    pub fn with_bitmap_fonts() -> Self {
        Self {
            fonts: Arc::new(FontSet::without_truetype()),
            ..Self::new()
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

//! Single-slot cache of the last raw capture frame.
//!
//! The blocking compositor stores the live frame here right before it
//! overwrites the encoder input, so the snapshot endpoint can still serve
//! the unblocked picture. Readers get a borrowing guard that releases the
//! slot's mutex on scope exit.

use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct RawSlot {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    stride: u32,
    valid: bool,
}

/// Shared single-slot raw NV12 frame cache.
#[derive(Default)]
pub struct RawFrameCache {
    slot: Mutex<RawSlot>,
}

impl RawFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy one packed NV12 frame into the slot. The backing buffer grows
    /// monotonically; if growth fails the cache is cleared instead of
    /// aborting the frame.
    pub fn store(&self, bytes: &[u8], width: u32, height: u32, stride: u32) {
        let mut slot = self.slot.lock().expect("raw cache mutex poisoned");
        if slot.bytes.len() < bytes.len() {
            let extra = bytes.len() - slot.bytes.len();
            if slot.bytes.try_reserve(extra).is_err() {
                slot.valid = false;
                return;
            }
            slot.bytes.resize(bytes.len(), 0);
        }
        slot.bytes[..bytes.len()].copy_from_slice(bytes);
        slot.width = width;
        slot.height = height;
        slot.stride = stride;
        slot.valid = true;
    }

    /// Borrow the cached frame, or `None` when nothing valid is stored. The
    /// mutex is held for the guard's lifetime.
    pub fn get(&self) -> Option<RawFrameGuard<'_>> {
        let slot = self.slot.lock().expect("raw cache mutex poisoned");
        if slot.valid {
            Some(RawFrameGuard { slot })
        } else {
            None
        }
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock().expect("raw cache mutex poisoned");
        slot.valid = false;
    }
}

/// Scoped borrow of the cached frame; the slot stays locked until drop.
pub struct RawFrameGuard<'a> {
    slot: MutexGuard<'a, RawSlot>,
}

impl RawFrameGuard<'_> {
    pub fn bytes(&self) -> &[u8] {
        let used = self.slot.stride as usize * self.slot.height as usize * 3 / 2;
        &self.slot.bytes[..used.min(self.slot.bytes.len())]
    }

    pub fn width(&self) -> u32 {
        self.slot.width
    }

    pub fn height(&self) -> u32 {
        self.slot.height
    }

    pub fn stride(&self) -> u32 {
        self.slot.stride
    }
}

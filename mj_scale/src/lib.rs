// SPDX-License-Identifier: MIT
//! Pixel-format arithmetic and semi-planar scaling for the mjstream core.
//!
//! This crate is the pure, allocation-light half of the encoding pipeline:
//! it knows how frames are laid out in memory and how to move pixels between
//! layouts, and nothing else. No I/O, no hardware, no shared state.
//!
//! - [`format`]: the closed catalogue of capture pixel formats with plane,
//!   stride, and byte-count arithmetic.
//! - [`policy`]: the user-selectable target-resolution rule that collapses
//!   input geometry onto a fixed set of output geometries.
//! - [`nv12`]: fixed-point nearest-neighbour NV12 downscaling and
//!   stride-aligned plane copies into caller-provided buffers.

pub mod format;
pub mod nv12;
pub mod policy;

pub use format::{FormatError, PixelFormat};
pub use nv12::{align16, ScaleError};
pub use policy::{resolve_target, ScalePolicy, TargetGeometry};

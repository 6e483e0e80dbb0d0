//! Error types for the encoding pipeline.
//!
//! One hierarchical error enum covers every failure the pipeline surfaces.
//! Adapter errors bubble out of `compress` unmodified; the worker layer
//! drops the affected frame and moves on, so classification here is about
//! what the *next* frame should expect, not about retrying this one.

use std::{error::Error as StdError, fmt};

use mj_scale::ScaleError;

/// Convenience alias used throughout the encoder core.
pub type Result<T> = std::result::Result<T, EncodeError>;

/// Failures surfaced by the encoding pipeline.
#[derive(Debug)]
pub enum EncodeError {
    /// Source frame format outside the supported set.
    UnsupportedFormat { format: String },
    /// Adapter reconfiguration failed; the adapter is back in its
    /// unconfigured state and the next frame triggers a fresh attempt.
    Reconfigure {
        reason: String,
        source: Option<Box<EncodeError>>,
    },
    /// Context, config, or buffer allocation failed.
    AllocFailed { resource: String, reason: String },
    /// CPU-cache flush of the DMA buffer failed. Submitting without it
    /// produces stale-cache artefacts, so the frame is dropped instead.
    DmaSync { reason: String },
    /// The vendor context rejected a frame submission.
    SubmitFailed { reason: String },
    /// No packet could be retrieved after a successful submission.
    RetrieveFailed { reason: String },
    /// The vendor returned a packet with no payload.
    EmptyPacket,
    /// Frame bytes do not match the geometry implied by its metadata.
    OversizedFrame { needed: usize, got: usize },
    /// Uploaded background exceeds the preallocated 4K 4:2:0 slot.
    BackgroundTooLarge { bytes: usize, max: usize },
    /// Background JPEG could not be decoded.
    JpegDecode { reason: String },
    /// No usable TrueType face could be loaded.
    FontLoad { path: String, reason: String },
    /// Shutdown was requested while waiting for work.
    IoCancelled,
}

impl EncodeError {
    pub fn unsupported_format(format: impl fmt::Display) -> Self {
        Self::UnsupportedFormat {
            format: format.to_string(),
        }
    }

    pub fn reconfigure(reason: impl Into<String>) -> Self {
        Self::Reconfigure {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn reconfigure_from(reason: impl Into<String>, source: EncodeError) -> Self {
        Self::Reconfigure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn alloc(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AllocFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn dma_sync(reason: impl Into<String>) -> Self {
        Self::DmaSync {
            reason: reason.into(),
        }
    }

    pub fn submit(reason: impl Into<String>) -> Self {
        Self::SubmitFailed {
            reason: reason.into(),
        }
    }

    pub fn retrieve(reason: impl Into<String>) -> Self {
        Self::RetrieveFailed {
            reason: reason.into(),
        }
    }

    pub fn jpeg_decode(reason: impl Into<String>) -> Self {
        Self::JpegDecode {
            reason: reason.into(),
        }
    }

    pub fn font_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FontLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the *next* frame may reasonably succeed after this failure.
    ///
    /// Reconfiguration and vendor transfer failures are transient: the
    /// adapter resets to unconfigured and retries on the next frame. Format
    /// and validation failures repeat until the caller changes its input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Reconfigure { .. }
            | Self::AllocFailed { .. }
            | Self::DmaSync { .. }
            | Self::SubmitFailed { .. }
            | Self::RetrieveFailed { .. }
            | Self::EmptyPacket => true,
            Self::UnsupportedFormat { .. }
            | Self::OversizedFrame { .. }
            | Self::BackgroundTooLarge { .. }
            | Self::JpegDecode { .. }
            | Self::FontLoad { .. }
            | Self::IoCancelled => false,
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { format } => {
                write!(f, "unsupported pixel format: {}", format)
            }
            Self::Reconfigure { reason, .. } => {
                write!(f, "encoder reconfiguration failed: {}", reason)
            }
            Self::AllocFailed { resource, reason } => {
                write!(f, "failed to allocate {}: {}", resource, reason)
            }
            Self::DmaSync { reason } => write!(f, "DMA cache sync failed: {}", reason),
            Self::SubmitFailed { reason } => write!(f, "frame submission failed: {}", reason),
            Self::RetrieveFailed { reason } => {
                write!(f, "packet retrieval failed: {}", reason)
            }
            Self::EmptyPacket => write!(f, "encoder returned an empty packet"),
            Self::OversizedFrame { needed, got } => {
                write!(f, "frame size mismatch: need {} bytes, have {}", needed, got)
            }
            Self::BackgroundTooLarge { bytes, max } => {
                write!(f, "background too large: {} bytes (max {})", bytes, max)
            }
            Self::JpegDecode { reason } => write!(f, "JPEG decode failed: {}", reason),
            Self::FontLoad { path, reason } => {
                write!(f, "failed to load font {}: {}", path, reason)
            }
            Self::IoCancelled => write!(f, "operation cancelled by shutdown"),
        }
    }
}

impl StdError for EncodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Reconfigure {
                source: Some(inner),
                ..
            } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

impl From<ScaleError> for EncodeError {
    fn from(e: ScaleError) -> Self {
        match e {
            ScaleError::BufferTooSmall { needed, got } => Self::OversizedFrame { needed, got },
            ScaleError::BadGeometry { width, height } => Self::Reconfigure {
                reason: format!("unusable scale geometry {}x{}", width, height),
                source: None,
            },
        }
    }
}

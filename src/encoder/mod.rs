//! Encoder backends and their shared configuration machinery.
//!
//! Two backends emit the same packets: a CPU JPEG path that works anywhere,
//! and a vendor video-engine adapter compiled behind the `mpp-hardware`
//! feature. Planning (target geometry, strides, buffer sizing) and staging
//! are shared so both follow identical semantics up to the actual encode.

pub mod cpu;
#[cfg(feature = "mpp-hardware")]
pub mod mpp;
pub mod plan;
mod stage;

pub use cpu::CpuJpegEncoder;
pub use plan::{EncoderConfig, EncoderState};

use mj_scale::ScalePolicy;

use crate::error::{EncodeError, Result};
use crate::frame::Frame;
use crate::SharedState;

/// Backend selection from the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EncoderKind {
    /// Software JPEG encoder.
    #[clap(name = "cpu-jpeg")]
    CpuJpeg,
    /// Vendor video-engine JPEG encoder (requires the `mpp-hardware`
    /// feature and a supported device).
    #[clap(name = "mpp-jpeg")]
    MppJpeg,
}

/// A worker's encoder instance. Not thread-safe; owned by exactly one
/// worker thread.
pub enum Encoder {
    Cpu(CpuJpegEncoder),
    #[cfg(feature = "mpp-hardware")]
    Mpp(mpp::MppJpegEncoder),
}

impl Encoder {
    pub fn new(
        kind: EncoderKind,
        name: impl Into<String>,
        quality: u8,
        policy: ScalePolicy,
        shared: SharedState,
    ) -> Result<Self> {
        match kind {
            EncoderKind::CpuJpeg => Ok(Self::Cpu(CpuJpegEncoder::new(
                name, quality, policy, shared,
            ))),
            #[cfg(feature = "mpp-hardware")]
            EncoderKind::MppJpeg => Ok(Self::Mpp(mpp::MppJpegEncoder::new(
                name, quality, policy, shared,
            ))),
            #[cfg(not(feature = "mpp-hardware"))]
            EncoderKind::MppJpeg => Err(EncodeError::alloc(
                "mpp encoder",
                "built without the mpp-hardware feature",
            )),
        }
    }

    /// Encode one source frame into a standalone JPEG packet.
    pub fn compress(&mut self, src: &Frame, out: &mut Frame) -> Result<()> {
        match self {
            Self::Cpu(enc) => enc.compress(src, out),
            #[cfg(feature = "mpp-hardware")]
            Self::Mpp(enc) => enc.compress(src, out),
        }
    }

    pub fn configured(&self) -> Option<&EncoderConfig> {
        match self {
            Self::Cpu(enc) => enc.configured(),
            #[cfg(feature = "mpp-hardware")]
            Self::Mpp(enc) => enc.configured(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "mpp-hardware"))]
    #[test]
    fn mpp_selection_fails_cleanly_without_the_feature() {
        let shared = SharedState::new();
        assert!(Encoder::new(
            EncoderKind::MppJpeg,
            "enc0",
            80,
            ScalePolicy::Native,
            shared
        )
        .is_err());
    }

    #[test]
    fn cpu_selection_always_works() {
        let shared = SharedState::new();
        assert!(Encoder::new(
            EncoderKind::CpuJpeg,
            "enc0",
            80,
            ScalePolicy::Native,
            shared
        )
        .is_ok());
    }
}

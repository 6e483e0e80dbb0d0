//! Validated pipeline configuration shared by the CLI and embedders.

use mj_scale::ScalePolicy;

use crate::encoder::EncoderKind;
use crate::pool::PoolOptions;

/// Everything needed to bring up the encoder pool.
///
/// Construct, `validate()`, then convert to [`PoolOptions`]. Validation
/// errors are plain strings aimed at the operator.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub encoder: EncoderKind,
    pub scale: ScalePolicy,
    /// JPEG quality, 1..=99 (99 = best).
    pub quality: u8,
    /// Parallel encoder workers, 1..=16.
    pub workers: usize,
}

impl StreamConfig {
    pub fn new(encoder: EncoderKind, scale: ScalePolicy, quality: u8, workers: usize) -> Self {
        Self {
            encoder,
            scale,
            quality,
            workers,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=99).contains(&self.quality) {
            return Err(format!(
                "quality must be between 1 and 99, got {}",
                self.quality
            ));
        }
        if !(1..=16).contains(&self.workers) {
            return Err(format!(
                "workers must be between 1 and 16, got {}",
                self.workers
            ));
        }
        Ok(())
    }

    pub fn to_pool_options(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            kind: self.encoder,
            quality: self.quality,
            policy: self.scale,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::CpuJpeg,
            scale: ScalePolicy::Native,
            quality: 80,
            workers: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut cfg = StreamConfig::default();
        cfg.quality = 0;
        assert!(cfg.validate().is_err());
        cfg.quality = 100;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.workers = 0;
        assert!(cfg.validate().is_err());
        cfg.workers = 17;
        assert!(cfg.validate().is_err());
    }
}

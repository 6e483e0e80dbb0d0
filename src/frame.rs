//! Owned video frame: byte buffer plus geometry, format, and timing metadata.

use std::time::Instant;

use mj_scale::PixelFormat;

use crate::error::{EncodeError, Result};

/// One video frame moving through the pipeline.
///
/// Created by the capture side, read by an encoder worker, consumed by the
/// streaming side. For raw formats `used` always equals the byte count
/// implied by `format` and geometry; for JPEG output frames it is the packet
/// length within `bytes`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Luma stride of `bytes`; equals `width` for packed capture output.
    pub stride: u32,
    pub format: PixelFormat,
    /// Valid byte count within `bytes`.
    pub used: usize,
    pub capture_ts: Option<Instant>,
    pub encode_begin_ts: Option<Instant>,
    pub encode_end_ts: Option<Instant>,
    /// Every MJPEG packet is independently decodable.
    pub is_key: bool,
    pub gop: u32,
}

impl Frame {
    /// Allocate a zeroed raw frame of the exact size its format implies.
    pub fn new_raw(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        let used = format
            .bytes_per_frame(width, height, width)
            .map_err(|_| EncodeError::unsupported_format(format))?;
        Ok(Self {
            bytes: vec![0u8; used],
            width,
            height,
            stride: width,
            format,
            used,
            capture_ts: Some(Instant::now()),
            encode_begin_ts: None,
            encode_end_ts: None,
            is_key: false,
            gop: 0,
        })
    }

    /// Empty container for an encoder to fill with a JPEG packet.
    pub fn new_output() -> Self {
        Self {
            bytes: Vec::new(),
            width: 0,
            height: 0,
            stride: 0,
            format: PixelFormat::Jpeg,
            used: 0,
            capture_ts: None,
            encode_begin_ts: None,
            encode_end_ts: None,
            is_key: false,
            gop: 0,
        }
    }

    /// Byte count implied by this frame's format and geometry.
    pub fn expected_used(&self) -> Result<usize> {
        self.format
            .bytes_per_frame(self.width, self.height, self.stride)
            .map_err(|_| EncodeError::unsupported_format(self.format))
    }

    /// Validate the `used` invariant for a raw frame handed to an encoder.
    pub fn check_raw(&self) -> Result<()> {
        let needed = self.expected_used()?;
        if self.used != needed || self.bytes.len() < needed {
            return Err(EncodeError::OversizedFrame {
                needed,
                got: self.used,
            });
        }
        Ok(())
    }

    /// The valid payload slice.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.used.min(self.bytes.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_used_bytes_invariant() {
        let f = Frame::new_raw(PixelFormat::Nv12, 1920, 1080).unwrap();
        assert_eq!(f.used, 1920 * 1080 + (1920 * 1080) / 2);
        assert!(f.check_raw().is_ok());
    }

    #[test]
    fn tampered_used_count_is_caught() {
        let mut f = Frame::new_raw(PixelFormat::Yuyv, 640, 480).unwrap();
        f.used -= 1;
        assert!(matches!(
            f.check_raw(),
            Err(EncodeError::OversizedFrame { .. })
        ));
    }

    #[test]
    fn jpeg_frames_have_no_raw_geometry() {
        assert!(Frame::new_raw(PixelFormat::Jpeg, 640, 480).is_err());
        let out = Frame::new_output();
        assert!(out.expected_used().is_err());
    }
}

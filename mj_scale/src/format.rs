// SPDX-License-Identifier: MIT
// Closed catalogue of capture pixel formats with plane/stride arithmetic.

use std::fmt;
use std::str::FromStr;

/// Pixel layouts accepted from the capture side.
///
/// The set is closed: everything the encoder pipeline can be handed is one of
/// these variants. `Jpeg` is carried for already-compressed frames and is
/// treated as opaque bytes; it has no computable plane geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Semi-planar 4:2:0, Y plane then interleaved UV at half height.
    Nv12,
    /// Semi-planar 4:2:2, chroma plane at full height.
    Nv16,
    /// Semi-planar 4:4:4, chroma at full width and height.
    Nv24,
    /// Packed 4:2:2, Y0 U Y1 V byte order.
    Yuyv,
    /// Packed 4:2:2, U Y0 V Y1 byte order.
    Uyvy,
    /// Packed 8-bit RGB.
    Rgb24,
    /// Packed 8-bit BGR.
    Bgr24,
    /// Compressed JPEG, opaque bytes.
    Jpeg,
}

impl PixelFormat {
    /// True for the semi-planar YUV layouts (Y plane followed by an
    /// interleaved UV plane).
    pub fn is_semiplanar_yuv(self) -> bool {
        matches!(self, Self::Nv12 | Self::Nv16 | Self::Nv24)
    }

    /// Bytes per pixel-row unit for the packed layouts. Semi-planar and JPEG
    /// layouts have no single per-pixel byte count.
    pub fn packed_channels(self) -> Option<usize> {
        match self {
            Self::Yuyv | Self::Uyvy => Some(2),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            _ => None,
        }
    }

    /// Total byte count of one frame of `w` x `h` with the given luma stride.
    ///
    /// `stride` is the aligned luma width: bytes per Y row for semi-planar
    /// layouts, pixels per row for the packed ones. For NV12 this is
    /// `stride*h + stride*(h/2)`; packed layouts are `stride*h*channels`.
    /// JPEG has no computable size and fails.
    pub fn bytes_per_frame(self, w: u32, h: u32, stride: u32) -> Result<usize, FormatError> {
        let _ = w;
        let (stride, h) = (stride as usize, h as usize);
        match self {
            Self::Nv12 => Ok(stride * h + stride * (h / 2)),
            Self::Nv16 => Ok(stride * h * 2),
            Self::Nv24 => Ok(stride * h * 3),
            Self::Yuyv | Self::Uyvy => Ok(stride * h * 2),
            Self::Rgb24 | Self::Bgr24 => Ok(stride * h * 3),
            Self::Jpeg => Err(FormatError::Opaque(self)),
        }
    }

    /// Byte offsets of the Y plane and, for semi-planar layouts, the UV
    /// plane within one frame buffer.
    pub fn plane_offsets(
        self,
        w: u32,
        h: u32,
        stride: u32,
    ) -> Result<(usize, Option<usize>), FormatError> {
        let _ = w;
        match self {
            Self::Nv12 | Self::Nv16 | Self::Nv24 => {
                Ok((0, Some(stride as usize * h as usize)))
            }
            Self::Yuyv | Self::Uyvy | Self::Rgb24 | Self::Bgr24 => Ok((0, None)),
            Self::Jpeg => Err(FormatError::Opaque(self)),
        }
    }

    /// Short lowercase name, matching the CLI/API spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::Nv12 => "nv12",
            Self::Nv16 => "nv16",
            Self::Nv24 => "nv24",
            Self::Yuyv => "yuyv",
            Self::Uyvy => "uyvy",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nv12" => Ok(Self::Nv12),
            "nv16" => Ok(Self::Nv16),
            "nv24" => Ok(Self::Nv24),
            "yuyv" => Ok(Self::Yuyv),
            "uyvy" => Ok(Self::Uyvy),
            "rgb24" => Ok(Self::Rgb24),
            "bgr24" => Ok(Self::Bgr24),
            "jpeg" => Ok(Self::Jpeg),
            other => Err(FormatError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum FormatError {
    /// The format has no computable plane geometry (JPEG).
    Opaque(PixelFormat),
    /// Name outside the closed set.
    Unknown(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Opaque(fmt_) => {
                write!(f, "format {} has no fixed plane geometry", fmt_)
            }
            FormatError::Unknown(name) => write!(f, "unsupported pixel format: {}", name),
        }
    }
}

impl std::error::Error for FormatError {}

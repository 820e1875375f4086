//! Depth sample formats and format negotiation.
//!
//! The capture subsystem tags each depth buffer with a FourCC sample code.
//! [`FormatDescriptor::describe`] turns a tagged [`DepthFrame`] into an
//! immutable descriptor, the cache key that decides whether the converter's
//! pipeline is still valid, and rejects anything the converter cannot
//! interpret with [`Error::UnsupportedFormat`].
//!
//! # Design Principles
//!
//! - **Type safety**: sample formats are an enum, not raw tag values
//! - **Zero-cost**: descriptors are small `Copy` types
//! - **Explicit**: descriptor equality is plain field equality, nothing fuzzy

use crate::error::{Error, Result};
use crate::frame::DepthFrame;
use std::fmt;

// ============================================================================
// FourCc
// ============================================================================

/// A four-character sample format tag.
///
/// Depth sources use the CoreVideo depth codes (`fdep`, `hdep`, `fdis`,
/// `hdis`); V4L2-class sensors use `Z16 ` for millimeter depth.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Create a tag from its four bytes.
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

// ============================================================================
// SampleFormat
// ============================================================================

/// Depth sample format enumeration.
///
/// Covers the two source families the converter understands: floating-point
/// depth/disparity maps (LiDAR-class sensors) and 16-bit millimeter depth
/// (structured-light/ToF sensors). All multi-byte samples are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 32-bit float metric depth in meters (`fdep`).
    DepthF32,
    /// 16-bit half-float metric depth in meters (`hdep`).
    DepthF16,
    /// 32-bit float normalized disparity, 1/meters (`fdis`).
    DisparityF32,
    /// 16-bit half-float normalized disparity, 1/meters (`hdis`).
    DisparityF16,
    /// 16-bit unsigned depth in millimeters, 0 = no measurement (`Z16 `).
    DepthU16Mm,
}

impl SampleFormat {
    /// Map a FourCC tag to a sample format, if recognized.
    pub fn from_fourcc(code: FourCc) -> Option<Self> {
        match &code.0 {
            b"fdep" => Some(Self::DepthF32),
            b"hdep" => Some(Self::DepthF16),
            b"fdis" => Some(Self::DisparityF32),
            b"hdis" => Some(Self::DisparityF16),
            b"Z16 " => Some(Self::DepthU16Mm),
            _ => None,
        }
    }

    /// The FourCC tag for this format.
    pub const fn fourcc(self) -> FourCc {
        match self {
            Self::DepthF32 => FourCc(*b"fdep"),
            Self::DepthF16 => FourCc(*b"hdep"),
            Self::DisparityF32 => FourCc(*b"fdis"),
            Self::DisparityF16 => FourCc(*b"hdis"),
            Self::DepthU16Mm => FourCc(*b"Z16 "),
        }
    }

    /// Bytes occupied by one sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::DepthF32 | Self::DisparityF32 => 4,
            Self::DepthF16 | Self::DisparityF16 | Self::DepthU16Mm => 2,
        }
    }

    /// Whether samples encode disparity (inverse depth) rather than depth.
    pub const fn is_disparity(self) -> bool {
        matches!(self, Self::DisparityF32 | Self::DisparityF16)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fourcc())
    }
}

// ============================================================================
// FormatDescriptor
// ============================================================================

/// Immutable snapshot of a depth buffer's shape and sample layout.
///
/// Two descriptors are equal iff all fields match; the converter uses that
/// equality to decide whether its cached pipeline can be reused or must be
/// rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    /// Frame width in samples.
    pub width: u32,
    /// Frame height in rows.
    pub height: u32,
    /// Sample format of the frame.
    pub sample_format: SampleFormat,
    /// Bytes from the start of one row to the start of the next.
    pub bytes_per_row: usize,
}

impl FormatDescriptor {
    /// Extract a descriptor from an incoming frame.
    ///
    /// Pure and side-effect free. Fails with [`Error::UnsupportedFormat`]
    /// when the frame's tag is unknown, its dimensions are zero, its stride
    /// is smaller than one row of samples, or its data slice is too short
    /// for the declared layout. The last row may be unpadded.
    pub fn describe(frame: &DepthFrame<'_>) -> Result<Self> {
        let sample_format = SampleFormat::from_fourcc(frame.fourcc).ok_or_else(|| {
            Error::UnsupportedFormat(format!("unknown sample tag '{}'", frame.fourcc))
        })?;

        if frame.width == 0 || frame.height == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "zero dimensions: {}x{}",
                frame.width, frame.height
            )));
        }

        let row_bytes = (frame.width as usize)
            .checked_mul(sample_format.bytes_per_sample())
            .ok_or_else(|| Error::UnsupportedFormat("row size overflows".into()))?;
        if frame.bytes_per_row < row_bytes {
            return Err(Error::UnsupportedFormat(format!(
                "stride {} is smaller than one row of {} bytes",
                frame.bytes_per_row, row_bytes
            )));
        }

        let needed = frame
            .bytes_per_row
            .checked_mul(frame.height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| Error::UnsupportedFormat("frame size overflows".into()))?;
        if frame.data.len() < needed {
            return Err(Error::UnsupportedFormat(format!(
                "buffer holds {} bytes, layout needs {}",
                frame.data.len(),
                needed
            )));
        }

        Ok(Self {
            width: frame.width,
            height: frame.height,
            sample_format,
            bytes_per_row: frame.bytes_per_row,
        })
    }

    /// Whether a cached pipeline built for `self` can process frames
    /// described by `incoming`.
    ///
    /// True iff all descriptor fields are equal.
    pub fn is_compatible(&self, incoming: &FormatDescriptor) -> bool {
        self == incoming
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} stride {}",
            self.width, self.height, self.sample_format, self.bytes_per_row
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame<'a>(fourcc: &[u8; 4], w: u32, h: u32, stride: usize, data: &'a [u8]) -> DepthFrame<'a> {
        DepthFrame::new(FourCc::new(fourcc), w, h, stride, data)
    }

    #[test]
    fn test_describe_depth_f32() {
        let data = vec![0u8; 4 * 4 * 2];
        let desc = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 16, &data)).unwrap();

        assert_eq!(desc.width, 4);
        assert_eq!(desc.height, 2);
        assert_eq!(desc.sample_format, SampleFormat::DepthF32);
        assert_eq!(desc.bytes_per_row, 16);
    }

    #[test]
    fn test_describe_unknown_tag() {
        let data = vec![0u8; 64];
        let err = FormatDescriptor::describe(&frame(b"RGBA", 4, 2, 16, &data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_describe_zero_dimensions() {
        let err = FormatDescriptor::describe(&frame(b"fdep", 0, 2, 0, &[])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_describe_stride_too_small() {
        let data = vec![0u8; 64];
        let err = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 8, &data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_describe_buffer_too_short() {
        let data = vec![0u8; 16];
        let err = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 16, &data)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_describe_allows_unpadded_last_row() {
        // Stride 24 with padding, but the final row stops at the sample data.
        let data = vec![0u8; 24 + 16];
        let desc = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 24, &data)).unwrap();
        assert_eq!(desc.bytes_per_row, 24);
    }

    #[test]
    fn test_compatibility_is_field_equality() {
        let data = vec![0u8; 4 * 4 * 2];
        let a = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 16, &data)).unwrap();
        let b = FormatDescriptor::describe(&frame(b"fdep", 4, 2, 16, &data)).unwrap();
        assert!(a.is_compatible(&b));

        let c = FormatDescriptor::describe(&frame(b"fdis", 4, 2, 16, &data)).unwrap();
        assert!(!a.is_compatible(&c));

        let d = FormatDescriptor {
            bytes_per_row: 32,
            ..a
        };
        assert!(!a.is_compatible(&d));
    }

    #[test]
    fn test_fourcc_roundtrip() {
        for format in [
            SampleFormat::DepthF32,
            SampleFormat::DepthF16,
            SampleFormat::DisparityF32,
            SampleFormat::DisparityF16,
            SampleFormat::DepthU16Mm,
        ] {
            assert_eq!(SampleFormat::from_fourcc(format.fourcc()), Some(format));
        }
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCc::new(b"Z16 ").to_string(), "Z16 ");
        assert_eq!(FourCc::new(&[0x01, b'a', b'b', b'c']).to_string(), "\\x01abc");
    }
}

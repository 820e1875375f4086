//! Depth frame types.
//!
//! A [`DepthFrame`] is a borrowed view of one captured depth map: the raw
//! sample bytes plus the layout information needed to interpret them. The
//! converter borrows a frame for the duration of a single render call and
//! never takes ownership of the sample data.
//!
//! [`DepthFrameBuf`] is the owned counterpart, used when a frame has to
//! cross a thread boundary (e.g. into the processing worker).

use crate::format::FourCc;

/// A borrowed view of one captured depth map.
///
/// The sample data is interpreted according to `fourcc`; validation of the
/// tag and layout happens in
/// [`FormatDescriptor::describe`](crate::format::FormatDescriptor::describe),
/// not at construction.
#[derive(Debug, Clone, Copy)]
pub struct DepthFrame<'a> {
    /// Sample format tag as delivered by the capture subsystem.
    pub fourcc: FourCc,
    /// Frame width in samples.
    pub width: u32,
    /// Frame height in rows.
    pub height: u32,
    /// Bytes from the start of one row to the start of the next.
    pub bytes_per_row: usize,
    /// Raw sample bytes, at least `bytes_per_row * (height - 1)` plus one
    /// unpadded row.
    pub data: &'a [u8],
}

impl<'a> DepthFrame<'a> {
    /// Create a frame view over borrowed sample data.
    pub const fn new(
        fourcc: FourCc,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        data: &'a [u8],
    ) -> Self {
        Self {
            fourcc,
            width,
            height,
            bytes_per_row,
            data,
        }
    }
}

/// An owned depth frame.
///
/// Same layout contract as [`DepthFrame`], but the sample bytes are owned so
/// the frame can be sent across channels.
#[derive(Debug, Clone)]
pub struct DepthFrameBuf {
    /// Sample format tag as delivered by the capture subsystem.
    pub fourcc: FourCc,
    /// Frame width in samples.
    pub width: u32,
    /// Frame height in rows.
    pub height: u32,
    /// Bytes from the start of one row to the start of the next.
    pub bytes_per_row: usize,
    /// Raw sample bytes.
    pub data: Vec<u8>,
}

impl DepthFrameBuf {
    /// Create an owned frame from raw sample bytes.
    pub fn new(fourcc: FourCc, width: u32, height: u32, bytes_per_row: usize, data: Vec<u8>) -> Self {
        Self {
            fourcc,
            width,
            height,
            bytes_per_row,
            data,
        }
    }

    /// Pack tightly-strided 32-bit metric depth samples into an owned frame.
    ///
    /// Samples are row-major, little-endian, `width * height` of them.
    pub fn depth_f32(width: u32, height: u32, samples: &[f32]) -> Self {
        Self::packed_f32(crate::format::SampleFormat::DepthF32, width, height, samples)
    }

    /// Pack tightly-strided 32-bit disparity samples into an owned frame.
    pub fn disparity_f32(width: u32, height: u32, samples: &[f32]) -> Self {
        Self::packed_f32(
            crate::format::SampleFormat::DisparityF32,
            width,
            height,
            samples,
        )
    }

    fn packed_f32(
        format: crate::format::SampleFormat,
        width: u32,
        height: u32,
        samples: &[f32],
    ) -> Self {
        assert_eq!(
            samples.len(),
            width as usize * height as usize,
            "sample count does not match dimensions"
        );
        let mut data = Vec::with_capacity(samples.len() * 4);
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            fourcc: format.fourcc(),
            width,
            height,
            bytes_per_row: width as usize * 4,
            data,
        }
    }

    /// Borrow this frame as a [`DepthFrame`] view.
    pub fn as_frame(&self) -> DepthFrame<'_> {
        DepthFrame {
            fourcc: self.fourcc,
            width: self.width,
            height: self.height,
            bytes_per_row: self.bytes_per_row,
            data: &self.data,
        }
    }
}

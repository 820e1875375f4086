//! The depth-to-grayscale numeric kernel.
//!
//! Maps raw depth or disparity samples into 8-bit intensities with a clamped
//! linear transform over a fixed metric range:
//!
//! - Valid depth spans [`MIN_DEPTH_M`]..=[`MAX_DEPTH_M`] meters. Intensity
//!   increases with distance: near is dark, far is bright.
//! - Depth below the minimum clamps to 0, above the maximum clamps to 255.
//! - Disparity samples are converted to depth (`d = 1/disparity`) first, so
//!   both source families share one direction and one range.
//! - Invalid samples (NaN, infinities, non-positive disparity, and the
//!   `Z16` zero sentinel) map to [`INVALID_INTENSITY`], deterministically.

use crate::format::{FormatDescriptor, SampleFormat};

/// Lower bound of the valid metric depth range, in meters.
pub const MIN_DEPTH_M: f32 = 0.0;

/// Upper bound of the valid metric depth range, in meters.
///
/// Chosen as the working envelope of short-range LiDAR and structured-light
/// sensors; anything farther saturates to full brightness.
pub const MAX_DEPTH_M: f32 = 4.0;

/// Intensity written for samples the sensor could not measure.
pub const INVALID_INTENSITY: u8 = 0;

/// Map a metric depth sample to an output intensity.
///
/// Clamped linear over [`MIN_DEPTH_M`]..=[`MAX_DEPTH_M`], rounded to the
/// nearest integer. NaN and infinities yield [`INVALID_INTENSITY`].
pub fn intensity_for_depth_m(depth_m: f32) -> u8 {
    if !depth_m.is_finite() {
        return INVALID_INTENSITY;
    }
    let norm = ((depth_m - MIN_DEPTH_M) / (MAX_DEPTH_M - MIN_DEPTH_M)).clamp(0.0, 1.0);
    (norm * 255.0).round() as u8
}

/// Map a disparity sample (1/meters) to an output intensity.
///
/// Non-positive and non-finite disparity yields [`INVALID_INTENSITY`];
/// otherwise the sample is inverted to depth and mapped like
/// [`intensity_for_depth_m`].
pub fn intensity_for_disparity(disparity: f32) -> u8 {
    if !disparity.is_finite() || disparity <= 0.0 {
        return INVALID_INTENSITY;
    }
    intensity_for_depth_m(disparity.recip())
}

/// Map a millimeter depth sample to an output intensity.
///
/// Zero is the sensor's no-measurement sentinel and yields
/// [`INVALID_INTENSITY`].
pub fn intensity_for_depth_mm(depth_mm: u16) -> u8 {
    if depth_mm == 0 {
        return INVALID_INTENSITY;
    }
    intensity_for_depth_m(depth_mm as f32 / 1000.0)
}

/// Decode an IEEE 754 binary16 value.
pub(crate) fn f16_to_f32(bits: u16) -> f32 {
    let sign = (bits >> 15) as u32;
    let exp = ((bits >> 10) & 0x1f) as u32;
    let frac = (bits & 0x3ff) as u32;
    match (exp, frac) {
        (0, 0) => f32::from_bits(sign << 31),
        (0, _) => {
            // Subnormal: frac * 2^-24
            let v = frac as f32 * 2f32.powi(-24);
            if sign == 1 { -v } else { v }
        }
        (0x1f, 0) => {
            if sign == 1 {
                f32::NEG_INFINITY
            } else {
                f32::INFINITY
            }
        }
        (0x1f, _) => f32::NAN,
        _ => f32::from_bits((sign << 31) | ((exp + 112) << 23) | (frac << 13)),
    }
}

/// Convert one frame of samples into a grayscale plane.
///
/// `input` is laid out per `desc`; `output` receives one byte per sample at
/// `output_stride` bytes per row. Both slices must be large enough for the
/// descriptor's dimensions; callers validate shape before getting here.
pub(crate) fn convert_frame(
    desc: &FormatDescriptor,
    input: &[u8],
    output: &mut [u8],
    output_stride: usize,
) {
    let width = desc.width as usize;
    let bps = desc.sample_format.bytes_per_sample();

    for y in 0..desc.height as usize {
        let in_row = &input[y * desc.bytes_per_row..][..width * bps];
        let out_row = &mut output[y * output_stride..][..width];

        match desc.sample_format {
            SampleFormat::DepthF32 => {
                for (px, out) in in_row.chunks_exact(4).zip(out_row.iter_mut()) {
                    let d = f32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                    *out = intensity_for_depth_m(d);
                }
            }
            SampleFormat::DisparityF32 => {
                for (px, out) in in_row.chunks_exact(4).zip(out_row.iter_mut()) {
                    let d = f32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                    *out = intensity_for_disparity(d);
                }
            }
            SampleFormat::DepthF16 => {
                for (px, out) in in_row.chunks_exact(2).zip(out_row.iter_mut()) {
                    let d = f16_to_f32(u16::from_le_bytes([px[0], px[1]]));
                    *out = intensity_for_depth_m(d);
                }
            }
            SampleFormat::DisparityF16 => {
                for (px, out) in in_row.chunks_exact(2).zip(out_row.iter_mut()) {
                    let d = f16_to_f32(u16::from_le_bytes([px[0], px[1]]));
                    *out = intensity_for_disparity(d);
                }
            }
            SampleFormat::DepthU16Mm => {
                for (px, out) in in_row.chunks_exact(2).zip(out_row.iter_mut()) {
                    *out = intensity_for_depth_mm(u16::from_le_bytes([px[0], px[1]]));
                }
            }
        }
    }
}

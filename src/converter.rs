//! The stateful depth-to-grayscale converter.
//!
//! [`DepthGrayscaleConverter`] follows an explicit two-phase contract:
//! callers check [`is_prepared`](DepthGrayscaleConverter::is_prepared),
//! call [`prepare`](DepthGrayscaleConverter::prepare) once per distinct
//! input format, then [`render`](DepthGrayscaleConverter::render)
//! repeatedly. Preparing builds the output frame pool for the negotiated
//! descriptor; rendering recycles pooled frames and never allocates.
//!
//! Every operation takes `&mut self`, so exclusive access is enforced by
//! the compiler; cross-context serialization is the caller's job (see
//! [`worker`](crate::worker) for the confinement this crate ships).

use crate::convert;
use crate::error::{Error, Result};
use crate::format::FormatDescriptor;
use crate::frame::DepthFrame;
use crate::pool::{FramePool, GrayFrame, PoolStats};

/// Converts depth frames into pooled grayscale frames.
///
/// Starts unprepared. The pipeline is either fully absent or fully built
/// for exactly one [`FormatDescriptor`]; there is no observable half state.
///
/// # Example
///
/// ```rust
/// use depthgray::converter::DepthGrayscaleConverter;
/// use depthgray::format::FormatDescriptor;
/// use depthgray::frame::DepthFrameBuf;
///
/// let captured = DepthFrameBuf::depth_f32(4, 4, &[1.5; 16]);
/// let frame = captured.as_frame();
///
/// let mut converter = DepthGrayscaleConverter::new();
/// if !converter.is_prepared() {
///     let desc = FormatDescriptor::describe(&frame)?;
///     converter.prepare(desc, 3)?;
/// }
/// let gray = converter.render(&frame).expect("frame matches descriptor");
/// assert_eq!(gray.width(), 4);
/// # Ok::<(), depthgray::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct DepthGrayscaleConverter {
    pipeline: Option<ConversionPipeline>,
}

/// Everything `prepare` builds: the cache key and the frame pool.
#[derive(Debug)]
struct ConversionPipeline {
    descriptor: FormatDescriptor,
    pool: FramePool,
}

impl DepthGrayscaleConverter {
    /// Create an unprepared converter.
    pub fn new() -> Self {
        Self { pipeline: None }
    }

    /// Whether the converter holds a pipeline and can render. No side
    /// effects.
    pub fn is_prepared(&self) -> bool {
        self.pipeline.is_some()
    }

    /// The descriptor the current pipeline was built for, if any.
    pub fn prepared_descriptor(&self) -> Option<&FormatDescriptor> {
        self.pipeline.as_ref().map(|p| &p.descriptor)
    }

    /// Statistics of the current frame pool, if prepared.
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pipeline.as_ref().map(|p| p.pool.stats())
    }

    /// Build (or rebuild) the pipeline for `descriptor`.
    ///
    /// `retained_frame_count` is the ceiling on output frames in flight at
    /// once; a caller holding that many unreleased frames will see the next
    /// render fail with [`Error::PoolExhausted`].
    ///
    /// Idempotent: an already-matching descriptor is a no-op and the pool
    /// instance is untouched. On failure the previous state is kept intact,
    /// whether that was unprepared or a working pipeline for another format.
    pub fn prepare(&mut self, descriptor: FormatDescriptor, retained_frame_count: usize) -> Result<()> {
        if let Some(pipeline) = &self.pipeline {
            if pipeline.descriptor.is_compatible(&descriptor) {
                return Ok(());
            }
        }

        // Build the new pool before touching current state.
        let pool = FramePool::new(descriptor.width, descriptor.height, retained_frame_count)?;
        tracing::info!(
            format = %descriptor,
            frames = retained_frame_count,
            rebuild = self.pipeline.is_some(),
            "prepared depth conversion pipeline"
        );
        self.pipeline = Some(ConversionPipeline { descriptor, pool });
        Ok(())
    }

    /// Convert one depth frame, reporting the exact failure on error.
    ///
    /// Fails with [`Error::NotPrepared`] before a successful prepare, with
    /// [`Error::ShapeMismatch`] when the frame's descriptor differs from
    /// the prepared one, and with [`Error::PoolExhausted`] when every
    /// output frame is still in flight. The converter state is unchanged by
    /// any failure.
    pub fn try_render(&mut self, frame: &DepthFrame<'_>) -> Result<GrayFrame> {
        let pipeline = self.pipeline.as_ref().ok_or(Error::NotPrepared)?;

        let incoming = FormatDescriptor::describe(frame)?;
        if !pipeline.descriptor.is_compatible(&incoming) {
            return Err(Error::ShapeMismatch(format!(
                "prepared for {}, received {}",
                pipeline.descriptor, incoming
            )));
        }

        let mut output = pipeline
            .pool
            .try_acquire()
            .ok_or(Error::PoolExhausted(pipeline.pool.capacity()))?;

        let output_stride = output.bytes_per_row();
        convert::convert_frame(
            &pipeline.descriptor,
            frame.data,
            output.data_mut(),
            output_stride,
        );

        tracing::debug!(format = %pipeline.descriptor, "converted depth frame");
        Ok(output)
    }

    /// Convert one depth frame, or `None` if this frame must be skipped.
    ///
    /// The non-throwing facade over [`try_render`](Self::try_render):
    /// failures are logged and collapse to `None`, signaling the caller to
    /// skip this frame's depth visualization without aborting the capture
    /// flow.
    pub fn render(&mut self, frame: &DepthFrame<'_>) -> Option<GrayFrame> {
        match self.try_render(frame) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("skipping depth frame: {e}");
                None
            }
        }
    }

    /// Tear the pipeline down and release all idle frames.
    ///
    /// Always safe to call, idempotent; meant for quiescing under memory
    /// pressure. Outstanding frames keep their storage alive until the
    /// caller drops them.
    pub fn reset(&mut self) {
        if self.pipeline.take().is_some() {
            tracing::info!("depth conversion pipeline reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DepthFrameBuf;

    fn descriptor(buf: &DepthFrameBuf) -> FormatDescriptor {
        FormatDescriptor::describe(&buf.as_frame()).unwrap()
    }

    #[test]
    fn test_prepare_sets_readiness_and_caches_descriptor() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);
        let desc = descriptor(&buf);

        let mut converter = DepthGrayscaleConverter::new();
        assert!(!converter.is_prepared());

        converter.prepare(desc, 3).unwrap();
        assert!(converter.is_prepared());
        assert_eq!(converter.prepared_descriptor(), Some(&desc));
    }

    #[test]
    fn test_prepare_is_idempotent_for_matching_descriptor() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);
        let desc = descriptor(&buf);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(desc, 3).unwrap();

        // Render once so the pool has history we can observe.
        let frame = converter.render(&buf.as_frame()).unwrap();
        drop(frame);
        assert_eq!(converter.pool_stats().unwrap().acquisitions, 1);

        // Re-preparing with an equal descriptor must keep the same pool.
        converter.prepare(desc, 3).unwrap();
        assert!(converter.is_prepared());
        assert_eq!(converter.pool_stats().unwrap().acquisitions, 1);
    }

    #[test]
    fn test_prepare_rebuilds_on_format_change() {
        let small = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);
        let large = DepthFrameBuf::depth_f32(8, 8, &[1.0; 64]);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(descriptor(&small), 3).unwrap();
        converter.render(&small.as_frame()).unwrap();

        converter.prepare(descriptor(&large), 3).unwrap();
        assert_eq!(converter.prepared_descriptor(), Some(&descriptor(&large)));
        // Fresh pool.
        assert_eq!(converter.pool_stats().unwrap().acquisitions, 0);

        let gray = converter.render(&large.as_frame()).unwrap();
        assert_eq!(gray.width(), 8);
    }

    #[test]
    fn test_prepare_failure_keeps_previous_state() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);
        let desc = descriptor(&buf);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(desc, 3).unwrap();

        let other = FormatDescriptor {
            width: 8,
            bytes_per_row: 32,
            ..desc
        };
        assert!(converter.prepare(other, 0).is_err());

        // Still prepared for the original format.
        assert_eq!(converter.prepared_descriptor(), Some(&desc));
        assert!(converter.render(&buf.as_frame()).is_some());
    }

    #[test]
    fn test_render_before_prepare() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);

        let mut converter = DepthGrayscaleConverter::new();
        assert!(converter.render(&buf.as_frame()).is_none());
        assert!(matches!(
            converter.try_render(&buf.as_frame()),
            Err(Error::NotPrepared)
        ));
    }

    #[test]
    fn test_render_shape_mismatch() {
        let prepared = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);
        let stray = DepthFrameBuf::depth_f32(8, 8, &[1.0; 64]);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(descriptor(&prepared), 3).unwrap();

        assert!(matches!(
            converter.try_render(&stray.as_frame()),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(converter.render(&stray.as_frame()).is_none());

        // A disparity frame with the same shape is still a different format.
        let disparity = DepthFrameBuf::disparity_f32(4, 4, &[1.0; 16]);
        assert!(matches!(
            converter.try_render(&disparity.as_frame()),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_reset_clears_readiness() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(descriptor(&buf), 3).unwrap();
        converter.reset();

        assert!(!converter.is_prepared());
        assert!(converter.render(&buf.as_frame()).is_none());

        // Idempotent.
        converter.reset();
        assert!(!converter.is_prepared());
    }

    #[test]
    fn test_frame_survives_reset() {
        let buf = DepthFrameBuf::depth_f32(4, 4, &[2.0; 16]);

        let mut converter = DepthGrayscaleConverter::new();
        converter.prepare(descriptor(&buf), 3).unwrap();
        let gray = converter.render(&buf.as_frame()).unwrap();

        converter.reset();

        // The outstanding frame is still readable after teardown.
        assert_eq!(gray.data().len(), 16);
        assert!(gray.data().iter().all(|&v| v == gray.data()[0]));
    }
}

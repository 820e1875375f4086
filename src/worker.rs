//! Serialized processing context for the converter.
//!
//! A [`ProcessingWorker`] owns one [`DepthGrayscaleConverter`] on a
//! dedicated thread. Capture-completion and teardown paths enqueue jobs
//! onto a bounded channel and the worker executes them strictly in
//! submission order, so converter operations never interleave even when
//! they originate from different threads.
//!
//! The worker also runs the documented caller protocol: it describes each
//! incoming frame, prepares lazily on the first frame (and again whenever
//! the format changes), then renders.

use crate::converter::DepthGrayscaleConverter;
use crate::error::{Error, Result};
use crate::format::FormatDescriptor;
use crate::frame::DepthFrameBuf;
use crate::pool::GrayFrame;
use std::thread;

/// Depth of the job queue. Submissions beyond this block briefly until the
/// worker catches up.
const JOB_QUEUE_DEPTH: usize = 8;

enum Job {
    Render {
        frame: DepthFrameBuf,
        reply: kanal::Sender<Option<GrayFrame>>,
    },
    Reset,
}

/// A dedicated conversion thread with an ordered job queue.
///
/// Dropping the worker closes the queue and joins the thread; jobs already
/// queued still run.
///
/// # Example
///
/// ```rust
/// use depthgray::frame::DepthFrameBuf;
/// use depthgray::worker::ProcessingWorker;
///
/// let worker = ProcessingWorker::new(3);
/// let gray = worker
///     .convert(DepthFrameBuf::depth_f32(4, 4, &[1.5; 16]))?
///     .expect("valid frame converts");
/// assert_eq!(gray.height(), 4);
/// # Ok::<(), depthgray::Error>(())
/// ```
pub struct ProcessingWorker {
    /// Taken in `drop` so the worker sees the channel close and drains.
    jobs: Option<kanal::Sender<Job>>,
    thread: Option<thread::JoinHandle<()>>,
}

/// Handle for one in-flight render job.
pub struct RenderTicket {
    reply: kanal::Receiver<Option<GrayFrame>>,
}

impl RenderTicket {
    /// Wait for the job's result.
    ///
    /// `None` means the frame was skipped (the same contract as
    /// [`DepthGrayscaleConverter::render`]). Fails with
    /// [`Error::WorkerGone`] if the worker shut down first.
    pub fn wait(self) -> Result<Option<GrayFrame>> {
        self.reply.recv().map_err(|_| Error::WorkerGone)
    }
}

impl ProcessingWorker {
    /// Spawn a worker whose converter retains `retained_frame_count` output
    /// frames.
    pub fn new(retained_frame_count: usize) -> Self {
        let (tx, rx) = kanal::bounded::<Job>(JOB_QUEUE_DEPTH);

        let thread = thread::spawn(move || Self::run(rx, retained_frame_count));

        Self {
            jobs: Some(tx),
            thread: Some(thread),
        }
    }

    fn jobs(&self) -> Result<&kanal::Sender<Job>> {
        self.jobs.as_ref().ok_or(Error::WorkerGone)
    }

    /// Enqueue a frame for conversion and return a ticket for its result.
    ///
    /// Jobs complete in submission order.
    pub fn submit(&self, frame: DepthFrameBuf) -> Result<RenderTicket> {
        let (reply_tx, reply_rx) = kanal::bounded(1);
        self.jobs()?
            .send(Job::Render {
                frame,
                reply: reply_tx,
            })
            .map_err(|_| Error::WorkerGone)?;
        Ok(RenderTicket { reply: reply_rx })
    }

    /// Convert one frame, waiting for the result.
    pub fn convert(&self, frame: DepthFrameBuf) -> Result<Option<GrayFrame>> {
        self.submit(frame)?.wait()
    }

    /// Enqueue a converter reset (the background-transition signal).
    ///
    /// Runs after all previously submitted jobs; the converter re-prepares
    /// lazily on the next frame.
    pub fn reset(&self) -> Result<()> {
        self.jobs()?.send(Job::Reset).map_err(|_| Error::WorkerGone)
    }

    fn run(jobs: kanal::Receiver<Job>, retained_frame_count: usize) {
        let mut converter = DepthGrayscaleConverter::new();

        while let Ok(job) = jobs.recv() {
            match job {
                Job::Render { frame, reply } => {
                    let result =
                        Self::render_one(&mut converter, &frame, retained_frame_count);
                    // The submitter may have dropped its ticket.
                    let _ = reply.send(result);
                }
                Job::Reset => converter.reset(),
            }
        }
    }

    fn render_one(
        converter: &mut DepthGrayscaleConverter,
        frame: &DepthFrameBuf,
        retained_frame_count: usize,
    ) -> Option<GrayFrame> {
        let view = frame.as_frame();

        let descriptor = match FormatDescriptor::describe(&view) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("skipping undescribable depth frame: {e}");
                return None;
            }
        };

        let needs_prepare = !converter
            .prepared_descriptor()
            .is_some_and(|cached| cached.is_compatible(&descriptor));
        if needs_prepare {
            if let Err(e) = converter.prepare(descriptor, retained_frame_count) {
                tracing::warn!("prepare failed: {e}");
                return None;
            }
        }

        converter.render(&view)
    }
}

impl Drop for ProcessingWorker {
    fn drop(&mut self) {
        // Dropping the sender lets the worker drain everything already
        // queued before its recv loop ends; close() would discard it.
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::intensity_for_depth_m;
    use crate::format::FourCc;

    #[test]
    fn test_worker_converts_lazily() {
        let worker = ProcessingWorker::new(3);

        let gray = worker
            .convert(DepthFrameBuf::depth_f32(4, 4, &[1.5; 16]))
            .unwrap()
            .expect("first frame prepares and converts");

        assert_eq!(gray.width(), 4);
        assert!(gray.data().iter().all(|&v| v == intensity_for_depth_m(1.5)));
    }

    #[test]
    fn test_worker_results_follow_submission_order() {
        let worker = ProcessingWorker::new(8);

        let depths = [0.5f32, 1.0, 1.5, 2.0];
        let tickets: Vec<_> = depths
            .iter()
            .map(|&d| {
                worker
                    .submit(DepthFrameBuf::depth_f32(4, 4, &[d; 16]))
                    .unwrap()
            })
            .collect();

        for (ticket, &d) in tickets.into_iter().zip(depths.iter()) {
            let gray = ticket.wait().unwrap().unwrap();
            assert_eq!(gray.data()[0], intensity_for_depth_m(d));
        }
    }

    #[test]
    fn test_worker_reprepares_on_format_change() {
        let worker = ProcessingWorker::new(3);

        let small = worker
            .convert(DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]))
            .unwrap()
            .unwrap();
        assert_eq!(small.width(), 4);

        let large = worker
            .convert(DepthFrameBuf::depth_f32(8, 8, &[1.0; 64]))
            .unwrap()
            .unwrap();
        assert_eq!(large.width(), 8);
    }

    #[test]
    fn test_worker_reset_then_render() {
        let worker = ProcessingWorker::new(3);

        worker
            .convert(DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]))
            .unwrap()
            .unwrap();

        worker.reset().unwrap();

        // The worker re-prepares on the next frame.
        let gray = worker
            .convert(DepthFrameBuf::depth_f32(4, 4, &[2.0; 16]))
            .unwrap()
            .unwrap();
        assert_eq!(gray.data()[0], intensity_for_depth_m(2.0));
    }

    #[test]
    fn test_queued_jobs_run_to_completion_on_drop() {
        let worker = ProcessingWorker::new(8);

        let depths = [0.5f32, 1.0, 1.5, 2.0, 2.5];
        let tickets: Vec<_> = depths
            .iter()
            .map(|&d| {
                worker
                    .submit(DepthFrameBuf::depth_f32(4, 4, &[d; 16]))
                    .unwrap()
            })
            .collect();

        // Shutting down must not discard jobs still sitting in the queue.
        drop(worker);

        for (ticket, &d) in tickets.into_iter().zip(depths.iter()) {
            let gray = ticket.wait().unwrap().expect("queued frame converts");
            assert_eq!(gray.data()[0], intensity_for_depth_m(d));
        }
    }

    #[test]
    fn test_worker_skips_bad_frames() {
        let worker = ProcessingWorker::new(3);

        let bad = DepthFrameBuf::new(FourCc::new(b"RGBA"), 4, 4, 16, vec![0u8; 64]);
        assert!(worker.convert(bad).unwrap().is_none());

        // A good frame afterwards still works.
        assert!(worker
            .convert(DepthFrameBuf::depth_f32(4, 4, &[1.0; 16]))
            .unwrap()
            .is_some());
    }
}

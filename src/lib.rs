//! # depthgray
//!
//! A depth-map to grayscale conversion core for depth-sensing cameras.
//!
//! Depth captures arrive as per-pixel depth or disparity maps in whatever
//! sample format the sensor produces. This crate converts them into
//! viewable 8-bit grayscale frames, frame after frame, without per-frame
//! allocation:
//!
//! - **Lazy format negotiation**: the pipeline is built from the first
//!   frame's [`FormatDescriptor`](format::FormatDescriptor) and rebuilt
//!   only when the format changes
//! - **Pooled output frames**: a retained-count ceiling bounds memory and
//!   applies backpressure instead of growing or blocking
//! - **Pinned numeric mapping**: clamped linear depth-to-intensity with a
//!   documented invalid-sample policy (see [`convert`])
//! - **Graceful degradation**: malformed input skips a frame, never
//!   crashes the capture flow
//!
//! ## Quick Start
//!
//! ```rust
//! use depthgray::prelude::*;
//!
//! // One capture worth of metric depth samples.
//! let captured = DepthFrameBuf::depth_f32(192, 256, &[1.5; 192 * 256]);
//! let frame = captured.as_frame();
//!
//! // The documented caller protocol: check, prepare once, render.
//! let mut converter = DepthGrayscaleConverter::new();
//! if !converter.is_prepared() {
//!     let descriptor = FormatDescriptor::describe(&frame)?;
//!     converter.prepare(descriptor, 3)?;
//! }
//! let gray = converter.render(&frame).expect("matching frame converts");
//! assert_eq!((gray.width(), gray.height()), (192, 256));
//! # Ok::<(), depthgray::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod converter;
pub mod error;
pub mod format;
pub mod frame;
pub mod pool;
pub mod worker;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::converter::DepthGrayscaleConverter;
    pub use crate::error::{Error, Result};
    pub use crate::format::{FormatDescriptor, FourCc, SampleFormat};
    pub use crate::frame::{DepthFrame, DepthFrameBuf};
    pub use crate::pool::{FramePool, GrayFrame, PoolStats};
    pub use crate::worker::ProcessingWorker;
}

pub use error::{Error, Result};

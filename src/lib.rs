//! # Stepline
//!
//! A synchronous dataflow scheduler with a tri-state execution status and
//! partial-failure propagation.
//!
//! Stepline wires opaque units of work ("processes") into a dependency
//! graph and steps the whole graph one cycle at a time. Each process
//! reports one of three statuses per cycle ([`StepStatus::Success`],
//! [`StepStatus::Failure`], or [`StepStatus::Skip`]), and the scheduler
//! propagates those statuses along required and optional edges: a failed
//! producer starves its required consumers, a skipped producer starves them
//! gently, and optional consumers keep running either way.
//!
//! ## Features
//!
//! - **Tri-state status lattice**: failure dominates skip dominates success
//! - **Required vs. optional edges**: only required edges gate execution
//! - **Typed data ports**: output accessor to input setter, bound at the
//!   connection boundary
//! - **Nested recovery**: container processes can downgrade an internal
//!   failure to a skip and keep the outer graph alive
//! - **Per-node timing**: step counts and cumulative elapsed time
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepline::prelude::*;
//!
//! let mut pipeline = Pipeline::new();
//! let src = pipeline.add(FrameSource::new("src"))?;
//! let sink = pipeline.add(FrameSink::new("sink"))?;
//! pipeline.connect(src, |s: &FrameSource| s.frame(), sink, FrameSink::set_frame)?;
//!
//! pipeline.initialize()?;
//! let cycles = pipeline.run()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod status;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ConfigBlock;
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{EdgeId, NodeId, Pipeline};
    pub use crate::process::{Process, SuperProcess};
    pub use crate::status::StepStatus;
}

pub use error::{Error, Result};
pub use status::StepStatus;

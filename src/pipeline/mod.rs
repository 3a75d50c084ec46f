//! Pipeline construction and execution.
//!
//! This module provides the scheduler core:
//!
//! - [`Pipeline`]: the graph container, wiring surface, and cycle driver
//! - [`Node`]: a node in the graph (wraps a process, tracks status/timing)
//! - [`Edge`]: a required-or-optional link between two nodes
//!
//! # Example
//!
//! ```rust,ignore
//! use stepline::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::new();
//! let detector = pipeline.add(Detector::new("detector"))?;
//! let tracker = pipeline.add(Tracker::new("tracker"))?;
//! let writer = pipeline.add(TrackWriter::new("writer"))?;
//!
//! pipeline.connect(detector, |d: &Detector| d.boxes(), tracker, Tracker::set_boxes)?;
//! pipeline.connect(tracker, |t: &Tracker| t.tracks(), writer, TrackWriter::set_tracks)?;
//!
//! pipeline.initialize()?;
//! while pipeline.step()? != StepStatus::Failure {}
//! ```

mod driver;
mod edge;
mod graph;
mod node;

pub use edge::Edge;
pub use graph::{EdgeId, NodeId, Pipeline};
pub use node::{Node, NodeTiming, OutputMark};

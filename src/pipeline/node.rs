//! Nodes: the scheduling wrapper around one process instance.

use super::graph::{EdgeId, NodeId};
use crate::config::ConfigBlock;
use crate::process::Process;
use crate::status::StepStatus;
use daggy::NodeIndex;
use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// Whether a node's results are consumed by the outer system.
///
/// `Auto` defers to the node's sink-ness: a node with no outgoing edges is
/// treated as an output node unless explicitly marked `No`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMark {
    /// Defer to whether the node is a sink.
    #[default]
    Auto,
    /// Always an output node, even with outgoing edges.
    Yes,
    /// Never an output node, even as a sink.
    No,
}

/// Timing summary for one node, as reported by
/// [`Pipeline::node_timing`](super::Pipeline::node_timing).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTiming {
    /// Instance name of the node.
    pub name: String,
    /// Class name of the wrapped process.
    pub class_name: String,
    /// Number of times the node executed.
    pub steps: u64,
    /// Cumulative wall time spent executing, in milliseconds.
    pub elapsed_ms: f64,
    /// Executed steps per second of accumulated wall time.
    pub steps_per_second: f64,
}

/// A node in the pipeline graph.
///
/// Wraps one process and presents a uniform scheduling contract: initialize,
/// execute one step (recording status, step count, and elapsed time), reset,
/// and report or accept configuration. Process-level failure is communicated
/// through the returned [`StepStatus`], never by panicking at this layer.
pub struct Node {
    /// Handle of this node in the graph; assigned at insertion.
    id: NodeId,
    name: String,
    class_name: String,
    /// The wrapped process. `None` for placeholder nodes that exist only
    /// for structural or status-reporting purposes.
    process: Option<Box<dyn Process>>,
    /// False for configuration-only nodes that are never stepped.
    executable: bool,
    last_status: StepStatus,
    step_count: u64,
    elapsed: Duration,
    output_mark: OutputMark,
    incoming: SmallVec<[EdgeId; 4]>,
    outgoing: SmallVec<[EdgeId; 4]>,
}

impl Node {
    pub(crate) fn with_process(name: String, process: Box<dyn Process>, executable: bool) -> Self {
        let class_name = process.class_name().to_string();
        Self {
            id: NodeId(NodeIndex::end()),
            name,
            class_name,
            process: Some(process),
            executable,
            last_status: StepStatus::Success,
            step_count: 0,
            elapsed: Duration::ZERO,
            output_mark: OutputMark::Auto,
            incoming: SmallVec::new(),
            outgoing: SmallVec::new(),
        }
    }

    pub(crate) fn placeholder(name: String) -> Self {
        Self {
            id: NodeId(NodeIndex::end()),
            name,
            class_name: "placeholder".to_string(),
            process: None,
            executable: false,
            last_status: StepStatus::Success,
            step_count: 0,
            elapsed: Duration::ZERO,
            output_mark: OutputMark::Auto,
            incoming: SmallVec::new(),
            outgoing: SmallVec::new(),
        }
    }

    pub(crate) fn assign_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// Instance name of this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class name of the wrapped process.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The wrapped process, if any.
    pub fn process(&self) -> Option<&dyn Process> {
        self.process.as_deref()
    }

    /// Mutable access to the wrapped process, if any.
    pub fn process_mut(&mut self) -> Option<&mut dyn Process> {
        self.process.as_deref_mut()
    }

    /// Status recorded by the most recent cycle.
    pub fn last_status(&self) -> StepStatus {
        self.last_status
    }

    /// Number of times [`execute`](Self::execute) has been called.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Cumulative wall time spent in `execute`, in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Executed steps per second of accumulated wall time.
    ///
    /// Returns `0.0` before the node has accumulated any elapsed time.
    pub fn steps_per_second(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        self.step_count as f64 * 1000.0 / self.elapsed_ms()
    }

    /// Whether this node has no outgoing edges.
    pub fn is_sink(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Whether the outer system consumes this node's results.
    pub fn is_output_node(&self) -> bool {
        match self.output_mark {
            OutputMark::Yes => true,
            OutputMark::No => false,
            OutputMark::Auto => self.is_sink(),
        }
    }

    /// Explicitly include or exclude this node from output status.
    pub fn mark_output(&mut self, output: bool) {
        self.output_mark = if output {
            OutputMark::Yes
        } else {
            OutputMark::No
        };
    }

    /// Current output mark.
    pub fn output_mark(&self) -> OutputMark {
        self.output_mark
    }

    pub(crate) fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    pub(crate) fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }

    /// Register an edge whose destination is this node.
    ///
    /// `edge_to` is the destination recorded on the edge itself; it must
    /// match this node.
    pub(crate) fn add_incoming_edge(&mut self, id: EdgeId, edge_to: NodeId) {
        debug_assert_eq!(edge_to, self.id, "incoming edge must point at this node");
        self.incoming.push(id);
    }

    /// Register an edge whose source is this node.
    ///
    /// `edge_from` is the source recorded on the edge itself; it must match
    /// this node.
    pub(crate) fn add_outgoing_edge(&mut self, id: EdgeId, edge_from: NodeId) {
        debug_assert_eq!(edge_from, self.id, "outgoing edge must originate at this node");
        self.outgoing.push(id);
    }

    /// Delegate to the wrapped process's initialize hook.
    ///
    /// Any wrapped process is initialized, including on configuration-only
    /// nodes that are never stepped. A placeholder node has nothing to
    /// initialize and reports `true`.
    pub(crate) fn initialize(&mut self) -> bool {
        match self.process.as_deref_mut() {
            Some(p) => p.initialize(),
            None => true,
        }
    }

    /// Step the wrapped process once, recording status, count, and timing.
    ///
    /// The step count increments unconditionally. A container process gets
    /// its post-step hook after every step; if the step failed and the
    /// container recovers, the recorded status is downgraded to `Skip`. An
    /// inert node (no process, or not executable) records `Success`.
    pub(crate) fn execute(&mut self) -> StepStatus {
        let start = Instant::now();
        self.step_count += 1;

        self.last_status = match self.process.as_deref_mut() {
            Some(p) if self.executable => {
                let mut status = p.step();
                if let Some(hooks) = p.super_hooks() {
                    hooks.post_step();
                    if status.is_failure() && hooks.fail_recover() {
                        status = StepStatus::Skip;
                    }
                }
                status
            }
            _ => StepStatus::Success,
        };

        self.elapsed += start.elapsed();
        self.last_status
    }

    /// Force this cycle's status to `Failure` without stepping the process.
    pub(crate) fn set_failed(&mut self) {
        self.last_status = StepStatus::Failure;
    }

    /// Force this cycle's status to `Skip` without stepping the process.
    pub(crate) fn set_skipped(&mut self) {
        self.last_status = StepStatus::Skip;
    }

    /// Clear the recorded status back to `Success`.
    pub(crate) fn set_succeeded(&mut self) {
        self.last_status = StepStatus::Success;
    }

    /// Delegate to the wrapped process's reset hook.
    pub(crate) fn reset_process(&mut self) -> bool {
        match self.process.as_deref_mut() {
            Some(p) => p.reset(),
            None => true,
        }
    }

    /// Return the wrapped process's parameters, or an empty block.
    pub fn get_params(&self) -> ConfigBlock {
        match self.process.as_deref() {
            Some(p) => p.params(),
            None => ConfigBlock::new(),
        }
    }

    /// Extract this node's subblock from `all_params` and forward it.
    ///
    /// A node without a process has nothing to configure and reports `true`.
    pub(crate) fn set_params(&mut self, all_params: &ConfigBlock) -> bool {
        let sub = all_params.subblock(&self.name);
        match self.process.as_deref_mut() {
            Some(p) => p.set_params(&sub),
            None => true,
        }
    }

    /// Merge this node's parameters into `all_params`, keyed by node name.
    pub(crate) fn append_params(&self, all_params: &mut ConfigBlock) {
        if let Some(p) = self.process.as_deref() {
            all_params.add_subblock(&p.params(), &self.name);
        }
    }

    /// Emit the one diagnostic line this node produces per cycle.
    ///
    /// `edge_status` is the aggregate of the governing incoming edges;
    /// `node_status` is the status after this cycle's execution decision.
    pub(crate) fn log_status(&self, edge_status: StepStatus, node_status: StepStatus) {
        match edge_status {
            StepStatus::Failure => {
                tracing::debug!(
                    "did not execute node '{}' (required nodes failed)",
                    self.name
                );
            }
            StepStatus::Skip => {
                tracing::debug!("skipped node '{}'", self.name);
            }
            StepStatus::Success => match node_status {
                StepStatus::Failure => {
                    tracing::debug!("failed to execute node '{}'", self.name);
                }
                StepStatus::Skip => {
                    tracing::debug!("executed node '{}' - produced SKIP", self.name);
                }
                StepStatus::Success => {
                    tracing::debug!("executed node '{}'", self.name);
                }
            },
        }
    }

    /// Timing summary for this node.
    pub fn timing(&self) -> NodeTiming {
        NodeTiming {
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            steps: self.step_count,
            elapsed_ms: self.elapsed_ms(),
            steps_per_second: self.steps_per_second(),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("last_status", &self.last_status)
            .field("step_count", &self.step_count)
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish()
    }
}

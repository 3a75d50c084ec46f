//! Edges: directed, typed, required-or-optional links between nodes.

use super::graph::NodeId;
use std::any::Any;

/// Reset hook installed by edge-level collaborators (for example a
/// buffering stage tied to the edge). Returning `false` aborts the reset
/// cascade of the owning node.
pub type EdgeResetHook = Box<dyn FnMut() -> bool + Send>;

/// A directed link between two nodes in the pipeline graph.
///
/// The edge records its endpoints, its port names (for diagnostics), and
/// whether it is required. A required edge gates the downstream node's
/// execution on the upstream status; an optional edge carries data when the
/// upstream succeeded but never blocks the downstream node.
pub struct Edge {
    from: NodeId,
    to: NodeId,
    from_port: String,
    to_port: String,
    required: bool,
    reset_hook: Option<EdgeResetHook>,
}

impl Edge {
    pub(crate) fn new(
        from: NodeId,
        to: NodeId,
        from_port: impl Into<String>,
        to_port: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            from,
            to,
            from_port: from_port.into(),
            to_port: to_port.into(),
            required,
            reset_hook: None,
        }
    }

    /// The upstream node.
    pub fn from(&self) -> NodeId {
        self.from
    }

    /// The downstream node.
    pub fn to(&self) -> NodeId {
        self.to
    }

    /// Output port name on the upstream node.
    pub fn from_port(&self) -> &str {
        &self.from_port
    }

    /// Input port name on the downstream node.
    pub fn to_port(&self) -> &str {
        &self.to_port
    }

    /// Whether this edge gates downstream execution.
    pub fn required(&self) -> bool {
        self.required
    }

    /// Install a reset hook invoked during the owning node's reset cascade.
    pub fn set_reset_hook(&mut self, hook: impl FnMut() -> bool + Send + 'static) {
        self.reset_hook = Some(Box::new(hook));
    }

    /// Reset edge-level state. Returns `false` if the collaborator hook
    /// reports failure; an edge without a hook always resets cleanly.
    pub(crate) fn reset(&mut self) -> bool {
        match self.reset_hook.as_mut() {
            Some(hook) => hook(),
            None => true,
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("from_port", &self.from_port)
            .field("to_port", &self.to_port)
            .field("required", &self.required)
            .finish()
    }
}

/// Pulls a value out of the upstream process.
pub(crate) type PullFn = Box<dyn FnMut(&dyn Any) -> Option<Box<dyn Any + Send>> + Send>;

/// Pushes a pulled value into the downstream process.
pub(crate) type PushFn = Box<dyn FnMut(&mut dyn Any, Box<dyn Any + Send>) -> bool + Send>;

/// The typed data-transfer pair bound to an edge at connection time.
///
/// Stored by the pipeline (keyed by edge index) rather than inside the edge
/// weight, so a transfer can run while the graph itself is borrowed.
pub(crate) struct Transfer {
    pub(crate) pull: PullFn,
    pub(crate) push: PushFn,
}

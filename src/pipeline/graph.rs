//! Pipeline graph structure and wiring surface, using daggy.

use super::edge::{Edge, PullFn, PushFn, Transfer};
use super::node::Node;
use crate::error::{Error, Result};
use crate::process::Process;
use daggy::Dag;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Unique identifier for a node in the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) daggy::NodeIndex);

impl NodeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// Unique identifier for an edge in the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) daggy::EdgeIndex);

impl EdgeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// A dependency graph of process nodes, stepped one cycle at a time.
///
/// The pipeline owns the arena of nodes and edges. Wiring happens through
/// [`add`](Self::add) and the `connect`/`add_dependency` family before
/// [`initialize`](Self::initialize); cycles are then driven with
/// [`step`](Self::step) or [`run`](Self::run).
pub struct Pipeline {
    /// Diagnostic name, used as the metrics label.
    pub(crate) name: String,
    /// The DAG structure; nodes and edges live here.
    pub(crate) dag: Dag<Node, Edge>,
    /// Name-to-NodeId mapping for quick lookup.
    pub(crate) nodes_by_name: HashMap<String, NodeId>,
    /// Typed data transfers, indexed by edge index. `None` for pure
    /// execution-dependency edges.
    pub(crate) transfers: Vec<Option<Transfer>>,
    /// Topological execution order, computed by `initialize`.
    pub(crate) order: Vec<NodeId>,
    /// Whether `initialize` has completed.
    pub(crate) initialized: bool,
    /// Counter for naming placeholder nodes.
    pub(crate) name_counter: u64,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self::named("pipeline")
    }

    /// Create a new empty pipeline with a diagnostic name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dag: Dag::new(),
            nodes_by_name: HashMap::new(),
            transfers: Vec::new(),
            order: Vec::new(),
            initialized: false,
            name_counter: 0,
        }
    }

    /// Diagnostic name of this pipeline.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a process to the pipeline.
    ///
    /// The node takes its name from the process; an empty process name gets
    /// a sequential one. Returns the node's id for wiring.
    pub fn add(&mut self, process: impl Process) -> Result<NodeId> {
        self.insert_node(Box::new(process), true)
    }

    /// Add a process that is configured but never stepped.
    ///
    /// Useful for letting a configuration file carry settings for pipeline
    /// elements that are not always active. The node reports `Success`
    /// every cycle without invoking the process, so it is excluded from
    /// output status: a node that always succeeds would keep the pipeline
    /// running forever.
    pub fn add_without_execute(&mut self, process: impl Process) -> Result<NodeId> {
        let id = self.insert_node(Box::new(process), false)?;
        self.dag
            .node_weight_mut(id.0)
            .expect("node was just inserted")
            .mark_output(false);
        Ok(id)
    }

    /// Add a placeholder node with no process behind it.
    ///
    /// Placeholders exist for structural or status-reporting purposes and
    /// report `Success` every cycle.
    pub fn add_placeholder(&mut self) -> NodeId {
        let name = self.next_auto_name();
        let node = Node::placeholder(name.clone());
        let idx = self.dag.add_node(node);
        let id = NodeId(idx);
        self.dag
            .node_weight_mut(idx)
            .expect("node was just inserted")
            .assign_id(id);
        self.nodes_by_name.insert(name, id);
        id
    }

    fn insert_node(&mut self, process: Box<dyn Process>, executable: bool) -> Result<NodeId> {
        let name = if process.name().is_empty() {
            self.next_auto_name()
        } else {
            process.name().to_string()
        };
        if self.nodes_by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let node = Node::with_process(name.clone(), process, executable);
        let idx = self.dag.add_node(node);
        let id = NodeId(idx);
        self.dag
            .node_weight_mut(idx)
            .expect("node was just inserted")
            .assign_id(id);
        self.nodes_by_name.insert(name, id);
        Ok(id)
    }

    fn next_auto_name(&mut self) -> String {
        let name = format!("node-{}", self.name_counter);
        self.name_counter += 1;
        name
    }

    /// Connect a typed output port to a typed input port (required edge).
    ///
    /// `output` reads a value from the upstream process; `input` stores it
    /// on the downstream process. The transfer fires each cycle the
    /// upstream node succeeds, before the downstream node executes. The
    /// edge also gates the downstream node on the upstream status.
    pub fn connect<Src, Dst, T>(
        &mut self,
        from: NodeId,
        output: impl Fn(&Src) -> T + Send + 'static,
        to: NodeId,
        input: impl Fn(&mut Dst, T) + Send + 'static,
    ) -> Result<EdgeId>
    where
        Src: Process,
        Dst: Process,
        T: Send + 'static,
    {
        self.connect_ports(from, "out", output, to, "in", input, true)
    }

    /// Connect a typed output port to a typed input port (optional edge).
    ///
    /// The transfer fires when the upstream node succeeds, but the edge
    /// never blocks the downstream node on upstream failure or skip.
    pub fn connect_optional<Src, Dst, T>(
        &mut self,
        from: NodeId,
        output: impl Fn(&Src) -> T + Send + 'static,
        to: NodeId,
        input: impl Fn(&mut Dst, T) + Send + 'static,
    ) -> Result<EdgeId>
    where
        Src: Process,
        Dst: Process,
        T: Send + 'static,
    {
        self.connect_ports(from, "out", output, to, "in", input, false)
    }

    /// Connect with explicit port names for diagnostics.
    #[allow(clippy::too_many_arguments)]
    pub fn connect_ports<Src, Dst, T>(
        &mut self,
        from: NodeId,
        from_port: &str,
        output: impl Fn(&Src) -> T + Send + 'static,
        to: NodeId,
        to_port: &str,
        input: impl Fn(&mut Dst, T) + Send + 'static,
        required: bool,
    ) -> Result<EdgeId>
    where
        Src: Process,
        Dst: Process,
        T: Send + 'static,
    {
        let pull: PullFn = Box::new(move |src: &dyn Any| {
            src.downcast_ref::<Src>()
                .map(|s| Box::new(output(s)) as Box<dyn Any + Send>)
        });
        let push: PushFn = Box::new(move |dst: &mut dyn Any, value: Box<dyn Any + Send>| {
            let Some(d) = dst.downcast_mut::<Dst>() else {
                return false;
            };
            match value.downcast::<T>() {
                Ok(v) => {
                    input(d, *v);
                    true
                }
                Err(_) => false,
            }
        });
        self.insert_edge(from, from_port, to, to_port, required, Some(Transfer { pull, push }))
    }

    /// Add a required execution dependency carrying no data.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId> {
        self.insert_edge(from, "out", to, "in", true, None)
    }

    /// Add an optional execution dependency carrying no data.
    ///
    /// Purely structural: it neither gates the downstream node nor moves
    /// data, but records the relationship for diagnostics and reset order.
    pub fn add_optional_dependency(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId> {
        self.insert_edge(from, "out", to, "in", false, None)
    }

    fn insert_edge(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
        required: bool,
        transfer: Option<Transfer>,
    ) -> Result<EdgeId> {
        let from_name = self.node_name(from)?;
        let to_name = self.node_name(to)?;

        let edge = Edge::new(from, to, from_port, to_port, required);
        let idx = self
            .dag
            .add_edge(from.0, to.0, edge)
            .map_err(|_| Error::WouldCycle {
                from: from_name,
                to: to_name,
            })?;
        let id = EdgeId(idx);

        debug_assert_eq!(id.index(), self.transfers.len());
        self.transfers.push(transfer);

        // Register the edge on both endpoints; the endpoint invariants are
        // checked inside the node.
        let (edge_from, edge_to) = {
            let e = self.dag.edge_weight(idx).expect("edge was just inserted");
            (e.from(), e.to())
        };
        self.dag
            .node_weight_mut(to.0)
            .expect("destination node exists")
            .add_incoming_edge(id, edge_to);
        self.dag
            .node_weight_mut(from.0)
            .expect("source node exists")
            .add_outgoing_edge(id, edge_from);

        Ok(id)
    }

    fn node_name(&self, id: NodeId) -> Result<String> {
        self.dag
            .node_weight(id.0)
            .map(|n| n.name().to_string())
            .ok_or_else(|| Error::NodeNotFound(format!("#{}", id.index())))
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.dag.node_weight(id.0)
    }

    /// Get a mutable reference to a node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dag.node_weight_mut(id.0)
    }

    /// Get a node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Get an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.dag.edge_weight(id.0)
    }

    /// Get a mutable reference to an edge by id.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.dag.edge_weight_mut(id.0)
    }

    /// Downcast a node's process to its concrete type.
    pub fn process_ref<P: Process>(&self, id: NodeId) -> Option<&P> {
        let any: &dyn Any = self.node(id)?.process()?;
        any.downcast_ref()
    }

    /// Downcast a node's process to its concrete type, mutably.
    pub fn process_mut<P: Process>(&mut self, id: NodeId) -> Option<&mut P> {
        let any: &mut dyn Any = self.node_mut(id)?.process_mut()?;
        any.downcast_mut()
    }

    /// Explicitly include or exclude a node from output status.
    pub fn mark_output(&mut self, id: NodeId, output: bool) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(format!("#{}", id.index())))?;
        node.mark_output(output);
        Ok(())
    }

    /// Number of nodes in the pipeline.
    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of edges in the pipeline.
    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Check if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// All nodes whose results the outer system consumes.
    pub fn output_nodes(&self) -> Vec<NodeId> {
        self.dag
            .graph()
            .node_indices()
            .filter(|&idx| {
                self.dag
                    .node_weight(idx)
                    .is_some_and(Node::is_output_node)
            })
            .map(NodeId)
            .collect()
    }

    /// Validate the pipeline structure.
    ///
    /// Checks that the graph is non-empty and has at least one output node
    /// to make progress against.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Invalid("pipeline is empty".into()));
        }
        if self.output_nodes().is_empty() {
            return Err(Error::Invalid("pipeline has no output nodes".into()));
        }
        Ok(())
    }

    /// Render the graph in graphviz dot format.
    ///
    /// Optional edges are drawn dotted.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.name);
        for idx in self.dag.graph().node_indices() {
            if let Some(node) = self.dag.node_weight(idx) {
                let _ = writeln!(
                    out,
                    "  \"{}\" [label=\"{}\\n{}\"];",
                    node.name(),
                    node.name(),
                    node.class_name()
                );
            }
        }
        for idx in self.dag.graph().edge_indices() {
            if let Some(edge) = self.dag.edge_weight(idx) {
                let from = self.node(edge.from()).map(Node::name).unwrap_or("?");
                let to = self.node(edge.to()).map(Node::name).unwrap_or("?");
                let style = if edge.required() { "" } else { " [style=dotted]" };
                let _ = writeln!(out, "  \"{from}\" -> \"{to}\"{style};");
            }
        }
        out.push_str("}\n");
        out
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("initialized", &self.initialized)
            .finish()
    }
}

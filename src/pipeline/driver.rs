//! Cycle execution: status aggregation, starvation, data transfer, reset.

use super::graph::{EdgeId, NodeId, Pipeline};
use crate::config::ConfigBlock;
use crate::error::{Error, Result};
use crate::observability;
use crate::pipeline::node::NodeTiming;
use crate::status::StepStatus;
use std::any::Any;
use std::collections::HashSet;
use std::time::Instant;

impl Pipeline {
    /// Prepare the pipeline for stepping.
    ///
    /// Validates the structure, fixes the topological execution order, and
    /// runs every node's initialize hook in that order. Must be called
    /// before [`step`](Self::step).
    pub fn initialize(&mut self) -> Result<()> {
        self.validate()?;

        let order = daggy::petgraph::algo::toposort(self.dag.graph(), None)
            .expect("dag construction rejects cycles");
        self.order = order.into_iter().map(NodeId).collect();

        for id in self.order.clone() {
            let node = self.dag.node_weight_mut(id.0).expect("node in order");
            let name = node.name().to_string();
            if !node.initialize() {
                return Err(Error::InitializeFailed(name));
            }
        }

        self.initialized = true;
        tracing::debug!(
            "initialized pipeline '{}' ({} nodes, {} edges)",
            self.name,
            self.node_count(),
            self.edge_count()
        );
        Ok(())
    }

    /// Execute one pipeline cycle.
    ///
    /// Nodes are visited in dependency order, each exactly once. A node
    /// whose required upstreams all succeeded this cycle receives its input
    /// data and executes; a node starved by a required failure or skip has
    /// its status set directly without invoking the process. A node that
    /// failed in a previous cycle is not re-attempted until reset.
    ///
    /// The cycle result folds the statuses of the output nodes: `Success`
    /// if any output node succeeded, else `Skip` if any skipped, else
    /// `Failure`.
    pub fn step(&mut self) -> Result<StepStatus> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        for id in self.order.clone() {
            let previously_failed = self
                .dag
                .node_weight(id.0)
                .expect("node in order")
                .last_status()
                .is_failure();

            let edge_status = if previously_failed {
                StepStatus::Failure
            } else {
                self.incoming_edge_status(id)
            };

            match edge_status {
                StepStatus::Failure => {
                    self.dag
                        .node_weight_mut(id.0)
                        .expect("node in order")
                        .set_failed();
                }
                StepStatus::Skip => {
                    self.dag
                        .node_weight_mut(id.0)
                        .expect("node in order")
                        .set_skipped();
                }
                StepStatus::Success => {
                    self.fire_incoming_transfers(id)?;
                    let started = Instant::now();
                    let node = self.dag.node_weight_mut(id.0).expect("node in order");
                    let status = node.execute();
                    let name = node.name().to_string();
                    observability::record_node_step(&self.name, &name, status, started.elapsed());
                }
            }

            let node = self.dag.node_weight(id.0).expect("node in order");
            node.log_status(edge_status, node.last_status());
        }

        let cycle = self.cycle_status();
        observability::record_cycle(&self.name, cycle);
        Ok(cycle)
    }

    /// Step the pipeline until a cycle fails.
    ///
    /// Returns the number of non-failing cycles.
    pub fn run(&mut self) -> Result<u64> {
        let mut cycles = 0u64;
        loop {
            if self.step()?.is_failure() {
                tracing::debug!("pipeline '{}' stopped after {} cycles", self.name, cycles);
                return Ok(cycles);
            }
            cycles += 1;
        }
    }

    /// Aggregate the statuses of required incoming edges.
    ///
    /// Optional edges never gate; with no required upstreams the aggregate
    /// is `Success`.
    fn incoming_edge_status(&self, id: NodeId) -> StepStatus {
        let node = self.dag.node_weight(id.0).expect("node exists");
        StepStatus::combine_all(node.incoming().iter().filter_map(|eid| {
            let edge = self.dag.edge_weight(eid.0).expect("edge registered");
            if !edge.required() {
                return None;
            }
            self.dag
                .node_weight(edge.from().0)
                .map(|upstream| upstream.last_status())
        }))
    }

    /// Move data across every incoming edge whose upstream succeeded this
    /// cycle.
    ///
    /// Pure dependency edges and edges from starved upstreams are passed
    /// over; a downcast failure at either end reports [`Error::PortType`].
    fn fire_incoming_transfers(&mut self, id: NodeId) -> Result<()> {
        let incoming: Vec<EdgeId> = self
            .dag
            .node_weight(id.0)
            .expect("node exists")
            .incoming()
            .to_vec();

        for eid in incoming {
            let from = {
                let edge = self.dag.edge_weight(eid.0).expect("edge registered");
                edge.from()
            };
            let upstream_ok = self
                .dag
                .node_weight(from.0)
                .is_some_and(|n| n.last_status().is_success());
            if !upstream_ok {
                continue;
            }

            let slot = eid.index();
            let value = {
                let Some(transfer) = self.transfers[slot].as_mut() else {
                    continue;
                };
                let Some(process) = self
                    .dag
                    .node_weight(from.0)
                    .and_then(|n| n.process())
                else {
                    continue;
                };
                let any: &dyn Any = process;
                (transfer.pull)(any)
            };
            let Some(value) = value else {
                return Err(self.port_type_error(eid));
            };

            let pushed = {
                let transfer = self.transfers[slot]
                    .as_mut()
                    .expect("transfer checked above");
                let Some(process) = self
                    .dag
                    .node_weight_mut(id.0)
                    .and_then(|n| n.process_mut())
                else {
                    continue;
                };
                let any: &mut dyn Any = process;
                (transfer.push)(any, value)
            };
            if !pushed {
                return Err(self.port_type_error(eid));
            }
        }

        Ok(())
    }

    fn port_type_error(&self, eid: EdgeId) -> Error {
        let edge = self.dag.edge_weight(eid.0).expect("edge registered");
        let name = |id: NodeId| {
            self.dag
                .node_weight(id.0)
                .map(|n| n.name().to_string())
                .unwrap_or_else(|| format!("#{}", id.index()))
        };
        Error::PortType {
            from: name(edge.from()),
            from_port: edge.from_port().to_string(),
            to: name(edge.to()),
            to_port: edge.to_port().to_string(),
        }
    }

    /// Fold the output nodes' statuses into the cycle result.
    fn cycle_status(&self) -> StepStatus {
        let mut cycle = StepStatus::Failure;
        for id in self.output_nodes() {
            match self.dag.node_weight(id.0).expect("node exists").last_status() {
                StepStatus::Success => return StepStatus::Success,
                StepStatus::Skip => cycle = StepStatus::Skip,
                StepStatus::Failure => {}
            }
        }
        cycle
    }

    /// Reset every node so the pipeline can be restarted after a failure.
    ///
    /// Returns `false` on the first node whose reset fails.
    pub fn reset(&mut self) -> bool {
        let ids: Vec<NodeId> = self.dag.graph().node_indices().map(NodeId).collect();
        for id in ids {
            if !self.reset_node(id) {
                return false;
            }
        }
        true
    }

    /// Reset one node after a failure.
    ///
    /// The node's recorded status is cleared to `Success` unconditionally.
    /// Outgoing edges are reset first, in registration order; the first
    /// edge-reset failure short-circuits with `false` before the process's
    /// own reset hook runs.
    pub fn reset_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.dag.node_weight_mut(id.0) else {
            return false;
        };
        node.set_succeeded();
        let outgoing: Vec<EdgeId> = node.outgoing().to_vec();

        for eid in outgoing {
            let edge = self.dag.edge_weight_mut(eid.0).expect("edge registered");
            if !edge.reset() {
                tracing::debug!("edge reset failed while resetting node #{}", id.index());
                return false;
            }
        }

        self.dag
            .node_weight_mut(id.0)
            .expect("node exists")
            .reset_process()
    }

    /// Reset a node and everything downstream of it.
    ///
    /// These are exactly the nodes that fail as a consequence of `id`
    /// failing.
    pub fn reset_downstream(&mut self, id: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        let mut targets = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            targets.push(current);
            let Some(node) = self.dag.node_weight(current.0) else {
                continue;
            };
            for eid in node.outgoing() {
                let edge = self.dag.edge_weight(eid.0).expect("edge registered");
                stack.push(edge.to());
            }
        }

        for target in targets {
            if !self.reset_node(target) {
                return false;
            }
        }
        true
    }

    /// Aggregate every node's parameters, keyed by node name.
    pub fn params(&self) -> ConfigBlock {
        let mut all = ConfigBlock::new();
        for idx in self.dag.graph().node_indices() {
            if let Some(node) = self.dag.node_weight(idx) {
                node.append_params(&mut all);
            }
        }
        all
    }

    /// Distribute a configuration across all nodes.
    ///
    /// Each node receives the subblock stored under its name. Returns
    /// `false` if any node rejects its configuration; remaining nodes are
    /// still configured.
    pub fn set_params(&mut self, all_params: &ConfigBlock) -> bool {
        let mut ok = true;
        let ids: Vec<NodeId> = self.dag.graph().node_indices().map(NodeId).collect();
        for id in ids {
            if let Some(node) = self.dag.node_weight_mut(id.0) {
                ok &= node.set_params(all_params);
            }
        }
        ok
    }

    /// Timing summaries for every node, in execution order where known.
    pub fn node_timing(&self) -> Vec<NodeTiming> {
        let ids: Vec<NodeId> = if self.order.is_empty() {
            self.dag.graph().node_indices().map(NodeId).collect()
        } else {
            self.order.clone()
        };
        ids.iter()
            .filter_map(|id| self.dag.node_weight(id.0).map(|n| n.timing()))
            .collect()
    }

    /// Log a per-node timing report.
    pub fn log_timing_report(&self) {
        for timing in self.node_timing() {
            tracing::info!(
                "{}: {} steps, {:.1} ms, {:.2} steps/second",
                timing.name,
                timing.steps,
                timing.elapsed_ms,
                timing.steps_per_second
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    struct Scripted {
        name: String,
        script: Vec<StepStatus>,
        calls: u32,
        reset_calls: u32,
    }

    impl Scripted {
        fn new(name: &str, script: Vec<StepStatus>) -> Self {
            Self {
                name: name.to_string(),
                script,
                calls: 0,
                reset_calls: 0,
            }
        }

        fn always(name: &str, status: StepStatus) -> Self {
            Self::new(name, vec![status])
        }
    }

    impl Process for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn step(&mut self) -> StepStatus {
            let status = self
                .script
                .get(self.calls as usize)
                .or(self.script.last())
                .copied()
                .unwrap_or(StepStatus::Success);
            self.calls += 1;
            status
        }

        fn reset(&mut self) -> bool {
            self.reset_calls += 1;
            true
        }
    }

    fn calls(pipeline: &Pipeline, id: NodeId) -> u32 {
        pipeline.process_ref::<Scripted>(id).unwrap().calls
    }

    #[test]
    fn test_required_failure_starves_downstream() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Failure))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        pipeline.add_dependency(a, b).unwrap();
        pipeline.initialize().unwrap();

        assert_eq!(pipeline.step().unwrap(), StepStatus::Failure);
        assert_eq!(pipeline.node(b).unwrap().last_status(), StepStatus::Failure);
        // B's process was never invoked, and the starvation bypassed
        // execute() entirely.
        assert_eq!(calls(&pipeline, b), 0);
        assert_eq!(pipeline.node(b).unwrap().step_count(), 0);
    }

    #[test]
    fn test_required_skip_starves_downstream_gently() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Skip))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        pipeline.add_dependency(a, b).unwrap();
        pipeline.initialize().unwrap();

        assert_eq!(pipeline.step().unwrap(), StepStatus::Skip);
        assert_eq!(pipeline.node(b).unwrap().last_status(), StepStatus::Skip);
        assert_eq!(calls(&pipeline, b), 0);
    }

    #[test]
    fn test_optional_edge_never_gates() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Failure))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        pipeline.add_optional_dependency(a, b).unwrap();
        pipeline.initialize().unwrap();

        assert_eq!(pipeline.step().unwrap(), StepStatus::Success);
        assert_eq!(pipeline.node(b).unwrap().last_status(), StepStatus::Success);
        assert_eq!(calls(&pipeline, b), 1);
    }

    #[test]
    fn test_failed_node_is_not_reattempted() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::new(
                "a",
                vec![StepStatus::Success, StepStatus::Failure],
            ))
            .unwrap();
        pipeline.initialize().unwrap();

        assert_eq!(pipeline.step().unwrap(), StepStatus::Success);
        assert_eq!(pipeline.step().unwrap(), StepStatus::Failure);
        assert_eq!(pipeline.step().unwrap(), StepStatus::Failure);
        // Two real invocations; the third cycle never reached the process.
        assert_eq!(calls(&pipeline, a), 2);
        assert_eq!(pipeline.node(a).unwrap().step_count(), 2);
    }

    #[test]
    fn test_diamond_evaluates_each_node_once_per_cycle() {
        let mut pipeline = Pipeline::new();
        let n1 = pipeline
            .add(Scripted::always("n1", StepStatus::Success))
            .unwrap();
        let n2 = pipeline
            .add(Scripted::always("n2", StepStatus::Success))
            .unwrap();
        let n3 = pipeline
            .add(Scripted::always("n3", StepStatus::Success))
            .unwrap();
        pipeline.add_optional_dependency(n1, n2).unwrap();
        pipeline.add_dependency(n1, n3).unwrap();
        pipeline.add_optional_dependency(n2, n3).unwrap();
        pipeline.initialize().unwrap();

        for _ in 0..3 {
            pipeline.step().unwrap();
        }
        assert_eq!(calls(&pipeline, n1), 3);
        assert_eq!(pipeline.node(n1).unwrap().step_count(), 3);
        assert_eq!(calls(&pipeline, n3), 3);
    }

    #[test]
    fn test_step_before_initialize_is_an_error() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        assert!(matches!(pipeline.step(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_cycle_rejection() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        pipeline.add_dependency(a, b).unwrap();
        assert!(matches!(
            pipeline.add_dependency(b, a),
            Err(Error::WouldCycle { .. })
        ));
    }

    #[test]
    fn test_reset_clears_status_and_reaches_process() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Failure))
            .unwrap();
        pipeline.initialize().unwrap();
        pipeline.step().unwrap();
        assert_eq!(pipeline.node(a).unwrap().last_status(), StepStatus::Failure);

        assert!(pipeline.reset());
        assert_eq!(pipeline.node(a).unwrap().last_status(), StepStatus::Success);
        assert_eq!(pipeline.process_ref::<Scripted>(a).unwrap().reset_calls, 1);
    }

    #[test]
    fn test_reset_short_circuits_on_edge_failure() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        let edge = pipeline.add_dependency(a, b).unwrap();
        pipeline.edge_mut(edge).unwrap().set_reset_hook(|| false);
        pipeline.initialize().unwrap();
        pipeline.step().unwrap();

        assert!(!pipeline.reset_node(a));
        // The status was cleared before the cascade ran, but the process
        // reset never happened.
        assert_eq!(pipeline.node(a).unwrap().last_status(), StepStatus::Success);
        assert_eq!(pipeline.process_ref::<Scripted>(a).unwrap().reset_calls, 0);
    }

    #[test]
    fn test_reset_downstream_only_touches_descendants() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        let c = pipeline
            .add(Scripted::always("c", StepStatus::Success))
            .unwrap();
        pipeline.add_dependency(b, c).unwrap();
        pipeline.initialize().unwrap();

        assert!(pipeline.reset_downstream(b));
        assert_eq!(pipeline.process_ref::<Scripted>(a).unwrap().reset_calls, 0);
        assert_eq!(pipeline.process_ref::<Scripted>(b).unwrap().reset_calls, 1);
        assert_eq!(pipeline.process_ref::<Scripted>(c).unwrap().reset_calls, 1);
    }

    #[test]
    fn test_config_only_node_does_not_mask_failure() {
        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Failure))
            .unwrap();
        let idle = pipeline
            .add_without_execute(Scripted::always("idle", StepStatus::Success))
            .unwrap();
        pipeline.initialize().unwrap();

        // The config-only node stamps Success every cycle without stepping
        // its process, so it must not count as an output node: otherwise a
        // pipeline whose only real node failed would fold to Success and
        // run() would never stop.
        assert!(!pipeline.node(idle).unwrap().is_output_node());
        assert_eq!(pipeline.output_nodes(), vec![a]);
        assert_eq!(pipeline.step().unwrap(), StepStatus::Failure);
        assert_eq!(pipeline.step().unwrap(), StepStatus::Failure);
        assert_eq!(calls(&pipeline, idle), 0);
    }

    #[test]
    fn test_validate_rejects_empty_and_outputless() {
        let pipeline = Pipeline::new();
        assert!(matches!(pipeline.validate(), Err(Error::Invalid(_))));

        let mut pipeline = Pipeline::new();
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        pipeline.mark_output(a, false).unwrap();
        assert!(matches!(pipeline.initialize(), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_to_dot_styles_optional_edges() {
        let mut pipeline = Pipeline::named("dotted");
        let a = pipeline
            .add(Scripted::always("a", StepStatus::Success))
            .unwrap();
        let b = pipeline
            .add(Scripted::always("b", StepStatus::Success))
            .unwrap();
        let c = pipeline
            .add(Scripted::always("c", StepStatus::Success))
            .unwrap();
        pipeline.add_dependency(a, b).unwrap();
        pipeline.add_optional_dependency(b, c).unwrap();

        let dot = pipeline.to_dot();
        assert!(dot.contains("digraph \"dotted\""));
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("\"b\" -> \"c\" [style=dotted];"));
    }
}

//! Topological ordering and simulated sequential execution
//!
//! Nodes are ordered with Kahn's algorithm. Nodes that sit on a cycle, or
//! downstream of one, never reach in-degree zero and are left out of the
//! order: they never run and stay `pending` after a run.
//!
//! Execution is strictly sequential even where branches are independent.
//! The first failing node halts the run; nodes that already succeeded keep
//! their status and later nodes stay `pending`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::config::EngineConfig;
use crate::events::{EventSink, RunEvent};
use crate::runs::{RunOutcome, RunRecord, StepRecord};
use crate::store::GraphStore;
use crate::types::{GraphNode, NodeId, NodeStatus, WorkflowGraph};

/// Execution order for a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologicalOrder {
    /// Nodes in dependency order
    pub order: Vec<NodeId>,
    /// Nodes that never reached in-degree zero
    pub excluded: Vec<NodeId>,
}

impl TopologicalOrder {
    pub fn is_complete(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Order nodes so every edge's source precedes its target
///
/// Ties are broken by node-list order. Edges whose endpoints are not both
/// present are ignored.
pub fn topological_order(graph: &WorkflowGraph) -> TopologicalOrder {
    let mut in_degree: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in &graph.edges {
        if !in_degree.contains_key(edge.source.as_str()) {
            continue;
        }
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
            successors
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    // Duplicate ids are seeded once
    let mut seeded = HashSet::new();
    let mut queue: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0) && seeded.insert(*id))
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        for &target in successors.get(node_id).map(Vec::as_slice).unwrap_or_default() {
            if let Some(deg) = in_degree.get_mut(target) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
    let excluded = graph
        .nodes
        .iter()
        .filter(|n| !ordered.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    TopologicalOrder { order, excluded }
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(String),
}

/// Executes a single node
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, node: &GraphNode) -> StepOutcome;
}

/// Simulated integration call: waits a random delay, then fails if the
/// node carries a mock error.
pub struct SimulatedStep {
    delay: Range<Duration>,
}

impl SimulatedStep {
    /// `delay` is sampled uniformly; an empty range means no delay
    pub fn new(delay: Range<Duration>) -> Self {
        Self { delay }
    }

    fn sample_delay(&self) -> Duration {
        if self.delay.is_empty() {
            return self.delay.start;
        }
        rand::thread_rng().gen_range(self.delay.clone())
    }
}

impl Default for SimulatedStep {
    fn default() -> Self {
        Self::new(EngineConfig::default().step_delay_range())
    }
}

#[async_trait]
impl StepRunner for SimulatedStep {
    async fn run_step(&self, node: &GraphNode) -> StepOutcome {
        let delay = self.sample_delay();
        log::trace!("simulating '{}' for {:?}", node.id, delay);
        tokio::time::sleep(delay).await;

        match &node.data.mock_error {
            Some(message) => StepOutcome::Failure(message.clone()),
            None => StepOutcome::Success,
        }
    }
}

/// Runs a store's graph node by node
pub struct WorkflowRunner<S: StepRunner = SimulatedStep> {
    step: S,
}

impl WorkflowRunner<SimulatedStep> {
    /// Runner using the configured delay window
    pub fn simulated(config: &EngineConfig) -> Self {
        Self::new(SimulatedStep::new(config.step_delay_range()))
    }
}

impl<S: StepRunner> WorkflowRunner<S> {
    pub fn new(step: S) -> Self {
        Self { step }
    }

    /// Execute the graph held by `store`
    ///
    /// Statuses and edge animation are written to the store as the run
    /// progresses; none of it enters undo history. A node failure is
    /// reported in the returned record, not as an error.
    pub async fn run(&self, store: &mut GraphStore, sink: &dyn EventSink) -> RunRecord {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let plan = topological_order(store.graph());
        if !plan.is_complete() {
            log::warn!(
                "{} node(s) are on or behind a cycle and will not run: {:?}",
                plan.excluded.len(),
                plan.excluded
            );
        }

        store.reset_statuses(NodeStatus::Pending);
        let started_at = Utc::now();
        log::info!("run {} started over {} node(s)", run_id, plan.order.len());
        emit(
            sink,
            RunEvent::RunStarted {
                run_id: run_id.clone(),
                node_count: plan.order.len(),
            },
        );

        let mut steps = Vec::with_capacity(plan.order.len());
        for node_id in &plan.order {
            let Some(node) = store.node(node_id).cloned() else {
                continue;
            };

            store.set_node_status(node_id, NodeStatus::Running, None);
            emit(
                sink,
                RunEvent::NodeStarted {
                    run_id: run_id.clone(),
                    node_id: node_id.clone(),
                },
            );

            let incoming: Vec<String> = store
                .graph()
                .incoming_edges(node_id)
                .map(|e| e.id.clone())
                .collect();
            for edge_id in &incoming {
                store.set_edge_animated(edge_id, true);
            }

            let started = tokio::time::Instant::now();
            let outcome = self.step.run_step(&node).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                StepOutcome::Failure(error) => {
                    store.set_node_status(node_id, NodeStatus::Error, Some(error.clone()));
                    steps.push(StepRecord {
                        node_id: node_id.clone(),
                        title: node.data.title.clone(),
                        status: NodeStatus::Error,
                        duration_ms,
                        error: Some(error.clone()),
                    });
                    emit(
                        sink,
                        RunEvent::NodeFailed {
                            run_id: run_id.clone(),
                            node_id: node_id.clone(),
                            error: error.clone(),
                        },
                    );
                    emit(
                        sink,
                        RunEvent::RunFailed {
                            run_id: run_id.clone(),
                            node_id: node_id.clone(),
                            error: error.clone(),
                        },
                    );
                    log::warn!("run {} halted at '{}': {}", run_id, node_id, error);

                    return RunRecord {
                        id: run_id,
                        started_at,
                        finished_at: Utc::now(),
                        outcome: RunOutcome::Failed,
                        steps,
                        failed_node: Some(node_id.clone()),
                    };
                }
                StepOutcome::Success => {
                    store.set_node_status(node_id, NodeStatus::Success, None);
                    for edge_id in &incoming {
                        store.set_edge_animated(edge_id, false);
                    }
                    steps.push(StepRecord {
                        node_id: node_id.clone(),
                        title: node.data.title.clone(),
                        status: NodeStatus::Success,
                        duration_ms,
                        error: None,
                    });
                    emit(
                        sink,
                        RunEvent::NodeSucceeded {
                            run_id: run_id.clone(),
                            node_id: node_id.clone(),
                            duration_ms,
                        },
                    );
                }
            }
        }

        log::info!("run {} completed", run_id);
        emit(sink, RunEvent::RunCompleted { run_id: run_id.clone() });

        RunRecord {
            id: run_id,
            started_at,
            finished_at: Utc::now(),
            outcome: RunOutcome::Succeeded,
            steps,
            failed_node: None,
        }
    }
}

fn emit(sink: &dyn EventSink, event: RunEvent) {
    if let Err(e) = sink.send(event) {
        log::debug!("dropping run event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::events::VecEventSink;
    use crate::types::Connection;

    fn chain() -> WorkflowGraph {
        WorkflowBuilder::new()
            .add_node("A", "Read inbox", "gmail")
            .add_node("B", "Create ticket", "jira")
            .add_node("C", "Notify", "slack")
            .connect("A", "B")
            .connect("B", "C")
            .build()
    }

    fn store_for(graph: WorkflowGraph) -> GraphStore {
        let mut store = GraphStore::new();
        store.load_graph(graph).unwrap();
        store
    }

    fn status(store: &GraphStore, id: &str) -> NodeStatus {
        store.node(id).unwrap().data.status
    }

    #[test]
    fn test_chain_order() {
        let plan = topological_order(&chain());
        assert_eq!(plan.order, vec!["A", "B", "C"]);
        assert!(plan.is_complete());
    }

    #[test]
    fn test_order_respects_every_edge() {
        // Nodes listed in reverse of dependency order
        let graph = WorkflowBuilder::new()
            .add_node("d", "D", "slack")
            .add_node("c", "C", "slack")
            .add_node("b", "B", "slack")
            .add_node("a", "A", "slack")
            .connect("a", "b")
            .connect("a", "c")
            .connect("b", "d")
            .connect("c", "d")
            .build();

        let plan = topological_order(&graph);
        assert_eq!(plan.order.len(), 4);
        let pos = |id: &str| plan.order.iter().position(|n| n == id).unwrap();
        for edge in &graph.edges {
            assert!(pos(&edge.source) < pos(&edge.target));
        }
    }

    #[test]
    fn test_random_acyclic_graphs_order_fully() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let count = rng.gen_range(1..=12);
            // Edges only run from lower to higher rank, so the graph is acyclic
            let ranked: Vec<String> = (0..count).map(|i| format!("n{}", i)).collect();
            let mut listed = ranked.clone();
            listed.shuffle(&mut rng);

            let mut builder = WorkflowBuilder::new();
            for id in &listed {
                builder = builder.add_node(id.clone(), id.clone(), "jira");
            }
            for from in 0..count {
                for to in from + 1..count {
                    if rng.gen_bool(0.3) {
                        builder = builder.connect(ranked[from].clone(), ranked[to].clone());
                    }
                }
            }
            let graph = builder.build();

            let plan = topological_order(&graph);
            assert!(plan.is_complete());
            let mut seen = plan.order.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), count);
            assert_eq!(plan.order.len(), count);

            let pos = |id: &str| plan.order.iter().position(|n| n == id).unwrap();
            for edge in &graph.edges {
                assert!(pos(&edge.source) < pos(&edge.target));
            }
        }
    }

    #[test]
    fn test_cycle_nodes_are_excluded() {
        let graph = WorkflowBuilder::new()
            .add_node("root", "Root", "gmail")
            .add_node("x", "X", "jira")
            .add_node("y", "Y", "jira")
            .add_node("after", "After", "slack")
            .connect("root", "x")
            .connect("x", "y")
            .connect("y", "x")
            .connect("y", "after")
            .build();

        let plan = topological_order(&graph);
        assert_eq!(plan.order, vec!["root"]);
        assert_eq!(plan.excluded, vec!["x", "y", "after"]);
    }

    #[test]
    fn test_dangling_edges_are_ignored() {
        let mut graph = chain();
        graph.edges.push(crate::types::GraphEdge::connect("ghost", "A"));
        assert_eq!(topological_order(&graph).order, vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_in_order() {
        let mut store = store_for(chain());
        let sink = VecEventSink::new();
        let runner = WorkflowRunner::new(SimulatedStep::default());

        let record = runner.run(&mut store, &sink).await;

        assert!(record.succeeded());
        assert_eq!(record.executed_nodes(), vec!["A", "B", "C"]);
        for step in &record.steps {
            assert!((700..=1200).contains(&step.duration_ms), "{}", step.duration_ms);
        }
        for id in ["A", "B", "C"] {
            assert_eq!(status(&store, id), NodeStatus::Success);
        }
        assert!(store.edges().iter().all(|e| !e.animated));
        assert!(matches!(sink.events().last(), Some(RunEvent::RunCompleted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_halts_run() {
        let mut graph = chain();
        graph.nodes[1].data.mock_error = Some("Jira API rate limited".to_string());
        let mut store = store_for(graph);
        let sink = VecEventSink::new();

        let record = WorkflowRunner::new(SimulatedStep::default())
            .run(&mut store, &sink)
            .await;

        assert_eq!(record.outcome, RunOutcome::Failed);
        assert_eq!(record.failed_node.as_deref(), Some("B"));
        assert_eq!(record.executed_nodes(), vec!["A", "B"]);
        assert_eq!(status(&store, "A"), NodeStatus::Success);
        assert_eq!(status(&store, "B"), NodeStatus::Error);
        assert_eq!(status(&store, "C"), NodeStatus::Pending);
        assert_eq!(
            store.node("B").unwrap().data.error.as_deref(),
            Some("Jira API rate limited")
        );

        let started: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, RunEvent::NodeStarted { .. }))
            .collect();
        assert_eq!(started.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cyclic_nodes_stay_pending() {
        let mut store = store_for(chain());
        store.add_edge(Connection::new("C", "B")).unwrap();

        let record = WorkflowRunner::new(SimulatedStep::default())
            .run(&mut store, &crate::events::NullEventSink)
            .await;

        assert!(record.succeeded());
        assert_eq!(record.executed_nodes(), vec!["A"]);
        assert_eq!(status(&store, "B"), NodeStatus::Pending);
        assert_eq!(status(&store, "C"), NodeStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_not_touch_history() {
        let mut store = store_for(chain());
        let len = store.history_len();

        WorkflowRunner::new(SimulatedStep::default())
            .run(&mut store, &crate::events::NullEventSink)
            .await;

        assert_eq!(store.history_len(), len);
    }

    struct Recording {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StepRunner for Recording {
        async fn run_step(&self, node: &GraphNode) -> StepOutcome {
            self.seen.lock().unwrap().push(node.id.clone());
            StepOutcome::Success
        }
    }

    #[tokio::test]
    async fn test_custom_step_runner_sees_dependency_order() {
        let mut store = store_for(chain());
        let runner = WorkflowRunner::new(Recording {
            seen: std::sync::Mutex::new(Vec::new()),
        });

        let record = runner.run(&mut store, &crate::events::NullEventSink).await;

        assert!(record.succeeded());
        assert_eq!(*runner.step.seen.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_node_keeps_incoming_edge_animated() {
        let mut graph = chain();
        graph.nodes[1].data.mock_error = Some("boom".to_string());
        let mut store = store_for(graph);

        WorkflowRunner::new(SimulatedStep::default())
            .run(&mut store, &crate::events::NullEventSink)
            .await;

        let animated: Vec<_> = store
            .edges()
            .iter()
            .filter(|e| e.animated)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(animated, vec!["eA-B"]);
    }
}

//! Dependency resolution and execution ordering

use super::runner::EngineError;
use crate::config::Graph;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Producer and consumer sets for every step
///
/// Producers keep connections whose source is not a step (they resolve to
/// `null` input); such dangling producers never hold up scheduling.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    /// Step ids in graph order
    steps: Vec<String>,

    /// step id -> distinct producer ids, in connection order
    producers: HashMap<String, Vec<String>>,

    /// step id -> distinct consumer ids, in connection order
    consumers: HashMap<String, Vec<String>>,
}

impl Dependencies {
    pub fn build(graph: &Graph) -> Self {
        let steps: Vec<String> = graph.steps.iter().map(|s| s.id.clone()).collect();
        let known: HashSet<&str> = steps.iter().map(String::as_str).collect();

        let mut producers: HashMap<String, Vec<String>> =
            steps.iter().map(|id| (id.clone(), Vec::new())).collect();
        let mut consumers: HashMap<String, Vec<String>> =
            steps.iter().map(|id| (id.clone(), Vec::new())).collect();

        for conn in &graph.connections {
            let from_known = known.contains(conn.from.as_str());
            let to_known = known.contains(conn.to.as_str());
            if !from_known || !to_known {
                warn!(from = %conn.from, to = %conn.to, "connection references an unknown step");
            }

            if let Some(list) = producers.get_mut(&conn.to) {
                if !list.contains(&conn.from) {
                    list.push(conn.from.clone());
                }
            }
            if to_known {
                if let Some(list) = consumers.get_mut(&conn.from) {
                    if !list.contains(&conn.to) {
                        list.push(conn.to.clone());
                    }
                }
            }
        }

        Self {
            steps,
            producers,
            consumers,
        }
    }

    /// Every producer of a step, including dangling ones
    pub fn producers(&self, id: &str) -> &[String] {
        self.producers.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Producers that are steps of the graph
    pub fn step_producers<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a String> + 'a {
        self.producers(id)
            .iter()
            .filter(move |p| self.is_step(p))
    }

    pub fn consumers(&self, id: &str) -> &[String] {
        self.consumers.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_step(&self, id: &str) -> bool {
        self.producers.contains_key(id)
    }
}

/// A valid execution order (Kahn's algorithm, ties broken by graph order)
#[derive(Debug, Clone)]
pub struct Schedule {
    order: Vec<String>,
    position: HashMap<String, usize>,
    dependencies: Dependencies,
}

impl Schedule {
    pub fn build(graph: &Graph) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for step in &graph.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(EngineError::DuplicateStepId {
                    step: step.id.clone(),
                });
            }
        }

        let dependencies = Dependencies::build(graph);
        let graph_index: HashMap<&str, usize> = dependencies
            .steps
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();

        let mut in_degree: HashMap<&str, usize> = dependencies
            .steps
            .iter()
            .map(|id| (id.as_str(), dependencies.step_producers(id).count()))
            .collect();

        let mut queue: VecDeque<&str> = dependencies
            .steps
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree[id] == 0)
            .collect();

        let mut order = Vec::with_capacity(dependencies.steps.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());

            let mut ready: Vec<&str> = Vec::new();
            for consumer in dependencies.consumers(id) {
                if let Some(degree) = in_degree.get_mut(consumer.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(consumer.as_str());
                    }
                }
            }
            ready.sort_by_key(|id| graph_index[id]);
            queue.extend(ready);
        }

        if order.len() < dependencies.steps.len() {
            let done: HashSet<&str> = order.iter().map(String::as_str).collect();
            let unresolved = dependencies
                .steps
                .iter()
                .filter(|id| !done.contains(id.as_str()))
                .cloned()
                .collect();
            return Err(EngineError::CyclicGraph { unresolved });
        }

        let position = order
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        Ok(Self {
            order,
            position,
            dependencies,
        })
    }

    /// Step ids in execution order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Index of a step in the execution order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.position.get(id).copied()
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Connection, Step};

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> Graph {
        Graph::new(
            ids.iter().map(|id| Step::new(*id, "transform")).collect(),
            edges.iter().map(|(f, t)| Connection::new(*f, *t)).collect(),
        )
    }

    fn assert_valid_order(g: &Graph, order: &[String]) {
        assert_eq!(order.len(), g.steps.len());
        let pos: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for conn in &g.connections {
            if let (Some(f), Some(t)) = (pos.get(conn.from.as_str()), pos.get(conn.to.as_str())) {
                assert!(f < t, "{} must run before {}", conn.from, conn.to);
            }
        }
    }

    #[test]
    fn test_dependencies() {
        let g = graph(&["a", "b", "c"], &[("a", "c"), ("b", "c"), ("a", "c"), ("a", "b")]);
        let deps = Dependencies::build(&g);

        assert_eq!(deps.producers("c"), &["a".to_string(), "b".to_string()]);
        assert_eq!(deps.producers("a"), &[] as &[String]);
        assert_eq!(deps.consumers("a"), &["c".to_string(), "b".to_string()]);
        assert!(deps.consumers("c").is_empty());
    }

    #[test]
    fn test_dangling_producer_is_kept_but_not_scheduled() {
        let g = graph(&["a"], &[("ghost", "a"), ("a", "nowhere")]);
        let deps = Dependencies::build(&g);
        assert_eq!(deps.producers("a"), &["ghost".to_string()]);
        assert_eq!(deps.step_producers("a").count(), 0);
        assert!(deps.consumers("a").is_empty());

        let schedule = Schedule::build(&g).unwrap();
        assert_eq!(schedule.order(), &["a".to_string()]);
    }

    #[test]
    fn test_linear_chain() {
        let g = graph(&["c", "b", "a"], &[("a", "b"), ("b", "c")]);
        let schedule = Schedule::build(&g).unwrap();
        assert_eq!(schedule.order(), &["a", "b", "c"]);
    }

    #[test]
    fn test_ties_follow_graph_order() {
        let g = graph(&["x", "y", "z", "sink"], &[("x", "sink"), ("y", "sink"), ("z", "sink")]);
        let schedule = Schedule::build(&g).unwrap();
        assert_eq!(schedule.order(), &["x", "y", "z", "sink"]);

        // Consumers released together are queued in graph order, not edge order
        let g = graph(&["root", "p", "q"], &[("root", "q"), ("root", "p")]);
        let schedule = Schedule::build(&g).unwrap();
        assert_eq!(schedule.order(), &["root", "p", "q"]);
    }

    #[test]
    fn test_diamond_is_valid() {
        let g = graph(
            &["d", "b", "c", "a", "e"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("e", "c")],
        );
        let schedule = Schedule::build(&g).unwrap();
        assert_valid_order(&g, schedule.order());
        assert_eq!(schedule.position("a"), Some(0));
        assert_eq!(schedule.position("d"), Some(4));
    }

    #[test]
    fn test_many_random_dags_are_ordered() {
        // Deterministic pseudo-random DAGs: edges only go from lower to higher index
        let mut seed: u64 = 0x5eed;
        for size in 2..12 {
            let ids: Vec<String> = (0..size).map(|i| format!("s{}", i)).collect();
            let mut edges = Vec::new();
            for i in 0..size {
                for j in (i + 1)..size {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    if (seed >> 33) % 3 == 0 {
                        edges.push((ids[i].clone(), ids[j].clone()));
                    }
                }
            }
            // Present the steps in reverse to make graph order disagree with edges
            let g = Graph::new(
                ids.iter().rev().map(|id| Step::new(id.clone(), "transform")).collect(),
                edges.iter().map(|(f, t)| Connection::new(f.clone(), t.clone())).collect(),
            );
            let schedule = Schedule::build(&g).unwrap();
            assert_valid_order(&g, schedule.order());
        }
    }

    #[test]
    fn test_two_step_cycle() {
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        match Schedule::build(&g) {
            Err(EngineError::CyclicGraph { unresolved }) => assert_eq!(unresolved, vec!["a", "b"]),
            other => panic!("expected cycle, got {:?}", other.map(|s| s.order().to_vec())),
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&["a", "b"], &[("b", "b")]);
        match Schedule::build(&g) {
            Err(EngineError::CyclicGraph { unresolved }) => assert_eq!(unresolved, vec!["b"]),
            other => panic!("expected cycle, got {:?}", other.map(|s| s.order().to_vec())),
        }
    }

    #[test]
    fn test_cycle_downstream_is_unresolved() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "b"), ("c", "d")]);
        match Schedule::build(&g) {
            Err(EngineError::CyclicGraph { unresolved }) => {
                assert_eq!(unresolved, vec!["b", "c", "d"])
            }
            other => panic!("expected cycle, got {:?}", other.map(|s| s.order().to_vec())),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let g = graph(&["a", "a"], &[]);
        assert!(matches!(
            Schedule::build(&g),
            Err(EngineError::DuplicateStepId { .. })
        ));
    }
}

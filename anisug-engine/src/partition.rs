//! Graph partitions and the partitioner seam
//!
//! **Purpose:** Group graph nodes into clusters. Prediction only consumes
//! the resulting [`Partition`]; how it was produced sits behind the
//! [`Partitioner`] trait so any community-detection algorithm can be
//! plugged in.
//!
//! A partition is a snapshot of one graph state. It remembers the graph
//! revision it was computed for, and consumers reject it once the graph has
//! been mutated since.

use crate::error::{EngineError, Result};
use crate::graph::BipartiteGraph;
use anisug_common::config::PartitionerKind;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Opaque cluster identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u64);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node → cluster assignment, total over the graph it was produced for
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    assignments: HashMap<String, ClusterId>,
    graph_revision: u64,
}

impl Partition {
    /// Wrap an assignment map produced for `graph`
    ///
    /// Every node of `graph` must be assigned; otherwise
    /// [`EngineError::IncompletePartition`] names one of the missing nodes.
    pub fn from_assignments(
        graph: &BipartiteGraph,
        assignments: HashMap<String, ClusterId>,
    ) -> Result<Self> {
        let missing: BTreeSet<&str> = graph
            .nodes()
            .map(|(key, _)| key)
            .filter(|key| !assignments.contains_key(*key))
            .collect();

        if let Some(first) = missing.iter().next() {
            return Err(EngineError::IncompletePartition {
                missing: missing.len(),
                example: first.to_string(),
            });
        }

        Ok(Self {
            assignments,
            graph_revision: graph.revision(),
        })
    }

    pub fn cluster_of(&self, key: &str) -> Option<ClusterId> {
        self.assignments.get(key).copied()
    }

    /// Keys assigned to `cluster`, in arbitrary order
    pub fn members(&self, cluster: ClusterId) -> impl Iterator<Item = &str> {
        self.assignments
            .iter()
            .filter(move |(_, c)| **c == cluster)
            .map(|(k, _)| k.as_str())
    }

    pub fn cluster_count(&self) -> usize {
        self.assignments.values().collect::<BTreeSet<_>>().len()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Revision of the graph this partition was computed for
    pub fn graph_revision(&self) -> u64 {
        self.graph_revision
    }

    /// Fail with [`EngineError::StalePartition`] if `graph` changed since
    pub fn ensure_current(&self, graph: &BipartiteGraph) -> Result<()> {
        if self.graph_revision != graph.revision() {
            return Err(EngineError::StalePartition {
                partition_revision: self.graph_revision,
                graph_revision: graph.revision(),
            });
        }
        Ok(())
    }
}

/// Computes a partition of a graph
///
/// Implementations must assign every node to exactly one cluster.
pub trait Partitioner {
    fn name(&self) -> &str;

    fn partition(&self, graph: &BipartiteGraph) -> Result<Partition>;
}

/// Places every node in a single cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleClusterPartitioner;

impl Partitioner for SingleClusterPartitioner {
    fn name(&self) -> &str {
        "single"
    }

    fn partition(&self, graph: &BipartiteGraph) -> Result<Partition> {
        let assignments = graph
            .nodes()
            .map(|(key, _)| (key.to_string(), ClusterId(0)))
            .collect();
        Partition::from_assignments(graph, assignments)
    }
}

/// Node keys in sorted order, with key → index lookup
fn indexed_nodes(graph: &BipartiteGraph) -> (Vec<&str>, HashMap<&str, usize>) {
    let mut keys: Vec<&str> = graph.nodes().map(|(key, _)| key).collect();
    keys.sort_unstable();
    let index = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    (keys, index)
}

fn assignments_from_labels(keys: &[&str], labels: &[usize]) -> HashMap<String, ClusterId> {
    keys.iter()
        .zip(labels)
        .map(|(key, label)| (key.to_string(), ClusterId(*label as u64)))
        .collect()
}

/// One cluster per connected component
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentPartitioner;

impl Partitioner for ComponentPartitioner {
    fn name(&self) -> &str {
        "components"
    }

    fn partition(&self, graph: &BipartiteGraph) -> Result<Partition> {
        let (keys, index) = indexed_nodes(graph);
        let mut parent: Vec<usize> = (0..keys.len()).collect();
        let mut rank = vec![0u8; keys.len()];

        // Find with path halving
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (user, item, _) in graph.edges() {
            let a = find(&mut parent, index[user]);
            let b = find(&mut parent, index[item]);
            if a == b {
                continue;
            }
            // Union by rank
            match rank[a].cmp(&rank[b]) {
                std::cmp::Ordering::Less => parent[a] = b,
                std::cmp::Ordering::Greater => parent[b] = a,
                std::cmp::Ordering::Equal => {
                    parent[b] = a;
                    rank[a] += 1;
                }
            }
        }

        let labels: Vec<usize> = (0..keys.len()).map(|i| find(&mut parent, i)).collect();
        let partition = Partition::from_assignments(graph, assignments_from_labels(&keys, &labels))?;
        debug!("Connected components: {}", partition.cluster_count());
        Ok(partition)
    }
}

/// Weighted label propagation
///
/// Every node starts in its own cluster. Each round visits the nodes in a
/// seed-dependent shuffled order and moves each node to the label carrying
/// the largest total edge weight among its neighbors (smallest label on
/// ties). Stops when a round changes nothing or after `max_iterations`.
///
/// Different seeds can yield different partitions of the same graph.
#[derive(Debug, Clone)]
pub struct LabelPropagationPartitioner {
    seed: u64,
    max_iterations: usize,
}

impl LabelPropagationPartitioner {
    /// `seed: None` draws a random seed, which is logged so the run can be
    /// reproduced
    pub fn new(seed: Option<u64>, max_iterations: usize) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            seed,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Partitioner for LabelPropagationPartitioner {
    fn name(&self) -> &str {
        "label_propagation"
    }

    fn partition(&self, graph: &BipartiteGraph) -> Result<Partition> {
        let (keys, index) = indexed_nodes(graph);
        let n = keys.len();

        let adjacency: Vec<Vec<(usize, f64)>> = keys
            .iter()
            .map(|key| {
                let mut neighbors: Vec<(usize, f64)> = graph
                    .weighted_neighbors_of(key)
                    .map(|(neighbor, weight)| (index[neighbor], weight))
                    .collect();
                neighbors.sort_unstable_by_key(|(i, _)| *i);
                neighbors
            })
            .collect();

        let mut labels: Vec<usize> = (0..n).collect();
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rounds = 0;

        for _ in 0..self.max_iterations {
            rounds += 1;
            order.shuffle(&mut rng);
            let mut changed = false;

            for &node in &order {
                if adjacency[node].is_empty() {
                    continue;
                }

                let mut weight_by_label: HashMap<usize, f64> = HashMap::new();
                for &(neighbor, weight) in &adjacency[node] {
                    *weight_by_label.entry(labels[neighbor]).or_insert(0.0) += weight;
                }

                let best = weight_by_label
                    .into_iter()
                    .max_by(|(la, wa), (lb, wb)| wa.total_cmp(wb).then_with(|| lb.cmp(la)))
                    .map(|(label, _)| label);

                if let Some(best) = best {
                    if best != labels[node] {
                        labels[node] = best;
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let partition = Partition::from_assignments(graph, assignments_from_labels(&keys, &labels))?;
        info!(
            "Label propagation (seed {}): {} clusters after {} round(s)",
            self.seed,
            partition.cluster_count(),
            rounds
        );
        Ok(partition)
    }
}

/// Build the partitioner selected by name in the config
pub fn partitioner_for(
    kind: PartitionerKind,
    seed: Option<u64>,
    max_iterations: usize,
) -> Box<dyn Partitioner> {
    match kind {
        PartitionerKind::LabelPropagation => {
            Box::new(LabelPropagationPartitioner::new(seed, max_iterations))
        }
        PartitionerKind::Components => Box::new(ComponentPartitioner),
        PartitionerKind::Single => Box::new(SingleClusterPartitioner),
    }
}

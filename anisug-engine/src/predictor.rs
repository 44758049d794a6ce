//! Cluster-neighborhood score prediction
//!
//! **Purpose:** Turn a partition into predicted ratings for the query user.
//!
//! The predicted score of a title is the sum of the ratings given to it by
//! the query user's cluster-mates, divided by the full number of users in
//! the cluster (query user included). Users who did not rate the title count
//! as zero, so titles popular within the cluster rank above titles a single
//! cluster-mate loved.

use crate::error::{EngineError, Result};
use crate::graph::{BipartiteGraph, NodeKind, QUERY_USER};
use crate::partition::{ClusterId, Partition};
use crate::{Score, NEUTRAL_SCORE};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Cluster of the query user, after checking the partition is usable
fn query_cluster(graph: &BipartiteGraph, partition: &Partition) -> Result<ClusterId> {
    partition.ensure_current(graph)?;
    if !graph.has_query_user() {
        return Err(EngineError::QueryUserUnpartitioned);
    }
    partition
        .cluster_of(QUERY_USER)
        .ok_or(EngineError::QueryUserUnpartitioned)
}

/// Every user in the query user's cluster, query user included, sorted
///
/// Never empty on success.
pub fn cluster_users(graph: &BipartiteGraph, partition: &Partition) -> Result<Vec<String>> {
    let cluster = query_cluster(graph, partition)?;

    let mut users: Vec<String> = graph
        .users()
        .filter(|user| partition.cluster_of(user) == Some(cluster))
        .map(str::to_string)
        .collect();
    users.sort_unstable();
    Ok(users)
}

/// Predicted score for every candidate the query user has not rated
///
/// Results follow candidate order; candidates present in `known` and
/// repeated candidates are skipped. A candidate missing from the graph
/// gets [`NEUTRAL_SCORE`]. A candidate that names a user node is rejected
/// with [`EngineError::InvalidQuery`].
pub fn predict_scores(
    graph: &BipartiteGraph,
    partition: &Partition,
    candidates: &[String],
    known: &BTreeMap<String, Score>,
) -> Result<Vec<(String, Score)>> {
    let cluster = query_cluster(graph, partition)?;
    let cluster_size = graph
        .users()
        .filter(|user| partition.cluster_of(user) == Some(cluster))
        .count();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut predictions = Vec::with_capacity(candidates.len());
    let mut neutral = 0usize;

    for item in candidates {
        if known.contains_key(item) || !seen.insert(item.as_str()) {
            continue;
        }

        match graph.kind_of(item) {
            None => {
                neutral += 1;
                predictions.push((item.clone(), NEUTRAL_SCORE));
            }
            Some(NodeKind::User) => {
                return Err(EngineError::InvalidQuery(format!(
                    "'{}' is a user, not a title",
                    item
                )));
            }
            Some(NodeKind::Item) => {
                let mut contributions: Vec<(&str, Score)> = graph
                    .weighted_neighbors_of(item)
                    .filter(|(user, _)| {
                        *user != QUERY_USER && partition.cluster_of(user) == Some(cluster)
                    })
                    .collect();
                // Fixed summation order keeps results bit-identical across runs
                contributions.sort_unstable_by(|a, b| a.0.cmp(b.0));
                let sum: Score = contributions.iter().map(|(_, w)| w).sum();

                predictions.push((item.clone(), sum / cluster_size as Score));
            }
        }
    }

    debug!(
        "Predicted {} title(s) from a cluster of {} user(s) ({} neutral)",
        predictions.len(),
        cluster_size,
        neutral
    );
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Partitioner, SingleClusterPartitioner};
    use std::collections::HashMap;

    fn titles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    /// 3 users rating the same 4 titles, plus a query user rating 2 of them
    fn shared_graph() -> BipartiteGraph {
        let mut graph = BipartiteGraph::new();
        let ratings = [
            ("u1", [0.9, 0.8, 0.6, 0.2]),
            ("u2", [0.7, 0.5, 0.9, 0.1]),
            ("u3", [0.4, 1.0, 0.3, 0.6]),
        ];
        for (user, scores) in ratings {
            for (item, score) in ["A", "B", "C", "D"].iter().zip(scores) {
                graph.add_rating(user, item, score).unwrap();
            }
        }
        graph.add_query_user([("A", 1.0), ("B", 0.2)]).unwrap();
        graph
    }

    fn known() -> BTreeMap<String, Score> {
        [("A".to_string(), 1.0), ("B".to_string(), 0.2)].into_iter().collect()
    }

    #[test]
    fn test_single_cluster_averages_over_full_cluster() {
        let graph = shared_graph();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();

        let scores = predict_scores(&graph, &partition, &titles(&["A", "B", "C", "D"]), &known())
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].0, "C");
        assert!((scores[0].1 - (0.6 + 0.9 + 0.3) / 4.0).abs() < 1e-12);
        assert_eq!(scores[1].0, "D");
        assert!((scores[1].1 - (0.2 + 0.1 + 0.6) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_titles_never_predicted() {
        let graph = shared_graph();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();
        let scores =
            predict_scores(&graph, &partition, &titles(&["A", "C", "C", "B"]), &known()).unwrap();
        let names: Vec<&str> = scores.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(names, vec!["C"]);
    }

    #[test]
    fn test_users_outside_cluster_contribute_nothing() {
        let graph = shared_graph();
        let assignments: HashMap<String, ClusterId> = graph
            .nodes()
            .map(|(key, _)| {
                let cluster = if key == "u3" { 1 } else { 0 };
                (key.to_string(), ClusterId(cluster))
            })
            .collect();
        let partition = Partition::from_assignments(&graph, assignments).unwrap();

        assert_eq!(
            cluster_users(&graph, &partition).unwrap(),
            vec![QUERY_USER.to_string(), "u1".to_string(), "u2".to_string()]
        );

        let scores = predict_scores(&graph, &partition, &titles(&["C"]), &known()).unwrap();
        assert!((scores[0].1 - (0.6 + 0.9) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_title_missing_from_graph_is_neutral() {
        let graph = shared_graph();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();
        let scores = predict_scores(&graph, &partition, &titles(&["Unseen"]), &known()).unwrap();
        assert_eq!(scores, vec![("Unseen".to_string(), NEUTRAL_SCORE)]);
    }

    #[test]
    fn test_user_candidate_rejected() {
        let graph = shared_graph();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();
        assert!(matches!(
            predict_scores(&graph, &partition, &titles(&["u1"]), &known()),
            Err(EngineError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_requires_query_user() {
        let mut graph = BipartiteGraph::new();
        graph.add_rating("u1", "A", 0.5).unwrap();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();
        assert!(matches!(
            cluster_users(&graph, &partition),
            Err(EngineError::QueryUserUnpartitioned)
        ));
    }

    #[test]
    fn test_stale_partition_rejected() {
        let mut graph = BipartiteGraph::new();
        graph.add_rating("u1", "A", 0.5).unwrap();
        let partition = SingleClusterPartitioner.partition(&graph).unwrap();
        graph.add_query_user([("A", 0.5)]).unwrap();

        assert!(matches!(
            predict_scores(&graph, &partition, &titles(&["A"]), &BTreeMap::new()),
            Err(EngineError::StalePartition { .. })
        ));
    }
}

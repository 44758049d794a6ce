//! Explanatory subgraph around a set of suggestions

use crate::error::Result;
use crate::graph::{BipartiteGraph, NodeKind, QUERY_USER};
use tracing::debug;

/// Graph of the cluster-mates and the suggested titles
///
/// Holds every title in `items` and every user in `cluster_users` except the
/// query user, whether or not they have edges. Edges are copied from `graph`
/// only where they exist; a user who never rated a title simply has no edge
/// to it.
pub fn extract(
    graph: &BipartiteGraph,
    cluster_users: &[String],
    items: &[String],
) -> Result<BipartiteGraph> {
    let mut subgraph = BipartiteGraph::new();

    for item in items {
        subgraph.add_node(item, NodeKind::Item)?;
    }

    for user in cluster_users.iter().filter(|u| u.as_str() != QUERY_USER) {
        subgraph.add_node(user, NodeKind::User)?;
        for item in items {
            if graph.has_edge(user, item) {
                subgraph.add_rating(user, item, graph.edge_weight(user, item)?)?;
            }
        }
    }

    debug!(
        "Extracted subgraph: {} nodes, {} edges",
        subgraph.node_count(),
        subgraph.edge_count()
    );
    Ok(subgraph)
}

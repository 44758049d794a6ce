//! # Bipartite User/Title Graph
//!
//! Weighted undirected graph over two node kinds. Users connect only to the
//! titles they rated; the edge weight is the normalized rating.
//!
//! ## Design
//!
//! - Explicit adjacency: node key → kind plus neighbor key → weight
//! - Every edge is stored on both endpoints, so neighbor lookups are O(1)
//! - Re-adding a (user, title) pair overwrites the weight (last write wins)
//! - A node's kind is fixed at creation; re-using a key with the other kind
//!   is rejected
//! - `revision` counts mutations so a [`Partition`](crate::partition::Partition)
//!   can detect that it was computed for an older graph
//!
//! Bipartiteness is maintained by [`BipartiteGraph::add_rating`], the only
//! way to insert an edge: its first argument is always a user, its second
//! always a title.

use crate::dataset::RatingStore;
use crate::error::{EngineError, Result};
use crate::Score;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Reserved key of the synthetic node that represents the live session input
pub const QUERY_USER: &str = "program_user";

/// The two node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Item,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::User => "user",
            NodeKind::Item => "item",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NodeEntry {
    kind: NodeKind,
    neighbors: HashMap<String, Score>,
}

impl NodeEntry {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            neighbors: HashMap::new(),
        }
    }
}

/// Weighted bipartite graph of users and titles
#[derive(Debug, Clone, Default)]
pub struct BipartiteGraph {
    nodes: HashMap<String, NodeEntry>,
    edge_count: usize,
    revision: u64,
}

/// Two graphs are equal when they hold the same nodes, kinds, edges and
/// weights; the mutation counter is not part of the comparison.
impl PartialEq for BipartiteGraph {
    fn eq(&self, other: &Self) -> bool {
        self.edge_count == other.edge_count && self.nodes == other.nodes
    }
}

impl BipartiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the base graph from every (user, title, rating) triple
    ///
    /// Building twice from the same store yields equal graphs.
    pub fn build(store: &RatingStore) -> Result<Self> {
        let mut graph = Self::new();
        for (user, ratings) in store.user_ratings() {
            graph.add_node(user, NodeKind::User)?;
            for (item, score) in ratings {
                graph.add_rating(user, item, *score)?;
            }
        }

        debug!(
            "Built graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Ensure a node exists with the given kind
    ///
    /// Returns `Ok(true)` if the node was created, `Ok(false)` if it already
    /// existed with the same kind.
    pub fn add_node(&mut self, key: &str, kind: NodeKind) -> Result<bool> {
        self.check_kind(key, kind)?;
        if self.nodes.contains_key(key) {
            return Ok(false);
        }

        self.nodes.insert(key.to_string(), NodeEntry::new(kind));
        self.revision += 1;
        Ok(true)
    }

    /// Fails with [`EngineError::KindConflict`] if `key` exists with the
    /// other kind
    fn check_kind(&self, key: &str, kind: NodeKind) -> Result<()> {
        match self.nodes.get(key) {
            Some(existing) if existing.kind != kind => Err(EngineError::KindConflict {
                key: key.to_string(),
                existing: existing.kind.as_str(),
                requested: kind.as_str(),
            }),
            _ => Ok(()),
        }
    }

    /// Insert or overwrite the edge between `user` and `item`
    ///
    /// Both nodes are created on demand with their kinds. On a kind
    /// conflict the graph is left unchanged.
    pub fn add_rating(&mut self, user: &str, item: &str, weight: Score) -> Result<()> {
        self.check_kind(user, NodeKind::User)?;
        self.check_kind(item, NodeKind::Item)?;
        self.add_node(user, NodeKind::User)?;
        self.add_node(item, NodeKind::Item)?;

        let previous = self
            .nodes
            .get_mut(user)
            .and_then(|entry| entry.neighbors.insert(item.to_string(), weight));
        if let Some(entry) = self.nodes.get_mut(item) {
            entry.neighbors.insert(user.to_string(), weight);
        }

        if previous.is_none() {
            self.edge_count += 1;
        }
        self.revision += 1;
        Ok(())
    }

    /// Add the session query user and one edge per supplied rating
    ///
    /// Titles never seen in the base data are created as new item nodes.
    /// A graph accepts the query user once; a second call fails with
    /// [`EngineError::QueryUserPresent`].
    ///
    /// Every title is checked before anything is inserted, so a rejected
    /// call leaves the graph (and its revision) unchanged.
    pub fn add_query_user<'a, I>(&mut self, item_scores: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Score)>,
    {
        if self.nodes.contains_key(QUERY_USER) {
            return Err(EngineError::QueryUserPresent);
        }

        let item_scores: Vec<(&str, Score)> = item_scores.into_iter().collect();
        for (item, _) in &item_scores {
            if *item == QUERY_USER {
                return Err(EngineError::KindConflict {
                    key: QUERY_USER.to_string(),
                    existing: NodeKind::User.as_str(),
                    requested: NodeKind::Item.as_str(),
                });
            }
            self.check_kind(item, NodeKind::Item)?;
        }

        self.add_node(QUERY_USER, NodeKind::User)?;
        for (item, score) in &item_scores {
            self.add_rating(QUERY_USER, item, *score)?;
        }

        debug!("Added query user with {} rating(s)", item_scores.len());
        Ok(())
    }

    pub fn has_query_user(&self) -> bool {
        self.nodes.contains_key(QUERY_USER)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Kind of `key`, or `None` if the node does not exist
    pub fn kind_of(&self, key: &str) -> Option<NodeKind> {
        self.nodes.get(key).map(|entry| entry.kind)
    }

    /// Neighbors of `key`; empty for an unknown node
    pub fn neighbors_of<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.nodes
            .get(key)
            .into_iter()
            .flat_map(|entry| entry.neighbors.keys().map(String::as_str))
    }

    /// Neighbors of `key` together with the connecting edge weights
    pub fn weighted_neighbors_of<'a>(
        &'a self,
        key: &str,
    ) -> impl Iterator<Item = (&'a str, Score)> + 'a {
        self.nodes
            .get(key)
            .into_iter()
            .flat_map(|entry| entry.neighbors.iter().map(|(k, w)| (k.as_str(), *w)))
    }

    pub fn degree(&self, key: &str) -> usize {
        self.nodes.get(key).map_or(0, |entry| entry.neighbors.len())
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.nodes
            .get(a)
            .is_some_and(|entry| entry.neighbors.contains_key(b))
    }

    /// Weight of the edge between `a` and `b`
    ///
    /// Callers are expected to check adjacency first; asking for a missing
    /// edge is reported as [`EngineError::MissingEdge`].
    pub fn edge_weight(&self, a: &str, b: &str) -> Result<Score> {
        self.nodes
            .get(a)
            .and_then(|entry| entry.neighbors.get(b))
            .copied()
            .ok_or_else(|| EngineError::MissingEdge {
                a: a.to_string(),
                b: b.to_string(),
            })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of mutations applied since creation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All node keys with their kinds, in arbitrary order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, NodeKind)> {
        self.nodes.iter().map(|(k, entry)| (k.as_str(), entry.kind))
    }

    /// Keys of all user nodes, in arbitrary order
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.nodes_of_kind(NodeKind::User)
    }

    /// Keys of all title nodes, in arbitrary order
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.nodes_of_kind(NodeKind::Item)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(move |(_, entry)| entry.kind == kind)
            .map(|(k, _)| k.as_str())
    }

    /// Every edge once, as (user, title, weight)
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, Score)> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.kind == NodeKind::User)
            .flat_map(|(user, entry)| {
                entry
                    .neighbors
                    .iter()
                    .map(move |(item, w)| (user.as_str(), item.as_str(), *w))
            })
    }
}

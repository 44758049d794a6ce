//! Versioned JSON snapshots of the rating store and the base graph
//!
//! **Purpose:** Let a session skip CSV parsing and graph construction by
//! loading both from disk.
//!
//! Every file starts with a header naming its format and schema version.
//! The header is checked before the body is decoded, so a file from another
//! tool or a newer release fails with [`EngineError::UnsupportedSnapshot`]
//! instead of a confusing field error.

use crate::dataset::{GenreItems, ItemGenres, RatingStore, UserRatings};
use crate::error::{EngineError, Result};
use crate::graph::{BipartiteGraph, NodeKind, QUERY_USER};
use crate::Score;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Format tag of rating store snapshots
pub const STORE_FORMAT: &str = "anisug.rating_store";
/// Format tag of base graph snapshots
pub const GRAPH_FORMAT: &str = "anisug.base_graph";
/// Schema version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default file names inside the data folder
pub const STORE_SNAPSHOT_FILE: &str = "store.json";
pub const GRAPH_SNAPSHOT_FILE: &str = "graph.json";

/// Common snapshot header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl SnapshotHeader {
    fn new(format: &str) -> Self {
        Self {
            format: format.to_string(),
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
        }
    }

    fn check(&self, expected_format: &str) -> Result<()> {
        if self.format != expected_format {
            return Err(EngineError::UnsupportedSnapshot(format!(
                "expected format '{}', found '{}'",
                expected_format, self.format
            )));
        }
        if self.version == 0 || self.version > SNAPSHOT_VERSION {
            return Err(EngineError::UnsupportedSnapshot(format!(
                "version {} is not supported (this build reads up to {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }
}

/// Serialized form of the three [`RatingStore`] tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(flatten)]
    pub header: SnapshotHeader,
    pub item_genres: ItemGenres,
    pub genre_items: GenreItems,
    pub user_ratings: UserRatings,
}

impl StoreSnapshot {
    pub fn capture(store: &RatingStore) -> Self {
        Self {
            header: SnapshotHeader::new(STORE_FORMAT),
            item_genres: store.item_genres().clone(),
            genre_items: store.genre_items().clone(),
            user_ratings: store.user_ratings().clone(),
        }
    }

    /// Rebuild the store, re-running its validation
    pub fn into_store(self) -> Result<RatingStore> {
        RatingStore::from_parts(self.item_genres, self.genre_items, self.user_ratings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_checked(path, STORE_FORMAT)
    }
}

/// One edge of a serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub user: String,
    pub item: String,
    pub weight: Score,
}

/// Node and edge lists of a graph, sorted for stable output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphLayout {
    pub users: Vec<String>,
    pub items: Vec<String>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphLayout {
    pub fn of(graph: &BipartiteGraph) -> Self {
        let mut users: Vec<String> = graph.users().map(str::to_string).collect();
        let mut items: Vec<String> = graph.items().map(str::to_string).collect();
        let mut edges: Vec<EdgeRecord> = graph
            .edges()
            .map(|(user, item, weight)| EdgeRecord {
                user: user.to_string(),
                item: item.to_string(),
                weight,
            })
            .collect();

        users.sort_unstable();
        items.sort_unstable();
        edges.sort_unstable_by(|a, b| (&a.user, &a.item).cmp(&(&b.user, &b.item)));

        Self {
            users,
            items,
            edges,
        }
    }

    pub fn to_graph(&self) -> Result<BipartiteGraph> {
        let mut graph = BipartiteGraph::new();
        for user in &self.users {
            graph.add_node(user, NodeKind::User)?;
        }
        for item in &self.items {
            graph.add_node(item, NodeKind::Item)?;
        }
        for edge in &self.edges {
            graph.add_rating(&edge.user, &edge.item, edge.weight)?;
        }
        Ok(graph)
    }
}

/// Serialized base graph
///
/// Only ever holds a base graph: capturing a graph that contains the query
/// user is refused, and so is loading a file that names it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(flatten)]
    pub header: SnapshotHeader,
    pub graph: GraphLayout,
}

impl GraphSnapshot {
    pub fn capture(graph: &BipartiteGraph) -> Result<Self> {
        if graph.has_query_user() {
            return Err(EngineError::QueryUserPresent);
        }
        Ok(Self {
            header: SnapshotHeader::new(GRAPH_FORMAT),
            graph: GraphLayout::of(graph),
        })
    }

    pub fn into_graph(self) -> Result<BipartiteGraph> {
        if self.graph.users.iter().any(|u| u == QUERY_USER) {
            return Err(EngineError::ReservedKey(QUERY_USER.to_string()));
        }
        self.graph.to_graph()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_checked(path, GRAPH_FORMAT)
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    info!("Wrote snapshot {}", path.display());
    Ok(())
}

fn read_checked<T: DeserializeOwned>(path: &Path, format: &str) -> Result<T> {
    let text = fs::read_to_string(path)?;

    let header: SnapshotHeader = serde_json::from_str(&text).map_err(|e| {
        EngineError::UnsupportedSnapshot(format!("{}: missing header ({})", path.display(), e))
    })?;
    header.check(format)?;

    let value = serde_json::from_str(&text)?;
    debug!(
        "Loaded {} v{} created {} from {}",
        header.format,
        header.version,
        header.created_at,
        path.display()
    );
    Ok(value)
}

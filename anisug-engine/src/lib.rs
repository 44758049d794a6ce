//! # Anime Suggestion Engine
//!
//! Predicts how much a user would enjoy unseen titles from a handful of
//! ratings they supply.
//!
//! **Pipeline:**
//! - [`dataset::RatingStore`] holds the immutable rating and genre tables
//! - [`graph::BipartiteGraph`] links users to the titles they rated, weighted
//!   by the rating; one synthetic query user is added per session
//! - a [`partition::Partitioner`] groups graph nodes into clusters
//! - [`predictor::predict_scores`] averages the query user's cluster-mates'
//!   ratings over every title the query user has not rated
//! - [`ranker::top_n`] keeps the best titles and [`subgraph::extract`] builds
//!   a small explanatory graph around them
//!
//! [`affinity`] provides genre-compatibility scores used to enrich reports.

pub mod affinity;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod partition;
pub mod predictor;
pub mod ranker;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod subgraph;

pub use crate::error::{EngineError, Result};
pub use dataset::RatingStore;
pub use graph::{BipartiteGraph, NodeKind, QUERY_USER};
pub use partition::{ClusterId, Partition, Partitioner};
pub use session::{RecommendationSession, SessionOutcome, SessionRequest};

/// A normalized rating or compatibility, conventionally in [0, 1]
pub type Score = f64;

/// Fallback score when there is not enough data for a real one
pub const NEUTRAL_SCORE: Score = 0.5;

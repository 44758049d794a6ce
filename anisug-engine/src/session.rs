//! One recommendation session, end to end
//!
//! **Purpose:** Validate the query user's preferences, then run the
//! pipeline against a private copy of the base graph:
//!
//! 1. add the query user and their ratings
//! 2. partition the extended graph
//! 3. predict scores from the query user's cluster
//! 4. rank, and extract the explanatory subgraph for the winners
//!
//! The store and the base graph are borrowed read-only; nothing survives a
//! session except the returned [`SessionOutcome`].

use crate::affinity::genre_profile;
use crate::dataset::RatingStore;
use crate::error::{EngineError, Result};
use crate::graph::{BipartiteGraph, NodeKind, QUERY_USER};
use crate::partition::Partitioner;
use crate::predictor::{cluster_users, predict_scores};
use crate::ranker::top_n_scored;
use crate::subgraph;
use crate::Score;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Number of genres kept in the query user's genre profile
pub const DEFAULT_PROFILE_SIZE: usize = 5;

/// The query user's input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// (title, rating in [0, 1]); a repeated title keeps its last rating
    pub preferences: Vec<(String, Score)>,

    /// Number of suggestions wanted, at least 1
    pub count: usize,
}

impl SessionRequest {
    pub fn new(count: usize) -> Self {
        Self {
            preferences: Vec::new(),
            count,
        }
    }

    pub fn with_rating(mut self, item: impl Into<String>, score: Score) -> Self {
        self.preferences.push((item.into(), score));
        self
    }

    /// Reject input the prediction core must never see
    pub fn validate(&self, store: &RatingStore) -> Result<()> {
        if self.count == 0 {
            return Err(EngineError::InvalidQuery(
                "at least one suggestion must be requested".to_string(),
            ));
        }
        if self.preferences.is_empty() {
            return Err(EngineError::InvalidQuery(
                "no ratings supplied".to_string(),
            ));
        }

        for (item, score) in &self.preferences {
            if !score.is_finite() || !(0.0..=1.0).contains(score) {
                return Err(EngineError::InvalidQuery(format!(
                    "rating {} for '{}' is outside [0, 1]",
                    score, item
                )));
            }
            if !store.contains_item(item) {
                return Err(EngineError::InvalidQuery(format!(
                    "unknown title '{}'",
                    item
                )));
            }
        }
        Ok(())
    }

    /// Preferences as title → rating, last rating wins
    pub fn known_scores(&self) -> BTreeMap<String, Score> {
        self.preferences.iter().cloned().collect()
    }
}

/// Parse a `TITLE=SCORE` pair; the title may itself contain `=`
pub fn parse_rating(text: &str) -> Result<(String, Score)> {
    let (title, raw) = text.rsplit_once('=').ok_or_else(|| {
        EngineError::InvalidQuery(format!("expected TITLE=SCORE, got '{}'", text))
    })?;

    let title = title.trim();
    if title.is_empty() {
        return Err(EngineError::InvalidQuery(format!("missing title in '{}'", text)));
    }
    let score: Score = raw.trim().parse().map_err(|_| {
        EngineError::InvalidQuery(format!("score '{}' for '{}' is not a number", raw.trim(), title))
    })?;
    Ok((title.to_string(), score))
}

/// Preferences file layout
///
/// ```toml
/// count = 5
///
/// [ratings]
/// "Shingeki no Kyojin" = 0.9
/// "Clannad" = 0.4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreferencesFile {
    #[serde(default)]
    pub count: Option<usize>,

    #[serde(default)]
    pub ratings: BTreeMap<String, Score>,
}

impl PreferencesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let prefs: PreferencesFile = toml::from_str(&text)?;
        debug!("Read {} rating(s) from {}", prefs.ratings.len(), path.display());
        Ok(prefs)
    }
}

/// One ranked suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub item: String,
    pub score: Score,
    pub genres: Vec<String>,
}

/// Everything a session produces
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Best first, at most `count` entries
    pub suggestions: Vec<Suggestion>,

    /// Users in the query user's cluster, query user included, sorted
    pub cluster_users: Vec<String>,

    /// Number of clusters in the partition
    pub cluster_count: usize,

    /// Name of the partitioner that produced the partition
    pub partitioner: String,

    /// Strongest genres of the query user's ratings
    pub genre_profile: Vec<(String, Score)>,

    /// Cluster-mates × suggested titles
    pub subgraph: BipartiteGraph,

    /// Titles with no rating in the base data (including titles whose name
    /// is taken by a user node), left out of prediction
    pub skipped_unrated: usize,
}

/// Runs sessions against a shared store and base graph
pub struct RecommendationSession<'a> {
    store: &'a RatingStore,
    base: &'a BipartiteGraph,
    partitioner: &'a dyn Partitioner,
    profile_size: usize,
}

impl<'a> RecommendationSession<'a> {
    /// Fails with [`EngineError::QueryUserPresent`] if `base` already holds
    /// a query user
    pub fn new(
        store: &'a RatingStore,
        base: &'a BipartiteGraph,
        partitioner: &'a dyn Partitioner,
    ) -> Result<Self> {
        if base.has_query_user() {
            return Err(EngineError::QueryUserPresent);
        }
        Ok(Self {
            store,
            base,
            partitioner,
            profile_size: DEFAULT_PROFILE_SIZE,
        })
    }

    pub fn with_profile_size(mut self, profile_size: usize) -> Self {
        self.profile_size = profile_size;
        self
    }

    pub fn run(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        request.validate(self.store)?;
        let known = request.known_scores();

        let mut graph = self.base.clone();
        graph.add_query_user(known.iter().map(|(item, score)| (item.as_str(), *score)))?;

        let partition = self.partitioner.partition(&graph)?;
        info!(
            "Partitioned {} nodes into {} cluster(s) with {}",
            graph.node_count(),
            partition.cluster_count(),
            self.partitioner.name()
        );

        let mates = cluster_users(&graph, &partition)?;
        debug!("Query user's cluster has {} user(s)", mates.len());

        let (candidates, unrated): (Vec<String>, Vec<String>) = self
            .store
            .item_genres()
            .keys()
            .cloned()
            .partition(|item| graph.kind_of(item) == Some(NodeKind::Item));
        if !unrated.is_empty() {
            debug!("Skipping {} title(s) nobody rated", unrated.len());
        }

        let predictions = predict_scores(&graph, &partition, &candidates, &known)?;
        let best = top_n_scored(&predictions, request.count);

        let best_items: Vec<String> = best.iter().map(|(item, _)| item.clone()).collect();
        let explanation = subgraph::extract(&graph, &mates, &best_items)?;

        let suggestions = best
            .into_iter()
            .map(|(item, score)| {
                let genres = self
                    .store
                    .genres_of(&item)
                    .map(|g| g.iter().cloned().collect())
                    .unwrap_or_default();
                Suggestion {
                    item,
                    score,
                    genres,
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Session produced {} suggestion(s) from {} prediction(s)",
            suggestions.len(),
            predictions.len()
        );

        Ok(SessionOutcome {
            suggestions,
            cluster_users: mates,
            cluster_count: partition.cluster_count(),
            partitioner: self.partitioner.name().to_string(),
            genre_profile: genre_profile(&known, self.store, self.profile_size),
            subgraph: explanation,
            skipped_unrated: unrated.len(),
        })
    }
}

impl SessionOutcome {
    /// Suggested titles, best first
    pub fn items(&self) -> Vec<&str> {
        self.suggestions.iter().map(|s| s.item.as_str()).collect()
    }

    /// Cluster-mates, query user excluded
    pub fn neighbors(&self) -> impl Iterator<Item = &str> {
        self.cluster_users
            .iter()
            .map(String::as_str)
            .filter(|u| *u != QUERY_USER)
    }
}

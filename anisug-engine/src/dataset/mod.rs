//! Rating and genre tables
//!
//! **Purpose:** Hold the three lookup tables every other module reads:
//! title → genres, genre → titles and user → (title → rating). The store is
//! loaded once and never mutated afterwards.
//!
//! Ordered maps keep iteration (and therefore graph construction, candidate
//! order and tie-breaking) deterministic across runs.

pub mod csv_loader;
pub mod kaggle;

pub use csv_loader::{GENRES_FILE, ITEMS_FILE, USERS_FILE};

use crate::error::{EngineError, Result};
use crate::graph::QUERY_USER;
use crate::Score;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Title → set of genres
pub type ItemGenres = BTreeMap<String, BTreeSet<String>>;

/// Genre → set of titles
pub type GenreItems = BTreeMap<String, BTreeSet<String>>;

/// User → (title → normalized rating)
pub type UserRatings = BTreeMap<String, BTreeMap<String, Score>>;

/// Immutable rating and genre tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingStore {
    item_genres: ItemGenres,
    genre_items: GenreItems,
    user_ratings: UserRatings,
}

impl RatingStore {
    /// Assemble a store from already-normalized tables
    ///
    /// Fails with [`EngineError::ReservedKey`] if any user is named like the
    /// session query user. Rated titles missing from `item_genres` are kept
    /// (they are skipped by genre scoring) but reported once as a warning.
    pub fn from_parts(
        item_genres: ItemGenres,
        genre_items: GenreItems,
        user_ratings: UserRatings,
    ) -> Result<Self> {
        if user_ratings.contains_key(QUERY_USER) {
            return Err(EngineError::ReservedKey(QUERY_USER.to_string()));
        }

        let store = Self {
            item_genres,
            genre_items,
            user_ratings,
        };

        let unindexed = store.unindexed_items();
        if !unindexed.is_empty() {
            warn!(
                "{} rated title(s) have no genre entry and will be ignored by genre scoring",
                unindexed.len()
            );
        }

        Ok(store)
    }

    pub fn item_genres(&self) -> &ItemGenres {
        &self.item_genres
    }

    pub fn genre_items(&self) -> &GenreItems {
        &self.genre_items
    }

    pub fn user_ratings(&self) -> &UserRatings {
        &self.user_ratings
    }

    pub fn genres_of(&self, item: &str) -> Option<&BTreeSet<String>> {
        self.item_genres.get(item)
    }

    pub fn items_in_genre(&self, genre: &str) -> Option<&BTreeSet<String>> {
        self.genre_items.get(genre)
    }

    pub fn ratings_of(&self, user: &str) -> Option<&BTreeMap<String, Score>> {
        self.user_ratings.get(user)
    }

    /// Whether `item` is a known title (has a genre entry)
    pub fn contains_item(&self, item: &str) -> bool {
        self.item_genres.contains_key(item)
    }

    pub fn user_count(&self) -> usize {
        self.user_ratings.len()
    }

    pub fn item_count(&self) -> usize {
        self.item_genres.len()
    }

    pub fn genre_count(&self) -> usize {
        self.genre_items.len()
    }

    /// Total number of (user, title) ratings
    pub fn rating_count(&self) -> usize {
        self.user_ratings.values().map(|r| r.len()).sum()
    }

    /// Title → users who rated it, users in ascending order
    pub fn item_raters(&self) -> BTreeMap<String, Vec<String>> {
        let mut raters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (user, ratings) in &self.user_ratings {
            for item in ratings.keys() {
                raters.entry(item.clone()).or_default().push(user.clone());
            }
        }
        raters
    }

    /// The `n` titles with the most raters, most-rated first
    ///
    /// Ties are ordered by title. Titles nobody rated never appear.
    pub fn most_rated(&self, n: usize) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .item_raters()
            .into_iter()
            .map(|(item, users)| (item, users.len()))
            .collect();
        // Stable sort keeps the title order from the BTreeMap within ties
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(n);
        counts
    }

    /// Rated titles that have no genre entry
    pub fn unindexed_items(&self) -> BTreeSet<String> {
        self.user_ratings
            .values()
            .flat_map(|ratings| ratings.keys())
            .filter(|item| !self.item_genres.contains_key(*item))
            .cloned()
            .collect()
    }
}

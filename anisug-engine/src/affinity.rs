//! Genre compatibility scoring
//!
//! **Purpose:** Derive how strongly a user (or a title) leans towards a genre
//! from historical ratings.
//!
//! - User ↔ genre: mean rating over the user's titles in that genre
//! - Title ↔ genre: square root of the mean of (rater's genre affinity ×
//!   rater's rating of the title), over all raters of the title
//!
//! Missing data never fails; it falls back to [`NEUTRAL_SCORE`].

use crate::dataset::{ItemGenres, RatingStore, UserRatings};
use crate::{Score, NEUTRAL_SCORE};
use std::collections::{BTreeMap, BTreeSet};

/// Mean of the user's ratings over titles that belong to `genre`
///
/// Titles absent from `item_genres` are skipped. Returns [`NEUTRAL_SCORE`]
/// if none of the rated titles is in the genre.
///
/// ```
/// use anisug_engine::affinity::user_genre_affinity;
/// use std::collections::{BTreeMap, BTreeSet};
///
/// let ratings: BTreeMap<String, f64> =
///     [("AOT", 3.0), ("FMAB", 10.0), ("MP100", 5.0)].map(|(k, v)| (k.to_string(), v)).into_iter().collect();
/// let mut genres = BTreeMap::new();
/// genres.insert("AOT".to_string(), BTreeSet::from(["Action".to_string()]));
/// genres.insert("FMAB".to_string(), BTreeSet::from(["Action".to_string()]));
/// genres.insert("MP100".to_string(), BTreeSet::from(["Action".to_string(), "Comedy".to_string()]));
///
/// assert_eq!(user_genre_affinity(&ratings, &genres, "Action"), 6.0);
/// ```
pub fn user_genre_affinity(
    ratings: &BTreeMap<String, Score>,
    item_genres: &ItemGenres,
    genre: &str,
) -> Score {
    let (sum, count) = ratings
        .iter()
        .filter(|(item, _)| {
            item_genres
                .get(item.as_str())
                .is_some_and(|genres| genres.contains(genre))
        })
        .fold((0.0, 0usize), |(sum, count), (_, score)| (sum + score, count + 1));

    if count == 0 {
        return NEUTRAL_SCORE;
    }
    sum / count as Score
}

/// Precomputed user → genre → affinity for a whole store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserGenreAffinity {
    table: BTreeMap<String, BTreeMap<String, Score>>,
}

impl UserGenreAffinity {
    /// Affinity of every user for every genre named in either genre table
    pub fn compute(store: &RatingStore) -> Self {
        let genres: BTreeSet<&String> = store
            .genre_items()
            .keys()
            .chain(store.item_genres().values().flatten())
            .collect();

        let table = store
            .user_ratings()
            .iter()
            .map(|(user, ratings)| {
                let per_genre = genres
                    .iter()
                    .map(|genre| {
                        (
                            (*genre).clone(),
                            user_genre_affinity(ratings, store.item_genres(), genre),
                        )
                    })
                    .collect();
                (user.clone(), per_genre)
            })
            .collect();

        Self { table }
    }

    /// Affinity of `user` for `genre`; [`NEUTRAL_SCORE`] if unknown
    pub fn get(&self, user: &str, genre: &str) -> Score {
        self.table
            .get(user)
            .and_then(|genres| genres.get(genre))
            .copied()
            .unwrap_or(NEUTRAL_SCORE)
    }

    pub fn user_count(&self) -> usize {
        self.table.len()
    }
}

/// Compatibility of `item` with `genre`, from the users who rated `item`
///
/// The caller must make sure `genre` is one of `item`'s genres. Raters
/// whose rating of `item` is missing are skipped. Returns
/// [`NEUTRAL_SCORE`] when nobody rated the title.
pub fn item_genre_affinity(
    item: &str,
    genre: &str,
    item_raters: &BTreeMap<String, Vec<String>>,
    user_affinity: &UserGenreAffinity,
    user_ratings: &UserRatings,
    item_genres: &ItemGenres,
) -> Score {
    let raters = match item_raters.get(item) {
        Some(raters) if !raters.is_empty() => raters,
        _ => return NEUTRAL_SCORE,
    };

    let products: Vec<Score> = raters
        .iter()
        .filter_map(|user| {
            let rating = user_ratings.get(user)?.get(item)?;
            Some(user_affinity.get(user, genre) * rating)
        })
        .collect();

    if products.is_empty() {
        return NEUTRAL_SCORE;
    }

    let mut affinity = (products.iter().sum::<Score>() / products.len() as Score).sqrt();

    // The second damping step is gated on the genre name being a title key.
    if item_genres.contains_key(genre) {
        affinity = affinity.sqrt();
    }

    affinity
}

/// [`item_genre_affinity`] for each of `item`'s genres, in genre order
///
/// Empty if the title has no genre entry.
pub fn item_genre_affinities(
    store: &RatingStore,
    user_affinity: &UserGenreAffinity,
    item: &str,
) -> Vec<(String, Score)> {
    let Some(genres) = store.genres_of(item) else {
        return Vec::new();
    };

    let raters = store.item_raters();
    genres
        .iter()
        .map(|genre| {
            let score = item_genre_affinity(
                item,
                genre,
                &raters,
                user_affinity,
                store.user_ratings(),
                store.item_genres(),
            );
            (genre.clone(), score)
        })
        .collect()
}

/// The `k` genres `ratings` lean towards most, strongest first
///
/// Only genres where at least one rated title belongs count; ties keep the
/// store's genre order.
pub fn genre_profile(
    ratings: &BTreeMap<String, Score>,
    store: &RatingStore,
    k: usize,
) -> Vec<(String, Score)> {
    let mut profile: Vec<(String, Score)> = store
        .genre_items()
        .keys()
        .filter(|genre| {
            ratings.keys().any(|item| {
                store
                    .genres_of(item)
                    .is_some_and(|genres| genres.contains(genre.as_str()))
            })
        })
        .map(|genre| {
            (
                genre.clone(),
                user_genre_affinity(ratings, store.item_genres(), genre),
            )
        })
        .collect();

    profile.sort_by(|a, b| b.1.total_cmp(&a.1));
    profile.truncate(k);
    profile
}

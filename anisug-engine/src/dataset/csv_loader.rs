//! CSV ingestion for the rating and genre tables
//!
//! All three tables are header-less with a variable number of columns:
//!
//! ```text
//! animes.csv   title,genre,genre,...
//! genres.csv   genre,title,title,...
//! users.csv    user,title,score,title,score,...
//! ```
//!
//! User scores are on a 0–10 scale and are divided by 10 on load.

use crate::dataset::{RatingStore, UserRatings};
use crate::error::{EngineError, Result};
use crate::Score;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Title → genres table file name
pub const ITEMS_FILE: &str = "animes.csv";
/// Genre → titles table file name
pub const GENRES_FILE: &str = "genres.csv";
/// User → ratings table file name
pub const USERS_FILE: &str = "users.csv";

/// Raw scores are divided by this on load
pub(crate) const RAW_SCORE_SCALE: Score = 10.0;

impl RatingStore {
    /// Load the three tables from `folder` using the standard file names
    pub fn load_csv(folder: &Path) -> Result<Self> {
        Self::load_csv_files(
            &folder.join(ITEMS_FILE),
            &folder.join(GENRES_FILE),
            &folder.join(USERS_FILE),
        )
    }

    /// Load the three tables from explicit paths
    pub fn load_csv_files(items: &Path, genres: &Path, users: &Path) -> Result<Self> {
        let item_genres = read_keyed_sets(items)?;
        let genre_items = read_keyed_sets(genres)?;
        let user_ratings = read_user_ratings(users)?;

        info!(
            "Loaded {} titles, {} genres, {} users",
            item_genres.len(),
            genre_items.len(),
            user_ratings.len()
        );

        Self::from_parts(item_genres, genre_items, user_ratings)
    }
}

fn reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Read `key,value,value,...` rows into key → set of values
///
/// A repeated key merges its values. Empty cells are ignored.
fn read_keyed_sets(path: &Path) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut reader = reader_for(path)?;
    let mut table: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for record in reader.records() {
        let record = record?;
        let mut fields = record.iter();
        let key = match fields.next() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => continue,
        };

        table
            .entry(key)
            .or_default()
            .extend(fields.filter(|f| !f.is_empty()).map(str::to_string));
    }

    debug!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Read `user,title,score,title,score,...` rows
///
/// A trailing title without a score is ignored.
fn read_user_ratings(path: &Path) -> Result<UserRatings> {
    let mut reader = reader_for(path)?;
    let mut table = UserRatings::new();

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let user = match record.get(0) {
            Some(user) if !user.is_empty() => user.to_string(),
            _ => continue,
        };

        let ratings = table.entry(user).or_default();
        let mut index = 1;
        while index + 1 < record.len() {
            let title = &record[index];
            let raw = &record[index + 1];
            let score = raw
                .parse::<Score>()
                .ok()
                .filter(|score| score.is_finite())
                .ok_or_else(|| EngineError::Dataset {
                    file: path.display().to_string(),
                    line,
                    message: format!("score '{}' for '{}' is not a finite number", raw, title),
                })?;
            ratings.insert(title.to_string(), score / RAW_SCORE_SCALE);
            index += 2;
        }
    }

    debug!("Read {} users from {}", table.len(), path.display());
    Ok(table)
}

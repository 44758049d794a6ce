//! Conversion of the public MyAnimeList dump into the three CSV tables
//!
//! **Inputs** (both with a header row):
//!
//! ```text
//! anime list   anime_id, title, <ignored>, genre, ...    genre like "['Action', 'Drama']"
//! user list    username, anime_id, <ignored x3>, score, ...
//! ```
//!
//! Ratings that point at an anime id missing from the anime list are
//! dropped. The user list is large, so reading stops after `row_limit`
//! kept ratings.

use crate::dataset::csv_loader::RAW_SCORE_SCALE;
use crate::dataset::{
    GenreItems, ItemGenres, RatingStore, UserRatings, GENRES_FILE, ITEMS_FILE, USERS_FILE,
};
use crate::error::{EngineError, Result};
use crate::Score;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Kept ratings read from the user list unless told otherwise
pub const DEFAULT_ROW_LIMIT: usize = 1_000_000;

const ANIME_ID_COL: usize = 0;
const ANIME_TITLE_COL: usize = 1;
const ANIME_GENRE_COL: usize = 3;

const USER_NAME_COL: usize = 0;
const USER_ANIME_ID_COL: usize = 1;
const USER_SCORE_COL: usize = 5;

/// Tables extracted from the dump, scores still on the raw 0–10 scale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KaggleTables {
    item_genres: ItemGenres,
    genre_items: GenreItems,
    raw_ratings: BTreeMap<String, BTreeMap<String, u32>>,
}

impl KaggleTables {
    /// Read the anime list, then at most `row_limit` usable user ratings
    pub fn extract(anime_file: &Path, user_file: &Path, row_limit: usize) -> Result<Self> {
        let mut tables = Self::default();
        let titles = tables.read_anime_list(anime_file)?;
        tables.read_user_list(user_file, &titles, row_limit)?;

        info!(
            "Extracted {} titles, {} genres, {} users from the dump",
            tables.item_genres.len(),
            tables.genre_items.len(),
            tables.raw_ratings.len()
        );
        Ok(tables)
    }

    pub fn item_genres(&self) -> &ItemGenres {
        &self.item_genres
    }

    pub fn genre_items(&self) -> &GenreItems {
        &self.genre_items
    }

    /// User → (title → raw 0–10 score)
    pub fn raw_ratings(&self) -> &BTreeMap<String, BTreeMap<String, u32>> {
        &self.raw_ratings
    }

    /// Returns anime id → title
    fn read_anime_list(&mut self, path: &Path) -> Result<HashMap<u64, String>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let mut titles = HashMap::new();

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

            let id: u64 = parse_field(path, line, "anime id", field(ANIME_ID_COL))?;
            let title = field(ANIME_TITLE_COL);
            if title.is_empty() {
                continue;
            }

            let genres = parse_genre_list(field(ANIME_GENRE_COL));
            for genre in &genres {
                self.genre_items
                    .entry(genre.clone())
                    .or_default()
                    .insert(title.to_string());
            }
            self.item_genres
                .entry(title.to_string())
                .or_default()
                .extend(genres);
            titles.insert(id, title.to_string());
        }

        debug!("Read {} titles from {}", titles.len(), path.display());
        Ok(titles)
    }

    fn read_user_list(
        &mut self,
        path: &Path,
        titles: &HashMap<u64, String>,
        row_limit: usize,
    ) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let mut kept = 0usize;
        let mut dropped = 0usize;

        for record in reader.records() {
            if kept == row_limit {
                debug!("Row limit of {} reached", row_limit);
                break;
            }

            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

            let user = field(USER_NAME_COL);
            if user.is_empty() {
                continue;
            }
            let id: u64 = parse_field(path, line, "anime id", field(USER_ANIME_ID_COL))?;
            let score: u32 = parse_field(path, line, "score", field(USER_SCORE_COL))?;

            let Some(title) = titles.get(&id) else {
                dropped += 1;
                continue;
            };
            self.raw_ratings
                .entry(user.to_string())
                .or_default()
                .insert(title.clone(), score);
            kept += 1;
        }

        debug!(
            "Kept {} rating(s), dropped {} for unknown titles, from {}",
            kept,
            dropped,
            path.display()
        );
        Ok(())
    }

    /// Write `animes.csv`, `genres.csv` and `users.csv` into `folder`
    pub fn write_csv(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;

        write_rows(
            &folder.join(ITEMS_FILE),
            self.item_genres.iter().map(|(title, genres)| {
                std::iter::once(title.clone())
                    .chain(genres.iter().cloned())
                    .collect::<Vec<String>>()
            }),
        )?;
        write_rows(
            &folder.join(GENRES_FILE),
            self.genre_items.iter().map(|(genre, titles)| {
                std::iter::once(genre.clone())
                    .chain(titles.iter().cloned())
                    .collect::<Vec<String>>()
            }),
        )?;
        write_rows(
            &folder.join(USERS_FILE),
            self.raw_ratings.iter().map(|(user, ratings)| {
                std::iter::once(user.clone())
                    .chain(
                        ratings
                            .iter()
                            .flat_map(|(title, score)| [title.clone(), score.to_string()]),
                    )
                    .collect::<Vec<String>>()
            }),
        )?;

        info!("Wrote CSV tables to {}", folder.display());
        Ok(())
    }

    /// Normalize scores and build the store
    pub fn into_store(self) -> Result<RatingStore> {
        let user_ratings: UserRatings = self
            .raw_ratings
            .into_iter()
            .map(|(user, ratings)| {
                let normalized: BTreeMap<String, Score> = ratings
                    .into_iter()
                    .map(|(title, score)| (title, Score::from(score) / RAW_SCORE_SCALE))
                    .collect();
                (user, normalized)
            })
            .collect();
        RatingStore::from_parts(self.item_genres, self.genre_items, user_ratings)
    }
}

fn parse_field<T: std::str::FromStr>(path: &Path, line: u64, what: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| EngineError::Dataset {
        file: path.display().to_string(),
        line,
        message: format!("{} '{}' is not a valid number", what, raw),
    })
}

/// `['Action', 'Slice of Life']` → `["Action", "Slice of Life"]`
///
/// Also accepts a bare comma-separated list. Empty names are dropped.
fn parse_genre_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|genre| genre.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect()
}

fn write_rows<I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ANIME_LIST: &str = "\
anime_id,title,title_english,genre
28891,Haikyuu!! Second Season,Haikyu!! 2nd Season,\"['Comedy', 'Drama', 'School', 'Sports']\"
5114,\"Fullmetal Alchemist: Brotherhood\",,\"['Action', 'Adventure', 'Drama']\"
32281,\"Kimi no Na wa.\",Your Name.,\"['Drama', 'Romance']\"
";

    const USER_LIST: &str = "\
username,anime_id,my_watched_episodes,my_start_date,my_finish_date,my_score
RedvelvetDaisuki,28891,25,2016-01-01,2016-03-01,8
RedvelvetDaisuki,5114,64,2015-01-01,2015-09-01,10
karthiga,99999,12,2017-01-01,2017-02-01,7
karthiga,32281,1,2017-03-01,2017-03-01,9
simran,5114,64,2018-01-01,2018-06-01,6
";

    fn write_dump(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let anime = dir.path().join("anime_kaggle.csv");
        let users = dir.path().join("UserAnimeList.csv");
        std::fs::write(&anime, ANIME_LIST).unwrap();
        std::fs::write(&users, USER_LIST).unwrap();
        (anime, users)
    }

    #[test]
    fn test_parse_genre_list() {
        assert_eq!(parse_genre_list("['Action', 'Slice of Life']"), vec!["Action", "Slice of Life"]);
        assert_eq!(parse_genre_list("Comedy, Sports"), vec!["Comedy", "Sports"]);
        assert!(parse_genre_list("[]").is_empty());
    }

    #[test]
    fn test_extract_maps_ids_to_titles() {
        let dir = TempDir::new().unwrap();
        let (anime, users) = write_dump(&dir);
        let tables = KaggleTables::extract(&anime, &users, DEFAULT_ROW_LIMIT).unwrap();

        assert!(tables.genre_items()["Comedy"].contains("Haikyuu!! Second Season"));
        assert!(tables.item_genres()["Haikyuu!! Second Season"].contains("Comedy"));
        assert_eq!(tables.genre_items()["Drama"].len(), 3);
        assert_eq!(tables.raw_ratings()["RedvelvetDaisuki"]["Haikyuu!! Second Season"], 8);

        // Unknown anime id 99999 is dropped
        assert_eq!(tables.raw_ratings()["karthiga"].len(), 1);
        assert_eq!(tables.raw_ratings().len(), 3);
    }

    #[test]
    fn test_row_limit_counts_kept_ratings() {
        let dir = TempDir::new().unwrap();
        let (anime, users) = write_dump(&dir);
        let tables = KaggleTables::extract(&anime, &users, 3).unwrap();

        // The dropped row does not count towards the limit
        let kept: usize = tables.raw_ratings().values().map(BTreeMap::len).sum();
        assert_eq!(kept, 3);
        assert!(tables.raw_ratings()["karthiga"].contains_key("Kimi no Na wa."));
        assert!(!tables.raw_ratings().contains_key("simran"));
    }

    #[test]
    fn test_written_tables_load_as_the_same_store() {
        let dir = TempDir::new().unwrap();
        let (anime, users) = write_dump(&dir);
        let tables = KaggleTables::extract(&anime, &users, DEFAULT_ROW_LIMIT).unwrap();

        let out = dir.path().join("tables");
        tables.write_csv(&out).unwrap();
        let loaded = RatingStore::load_csv(&out).unwrap();

        assert_eq!(loaded.ratings_of("simran").unwrap()["Fullmetal Alchemist: Brotherhood"], 0.6);
        assert_eq!(loaded, tables.into_store().unwrap());
    }

    #[test]
    fn test_bad_score_is_dataset_error() {
        let dir = TempDir::new().unwrap();
        let (anime, users) = write_dump(&dir);
        std::fs::write(
            &users,
            "username,anime_id,a,b,c,my_score\nlisa,5114,1,x,y,great\n",
        )
        .unwrap();

        match KaggleTables::extract(&anime, &users, DEFAULT_ROW_LIMIT) {
            Err(EngineError::Dataset { message, line, .. }) => {
                assert!(message.contains("great"));
                assert_eq!(line, 2);
            }
            other => panic!("expected dataset error, got {:?}", other),
        }
    }
}

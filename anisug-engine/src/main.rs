//! Anime suggestion command-line tool
//!
//! **Usage:**
//! ```bash
//! anisug import [--csv-folder <dir>] [--kaggle-anime <file> --kaggle-users <file>]
//! anisug suggest --rate "Clannad=0.9" [--prefs prefs.toml] [--count 10] [--export report.json]
//! anisug affinity --user <name> | --item <title>
//! anisug popular [--count 10]
//! anisug init-config [--force]
//! ```

use anisug_common::config::{
    load_config, write_toml_config, CompiledDefaults, DataFolderResolver, LoggingConfig,
    PartitionerKind, TomlConfig,
};
use anisug_engine::affinity::{item_genre_affinities, user_genre_affinity, UserGenreAffinity};
use anisug_engine::dataset::kaggle::{KaggleTables, DEFAULT_ROW_LIMIT};
use anisug_engine::partition::partitioner_for;
use anisug_engine::report::{CliFormatter, SessionReport};
use anisug_engine::session::{parse_rating, PreferencesFile};
use anisug_engine::snapshot::{
    GraphSnapshot, StoreSnapshot, GRAPH_SNAPSHOT_FILE, STORE_SNAPSHOT_FILE,
};
use anisug_engine::{BipartiteGraph, RatingStore, RecommendationSession, SessionRequest};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Anime suggestions from a handful of ratings
#[derive(Parser, Debug)]
#[clap(name = "anisug")]
#[clap(about = "Suggest anime titles from your ratings using cluster-mates' opinions")]
#[clap(version)]
struct Cli {
    /// Config file (default: <config_dir>/anisug/config.toml)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data folder holding the CSV tables and snapshots
    #[clap(long, global = true, value_name = "DIR")]
    data_folder: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the CSV tables and write store and graph snapshots
    Import {
        /// Folder with animes.csv, genres.csv and users.csv (default: data folder)
        #[clap(long, value_name = "DIR")]
        csv_folder: Option<PathBuf>,

        /// MyAnimeList dump anime list; converted into the CSV tables first
        #[clap(long, value_name = "FILE", requires = "kaggle_users")]
        kaggle_anime: Option<PathBuf>,

        /// MyAnimeList dump user list
        #[clap(long, value_name = "FILE", requires = "kaggle_anime")]
        kaggle_users: Option<PathBuf>,

        /// Maximum number of dump ratings to keep
        #[clap(long, default_value_t = DEFAULT_ROW_LIMIT)]
        row_limit: usize,
    },

    /// Suggest titles for a set of ratings
    Suggest {
        /// A rating as TITLE=SCORE, score in [0, 1] (repeatable)
        #[clap(long = "rate", value_name = "TITLE=SCORE")]
        ratings: Vec<String>,

        /// TOML file with a [ratings] table
        #[clap(long, value_name = "FILE")]
        prefs: Option<PathBuf>,

        /// Number of suggestions
        #[clap(long)]
        count: Option<usize>,

        /// Partitioner: label_propagation, components or single
        #[clap(long)]
        partitioner: Option<String>,

        /// Seed for the label propagation partitioner
        #[clap(long)]
        seed: Option<u64>,

        /// Read the CSV tables instead of the snapshots
        #[clap(long)]
        from_csv: bool,

        /// Export the report to a JSON file
        #[clap(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },

    /// Show genre affinities of a user or a title
    Affinity {
        /// Dataset user name
        #[clap(long, conflicts_with = "item", required_unless_present = "item")]
        user: Option<String>,

        /// Title
        #[clap(long)]
        item: Option<String>,

        /// Read the CSV tables instead of the snapshots
        #[clap(long)]
        from_csv: bool,
    },

    /// List the titles with the most ratings
    Popular {
        #[clap(long, default_value = "10")]
        count: usize,

        /// Read the CSV tables instead of the snapshots
        #[clap(long)]
        from_csv: bool,
    },

    /// Write a config file with default values
    InitConfig {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;

    init_tracing(&config.logging)?;

    // Build identification first, before any data is touched
    info!(
        "Starting anisug v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let data_folder = DataFolderResolver::new()
        .with_cli_arg(cli.data_folder.clone())
        .with_config(&config)
        .resolve();
    info!("Data folder: {}", data_folder.display());

    match cli.command {
        Command::Import {
            csv_folder,
            kaggle_anime,
            kaggle_users,
            row_limit,
        } => {
            let csv_folder = csv_folder.as_deref().unwrap_or(&data_folder);
            if let (Some(anime), Some(users)) = (kaggle_anime, kaggle_users) {
                KaggleTables::extract(&anime, &users, row_limit)
                    .and_then(|tables| tables.write_csv(csv_folder))
                    .context("Failed to convert the MyAnimeList dump")?;
            }
            import(csv_folder, &data_folder)
        }
        Command::Suggest {
            ratings,
            prefs,
            count,
            partitioner,
            seed,
            from_csv,
            export,
        } => {
            let (store, graph) = load_data(&data_folder, from_csv)?;

            let mut preferences = Vec::new();
            let mut file_count = None;
            if let Some(path) = prefs {
                let file = PreferencesFile::load(&path)
                    .with_context(|| format!("Failed to read preferences {}", path.display()))?;
                file_count = file.count;
                preferences.extend(file.ratings);
            }
            for text in &ratings {
                preferences.push(parse_rating(text)?);
            }

            let request = SessionRequest {
                preferences,
                count: count.or(file_count).unwrap_or(config.suggestions.count),
            };

            let kind = match partitioner {
                Some(name) => match PartitionerKind::from_str(&name) {
                    Some(kind) => kind,
                    None => bail!("Unknown partitioner '{}'", name),
                },
                None => config.suggestions.partitioner,
            };
            let partitioner = partitioner_for(
                kind,
                seed.or(config.suggestions.seed),
                config.suggestions.max_iterations,
            );

            let session = RecommendationSession::new(&store, &graph, &*partitioner)?;
            let outcome = session.run(&request)?;
            let report = SessionReport::new(&request, &outcome);

            print!("{}", CliFormatter::format_report(&report));

            if let Some(path) = export {
                report
                    .export_json(&path)
                    .with_context(|| format!("Failed to export report to {}", path.display()))?;
                println!("\n✓ Report exported to: {}", path.display());
            }
            Ok(())
        }
        Command::Affinity {
            user,
            item,
            from_csv,
        } => {
            let (store, _) = load_data(&data_folder, from_csv)?;
            show_affinity(&store, user.as_deref(), item.as_deref())
        }
        Command::Popular { count, from_csv } => {
            let (store, _) = load_data(&data_folder, from_csv)?;
            for (rank, (item, raters)) in store.most_rated(count).iter().enumerate() {
                println!("{:3}. {} ({} ratings)", rank + 1, item, raters);
            }
            Ok(())
        }
        Command::InitConfig { force } => {
            let Some(target) = cli
                .config
                .or_else(|| CompiledDefaults::for_current_platform().config_file)
            else {
                bail!("No config directory on this platform, pass --config");
            };
            if target.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    target.display()
                );
            }
            write_toml_config(&TomlConfig::default(), &target)?;
            println!("✓ Wrote default config to {}", target.display());
            Ok(())
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. With a log file configured,
/// output goes there instead of stderr.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn import(csv_folder: &Path, data_folder: &Path) -> Result<()> {
    let store = RatingStore::load_csv(csv_folder)
        .with_context(|| format!("Failed to load CSV tables from {}", csv_folder.display()))?;
    let graph = BipartiteGraph::build(&store)?;

    StoreSnapshot::capture(&store).save(&data_folder.join(STORE_SNAPSHOT_FILE))?;
    GraphSnapshot::capture(&graph)?.save(&data_folder.join(GRAPH_SNAPSHOT_FILE))?;

    println!(
        "✓ Imported {} users, {} titles, {} genres ({} ratings)",
        store.user_count(),
        store.item_count(),
        store.genre_count(),
        store.rating_count()
    );
    Ok(())
}

/// Store and base graph, from snapshots or straight from the CSV tables
fn load_data(data_folder: &Path, from_csv: bool) -> Result<(RatingStore, BipartiteGraph)> {
    if from_csv {
        let store = RatingStore::load_csv(data_folder).with_context(|| {
            format!("Failed to load CSV tables from {}", data_folder.display())
        })?;
        let graph = BipartiteGraph::build(&store)?;
        return Ok((store, graph));
    }

    let store_path = data_folder.join(STORE_SNAPSHOT_FILE);
    let graph_path = data_folder.join(GRAPH_SNAPSHOT_FILE);
    if !store_path.exists() || !graph_path.exists() {
        bail!(
            "No snapshots in {} (run `anisug import` first, or pass --from-csv)",
            data_folder.display()
        );
    }

    let store = StoreSnapshot::load(&store_path)
        .and_then(StoreSnapshot::into_store)
        .with_context(|| format!("Failed to load {}", store_path.display()))?;
    let graph = GraphSnapshot::load(&graph_path)
        .and_then(GraphSnapshot::into_graph)
        .with_context(|| format!("Failed to load {}", graph_path.display()))?;

    if graph.users().count() != store.user_count() {
        warn!("Graph snapshot and store snapshot disagree on the user count; re-run import");
    }
    Ok((store, graph))
}

fn show_affinity(store: &RatingStore, user: Option<&str>, item: Option<&str>) -> Result<()> {
    if let Some(user) = user {
        let Some(ratings) = store.ratings_of(user) else {
            bail!("Unknown user '{}'", user);
        };
        println!("Genre affinity of {}:", user);
        let genres: BTreeSet<&String> = store
            .genre_items()
            .keys()
            .chain(store.item_genres().values().flatten())
            .collect();
        for genre in genres {
            println!(
                "  {:20} {:.3}",
                genre,
                user_genre_affinity(ratings, store.item_genres(), genre)
            );
        }
        return Ok(());
    }

    if let Some(item) = item {
        if !store.contains_item(item) {
            bail!("Unknown title '{}'", item);
        }
        let table = UserGenreAffinity::compute(store);
        println!("Genre affinity of {}:", item);
        for (genre, score) in item_genre_affinities(store, &table, item) {
            println!("  {:20} {:.3}", genre, score);
        }
    }
    Ok(())
}

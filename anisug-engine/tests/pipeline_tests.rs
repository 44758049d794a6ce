//! End-to-end tests for the suggestion pipeline
//!
//! Covers the path a real run takes: CSV tables → store → base graph →
//! snapshots → session → report. Partitions come from deterministic stub
//! partitioners so expected scores can be computed by hand.

use anisug_engine::dataset::{GENRES_FILE, ITEMS_FILE, USERS_FILE};
use anisug_engine::graph::NodeKind;
use anisug_engine::partition::{ComponentPartitioner, SingleClusterPartitioner};
use anisug_engine::predictor::{cluster_users, predict_scores};
use anisug_engine::ranker::top_n;
use anisug_engine::report::{CliFormatter, SessionReport};
use anisug_engine::snapshot::{GraphSnapshot, StoreSnapshot};
use anisug_engine::{
    BipartiteGraph, ClusterId, EngineError, Partition, Partitioner, RatingStore,
    RecommendationSession, SessionRequest, QUERY_USER,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// 3 users, each rating the same 4 titles
fn write_shared_dataset(dir: &Path) {
    fs::write(
        dir.join(ITEMS_FILE),
        "Steins;Gate,Sci-Fi,Thriller\n\
         Clannad,Drama,Romance\n\
         Mushishi,Mystery,Slice of Life\n\
         Gintama,Action,Comedy\n",
    )
    .unwrap();
    fs::write(
        dir.join(GENRES_FILE),
        "Sci-Fi,Steins;Gate\n\
         Thriller,Steins;Gate\n\
         Drama,Clannad\n\
         Romance,Clannad\n\
         Mystery,Mushishi\n\
         Slice of Life,Mushishi\n\
         Action,Gintama\n\
         Comedy,Gintama\n",
    )
    .unwrap();
    fs::write(
        dir.join(USERS_FILE),
        "anubha,Steins;Gate,9,Clannad,6,Mushishi,8,Gintama,4\n\
         iris,Steins;Gate,7,Clannad,9,Mushishi,3,Gintama,10\n\
         simran,Steins;Gate,10,Clannad,5,Mushishi,6,Gintama,7\n",
    )
    .unwrap();
}

fn shared_store() -> (TempDir, RatingStore) {
    let dir = TempDir::new().expect("temp dir");
    write_shared_dataset(dir.path());
    let store = RatingStore::load_csv(dir.path()).expect("load csv");
    (dir, store)
}

#[test]
fn test_single_cluster_scenario() {
    let (_dir, store) = shared_store();
    let mut graph = BipartiteGraph::build(&store).unwrap();

    let known: BTreeMap<String, f64> = [
        ("Steins;Gate".to_string(), 1.0),
        ("Clannad".to_string(), 0.3),
    ]
    .into_iter()
    .collect();
    graph
        .add_query_user(known.iter().map(|(k, v)| (k.as_str(), *v)))
        .unwrap();

    let partition = SingleClusterPartitioner.partition(&graph).unwrap();
    assert_eq!(cluster_users(&graph, &partition).unwrap().len(), 4);

    let candidates: Vec<String> = store.item_genres().keys().cloned().collect();
    let scores = predict_scores(&graph, &partition, &candidates, &known).unwrap();
    let by_item: HashMap<&str, f64> = scores.iter().map(|(k, v)| (k.as_str(), *v)).collect();

    assert_eq!(scores.len(), 2);
    assert!(!by_item.contains_key("Steins;Gate"));
    assert!(!by_item.contains_key("Clannad"));
    assert!((by_item["Mushishi"] - (0.8 + 0.3 + 0.6) / 4.0).abs() < 1e-12);
    assert!((by_item["Gintama"] - (0.4 + 1.0 + 0.7) / 4.0).abs() < 1e-12);

    assert_eq!(top_n(&scores, 1), vec!["Gintama"]);
    assert!(top_n(&scores, 0).is_empty());
}

#[test]
fn test_snapshots_feed_a_session() {
    let (dir, store) = shared_store();
    let graph = BipartiteGraph::build(&store).unwrap();

    let store_path = dir.path().join("store.json");
    let graph_path = dir.path().join("graph.json");
    StoreSnapshot::capture(&store).save(&store_path).unwrap();
    GraphSnapshot::capture(&graph).unwrap().save(&graph_path).unwrap();

    let loaded_store = StoreSnapshot::load(&store_path).unwrap().into_store().unwrap();
    let loaded_graph = GraphSnapshot::load(&graph_path).unwrap().into_graph().unwrap();
    assert_eq!(loaded_store, store);
    assert_eq!(loaded_graph, graph);

    let session =
        RecommendationSession::new(&loaded_store, &loaded_graph, &SingleClusterPartitioner)
            .unwrap();
    let request = SessionRequest::new(5)
        .with_rating("Steins;Gate", 1.0)
        .with_rating("Clannad", 0.3);
    let outcome = session.run(&request).unwrap();

    assert_eq!(outcome.items(), vec!["Gintama", "Mushishi"]);

    let report = SessionReport::new(&request, &outcome);
    let export = dir.path().join("report.json");
    report.export_json(&export).unwrap();
    assert_eq!(SessionReport::import_json(&export).unwrap(), report);

    let text = CliFormatter::format_report(&report);
    assert!(text.contains("Gintama"));
    assert!(text.contains("4 user(s)"));
}

#[test]
fn test_custom_partitioner_plugs_in() {
    /// Puts the query user and users whose name starts with 'i' in cluster
    /// 1, everything else in cluster 0
    struct InitialPartitioner;

    impl Partitioner for InitialPartitioner {
        fn name(&self) -> &str {
            "initial"
        }

        fn partition(&self, graph: &BipartiteGraph) -> anisug_engine::Result<Partition> {
            let assignments = graph
                .nodes()
                .map(|(key, kind)| {
                    let cluster = match kind {
                        NodeKind::User if key == QUERY_USER || key.starts_with('i') => 1,
                        _ => 0,
                    };
                    (key.to_string(), ClusterId(cluster))
                })
                .collect();
            Partition::from_assignments(graph, assignments)
        }
    }

    let (_dir, store) = shared_store();
    let base = BipartiteGraph::build(&store).unwrap();
    let session = RecommendationSession::new(&store, &base, &InitialPartitioner).unwrap();
    let outcome = session
        .run(&SessionRequest::new(1).with_rating("Steins;Gate", 0.9))
        .unwrap();

    // Only iris shares the cluster: Gintama 1.0 / 2
    assert_eq!(outcome.cluster_users, vec!["iris".to_string(), QUERY_USER.to_string()]);
    assert_eq!(outcome.items(), vec!["Gintama"]);
    assert!((outcome.suggestions[0].score - 0.5).abs() < 1e-12);
    assert_eq!(outcome.partitioner, "initial");
}

#[test]
fn test_component_partitioner_keeps_disconnected_users_apart() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(ITEMS_FILE), "A,Action\nB,Action\nC,Drama\nD,Drama\n").unwrap();
    fs::write(dir.path().join(GENRES_FILE), "Action,A,B\nDrama,C,D\n").unwrap();
    fs::write(
        dir.path().join(USERS_FILE),
        "lisa,A,8,B,6\nsam,A,4,B,10\nzoe,C,9,D,9\n",
    )
    .unwrap();
    let store = RatingStore::load_csv(dir.path()).unwrap();
    let base = BipartiteGraph::build(&store).unwrap();

    let session = RecommendationSession::new(&store, &base, &ComponentPartitioner).unwrap();
    let outcome = session
        .run(&SessionRequest::new(3).with_rating("A", 1.0))
        .unwrap();

    // zoe's titles are in another component and score zero
    assert_eq!(outcome.cluster_users.len(), 3);
    assert_eq!(outcome.items(), vec!["B", "C", "D"]);
    assert!((outcome.suggestions[0].score - 1.6 / 3.0).abs() < 1e-12);
    assert_eq!(outcome.suggestions[1].score, 0.0);
    assert_eq!(outcome.cluster_count, 2);
}

#[test]
fn test_invalid_requests_never_reach_prediction() {
    let (_dir, store) = shared_store();
    let base = BipartiteGraph::build(&store).unwrap();
    let session = RecommendationSession::new(&store, &base, &SingleClusterPartitioner).unwrap();

    for request in [
        SessionRequest::new(0).with_rating("Clannad", 0.5),
        SessionRequest::new(1).with_rating("Clannad", -0.1),
        SessionRequest::new(1).with_rating("Not A Title", 0.5),
    ] {
        assert!(matches!(session.run(&request), Err(EngineError::InvalidQuery(_))));
    }
}

#[test]
fn test_bundled_sample_data() {
    use anisug_engine::partition::LabelPropagationPartitioner;
    use anisug_engine::session::PreferencesFile;

    let folder = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/sample_data");
    let store = RatingStore::load_csv(&folder).unwrap();
    assert_eq!(store.user_count(), 6);
    assert_eq!(store.item_count(), 10);
    assert_eq!(store.genre_count(), 12);
    assert_eq!(store.rating_count(), 24);
    assert!(store.unindexed_items().is_empty());

    let prefs = PreferencesFile::load(&folder.join("prefs.toml")).unwrap();
    let request = SessionRequest {
        preferences: prefs.ratings.into_iter().collect(),
        count: prefs.count.unwrap_or(10),
    };

    let base = BipartiteGraph::build(&store).unwrap();
    let partitioner = LabelPropagationPartitioner::new(Some(2023), 100);
    let session = RecommendationSession::new(&store, &base, &partitioner).unwrap();
    let outcome = session.run(&request).unwrap();

    assert!(outcome.suggestions.len() <= 3);
    assert!(outcome.cluster_users.contains(&QUERY_USER.to_string()));
    for suggestion in &outcome.suggestions {
        assert!(!request.preferences.iter().any(|(item, _)| *item == suggestion.item));
    }
}

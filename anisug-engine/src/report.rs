//! Session reports and text formatting
//!
//! **Purpose:** Turn a [`SessionOutcome`] into CLI output and a JSON export
//! that downstream presentation tools can load.

use crate::error::Result;
use crate::session::{SessionOutcome, SessionRequest, Suggestion};
use crate::snapshot::GraphLayout;
use crate::Score;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session metadata
    pub session: ReportInfo,

    /// Ratings the query user supplied
    pub preferences: Vec<(String, Score)>,

    /// Ranked suggestions, best first
    pub suggestions: Vec<Suggestion>,

    /// The query user's cluster
    pub cluster: ClusterSummary,

    /// Strongest genres of the supplied ratings
    pub genre_profile: Vec<GenreScore>,

    /// Cluster-mates × suggested titles
    pub subgraph: GraphLayout,
}

/// Report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInfo {
    /// Creation timestamp (RFC 3339)
    pub timestamp: String,

    /// Report format version
    pub version: String,

    /// Partitioner used for the session
    pub partitioner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Users in the cluster, query user included
    pub size: usize,

    /// Clusters in the whole partition
    pub cluster_count: usize,

    /// Cluster-mates, query user excluded
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreScore {
    pub genre: String,
    pub score: Score,
}

impl SessionReport {
    pub fn new(request: &SessionRequest, outcome: &SessionOutcome) -> Self {
        Self {
            session: ReportInfo {
                timestamp: chrono::Utc::now().to_rfc3339(),
                version: "1.0".to_string(),
                partitioner: outcome.partitioner.clone(),
            },
            preferences: request.preferences.clone(),
            suggestions: outcome.suggestions.clone(),
            cluster: ClusterSummary {
                size: outcome.cluster_users.len(),
                cluster_count: outcome.cluster_count,
                members: outcome.neighbors().map(str::to_string).collect(),
            },
            genre_profile: outcome
                .genre_profile
                .iter()
                .map(|(genre, score)| GenreScore {
                    genre: genre.clone(),
                    score: *score,
                })
                .collect(),
            subgraph: GraphLayout::of(&outcome.subgraph),
        }
    }

    /// Export report to JSON file
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Import report from JSON file
    pub fn import_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let report: SessionReport = serde_json::from_reader(file)?;
        Ok(report)
    }
}

/// CLI formatter for session results
pub struct CliFormatter;

impl CliFormatter {
    /// Format the ranked suggestion list
    ///
    /// Example: ` 1. Fullmetal Alchemist  0.425  [Action, Adventure]`
    pub fn format_suggestions(suggestions: &[Suggestion]) -> String {
        if suggestions.is_empty() {
            return "No suggestions.\n".to_string();
        }

        let width = suggestions
            .iter()
            .map(|s| s.item.chars().count())
            .max()
            .unwrap_or(0);

        let mut output = String::new();
        output.push_str("\nSuggestions:\n");
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        for (rank, s) in suggestions.iter().enumerate() {
            output.push_str(&format!(
                "{:2}. {:width$}  {:.3}  [{}]\n",
                rank + 1,
                s.item,
                s.score,
                s.genres.join(", "),
                width = width
            ));
        }
        output
    }

    /// Format the cluster summary
    pub fn format_cluster_summary(cluster: &ClusterSummary) -> String {
        let mut output = format!(
            "\nCluster: {} user(s) out of {} cluster(s)\n",
            cluster.size, cluster.cluster_count
        );

        if cluster.members.is_empty() {
            output.push_str("  (no other users share your cluster)\n");
            return output;
        }

        const SHOWN: usize = 10;
        let shown: Vec<&str> = cluster.members.iter().take(SHOWN).map(String::as_str).collect();
        output.push_str(&format!("  Neighbors: {}", shown.join(", ")));
        if cluster.members.len() > SHOWN {
            output.push_str(&format!(" (+{} more)", cluster.members.len() - SHOWN));
        }
        output.push('\n');
        output
    }

    /// Format the genre profile table
    pub fn format_genre_profile(profile: &[GenreScore]) -> String {
        let mut output = String::new();

        output.push_str("\nGenre Profile:\n");
        output.push_str("┌──────────────────────┬───────┐\n");
        output.push_str("│ Genre                │ Score │\n");
        output.push_str("├──────────────────────┼───────┤\n");
        for entry in profile {
            output.push_str(&format!("│ {:20} │ {:.3} │\n", entry.genre, entry.score));
        }
        output.push_str("└──────────────────────┴───────┘\n");

        output
    }

    /// Format the whole report
    pub fn format_report(report: &SessionReport) -> String {
        let mut output = Self::format_suggestions(&report.suggestions);
        output.push_str(&Self::format_cluster_summary(&report.cluster));
        output.push_str(&Self::format_genre_profile(&report.genre_profile));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_store;
    use crate::graph::BipartiteGraph;
    use crate::partition::SingleClusterPartitioner;
    use crate::session::RecommendationSession;

    fn create_test_report() -> SessionReport {
        let store = sample_store();
        let base = BipartiteGraph::build(&store).unwrap();
        let session = RecommendationSession::new(&store, &base, &SingleClusterPartitioner).unwrap();
        let request = SessionRequest::new(2).with_rating("AOT", 1.0);
        let outcome = session.run(&request).unwrap();
        SessionReport::new(&request, &outcome)
    }

    #[test]
    fn test_create_report() {
        let report = create_test_report();

        assert_eq!(report.session.version, "1.0");
        assert_eq!(report.session.partitioner, "single");
        assert!(!report.session.timestamp.is_empty());
        assert_eq!(report.cluster.size, 4);
        assert_eq!(report.cluster.members, vec!["alice", "bob", "carol"]);
        assert_eq!(report.subgraph.items, vec!["Clannad", "FMAB"]);
    }

    #[test]
    fn test_json_export_import() {
        let report = create_test_report();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        report.export_json(&path).unwrap();
        let imported = SessionReport::import_json(&path).unwrap();

        assert_eq!(imported, report);
    }

    #[test]
    fn test_format_suggestions() {
        let report = create_test_report();
        let formatted = CliFormatter::format_suggestions(&report.suggestions);
        assert!(formatted.contains(" 1. FMAB"));
        assert!(formatted.contains("0.425"));
        assert!(formatted.contains("[Action, Adventure]"));
        assert_eq!(CliFormatter::format_suggestions(&[]), "No suggestions.\n");
    }

    #[test]
    fn test_format_cluster_summary() {
        let lonely = ClusterSummary {
            size: 1,
            cluster_count: 3,
            members: vec![],
        };
        assert!(CliFormatter::format_cluster_summary(&lonely).contains("no other users"));

        let crowded = ClusterSummary {
            size: 13,
            cluster_count: 1,
            members: (0..12).map(|i| format!("user{}", i)).collect(),
        };
        let formatted = CliFormatter::format_cluster_summary(&crowded);
        assert!(formatted.contains("user9"));
        assert!(!formatted.contains("user10"));
        assert!(formatted.contains("(+2 more)"));
    }

    #[test]
    fn test_format_genre_profile() {
        let profile = vec![GenreScore {
            genre: "Drama".to_string(),
            score: 0.75,
        }];
        let formatted = CliFormatter::format_genre_profile(&profile);
        assert!(formatted.contains("Genre"));
        assert!(formatted.contains("Drama"));
        assert!(formatted.contains("0.750"));
    }
}

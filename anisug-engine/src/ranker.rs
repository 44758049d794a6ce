//! Suggestion ranking

use crate::Score;

/// `scores` sorted by descending score
///
/// The sort is stable: equal scores keep their input order.
pub fn ranked(scores: &[(String, Score)]) -> Vec<(String, Score)> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted
}

/// The `n` best-scored entries with their scores, best first
pub fn top_n_scored(scores: &[(String, Score)], n: usize) -> Vec<(String, Score)> {
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = ranked(scores);
    sorted.truncate(n);
    sorted
}

/// The `n` best-scored titles, best first
///
/// Returns `min(n, scores.len())` titles; `n == 0` yields an empty list.
pub fn top_n(scores: &[(String, Score)], n: usize) -> Vec<String> {
    top_n_scored(scores, n)
        .into_iter()
        .map(|(item, _)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, Score)]) -> Vec<(String, Score)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_top_n_descending() {
        let s = scores(&[("a", 0.1), ("b", 0.9), ("c", 0.5)]);
        assert_eq!(top_n(&s, 2), vec!["b", "c"]);
        assert_eq!(top_n(&s, 10), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_top_n_empty_cases() {
        let s = scores(&[("a", 0.1)]);
        assert!(top_n(&s, 0).is_empty());
        assert!(top_n(&[], 5).is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        let s = scores(&[("x", 0.3), ("y", 0.7), ("z", 0.3), ("w", 0.7)]);
        assert_eq!(top_n(&s, 4), vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn test_top_n_scored_keeps_scores() {
        let s = scores(&[("a", 0.25), ("b", 0.75)]);
        assert_eq!(top_n_scored(&s, 1), scores(&[("b", 0.75)]));
    }
}

//! The exploit/explore ranking policy.

/// Pairs the worst-performing population indices with the best-performing
/// ones, positionally by rank order.
///
/// Indices are ranked by ascending accuracy (stable, so ties resolve to
/// the lower index). The bottom `ceil(0.2 * n)` each copy from one member
/// of the top `floor(0.8 * n)..` slice: the worst pairs with the
/// worst-of-the-best, and so on. Populations of one or zero produce no
/// pairs.
pub(crate) fn exploit_pairs(accuracies: &[f64]) -> Vec<(usize, usize)> {
    let n = accuracies.len();
    if n <= 1 {
        return Vec::new();
    }

    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|a, b| accuracies[*a].total_cmp(&accuracies[*b]));

    let worst = &ranked[..(0.2 * n as f64).ceil() as usize];
    let best = &ranked[(0.8 * n as f64).floor() as usize..];

    worst.iter().zip(best).map(|(w, b)| (*w, *b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_fifth_copies_top_fifth_positionally() {
        let accuracies: Vec<f64> = (1..=10).map(|n| n as f64 / 10.0).collect();
        assert_eq!(exploit_pairs(&accuracies), vec![(0, 8), (1, 9)]);
    }

    #[test]
    fn ranking_follows_accuracy_not_index() {
        let accuracies = vec![0.9, 0.1, 0.5, 0.2, 0.8, 0.3, 0.7, 0.4, 0.6, 1.0];
        assert_eq!(exploit_pairs(&accuracies), vec![(1, 0), (3, 9)]);
    }

    #[test]
    fn singleton_population_never_copies() {
        assert!(exploit_pairs(&[0.5]).is_empty());
        assert!(exploit_pairs(&[]).is_empty());
    }

    #[test]
    fn pair_of_models_copies_worst_from_best() {
        assert_eq!(exploit_pairs(&[0.3, 0.7]), vec![(0, 1)]);
        assert_eq!(exploit_pairs(&[0.7, 0.3]), vec![(1, 0)]);
    }

    #[test]
    fn ties_resolve_to_the_lower_index() {
        // All equal: the stable sort keeps index order, so the first
        // index is "worst" and the slice tail is "best".
        let pairs = exploit_pairs(&[0.5; 5]);
        assert_eq!(pairs, vec![(0, 4)]);
    }

    #[test]
    fn small_populations_use_literal_group_sizes() {
        // n = 3: one worst, one best.
        assert_eq!(exploit_pairs(&[0.2, 0.9, 0.5]), vec![(0, 1)]);
        // n = 4: still one of each.
        assert_eq!(exploit_pairs(&[0.2, 0.9, 0.5, 0.6]), vec![(0, 1)]);
    }
}

use std::ops::Range;

/// Assigns population indices to `workers` contiguous, near-equal ranges.
///
/// Boundaries come from accumulating each worker's fractional share of the
/// population and rounding up, carrying the remainder forward. The ranges
/// are disjoint, ordered, cover `0..pop_size`, and their sizes differ by at
/// most one. Workers past the population size receive empty ranges.
pub fn partition_population(pop_size: usize, workers: usize) -> Vec<Range<usize>> {
    debug_assert!(workers >= 1);

    let share = pop_size as f64 / workers as f64;
    let mut ranges = Vec::with_capacity(workers);
    let mut owed = 0.0;
    let mut start = 0;

    for _ in 0..workers {
        owed += share;
        let end = (start + owed.ceil() as usize).min(pop_size);
        ranges.push(start..end);
        owed -= (end - start) as f64;
        start = end;
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_properties(pop_size: usize, workers: usize) {
        let ranges = partition_population(pop_size, workers);
        assert_eq!(ranges.len(), workers);

        // Contiguous, ordered, covering [0, pop_size).
        let mut expected_start = 0;
        for range in &ranges {
            assert_eq!(range.start, expected_start);
            assert!(range.end >= range.start);
            expected_start = range.end;
        }
        assert_eq!(expected_start, pop_size);

        // Sizes differ by at most one.
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        assert!(max - min <= 1, "pop {pop_size} over {workers}: {sizes:?}");
    }

    #[test]
    fn covers_population_for_all_small_configs() {
        for pop_size in 0..40 {
            for workers in 1..12 {
                check_properties(pop_size, workers);
            }
        }
    }

    #[test]
    fn uneven_split_puts_larger_ranges_first() {
        let ranges = partition_population(3, 2);
        assert_eq!(ranges, vec![0..2, 2..3]);
    }

    #[test]
    fn divides_evenly_when_possible() {
        let ranges = partition_population(8, 4);
        assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..8]);
    }

    #[test]
    fn more_workers_than_models_leaves_empty_ranges() {
        let ranges = partition_population(2, 4);
        let nonempty: Vec<&Range<usize>> = ranges.iter().filter(|r| !r.is_empty()).collect();
        assert_eq!(nonempty.len(), 2);
        check_properties(2, 4);
    }

    #[test]
    fn single_worker_owns_everything() {
        assert_eq!(partition_population(7, 1), vec![0..7]);
    }
}

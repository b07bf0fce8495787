// ============================================================
// Layer 4 — Batch Limiting
// ============================================================
// Experiments are often run on a fraction of each split to keep
// sweeps cheap. The fraction is applied to the number of BATCHES
// per epoch rather than to the examples, so a shuffled loader
// still draws from the whole split.

/// Number of batches needed to cover `len` items.
pub fn num_batches(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    len.div_ceil(batch_size)
}

/// How many of `total` batches to run for a proportion in (0, 1].
///
/// A proportion of 1.0 or more keeps every batch. Any smaller
/// positive proportion keeps at least one batch, so a tiny dev
/// split never silently skips validation.
pub fn limit_batches(total: usize, proportion: f64) -> usize {
    if total == 0 || proportion <= 0.0 {
        return 0;
    }
    if proportion >= 1.0 {
        return total;
    }
    ((total as f64 * proportion).floor() as usize).clamp(1, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_batches_rounds_up() {
        assert_eq!(num_batches(10, 4), 3);
        assert_eq!(num_batches(8, 4), 2);
        assert_eq!(num_batches(0, 4), 0);
    }

    #[test]
    fn test_full_proportion_keeps_everything() {
        assert_eq!(limit_batches(17, 1.0), 17);
    }

    #[test]
    fn test_fraction_floors() {
        assert_eq!(limit_batches(10, 0.25), 2);
        assert_eq!(limit_batches(100, 0.5), 50);
    }

    #[test]
    fn test_small_fraction_keeps_one_batch() {
        assert_eq!(limit_batches(3, 0.1), 1);
    }

    #[test]
    fn test_empty_split() {
        assert_eq!(limit_batches(0, 0.5), 0);
        assert_eq!(limit_batches(0, 1.0), 0);
    }
}

// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles examples and splits them into:
//   - train.jsonl  the records the trainer learns from
//   - val.jsonl    held-out records for evaluation
//
// Datasets arrive grouped (SemEval files are per year, the
// Sentiment140 CSV is sorted by class), so the shuffle comes
// before the split or the validation set would be one class.
//
// With a seed the split is reproducible, which the encode
// and batches commands rely on when comparing runs.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle `samples` and split into (train, validation).
///
/// `train_fraction` is clamped to `[0, 1]`; the split point is rounded.
pub fn split_train_val<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    seed:           Option<u64>,
) -> (Vec<T>, Vec<T>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let val      = samples.split_off(split_at.min(total));

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8, Some(1));
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize>  = (0..50).collect();
        let (train, val)       = split_train_val(items, 0.7, None);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = split_train_val((0..30).collect::<Vec<usize>>(), 0.5, Some(9));
        let b = split_train_val((0..30).collect::<Vec<usize>>(), 0.5, Some(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.8, Some(0));
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_fraction_is_clamped() {
        let (train, val) = split_train_val((0..10).collect::<Vec<usize>>(), 1.5, Some(0));
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }
}

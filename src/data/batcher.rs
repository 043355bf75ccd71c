// ============================================================
// Layer 4 — Tweet Batcher
// ============================================================
// Implements Burn's Batcher trait so persisted examples can
// be fed to a Burn DataLoader, and converts the flat arrays
// of a PaddedBatch into tensors on a device.
//
// How batching works here:
//   Input:  Vec of N Examples (variable length)
//   Output: TweetBatch with
//             word_ids   [N, L]      Int
//             char_ids   [N, L, C]   Int
//             tags       [N, L, T]   Float (one-hot)
//             num_tokens [N]         Int
//             labels     [N, K]      Float (one-hot)
//
// Padding is dynamic: L is the longest example in the batch,
// capped at `max_length`. The id lookup and padding rules
// are shared with the BatchPipeline through PaddedBatch, so
// both routes produce identical values.
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::pipeline::PaddedBatch;
use crate::domain::example::Example;
use crate::ml::vocab_index::FrozenIndices;

// ─── TweetBatch ───────────────────────────────────────────────────────────────
/// A padded batch on a device. All tensors share `batch_size` as their
/// first dimension.
#[derive(Debug, Clone)]
pub struct TweetBatch<B: Backend> {
    pub word_ids:   Tensor<B, 2, Int>,
    pub char_ids:   Tensor<B, 3, Int>,
    pub tags:       Tensor<B, 3>,
    pub num_tokens: Tensor<B, 1, Int>,
    pub labels:     Tensor<B, 2>,
}

impl<B: Backend> TweetBatch<B> {
    /// Move a host-side batch onto `device`.
    pub fn from_padded(batch: &PaddedBatch, device: &B::Device) -> Self {
        let (n, l, c, t, k) = (
            batch.batch_size,
            batch.seq_len,
            batch.char_limit,
            batch.num_tags,
            batch.num_classes,
        );

        let word_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(batch.word_ids.clone(), [n, l]),
            device,
        );
        let char_ids = Tensor::<B, 3, Int>::from_data(
            TensorData::new(batch.char_ids.clone(), [n, l, c]),
            device,
        );
        let tags = Tensor::<B, 3>::from_data(
            TensorData::new(batch.tags.clone(), [n, l, t]),
            device,
        );
        let num_tokens = Tensor::<B, 1, Int>::from_data(
            TensorData::new(batch.num_tokens.clone(), [n]),
            device,
        );
        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(batch.labels.clone(), [n, k]),
            device,
        );

        Self { word_ids, char_ids, tags, num_tokens, labels }
    }
}

// ─── TweetBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct TweetBatcher {
    frozen:      Arc<FrozenIndices>,
    char_limit:  usize,
    max_length:  usize,
    num_classes: usize,
}

impl TweetBatcher {
    pub fn new(
        frozen:      Arc<FrozenIndices>,
        char_limit:  usize,
        max_length:  usize,
        num_classes: usize,
    ) -> Self {
        Self { frozen, char_limit, max_length, num_classes }
    }
}

impl<B: Backend> Batcher<B, Example, TweetBatch<B>> for TweetBatcher {
    fn batch(&self, items: Vec<Example>, device: &B::Device) -> TweetBatch<B> {
        let longest = items.iter().map(|e| e.num_tokens).max().unwrap_or(0);
        let seq_len = longest.clamp(1, self.max_length.max(1));

        let padded = PaddedBatch::from_examples(
            &items,
            &self.frozen,
            seq_len,
            self.char_limit,
            self.num_classes,
            0,
        );
        TweetBatch::from_padded(&padded, device)
    }
}

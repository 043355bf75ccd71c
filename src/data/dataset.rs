use std::path::Path;

use burn::data::dataset::Dataset;

use crate::data::record_writer::read_records;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::example::Example;

/// Persisted examples loaded back into memory.
pub struct RecordDataset {
    examples: Vec<Example>,
}

impl RecordDataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Load a `.jsonl` record file written by `RecordWriter`.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let examples = read_records(path)?;
        Ok(Self::new(examples))
    }

    /// Every label must be a valid class id.
    pub fn validate_labels(&self, num_classes: usize) -> PipelineResult<()> {
        match self.examples.iter().find(|e| e.label >= num_classes) {
            Some(bad) => Err(PipelineError::config(format!(
                "Record label {} is outside the {num_classes} known classes",
                bad.label
            ))),
            None => Ok(()),
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.examples.iter().map(|e| e.num_tokens).max().unwrap_or(0)
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }
}

impl Dataset<Example> for RecordDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

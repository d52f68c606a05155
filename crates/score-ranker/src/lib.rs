//! Score Ranking
//!
//! Converts raw classifier output into a probability distribution and a
//! labelled top-K list.

mod labels;
mod ranker;

pub use labels::LabelTable;
pub use ranker::{normalize, rank, Normalization, PredictionResult, RankedLabel, DEFAULT_TOP_K};

use std::path::PathBuf;
use thiserror::Error;

/// Errors while ranking model output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    #[error("Model produced an empty output vector")]
    EmptyOutput,
}

/// Errors while loading a label table
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Could not read labels from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

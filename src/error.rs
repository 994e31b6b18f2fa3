/*!
Error taxonomy of the evaluator. Per-document failures are wrapped in a `Diagnostic` and collected
instead of aborting the run. Undefined metrics are not errors: they are `None` values in the
`EvaluationResult`.
*/
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Result type of the evaluator.
pub type Result<T> = std::result::Result<T, EvaluationError>;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluationError {
    /// The document does not have one label per token.
    #[error("Malformed document {sample_id}: {tokens} tokens but {tags} labels")]
    MalformedDocument {
        sample_id: usize,
        tokens: usize,
        tags: usize,
    },

    /// The model returned a label sequence whose length differs from the token count.
    #[error("Prediction for document {sample_id} has {actual} labels, expected {expected}")]
    PredictionLengthMismatch {
        sample_id: usize,
        expected: usize,
        actual: usize,
    },

    /// Only raised when the `AliasMap` is in strict mode.
    #[error("No alias configured for entity type `{entity_type}` (document {sample_id})")]
    UnknownEntityAlias {
        sample_id: usize,
        entity_type: String,
    },

    /// `from` is renamed to a type which is itself renamed. Alignment would not be idempotent.
    #[error("Chained alias: `{from}` is renamed to `{to}`, which is renamed again")]
    ChainedAlias { from: String, to: String },

    #[error("Beta must be finite and strictly positive, got {0}")]
    InvalidBeta(f64),

    /// Failure reported by a model adapter.
    #[error("Model failed on document {sample_id}: {message}")]
    Model { sample_id: usize, message: String },

    #[error("Could not parse `{0}` into a labeling scheme (expected IO, BIO or BILUO)")]
    UnknownLabelingScheme(String),
}

impl EvaluationError {
    /// Create a model failure.
    pub fn model(sample_id: usize, message: impl Into<String>) -> Self {
        EvaluationError::Model {
            sample_id,
            message: message.into(),
        }
    }
}

/// A document excluded from the run, with the reason why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub sample_id: usize,
    pub error: EvaluationError,
}

impl Diagnostic {
    pub fn new(sample_id: usize, error: EvaluationError) -> Self {
        Self { sample_id, error }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Excluded document {}: {}", self.sample_id, self.error)
    }
}

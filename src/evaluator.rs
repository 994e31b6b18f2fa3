/**
Token-level comparison of a prediction against the ground truth of one document, and the pipeline
running a model over a whole dataset.
*/
use crate::config::EvaluatorConfig;
use crate::error::{Diagnostic, EvaluationError, Result};
use crate::labels::{entity_type, OUTSIDE};
use crate::metrics::{calculate_score_with_diagnostics, EvaluationResult};
use crate::model::Model;
use crate::sample::InputSample;
use ahash::AHashSet;
use enum_iterator::Sequence;
use itertools::izip;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Display;

/// The three kinds of token-level mistakes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum MismatchKind {
    /// An entity token predicted as `O`.
    FalseNegative,
    /// An `O` token predicted as an entity.
    FalsePositive,
    /// An entity token predicted as another entity.
    WrongEntity,
}

impl MismatchKind {
    fn classify(annotation: &str, prediction: &str) -> Option<Self> {
        match (annotation == OUTSIDE, prediction == OUTSIDE) {
            _ if annotation == prediction => None,
            (false, true) => Some(MismatchKind::FalseNegative),
            (true, false) => Some(MismatchKind::FalsePositive),
            _ => Some(MismatchKind::WrongEntity),
        }
    }
}

impl Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MismatchKind::FalseNegative => "FN",
            MismatchKind::FalsePositive => "FP",
            MismatchKind::WrongEntity => "Wrong entity",
        };
        write!(f, "{}", name)
    }
}

/// A token on which the prediction disagrees with the ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub sample_id: usize,
    pub token_index: usize,
    pub token: String,
    /// True category of the token.
    pub annotation: String,
    /// Predicted category of the token.
    pub prediction: String,
    pub kind: MismatchKind,
    pub full_text: String,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Type: {}, Annotation = {}, Prediction = {}, Token = {}, Document = {}, Full text = {}",
            self.kind,
            self.annotation,
            self.prediction,
            self.token,
            self.sample_id,
            self.full_text
        )
    }
}

/// Outcome of the comparison of one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleEvaluation {
    pub sample_id: usize,
    /// Number of tokens per `(true category, predicted category)` pair.
    pub counts: BTreeMap<(String, String), usize>,
    /// Mismatches, in token order.
    pub mismatches: Vec<Mismatch>,
    pub token_count: usize,
}

impl SampleEvaluation {
    /// Number of tokens annotated as `annotation` and predicted as `prediction`.
    pub fn count(&self, annotation: &str, prediction: &str) -> usize {
        self.counts
            .get(&(String::from(annotation), String::from(prediction)))
            .copied()
            .unwrap_or(0)
    }
}

/// Category of a label: the entity type without its prefix, or `O` when the entity type is not
/// kept.
fn category<'a>(label: &'a str, entities_to_keep: Option<&AHashSet<String>>) -> &'a str {
    let entity = entity_type(label);
    match entities_to_keep {
        Some(keep) if !keep.contains(entity) => OUTSIDE,
        _ => entity,
    }
}

/// Compares the prediction of a single document to its ground truth, token by token. Labels are
/// compared by category, so `B-PERSON` and `I-PERSON` match. When `entities_to_keep` is given,
/// every other category is treated as `O` on both sides.
///
/// ```rust
/// use pii_eval::{evaluate_sample, InputSample, MismatchKind};
///
/// let sample = InputSample::new(
///     "Dan Brown lives in Berlin",
///     vec!["Dan", "Brown", "lives", "in", "Berlin"],
///     vec!["B-PERSON", "L-PERSON", "O", "O", "U-LOCATION"],
/// );
/// let prediction = vec!["B-PERSON", "L-PERSON", "O", "O", "O"];
/// let evaluation = evaluate_sample(0, &sample, &prediction, None).unwrap();
///
/// assert_eq!(evaluation.count("PERSON", "PERSON"), 2);
/// assert_eq!(evaluation.mismatches.len(), 1);
/// assert_eq!(evaluation.mismatches[0].kind, MismatchKind::FalseNegative);
/// assert_eq!(evaluation.mismatches[0].token, "Berlin");
/// ```
pub fn evaluate_sample<S: AsRef<str>>(
    sample_id: usize,
    sample: &InputSample,
    prediction: &[S],
    entities_to_keep: Option<&AHashSet<String>>,
) -> Result<SampleEvaluation> {
    sample.validate(sample_id)?;
    if prediction.len() != sample.tokens.len() {
        return Err(EvaluationError::PredictionLengthMismatch {
            sample_id,
            expected: sample.tokens.len(),
            actual: prediction.len(),
        });
    }
    let mut evaluation = SampleEvaluation {
        sample_id,
        token_count: sample.tokens.len(),
        ..Default::default()
    };
    for (token_index, (token, tag, predicted)) in
        izip!(sample.tokens.iter(), sample.tags.iter(), prediction.iter()).enumerate()
    {
        let annotation = category(tag, entities_to_keep);
        let prediction = category(predicted.as_ref(), entities_to_keep);
        *evaluation
            .counts
            .entry((String::from(annotation), String::from(prediction)))
            .or_insert(0) += 1;
        if let Some(kind) = MismatchKind::classify(annotation, prediction) {
            evaluation.mismatches.push(Mismatch {
                sample_id,
                token_index,
                token: token.clone(),
                annotation: String::from(annotation),
                prediction: String::from(prediction),
                kind,
                full_text: sample.full_text.clone(),
            });
        }
    }
    Ok(evaluation)
}

/// Per-document records of a run, with the documents that were excluded from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// Records in input order.
    pub records: Vec<SampleEvaluation>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs a model over a dataset and scores it.
///
/// ```rust
/// use pii_eval::{Evaluator, EvaluatorConfig, IdentityModel, InputSample};
///
/// let samples = vec![InputSample::new(
///     "Call Ana",
///     vec!["Call", "Ana"],
///     vec!["O", "U-PERSON"],
/// )];
/// let evaluator = Evaluator::new(IdentityModel, EvaluatorConfig::default());
/// let evaluation = evaluator.evaluate_all(&samples);
/// let result = evaluator.calculate_score(&evaluation).unwrap();
///
/// assert_eq!(result.pii_precision, Some(1.0));
/// assert_eq!(result.pii_recall, Some(1.0));
/// ```
#[derive(Debug, Clone)]
pub struct Evaluator<M: Model> {
    model: M,
    config: EvaluatorConfig,
    entities_to_keep: Option<AHashSet<String>>,
}

impl<M: Model> Evaluator<M> {
    pub fn new(model: M, config: EvaluatorConfig) -> Self {
        let entities_to_keep = config
            .entities_to_keep
            .as_ref()
            .map(|entities| entities.iter().cloned().collect());
        Self {
            model,
            config,
            entities_to_keep,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Predicts and evaluates every document. A document without a `sample_id` is identified by
    /// its position in `samples`. Malformed documents, documents the model failed on and documents
    /// whose prediction has the wrong length are excluded and reported in the diagnostics.
    pub fn evaluate_all(&self, samples: &[InputSample]) -> Evaluation {
        let mut diagnostics = Vec::new();
        for (position, sample) in samples.iter().enumerate() {
            let sample_id = sample.sample_id.unwrap_or(position);
            if let Err(error) = sample.validate(sample_id) {
                log::warn!("{}", error);
                diagnostics.push(Diagnostic::new(sample_id, error));
            }
        }
        let documents: Cow<[InputSample]> = if diagnostics.is_empty() {
            Cow::Borrowed(samples)
        } else {
            Cow::Owned(
                samples
                    .iter()
                    .enumerate()
                    .map(|(position, sample)| (sample.sample_id.unwrap_or(position), sample))
                    .filter(|(sample_id, sample)| sample.validate(*sample_id).is_ok())
                    .map(|(sample_id, sample)| sample.clone().with_sample_id(sample_id))
                    .collect(),
            )
        };

        let predictions = self
            .model
            .batch_predict(&documents, &self.config.predict_options);
        let entities_to_keep = self.entities_to_keep.as_ref();
        let evaluate = |(position, sample): (usize, &InputSample)| {
            let sample_id = sample.sample_id.unwrap_or(position);
            let outcome = match predictions.get(position) {
                Some(Ok(prediction)) => {
                    evaluate_sample(sample_id, sample, prediction.as_slice(), entities_to_keep)
                }
                Some(Err(error)) => Err(error.clone()),
                // The model returned fewer outcomes than documents.
                None => evaluate_sample::<&str>(sample_id, sample, &[], entities_to_keep),
            };
            (sample_id, outcome)
        };
        let outcomes: Vec<(usize, Result<SampleEvaluation>)> = if self.config.parallel {
            documents.par_iter().enumerate().map(evaluate).collect()
        } else {
            documents.iter().enumerate().map(evaluate).collect()
        };

        let mut records = Vec::with_capacity(outcomes.len());
        for (sample_id, outcome) in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(error) => {
                    log::warn!("{}", error);
                    diagnostics.push(Diagnostic::new(sample_id, error));
                }
            }
        }
        log::debug!(
            "Evaluated {} documents, excluded {}",
            records.len(),
            diagnostics.len()
        );
        Evaluation {
            records,
            diagnostics,
        }
    }

    /// Aggregates the records of `evaluation` with the configured beta.
    pub fn calculate_score(&self, evaluation: &Evaluation) -> Result<EvaluationResult> {
        calculate_score_with_diagnostics(
            &evaluation.records,
            evaluation.diagnostics.clone(),
            self.config.beta,
        )
    }
}

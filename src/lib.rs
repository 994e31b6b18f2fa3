/*!
This library evaluates PII (personally identifiable information) detection models at the token
level. A model labels every token of a document, and its labels are compared to the ground-truth
labels of the dataset.

# Pipeline
* Alignment: the entity types of the dataset are renamed into the vocabulary of the model with an
    `AliasMap`. Types the model does not detect can be ignored (folded into `O`).
* Prediction: any type implementing the `Model` trait can be evaluated. The crate ships mock
    models for tests (`IdentityModel`, `AlternatingIdentityModel`, `FixedPredictionModel`) and a
    `RecognizerModel` adapting a recognizer working on raw text.
* Comparison: `evaluate_sample` compares the prediction of a document to its ground truth, token by
    token, and records every mismatch.
* Aggregation: `calculate_score` sums the records into a confusion matrix and computes the metrics.

# Labels
A label is `O`, a bare entity type (IO scheme) or an entity type with a positional prefix, such as
`B-PERSON` or `U-LOCATION`. Labels are compared by entity type only: `B-PERSON` and `I-PERSON` are
the same category. The IO, BIO and BILUO schemes are supported.

# Metrics
* PII precision, recall and F-beta treat the task as binary: a token predicted as any entity while
    annotated as any entity is a true positive, even when the types differ.
* Per entity type, recall is the share of tokens annotated with the type that were predicted with
    it, and precision is the share of tokens predicted with the type that were annotated with it.
* A metric whose denominator is 0 is undefined (`None`), never 0 or 1.

The default beta is 2.5: missing PII is worse than flagging text that is not PII.
*/

mod alignment;
mod config;
mod error;
mod evaluator;
mod labels;
mod metrics;
mod model;
mod reporter;
mod sample;

// The public api starts here
pub use error::{Diagnostic, EvaluationError, Result};

pub use labels::{decode_spans, entity_type, to_scheme, LabelingScheme, TokenSpan, OUTSIDE};

pub use sample::{InputSample, Span};

pub use alignment::{align, align_samples, AliasMap, Alignment, EntityAlias, UnknownEntityPolicy};

pub use model::{
    AlternatingIdentityModel, FixedPredictionModel, IdentityModel, Model, PredictOptions,
    RecognizedSpan, RecognizerModel, SpanRecognizer,
};

pub use evaluator::{evaluate_sample, Evaluation, Evaluator, Mismatch, MismatchKind, SampleEvaluation};

pub use metrics::{
    calculate_score, calculate_score_with_diagnostics, f_beta, ConfusionMatrix, EvaluationResult,
    DEFAULT_BETA,
};

pub use reporter::{ClassMetrics, MistakeListing, PII_CLASS};

pub use config::{EvaluatorConfig, EvaluatorConfigBuilder, DEFAULT_MISTAKE_LIMIT};

/// Main entrypoint of the library. Runs `model` over `samples`, scores it and logs the summary
/// through the `log` facade. When the config is verbose, the mistakes of the model are logged too.
/// Documents excluded from the run are listed in the `diagnostics` of the result.
///
/// * `model`: Model under test
/// * `samples`: Documents, already aligned on the vocabulary of the model
/// * `config`: Parameters of the evaluation
///
/// #Example
/// ```rust
/// use pii_eval::{score_model, EvaluatorConfigBuilder, FixedPredictionModel, InputSample};
///
/// let samples = vec![InputSample::new(
///     "Dan Brown",
///     vec!["Dan", "Brown"],
///     vec!["B-PERSON", "L-PERSON"],
/// )];
/// let model = FixedPredictionModel::new(vec!["U-PERSON", "O"]);
/// let config = EvaluatorConfigBuilder::default().beta(1.0).build();
///
/// let result = score_model(model, &samples, config).unwrap();
///
/// assert_eq!(result.pii_precision, Some(1.0));
/// assert_eq!(result.pii_recall, Some(0.5));
/// assert_eq!(result.entity_support["PERSON"], 2);
/// ```
pub fn score_model<M: Model>(
    model: M,
    samples: &[InputSample],
    config: EvaluatorConfig,
) -> Result<EvaluationResult> {
    let verbose = config.verbose();
    let mistake_limit = config.mistake_limit();
    let evaluator = Evaluator::new(model, config);
    let evaluation = evaluator.evaluate_all(samples);
    let result = evaluator.calculate_score(&evaluation)?;

    log::info!(
        "Evaluated {} documents ({} excluded), beta = {}",
        evaluation.records.len(),
        evaluation.diagnostics.len(),
        result.beta
    );
    for row in result.class_metrics() {
        log::info!("{}", row);
    }
    if verbose {
        log::info!("{}", result.mistake_listing(mistake_limit));
    }
    Ok(result)
}

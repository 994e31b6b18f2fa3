/**
This module aggregates the per-document records into the final metrics: precision, recall and
F-beta of the binary PII/non-PII view, precision and recall of every entity type, and the confusion
counts they are derived from.
*/
use crate::error::{Diagnostic, EvaluationError, Result};
use crate::evaluator::{Mismatch, MismatchKind, SampleEvaluation};
use crate::labels::OUTSIDE;
use ahash::AHashMap;
use itertools::{multizip, Itertools};
use ndarray::{prelude::*, Zip};
use num::{Float, NumCast};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::iter::once;

/// Beta used when none is configured. Recall weighs more than precision when detecting PII.
pub const DEFAULT_BETA: f64 = 2.5;

/// Token counts for every `(true category, predicted category)` pair. Rows are true categories,
/// columns are predicted categories. Categories are sorted, with `O` always at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Array2<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::from_records(&[])
    }
}

impl ConfusionMatrix {
    /// Sums the counts of every record.
    pub fn from_records(records: &[SampleEvaluation]) -> Self {
        let vocabulary: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.counts.keys())
            .flat_map(|(annotation, prediction)| [annotation.as_str(), prediction.as_str()])
            .filter(|category| *category != OUTSIDE)
            .collect();
        let labels: Vec<String> = once(OUTSIDE)
            .chain(vocabulary)
            .map(String::from)
            .collect();
        let index: AHashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();
        let mut counts = Array2::<usize>::zeros((labels.len(), labels.len()));
        for record in records {
            for ((annotation, prediction), n) in record.counts.iter() {
                counts[[index[annotation.as_str()], index[prediction.as_str()]]] += n;
            }
        }
        Self { labels, counts }
    }

    /// Sorted categories, `O` first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> ArrayView2<usize> {
        self.counts.view()
    }

    /// Number of tokens annotated as `annotation` and predicted as `prediction`.
    pub fn get(&self, annotation: &str, prediction: &str) -> usize {
        let row = self.labels.iter().position(|l| l == annotation);
        let column = self.labels.iter().position(|l| l == prediction);
        match (row, column) {
            (Some(row), Some(column)) => self.counts[[row, column]],
            _ => 0,
        }
    }

    /// Counts of the binary view: (true positives, false positives, false negatives). A token is
    /// a true positive when it is annotated and predicted as any entity.
    fn pii_counts(&self) -> (usize, usize, usize) {
        let tp = self.counts.slice(s![1.., 1..]).sum();
        let fp = self.counts.slice(s![0, 1..]).sum();
        let fn_ = self.counts.slice(s![1.., 0]).sum();
        (tp, fp, fn_)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator != 0).then(|| numerator as f64 / denominator as f64)
}

/// Element-wise division, `None` where the denominator is 0.
fn prf_divide(numerator: ArrayView1<usize>, denominator: ArrayView1<usize>) -> Array1<Option<f64>> {
    Zip::from(numerator)
        .and(denominator)
        .map_collect(|&n, &d| ratio(n, d))
}

/// F-beta score of a precision and a recall. Undefined when either is undefined or when both are
/// 0.
///
/// ```rust
/// use pii_eval::f_beta;
///
/// assert_eq!(f_beta(Some(0.5), Some(0.5), 1.0), Some(0.5));
/// assert_eq!(f_beta(Some(0.0), Some(0.0), 1.0), None);
/// assert_eq!(f_beta(None, Some(1.0), 2.5), None);
/// ```
pub fn f_beta<F: Float>(precision: Option<F>, recall: Option<F>, beta: F) -> Option<F> {
    let (precision, recall) = (precision?, recall?);
    let beta2 = beta.powi(2);
    let denominator = beta2 * precision + recall;
    if denominator.is_zero() {
        return None;
    }
    Some((F::one() + beta2) * precision * recall / denominator)
}

fn check_beta<F: Float>(beta: F) -> Result<f64> {
    let beta = <f64 as NumCast>::from(beta).unwrap_or(f64::NAN);
    if beta.is_finite() && beta > 0.0 {
        Ok(beta)
    } else {
        Err(EvaluationError::InvalidBeta(beta))
    }
}

/// Metrics of a run. Every metric is `None` when its denominator is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub pii_precision: Option<f64>,
    pub pii_recall: Option<f64>,
    pub pii_f: Option<f64>,
    pub beta: f64,
    pub entity_precision: BTreeMap<String, Option<f64>>,
    pub entity_recall: BTreeMap<String, Option<f64>>,
    /// Number of tokens annotated with each entity type.
    pub entity_support: BTreeMap<String, usize>,
    pub confusion: ConfusionMatrix,
    /// Mismatches of every record, in record order then token order.
    pub mistakes: Vec<Mismatch>,
    /// Documents excluded from the run.
    pub diagnostics: Vec<Diagnostic>,
}

impl EvaluationResult {
    /// F-beta of a single entity type, with the beta of the run.
    pub fn entity_f(&self, entity: &str) -> Option<f64> {
        f_beta(
            self.entity_precision.get(entity).copied().flatten(),
            self.entity_recall.get(entity).copied().flatten(),
            self.beta,
        )
    }

    pub fn mistakes_of_kind(&self, kind: MismatchKind) -> impl Iterator<Item = &Mismatch> + '_ {
        self.mistakes.iter().filter(move |m| m.kind == kind)
    }

    /// The `n` tokens most often involved in a mistake of the given kind, with their number of
    /// occurrences. Ties are sorted alphabetically.
    pub fn most_common_tokens(&self, kind: MismatchKind, n: usize) -> Vec<(String, usize)> {
        self.mistakes_of_kind(kind)
            .map(|m| m.token.as_str())
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .take(n)
            .map(|(token, count)| (String::from(token), count))
            .collect()
    }
}

/// Aggregates the records of a run into an `EvaluationResult`.
///
/// * `records`: per-document records, in input order.
/// * `beta`: weight of the recall in the F score. Must be finite and strictly positive.
pub fn calculate_score<F: Float>(
    records: &[SampleEvaluation],
    beta: F,
) -> Result<EvaluationResult> {
    calculate_score_with_diagnostics(records, Vec::new(), beta)
}

/// Same as `calculate_score`, carrying the documents excluded from the run into the result.
pub fn calculate_score_with_diagnostics<F: Float>(
    records: &[SampleEvaluation],
    diagnostics: Vec<Diagnostic>,
    beta: F,
) -> Result<EvaluationResult> {
    let beta = check_beta(beta)?;
    let confusion = ConfusionMatrix::from_records(records);

    let (tp, fp, fn_) = confusion.pii_counts();
    let pii_precision = ratio(tp, tp + fp);
    let pii_recall = ratio(tp, tp + fn_);
    let pii_f = f_beta(pii_precision, pii_recall, beta);

    let counts = confusion.counts();
    let matched = counts.diag();
    let true_sum = counts.sum_axis(Axis(1));
    let pred_sum = counts.sum_axis(Axis(0));
    let precision = prf_divide(matched, pred_sum.view());
    let recall = prf_divide(matched, true_sum.view());

    let mut entity_precision = BTreeMap::new();
    let mut entity_recall = BTreeMap::new();
    let mut entity_support = BTreeMap::new();
    // Index 0 is `O`, which is not an entity.
    for (entity, p, r, support) in multizip((
        confusion.labels().iter(),
        precision.iter(),
        recall.iter(),
        true_sum.iter(),
    ))
    .skip(1)
    {
        entity_precision.insert(entity.clone(), *p);
        entity_recall.insert(entity.clone(), *r);
        entity_support.insert(entity.clone(), *support);
    }

    let mistakes = records
        .iter()
        .flat_map(|r| r.mismatches.iter().cloned())
        .collect();

    Ok(EvaluationResult {
        pii_precision,
        pii_recall,
        pii_f,
        beta,
        entity_precision,
        entity_recall,
        entity_support,
        confusion,
        mistakes,
        diagnostics,
    })
}

/**
This module gives a few tools to prettyprint the metrics of a run and the mistakes of the model.
*/
use crate::evaluator::MismatchKind;
use crate::metrics::{f_beta, EvaluationResult};
use enum_iterator::all;
use itertools::multizip;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Name of the row holding the binary PII/non-PII metrics.
pub const PII_CLASS: &str = "PII";

/// Metrics of a single class. Acts as a line of a dataframe when displayed; undefined metrics are
/// written `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// `PII`, or an entity type such as "PERSON".
    pub class: String,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub fscore: Option<f64>,
    /// Number of true tokens of the class.
    pub support: usize,
}

struct Metric(Option<f64>);

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "NaN"),
        }
    }
}

impl Display for ClassMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.class,
            Metric(self.precision),
            Metric(self.recall),
            Metric(self.fscore),
            self.support
        )
    }
}

impl EvaluationResult {
    /// One row for the binary PII view, followed by one row per entity type in alphabetical
    /// order.
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let pii_support = self.entity_support.values().sum();
        let mut rows = vec![ClassMetrics {
            class: String::from(PII_CLASS),
            precision: self.pii_precision,
            recall: self.pii_recall,
            fscore: self.pii_f,
            support: pii_support,
        }];
        for ((class, precision), recall, support) in multizip((
            self.entity_precision.iter(),
            self.entity_recall.values(),
            self.entity_support.values(),
        )) {
            rows.push(ClassMetrics {
                class: class.clone(),
                precision: *precision,
                recall: *recall,
                fscore: f_beta(*precision, *recall, self.beta),
                support: *support,
            });
        }
        rows
    }

    /// Listing of the mistakes of the run, see `MistakeListing`.
    pub fn mistake_listing(&self, limit: usize) -> MistakeListing<'_> {
        MistakeListing {
            result: self,
            limit,
        }
    }
}

/// The result acts as a dataframe when displayed.
///
/// ```rust
/// use pii_eval::{calculate_score, evaluate_sample, InputSample};
///
/// let sample = InputSample::new(
///     "Call Ana now",
///     vec!["Call", "Ana", "now"],
///     vec!["O", "U-PERSON", "O"],
/// );
/// let prediction = vec!["O", "U-PERSON", "U-PHONE_NUMBER"];
/// let record = evaluate_sample(0, &sample, &prediction, None).unwrap();
/// let result = calculate_score(&[record], 1.0).unwrap();
///
/// let expected_report = "Class, Precision, Recall, Fscore, Support
/// PII, 0.5, 1, 0.6666666666666666, 1
/// PERSON, 1, 1, 1, 1
/// PHONE_NUMBER, 0, NaN, NaN, 0\n";
///
/// assert_eq!(expected_report, result.to_string());
/// ```
impl Display for EvaluationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        for row in self.class_metrics() {
            writeln!(f, "{}", row)?
        }
        Ok(())
    }
}

fn kind_title(kind: MismatchKind) -> &'static str {
    match kind {
        MismatchKind::FalsePositive => "False positives",
        MismatchKind::FalseNegative => "False negatives",
        MismatchKind::WrongEntity => "Other mistakes",
    }
}

/// Verbose listing of the mistakes, grouped by kind. For every kind, the most common tokens and
/// the first `limit` mistakes are listed.
pub struct MistakeListing<'a> {
    result: &'a EvaluationResult,
    limit: usize,
}

impl Display for MistakeListing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for kind in all::<MismatchKind>() {
            let total = self.result.mistakes_of_kind(kind).count();
            writeln!(f, "{} ({}):", kind_title(kind), total)?;
            if total == 0 {
                continue;
            }
            writeln!(f, "Most common tokens:")?;
            for (token, count) in self.result.most_common_tokens(kind, self.limit) {
                writeln!(f, "\t{}: {}", token, count)?;
            }
            writeln!(f, "Examples:")?;
            for mistake in self.result.mistakes_of_kind(kind).take(self.limit) {
                writeln!(f, "\t{}", mistake)?;
            }
        }
        if !self.result.diagnostics.is_empty() {
            writeln!(f, "Excluded documents ({}):", self.result.diagnostics.len())?;
            for diagnostic in self.result.diagnostics.iter() {
                writeln!(f, "\t{}", diagnostic)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Diagnostic, EvaluationError};
    use crate::evaluator::evaluate_sample;
    use crate::metrics::calculate_score_with_diagnostics;
    use crate::sample::InputSample;

    fn build_result() -> EvaluationResult {
        let sample = InputSample::new(
            "Ana called Bob",
            vec!["Ana", "called", "Bob"],
            vec!["U-PERSON", "O", "U-PERSON"],
        );
        let record = evaluate_sample(0, &sample, &["U-PERSON", "U-LOCATION", "O"], None).unwrap();
        let diagnostics = vec![Diagnostic::new(
            1,
            EvaluationError::PredictionLengthMismatch {
                sample_id: 1,
                expected: 2,
                actual: 0,
            },
        )];
        calculate_score_with_diagnostics(&[record], diagnostics, 1.0).unwrap()
    }

    #[test]
    fn test_class_metrics() {
        let rows = build_result().class_metrics();
        let classes: Vec<_> = rows.iter().map(|r| r.class.as_str()).collect();
        assert_eq!(classes, vec!["PII", "LOCATION", "PERSON"]);
        assert_eq!(rows[0].support, 2);
        assert_eq!(rows[1].precision, Some(0.0));
        assert_eq!(rows[1].recall, None);
        assert_eq!(rows[1].fscore, None);
        assert_eq!(rows[2].to_string(), "PERSON, 1, 0.5, 0.6666666666666666, 2");
    }

    #[test]
    fn test_mistake_listing() {
        let result = build_result();
        let listing = result.mistake_listing(10).to_string();
        let expected = "False negatives (1):
Most common tokens:
\tBob: 1
Examples:
\tType: FN, Annotation = PERSON, Prediction = O, Token = Bob, Document = 0, Full text = Ana called Bob
False positives (1):
Most common tokens:
\tcalled: 1
Examples:
\tType: FP, Annotation = O, Prediction = LOCATION, Token = called, Document = 0, Full text = Ana called Bob
Other mistakes (0):
Excluded documents (1):
\tExcluded document 1: Prediction for document 1 has 0 labels, expected 2
";
        assert_eq!(listing, expected);
    }
}

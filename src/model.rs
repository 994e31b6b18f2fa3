/**
Contract of the models under test, with the variants shipped by the crate. A model receives a
document and returns one label per token. Variants are interchangeable: the evaluator only sees the
`Model` trait.
*/
use crate::error::Result;
use crate::labels::{labels_from_spans, LabelingScheme, TokenSpan, OUTSIDE};
use crate::sample::InputSample;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Options forwarded to the model on every call. The mock variants ignore them; they are read by
/// `RecognizerModel`:
///
/// * `labeling_scheme`: scheme of the returned labels.
/// * `score_threshold`: detections with a lower score are discarded.
/// * `entities`: only these entity types are requested from the recognizer and kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictOptions {
    pub labeling_scheme: LabelingScheme,
    pub score_threshold: f64,
    pub entities: Option<Vec<String>>,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            labeling_scheme: LabelingScheme::BILUO,
            score_threshold: 0.0,
            entities: None,
        }
    }
}

pub trait Model {
    /// Predicts one label per token of `sample`.
    fn predict(&self, sample: &InputSample, options: &PredictOptions) -> Result<Vec<String>>;

    /// Predicts every sample, in order. Exactly one outcome is returned per sample, failures
    /// included: the evaluator reports a failed document in its diagnostics.
    fn batch_predict(
        &self,
        samples: &[InputSample],
        options: &PredictOptions,
    ) -> Vec<Result<Vec<String>>> {
        samples
            .iter()
            .map(|sample| self.predict(sample, options))
            .collect()
    }
}

impl<M: Model + ?Sized> Model for &M {
    fn predict(&self, sample: &InputSample, options: &PredictOptions) -> Result<Vec<String>> {
        (**self).predict(sample, options)
    }
    fn batch_predict(
        &self,
        samples: &[InputSample],
        options: &PredictOptions,
    ) -> Vec<Result<Vec<String>>> {
        (**self).batch_predict(samples, options)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn predict(&self, sample: &InputSample, options: &PredictOptions) -> Result<Vec<String>> {
        (**self).predict(sample, options)
    }
    fn batch_predict(
        &self,
        samples: &[InputSample],
        options: &PredictOptions,
    ) -> Vec<Result<Vec<String>>> {
        (**self).batch_predict(samples, options)
    }
}

/// Always predicts the ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityModel;

impl Model for IdentityModel {
    fn predict(&self, sample: &InputSample, _options: &PredictOptions) -> Result<Vec<String>> {
        Ok(sample.tags.clone())
    }
}

/// Predicts nothing (all `O`) on odd calls and the ground truth on even calls, counting from one.
#[derive(Debug, Default)]
pub struct AlternatingIdentityModel {
    calls: AtomicUsize,
}

impl AlternatingIdentityModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Model for AlternatingIdentityModel {
    fn predict(&self, sample: &InputSample, _options: &PredictOptions) -> Result<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 2 == 0 {
            Ok(sample.tags.clone())
        } else {
            Ok(vec![String::from(OUTSIDE); sample.tags.len()])
        }
    }
}

/// Returns the same prediction for every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedPredictionModel {
    prediction: Vec<String>,
}

impl FixedPredictionModel {
    pub fn new<S: Into<String>>(prediction: Vec<S>) -> Self {
        Self {
            prediction: prediction.into_iter().map(Into::into).collect(),
        }
    }
}

impl Model for FixedPredictionModel {
    fn predict(&self, _sample: &InputSample, _options: &PredictOptions) -> Result<Vec<String>> {
        Ok(self.prediction.clone())
    }
}

/// A detection returned by a recognizer. `start` and `end` are character offsets, `end` is
/// exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

impl RecognizedSpan {
    pub fn new(entity_type: impl Into<String>, start: usize, end: usize, score: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
            score,
        }
    }
}

/// A live PII recognizer working on raw text.
pub trait SpanRecognizer {
    /// Returns the detections found in `text`. `entities`, when given, lists the requested types.
    fn recognize(&self, text: &str, entities: Option<&[String]>) -> Result<Vec<RecognizedSpan>>;
}

/// Wraps a `SpanRecognizer` into a `Model`: detections are filtered, renamed into the dataset
/// vocabulary and projected onto the tokens of the sample. When detections overlap, the one with
/// the higher score is kept.
#[derive(Debug, Clone)]
pub struct RecognizerModel<R> {
    recognizer: R,
    /// Recognizer output type -> dataset type.
    entity_mapping: AHashMap<String, String>,
}

impl<R: SpanRecognizer> RecognizerModel<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            entity_mapping: AHashMap::default(),
        }
    }

    /// Renames the recognizer output type `from` into `to`.
    pub fn map_entity(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.entity_mapping.insert(from.into(), to.into());
        self
    }

    fn dataset_type<'a>(&'a self, entity_type: &'a str) -> &'a str {
        self.entity_mapping
            .get(entity_type)
            .map(String::as_str)
            .unwrap_or(entity_type)
    }
}

impl<R: SpanRecognizer> Model for RecognizerModel<R> {
    fn predict(&self, sample: &InputSample, options: &PredictOptions) -> Result<Vec<String>> {
        let mut detections = self
            .recognizer
            .recognize(&sample.full_text, options.entities.as_deref())?;
        detections.retain(|d| d.score >= options.score_threshold);
        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        let offsets = sample.token_offsets();
        let mut kept: Vec<TokenSpan> = Vec::with_capacity(detections.len());
        for detection in detections.iter() {
            let entity_type = self.dataset_type(&detection.entity_type);
            let requested = options
                .entities
                .as_ref()
                .map_or(true, |entities| entities.iter().any(|e| e == entity_type));
            if !requested {
                continue;
            }
            let Some(span) =
                sample.covering_tokens(&offsets, entity_type, detection.start, detection.end)
            else {
                continue;
            };
            let overlaps = kept
                .iter()
                .any(|k| k.start < span.end && span.start < k.end);
            if !overlaps {
                kept.push(span);
            }
        }
        Ok(labels_from_spans(
            sample.tokens.len(),
            &kept,
            options.labeling_scheme,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::EvaluationError;

    fn build_sample() -> InputSample {
        InputSample::new(
            "Dan Brown lives in Berlin",
            vec!["Dan", "Brown", "lives", "in", "Berlin"],
            vec!["B-PERSON", "L-PERSON", "O", "O", "U-LOCATION"],
        )
    }

    /// Finds fixed words in the text.
    struct DictionaryRecognizer {
        entries: Vec<(&'static str, &'static str, f64)>,
    }

    impl SpanRecognizer for DictionaryRecognizer {
        fn recognize(
            &self,
            text: &str,
            _entities: Option<&[String]>,
        ) -> Result<Vec<RecognizedSpan>> {
            Ok(self
                .entries
                .iter()
                .filter_map(|(word, entity_type, score)| {
                    let byte_start = text.find(word)?;
                    let start = text[..byte_start].chars().count();
                    Some(RecognizedSpan::new(
                        *entity_type,
                        start,
                        start + word.chars().count(),
                        *score,
                    ))
                })
                .collect())
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn predict(&self, sample: &InputSample, _options: &PredictOptions) -> Result<Vec<String>> {
            match sample.sample_id {
                Some(1) => Err(EvaluationError::model(1, "backend unavailable")),
                _ => Ok(sample.tags.clone()),
            }
        }
    }

    #[test]
    fn test_identity_model() {
        let sample = build_sample();
        let prediction = IdentityModel.predict(&sample, &PredictOptions::default());
        assert_eq!(prediction, Ok(sample.tags.clone()));
    }

    #[test]
    fn test_alternating_identity_model() {
        let sample = build_sample();
        let model = AlternatingIdentityModel::new();
        let predictions = model.batch_predict(
            &[sample.clone(), sample.clone(), sample.clone()],
            &PredictOptions::default(),
        );
        let outside = vec![String::from("O"); 5];
        assert_eq!(predictions[0], Ok(outside.clone()));
        assert_eq!(predictions[1], Ok(sample.tags.clone()));
        assert_eq!(predictions[2], Ok(outside));
    }

    #[test]
    fn test_fixed_prediction_model() {
        let model = FixedPredictionModel::new(vec!["O", "U-PERSON"]);
        let prediction = model.predict(&build_sample(), &PredictOptions::default());
        assert_eq!(prediction, Ok(vec![String::from("O"), String::from("U-PERSON")]));
    }

    #[test]
    fn test_batch_predict_keeps_failures() {
        let samples: Vec<_> = (0..3).map(|i| build_sample().with_sample_id(i)).collect();
        let predictions = FailingModel.batch_predict(&samples, &PredictOptions::default());
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0], Ok(samples[0].tags.clone()));
        assert_eq!(
            predictions[1],
            Err(EvaluationError::model(1, "backend unavailable"))
        );
        assert_eq!(predictions[2], Ok(samples[2].tags.clone()));
    }

    #[test]
    fn test_recognizer_model() {
        let recognizer = DictionaryRecognizer {
            entries: vec![("Dan Brown", "PER", 0.85), ("Berlin", "LOCATION", 0.6)],
        };
        let model = RecognizerModel::new(recognizer).map_entity("PER", "PERSON");
        let sample = build_sample();
        let prediction = model.predict(&sample, &PredictOptions::default()).unwrap();
        assert_eq!(prediction, sample.tags);

        let options = PredictOptions {
            labeling_scheme: LabelingScheme::IO,
            score_threshold: 0.7,
            entities: None,
        };
        let prediction = model.predict(&sample, &options).unwrap();
        assert_eq!(prediction, vec!["PERSON", "PERSON", "O", "O", "O"]);

        let options = PredictOptions {
            entities: Some(vec![String::from("LOCATION")]),
            ..Default::default()
        };
        let prediction = model.predict(&sample, &options).unwrap();
        assert_eq!(prediction, vec!["O", "O", "O", "O", "U-LOCATION"]);
    }

    #[test]
    fn test_recognizer_model_overlaps() {
        let recognizer = DictionaryRecognizer {
            entries: vec![("Brown", "ORGANIZATION", 0.4), ("Dan Brown", "PERSON", 0.9)],
        };
        let model = RecognizerModel::new(recognizer);
        let prediction = model
            .predict(&build_sample(), &PredictOptions::default())
            .unwrap();
        assert_eq!(prediction, vec!["B-PERSON", "L-PERSON", "O", "O", "O"]);
    }
}

use pii_eval::{
    align_samples, score_model, AliasMap, EvaluationError, Evaluator, EvaluatorConfig,
    EvaluatorConfigBuilder, IdentityModel, InputSample, MismatchKind, Model, PredictOptions,
    RecognizedSpan, RecognizerModel, SpanRecognizer,
};
use serde_jsonlines::json_lines;

pub trait CloseEnough {
    fn are_close(&self, other: &Self, eps: f64) -> bool;
}

impl CloseEnough for Option<f64> {
    fn are_close(&self, other: &Self, eps: f64) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => (a - b).abs() < eps,
            (None, None) => true,
            _ => false,
        }
    }
}

fn load_samples() -> Vec<InputSample> {
    json_lines::<InputSample, _>("tests/data/samples.jsonl")
        .expect("file samples.jsonl not found in test directory")
        .map(|r| r.unwrap())
        .collect()
}

fn aligned_samples() -> Vec<InputSample> {
    let alignment = align_samples(&load_samples(), &AliasMap::pii_defaults()).unwrap();
    alignment.samples
}

/// Finds the first occurrence of fixed strings in the text, at character offsets.
struct KeywordRecognizer;

impl SpanRecognizer for KeywordRecognizer {
    fn recognize(
        &self,
        text: &str,
        _entities: Option<&[String]>,
    ) -> pii_eval::Result<Vec<RecognizedSpan>> {
        let keywords = [
            ("Dan Brown", "PER", 0.9),
            ("Ana", "PER", 0.8),
            ("Paris", "LOCATION", 0.3),
            ("555-0199", "PHONE_NUMBER", 0.7),
            ("today", "DATE_TIME", 0.6),
        ];
        Ok(keywords
            .iter()
            .filter_map(|(keyword, entity_type, score)| {
                let byte_start = text.find(keyword)?;
                let start = text[..byte_start].chars().count();
                Some(RecognizedSpan::new(
                    *entity_type,
                    start,
                    start + keyword.chars().count(),
                    *score,
                ))
            })
            .collect())
    }
}

fn recognizer_model() -> RecognizerModel<KeywordRecognizer> {
    RecognizerModel::new(KeywordRecognizer).map_entity("PER", "PERSON")
}

/// Predicts `O` for every token.
struct SilentModel;

impl Model for SilentModel {
    fn predict(
        &self,
        sample: &InputSample,
        _options: &PredictOptions,
    ) -> pii_eval::Result<Vec<String>> {
        Ok(vec![String::from("O"); sample.tokens.len()])
    }
}

#[test]
fn alignment_of_the_fixture() {
    let alignment = align_samples(&load_samples(), &AliasMap::pii_defaults()).unwrap();
    assert_eq!(alignment.samples.len(), 5);
    assert_eq!(alignment.rejected.len(), 1);
    assert_eq!(alignment.rejected[0].sample_id, 5);
    assert_eq!(
        alignment.samples[1].tags,
        vec!["O", "U-PERSON", "O", "O", "U-LOCATION"]
    );
    assert_eq!(alignment.samples[3].tags[2], "U-EMAIL_ADDRESS");
    let ids: Vec<_> = alignment.samples.iter().map(|s| s.sample_id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
}

#[test]
fn identity_model_is_perfect() {
    let result = score_model(IdentityModel, &aligned_samples(), EvaluatorConfig::default()).unwrap();
    assert_eq!(result.pii_precision, Some(1.0));
    assert_eq!(result.pii_recall, Some(1.0));
    assert!(result.pii_f.are_close(&Some(1.0), 1e-12));
    assert!(result.mistakes.is_empty());
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.entity_support["PERSON"], 3);
    assert_eq!(result.entity_support["LOCATION"], 1);
    assert_eq!(result.entity_support["PHONE_NUMBER"], 1);
    assert_eq!(result.entity_support["EMAIL_ADDRESS"], 1);
    assert_eq!(result.confusion.get("PERSON", "PERSON"), 3);
}

#[test]
fn silent_model_misses_everything() {
    let result = score_model(SilentModel, &aligned_samples(), EvaluatorConfig::default()).unwrap();
    assert_eq!(result.pii_precision, None);
    assert_eq!(result.pii_recall, Some(0.0));
    assert_eq!(result.pii_f, None);
    assert_eq!(result.mistakes_of_kind(MismatchKind::FalseNegative).count(), 6);
    assert!(result
        .entity_recall
        .values()
        .all(|recall| *recall == Some(0.0)));
    assert!(result
        .entity_precision
        .values()
        .all(|precision| precision.is_none()));
}

#[test]
fn recognizer_model_scores() {
    let config = EvaluatorConfigBuilder::default()
        .beta(1.0)
        .score_threshold(0.5)
        .verbose(true)
        .build();
    let result = score_model(recognizer_model(), &aligned_samples(), config).unwrap();

    assert!(result.pii_precision.are_close(&Some(0.8), 1e-12));
    assert!(result.pii_recall.are_close(&Some(4.0 / 6.0), 1e-12));
    assert!(result
        .pii_f
        .are_close(&Some(2.0 * 0.8 * (4.0 / 6.0) / (0.8 + 4.0 / 6.0)), 1e-12));

    assert_eq!(result.entity_precision["PERSON"], Some(1.0));
    assert_eq!(result.entity_recall["PERSON"], Some(1.0));
    assert_eq!(result.entity_recall["LOCATION"], Some(0.0));
    assert_eq!(result.entity_precision["LOCATION"], None);
    assert_eq!(result.entity_precision["DATE_TIME"], Some(0.0));
    assert_eq!(result.entity_recall["DATE_TIME"], None);
    assert_eq!(result.entity_support["DATE_TIME"], 0);

    let missed: Vec<_> = result
        .mistakes_of_kind(MismatchKind::FalseNegative)
        .map(|m| m.token.as_str())
        .collect();
    assert_eq!(missed, vec!["Paris", "ana@example.com"]);
    assert_eq!(
        result.most_common_tokens(MismatchKind::FalsePositive, 10),
        vec![(String::from("today"), 1)]
    );
    assert_eq!(result.mistakes_of_kind(MismatchKind::WrongEntity).count(), 0);
}

#[test]
fn recognizer_offsets_are_characters() {
    let sample = InputSample::new(
        "Łódź Ana today",
        vec!["Łódź", "Ana", "today"],
        vec!["O", "U-PERSON", "O"],
    );
    let prediction = recognizer_model()
        .predict(&sample, &PredictOptions::default())
        .unwrap();
    assert_eq!(prediction, vec!["O", "U-PERSON", "U-DATE_TIME"]);
}

#[test]
fn entities_to_keep_restricts_the_evaluation() {
    let config = EvaluatorConfigBuilder::default()
        .entities_to_keep(["PERSON"])
        .score_threshold(0.5)
        .build();
    let result = score_model(recognizer_model(), &aligned_samples(), config).unwrap();
    assert_eq!(result.pii_precision, Some(1.0));
    assert_eq!(result.pii_recall, Some(1.0));
    assert!(result.mistakes.is_empty());
    let entities: Vec<_> = result.entity_recall.keys().cloned().collect();
    assert_eq!(entities, vec![String::from("PERSON")]);
}

#[test]
fn parallel_evaluation_matches_sequential_evaluation() {
    let samples = aligned_samples();
    let sequential = EvaluatorConfigBuilder::default().parallel(false).build();
    let parallel = EvaluatorConfigBuilder::default().parallel(true).build();
    let expected = score_model(recognizer_model(), &samples, sequential).unwrap();
    let actual = score_model(recognizer_model(), &samples, parallel).unwrap();
    assert_eq!(expected, actual);
}

#[test]
fn malformed_documents_are_reported() {
    let samples = load_samples();
    let evaluator = Evaluator::new(IdentityModel, EvaluatorConfig::default());
    let evaluation = evaluator.evaluate_all(&samples);
    assert_eq!(evaluation.records.len(), 5);
    assert_eq!(evaluation.diagnostics.len(), 1);
    assert_eq!(
        evaluation.diagnostics[0].error,
        EvaluationError::MalformedDocument {
            sample_id: 5,
            tokens: 2,
            tags: 1
        }
    );
    let result = evaluator.calculate_score(&evaluation).unwrap();
    assert_eq!(result.diagnostics, evaluation.diagnostics);
}

#[test]
fn report_output() {
    let config = EvaluatorConfigBuilder::default().beta(1.0).build();
    let result = score_model(IdentityModel, &aligned_samples(), config).unwrap();
    let expected_report = "Class, Precision, Recall, Fscore, Support
PII, 1, 1, 1, 6
EMAIL_ADDRESS, 1, 1, 1, 1
LOCATION, 1, 1, 1, 1
PERSON, 1, 1, 1, 3
PHONE_NUMBER, 1, 1, 1, 1\n";
    assert_eq!(expected_report, result.to_string());
}

#[test]
fn invalid_beta_is_rejected() {
    let config = EvaluatorConfigBuilder::default().beta(-2.0).build();
    let result = score_model(IdentityModel, &aligned_samples(), config);
    assert_eq!(result, Err(EvaluationError::InvalidBeta(-2.0)));
}

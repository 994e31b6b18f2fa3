/*
 * This modules contains the `EvaluatorConfig` struct, which implements the default trait, and its
 * builder. The config is passed to the `Evaluator` or to the `score_model` function to simplify
 * their arguments.
*/
use crate::labels::LabelingScheme;
use crate::metrics::DEFAULT_BETA;
use crate::model::PredictOptions;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of tokens and examples listed per kind of mistake in verbose mode.
pub const DEFAULT_MISTAKE_LIMIT: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Config struct used to simplify the inputs of parameters of the `Evaluator`. It implements the
/// default trait.
pub struct EvaluatorConfig {
    /// Entity types to evaluate. Every other type is treated as `O`, on both sides. `None` keeps
    /// every entity type.
    pub(crate) entities_to_keep: Option<Vec<String>>,
    /// Weight of the recall in the F score. Recall is `beta` times as important as precision.
    pub(crate) beta: f64,
    /// Can we use multiple cores to evaluate the documents? The order of the records is preserved
    /// either way.
    pub(crate) parallel: bool,
    /// Options forwarded to the model.
    pub(crate) predict_options: PredictOptions,
    /// Should `score_model` log the mistakes of the model?
    pub(crate) verbose: bool,
    /// Number of tokens and examples logged per kind of mistake in verbose mode.
    pub(crate) mistake_limit: usize,
}

impl EvaluatorConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn entities_to_keep(&self) -> Option<&[String]> {
        self.entities_to_keep.as_deref()
    }
    pub fn beta(&self) -> f64 {
        self.beta
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
    pub fn predict_options(&self) -> &PredictOptions {
        &self.predict_options
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }
    pub fn mistake_limit(&self) -> usize {
        self.mistake_limit
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            entities_to_keep: None,
            beta: DEFAULT_BETA,
            parallel: false,
            predict_options: PredictOptions::default(),
            verbose: false,
            mistake_limit: DEFAULT_MISTAKE_LIMIT,
        }
    }
}

impl From<EvaluatorConfigBuilder> for EvaluatorConfig {
    fn from(value: EvaluatorConfigBuilder) -> Self {
        value.config
    }
}

impl Display for EvaluatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!("Entities to keep: {:?}\n Beta: {}\n Using parallel computations: {}\n Labeling scheme: {}\n Score threshold: {}\n Requested entities: {:?}\n Verbose: {}", self.entities_to_keep, self.beta, self.parallel, self.predict_options.labeling_scheme, self.predict_options.score_threshold, self.predict_options.entities, self.verbose);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize an `EvaluatorConfig` structure.
#[derive(Clone, Debug, Default)]
pub struct EvaluatorConfigBuilder {
    config: EvaluatorConfig,
}

impl EvaluatorConfigBuilder {
    pub fn entities_to_keep<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.entities_to_keep = Some(entities.into_iter().map(Into::into).collect());
        self
    }
    pub fn beta(mut self, beta: f64) -> Self {
        self.config.beta = beta;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }
    pub fn predict_options(mut self, predict_options: PredictOptions) -> Self {
        self.config.predict_options = predict_options;
        self
    }
    pub fn labeling_scheme(mut self, scheme: LabelingScheme) -> Self {
        self.config.predict_options.labeling_scheme = scheme;
        self
    }
    pub fn score_threshold(mut self, score_threshold: f64) -> Self {
        self.config.predict_options.score_threshold = score_threshold;
        self
    }
    /// Entity types requested from the model.
    pub fn requested_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.predict_options.entities = Some(entities.into_iter().map(Into::into).collect());
        self
    }
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }
    pub fn mistake_limit(mut self, mistake_limit: usize) -> Self {
        self.config.mistake_limit = mistake_limit;
        self
    }
    pub fn new() -> Self {
        Self::default()
    }
    pub fn build(self) -> EvaluatorConfig {
        EvaluatorConfig::from(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use enum_iterator::all;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = EvaluatorConfig::default();
        assert_eq!(config.beta(), 2.5);
        assert_eq!(config.entities_to_keep(), None);
        assert!(!config.parallel());
        assert!(!config.verbose());
        assert_eq!(config.predict_options().labeling_scheme, LabelingScheme::BILUO);
        assert_eq!(config, EvaluatorConfigBuilder::new().build());
    }

    #[rstest]
    #[case(0.5)]
    #[case(1.0)]
    #[case(2.5)]
    fn test_builder_setters_beta(#[case] beta: f64) {
        let builder = EvaluatorConfigBuilder::default();
        let config = builder.beta(beta).build();
        assert_eq!(config.beta, beta)
    }

    #[test]
    fn test_builder_setters_entities_to_keep() {
        let builder = EvaluatorConfigBuilder::default();
        let config = builder.entities_to_keep(["PERSON", "LOCATION"]).build();
        assert_eq!(
            config.entities_to_keep(),
            Some(&[String::from("PERSON"), String::from("LOCATION")][..])
        )
    }

    #[test]
    fn test_builder_setters_labeling_scheme() {
        for scheme in all::<LabelingScheme>() {
            let builder = EvaluatorConfigBuilder::default();
            let config = builder.labeling_scheme(scheme).build();
            assert_eq!(config.predict_options.labeling_scheme, scheme)
        }
    }

    #[test]
    fn test_builder_setters_predict_options() {
        let config = EvaluatorConfigBuilder::default()
            .score_threshold(0.4)
            .requested_entities(vec![String::from("EMAIL_ADDRESS")])
            .build();
        assert_eq!(config.predict_options.score_threshold, 0.4);
        assert_eq!(
            config.predict_options.entities,
            Some(vec![String::from("EMAIL_ADDRESS")])
        );
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_parallel(#[case] parallel: bool) {
        let builder = EvaluatorConfigBuilder::default();
        let config = builder.parallel(parallel).build();
        assert_eq!(config.parallel, parallel)
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_verbose(#[case] verbose: bool) {
        let builder = EvaluatorConfigBuilder::default();
        let config = builder.verbose(verbose).mistake_limit(5).build();
        assert_eq!(config.verbose, verbose);
        assert_eq!(config.mistake_limit, 5)
    }

    #[test]
    fn test_display() {
        let config = EvaluatorConfig::default().to_string();
        assert!(config.starts_with("Entities to keep: None\n Beta: 2.5\n"));
    }
}

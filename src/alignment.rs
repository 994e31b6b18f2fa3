/**
Alignment of the ground-truth entity types of a dataset onto the vocabulary of the model under
test. Every rename target is a fixed point and chained aliases are rejected when the map is built,
which makes alignment idempotent.
*/
use crate::error::{Diagnostic, EvaluationError, Result};
use crate::labels::{entity_type, with_entity_type, OUTSIDE};
use crate::sample::{InputSample, Span};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

/// What a dataset entity type becomes in the target vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityAlias {
    Rename(String),
    /// The type is not supported by the target vocabulary. Its labels become `O` and its spans are
    /// dropped.
    Ignore,
}

/// Policy applied to entity types which have no alias.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnknownEntityPolicy {
    /// Keep the original name.
    #[default]
    PassThrough,
    /// Treat the type as unsupported.
    Ignore,
    /// Fail with `EvaluationError::UnknownEntityAlias`.
    Strict,
}

/// Renaming table between a dataset's entity vocabulary and a model's vocabulary.
///
/// ```rust
/// use pii_eval::{align, AliasMap, InputSample};
///
/// let aliases = AliasMap::try_from_pairs([("PER", "PERSON"), ("TITLE", "O")]).unwrap();
/// let sample = InputSample::new(
///     "Dr. Ana",
///     vec!["Dr.", "Ana"],
///     vec!["U-TITLE", "U-PER"],
/// );
/// let aligned = align(&sample, &aliases).unwrap();
/// assert_eq!(aligned.tags, vec!["O", "U-PERSON"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    aliases: AHashMap<String, EntityAlias>,
    targets: AHashSet<String>,
    unknown: UnknownEntityPolicy,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from `(dataset type, target type)` pairs. A target equal to `"O"` marks the
    /// dataset type as ignored.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |map, (from, to)| map.rename(from, to))
    }

    /// Adds an alias. Fails if it would chain with an existing alias. A rename to `O` is stored as
    /// `EntityAlias::Ignore`.
    pub fn insert(mut self, from: impl Into<String>, alias: EntityAlias) -> Result<Self> {
        let from = from.into();
        let alias = match alias {
            EntityAlias::Rename(to) if to == OUTSIDE => EntityAlias::Ignore,
            alias => alias,
        };
        self.check_chain(&from, &alias)?;
        if let EntityAlias::Rename(to) = &alias {
            self.targets.insert(to.clone());
        }
        self.aliases.insert(from, alias);
        Ok(self)
    }

    pub fn rename(self, from: impl Into<String>, to: impl Into<String>) -> Result<Self> {
        self.insert(from, EntityAlias::Rename(to.into()))
    }

    pub fn ignore(self, from: impl Into<String>) -> Result<Self> {
        self.insert(from, EntityAlias::Ignore)
    }

    pub fn unknown_policy(mut self, policy: UnknownEntityPolicy) -> Self {
        self.unknown = policy;
        self
    }

    pub fn policy(&self) -> UnknownEntityPolicy {
        self.unknown
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn check_chain(&self, from: &str, alias: &EntityAlias) -> Result<()> {
        if let EntityAlias::Rename(to) = alias {
            let target_moves = match self.aliases.get(to) {
                Some(EntityAlias::Rename(next)) => next != to,
                Some(EntityAlias::Ignore) => true,
                None => false,
            };
            if to != from && target_moves {
                return Err(EvaluationError::ChainedAlias {
                    from: String::from(from),
                    to: to.clone(),
                });
            }
        }
        let from_moves = match alias {
            EntityAlias::Rename(to) => to != from,
            EntityAlias::Ignore => true,
        };
        if from_moves {
            let source = self.aliases.iter().find(|(source, target)| {
                source.as_str() != from && matches!(target, EntityAlias::Rename(t) if t == from)
            });
            if let Some((source, _)) = source {
                return Err(EvaluationError::ChainedAlias {
                    from: source.clone(),
                    to: String::from(from),
                });
            }
        }
        Ok(())
    }

    /// Returns the target type of `entity`, or `None` when it must be folded into `O`.
    fn resolve<'a>(&'a self, entity: &'a str, sample_id: usize) -> Result<Option<&'a str>> {
        if entity == OUTSIDE {
            return Ok(None);
        }
        match self.aliases.get(entity) {
            Some(EntityAlias::Rename(to)) => Ok(Some(to.as_str())),
            Some(EntityAlias::Ignore) => Ok(None),
            None if self.targets.contains(entity) => Ok(Some(entity)),
            None => match self.unknown {
                UnknownEntityPolicy::PassThrough => Ok(Some(entity)),
                UnknownEntityPolicy::Ignore => Ok(None),
                UnknownEntityPolicy::Strict => Err(EvaluationError::UnknownEntityAlias {
                    sample_id,
                    entity_type: String::from(entity),
                }),
            },
        }
    }

    /// Default table reconciling common NER dataset vocabularies with a PII vocabulary.
    pub fn pii_defaults() -> Self {
        const RENAMES: [(&str, &str); 32] = [
            ("PERSON", "PERSON"),
            ("PER", "PERSON"),
            ("NAME", "PERSON"),
            ("FIRST_NAME", "PERSON"),
            ("LAST_NAME", "PERSON"),
            ("LOCATION", "LOCATION"),
            ("LOC", "LOCATION"),
            ("GPE", "LOCATION"),
            ("ADDRESS", "LOCATION"),
            ("STREET_ADDRESS", "LOCATION"),
            ("CITY", "LOCATION"),
            ("COUNTRY", "LOCATION"),
            ("ORGANIZATION", "ORGANIZATION"),
            ("ORG", "ORGANIZATION"),
            ("NRP", "NRP"),
            ("NORP", "NRP"),
            ("DATE_TIME", "DATE_TIME"),
            ("DATE", "DATE_TIME"),
            ("TIME", "DATE_TIME"),
            ("BIRTHDAY", "DATE_TIME"),
            ("EMAIL_ADDRESS", "EMAIL_ADDRESS"),
            ("EMAIL", "EMAIL_ADDRESS"),
            ("PHONE_NUMBER", "PHONE_NUMBER"),
            ("PHONE", "PHONE_NUMBER"),
            ("CREDIT_CARD", "CREDIT_CARD"),
            ("IBAN_CODE", "IBAN_CODE"),
            ("US_SSN", "US_SSN"),
            ("SSN", "US_SSN"),
            ("IP_ADDRESS", "IP_ADDRESS"),
            ("DOMAIN_NAME", "DOMAIN_NAME"),
            ("URL", "DOMAIN_NAME"),
            ("US_DRIVER_LICENSE", "US_DRIVER_LICENSE"),
        ];
        const IGNORED: [&str; 3] = ["TITLE", "PREFIX", "JOB_TITLE"];
        let mut aliases: AHashMap<String, EntityAlias> = RENAMES
            .iter()
            .map(|(from, to)| (String::from(*from), EntityAlias::Rename(String::from(*to))))
            .collect();
        aliases.extend(
            IGNORED
                .iter()
                .map(|from| (String::from(*from), EntityAlias::Ignore)),
        );
        let targets = RENAMES.iter().map(|(_, to)| String::from(*to)).collect();
        Self {
            aliases,
            targets,
            unknown: UnknownEntityPolicy::PassThrough,
        }
    }
}

/// Rewrites the ground-truth entity types of `sample` according to `aliases`.
pub fn align(sample: &InputSample, aliases: &AliasMap) -> Result<InputSample> {
    align_with_id(sample, aliases, sample.sample_id.unwrap_or_default())
}

fn align_with_id(sample: &InputSample, aliases: &AliasMap, sample_id: usize) -> Result<InputSample> {
    sample.validate(sample_id)?;
    let tags = sample
        .tags
        .iter()
        .map(|tag| {
            let current = entity_type(tag);
            match aliases.resolve(current, sample_id)? {
                Some(target) if target == current => Ok(tag.clone()),
                Some(target) => Ok(with_entity_type(tag, target)),
                None => Ok(String::from(OUTSIDE)),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    let mut spans = Vec::with_capacity(sample.spans.len());
    for span in sample.spans.iter() {
        if let Some(target) = aliases.resolve(&span.entity_type, sample_id)? {
            spans.push(Span {
                entity_type: String::from(target),
                ..span.clone()
            });
        }
    }
    Ok(InputSample {
        tags,
        spans,
        ..sample.clone()
    })
}

/// Output of `align_samples`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// Aligned documents, in input order. Each carries its `sample_id`.
    pub samples: Vec<InputSample>,
    /// Malformed documents which were excluded.
    pub rejected: Vec<Diagnostic>,
}

/// Aligns every sample. Documents without a `sample_id` receive their position in `samples`.
/// Malformed documents are excluded and reported; in strict mode an unknown entity type aborts
/// the whole batch.
pub fn align_samples(samples: &[InputSample], aliases: &AliasMap) -> Result<Alignment> {
    let mut alignment = Alignment {
        samples: Vec::with_capacity(samples.len()),
        rejected: vec![],
    };
    for (position, sample) in samples.iter().enumerate() {
        let sample_id = sample.sample_id.unwrap_or(position);
        match align_with_id(sample, aliases, sample_id) {
            Ok(mut aligned) => {
                aligned.sample_id = Some(sample_id);
                alignment.samples.push(aligned)
            }
            Err(error @ EvaluationError::MalformedDocument { .. }) => {
                log::warn!("{}", error);
                alignment.rejected.push(Diagnostic::new(sample_id, error));
            }
            Err(error) => return Err(error),
        }
    }
    log::debug!(
        "Aligned {} samples, rejected {}",
        alignment.samples.len(),
        alignment.rejected.len()
    );
    Ok(alignment)
}

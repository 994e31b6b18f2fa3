/**
This module holds the documents evaluated by the crate. A document (`InputSample`) carries its
tokens, one ground-truth label per token and the annotated entity spans.
*/
use crate::error::{EvaluationError, Result};
use crate::labels::{decode_spans, labels_from_spans, LabelingScheme, TokenSpan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An annotated entity. Positions are character offsets into the full text, `end_position` is
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub entity_type: String,
    pub entity_value: String,
    pub start_position: usize,
    pub end_position: usize,
}

impl Span {
    pub fn new(
        entity_type: impl Into<String>,
        entity_value: impl Into<String>,
        start_position: usize,
        end_position: usize,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_value: entity_value.into(),
            start_position,
            end_position,
        }
    }
}

/// A labeled document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSample {
    pub full_text: String,
    pub tokens: Vec<String>,
    /// Character offset of each token in `full_text`. Derived from the text when absent.
    #[serde(default)]
    pub token_offsets: Option<Vec<usize>>,
    /// Ground-truth labels, one per token.
    pub tags: Vec<String>,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub sample_id: Option<usize>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl InputSample {
    /// Builds a sample from its tokens and labels. The spans are derived from the labels.
    pub fn new<T, L>(full_text: impl Into<String>, tokens: Vec<T>, tags: Vec<L>) -> Self
    where
        T: Into<String>,
        L: Into<String>,
    {
        let mut sample = Self {
            full_text: full_text.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        sample.spans = sample.spans_from_tags();
        sample
    }

    /// Builds a sample from its tokens and annotated spans. The labels are obtained by projecting
    /// every span onto the tokens it overlaps, written in `scheme`.
    pub fn from_spans<T: Into<String>>(
        full_text: impl Into<String>,
        tokens: Vec<T>,
        spans: Vec<Span>,
        scheme: LabelingScheme,
    ) -> Self {
        let mut sample = Self {
            full_text: full_text.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            spans,
            ..Default::default()
        };
        let offsets = sample.token_offsets();
        let token_spans: Vec<TokenSpan> = sample
            .spans
            .iter()
            .filter_map(|s| {
                sample.covering_tokens(&offsets, &s.entity_type, s.start_position, s.end_position)
            })
            .collect();
        sample.tags = labels_from_spans(sample.tokens.len(), &token_spans, scheme);
        sample
    }

    pub fn with_sample_id(mut self, sample_id: usize) -> Self {
        self.sample_id = Some(sample_id);
        self
    }

    pub fn with_token_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.token_offsets = Some(offsets);
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Checks that the sample has exactly one label per token.
    pub fn validate(&self, sample_id: usize) -> Result<()> {
        if self.tokens.len() != self.tags.len() {
            return Err(EvaluationError::MalformedDocument {
                sample_id,
                tokens: self.tokens.len(),
                tags: self.tags.len(),
            });
        }
        Ok(())
    }

    /// Character offset of the start of every token. Tokens are searched left to right in the
    /// full text when no offsets were supplied; a token missing from the text is placed at the end
    /// of the previous one.
    pub fn token_offsets(&self) -> Vec<usize> {
        if let Some(offsets) = &self.token_offsets {
            if offsets.len() == self.tokens.len() {
                return offsets.clone();
            }
        }
        let mut offsets = Vec::with_capacity(self.tokens.len());
        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        for token in self.tokens.iter() {
            match self.full_text[byte_cursor..].find(token.as_str()) {
                Some(relative) => {
                    let skipped = &self.full_text[byte_cursor..byte_cursor + relative];
                    char_cursor += skipped.chars().count();
                    offsets.push(char_cursor);
                    byte_cursor += relative + token.len();
                    char_cursor += token.chars().count();
                }
                None => offsets.push(char_cursor),
            }
        }
        offsets
    }

    /// Token range overlapping the character range `[start, end)`.
    pub(crate) fn covering_tokens(
        &self,
        offsets: &[usize],
        entity_type: &str,
        start: usize,
        end: usize,
    ) -> Option<TokenSpan> {
        let mut covered = self
            .tokens
            .iter()
            .zip(offsets.iter())
            .enumerate()
            .filter(|(_, (token, offset))| {
                let token_end = **offset + token.chars().count();
                **offset < end && token_end > start
            })
            .map(|(i, _)| i);
        let first = covered.next()?;
        let last = covered.last().unwrap_or(first);
        Some(TokenSpan::new(entity_type, first, last + 1))
    }

    /// Rebuilds the annotated spans from the labels.
    pub fn spans_from_tags(&self) -> Vec<Span> {
        let offsets = self.token_offsets();
        decode_spans(&self.tags)
            .into_iter()
            .filter(|s| s.end <= self.tokens.len())
            .map(|s| {
                let start = offsets[s.start];
                let last = s.end - 1;
                let end = offsets[last] + self.tokens[last].chars().count();
                let value: String = self
                    .full_text
                    .chars()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .collect();
                Span::new(s.entity_type, value, start, end)
            })
            .collect()
    }
}

/**
This module parses token labels (e.g. `B-PERSON`, `U-EMAIL_ADDRESS`, `LOCATION`, `O`) and converts
label sequences between the labeling schemes supported by the evaluator.
*/
use crate::error::EvaluationError;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::slice::Iter;
use std::str::FromStr;

/// The label used for tokens outside of any entity.
pub const OUTSIDE: &str = "O";

const DELIMITER: char = '-';

#[derive(Debug, PartialEq, Hash, Clone, Copy, Sequence, Eq)]
/// Position of a token inside an entity. All prefixes are a single ascii char.
pub(crate) enum Prefix {
    I,
    O,
    B,
    E,
    S,
    U,
    L,
}

impl TryFrom<char> for Prefix {
    type Error = char;
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'I' => Ok(Self::I),
            'O' => Ok(Self::O),
            'B' => Ok(Self::B),
            'E' => Ok(Self::E),
            'S' => Ok(Self::S),
            'U' => Ok(Self::U),
            'L' => Ok(Self::L),
            c => Err(c),
        }
    }
}

/// A label split into its prefix and its entity type.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct Label<'a> {
    pub(crate) prefix: Prefix,
    pub(crate) tag: &'a str,
}

impl<'a> Label<'a> {
    const OUTSIDE_LABEL: Label<'static> = Label {
        prefix: Prefix::O,
        tag: OUTSIDE,
    };

    /// Parsing never fails. Labels without a recognized `<prefix>-` header are bare entity types
    /// (IO scheme) and are read as inside tokens. The empty string is read as `O`.
    pub(crate) fn parse(label: &'a str) -> Self {
        if label.is_empty() || label == OUTSIDE {
            return Self::OUTSIDE_LABEL;
        }
        let mut chars = label.chars();
        let header = (chars.next().map(Prefix::try_from), chars.next());
        match header {
            (Some(Ok(prefix)), Some(DELIMITER)) if prefix != Prefix::O => {
                // The prefix and the delimiter are ascii, the tag starts at byte 2.
                let tag = &label[2..];
                let tag = if tag.is_empty() { "_" } else { tag };
                Label { prefix, tag }
            }
            _ => Label {
                prefix: Prefix::I,
                tag: label,
            },
        }
    }

    pub(crate) fn is_outside(&self) -> bool {
        self.prefix == Prefix::O
    }
}

/// Returns the entity type of a label, i.e. the label without its positional prefix. Returns `O`
/// for the outside label.
///
/// ```rust
/// use pii_eval::entity_type;
///
/// assert_eq!(entity_type("B-PERSON"), "PERSON");
/// assert_eq!(entity_type("LOCATION"), "LOCATION");
/// assert_eq!(entity_type("O"), "O");
/// ```
pub fn entity_type(label: &str) -> &str {
    Label::parse(label).tag
}

/// Replaces the entity type of `label` while keeping its prefix.
pub(crate) fn with_entity_type(label: &str, new_type: &str) -> String {
    let parsed = Label::parse(label);
    if new_type == OUTSIDE || parsed.is_outside() {
        return String::from(OUTSIDE);
    }
    if parsed.tag.len() == label.len() {
        String::from(new_type)
    } else {
        format!("{}{}", &label[..2], new_type)
    }
}

/// Labeling schemes a label sequence can be written in.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize,
)]
pub enum LabelingScheme {
    /// Inside/Outside: every entity token carries the bare entity type.
    IO,
    /// Begin/Inside/Outside.
    BIO,
    /// Begin/Inside/Last/Unit/Outside.
    #[default]
    BILUO,
}

impl Display for LabelingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for LabelingScheme {
    type Err = EvaluationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IO" => Ok(LabelingScheme::IO),
            "BIO" | "IOB" | "IOB2" => Ok(LabelingScheme::BIO),
            "BILUO" | "BILOU" => Ok(LabelingScheme::BILUO),
            _ => Err(EvaluationError::UnknownLabelingScheme(String::from(s))),
        }
    }
}

/// A contiguous run of tokens belonging to one entity. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenSpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(entity_type: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl Display for TokenSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.entity_type, self.start, self.end)
    }
}

/// Appends a single `"O"` after the labels so the last chunk is always closed.
struct PaddedLabels<'a, S> {
    content: Iter<'a, S>,
    is_at_end: bool,
}

impl<'a, S: AsRef<str>> Iterator for PaddedLabels<'a, S> {
    type Item = &'a str;
    fn next(&mut self) -> Option<Self::Item> {
        match self.content.next() {
            Some(label) => Some(label.as_ref()),
            None if self.is_at_end => None,
            None => {
                self.is_at_end = true;
                Some(OUTSIDE)
            }
        }
    }
}

/// Iterates over a *single* label sequence and returns its chunks. Accepts any mix of prefixes.
struct ChunkIter<'a, S> {
    inner: PaddedLabels<'a, S>,
    prev: Label<'a>,
    begin_offset: usize,
    index: usize,
}

impl<'a, S: AsRef<str>> ChunkIter<'a, S> {
    fn new(labels: &'a [S]) -> Self {
        ChunkIter {
            inner: PaddedLabels {
                content: labels.iter(),
                is_at_end: false,
            },
            prev: Label::OUTSIDE_LABEL,
            begin_offset: 0,
            index: 0,
        }
    }

    /// Checks if a chunk ended between the previous and current label.
    fn end_of_chunk(&self, current: &Label<'a>) -> bool {
        match (self.prev.prefix, current.prefix) {
            (Prefix::E | Prefix::S | Prefix::L | Prefix::U, _) => true,
            (Prefix::B | Prefix::I, Prefix::B | Prefix::S | Prefix::U | Prefix::O) => true,
            (Prefix::O, _) => false,
            _ => self.prev.tag != current.tag,
        }
    }

    /// Checks if a chunk started between the previous and current label.
    fn start_of_chunk(&self, current: &Label<'a>) -> bool {
        match (self.prev.prefix, current.prefix) {
            (_, Prefix::B | Prefix::S | Prefix::U) => true,
            (
                Prefix::E | Prefix::L | Prefix::S | Prefix::U | Prefix::O,
                Prefix::E | Prefix::L | Prefix::I,
            ) => true,
            (_, Prefix::O) => false,
            _ => self.prev.tag != current.tag,
        }
    }
}

impl<'a, S: AsRef<str>> Iterator for ChunkIter<'a, S> {
    type Item = TokenSpan;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = Label::parse(self.inner.next()?); // no more labels. We are done
            let ended = self
                .end_of_chunk(&current)
                .then(|| TokenSpan::new(self.prev.tag, self.begin_offset, self.index));
            if self.start_of_chunk(&current) {
                self.begin_offset = self.index;
            }
            self.prev = current;
            self.index += 1;
            if ended.is_some() {
                return ended;
            }
        }
    }
}

/// Leniently decodes the entity spans of a label sequence, whatever its labeling scheme.
///
/// ```rust
/// use pii_eval::{decode_spans, TokenSpan};
///
/// let spans = decode_spans(&["B-PERSON", "L-PERSON", "O", "U-LOCATION"]);
/// assert_eq!(
///     spans,
///     vec![TokenSpan::new("PERSON", 0, 2), TokenSpan::new("LOCATION", 3, 4)]
/// );
/// ```
pub fn decode_spans<S: AsRef<str>>(labels: &[S]) -> Vec<TokenSpan> {
    ChunkIter::new(labels).collect()
}

/// Writes the labels of one span into `labels`, using the given scheme.
pub(crate) fn write_span(labels: &mut [String], span: &TokenSpan, scheme: LabelingScheme) {
    let len = span.len();
    for (offset, label) in labels[span.start..span.end].iter_mut().enumerate() {
        let prefix = match scheme {
            LabelingScheme::IO => None,
            LabelingScheme::BIO if offset == 0 => Some('B'),
            LabelingScheme::BIO => Some('I'),
            LabelingScheme::BILUO if len == 1 => Some('U'),
            LabelingScheme::BILUO if offset == 0 => Some('B'),
            LabelingScheme::BILUO if offset == len - 1 => Some('L'),
            LabelingScheme::BILUO => Some('I'),
        };
        *label = match prefix {
            Some(p) => format!("{}{}{}", p, DELIMITER, span.entity_type),
            None => span.entity_type.clone(),
        };
    }
}

/// Builds a label sequence of length `len` holding the given spans.
pub(crate) fn labels_from_spans(
    len: usize,
    spans: &[TokenSpan],
    scheme: LabelingScheme,
) -> Vec<String> {
    let mut labels = vec![String::from(OUTSIDE); len];
    for span in spans.iter().filter(|s| !s.is_empty() && s.end <= len) {
        write_span(&mut labels, span, scheme);
    }
    labels
}

/// Rewrites a label sequence into another labeling scheme. Entities are decoded leniently, so
/// the input may use any scheme.
///
/// ```rust
/// use pii_eval::{to_scheme, LabelingScheme};
///
/// let io = ["PERSON", "PERSON", "O", "LOCATION"];
/// assert_eq!(
///     to_scheme(&io, LabelingScheme::BILUO),
///     vec!["B-PERSON", "L-PERSON", "O", "U-LOCATION"]
/// );
/// ```
pub fn to_scheme<S: AsRef<str>>(labels: &[S], scheme: LabelingScheme) -> Vec<String> {
    labels_from_spans(labels.len(), &decode_spans(labels), scheme)
}

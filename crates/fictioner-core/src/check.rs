//! Question/answer consistency rules
//!
//! | kind     | rule                                   | finding                          |
//! |----------|----------------------------------------|----------------------------------|
//! | mention  | none                                   |                                  |
//! | question | same-id question precedes it           | `duplicate question`, info       |
//! | question | no answer anywhere                     | `not answered`, error            |
//! | answer   | same-id answer precedes it             | `duplicate answer`, warning      |
//! | answer   | no same-id question precedes it        | `no question before answer`, error |
//!
//! Rules for a kind are evaluated top to bottom and each tag keeps only the
//! last finding that fired.

use std::collections::BTreeMap;

use crate::index::{TagId, TagIndex};
use crate::tag::{Annotation, Severity, Tag, TagKind, TagRange};

pub const DUPLICATE_QUESTION: &str = "duplicate question";
pub const NOT_ANSWERED: &str = "not answered";
pub const DUPLICATE_ANSWER: &str = "duplicate answer";
pub const NO_QUESTION_BEFORE_ANSWER: &str = "no question before answer";

/// One finding, positioned on its tag's token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub tag: TagId,
    pub range: TagRange,
    pub message: String,
    pub severity: Severity,
}

/// Findings grouped by file ordinal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    by_file: BTreeMap<usize, Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Findings for one file, in tag discovery order.
    pub fn for_file(&self, ordinal: usize) -> &[Diagnostic] {
        self.by_file
            .get(&ordinal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Files with findings, in document order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Diagnostic])> {
        self.by_file.iter().map(|(ordinal, d)| (*ordinal, d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_file
            .values()
            .flatten()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

/// Evaluate the rules for one tag against a fully populated index.
pub fn evaluate(tag: &Tag, index: &TagIndex) -> Option<Annotation> {
    let mut finding = None;
    let at = tag.position();
    let mut fire = |message: &str, severity: Severity| {
        finding = Some(Annotation {
            message: message.to_string(),
            severity,
        });
    };

    match tag.kind {
        TagKind::Mention => {}
        TagKind::Question => {
            if index.exists_before(TagKind::Question, &tag.id, at) {
                fire(DUPLICATE_QUESTION, Severity::Info);
            }
            if !index.exists(TagKind::Answer, &tag.id) {
                fire(NOT_ANSWERED, Severity::Error);
            }
        }
        TagKind::Answer => {
            if index.exists_before(TagKind::Answer, &tag.id, at) {
                fire(DUPLICATE_ANSWER, Severity::Warning);
            }
            if !index.exists_before(TagKind::Question, &tag.id, at) {
                fire(NO_QUESTION_BEFORE_ANSWER, Severity::Error);
            }
        }
    }

    finding
}

/// Annotate every tag and collect the findings.
///
/// Tags are visited in discovery order; each tag's slot is overwritten, so a
/// previous annotation never survives.
pub fn check(tags: &mut [Tag], index: &TagIndex) -> Diagnostics {
    let mut by_file: BTreeMap<usize, Vec<Diagnostic>> = BTreeMap::new();

    for (i, tag) in tags.iter_mut().enumerate() {
        tag.annotation = evaluate(tag, index);
        if let Some(annotation) = &tag.annotation {
            by_file.entry(tag.file).or_default().push(Diagnostic {
                tag: TagId(i),
                range: tag.range(),
                message: annotation.message.clone(),
                severity: annotation.severity,
            });
        }
    }

    Diagnostics { by_file }
}

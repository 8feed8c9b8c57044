//! Cursor-driven lookup of related tags
//!
//! From a cursor, find the nearest annotation line at or above it, then list
//! every tag in the corpus sharing an identifier with that line's tokens, in
//! document order. Pure over a snapshot; cheap enough to run on every cursor
//! move.

use std::path::{Path, PathBuf};

use crate::index::TagId;
use crate::snapshot::Snapshot;
use crate::tag::{comment_body, find_tokens, is_annotation_line};

/// How many lines, counting the cursor's own, are searched upward.
pub const LOOKBACK_LINES: usize = 10;

/// A position in an open file (0-indexed line, character column)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    pub fn new(path: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

/// One entry of a related-tag listing
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedRecord {
    /// The annotation line the cursor resolved to
    Current { tag: TagId, position: f64 },
    /// Another place sharing an identifier
    Related {
        tag: TagId,
        path: PathBuf,
        line: usize,
        context: String,
        position: f64,
        line_text: String,
    },
}

impl RelatedRecord {
    pub fn tag(&self) -> TagId {
        match self {
            RelatedRecord::Current { tag, .. } | RelatedRecord::Related { tag, .. } => *tag,
        }
    }

    /// Normalized corpus position in `[0, 1]`.
    pub fn position(&self) -> f64 {
        match self {
            RelatedRecord::Current { position, .. } | RelatedRecord::Related { position, .. } => {
                *position
            }
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, RelatedRecord::Current { .. })
    }

    /// Text inside the comment delimiters of a related line.
    pub fn comment_body(&self) -> Option<&str> {
        match self {
            RelatedRecord::Current { .. } => None,
            RelatedRecord::Related { line_text, .. } => comment_body(line_text),
        }
    }
}

/// Resolve against the file text captured by the scan.
///
/// A cursor in a file outside the corpus yields nothing.
pub fn resolve_related(snapshot: &Snapshot, cursor: &Cursor) -> Vec<RelatedRecord> {
    match snapshot.file_by_path(&cursor.path) {
        Some(file) => resolve_related_in(snapshot, cursor, file.lines()),
        None => Vec::new(),
    }
}

/// Resolve against caller-supplied lines, e.g. an unsaved editor buffer.
pub fn resolve_related_in<S: AsRef<str>>(
    snapshot: &Snapshot,
    cursor: &Cursor,
    lines: &[S],
) -> Vec<RelatedRecord> {
    let Some((anchor, text)) = find_anchor(lines, cursor.line) else {
        return Vec::new();
    };
    // on the annotation line itself only the token under the cursor counts
    let narrow = anchor == cursor.line;

    let mut related: Vec<TagId> = find_tokens(text)
        .filter(|token| !narrow || token.contains_column(cursor.column))
        .filter_map(|token| token.classify())
        .flat_map(|(_, id)| snapshot.index().query(id, None))
        .collect();

    related.sort_by_key(|id| snapshot.tag(*id).position());
    related.dedup_by_key(|id| snapshot.tag(*id).position());

    let cursor_file = snapshot.file_by_path(&cursor.path).map(|f| f.ordinal);
    related
        .into_iter()
        .map(|id| {
            let tag = snapshot.tag(id);
            let position = snapshot.normalized_position(tag);
            if cursor_file == Some(tag.file) && tag.line == anchor {
                RelatedRecord::Current { tag: id, position }
            } else {
                RelatedRecord::Related {
                    tag: id,
                    path: snapshot
                        .file(tag.file)
                        .map(|f| f.path.clone())
                        .unwrap_or_default(),
                    line: tag.line,
                    context: tag.context.clone(),
                    position,
                    line_text: tag.line_text.clone(),
                }
            }
        })
        .collect()
}

/// Nearest annotation line at or above `line`, within the lookback window.
fn find_anchor<S: AsRef<str>>(lines: &[S], line: usize) -> Option<(usize, &str)> {
    (0..LOOKBACK_LINES)
        .map_while(|back| line.checked_sub(back))
        .find_map(|n| {
            let text = lines.get(n)?.as_ref();
            is_annotation_line(text).then_some((n, text))
        })
}

/// Relative display path for a record, falling back to the full path.
pub fn display_path<'a>(snapshot: &'a Snapshot, path: &'a Path) -> &'a Path {
    path.strip_prefix(snapshot.root()).unwrap_or(path)
}

//! Tag occurrences and the annotation grammar
//!
//! A tag is a `#`-prefixed token found on an annotation line, i.e. a line
//! carrying exactly one `<!-- ... -->` comment span. The token's trailing
//! sigil decides its kind:
//!
//! ```markdown
//! <!-- #door -->    mention
//! <!-- #door? -->   question
//! <!-- #door! -->   answer
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// `#` followed by letters, numbers, `_`, `-` or `.`, with an optional `?`/`!`.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[\p{L}\p{N}_\-.]+[?!]?").expect("token pattern is valid"));

/// A delimited comment span, body matched non-greedily.
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--(.*?)-->").expect("comment pattern is valid"));

/// What a tag says about its identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKind {
    /// Plain reference, no sigil
    Mention,
    /// Something the text promises to resolve later (`?`)
    Question,
    /// The resolution of an earlier question (`!`)
    Answer,
}

impl TagKind {
    /// All kinds, in the order kind-agnostic queries visit them.
    pub const ALL: [TagKind; 3] = [TagKind::Mention, TagKind::Question, TagKind::Answer];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Mention => "mention",
            TagKind::Question => "question",
            TagKind::Answer => "answer",
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a line in document order.
///
/// Ordering is lexicographic over `(ordinal, line)`, which is the canonical
/// "precedes" relation across the whole corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPosition {
    /// Ordinal of the owning file
    pub ordinal: usize,
    /// Line number within the file (0-indexed)
    pub line: usize,
}

impl DocPosition {
    pub fn new(ordinal: usize, line: usize) -> Self {
        Self { ordinal, line }
    }

    /// Strictly before `other`; equal positions never precede each other.
    pub fn precedes(&self, other: &DocPosition) -> bool {
        self < other
    }
}

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single validation slot carried by a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub message: String,
    pub severity: Severity,
}

/// Character range of a tag token on its line (columns are 0-indexed, end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// One annotation occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Ordinal of the owning file
    pub file: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column of the `#`, counted in characters (0-indexed)
    pub column: usize,
    /// Raw token text, e.g. `#door?`
    pub token: String,
    pub kind: TagKind,
    /// Token with `#` and the kind sigil stripped
    pub id: String,
    /// Lookahead snippet following the annotation line
    pub context: String,
    /// Full text of the annotation line
    pub line_text: String,
    /// Characters of body text preceding this tag in the whole corpus
    pub offset: usize,
    /// Last validation finding, if any
    pub annotation: Option<Annotation>,
}

impl Tag {
    pub fn position(&self) -> DocPosition {
        DocPosition::new(self.file, self.line)
    }

    pub fn precedes(&self, other: &Tag) -> bool {
        self.position().precedes(&other.position())
    }

    pub fn range(&self) -> TagRange {
        TagRange {
            line: self.line,
            start: self.column,
            end: self.column + self.token.chars().count(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.annotation
            .as_ref()
            .is_some_and(|a| a.severity == Severity::Error)
    }

    pub fn is_warning(&self) -> bool {
        self.annotation
            .as_ref()
            .is_some_and(|a| a.severity == Severity::Warning)
    }
}

/// A token match on a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMatch<'a> {
    /// Raw token text including `#` and sigil
    pub text: &'a str,
    /// Character column of the `#`
    pub start: usize,
    /// Character column just past the token
    pub end: usize,
}

impl<'a> TokenMatch<'a> {
    /// Kind and identifier of this token.
    pub fn classify(&self) -> Option<(TagKind, &'a str)> {
        classify_token(self.text)
    }

    /// Whether a cursor at `column` touches this token (end inclusive).
    pub fn contains_column(&self, column: usize) -> bool {
        self.start <= column && column <= self.end
    }
}

/// Split a raw token into its kind and identifier.
///
/// Returns `None` when the text is not `#`-prefixed or the identifier left
/// after stripping is empty.
pub fn classify_token(token: &str) -> Option<(TagKind, &str)> {
    let body = token.strip_prefix('#')?;
    let (kind, id) = if let Some(id) = body.strip_suffix('?') {
        (TagKind::Question, id)
    } else if let Some(id) = body.strip_suffix('!') {
        (TagKind::Answer, id)
    } else {
        (TagKind::Mention, body)
    };
    if id.is_empty() {
        return None;
    }
    Some((kind, id))
}

/// Whether the line carries exactly one comment span.
pub fn is_annotation_line(line: &str) -> bool {
    let mut spans = COMMENT.find_iter(line);
    spans.next().is_some() && spans.next().is_none()
}

/// Body of the first comment span on the line, trimmed.
pub fn comment_body(line: &str) -> Option<&str> {
    COMMENT
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// All tag tokens on a line, searched across the whole line.
pub fn find_tokens(line: &str) -> impl Iterator<Item = TokenMatch<'_>> {
    TOKEN.find_iter(line).map(move |m| {
        let start = line[..m.start()].chars().count();
        TokenMatch {
            text: m.as_str(),
            start,
            end: start + m.as_str().chars().count(),
        }
    })
}

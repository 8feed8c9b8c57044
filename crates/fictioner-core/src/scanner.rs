//! Per-file tag scanning
//!
//! Walks a file line by line, keeping a running count of body characters.
//! Headings set the file's scanned title, annotation lines emit tags, and
//! everything else is body text.

use regex::Regex;
use std::sync::LazyLock;

use crate::tag::{Tag, find_tokens, is_annotation_line};

/// Maximum number of characters captured as a tag's context.
pub const CONTEXT_LIMIT: usize = 200;

/// Non-whitespace characters that must be collected before a blank line ends
/// the context.
const CONTEXT_MIN_CONTENT: usize = 2;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+(\S.*)$").expect("heading pattern is valid"));

/// What a single file contributes to a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileScan {
    /// Tags in line order, offsets relative to the start of this file
    pub tags: Vec<Tag>,
    /// Body characters counted in this file
    pub char_count: usize,
    /// Text of the last heading
    pub title: Option<String>,
    /// The file's lines, kept for cursor lookups
    pub lines: Vec<String>,
}

impl FileScan {
    /// Shift every tag offset by the characters of all preceding files.
    pub fn rebase(&mut self, base_offset: usize) {
        for tag in &mut self.tags {
            tag.offset += base_offset;
        }
    }
}

/// Split on `\r\n`, `\n\r`, `\n` or `\r`, each counting as one break.
///
/// A trailing break yields a final empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' | b'\n' => {
                lines.push(&text[start..i]);
                let pair = match bytes[i] {
                    b'\r' => b'\n',
                    _ => b'\r',
                };
                i += if bytes.get(i + 1) == Some(&pair) { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

/// Scan one file's text.
///
/// `ordinal` is stamped on every tag; offsets start at zero and are shifted
/// by the caller with [`FileScan::rebase`] once preceding files are known.
pub fn scan_file(ordinal: usize, text: &str) -> FileScan {
    let lines = split_lines(text);
    let mut tags = Vec::new();
    let mut title = None;
    let mut counter = 0usize;

    for (line_no, line) in lines.iter().enumerate() {
        if let Some(caps) = HEADING.captures(line) {
            let heading = caps[1].trim();
            counter += heading.chars().count() + 1;
            title = Some(heading.to_string());
            continue;
        }

        if is_annotation_line(line) {
            let found: Vec<_> = find_tokens(line)
                .filter_map(|t| t.classify().map(|(kind, id)| (t, kind, id)))
                .collect();
            if !found.is_empty() {
                let context = collect_context(&lines[line_no + 1..]);
                for (token, kind, id) in found {
                    tags.push(Tag {
                        file: ordinal,
                        line: line_no,
                        column: token.start,
                        token: token.text.to_string(),
                        kind,
                        id: id.to_string(),
                        context: context.clone(),
                        line_text: line.to_string(),
                        offset: counter,
                        annotation: None,
                    });
                }
                continue;
            }
        }

        counter += line.trim().chars().count() + 1;
    }

    FileScan {
        tags,
        char_count: counter,
        title,
        lines: lines.into_iter().map(str::to_string).collect(),
    }
}

/// Collect up to [`CONTEXT_LIMIT`] characters of the lines that follow.
///
/// A blank line ends the context only once real content has been seen, so a
/// blank line right after the annotation is skipped over.
fn collect_context(following: &[&str]) -> String {
    let mut context = String::new();
    let mut collected = 0usize;
    let mut content = 0usize;

    for line in following {
        if line.trim().is_empty() && content > CONTEXT_MIN_CONTENT {
            break;
        }
        for ch in line.chars().chain(std::iter::once('\n')) {
            if collected == CONTEXT_LIMIT {
                return context;
            }
            if !ch.is_whitespace() {
                content += 1;
            }
            context.push(ch);
            collected += 1;
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagKind;
    use indoc::indoc;

    #[test]
    fn split_handles_every_convention() {
        assert_eq!(split_lines("a\r\nb\nc\rd\n\re"), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn last_heading_wins() {
        let scan = scan_file(0, "# First\ntext\n## Second\n");
        assert_eq!(scan.title.as_deref(), Some("Second"));
    }

    #[test]
    fn heading_lines_are_not_scanned_for_tags() {
        let scan = scan_file(0, "# Title <!-- #x? -->\n");
        assert!(scan.tags.is_empty());
    }

    #[test]
    fn annotation_lines_emit_one_tag_per_token() {
        let scan = scan_file(3, "intro\n<!-- #x #x? #y! -->\nbody\n");
        let summary: Vec<_> = scan
            .tags
            .iter()
            .map(|t| (t.line, t.column, t.kind, t.id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, 5, TagKind::Mention, "x"),
                (1, 8, TagKind::Question, "x"),
                (1, 12, TagKind::Answer, "y"),
            ]
        );
        assert!(scan.tags.iter().all(|t| t.file == 3));
        assert!(scan.tags.iter().all(|t| t.line_text == "<!-- #x #x? #y! -->"));
    }

    #[test]
    fn offsets_count_trimmed_body_and_headings() {
        let text = indoc! {"
            # Title
              abc
            <!-- #a -->
            de
            <!-- #b -->
        "};
        let scan = scan_file(0, text);
        // heading: 5 + 1, "abc": 3 + 1
        assert_eq!(scan.tags[0].offset, 10);
        // annotation lines don't advance, "de": 2 + 1
        assert_eq!(scan.tags[1].offset, 13);
        // trailing empty line adds one
        assert_eq!(scan.char_count, 14);
    }

    #[test]
    fn comment_without_tokens_is_body_text() {
        let scan = scan_file(0, "<!-- note -->\n");
        assert!(scan.tags.is_empty());
        assert_eq!(scan.char_count, "<!-- note -->".len() + 1 + 1);
    }

    #[test]
    fn context_skips_leading_blank_line() {
        let text = indoc! {"
            <!-- #door? -->

            The door was locked.
            It stayed locked.

            Unrelated paragraph.
        "};
        let scan = scan_file(0, text);
        assert_eq!(
            scan.tags[0].context,
            "\nThe door was locked.\nIt stayed locked.\n"
        );
    }

    #[test]
    fn blank_line_after_two_characters_does_not_end_context() {
        let scan = scan_file(0, "<!-- #a -->\nab\n\nmore");
        assert_eq!(scan.tags[0].context, "ab\n\nmore\n");
    }

    #[test]
    fn blank_line_after_three_characters_ends_context() {
        let scan = scan_file(0, "<!-- #a -->\nabc\n\nmore");
        assert_eq!(scan.tags[0].context, "abc\n");
    }

    #[test]
    fn context_is_capped() {
        let long = "x".repeat(500);
        let scan = scan_file(0, &format!("<!-- #a -->\n{long}\n"));
        assert_eq!(scan.tags[0].context.chars().count(), CONTEXT_LIMIT);
    }

    #[test]
    fn rebase_shifts_offsets() {
        let mut scan = scan_file(0, "ab\n<!-- #a -->\n");
        scan.rebase(100);
        assert_eq!(scan.tags[0].offset, 103);
    }

    #[test]
    fn two_spans_make_a_plain_line() {
        let scan = scan_file(0, "<!-- #a --> and <!-- #b -->\n");
        assert!(scan.tags.is_empty());
    }
}

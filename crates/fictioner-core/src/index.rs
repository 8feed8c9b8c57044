//! Two-level tag lookup: kind, then identifier
//!
//! Buckets keep insertion order; they are not sorted by document position.
//! The index is filled once per scan and only read afterwards.

use std::collections::{BTreeSet, HashMap};

use crate::tag::{DocPosition, Tag, TagKind};

/// Handle of a tag within a snapshot's tag list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    tag: TagId,
    position: DocPosition,
}

/// Index over all tags of a scan
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    buckets: HashMap<TagKind, HashMap<String, Vec<Entry>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag to its `(kind, identifier)` bucket.
    pub fn insert(&mut self, handle: TagId, tag: &Tag) {
        self.buckets
            .entry(tag.kind)
            .or_default()
            .entry(tag.id.clone())
            .or_default()
            .push(Entry {
                tag: handle,
                position: tag.position(),
            });
    }

    /// Tags with this identifier, of one kind or of every kind.
    ///
    /// Without a kind, results come kind by kind (mention, question, answer),
    /// each in insertion order. Callers wanting document order must sort.
    pub fn query(&self, id: &str, kind: Option<TagKind>) -> Vec<TagId> {
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => TagKind::ALL.to_vec(),
        };
        kinds
            .into_iter()
            .flat_map(|kind| self.bucket(kind, id))
            .map(|entry| entry.tag)
            .collect()
    }

    pub fn exists(&self, kind: TagKind, id: &str) -> bool {
        !self.bucket(kind, id).is_empty()
    }

    /// Whether any tag in the bucket strictly precedes `at`.
    pub fn exists_before(&self, kind: TagKind, id: &str, at: DocPosition) -> bool {
        self.bucket(kind, id)
            .iter()
            .any(|entry| entry.position.precedes(&at))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Distinct identifiers across all kinds, sorted.
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.buckets
            .values()
            .flat_map(|by_id| by_id.keys().map(String::as_str))
            .collect()
    }

    /// Total number of indexed tags
    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|by_id| by_id.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&self, kind: TagKind, id: &str) -> &[Entry] {
        self.buckets
            .get(&kind)
            .and_then(|by_id| by_id.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(file: usize, line: usize, token: &str) -> Tag {
        let (kind, id) = crate::tag::classify_token(token).unwrap();
        Tag {
            file,
            line,
            column: 0,
            token: token.to_string(),
            kind,
            id: id.to_string(),
            context: String::new(),
            line_text: String::new(),
            offset: 0,
            annotation: None,
        }
    }

    fn index_of(tags: &[Tag]) -> TagIndex {
        let mut index = TagIndex::new();
        for (i, t) in tags.iter().enumerate() {
            index.insert(TagId(i), t);
        }
        index
    }

    #[test]
    fn query_by_kind_keeps_insertion_order() {
        let tags = [tag(2, 0, "#a?"), tag(0, 5, "#a?"), tag(1, 1, "#a!")];
        let index = index_of(&tags);
        assert_eq!(
            index.query("a", Some(TagKind::Question)),
            vec![TagId(0), TagId(1)]
        );
        assert!(index.query("a", Some(TagKind::Mention)).is_empty());
    }

    #[test]
    fn kindless_query_unions_in_kind_order() {
        let tags = [tag(0, 0, "#a!"), tag(0, 1, "#a?"), tag(0, 2, "#a"), tag(0, 3, "#b")];
        let index = index_of(&tags);
        assert_eq!(index.query("a", None), vec![TagId(2), TagId(1), TagId(0)]);
    }

    #[test]
    fn exists_before_is_strict() {
        let tags = [tag(1, 4, "#a?")];
        let index = index_of(&tags);
        assert!(index.exists(TagKind::Question, "a"));
        assert!(!index.exists(TagKind::Answer, "a"));
        assert!(index.exists_before(TagKind::Question, "a", DocPosition::new(1, 5)));
        assert!(index.exists_before(TagKind::Question, "a", DocPosition::new(2, 0)));
        assert!(!index.exists_before(TagKind::Question, "a", DocPosition::new(1, 4)));
        assert!(!index.exists_before(TagKind::Question, "a", DocPosition::new(0, 9)));
    }

    #[test]
    fn clear_empties_every_bucket() {
        let tags = [tag(0, 0, "#a"), tag(0, 1, "#b?")];
        let mut index = index_of(&tags);
        assert_eq!(index.len(), 2);
        index.clear();
        assert!(index.is_empty());
        assert!(!index.exists(TagKind::Mention, "a"));
    }

    #[test]
    fn identifiers_are_sorted_and_unique() {
        let tags = [tag(0, 0, "#b?"), tag(0, 1, "#a"), tag(0, 2, "#b!")];
        let index = index_of(&tags);
        assert_eq!(index.identifiers().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

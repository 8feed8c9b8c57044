//! Immutable result of one full scan
//!
//! A [`Snapshot`] bundles the document tree, every file's tags, the tag index
//! and the diagnostics of a single scan generation. It is built in one go and
//! never modified afterwards, so readers holding one see a consistent model.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::check::{Diagnostics, check};
use crate::config::FictionConfig;
use crate::error::ScanError;
use crate::index::{TagId, TagIndex};
use crate::scanner::{FileScan, scan_file};
use crate::tag::{Tag, is_annotation_line};
use crate::tree::{DocFile, DocNode, DocumentTree};

/// A corpus file after scanning
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusFile {
    /// Absolute (root-joined) path
    pub path: PathBuf,
    /// Path relative to the workspace root, `/`-separated
    pub relative: String,
    /// Position in document order
    pub ordinal: usize,
    /// Title given in the configuration
    pub given_title: Option<String>,
    /// Text of the file's last heading
    pub scanned_title: Option<String>,
    /// Characters of all preceding files
    pub base_offset: usize,
    /// Characters this file contributes
    pub char_count: usize,
    tags: Range<usize>,
    lines: Vec<String>,
}

impl CorpusFile {
    /// Display title: given, then scanned, then the file stem.
    pub fn title(&self) -> &str {
        self.given_title
            .as_deref()
            .or(self.scanned_title.as_deref())
            .or_else(|| self.path.file_stem().and_then(|s| s.to_str()))
            .unwrap_or(&self.relative)
    }

    /// Handles of this file's tags, in line order.
    pub fn tag_ids(&self) -> impl Iterator<Item = TagId> {
        self.tags.clone().map(TagId)
    }

    /// The file's text as read during the scan.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Validation counts for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub tags: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// One scan generation of the whole corpus
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    root: PathBuf,
    title: String,
    nodes: Vec<DocNode>,
    files: Vec<CorpusFile>,
    tags: Vec<Tag>,
    index: TagIndex,
    diagnostics: Diagnostics,
    total_chars: usize,
    warnings: Vec<String>,
}

impl Snapshot {
    /// A snapshot with no files, used before the first successful scan.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            generation: 0,
            root: root.into(),
            title: String::new(),
            nodes: Vec::new(),
            files: Vec::new(),
            tags: Vec::new(),
            index: TagIndex::new(),
            diagnostics: Diagnostics::default(),
            total_chars: 0,
            warnings: Vec::new(),
        }
    }

    /// Load the config file and scan the corpus it describes.
    pub fn load(root: &Path, config_path: &Path, generation: u64) -> Result<Self, ScanError> {
        let config = FictionConfig::load(config_path)?;
        Self::scan(root, &config, generation)
    }

    /// Build the tree, scan every file, index and check the tags.
    ///
    /// Files are read concurrently into an ordinal-indexed buffer; offsets,
    /// the index and the checks are then computed in one pass in document
    /// order, so the result does not depend on which read finishes first.
    pub fn scan(root: &Path, config: &FictionConfig, generation: u64) -> Result<Self, ScanError> {
        let start = Instant::now();
        let tree = DocumentTree::build(root, config);
        let scans = read_all(&tree.files)?;

        let mut files = Vec::with_capacity(tree.files.len());
        let mut tags = Vec::new();
        let mut index = TagIndex::new();
        let mut base_offset = 0usize;

        for (doc, mut scan) in tree.files.into_iter().zip(scans) {
            scan.rebase(base_offset);
            let first = tags.len();
            for tag in scan.tags {
                index.insert(TagId(tags.len()), &tag);
                tags.push(tag);
            }
            debug!(
                "{}: {} tags, {} chars at offset {}",
                doc.relative,
                tags.len() - first,
                scan.char_count,
                base_offset
            );
            files.push(CorpusFile {
                path: doc.path,
                relative: doc.relative,
                ordinal: doc.ordinal,
                given_title: doc.given_title,
                scanned_title: scan.title,
                base_offset,
                char_count: scan.char_count,
                tags: first..tags.len(),
                lines: scan.lines,
            });
            base_offset += scan.char_count;
        }

        let diagnostics = check(&mut tags, &index);

        info!(
            "Scanned {} files, {} tags, {} findings in {:?} (generation {})",
            files.len(),
            tags.len(),
            diagnostics.len(),
            start.elapsed(),
            generation
        );

        Ok(Self {
            generation,
            root: root.to_path_buf(),
            title: config.title.clone(),
            nodes: tree.nodes,
            files,
            tags,
            index,
            diagnostics,
            total_chars: base_offset,
            warnings: tree.warnings.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Title of the whole document
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Top-level section and file nodes
    pub fn tree(&self) -> &[DocNode] {
        &self.nodes
    }

    /// Files in document order; a file's ordinal is its index here.
    pub fn files(&self) -> &[CorpusFile] {
        &self.files
    }

    pub fn file(&self, ordinal: usize) -> Option<&CorpusFile> {
        self.files.get(ordinal)
    }

    /// Look up a file by absolute or root-relative path.
    ///
    /// Paths that differ only in spelling (`..`, symlinks, a relative root)
    /// are matched by their canonical form.
    pub fn file_by_path(&self, path: &Path) -> Option<&CorpusFile> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if let Some(file) = self.files.iter().find(|f| f.path == absolute) {
            return Some(file);
        }
        let canonical = absolute.canonicalize().ok()?;
        self.files
            .iter()
            .find(|f| f.path.canonicalize().is_ok_and(|p| p == canonical))
    }

    /// All tags in scan order (document order).
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, id: TagId) -> &Tag {
        &self.tags[id.0]
    }

    pub fn tags_in(&self, ordinal: usize) -> &[Tag] {
        self.files
            .get(ordinal)
            .map(|f| &self.tags[f.tags.clone()])
            .unwrap_or(&[])
    }

    pub fn index(&self) -> &TagIndex {
        &self.index
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Body characters in the whole corpus
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Non-fatal problems found while building the tree
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Where a tag sits in the corpus, from 0.0 (start) to 1.0 (end).
    pub fn normalized_position(&self, tag: &Tag) -> f64 {
        if self.total_chars == 0 {
            return 0.0;
        }
        tag.offset as f64 / self.total_chars as f64
    }

    /// Validation counts for a file's tags.
    pub fn file_summary(&self, ordinal: usize) -> FileSummary {
        let tags = self.tags_in(ordinal);
        FileSummary {
            tags: tags.len(),
            errors: tags.iter().filter(|t| t.is_error()).count(),
            warnings: tags.iter().filter(|t| t.is_warning()).count(),
        }
    }

    /// Corpus paths in document order, optionally relative to the root.
    pub fn file_paths(&self, relative: bool) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| {
                if relative {
                    PathBuf::from(&f.relative)
                } else {
                    f.path.clone()
                }
            })
            .collect()
    }

    /// Distinct identifiers across all kinds, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.index.identifiers().into_iter().collect()
    }

    /// Identifiers to offer while editing `line`; only annotation lines get any.
    pub fn completions_for_line(&self, line: &str) -> Vec<&str> {
        if is_annotation_line(line) {
            self.identifiers()
        } else {
            Vec::new()
        }
    }
}

fn read_and_scan(file: &DocFile) -> Result<FileScan, ScanError> {
    let text = std::fs::read_to_string(&file.path).map_err(|source| ScanError::FileRead {
        path: file.path.clone(),
        source,
    })?;
    Ok(scan_file(file.ordinal, &text))
}

/// Read and scan every file; results are indexed by ordinal.
fn read_all(files: &[DocFile]) -> Result<Vec<FileScan>, ScanError> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        files.par_iter().map(read_and_scan).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        files.iter().map(read_and_scan).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus(files: &[(&str, &str)], config: &str) -> (tempfile::TempDir, FictionConfig) {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        (dir, FictionConfig::from_json(config).unwrap())
    }

    #[test]
    fn offsets_chain_across_files() {
        let (dir, config) = corpus(
            &[("a.md", "abcd\n<!-- #x? -->"), ("b.md", "ef\n<!-- #x! -->")],
            r#"{ "title": "t", "contents": ["a.md", "b.md"] }"#,
        );
        let snapshot = Snapshot::scan(dir.path(), &config, 1).unwrap();

        let a = snapshot.file(0).unwrap();
        let b = snapshot.file(1).unwrap();
        assert_eq!(a.base_offset, 0);
        assert_eq!(a.char_count, 5);
        assert_eq!(b.base_offset, 5);
        assert_eq!(snapshot.tags_in(1)[0].offset, 8);
        assert_eq!(snapshot.total_chars(), 8);
        assert_eq!(snapshot.normalized_position(&snapshot.tags_in(1)[0]), 1.0);
    }

    #[test]
    fn unreadable_file_fails_the_scan() {
        let (dir, config) = corpus(&[("a.md", "x")], r#"{ "title": "t", "contents": "*.md" }"#);
        fs::write(dir.path().join("b.md"), [0xff, 0xfe, 0x00]).unwrap();
        let err = Snapshot::scan(dir.path(), &config, 1).unwrap_err();
        assert!(matches!(err, ScanError::FileRead { .. }), "{err}");
    }

    #[test]
    fn titles_fall_back_to_file_stem() {
        let (dir, config) = corpus(
            &[("one.md", "# Opening\ntext"), ("two.md", "text"), ("three.md", "# Ignored")],
            r#"{ "title": "t", "contents": ["one.md", "two.md", "three.md"],
                "titles": { "three.md": "Given" } }"#,
        );
        let snapshot = Snapshot::scan(dir.path(), &config, 1).unwrap();
        let titles: Vec<_> = snapshot.files().iter().map(CorpusFile::title).collect();
        assert_eq!(titles, vec!["Opening", "two", "Given"]);
    }

    #[test]
    fn summaries_and_completions() {
        let (dir, config) = corpus(
            &[("a.md", "<!-- #b! #a? #c -->\n")],
            r#"{ "title": "t", "contents": "a.md" }"#,
        );
        let snapshot = Snapshot::scan(dir.path(), &config, 1).unwrap();
        assert_eq!(
            snapshot.file_summary(0),
            FileSummary {
                tags: 3,
                errors: 2,
                warnings: 0
            }
        );
        assert_eq!(snapshot.identifiers(), vec!["a", "b", "c"]);
        assert_eq!(snapshot.completions_for_line("<!-- # -->"), vec!["a", "b", "c"]);
        assert!(snapshot.completions_for_line("plain text").is_empty());
    }

    #[test]
    fn file_lookup_accepts_relative_paths() {
        let (dir, config) = corpus(&[("sub/a.md", "x")], r#"{ "title": "t", "contents": "sub/*.md" }"#);
        let snapshot = Snapshot::scan(dir.path(), &config, 1).unwrap();
        assert!(snapshot.file_by_path(Path::new("sub/a.md")).is_some());
        assert!(snapshot.file_by_path(&dir.path().join("sub/a.md")).is_some());
        assert!(snapshot.file_by_path(Path::new("a.md")).is_none());
        assert_eq!(snapshot.file_paths(true), vec![PathBuf::from("sub/a.md")]);
    }
}

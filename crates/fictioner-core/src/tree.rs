//! Document tree building
//!
//! Expands a [`ConfigNode`] into an ordered forest of sections and files.
//! Files get ordinals in build order, which is a pre-order traversal of the
//! resulting tree, so `(ordinal, line)` orders the whole corpus.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::config::{ConfigNode, FictionConfig, normalize_relative};

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocNode {
    /// Titled container
    Section {
        title: String,
        children: Vec<DocNode>,
    },
    /// Leaf referring to a file by ordinal
    File(usize),
}

impl DocNode {
    /// File ordinals below this node, in pre-order.
    pub fn file_ordinals(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_ordinals(&mut out);
        out
    }

    fn collect_ordinals(&self, out: &mut Vec<usize>) {
        match self {
            DocNode::Section { children, .. } => {
                children.iter().for_each(|c| c.collect_ordinals(out))
            }
            DocNode::File(ordinal) => out.push(*ordinal),
        }
    }
}

/// A corpus file as placed by the tree builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocFile {
    /// Absolute (root-joined) path
    pub path: PathBuf,
    /// Path relative to the workspace root, `/`-separated
    pub relative: String,
    /// Position in document order, contiguous from 0
    pub ordinal: usize,
    /// Title given in the configuration
    pub given_title: Option<String>,
}

/// A wildcard pattern that could not be compiled
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid pattern `{pattern}`: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// Result of expanding the configuration
#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    /// Top-level nodes in document order
    pub nodes: Vec<DocNode>,
    /// Every file, indexed by ordinal
    pub files: Vec<DocFile>,
    /// Patterns that expanded to nothing because they were malformed
    pub warnings: Vec<PatternError>,
}

impl DocumentTree {
    /// Expand the configuration's `contents` below `root`.
    pub fn build(root: &Path, config: &FictionConfig) -> Self {
        let mut builder = TreeBuilder {
            root,
            config,
            files: Vec::new(),
            warnings: Vec::new(),
        };
        let nodes = builder.expand(&config.contents);
        debug!(
            "Built document tree with {} files from {}",
            builder.files.len(),
            root.display()
        );
        Self {
            nodes,
            files: builder.files,
            warnings: builder.warnings,
        }
    }

    /// File ordinals in pre-order over the whole forest.
    pub fn preorder(&self) -> Vec<usize> {
        self.nodes.iter().flat_map(DocNode::file_ordinals).collect()
    }
}

struct TreeBuilder<'a> {
    root: &'a Path,
    config: &'a FictionConfig,
    files: Vec<DocFile>,
    warnings: Vec<PatternError>,
}

impl TreeBuilder<'_> {
    fn expand(&mut self, node: &ConfigNode) -> Vec<DocNode> {
        match node {
            ConfigNode::Pattern(pattern) => {
                let matches = match expand_pattern(self.root, pattern) {
                    Ok(matches) => matches,
                    Err(e) => {
                        warn!("{}", e);
                        self.warnings.push(e);
                        Vec::new()
                    }
                };
                matches
                    .into_iter()
                    .map(|(relative, path)| DocNode::File(self.push_file(relative, path)))
                    .collect()
            }
            // untitled lists splice their children into the parent
            ConfigNode::List(items) => items.iter().flat_map(|item| self.expand(item)).collect(),
            ConfigNode::Sections(sections) => sections
                .iter()
                .map(|(title, child)| DocNode::Section {
                    title: title.clone(),
                    children: self.expand(child),
                })
                .collect(),
        }
    }

    fn push_file(&mut self, relative: String, path: PathBuf) -> usize {
        let ordinal = self.files.len();
        let given_title = self.config.given_title(&relative).map(str::to_string);
        self.files.push(DocFile {
            path,
            relative,
            ordinal,
            given_title,
        });
        ordinal
    }
}

/// Expand one wildcard pattern below `root`.
///
/// Matches are `(relative, absolute)` pairs sorted by relative path. `*` does
/// not cross directory separators; `**` does. Ignore files are not consulted
/// and `.git` directories are never entered.
pub fn expand_pattern(root: &Path, pattern: &str) -> Result<Vec<(String, PathBuf)>, PatternError> {
    let pattern = normalize_relative(pattern);
    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| PatternError {
            pattern: pattern.clone(),
            source,
        })?
        .compile_matcher();

    let prefix = literal_prefix(&pattern);
    let base = if prefix.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(&prefix)
    };
    if !base.exists() {
        return Ok(Vec::new());
    }

    // every matching file belongs to the document, ignore files or not
    let walker = WalkBuilder::new(&base)
        .standard_filters(false)
        .follow_links(true)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut matches = Vec::new();
    for entry in walker {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if matcher.is_match(&relative) {
            matches.push((relative, path.to_path_buf()));
        }
    }

    matches.sort();
    Ok(matches)
}

/// Longest leading run of path components free of glob metacharacters.
///
/// ```ignore
/// literal_prefix("part1/**/*.md") => "part1"
/// literal_prefix("*.md") => ""
/// literal_prefix("ch1.md") => "ch1.md"
/// ```
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let mut result = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(s) = component {
            let s = s.to_string_lossy();
            if s.contains(['*', '?', '[', '{']) {
                break;
            }
        }
        result.push(component);
    }
    result
}

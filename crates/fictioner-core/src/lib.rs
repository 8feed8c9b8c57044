//! fictioner-core - Core library for manuscript cross-reference checking
//!
//! This crate provides the building blocks for:
//! - Ordering a corpus of files into one document from `fiction.json`
//! - Extracting tags (mentions, questions, answers) from comment spans
//! - Checking that every question is answered, in order, exactly once
//! - Looking up the tags related to a cursor position
//!
//! # Features
//!
//! - `parallel` - Read and scan corpus files in parallel (brings in `rayon`)
//!
//! # Annotating a manuscript
//!
//! Tags live in single-line comments. A trailing `?` asks, a trailing `!`
//! answers, and a bare tag just mentions:
//!
//! ```markdown
//! The door was locked.
//! <!-- #door? -->
//!
//! ...
//!
//! The key had been under the mat all along.
//! <!-- #door! -->
//! ```
//!
//! # Scanning a corpus
//!
//! ```ignore
//! use fictioner_core::{FictionConfig, Snapshot};
//!
//! let config = FictionConfig::load("novel/fiction.json")?;
//! let snapshot = Snapshot::scan("novel".as_ref(), &config, 1)?;
//! for (ordinal, findings) in snapshot.diagnostics().iter() {
//!     let file = snapshot.file(ordinal).unwrap();
//!     for d in findings {
//!         println!("{}:{} {}", file.relative, d.range.line + 1, d.message);
//!     }
//! }
//! ```
//!
//! # Scanning a single file
//!
//! ```
//! use fictioner_core::{TagKind, scan_file};
//!
//! let scan = scan_file(0, "# Chapter One\nIt was dark.\n<!-- #door? #cellar -->\n");
//! assert_eq!(scan.title.as_deref(), Some("Chapter One"));
//! assert_eq!(scan.tags.len(), 2);
//! assert_eq!(scan.tags[0].kind, TagKind::Question);
//! assert_eq!(scan.tags[0].id, "door");
//! ```

pub mod check;
pub mod config;
mod error;
pub mod index;
pub mod related;
pub mod scanner;
mod snapshot;
pub mod tag;
pub mod tree;

pub use check::{Diagnostic, Diagnostics};
pub use config::{CONFIG_FILE_NAME, ConfigError, ConfigNode, FictionConfig};
pub use error::ScanError;
pub use index::{TagId, TagIndex};
pub use related::{Cursor, RelatedRecord, resolve_related, resolve_related_in};
pub use scanner::{FileScan, scan_file};
pub use snapshot::{CorpusFile, FileSummary, Snapshot};
pub use tag::{Annotation, DocPosition, Severity, Tag, TagKind, TagRange};
pub use tree::{DocFile, DocNode, DocumentTree};

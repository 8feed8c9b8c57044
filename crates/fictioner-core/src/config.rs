//! Document configuration
//!
//! The corpus is described by `fiction.json` at the workspace root:
//!
//! ```json
//! {
//!     "title": "Starwars Episode IV",
//!     "contents": {
//!         "Part One": ["prologue.md", "part1/*.md"],
//!         "Part Two": "part2/*.md"
//!     },
//!     "titles": { "prologue.md": "A long time ago" }
//! }
//! ```
//!
//! `contents` is a pattern string, a list of values, or a mapping from section
//! title to value, nested arbitrarily.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Default name of the configuration file, relative to the workspace root.
pub const CONFIG_FILE_NAME: &str = "fiction.json";

/// Errors that make a configuration unusable
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("cannot parse {found} at `{at}` in config, expected a pattern, a list or a mapping")]
    InvalidNode { at: String, found: &'static str },

    #[error("`{at}` in config must be a string")]
    NotAString { at: String },
}

/// One node of the `contents` tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNode {
    /// Wildcard pattern relative to the workspace root
    Pattern(String),
    /// Ordered values without a title of their own
    List(Vec<ConfigNode>),
    /// Titled sections, in declaration order
    Sections(Vec<(String, ConfigNode)>),
}

impl ConfigNode {
    /// Convert a JSON value, naming the offending path on failure.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::from_value_at(value, "contents")
    }

    fn from_value_at(value: &Value, at: &str) -> Result<Self, ConfigError> {
        match value {
            Value::String(pattern) => Ok(ConfigNode::Pattern(pattern.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_value_at(item, &format!("{at}[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigNode::List),
            Value::Object(entries) => entries
                .iter()
                .map(|(title, child)| {
                    Self::from_value_at(child, &format!("{at}.{title}"))
                        .map(|node| (title.clone(), node))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigNode::Sections),
            Value::Null => Err(invalid(at, "null")),
            Value::Bool(_) => Err(invalid(at, "a boolean")),
            Value::Number(_) => Err(invalid(at, "a number")),
        }
    }

    /// Every pattern in the tree, in declaration order.
    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ConfigNode::Pattern(p) => out.push(p),
            ConfigNode::List(items) => items.iter().for_each(|n| n.collect_patterns(out)),
            ConfigNode::Sections(sections) => {
                sections.iter().for_each(|(_, n)| n.collect_patterns(out))
            }
        }
    }
}

fn invalid(at: &str, found: &'static str) -> ConfigError {
    ConfigError::InvalidNode {
        at: at.to_string(),
        found,
    }
}

/// Parsed `fiction.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FictionConfig {
    /// Title of the whole document
    pub title: String,
    /// Document structure
    pub contents: ConfigNode,
    /// Given titles keyed by workspace-relative path (`/`-separated)
    pub titles: BTreeMap<String, String>,
}

impl FictionConfig {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build a config from an already parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let title = match value.get("title") {
            Some(Value::String(title)) => title.clone(),
            Some(_) => {
                return Err(ConfigError::NotAString {
                    at: "title".to_string(),
                });
            }
            None => return Err(ConfigError::MissingField("title")),
        };

        // `content` is what older workspaces were initialised with
        let contents = value
            .get("contents")
            .or_else(|| value.get("content"))
            .ok_or(ConfigError::MissingField("contents"))?;
        let contents = ConfigNode::from_value(contents)?;

        let mut titles = BTreeMap::new();
        if let Some(given) = value.get("titles") {
            let Value::Object(given) = given else {
                return Err(invalid("titles", "a non-mapping value"));
            };
            for (path, title) in given {
                let Value::String(title) = title else {
                    return Err(ConfigError::NotAString {
                        at: format!("titles.{path}"),
                    });
                };
                titles.insert(normalize_relative(path), title.clone());
            }
        }

        Ok(Self {
            title,
            contents,
            titles,
        })
    }

    /// Load a config from a local file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Given title for a workspace-relative path, if configured.
    pub fn given_title(&self, relative: &str) -> Option<&str> {
        self.titles.get(relative).map(String::as_str)
    }
}

/// Normalize a relative path for lookups: `/` separators, no leading `./`.
pub(crate) fn normalize_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_contents_in_declaration_order() {
        let config = FictionConfig::from_json(
            r#"{
                "title": "Book",
                "contents": { "Zeta": "z.md", "Alpha": ["a.md", { "Inner": "i/*.md" }] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.title, "Book");
        let ConfigNode::Sections(sections) = &config.contents else {
            panic!("expected sections, got {:?}", config.contents);
        };
        let titles: Vec<_> = sections.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["Zeta", "Alpha"]);
        assert_eq!(config.contents.patterns(), vec!["z.md", "a.md", "i/*.md"]);
    }

    #[test]
    fn accepts_content_alias() {
        let config = FictionConfig::from_json(r#"{ "title": "t", "content": [] }"#).unwrap();
        assert_eq!(config.contents, ConfigNode::List(vec![]));
    }

    #[test]
    fn missing_fields_are_reported() {
        let err = FictionConfig::from_json(r#"{ "contents": "a.md" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("title")));

        let err = FictionConfig::from_json(r#"{ "title": "t" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("contents")));
    }

    #[test]
    fn unrecognized_shapes_name_their_location() {
        let err =
            FictionConfig::from_json(r#"{ "title": "t", "contents": { "One": ["a.md", 3] } }"#)
                .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("contents.One[1]"), "{message}");
        assert!(message.contains("a number"), "{message}");
    }

    #[test]
    fn titles_are_normalized() {
        let config = FictionConfig::from_json(
            r#"{ "title": "t", "contents": "*.md", "titles": { "./ch1.md": "Prologue" } }"#,
        )
        .unwrap();
        assert_eq!(config.given_title("ch1.md"), Some("Prologue"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = FictionConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

//! Output formatting for diagnostics, trees and related-tag listings
//!
//! Lines and columns are printed 1-based.

use fictioner_core::related::display_path;
use fictioner_core::{Diagnostic, DocNode, RelatedRecord, Severity, Snapshot, Tag, TagKind};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Output format for `check`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render the diagnostics of a snapshot.
pub fn render_check(snapshot: &Snapshot, format: OutputFormat, verbose: bool) -> String {
    match format {
        OutputFormat::Text => render_check_text(snapshot, verbose),
        OutputFormat::Json => render_check_json(snapshot, verbose),
    }
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Error => "error".red().bold().to_string(),
        Severity::Warning => "warning".yellow().bold().to_string(),
        Severity::Info => "info".blue().bold().to_string(),
    }
}

fn location(snapshot: &Snapshot, tag: &Tag) -> String {
    let relative = snapshot
        .file(tag.file)
        .map(|f| f.relative.as_str())
        .unwrap_or("?");
    format!("{}:{}:{}", relative, tag.line + 1, tag.column + 1)
}

fn render_check_text(snapshot: &Snapshot, verbose: bool) -> String {
    let mut output = String::new();

    for warning in snapshot.warnings() {
        output.push_str(&format!("{} {}\n", "!".yellow().bold(), warning));
    }

    for (_, findings) in snapshot.diagnostics().iter() {
        for d in findings {
            let tag = snapshot.tag(d.tag);
            output.push_str(&format!(
                "{}: {} {} {}\n",
                location(snapshot, tag).bold(),
                severity_label(d.severity),
                d.message,
                tag.token.dimmed()
            ));
        }
    }

    if verbose {
        for tag in snapshot
            .tags()
            .iter()
            .filter(|t| t.kind == TagKind::Mention)
        {
            output.push_str(&format!(
                "{}: {} mention {}\n",
                location(snapshot, tag).dimmed(),
                severity_label(Severity::Info),
                tag.id.cyan()
            ));
        }
    }

    let diagnostics = snapshot.diagnostics();
    let errors = diagnostics.count(Severity::Error);
    let warnings = diagnostics.count(Severity::Warning);
    let infos = diagnostics.count(Severity::Info);
    let summary = format!(
        "{} errors, {} warnings, {} info in {} files ({} tags)",
        errors,
        warnings,
        infos,
        snapshot.files().len(),
        snapshot.tags().len()
    );
    if errors > 0 {
        output.push_str(&format!("\n{} {}\n", "✗".red().bold(), summary));
    } else if warnings > 0 {
        output.push_str(&format!("\n{} {}\n", "!".yellow().bold(), summary));
    } else {
        output.push_str(&format!("\n{} {}\n", "✓".green().bold(), summary));
    }

    output
}

#[derive(Serialize)]
struct JsonReport {
    title: String,
    generation: u64,
    files: usize,
    tags: usize,
    errors: usize,
    warnings: usize,
    diagnostics: Vec<JsonDiagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mentions: Vec<JsonTag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    config_warnings: Vec<String>,
}

#[derive(Serialize)]
struct JsonDiagnostic {
    file: String,
    line: usize,
    column: usize,
    end_column: usize,
    severity: &'static str,
    message: String,
    token: String,
}

#[derive(Serialize)]
struct JsonTag {
    file: String,
    line: usize,
    column: usize,
    id: String,
}

fn json_diagnostic(snapshot: &Snapshot, d: &Diagnostic) -> JsonDiagnostic {
    let tag = snapshot.tag(d.tag);
    JsonDiagnostic {
        file: relative_of(snapshot, tag),
        line: d.range.line + 1,
        column: d.range.start + 1,
        end_column: d.range.end + 1,
        severity: d.severity.as_str(),
        message: d.message.clone(),
        token: tag.token.clone(),
    }
}

fn relative_of(snapshot: &Snapshot, tag: &Tag) -> String {
    snapshot
        .file(tag.file)
        .map(|f| f.relative.clone())
        .unwrap_or_default()
}

fn render_check_json(snapshot: &Snapshot, verbose: bool) -> String {
    let diagnostics = snapshot.diagnostics();
    let report = JsonReport {
        title: snapshot.title().to_string(),
        generation: snapshot.generation(),
        files: snapshot.files().len(),
        tags: snapshot.tags().len(),
        errors: diagnostics.count(Severity::Error),
        warnings: diagnostics.count(Severity::Warning),
        diagnostics: diagnostics
            .iter()
            .flat_map(|(_, found)| found)
            .map(|d| json_diagnostic(snapshot, d))
            .collect(),
        mentions: if verbose {
            snapshot
                .tags()
                .iter()
                .filter(|t| t.kind == TagKind::Mention)
                .map(|t| JsonTag {
                    file: relative_of(snapshot, t),
                    line: t.line + 1,
                    column: t.column + 1,
                    id: t.id.clone(),
                })
                .collect()
        } else {
            Vec::new()
        },
        config_warnings: snapshot.warnings().to_vec(),
    };

    // plain structs of strings and numbers always serialize
    serde_json::to_string_pretty(&report).unwrap_or_default()
}

/// Render the section, file and tag forest.
pub fn render_tree(snapshot: &Snapshot) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", snapshot.title().bold()));
    for node in snapshot.tree() {
        render_node(snapshot, node, 1, &mut output);
    }
    output
}

fn render_node(snapshot: &Snapshot, node: &DocNode, depth: usize, output: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        DocNode::Section { title, children } => {
            output.push_str(&format!("{}{}\n", indent, title.cyan().bold()));
            for child in children {
                render_node(snapshot, child, depth + 1, output);
            }
        }
        DocNode::File(ordinal) => {
            let Some(file) = snapshot.file(*ordinal) else {
                return;
            };
            let summary = snapshot.file_summary(*ordinal);
            let mut markers = String::new();
            if summary.errors > 0 {
                markers.push_str(&format!(" {}", format!("✗ {}", summary.errors).red()));
            }
            if summary.warnings > 0 {
                markers.push_str(&format!(" {}", format!("⚠ {}", summary.warnings).yellow()));
            }
            output.push_str(&format!(
                "{}{} {}{}\n",
                indent,
                file.title(),
                format!("({})", file.relative).dimmed(),
                markers
            ));
            for tag in snapshot.tags_in(*ordinal) {
                let note = match &tag.annotation {
                    Some(a) => format!(" {} {}", severity_label(a.severity), a.message),
                    None => String::new(),
                };
                output.push_str(&format!(
                    "{}  {} {}{}\n",
                    indent,
                    format!("{}:", tag.line + 1).dimmed(),
                    tag.token,
                    note
                ));
            }
        }
    }
}

/// Render related records: a `<path: line tags>` header and context per
/// related location, and a separator where the cursor's own line falls.
pub fn render_related(snapshot: &Snapshot, records: &[RelatedRecord]) -> String {
    let mut output = String::new();
    for record in records {
        match record {
            RelatedRecord::Current { .. } => {
                output.push_str("======================================\n\n");
            }
            RelatedRecord::Related {
                path,
                line,
                context,
                ..
            } => {
                output.push_str(&format!(
                    "<{}: {} {}>\n{}\n",
                    display_path(snapshot, path).display(),
                    line + 1,
                    record.comment_body().unwrap_or_default(),
                    context
                ));
            }
        }
    }
    output
}

/// Render one line per item.
pub fn render_lines<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    items.into_iter().map(|item| format!("{item}\n")).collect()
}

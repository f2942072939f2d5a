// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns Figment errors into miette diagnostics.
//!
//! Unknown keys get a source span when the offending file can be located and
//! a "did you mean" hint from Jaro-Winkler similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler score for a suggestion (`verfy_token` -> `verify_token`).
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, renderable as a miette report.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(courier::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted in the same table.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(courier::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(courier::config::missing_key),
        help("add `{key} = <value>` to courier.toml or set it through a COURIER_ variable")
    )]
    MissingKey { key: String },

    /// A value parsed but is semantically wrong.
    #[error("validation error: {message}")]
    #[diagnostic(code(courier::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(courier::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error carried by a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` pairs file paths with their contents so unknown keys can be
/// pointed at.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let dotted_path = error
                .path
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &dotted_path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(&dotted_path, field),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: dotted_path.join("."),
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn qualified(path: &[String], field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", path.join("."))
    }
}

fn locate(
    error: &figment::Error,
    path: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(file)) => file.display().to_string(),
        // Inline strings have no file source; fall back to the single inline entry.
        _ => match toml_sources {
            [(name, _)] => name.clone(),
            _ => return (None, None),
        },
    };

    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == origin) else {
        return (None, None);
    };
    match find_key_offset(content, path, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[path[0]]` table of `content`, or from
/// the top of the file when `path` is empty.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && !path.is_empty() {
            // Next table reached without finding the key.
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(field) {
            if rest.trim_start().starts_with('=') {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Best valid key above the similarity threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

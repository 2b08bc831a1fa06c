//! Configuration errors, reported against the dotted key they concern
//! (`network.max_priority`) so the matching `FAULTLINE_NETWORK__MAX_PRIORITY`
//! variable or YAML entry is easy to find.

use std::path::PathBuf;

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// A value could not be read into its field.
    #[error("cannot read configuration key '{key}': {source}")]
    Unreadable {
        key: String,
        #[source]
        source: Box<figment::Error>,
    },

    /// Values were read but break a constraint; one entry per offending key.
    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    /// Keys named by an [`ConfigError::Invalid`] error, in order.
    pub fn invalid_keys(&self) -> Vec<&str> {
        match self {
            ConfigError::Invalid(entries) => entries
                .iter()
                .filter_map(|entry| entry.split(':').next())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        let key = if err.path.is_empty() {
            "<root>".to_string()
        } else {
            err.path.join(".")
        };
        ConfigError::Unreadable {
            key,
            source: Box::new(err),
        }
    }
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        let mut entries = Vec::new();
        flatten("", &errors, &mut entries);
        entries.sort();
        ConfigError::Invalid(entries)
    }
}

/// Walks nested sections; struct-level checks are reported on the section key.
fn flatten(prefix: &str, errors: &ValidationErrors, entries: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let key = match (prefix.is_empty(), field.as_ref()) {
            (_, "__all__") => prefix.to_string(),
            (true, field) => field.to_string(),
            (false, field) => format!("{}.{}", prefix, field),
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let reason = failure
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| failure.code.replace('_', " "));
                    entries.push(format!("{}: {}", key, reason));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&key, inner, entries),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(&format!("{}[{}]", key, index), inner, entries);
                }
            }
        }
    }
}

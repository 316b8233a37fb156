//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("malformed JSON in {}: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser error with line and column.
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON whose values do not fit the settings types
    /// (unknown enum variant, string where a number belongs, ...).
    #[error("settings do not match the schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// A value is well-typed but violates a constraint.
    #[error("invalid setting {field}: {reason}")]
    InvalidValue {
        /// Dotted camelCase path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/botkb/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read /etc/botkb/settings.json: denied");
        assert!(err.source().is_some());
    }

    #[test]
    fn parse_error_keeps_position() {
        let source = serde_json::from_str::<serde_json::Value>("{\n  \"index\": }").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("settings.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("malformed JSON in settings.json"), "{msg}");
        assert!(msg.contains("line 2"), "{msg}");
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue {
            field: "retrieval.topK",
            reason: "must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting retrieval.topK: must be at least 1"
        );
    }
}

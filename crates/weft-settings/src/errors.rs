//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File being loaded.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File being loaded.
        path: PathBuf,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
    /// The merged settings do not fit the settings schema.
    #[error("settings do not match schema: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value is unusable (empty endpoint, zero capacity).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_errors_name_the_path() {
        let err = SettingsError::Read {
            path: PathBuf::from("/home/u/.weft/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read /home/u/.weft/settings.json: denied"
        );
    }

    #[test]
    fn schema_mismatch_converts_from_json_error() {
        let json_err = serde_json::from_str::<u64>("\"fast\"").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().starts_with("settings do not match schema"));
    }
}

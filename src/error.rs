use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpiceError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt record {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    RawIo(#[from] std::io::Error),

    #[error("{0}")]
    InputValidation(String),
}

impl SpiceError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SpiceError::CorruptRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error, mapping `NotFound` onto the `NotFound` variant.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SpiceError::NotFound(path.display().to_string())
        } else {
            SpiceError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SpiceError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SpiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = SpiceError::io(
            "/tmp/missing",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: /tmp/missing");
    }

    #[test]
    fn io_other_keeps_path() {
        let err = SpiceError::io(
            "/tmp/locked",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        match err {
            SpiceError::Io { path, .. } => assert_eq!(path, PathBuf::from("/tmp/locked")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn corrupt_record_message() {
        let err = SpiceError::corrupt("/p/result.txt", "missing metric line");
        assert_eq!(
            err.to_string(),
            "Corrupt record /p/result.txt: missing metric line"
        );
    }
}

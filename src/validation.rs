//! Input checks run before anything is written to a project.
//!
//! Failures come back as [`SpiceError::InputValidation`] carrying a short
//! message meant for the end user.

use std::collections::HashSet;
use std::hash::Hash;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, SpiceError};

const READ_CHUNK: usize = 8192;

/// Stream `reader` to the end and return its size, failing as soon as more
/// than `max_bytes` have been seen.
pub async fn check_upload_size<R>(reader: &mut R, max_bytes: u64) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut size: u64 = 0;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(size);
        }
        size += n as u64;
        if size > max_bytes {
            return Err(SpiceError::InputValidation(format!(
                "File exceeds the maximum allowed size ({}MB)",
                max_bytes / (1024 * 1024)
            )));
        }
    }
}

pub fn check_unique_ids<T: AsRef<str>>(ids: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_ref()) {
            return Err(SpiceError::InputValidation(format!(
                "File contains duplicate id: {}",
                id.as_ref()
            )));
        }
    }
    Ok(())
}

/// `provided` must name exactly the same set of ids as `expected`.
pub fn check_ids_match<T: Eq + Hash>(expected: &[T], provided: &[T]) -> Result<()> {
    let expected: HashSet<&T> = expected.iter().collect();
    let provided: HashSet<&T> = provided.iter().collect();
    if expected != provided {
        return Err(SpiceError::InputValidation(
            "Ids in provided file do not correspond to ids in project".to_string(),
        ));
    }
    Ok(())
}

/// User and project ids become directory names, so they may not be empty,
/// hidden, or contain path separators.
pub fn check_identifier(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value.starts_with('.')
        || value.contains(['/', '\\', '\0'])
        || value.chars().any(char::is_whitespace);
    if invalid {
        return Err(SpiceError::InputValidation(format!(
            "Invalid {kind}: '{value}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_within_limit() {
        let data = vec![b'A'; 20_000];
        let size = check_upload_size(&mut data.as_slice(), 20_000).await.unwrap();
        assert_eq!(size, 20_000);
    }

    #[tokio::test]
    async fn upload_over_limit() {
        let data = vec![b'A'; 20_001];
        let err = check_upload_size(&mut data.as_slice(), 20_000)
            .await
            .unwrap_err();
        assert!(matches!(err, SpiceError::InputValidation(_)));
    }

    #[test]
    fn duplicate_ids_rejected() {
        assert!(check_unique_ids(&["p1", "p2"]).is_ok());
        let err = check_unique_ids(&["p1", "p2", "p1"]).unwrap_err();
        assert_eq!(err.to_string(), "File contains duplicate id: p1");
    }

    #[test]
    fn id_sets_must_match() {
        assert!(check_ids_match(&["a", "b"], &["b", "a"]).is_ok());
        assert!(check_ids_match(&["a", "b"], &["a"]).is_err());
        assert!(check_ids_match(&["a"], &["a", "c"]).is_err());
    }

    #[test]
    fn identifiers() {
        assert!(check_identifier("project id", "kinases_2").is_ok());
        for bad in ["", ".hidden", "a/b", "a\\b", "two words"] {
            assert!(check_identifier("project id", bad).is_err(), "{bad}");
        }
    }
}

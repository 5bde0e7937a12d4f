use crate::error::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Number of hex characters kept from the SHA-256 digest.
pub const DOC_ID_LEN: usize = 16;

/// Content-addressed document id: the first [`DOC_ID_LEN`] hex characters of
/// the SHA-256 of the raw bytes. Independent of file name and location.
pub fn identify(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..DOC_ID_LEN].to_string()
}

pub fn identify_file(path: &Path) -> Result<String, IngestError> {
    let bytes = read_source(path)?;
    Ok(identify(&bytes))
}

/// Reads a source file, mapping a missing or non-regular path to `NotFound`.
pub fn read_source(path: &Path) -> Result<Vec<u8>, IngestError> {
    if !path.is_file() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

pub fn source_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn identifier_is_reproducible_and_truncated() {
        let first = identify(b"%PDF-1.4 some bytes");
        let second = identify(b"%PDF-1.4 some bytes");
        assert_eq!(first, second);
        assert_eq!(first.len(), DOC_ID_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identifier_ignores_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("renamed copy.pdf");
        fs::write(&a, b"same content")?;
        fs::write(&b, b"same content")?;

        assert_eq!(identify_file(&a)?, identify_file(&b)?);
        assert_ne!(identify(b"same content"), identify(b"other content"));
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = identify_file(Path::new("/definitely/not/here.pdf"));
        assert!(matches!(result, Err(IngestError::NotFound(_))));
    }

    #[test]
    fn directory_is_not_a_source() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(matches!(
            identify_file(dir.path()),
            Err(IngestError::NotFound(_))
        ));
        Ok(())
    }
}

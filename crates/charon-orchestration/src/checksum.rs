//! SHA-256 of files on disk

use crate::retry::{RetryPolicy, retry_io};
use futures_lite::AsyncReadExt;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of the file at `path`
pub async fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = async_fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// [`sha256_file`], retried while the file is transiently unavailable
pub async fn sha256_file_with_retry(path: &Path, policy: &RetryPolicy) -> io::Result<String> {
    retry_io(policy, || sha256_file(path)).await
}

/// Case-insensitive comparison of two hex digests
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn test_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.bin");
        std::fs::write(&path, b"abc").unwrap();

        let digest = sha256_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(digests_match(&digest.to_uppercase(), &digest));
    }

    #[smol_potat::test]
    async fn test_missing_file_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_file_with_retry(&dir.path().join("missing"), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

//! File hashing for artifact verification.

use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-1 of a file as lowercase hex, read in fixed-size chunks so large
/// artifacts never get pulled into memory whole.
pub async fn sha1_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash comparison; manifests are not consistent about hex case.
pub fn hash_matches(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

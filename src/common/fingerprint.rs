//! Content fingerprints used for upload deduplication.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 64 * 1024;

/// SHA-256 over the whole stream, lowercase hex.
pub async fn fingerprint<R>(mut reader: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub async fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    fingerprint(tokio::io::BufReader::new(file)).await
}

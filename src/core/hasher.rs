//! 文件内容指纹 - 用于判断文件是否变化

use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// 默认分块大小（64KB）
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
/// 最小分块大小（4KB）
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// 文件内容指纹（完整的 BLAKE3 摘要，不截断）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; blake3::OUT_LEN]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// 分块流式计算文件指纹
#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
        }
    }

    /// 计算文件指纹，内存占用不超过一个分块
    pub async fn hash(&self, path: &Path) -> SyncResult<Fingerprint> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::io("hash", path, e))?;

        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| SyncError::io("hash", path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize().into())
    }

    /// 计算内存数据的指纹
    pub fn hash_bytes(data: &[u8]) -> Fingerprint {
        blake3::hash(data).into()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_same_content_same_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("nested_b.dat");
        std::fs::write(&a, "hello").unwrap();
        std::fs::write(&b, "hello").unwrap();

        let hasher = ContentHasher::default();
        let fa = hasher.hash(&a).await.unwrap();
        let fb = hasher.hash(&b).await.unwrap();

        assert_eq!(fa, fb);
        assert_eq!(fa, hasher.hash(&a).await.unwrap());
        assert_eq!(fa, ContentHasher::hash_bytes(b"hello"));
    }

    #[tokio::test]
    async fn test_one_byte_difference() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "hello world").unwrap();
        std::fs::write(&b, "hello worle").unwrap();

        let hasher = ContentHasher::default();
        assert_ne!(
            hasher.hash(&a).await.unwrap(),
            hasher.hash(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_multi_chunk_file_matches_whole_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        // 跨越多个分块且末块不满
        let data: Vec<u8> = (0..(MIN_CHUNK_SIZE * 3 + 123))
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &data).unwrap();

        let hasher = ContentHasher::new(1);
        assert_eq!(hasher.chunk_size, MIN_CHUNK_SIZE);
        assert_eq!(
            hasher.hash(&path).await.unwrap(),
            ContentHasher::hash_bytes(&data)
        );
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, "").unwrap();

        let fp = ContentHasher::default().hash(&path).await.unwrap();
        assert_eq!(fp, ContentHasher::hash_bytes(b""));
        assert_eq!(fp.to_hex().len(), 64);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ContentHasher::default()
            .hash(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Io { op: "hash", .. }));
    }
}

//! 同步错误类型

use crate::storage::EntryKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 源目录不存在或不是目录
    #[error("source folder '{}' does not exist", path.display())]
    SourceMissing { path: PathBuf },

    /// 同一相对路径在两侧类型不同（文件 vs 目录）
    #[error(
        "kind conflict at '{}': {source_kind} in source, {replica_kind} in replica",
        path.display()
    )]
    KindConflict {
        path: PathBuf,
        source_kind: EntryKind,
        replica_kind: EntryKind,
    },

    /// 单个条目的 IO 错误
    #[error("{op} failed for '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 目录遍历错误
    #[error("walk failed under '{}': {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// 审计日志写入失败
    #[error("failed to write audit log: {0}")]
    Log(#[source] io::Error),

    /// 排除规则无效
    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// 阻塞任务异常退出
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// 是否属于单条目错误（加固模式下可以跳过继续）
    pub fn is_per_entry(&self) -> bool {
        matches!(
            self,
            SyncError::Io { .. } | SyncError::KindConflict { .. } | SyncError::Walk { .. }
        )
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_conflict_message() {
        let err = SyncError::KindConflict {
            path: PathBuf::from("docs/readme"),
            source_kind: EntryKind::Dir,
            replica_kind: EntryKind::File,
        };
        assert_eq!(
            err.to_string(),
            "kind conflict at 'docs/readme': directory in source, file in replica"
        );
        assert!(err.is_per_entry());
    }

    #[test]
    fn test_log_error_is_not_per_entry() {
        let err = SyncError::Log(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_per_entry());
    }
}

use crate::core::hasher::ContentHasher;
use crate::error::{SyncError, SyncResult};
use crate::storage::{DirEntry, EntryKind};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// 同步动作（每个动作对应一条审计日志）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 创建目录
    CreateFolder {
        path: PathBuf,
        /// 是否是副本根目录
        root: bool,
    },
    /// 复制文件：源路径 -> 副本路径
    CopyFile {
        source: PathBuf,
        dest: PathBuf,
        bytes: u64,
        reason: CopyReason,
    },
    /// 删除副本中多余的文件
    RemoveFile { path: PathBuf },
    /// 递归删除副本中多余的目录
    RemoveFolder { path: PathBuf },
}

/// 复制原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// 副本中不存在
    Missing,
    /// 内容指纹不同
    Changed,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateFolder { path, root: true } => {
                write!(f, "🗂 Created replica folder: {}", path.display())
            }
            SyncAction::CreateFolder { path, root: false } => {
                write!(f, "📁 Created folder: {}", path.display())
            }
            SyncAction::CopyFile { source, dest, .. } => {
                write!(f, "📄 Copied file: {} ➡️ {}", source.display(), dest.display())
            }
            SyncAction::RemoveFile { path } => write!(f, "❌ Removed file: {}", path.display()),
            SyncAction::RemoveFolder { path } => {
                write!(f, "❌ Removed folder: {}", path.display())
            }
        }
    }
}

/// 文件比较结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRelation {
    /// 内容相同
    Equal,
    /// 内容不同
    Different,
}

/// 比较配置
#[derive(Debug, Clone, Default)]
pub struct CompareConfig {
    /// 大小和修改时间都相同时直接认为相同，不计算指纹
    pub quick_check: bool,
}

/// 文件比较器
pub struct FileComparator {
    config: CompareConfig,
    hasher: ContentHasher,
}

impl FileComparator {
    pub fn new(config: CompareConfig, hasher: ContentHasher) -> Self {
        Self { config, hasher }
    }

    /// 比较两个已存在的文件
    ///
    /// `entry` 是扫描源目录时得到的条目，快速检查直接使用其中的大小和修改时间
    pub async fn compare_files(
        &self,
        entry: &DirEntry,
        source: &Path,
        replica: &Path,
    ) -> SyncResult<FileRelation> {
        if self.config.quick_check {
            let dst_meta = fs::metadata(replica)
                .await
                .map_err(|e| SyncError::io("stat", replica, e))?;

            if entry.size != dst_meta.len() {
                debug!(
                    "文件大小不同: {:?} (src={}, dst={})",
                    source,
                    entry.size,
                    dst_meta.len()
                );
                return Ok(FileRelation::Different);
            }

            // 按完整精度比较，同一秒内的修改也能识别
            if entry.modified.is_some() && entry.modified == dst_meta.modified().ok() {
                return Ok(FileRelation::Equal);
            }
            // 时间不同，回退到指纹比较
        }

        let src_sum = self.hasher.hash(source).await?;
        let dst_sum = self.hasher.hash(replica).await?;

        if src_sum == dst_sum {
            Ok(FileRelation::Equal)
        } else {
            debug!("文件指纹不同: {:?} (src={}, dst={})", source, src_sum, dst_sum);
            Ok(FileRelation::Different)
        }
    }

    /// 检查副本中同一路径的条目类型，返回副本中是否已存在同类条目
    ///
    /// 类型不一致时返回 `KindConflict`，不做任何覆盖
    pub fn check_kind(
        relative: &Path,
        source_kind: EntryKind,
        replica_kind: Option<EntryKind>,
    ) -> SyncResult<bool> {
        match replica_kind {
            None => Ok(false),
            Some(kind) if kind == source_kind => Ok(true),
            Some(kind) => Err(SyncError::KindConflict {
                path: relative.to_path_buf(),
                source_kind,
                replica_kind: kind,
            }),
        }
    }

    /// 统计同步动作
    pub fn summarize_actions(actions: &[SyncAction]) -> ActionSummary {
        let mut summary = ActionSummary::default();

        for action in actions {
            match action {
                SyncAction::CreateFolder { .. } => summary.folders_created += 1,
                SyncAction::CopyFile { bytes, .. } => {
                    summary.files_copied += 1;
                    summary.bytes_copied += bytes;
                }
                SyncAction::RemoveFile { .. } => summary.files_removed += 1,
                SyncAction::RemoveFolder { .. } => summary.folders_removed += 1,
            }
        }

        summary
    }
}

impl Default for FileComparator {
    fn default() -> Self {
        Self::new(CompareConfig::default(), ContentHasher::default())
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub folders_created: usize,
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub files_removed: usize,
    pub folders_removed: usize,
}

impl ActionSummary {
    pub fn total_actions(&self) -> usize {
        self.folders_created + self.files_copied + self.files_removed + self.folders_removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn scanned(path: &Path) -> DirEntry {
        DirEntry::from_metadata(PathBuf::from("x"), &std::fs::metadata(path).unwrap())
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_action_messages() {
        let create_root = SyncAction::CreateFolder {
            path: PathBuf::from("/r"),
            root: true,
        };
        let create = SyncAction::CreateFolder {
            path: PathBuf::from("/r/sub"),
            root: false,
        };
        let copy = SyncAction::CopyFile {
            source: PathBuf::from("/s/a.txt"),
            dest: PathBuf::from("/r/a.txt"),
            bytes: 5,
            reason: CopyReason::Missing,
        };
        let remove_file = SyncAction::RemoveFile {
            path: PathBuf::from("/r/old.txt"),
        };
        let remove_folder = SyncAction::RemoveFolder {
            path: PathBuf::from("/r/old"),
        };

        assert_eq!(create_root.to_string(), "🗂 Created replica folder: /r");
        assert_eq!(create.to_string(), "📁 Created folder: /r/sub");
        assert_eq!(copy.to_string(), "📄 Copied file: /s/a.txt ➡️ /r/a.txt");
        assert_eq!(remove_file.to_string(), "❌ Removed file: /r/old.txt");
        assert_eq!(remove_folder.to_string(), "❌ Removed folder: /r/old");
    }

    #[test]
    fn test_check_kind() {
        let rel = Path::new("x");
        assert!(!FileComparator::check_kind(rel, EntryKind::File, None).unwrap());
        assert!(FileComparator::check_kind(rel, EntryKind::Dir, Some(EntryKind::Dir)).unwrap());

        let err = FileComparator::check_kind(rel, EntryKind::File, Some(EntryKind::Dir)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::KindConflict {
                source_kind: EntryKind::File,
                replica_kind: EntryKind::Dir,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_compare_by_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();
        std::fs::write(&c, "diff").unwrap();

        let comparator = FileComparator::default();
        assert_eq!(
            comparator.compare_files(&scanned(&a), &a, &b).await.unwrap(),
            FileRelation::Equal
        );
        assert_eq!(
            comparator.compare_files(&scanned(&a), &a, &c).await.unwrap(),
            FileRelation::Different
        );
    }

    #[tokio::test]
    async fn test_quick_check_short_circuits_on_matching_metadata() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "aaaa").unwrap();
        std::fs::write(&b, "bbbb").unwrap();
        let when = SystemTime::now() - Duration::from_secs(600);
        set_mtime(&a, when);
        set_mtime(&b, when);

        let quick = FileComparator::new(
            CompareConfig { quick_check: true },
            ContentHasher::default(),
        );
        // 大小和时间相同，不读取内容
        assert_eq!(
            quick.compare_files(&scanned(&a), &a, &b).await.unwrap(),
            FileRelation::Equal
        );

        // 时间不同时回退到精确的指纹比较
        set_mtime(&b, when - Duration::from_secs(60));
        assert_eq!(
            quick.compare_files(&scanned(&a), &a, &b).await.unwrap(),
            FileRelation::Different
        );

        // 默认配置始终比较指纹
        set_mtime(&b, when);
        assert_eq!(
            FileComparator::default()
                .compare_files(&scanned(&a), &a, &b)
                .await
                .unwrap(),
            FileRelation::Different
        );
    }

    #[tokio::test]
    async fn test_quick_check_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "short").unwrap();
        std::fs::write(&b, "much longer").unwrap();

        let quick = FileComparator::new(
            CompareConfig { quick_check: true },
            ContentHasher::default(),
        );
        assert_eq!(
            quick.compare_files(&scanned(&a), &a, &b).await.unwrap(),
            FileRelation::Different
        );
    }

    #[tokio::test]
    async fn test_quick_check_same_second_edit_detected() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "v2").unwrap();
        std::fs::write(&b, "v1").unwrap();

        // 同一秒内的两个时间点
        let second = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&a, second + Duration::from_millis(600));
        set_mtime(&b, second + Duration::from_millis(100));

        let quick = FileComparator::new(
            CompareConfig { quick_check: true },
            ContentHasher::default(),
        );
        assert_eq!(
            quick.compare_files(&scanned(&a), &a, &b).await.unwrap(),
            FileRelation::Different
        );
    }

    #[tokio::test]
    async fn test_quick_check_uses_scanned_metadata() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();

        // 扫描得到的大小与副本不同，不再重新读取源文件
        let mut entry = scanned(&a);
        entry.size = 99;
        let quick = FileComparator::new(
            CompareConfig { quick_check: true },
            ContentHasher::default(),
        );
        assert_eq!(
            quick.compare_files(&entry, &a, &b).await.unwrap(),
            FileRelation::Different
        );
    }

    #[test]
    fn test_summarize_actions() {
        let actions = vec![
            SyncAction::CreateFolder {
                path: PathBuf::from("r"),
                root: true,
            },
            SyncAction::CopyFile {
                source: PathBuf::from("s/a"),
                dest: PathBuf::from("r/a"),
                bytes: 10,
                reason: CopyReason::Missing,
            },
            SyncAction::CopyFile {
                source: PathBuf::from("s/b"),
                dest: PathBuf::from("r/b"),
                bytes: 32,
                reason: CopyReason::Changed,
            },
            SyncAction::RemoveFile {
                path: PathBuf::from("r/c"),
            },
            SyncAction::RemoveFolder {
                path: PathBuf::from("r/d"),
            },
        ];

        let summary = FileComparator::summarize_actions(&actions);
        assert_eq!(summary.folders_created, 1);
        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.bytes_copied, 42);
        assert_eq!(summary.files_removed, 1);
        assert_eq!(summary.folders_removed, 1);
        assert_eq!(summary.total_actions(), 5);
    }
}

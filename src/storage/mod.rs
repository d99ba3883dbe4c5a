pub mod local;

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use local::LocalWalker;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    File,
    Dir,
    /// 无法镜像的条目：失效的符号链接、FIFO、socket、设备文件等
    Other,
}

impl EntryKind {
    /// 按元数据分类（元数据应已跟随符号链接）
    pub fn of(metadata: &Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Dir => write!(f, "directory"),
            EntryKind::Other => write!(f, "special file"),
        }
    }
}

/// 目录条目（路径相对于所在树的根目录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 相对路径，根目录本身为空路径
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl DirEntry {
    /// 按元数据分类；目录大小记为 0
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let kind = EntryKind::of(metadata);
        Self {
            path,
            kind,
            size: if kind == EntryKind::File { metadata.len() } else { 0 },
            modified: metadata.modified().ok(),
        }
    }

    /// 无法读取元数据的条目（如失效的符号链接）
    pub fn other(path: PathBuf) -> Self {
        Self {
            path,
            kind: EntryKind::Other,
            size: 0,
            modified: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// 路径层级深度，根目录为 0
    pub fn depth(&self) -> usize {
        self.path.components().count()
    }
}

/// 遍历中无法读取的条目，其子树未被列出
#[derive(Debug)]
pub struct WalkFailure {
    /// 相对路径
    pub path: PathBuf,
    pub error: SyncError,
}

/// 一次遍历的结果
#[derive(Debug, Default)]
pub struct TreeListing {
    pub entries: Vec<DirEntry>,
    pub failures: Vec<WalkFailure>,
}

/// 目录树遍历接口
#[async_trait]
pub trait TreeWalker: Send + Sync {
    /// 递归列出 root 下的所有条目（包括 root 本身），不保证顺序
    ///
    /// root 本身无法读取时返回错误；其下单个条目的错误收集在 `failures` 中
    async fn walk(&self, root: &Path) -> SyncResult<TreeListing>;

    /// 获取遍历器名称（用于日志）
    fn name(&self) -> &str;
}

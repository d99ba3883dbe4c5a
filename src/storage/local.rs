use super::{DirEntry, EntryKind, TreeListing, TreeWalker, WalkFailure};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::fs::{FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 本地文件系统遍历器
pub struct LocalWalker {
    follow_links: bool,
    name: String,
}

impl LocalWalker {
    pub fn new(follow_links: bool) -> Self {
        let name = if follow_links {
            "local(follow-links)".to_string()
        } else {
            "local".to_string()
        };
        Self { follow_links, name }
    }
}

impl Default for LocalWalker {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl TreeWalker for LocalWalker {
    async fn walk(&self, root: &Path) -> SyncResult<TreeListing> {
        let root = root.to_path_buf();
        let follow_links = self.follow_links;

        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || walk_blocking(&root, follow_links)).await?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn walk_blocking(root: &Path, follow_links: bool) -> SyncResult<TreeListing> {
    let mut listing = TreeListing::default();

    for item in WalkDir::new(root).follow_links(follow_links) {
        let item = match item {
            Ok(item) => item,
            // 根目录本身无法读取时整体失败
            Err(source) if source.depth() == 0 => {
                return Err(SyncError::Walk {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(source) => {
                let path = source.path().unwrap_or(root).to_path_buf();
                let relative = relative_to(root, &path);

                // 跟随链接时失效的链接也会在这里出现
                if is_dangling_link(&source, &path) {
                    debug!("失效的符号链接: {:?}", path);
                    listing.entries.push(DirEntry::other(relative));
                    continue;
                }

                warn!("无法遍历 {:?}: {}", path, source);
                listing.failures.push(WalkFailure {
                    path: relative,
                    error: SyncError::Walk { path, source },
                });
                continue;
            }
        };

        let path = item.path();
        let relative = relative_to(root, path);

        // 符号链接按其目标分类；未跟随时目录链接不会被展开
        let metadata = if item.path_is_symlink() {
            std::fs::metadata(path)
        } else {
            item.metadata().map_err(io::Error::from)
        };

        match metadata {
            Ok(metadata) => {
                let entry = DirEntry::from_metadata(relative, &metadata);
                if entry.kind == EntryKind::Other {
                    debug!("特殊文件: {:?}", path);
                }
                listing.entries.push(entry);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && item.path_is_symlink() => {
                debug!("失效的符号链接: {:?}", path);
                listing.entries.push(DirEntry::other(relative));
            }
            Err(e) => {
                warn!("无法读取元数据 {:?}: {}", path, e);
                listing.failures.push(WalkFailure {
                    path: relative,
                    error: SyncError::io("stat", path, e),
                });
            }
        }
    }

    Ok(listing)
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn is_dangling_link(err: &walkdir::Error, path: &Path) -> bool {
    let not_found = err
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
    not_found
        && std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// 获取路径的条目类型（跟随符号链接），不存在时返回 None
///
/// 失效的符号链接返回 `EntryKind::Other`
pub async fn entry_kind(path: &Path) -> SyncResult<Option<EntryKind>> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(Some(EntryKind::of(&metadata))),
        // 上级路径是文件时同样视为不存在
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            match fs::symlink_metadata(path).await {
                Ok(_) => Ok(Some(EntryKind::Other)),
                Err(_) => Ok(None),
            }
        }
        Err(e) => Err(SyncError::io("stat", path, e)),
    }
}

pub async fn create_dir_all(path: &Path) -> SyncResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| SyncError::io("create_dir", path, e))
}

pub async fn remove_file(path: &Path) -> SyncResult<()> {
    fs::remove_file(path)
        .await
        .map_err(|e| SyncError::io("remove_file", path, e))
}

pub async fn remove_dir_all(path: &Path) -> SyncResult<()> {
    fs::remove_dir_all(path)
        .await
        .map_err(|e| SyncError::io("remove_dir", path, e))
}

/// 逐字节复制文件，并还原源文件的修改/访问时间，返回复制的字节数
pub async fn copy_with_metadata(from: &Path, to: &Path) -> SyncResult<u64> {
    let bytes = fs::copy(from, to)
        .await
        .map_err(|e| SyncError::io("copy", from, e))?;

    let from = from.to_path_buf();
    let to = to.to_path_buf();
    tokio::task::spawn_blocking(move || restore_times(&from, &to)).await??;

    Ok(bytes)
}

fn restore_times(from: &Path, to: &Path) -> SyncResult<()> {
    let metadata = std::fs::metadata(from).map_err(|e| SyncError::io("stat", from, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| SyncError::io("stat", from, e))?;

    let mut times = FileTimes::new().set_modified(modified);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }

    // 只读副本也需要能设置时间：Unix 上属主可通过只读句柄设置
    #[cfg(windows)]
    let file = OpenOptions::new().write(true).open(to);
    #[cfg(not(windows))]
    let file = OpenOptions::new().read(true).open(to);

    file.and_then(|f| f.set_times(times))
        .map_err(|e| SyncError::io("set_times", to, e))
}

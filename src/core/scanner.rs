use crate::error::{SyncError, SyncResult};
use crate::storage::{DirEntry, TreeListing, TreeWalker};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 遍历顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// 父目录先于子条目
    TopDown,
    /// 子条目先于父目录
    BottomUp,
}

/// 文件扫描器：遍历目录树，应用排除规则，并按显式顺序排列
pub struct FileScanner {
    walker: Arc<dyn TreeWalker>,
    excludes: Vec<Regex>,
}

impl FileScanner {
    pub fn with_excludes(walker: Arc<dyn TreeWalker>, patterns: &[String]) -> SyncResult<Self> {
        let excludes = patterns
            .iter()
            .map(|pattern| {
                Regex::new(&glob_to_regex(pattern)).map_err(|source| SyncError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self { walker, excludes })
    }

    /// 扫描目录树，条目按指定顺序排列；被排除路径下的遍历错误一并丢弃
    pub async fn scan(&self, root: &Path, order: WalkOrder) -> SyncResult<TreeListing> {
        let listing = self.walker.walk(root).await?;
        let total = listing.entries.len();

        let mut kept: Vec<DirEntry> = listing
            .entries
            .into_iter()
            .filter(|entry| entry.is_root() || !self.is_excluded(&entry.path))
            .collect();
        let failures = listing
            .failures
            .into_iter()
            .filter(|failure| !self.is_excluded(&failure.path))
            .collect();

        debug!(
            "扫描 {:?} ({}): {} 个条目, {} 个被排除",
            root,
            self.walker.name(),
            kept.len(),
            total - kept.len()
        );

        Self::order(&mut kept, order);
        Ok(TreeListing {
            entries: kept,
            failures,
        })
    }

    /// 按深度排序，同深度按路径排序；不依赖遍历器返回的顺序
    pub fn order(entries: &mut [DirEntry], order: WalkOrder) {
        match order {
            WalkOrder::TopDown => {
                entries.sort_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.path.cmp(&b.path)))
            }
            WalkOrder::BottomUp => {
                entries.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| a.path.cmp(&b.path)))
            }
        }
    }

    /// 条目本身或任一上级目录命中排除规则即排除
    fn is_excluded(&self, path: &Path) -> bool {
        if self.excludes.is_empty() {
            return false;
        }

        let mut prefix = PathBuf::new();
        for component in path.components() {
            prefix.push(component);
            let normalized = normalize_path(&prefix);
            if self.excludes.iter().any(|re| re.is_match(&normalized)) {
                return true;
            }
        }
        false
    }
}

/// 规范化路径分隔符（统一使用 /）
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// 将 glob 模式转换为正则
///
/// - `*` 匹配单层名称中的任意字符，`?` 匹配单个字符
/// - `**` 跨层匹配，`dir/**` 等价于 `dir`（目录及其全部内容）
/// - 不含 `/` 的模式匹配任意层级的名称，含 `/` 的模式相对根目录匹配
/// - 区分大小写
fn glob_to_regex(pattern: &str) -> String {
    let pattern = pattern.trim_matches('/');
    let pattern = pattern.strip_suffix("/**").unwrap_or(pattern);

    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }

    if pattern.contains('/') {
        format!("^{}$", out)
    } else {
        format!("(?:^|/){}$", out)
    }
}

use crate::core::comparator::{
    ActionSummary, CompareConfig, CopyReason, FileComparator, FileRelation, SyncAction,
};
use crate::core::hasher::{ContentHasher, DEFAULT_CHUNK_SIZE};
use crate::core::scanner::{FileScanner, WalkOrder};
use crate::error::{SyncError, SyncResult};
use crate::logging::AuditLog;
use crate::storage::{local, DirEntry, EntryKind, LocalWalker, TreeWalker, WalkFailure};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 大小和修改时间都相同时跳过指纹计算
    #[serde(default)]
    pub quick_check: bool,
    /// 单个条目出错时继续处理其他条目（默认遇错即中止本轮）
    #[serde(default)]
    pub continue_on_error: bool,
    /// 计算指纹时的分块大小（字节）
    #[serde(default = "default_hash_chunk_size")]
    pub hash_chunk_size: usize,
    /// 排除规则（glob patterns），两侧命中的条目都不处理
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// 遍历时是否跟随符号链接
    #[serde(default)]
    pub follow_links: bool,
}

fn default_hash_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quick_check: false,
            continue_on_error: false,
            hash_chunk_size: default_hash_chunk_size(),
            exclude_patterns: Vec::new(),
            follow_links: false,
        }
    }
}

/// 单轮同步报告
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// 按执行顺序排列的动作
    pub actions: Vec<SyncAction>,
    /// 加固模式下被跳过的条目错误
    pub errors: Vec<String>,
    /// 加固模式下出错（类型冲突、无法遍历）的相对路径，其下的条目本轮不再处理
    pub skipped: Vec<PathBuf>,
    /// 两侧扫描的条目总数
    pub entries_scanned: usize,
    /// 指纹相同而跳过的文件数
    pub files_unchanged: usize,
}

impl SyncReport {
    fn start() -> Self {
        let now = Local::now();
        Self {
            started_at: now,
            finished_at: now,
            actions: Vec::new(),
            errors: Vec::new(),
            skipped: Vec::new(),
            entries_scanned: 0,
            files_unchanged: 0,
        }
    }

    pub fn summary(&self) -> ActionSummary {
        FileComparator::summarize_actions(&self.actions)
    }

    /// 本轮没有执行任何动作也没有错误
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty() && self.errors.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    fn is_skipped(&self, path: &Path) -> bool {
        self.skipped.iter().any(|c| path.starts_with(c))
    }
}

/// 同步引擎：让副本目录与源目录保持一致
pub struct SyncEngine {
    config: SyncConfig,
    scanner: FileScanner,
    comparator: FileComparator,
    audit: AuditLog,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, audit: AuditLog) -> SyncResult<Self> {
        let walker = Arc::new(LocalWalker::new(config.follow_links));
        Self::with_walker(config, walker, audit)
    }

    pub fn with_walker(
        config: SyncConfig,
        walker: Arc<dyn TreeWalker>,
        audit: AuditLog,
    ) -> SyncResult<Self> {
        let scanner = FileScanner::with_excludes(walker, &config.exclude_patterns)?;
        let comparator = FileComparator::new(
            CompareConfig {
                quick_check: config.quick_check,
            },
            ContentHasher::new(config.hash_chunk_size),
        );

        Ok(Self {
            config,
            scanner,
            comparator,
            audit,
        })
    }

    /// 执行一轮同步：确保副本根目录存在 -> 自上而下复制 -> 自下而上删除
    pub async fn run_pass(&self, source: &Path, replica: &Path) -> SyncResult<SyncReport> {
        let mut report = SyncReport::start();
        debug!("开始同步: {:?} -> {:?}", source, replica);

        // 源目录在两轮之间消失时中止，绝不清空副本
        if local::entry_kind(source).await? != Some(EntryKind::Dir) {
            return Err(SyncError::SourceMissing {
                path: source.to_path_buf(),
            });
        }

        self.ensure_replica_root(replica, &mut report).await?;
        self.forward_pass(source, replica, &mut report).await?;
        self.reverse_pass(source, replica, &mut report).await?;

        report.finished_at = Local::now();
        let summary = report.summary();
        info!(
            "同步完成: 扫描 {} 个条目, 创建目录 {}, 复制 {} ({} 字节), 删除文件 {}, 删除目录 {}, 未变化 {}, 错误 {}, 耗时 {}ms",
            report.entries_scanned,
            summary.folders_created,
            summary.files_copied,
            summary.bytes_copied,
            summary.files_removed,
            summary.folders_removed,
            report.files_unchanged,
            report.errors.len(),
            report.duration_ms()
        );

        Ok(report)
    }

    async fn ensure_replica_root(&self, replica: &Path, report: &mut SyncReport) -> SyncResult<()> {
        let exists = FileComparator::check_kind(
            replica,
            EntryKind::Dir,
            local::entry_kind(replica).await?,
        )?;

        if !exists {
            local::create_dir_all(replica).await?;
            self.record(
                report,
                SyncAction::CreateFolder {
                    path: replica.to_path_buf(),
                    root: true,
                },
            )?;
        }
        Ok(())
    }

    /// 源 -> 副本：父目录先于子条目
    async fn forward_pass(
        &self,
        source: &Path,
        replica: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let listing = self.scanner.scan(source, WalkOrder::TopDown).await?;
        self.absorb_walk_failures(listing.failures, report)?;
        report.entries_scanned += listing.entries.len();

        for entry in listing.entries.iter().filter(|e| !e.is_root()) {
            if report.is_skipped(&entry.path) {
                continue;
            }
            let result = match entry.kind {
                EntryKind::Dir => self.mirror_dir(entry, replica, report).await,
                EntryKind::File => self.mirror_file(entry, source, replica, report).await,
                EntryKind::Other => {
                    warn!("跳过无法同步的条目: {:?}", source.join(&entry.path));
                    continue;
                }
            };
            if let Err(e) = result {
                self.absorb(e, report)?;
            }
        }
        Ok(())
    }

    async fn mirror_dir(
        &self,
        entry: &DirEntry,
        replica: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let target = replica.join(&entry.path);
        let exists = FileComparator::check_kind(
            &entry.path,
            EntryKind::Dir,
            self.replica_kind(&target, report).await?,
        )?;

        if !exists {
            local::create_dir_all(&target).await?;
            self.record(
                report,
                SyncAction::CreateFolder {
                    path: target,
                    root: false,
                },
            )?;
        }
        Ok(())
    }

    async fn mirror_file(
        &self,
        entry: &DirEntry,
        source: &Path,
        replica: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let from = source.join(&entry.path);
        let target = replica.join(&entry.path);
        let exists = FileComparator::check_kind(
            &entry.path,
            EntryKind::File,
            self.replica_kind(&target, report).await?,
        )?;

        let reason = if !exists {
            CopyReason::Missing
        } else {
            match self.comparator.compare_files(entry, &from, &target).await? {
                FileRelation::Equal => {
                    report.files_unchanged += 1;
                    return Ok(());
                }
                FileRelation::Different => CopyReason::Changed,
            }
        };

        let bytes = local::copy_with_metadata(&from, &target).await?;
        self.record(
            report,
            SyncAction::CopyFile {
                source: from,
                dest: target,
                bytes,
                reason,
            },
        )
    }

    /// 查看副本中同一路径的条目；特殊文件和失效链接无法镜像，先删除再视为不存在
    async fn replica_kind(
        &self,
        target: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<Option<EntryKind>> {
        match local::entry_kind(target).await? {
            Some(EntryKind::Other) => {
                local::remove_file(target).await?;
                self.record(
                    report,
                    SyncAction::RemoveFile {
                        path: target.to_path_buf(),
                    },
                )?;
                Ok(None)
            }
            kind => Ok(kind),
        }
    }

    /// 副本 -> 源：子条目先于父目录，删除源中不存在的条目
    async fn reverse_pass(
        &self,
        source: &Path,
        replica: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let listing = self.scanner.scan(replica, WalkOrder::BottomUp).await?;
        self.absorb_walk_failures(listing.failures, report)?;
        report.entries_scanned += listing.entries.len();

        for entry in listing.entries.iter().filter(|e| !e.is_root()) {
            if report.is_skipped(&entry.path) {
                continue;
            }
            if let Err(e) = self.prune_entry(entry, source, replica, report).await {
                self.absorb(e, report)?;
            }
        }
        Ok(())
    }

    async fn prune_entry(
        &self,
        entry: &DirEntry,
        source: &Path,
        replica: &Path,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        // 对应路径在源中是普通文件或目录（类型冲突已在前向阶段报告）时保留；
        // 源中的特殊条目不会被镜像，副本中同名条目一并删除
        if matches!(
            local::entry_kind(&source.join(&entry.path)).await?,
            Some(EntryKind::File | EntryKind::Dir)
        ) {
            return Ok(());
        }

        let target = replica.join(&entry.path);
        match entry.kind {
            EntryKind::File | EntryKind::Other => {
                local::remove_file(&target).await?;
                self.record(report, SyncAction::RemoveFile { path: target })
            }
            EntryKind::Dir => {
                local::remove_dir_all(&target).await?;
                self.record(report, SyncAction::RemoveFolder { path: target })
            }
        }
    }

    /// 写入审计日志并记录到报告
    fn record(&self, report: &mut SyncReport, action: SyncAction) -> SyncResult<()> {
        debug!("{:?}", action);
        self.audit.log(action.to_string()).map_err(SyncError::Log)?;
        report.actions.push(action);
        Ok(())
    }

    /// 加固模式下吞下单条目错误（记录后继续），否则向上返回
    fn absorb(&self, err: SyncError, report: &mut SyncReport) -> SyncResult<()> {
        if !self.config.continue_on_error || !err.is_per_entry() {
            return Err(err);
        }

        warn!("跳过出错的条目: {}", err);
        self.audit
            .log(format!("⚠️ Skipped entry: {}", err))
            .map_err(SyncError::Log)?;
        if let SyncError::KindConflict { path, .. } = &err {
            report.skipped.push(path.clone());
        }
        report.errors.push(err.to_string());
        Ok(())
    }

    /// 遍历时无法读取的子树：加固模式下记录并跳过，否则中止本轮
    fn absorb_walk_failures(
        &self,
        failures: Vec<WalkFailure>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        for failure in failures {
            self.absorb(failure.error, report)?;
            report.skipped.push(failure.path);
        }
        Ok(())
    }
}

/// 启动前检查源目录
pub fn check_source(source: &Path) -> SyncResult<()> {
    match std::fs::metadata(source) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => Err(SyncError::SourceMissing {
            path: source.to_path_buf(),
        }),
    }
}

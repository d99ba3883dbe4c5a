//! 定时调度 - 立即执行一轮，之后每轮结束后等待固定间隔

use crate::core::engine::SyncReport;
use crate::error::SyncResult;
use crate::logging::AuditLog;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error};

/// 停止信号，可跨任务传递
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// 请求停止：正在执行的一轮会完整跑完，之后不再开始新的一轮
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// 调度统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub passes: u64,
    pub failures: u64,
}

/// 同步调度器
pub struct Scheduler {
    interval: Duration,
    max_passes: Option<u64>,
    stop_rx: watch::Receiver<bool>,
    audit: AuditLog,
}

impl Scheduler {
    pub fn new(interval: Duration, audit: AuditLog) -> (Self, StopHandle) {
        let (tx, stop_rx) = watch::channel(false);
        let scheduler = Self {
            interval,
            max_passes: None,
            stop_rx,
            audit,
        };
        (scheduler, StopHandle { tx })
    }

    /// 限制最多执行的轮数
    pub fn with_max_passes(mut self, max_passes: u64) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// 运行直到收到停止信号或达到最大轮数
    ///
    /// 单轮失败只记录日志，下一轮照常执行；审计日志写入失败会终止调度
    pub async fn run<F, Fut>(&mut self, mut pass: F) -> Result<RunStats>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<SyncReport>>,
    {
        let mut stats = RunStats::default();

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            stats.passes += 1;
            match pass().await {
                Ok(report) => {
                    debug!("第 {} 轮完成, {} 个动作", stats.passes, report.actions.len());
                    self.audit
                        .log("✅ Synchronization completed.")
                        .context("failed to write audit log")?;
                }
                Err(e) => {
                    stats.failures += 1;
                    error!("第 {} 轮同步失败: {}", stats.passes, e);
                    self.audit
                        .log(format!("⚠️ Synchronization failed: {}", e))
                        .context("failed to write audit log")?;
                }
            }

            if self.max_passes.is_some_and(|max| stats.passes >= max) {
                break;
            }

            if self.wait_for_next_tick().await {
                break;
            }
        }

        Ok(stats)
    }

    /// 等待一个间隔，返回 true 表示期间收到了停止信号
    async fn wait_for_next_tick(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = self.stop_rx.changed() => match changed {
                    Ok(()) if *self.stop_rx.borrow() => return true,
                    Ok(()) => continue,
                    Err(_) => {
                        // 所有 StopHandle 都已释放，只能等到间隔结束
                        (&mut sleep).await;
                        return false;
                    }
                },
            }
        }
    }
}

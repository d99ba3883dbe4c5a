//! 日志模块 - 审计日志（控制台 + 文件）以及诊断日志初始化

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;

/// 审计日志时间戳格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用诊断日志（审计日志始终写入）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 诊断日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 审计日志是否同时输出到标准输出
    #[serde(default = "default_echo")]
    pub echo: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_echo() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            echo: default_echo(),
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::WARN,
        }
    }
}

/// 初始化诊断日志（输出到 stderr，不与审计日志混在 stdout）
pub fn init_tracing(config: &LogConfig, verbose: bool) {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 审计日志落地接口
pub trait LogSink: Send + Sync {
    /// 追加一行（不含换行符），返回时已写入
    fn append(&self, line: &str) -> io::Result<()>;
}

/// 追加写入的日志文件
pub struct FileLogSink {
    file_path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// 打开日志文件，不存在时创建（包括上级目录）
    pub fn open(file_path: &Path) -> io::Result<Self> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            file_path: file_path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl LogSink for FileLogSink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }
}

/// 内存日志（用于测试）
#[derive(Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// 去掉时间戳后的消息
    pub fn messages(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|line| strip_timestamp(line).to_string())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory log lock poisoned"))?
            .push(line.to_string());
        Ok(())
    }
}

/// 审计日志：为每条消息加上时间戳，输出到控制台并写入日志落地
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn LogSink>,
    echo: bool,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn LogSink>, echo: bool) -> Self {
        Self { sink, echo }
    }

    pub fn log(&self, message: impl AsRef<str>) -> io::Result<()> {
        let line = format_line(message.as_ref(), Local::now());

        if self.echo {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", line);
        }

        self.sink.append(&line)
    }
}

/// 格式化审计日志行: `[YYYY-MM-DD HH:MM:SS] message`
pub fn format_line(message: &str, now: DateTime<Local>) -> String {
    format!("[{}] {}", now.format(TIMESTAMP_FORMAT), message)
}

/// 去掉审计日志行的时间戳前缀
pub fn strip_timestamp(line: &str) -> &str {
    match line.find("] ") {
        Some(idx) if line.starts_with('[') => &line[idx + 2..],
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_format_line() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            format_line("✅ Synchronization completed.", now),
            "[2024-03-09 07:05:01] ✅ Synchronization completed."
        );
        assert_eq!(
            strip_timestamp("[2024-03-09 07:05:01] ✅ Synchronization completed."),
            "✅ Synchronization completed."
        );
    }

    #[test]
    fn test_tracing_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.tracing_level(), tracing::Level::WARN);
        config.level = "DEBUG".to_string();
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        config.level = "bogus".to_string();
        assert_eq!(config.tracing_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_file_sink_appends_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/nested/sync.log");

        let sink = FileLogSink::open(&path).unwrap();
        sink.append("first").unwrap();
        sink.append("second").unwrap();
        drop(sink);

        // 重新打开后继续追加，不覆盖
        let sink = FileLogSink::open(&path).unwrap();
        sink.append("third").unwrap();
        assert_eq!(sink.path(), path.as_path());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_audit_log_writes_timestamped_lines() {
        let sink = Arc::new(MemoryLogSink::new());
        let audit = AuditLog::new(sink.clone(), false);

        audit.log("🚀 Starting folder synchronizer...").unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        // [YYYY-MM-DD HH:MM:SS] 前缀共 22 个字符
        assert!(line.starts_with('['));
        assert_eq!(&line[20..22], "] ");
        assert!(chrono::NaiveDateTime::parse_from_str(&line[1..20], TIMESTAMP_FORMAT).is_ok());
        assert_eq!(sink.messages(), vec!["🚀 Starting folder synchronizer..."]);

        sink.clear();
        assert!(sink.lines().is_empty());
    }
}

//! 命令行参数

use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// One-way periodic folder synchronizer (source ➡️ replica)
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the source folder
    pub source: PathBuf,

    /// Path to the replica folder (created if missing)
    pub replica: PathBuf,

    /// Synchronization interval in seconds
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Path to the log file (created if missing)
    pub log: PathBuf,

    /// Optional JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Skip hashing when size and modification time match
    #[arg(long)]
    pub quick_check: bool,

    /// Keep going when a single entry fails instead of aborting the pass
    #[arg(long)]
    pub continue_on_error: bool,

    /// Exclude entries matching a glob pattern (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Enable verbose debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// 命令行参数覆盖配置文件中的值
    pub fn apply(&self, config: &mut AppConfig) {
        if self.quick_check {
            config.sync.quick_check = true;
        }
        if self.continue_on_error {
            config.sync.continue_on_error = true;
        }
        config.sync.exclude_patterns.extend(self.exclude.iter().cloned());
    }
}

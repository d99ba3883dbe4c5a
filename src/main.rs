use anyhow::{Context, Result};
use clap::Parser;
use mirrorsync_lib::cli::Cli;
use mirrorsync_lib::config::AppConfig;
use mirrorsync_lib::core::{check_source, Scheduler, SyncEngine};
use mirrorsync_lib::logging::{init_tracing, AuditLog, FileLogSink};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 源目录不存在时直接退出，不写日志文件也不进入循环
    if check_source(&cli.source).is_err() {
        eprintln!(
            "Error: Source folder '{}' does not exist.",
            cli.source.display()
        );
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    // 初始化诊断日志
    init_tracing(&config.log, cli.verbose);

    let sink = FileLogSink::open(&cli.log)
        .with_context(|| format!("failed to open log file {}", cli.log.display()))?;
    let log_path = sink.path().to_path_buf();
    let audit = AuditLog::new(Arc::new(sink), config.log.echo);

    audit.log("🚀 Starting folder synchronizer...")?;
    audit.log(format!("📂 Source folder: {}", cli.source.display()))?;
    audit.log(format!("📂 Replica folder: {}", cli.replica.display()))?;
    audit.log(format!("⏱ Interval: {} seconds", cli.interval))?;
    audit.log(format!("📝 Log file: {}", log_path.display()))?;

    let engine = SyncEngine::new(config.sync.clone(), audit.clone())?;
    let (scheduler, stop) = Scheduler::new(cli.interval(), audit.clone());
    let mut scheduler = if cli.once {
        scheduler.with_max_passes(1)
    } else {
        scheduler
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到中断信号，当前一轮结束后停止");
            stop.stop();
        }
        // 再次中断时立即退出
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let stats = scheduler
        .run(|| engine.run_pass(&cli.source, &cli.replica))
        .await?;

    audit.log("🛑 Synchronizer stopped.")?;
    info!("共执行 {} 轮, 失败 {} 轮", stats.passes, stats.failures);

    if cli.once && stats.failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

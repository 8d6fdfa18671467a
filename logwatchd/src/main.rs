//! logwatchd 진입점.
//!
//! 시작 순서: 설정 로드, CLI 오버라이드 적용, 로깅 초기화, PID 파일 기록,
//! 메트릭 recorder 설치, 그 다음 watcher 생성. tokio 런타임은 시그널이나
//! 모든 watcher가 종료됐다는 monitor 보고만 기다리며, watcher 작업은
//! 모두 일반 스레드에서 실행됩니다.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use logwatch_core::config::LogwatchConfig;
use logwatch_pipeline::PluginRegistry;
use logwatchd::cli::DaemonCli;
use logwatchd::supervisor::{self, MonitorExit, Supervisor};
use logwatchd::{logging, metrics_server, pid_file};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = DaemonCli::parse();

    let mut config = LogwatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    let registry = PluginRegistry::with_builtins();

    if cli.validate {
        let problems = supervisor::check_watchers(&config.watchers, &registry);
        if problems.is_empty() {
            println!(
                "{}: ok ({} watchers)",
                cli.config.display(),
                config.watchers.len()
            );
            return Ok(ExitCode::SUCCESS);
        }
        for problem in &problems {
            eprintln!("{problem}");
        }
        return Ok(ExitCode::FAILURE);
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "logwatchd starting"
    );

    let pid_path = (!config.general.pid_file.is_empty())
        .then(|| Path::new(&config.general.pid_file).to_path_buf());
    if let Some(path) = &pid_path {
        pid_file::write_pid_file(path)?;
    }

    let code = run(&config, registry).await;

    if let Some(path) = &pid_path {
        pid_file::remove_pid_file(path);
    }
    tracing::info!("logwatchd shut down");
    code
}

async fn run(config: &LogwatchConfig, registry: PluginRegistry) -> Result<ExitCode> {
    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let supervisor = Arc::new(Supervisor::new(
        config.supervisor.clone(),
        registry,
        config.debug_enabled(),
    ));

    let spawned = {
        let supervisor = Arc::clone(&supervisor);
        let watchers = config.watchers.clone();
        tokio::task::spawn_blocking(move || supervisor.spawn(&watchers)).await?
    };
    if spawned == 0 {
        tracing::error!("no watcher could be started, exiting");
        return Ok(ExitCode::FAILURE);
    }

    let mut monitor = {
        let supervisor = Arc::clone(&supervisor);
        tokio::task::spawn_blocking(move || supervisor.monitor())
    };

    let exit = tokio::select! {
        signal = wait_for_shutdown_signal() => {
            tracing::info!(signal = signal?, "shutdown signal received");
            ExitCode::SUCCESS
        }
        exited = &mut monitor => match exited? {
            MonitorExit::AllExited => ExitCode::FAILURE,
            MonitorExit::Stopped => ExitCode::SUCCESS,
        },
    };

    let report = {
        let supervisor = Arc::clone(&supervisor);
        tokio::task::spawn_blocking(move || supervisor.drain()).await?
    };
    if !report.is_clean() {
        tracing::warn!(stuck = ?report.stuck, "some watchers did not stop in time");
    }
    if !monitor.is_finished() {
        let _ = monitor.await;
    }

    Ok(exit)
}

/// SIGTERM 또는 SIGINT를 기다리고 받은 시그널 이름을 반환합니다.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

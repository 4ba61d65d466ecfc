use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minerctl_rs::config::{Args, ConfigStore};
use minerctl_rs::monitor::SystemProbe;
use minerctl_rs::pool::PoolCatalog;
use minerctl_rs::stats::MetricsStore;
use minerctl_rs::supervisor::{ProcessSupervisor, SupervisorConfig};
use minerctl_rs::ui::Ui;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!("🚀 Starting MinerCtl-RS v{}", env!("CARGO_PKG_VERSION"));

    // 必需文件缺失时列出后以退出码 1 结束
    let required = [
        (&args.worker, "worker executable"),
        (&args.config, "worker config"),
        (&args.pools, "pool catalog"),
    ];
    let missing: Vec<_> = required.iter().filter(|(p, _)| !p.exists()).collect();
    if !missing.is_empty() {
        eprintln!("Missing required files:");
        for (path, what) in &missing {
            eprintln!("  - {} ({})", path.display(), what);
        }
        eprintln!("\nPlease ensure all required files are present before running.");
        std::process::exit(1);
    }

    let probe = Arc::new(SystemProbe::new());
    let store = Arc::new(MetricsStore::new(probe.clone()));
    let supervisor = Arc::new(ProcessSupervisor::new(
        args.worker.clone(),
        args.config.clone(),
        SupervisorConfig::default(),
        store,
    ));
    let config_store = ConfigStore::new(&args.config);
    let catalog = PoolCatalog::load(&args.pools);

    // 中断/终止信号一律经由监管器的 stop() 走，保证排空任务干净收尾
    if let Err(e) = setup_signal_handlers(supervisor.clone()) {
        error!("❌ Failed to setup signal handlers: {}", e);
        return;
    }

    let mut ui = Ui::new(supervisor, config_store, catalog, probe);
    ui.run().await;

    info!("👋 Controller exited");
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("minerctl_rs={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn setup_signal_handlers(supervisor: Arc<ProcessSupervisor>) -> Result<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to create SIGTERM handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("🛑 Received interrupt, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("🛑 Received SIGTERM, shutting down");
                }
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Error waiting for signal: {}", e);
                return;
            }
            info!("🛑 Received interrupt, shutting down");
        }

        if supervisor.is_running().await {
            if let Err(e) = supervisor.stop().await {
                error!("Error during graceful shutdown: {}", e);
            }
        }
        std::process::exit(0);
    });

    Ok(())
}

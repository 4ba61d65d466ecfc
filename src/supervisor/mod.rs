//! 进程监管器 - worker 进程生命周期的唯一所有者

pub mod drainer;

pub use drainer::{DrainHandle, DrainState, OutputDrainer};

use crate::error::ProcessError;
use crate::stats::{MetricsSnapshot, MetricsStore};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// 监管策略
///
/// 默认值即规定的超时策略：5 秒宽限期后强杀，排空任务确认等待 2 秒，
/// 重启间隔 1 秒。测试里用更短的值。
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// 优雅终止的宽限期，超时后强制杀死
    pub grace_period: Duration,
    /// 等待排空任务确认停止的上限
    pub drain_ack_timeout: Duration,
    /// 重启时 stop 与 start 之间的停顿，给 OS 释放资源的时间
    pub restart_pause: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            drain_ack_timeout: Duration::from_secs(2),
            restart_pause: Duration::from_secs(1),
        }
    }
}

/// 进程监管器
///
/// 独占持有 worker 的进程句柄；`is_running` 是整个程序里"运行中"状态的
/// 唯一权威，UI、重启逻辑和退出处理都查询它而不各自缓存。
pub struct ProcessSupervisor {
    worker_path: PathBuf,
    config_path: PathBuf,
    config: SupervisorConfig,
    store: Arc<MetricsStore>,
    child: Mutex<Option<Child>>,
    drainer: Mutex<Option<DrainHandle>>,
}

impl ProcessSupervisor {
    pub fn new<P: Into<PathBuf>>(
        worker_path: P,
        config_path: P,
        config: SupervisorConfig,
        store: Arc<MetricsStore>,
    ) -> Self {
        Self {
            worker_path: worker_path.into(),
            config_path: config_path.into(),
            config,
            store,
            child: Mutex::new(None),
            drainer: Mutex::new(None),
        }
    }

    /// 指标存储（供仪表盘轮询）
    pub fn store(&self) -> Arc<MetricsStore> {
        self.store.clone()
    }

    /// worker 是否在运行
    ///
    /// 真值条件：持有进程句柄且存活检查显示尚未退出。
    pub async fn is_running(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(c) => matches!(c.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// 当前指标快照，运行状态来自本监管器
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let running = self.is_running().await;
        self.store.snapshot(running).await
    }

    /// 启动 worker 并开始监控
    ///
    /// 已在运行时返回 `AlreadyRunning` 且不产生任何副作用。
    pub async fn start(&self) -> Result<String, ProcessError> {
        let mut child_slot = self.child.lock().await;
        if let Some(c) = child_slot.as_mut() {
            if matches!(c.try_wait(), Ok(None)) {
                return Err(ProcessError::AlreadyRunning);
            }
            // 上一个进程已退出，清掉残留句柄
            *child_slot = None;
        }

        // 残留的排空任务属于已死亡的会话，必须先协作停掉并等到确认，
        // 否则它还可能把管道缓冲里的旧行写进刚刚归零的存储
        self.stop_drainer().await;

        info!(
            "Starting worker: {} -c {}",
            self.worker_path.display(),
            self.config_path.display()
        );

        let mut child = Command::new(&self.worker_path)
            .arg("-c")
            .arg(&self.config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Launch { error: e.to_string() })?;

        let stdout = child.stdout.take().ok_or_else(|| ProcessError::Launch {
            error: "worker stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ProcessError::Launch {
            error: "worker stderr was not captured".to_string(),
        })?;

        // 新会话从零开始：峰值与计数器不跨重启保留
        self.store.reset().await;
        let handle = OutputDrainer::spawn(stdout, stderr, self.store.clone());
        *self.drainer.lock().await = Some(handle);
        *child_slot = Some(child);

        info!("✅ Worker started");
        Ok("Miner started successfully".to_string())
    }

    /// 停止 worker：先优雅终止，宽限期内未退出则强杀
    ///
    /// 两条路径对调用方都算成功（消息不同）；只有停止序列中的意外
    /// IO 错误才是硬失败。
    pub async fn stop(&self) -> Result<String, ProcessError> {
        // 把句柄从槽里取出后立即放锁，宽限期等待期间存活查询不被阻塞
        let mut child = {
            let mut child_slot = self.child.lock().await;
            match child_slot.take() {
                Some(c) => c,
                None => return Err(ProcessError::NotRunning),
            }
        };
        if !matches!(child.try_wait(), Ok(None)) {
            // 进程已经退出，只剩句柄残留
            self.stop_drainer().await;
            return Err(ProcessError::NotRunning);
        }

        info!("Stopping worker (grace period {:?})", self.config.grace_period);
        request_graceful_exit(&child);

        let message = match timeout(self.config.grace_period, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Worker exited: {}", status);
                "Miner stopped".to_string()
            }
            Ok(Err(e)) => {
                self.stop_drainer().await;
                return Err(ProcessError::Stop { error: e.to_string() });
            }
            Err(_) => {
                warn!("Worker did not exit within grace period, killing");
                child.kill().await.map_err(|e| ProcessError::Stop {
                    error: e.to_string(),
                })?;
                "Miner force killed".to_string()
            }
        };

        // 进程终止后排空任务一定要干净收尾，句柄随之释放
        drop(child);
        self.stop_drainer().await;

        info!("🛑 Worker stopped");
        Ok(message)
    }

    /// 重启：stop → 短暂停顿 → start
    ///
    /// 非原子：stop 的失败原样传出，stop 与 start 之间进程崩溃则
    /// 调用方直接观察到 start 的失败。
    pub async fn restart(&self) -> Result<String, ProcessError> {
        self.stop().await?;
        sleep(self.config.restart_pause).await;
        self.start().await
    }

    /// 协作式停掉排空任务并有界等待确认
    async fn stop_drainer(&self) {
        if let Some(handle) = self.drainer.lock().await.take() {
            handle.stop(self.config.drain_ack_timeout).await;
        }
    }
}

/// 请求优雅终止（SIGTERM 等价物）
#[cfg(unix)]
fn request_graceful_exit(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

/// 没有终止信号的平台上直接依赖宽限期后的强杀路径
#[cfg(not(unix))]
fn request_graceful_exit(_child: &Child) {}

//! 输出排空任务
//!
//! 每个监控会话恰好一个后台任务，独占 worker 的输出流，逐行读取并喂给
//! 统计解析器。任务只会因为流结束、读取失败或显式停止而退出 —— 格式
//! 错误的行永远不会让它提前终止。

use crate::stats::{parse_line, MetricsStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Notify, RwLock};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// 排空任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Draining,
    Stopped,
}

/// 排空任务句柄 - 协作式停止，有界等待确认
pub struct DrainHandle {
    stop_signal: Arc<Notify>,
    state: Arc<RwLock<DrainState>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl DrainHandle {
    /// 请求任务停止并等待其退出
    ///
    /// 等待超过 `ack_timeout` 仍未确认时放弃等待并强制中止任务。
    pub async fn stop(mut self, ack_timeout: Duration) {
        self.stop_signal.notify_one();
        if let Some(mut handle) = self.handle.take() {
            if timeout(ack_timeout, &mut handle).await.is_err() {
                warn!("Drain task did not acknowledge stop within {:?}, aborting", ack_timeout);
                handle.abort();
            }
        }
        *self.state.write().await = DrainState::Stopped;
    }

    pub async fn state(&self) -> DrainState {
        *self.state.read().await
    }

    /// 任务是否已自行结束（流 EOF 或读取失败）
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for DrainHandle {
    fn drop(&mut self) {
        // 句柄被丢弃时任务不应继续存活
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// 输出排空器
pub struct OutputDrainer;

impl OutputDrainer {
    /// 针对一对输出流启动排空任务
    ///
    /// tokio 无法把子进程的 stdout/stderr 合并成一个管道，这里把两个行流
    /// 复用进同一个消费循环，对解析器表现为单一遥测通道。
    pub fn spawn<O, E>(stdout: O, stderr: E, store: Arc<MetricsStore>) -> DrainHandle
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let stop_signal = Arc::new(Notify::new());
        let state = Arc::new(RwLock::new(DrainState::Draining));

        let stop = stop_signal.clone();
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            let mut out_lines = BufReader::new(stdout).lines();
            let mut err_lines = BufReader::new(stderr).lines();
            let mut out_open = true;
            let mut err_open = true;

            debug!("Drain task started");

            loop {
                tokio::select! {
                    _ = stop.notified() => {
                        debug!("Drain task received stop request");
                        break;
                    }
                    line = out_lines.next_line(), if out_open => match line {
                        Ok(Some(line)) => feed(&store, &line).await,
                        Ok(None) => out_open = false,
                        Err(e) => {
                            // 读取失败按流结束处理，不升级为故障
                            debug!("Worker stdout read error: {}", e);
                            out_open = false;
                        }
                    },
                    line = err_lines.next_line(), if err_open => match line {
                        Ok(Some(line)) => feed(&store, &line).await,
                        Ok(None) => err_open = false,
                        Err(e) => {
                            debug!("Worker stderr read error: {}", e);
                            err_open = false;
                        }
                    },
                }

                if !out_open && !err_open {
                    debug!("Worker output streams closed");
                    break;
                }
            }

            *task_state.write().await = DrainState::Stopped;
            debug!("Drain task stopped");
        });

        DrainHandle {
            stop_signal,
            state,
            handle: Some(handle),
        }
    }
}

/// 一行输出 → 零或多个指标更新，按产生顺序写入存储
async fn feed(store: &MetricsStore, line: &str) {
    trace!("Worker output: {}", line);
    for update in parse_line(line) {
        store.on_update(update).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::SystemProbe;
    use tokio::io::AsyncWriteExt;

    fn store() -> Arc<MetricsStore> {
        Arc::new(MetricsStore::new(Arc::new(SystemProbe::new())))
    }

    #[tokio::test]
    async fn test_drains_until_eof() {
        let (mut out_tx, out_rx) = tokio::io::duplex(1024);
        let (err_tx, err_rx) = tokio::io::duplex(1024);
        let store = store();

        let handle = OutputDrainer::spawn(out_rx, err_rx, store.clone());

        out_tx
            .write_all(b"speed 10s/60s/15m 2.5 kh/s max 3.1 kh/s\naccepted (120/3) diff 5000\n")
            .await
            .unwrap();
        drop(out_tx);
        drop(err_tx);

        // 两个流都关闭后任务自行结束
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("drain task should stop at EOF");

        let snap = store.snapshot(false).await;
        assert_eq!(snap.hashrate, 2500.0);
        assert_eq!(snap.accepted_shares, 120);
        assert_eq!(snap.rejected_shares, 3);
    }

    #[tokio::test]
    async fn test_malformed_lines_never_kill_the_task() {
        let (mut out_tx, out_rx) = tokio::io::duplex(1024);
        let (err_tx, err_rx) = tokio::io::duplex(1024);
        let store = store();

        let handle = OutputDrainer::spawn(out_rx, err_rx, store.clone());

        out_tx
            .write_all(b")(*&^%$ total garbage\nspeed n/a kh/s\naccepted (x/y)\nspeed 100 h/s\n")
            .await
            .unwrap();
        drop(out_tx);
        drop(err_tx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("drain task should survive malformed lines");

        // 有效行仍被处理
        let snap = store.snapshot(false).await;
        assert_eq!(snap.hashrate, 100.0);
    }

    #[tokio::test]
    async fn test_stderr_is_drained_too() {
        let (out_tx, out_rx) = tokio::io::duplex(1024);
        let (mut err_tx, err_rx) = tokio::io::duplex(1024);
        let store = store();

        let handle = OutputDrainer::spawn(out_rx, err_rx, store.clone());

        err_tx.write_all(b"speed 42 h/s\n").await.unwrap();
        drop(out_tx);
        drop(err_tx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(store.snapshot(false).await.hashrate, 42.0);
    }

    #[tokio::test]
    async fn test_cooperative_stop_is_prompt() {
        let (_out_tx, out_rx) = tokio::io::duplex(1024);
        let (_err_tx, err_rx) = tokio::io::duplex(1024);
        let store = store();

        // 写端保持打开，任务阻塞在行读取上
        let handle = OutputDrainer::spawn(out_rx, err_rx, store);
        assert_eq!(handle.state().await, DrainState::Draining);

        let started = std::time::Instant::now();
        handle.stop(Duration::from_secs(2)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}

use crate::monitor::SystemProbe;
use crate::stats::{MetricsSnapshot, StatUpdate};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// 聚合状态，整体放在一把读写锁后面，快照读取不会看到撕裂的更新
#[derive(Debug)]
struct StatsInner {
    hashrate: f64,
    peak_hashrate: f64,
    accepted_shares: u64,
    rejected_shares: u64,
    start_time: Instant,
}

impl StatsInner {
    fn fresh() -> Self {
        Self {
            hashrate: 0.0,
            peak_hashrate: 0.0,
            accepted_shares: 0,
            rejected_shares: 0,
            start_time: Instant::now(),
        }
    }
}

/// 指标存储 - 排空任务独占写入，任意多消费者并发读取快照
pub struct MetricsStore {
    inner: RwLock<StatsInner>,
    probe: Arc<SystemProbe>,
}

impl MetricsStore {
    pub fn new(probe: Arc<SystemProbe>) -> Self {
        Self {
            inner: RwLock::new(StatsInner::fresh()),
            probe,
        }
    }

    /// 应用一条解析结果
    ///
    /// 算力：当前值覆盖、峰值取 max；份额：worker 上报的是绝对累计值，
    /// 直接覆盖计数器而不是累加。
    pub async fn on_update(&self, update: StatUpdate) {
        let mut inner = self.inner.write().await;
        match update {
            StatUpdate::Hashrate(v) => {
                inner.hashrate = v;
                if v > inner.peak_hashrate {
                    inner.peak_hashrate = v;
                }
            }
            StatUpdate::Shares { accepted, rejected } => {
                inner.accepted_shares = accepted;
                inner.rejected_shares = rejected;
            }
        }
    }

    /// 归零并重新锚定会话开始时间，每次监控会话开始时调用一次
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        *inner = StatsInner::fresh();
        debug!("Metrics store reset");
    }

    /// 生成快照：存储值 + 实时采样的主机 CPU/内存 + 运行时长
    ///
    /// 接受率在读取时计算，不落盘存储。
    pub async fn snapshot(&self, running: bool) -> MetricsSnapshot {
        let (cpu_usage, memory_usage) = {
            let probe = &self.probe;
            (probe.cpu_usage().await, probe.memory_usage().await)
        };

        let inner = self.inner.read().await;
        let total_shares = inner.accepted_shares.saturating_add(inner.rejected_shares);
        let acceptance_rate = if total_shares > 0 {
            inner.accepted_shares as f64 / total_shares as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            hashrate: inner.hashrate,
            peak_hashrate: inner.peak_hashrate,
            accepted_shares: inner.accepted_shares,
            rejected_shares: inner.rejected_shares,
            acceptance_rate,
            cpu_usage,
            memory_usage,
            uptime: inner.start_time.elapsed(),
            running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MetricsStore {
        MetricsStore::new(Arc::new(SystemProbe::new()))
    }

    #[tokio::test]
    async fn test_peak_is_max_since_reset() {
        let store = store();
        for v in [100.0, 500.0, 300.0, 450.0] {
            store.on_update(StatUpdate::Hashrate(v)).await;
        }

        let snap = store.snapshot(true).await;
        assert_eq!(snap.hashrate, 450.0);
        assert_eq!(snap.peak_hashrate, 500.0);

        // reset 后峰值不跨会话保留
        store.reset().await;
        store.on_update(StatUpdate::Hashrate(50.0)).await;
        let snap = store.snapshot(true).await;
        assert_eq!(snap.peak_hashrate, 50.0);
    }

    #[tokio::test]
    async fn test_share_counters_overwrite() {
        let store = store();
        store
            .on_update(StatUpdate::Shares { accepted: 10, rejected: 1 })
            .await;
        store
            .on_update(StatUpdate::Shares { accepted: 120, rejected: 3 })
            .await;

        let snap = store.snapshot(true).await;
        assert_eq!(snap.accepted_shares, 120);
        assert_eq!(snap.rejected_shares, 3);
        assert!((snap.acceptance_rate - 120.0 / 123.0 * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_acceptance_rate_bounds() {
        let store = store();

        // 无份额时为 0
        let snap = store.snapshot(false).await;
        assert_eq!(snap.acceptance_rate, 0.0);

        // 全部拒绝时为 0，全部接受时为 100
        store
            .on_update(StatUpdate::Shares { accepted: 0, rejected: 7 })
            .await;
        assert_eq!(store.snapshot(false).await.acceptance_rate, 0.0);

        store
            .on_update(StatUpdate::Shares { accepted: 7, rejected: 0 })
            .await;
        assert_eq!(store.snapshot(false).await.acceptance_rate, 100.0);
    }

    #[tokio::test]
    async fn test_huge_share_totals_do_not_overflow() {
        let store = store();
        store
            .on_update(StatUpdate::Shares {
                accepted: u64::MAX,
                rejected: u64::MAX,
            })
            .await;

        // 求和饱和而不是回绕，接受率仍在 [0, 100]
        let snap = store.snapshot(true).await;
        assert!((0.0..=100.0).contains(&snap.acceptance_rate));
    }

    #[tokio::test]
    async fn test_snapshot_carries_running_flag() {
        let store = store();
        assert!(store.snapshot(true).await.running);
        assert!(!store.snapshot(false).await.running);
    }
}

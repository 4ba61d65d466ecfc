//! 挖矿统计：输出行解析与指标聚合

pub mod parser;
pub mod store;

pub use parser::parse_line;
pub use store::MetricsStore;

use serde::Serialize;
use std::time::Duration;

/// 从一行 worker 输出里解析出的单个指标更新
#[derive(Debug, Clone, PartialEq)]
pub enum StatUpdate {
    /// 算力采样，单位 H/s
    Hashrate(f64),
    /// 份额计数，worker 上报的绝对累计值（覆盖语义，不做累加）
    Shares { accepted: u64, rejected: u64 },
}

/// 某一时刻的指标快照
///
/// 由 `MetricsStore::snapshot` 产出，对所有消费者只读。
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// 当前算力 (H/s)
    pub hashrate: f64,
    /// 本次监控会话内观测到的峰值算力 (H/s)
    pub peak_hashrate: f64,
    /// 接受的份额数
    pub accepted_shares: u64,
    /// 拒绝的份额数
    pub rejected_shares: u64,
    /// 接受率百分比，无份额时为 0
    pub acceptance_rate: f64,
    /// 主机 CPU 使用率百分比
    pub cpu_usage: f32,
    /// 主机内存使用率百分比
    pub memory_usage: f32,
    /// 自监控开始的运行时长
    pub uptime: Duration,
    /// worker 是否在运行（由 ProcessSupervisor 提供）
    pub running: bool,
}

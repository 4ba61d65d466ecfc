//! MinerCtl-RS - XMRig 挖矿进程控制器
//!
//! MinerCtl-RS 是一个用 Rust 编写的 XMRig 控制器，负责挖矿进程的完整生命周期：
//! - 进程监管（启动/停止/重启，优雅终止后强制杀死）
//! - 输出流排空与统计解析（算力、份额，尽力而为式解析）
//! - XMRig JSON 配置的读取/修改/写回（保留未知字段）
//! - 矿池目录展示与交互式控制菜单
//!
//! ## 架构特点
//!
//! ### 单一事实来源
//! - ProcessSupervisor 独占进程句柄，`is_running` 是运行状态的唯一权威
//! - 每个监控会话恰好一个后台排空任务，停止时协作取消并有界等待
//!
//! ### 容错设计
//! - 统计解析永不报错：无法识别的输出行被静默跳过
//! - 流级错误视为会话正常结束，而非故障

pub mod config;
pub mod error;
pub mod monitor;
pub mod pool;
pub mod stats;
pub mod supervisor;
pub mod ui;

pub use config::ConfigStore;
pub use error::{ConfigError, ControllerError, ProcessError};
pub use stats::{MetricsSnapshot, MetricsStore};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};

/// 程序版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 程序名称
pub const NAME: &str = "minerctl-rs";

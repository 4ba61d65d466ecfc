use crate::error::ConfigError;
use clap::Parser;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the XMRig executable
    #[arg(long, default_value = "./xmrig")]
    pub worker: PathBuf,

    /// Path to the XMRig JSON config file
    #[arg(short, long, default_value = "./config.json")]
    pub config: PathBuf,

    /// Path to the pool catalog file
    #[arg(long, default_value = "./pools.json")]
    pub pools: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// 当前 CPU 配置的读取结果（用于展示）
#[derive(Debug, Clone, PartialEq)]
pub struct CpuSettings {
    /// 亲和性字符串，None 表示自动分配
    pub affinity: Option<String>,
    /// 进程优先级 0-5，None 表示系统默认
    pub priority: Option<u64>,
}

impl CpuSettings {
    /// 亲和性覆盖的线程数
    pub fn thread_count(&self) -> Option<usize> {
        self.affinity
            .as_ref()
            .filter(|a| !a.eq_ignore_ascii_case("auto"))
            .map(|a| a.split(',').count())
    }

    /// 优先级的可读描述
    pub fn priority_description(&self) -> &'static str {
        match self.priority {
            Some(0) => "Highest (most aggressive)",
            Some(1) => "High",
            Some(2) => "Above normal",
            Some(3) => "Normal",
            Some(4) => "Below normal",
            Some(5) => "Lowest (most conservative)",
            Some(_) => "Unknown",
            None => "System default",
        }
    }
}

/// XMRig JSON 配置的读/改/写
///
/// 整文档加载、定点修改、整文档写回。文档以 `serde_json::Value` 原样持有，
/// 未知字段在往返过程中原封不动。write 是整文件替换，load 与 save 之间的
/// 外部并发修改会丢失（last-writer-wins，已知限制）。
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并解析配置文档
    ///
    /// NotFound 与 Parse 分开返回，调用方可以据此决定新建还是中止。
    pub fn load(&self) -> Result<Value, ConfigError> {
        let path = self.path.display().to_string();
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound { path: path.clone() }
            } else {
                ConfigError::Parse {
                    path: path.clone(),
                    error: e.to_string(),
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            error: e.to_string(),
        })
    }

    /// 整文档序列化并覆盖写回
    pub fn save(&self, config: &Value) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Write {
                path: self.path.display().to_string(),
                error: e.to_string(),
            })?;

        std::fs::write(&self.path, content).map_err(|e| ConfigError::Write {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })?;

        debug!("Config saved to {}", self.path.display());
        Ok(())
    }

    /// 读取当前 cpu 段（缺失字段按默认处理）
    pub fn current_cpu(config: &Value) -> CpuSettings {
        let cpu = config.get("cpu");
        CpuSettings {
            affinity: cpu
                .and_then(|c| c.get("affinity"))
                .and_then(|a| a.as_str())
                .map(|s| s.to_string()),
            priority: cpu
                .and_then(|c| c.get("priority"))
                .and_then(|p| p.as_u64()),
        }
    }

    /// 将首个矿池条目指向给定的矿池与钱包
    ///
    /// 只改 `pools[0]` 的目标字段，其余字段（含其他矿池条目）保持不变。
    pub fn apply_pool_and_credential(config: &mut Value, host: &str, port: u16, wallet: &str) {
        if !config.is_object() {
            *config = json!({});
        }
        let obj = config.as_object_mut().unwrap();

        let pools = obj
            .entry("pools")
            .or_insert_with(|| json!([]));
        if !pools.is_array() {
            *pools = json!([]);
        }
        let list = pools.as_array_mut().unwrap();
        if list.is_empty() {
            list.push(json!({}));
        }
        if !list[0].is_object() {
            list[0] = json!({});
        }

        let entry = list[0].as_object_mut().unwrap();
        entry.insert("coin".into(), json!("monero"));
        entry.insert("url".into(), json!(format!("{}:{}", host, port)));
        entry.insert("user".into(), json!(wallet));
        entry.insert("pass".into(), json!("x"));
        entry.insert("tls".into(), json!(true));
        entry.insert("keepalive".into(), json!(true));
        entry.insert("nicehash".into(), json!(false));
    }

    /// 更新 cpu 段的线程/优先级/亲和性
    ///
    /// - `threads` > 0 时按可用逻辑核数截断，派生亲和性 "0,1,...,N-1"
    /// - `priority` 仅在 0-5 范围内生效
    /// - `affinity` 显式给出时覆盖派生值
    ///
    /// 返回是否有实际变更，调用方据此跳过无意义的写回。
    pub fn apply_cpu(
        config: &mut Value,
        threads: Option<u32>,
        priority: Option<u32>,
        affinity: Option<&str>,
        logical_cores: usize,
    ) -> bool {
        if !config.is_object() {
            *config = json!({});
        }
        let obj = config.as_object_mut().unwrap();

        let cpu = obj.entry("cpu").or_insert_with(|| json!({}));
        if !cpu.is_object() {
            *cpu = json!({});
        }
        let cpu = cpu.as_object_mut().unwrap();

        let mut updated = false;

        if let Some(threads) = threads {
            if threads > 0 {
                let cores_to_use = (threads as usize).min(logical_cores);
                let affinity_str = (0..cores_to_use)
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                cpu.insert("affinity".into(), json!(affinity_str));
                updated = true;
            }
        }

        if let Some(priority) = priority {
            if priority <= 5 {
                cpu.insert("priority".into(), json!(priority));
                updated = true;
            }
        }

        if let Some(affinity) = affinity {
            cpu.insert("affinity".into(), json!(affinity));
            updated = true;
        }

        updated
    }
}

//! 主机系统探测 - 核数与实时 CPU/内存使用率
//!
//! 核心逻辑把主机探测当作外部协作者：这里只是对 sysinfo/num_cpus 的薄封装。

use sysinfo::System;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// 系统探测器
///
/// sysinfo 的刷新需要 `&mut System`，内部用互斥锁串行化采样。
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// 逻辑核数
    pub fn logical_cores(&self) -> usize {
        num_cpus::get()
    }

    /// 物理核数
    pub fn physical_cores(&self) -> usize {
        num_cpus::get_physical()
    }

    /// 全核平均 CPU 使用率百分比
    ///
    /// sysinfo 的使用率基于两次刷新的差值，两次刷新之间需要最小间隔。
    pub async fn cpu_usage(&self) -> f32 {
        let mut system = self.system.lock().await;
        system.refresh_cpu();
        sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu();

        let cpus = system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }
        cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
    }

    /// 内存使用率百分比
    pub async fn memory_usage(&self) -> f32 {
        let mut system = self.system.lock().await;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        system.used_memory() as f32 / total as f32 * 100.0
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_counts() {
        let probe = SystemProbe::new();
        assert!(probe.logical_cores() >= 1);
        assert!(probe.physical_cores() >= 1);
        assert!(probe.logical_cores() >= probe.physical_cores());
    }

    #[tokio::test]
    async fn test_usage_in_percent_range() {
        let probe = SystemProbe::new();
        let cpu = probe.cpu_usage().await;
        let mem = probe.memory_usage().await;
        assert!((0.0..=100.0).contains(&cpu));
        assert!((0.0..=100.0).contains(&mem));
    }
}

//! 交互式控制循环 - 纯展示层
//!
//! 菜单、提示与统计展示。所有控制操作只打印分类后的简短成败消息，
//! 不向交互界面泄漏内部回溯。

use crate::config::ConfigStore;
use crate::monitor::SystemProbe;
use crate::pool::{Pool, PoolCatalog};
use crate::stats::MetricsSnapshot;
use crate::supervisor::ProcessSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type InputLines = Lines<BufReader<Stdin>>;

/// 运行时长的可读格式
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// 统计面板文本
pub fn render_stats(snapshot: &MetricsSnapshot) -> String {
    let hashrate = if snapshot.hashrate > 0.0 {
        format!("{:.1} H/s", snapshot.hashrate)
    } else {
        "N/A".to_string()
    };
    let peak = if snapshot.peak_hashrate > 0.0 {
        format!("{:.1} H/s", snapshot.peak_hashrate)
    } else {
        "N/A".to_string()
    };

    format!(
        "--- Mining Statistics ---\n\
         Status:          {}\n\
         Hashrate:        {}\n\
         Peak Hashrate:   {}\n\
         Accepted Shares: {}\n\
         Rejected Shares: {}\n\
         Acceptance Rate: {:.2}%\n\
         CPU Usage:       {:.1}%\n\
         Memory Usage:    {:.1}%\n\
         Uptime:          {}",
        if snapshot.running { "Running" } else { "Stopped" },
        hashrate,
        peak,
        snapshot.accepted_shares,
        snapshot.rejected_shares,
        snapshot.acceptance_rate,
        snapshot.cpu_usage,
        snapshot.memory_usage,
        format_uptime(snapshot.uptime),
    )
}

/// 矿池对比表文本
pub fn render_pool_table(catalog: &PoolCatalog) -> String {
    if catalog.is_empty() {
        return "No pools available!".to_string();
    }

    let mut out = String::from("--- Monero Mining Pool Comparison ---\n");
    out.push_str(&format!(
        "{:<20} {:>6} {:>11} {:<10} {:<12} {}\n",
        "Pool Name", "Fee %", "Min Payout", "Type", "Location", "Description"
    ));
    for pool in &catalog.pools {
        let marker = if pool.recommended { " *" } else { "" };
        out.push_str(&format!(
            "{:<20} {:>6.1} {:>11.4} {:<10} {:<12} {}\n",
            format!("{}{}", pool.name, marker),
            pool.fee,
            pool.min_payout,
            pool.pool_type,
            pool.location,
            pool.description
        ));
    }

    if !catalog.notes.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for (category, text) in &catalog.notes.recommendations {
            out.push_str(&format!("  {}: {}\n", category, text));
        }
    }
    out
}

/// 交互式控制界面
pub struct Ui {
    supervisor: Arc<ProcessSupervisor>,
    config_store: ConfigStore,
    catalog: PoolCatalog,
    probe: Arc<SystemProbe>,
    selected_pool: Option<Pool>,
    wallet_address: Option<String>,
}

impl Ui {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        config_store: ConfigStore,
        catalog: PoolCatalog,
        probe: Arc<SystemProbe>,
    ) -> Self {
        Self {
            supervisor,
            config_store,
            catalog,
            probe,
            selected_pool: None,
            wallet_address: None,
        }
    }

    /// 主循环：显示统计与菜单，处理命令，直到选择退出
    pub async fn run(&mut self) {
        println!("Monero Mining Controller");
        println!("Control your XMRig mining with dynamic CPU allocation\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let snapshot = self.supervisor.snapshot().await;
            println!("\n{}\n", render_stats(&snapshot));
            self.print_menu();

            let choice = match prompt(&mut lines, "> ").await {
                Some(c) => c,
                None => break, // stdin EOF 视同退出
            };

            if !self.handle_choice(&choice, &mut lines).await {
                break;
            }
        }

        // 退出前停掉仍在运行的 worker
        if self.supervisor.is_running().await {
            match self.supervisor.stop().await {
                Ok(message) => println!("{}", message),
                Err(e) => println!("{}", e),
            }
        }
        println!("Goodbye!");
    }

    fn print_menu(&self) {
        println!("--- Control Menu ---");
        match &self.selected_pool {
            Some(pool) => println!("1. Change Mining Pool (Current: {})", pool.name),
            None => println!("1. Select Mining Pool"),
        }
        match &self.wallet_address {
            Some(_) => println!("2. Change Wallet Address"),
            None => println!("2. Set Wallet Address"),
        }
        println!("3. Configure CPU Usage");
        println!("4. Start Mining");
        println!("5. Stop Mining");
        println!("6. Restart with New Settings");
        println!("7. View Current Configuration");
        println!("8. View Pool Comparison");
        println!("0. Exit");
    }

    /// 处理一次菜单选择；返回 false 表示退出循环
    async fn handle_choice(&mut self, choice: &str, lines: &mut InputLines) -> bool {
        match choice.trim() {
            "1" => self.select_pool(lines).await,
            "2" => self.set_wallet(lines).await,
            "3" => self.configure_cpu(lines).await,
            "4" => {
                if self.ensure_pool_and_wallet() && self.update_pool_config() {
                    match self.supervisor.start().await {
                        Ok(message) => println!("{}", message),
                        Err(e) => println!("{}", e),
                    }
                }
            }
            "5" => match self.supervisor.stop().await {
                Ok(message) => println!("{}", message),
                Err(e) => println!("{}", e),
            },
            "6" => {
                if self.ensure_pool_and_wallet() && self.update_pool_config() {
                    match self.supervisor.restart().await {
                        Ok(message) => println!("{}", message),
                        Err(e) => println!("{}", e),
                    }
                }
            }
            "7" => self.view_configuration(),
            "8" => println!("{}", render_pool_table(&self.catalog)),
            "0" => return false,
            _ => println!("Invalid choice!"),
        }
        true
    }

    fn ensure_pool_and_wallet(&self) -> bool {
        if self.selected_pool.is_none() {
            println!("Please select a mining pool first!");
            return false;
        }
        if self.wallet_address.is_none() {
            println!("Please set your wallet address first!");
            return false;
        }
        true
    }

    /// 把选中的矿池与钱包写进 worker 配置
    fn update_pool_config(&self) -> bool {
        let (pool, wallet) = match (self.selected_pool.as_ref(), self.wallet_address.as_ref()) {
            (Some(pool), Some(wallet)) => (pool, wallet),
            _ => return false,
        };

        let mut config = match self.config_store.load() {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to update configuration: {}", e);
                return false;
            }
        };
        ConfigStore::apply_pool_and_credential(&mut config, &pool.url, pool.port, wallet);
        match self.config_store.save(&config) {
            Ok(()) => true,
            Err(e) => {
                println!("Failed to update configuration: {}", e);
                false
            }
        }
    }

    async fn select_pool(&mut self, lines: &mut InputLines) {
        println!("{}", render_pool_table(&self.catalog));
        println!("Pool Selection Options:");
        for (i, pool) in self.catalog.pools.iter().enumerate() {
            let marker = if pool.recommended { " *" } else { "" };
            println!("{}. {}{}", i + 1, pool.name, marker);
        }
        println!("{}. Enter custom pool details", self.catalog.pools.len() + 1);

        let choice = match prompt(lines, "Select a pool: ").await {
            Some(c) => c,
            None => return,
        };
        let choice: usize = match choice.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                println!("Invalid choice!");
                return;
            }
        };

        if choice >= 1 && choice <= self.catalog.pools.len() {
            let pool = self.catalog.pools[choice - 1].clone();
            println!("Selected: {}", pool.name);
            self.selected_pool = Some(pool);
        } else if choice == self.catalog.pools.len() + 1 {
            if let Some(pool) = self.add_custom_pool(lines).await {
                println!("Added custom pool: {}", pool.name);
                self.selected_pool = Some(pool);
            }
        } else {
            println!("Invalid choice!");
        }
    }

    async fn add_custom_pool(&self, lines: &mut InputLines) -> Option<Pool> {
        println!("Add Custom Pool");
        let name = prompt(lines, "Pool name: ").await?;
        let url = prompt(lines, "Pool URL (without port): ").await?;
        let port: u16 = prompt(lines, "Pool port: ").await?.trim().parse().ok()?;
        let fee: f64 = prompt(lines, "Pool fee (%) [1.0]: ")
            .await
            .map(|s| s.trim().parse().unwrap_or(1.0))?;
        let min_payout: f64 = prompt(lines, "Minimum payout (XMR) [0.1]: ")
            .await
            .map(|s| s.trim().parse().unwrap_or(0.1))?;

        Some(Pool {
            description: format!("Custom pool: {}", name.trim()),
            name: name.trim().to_string(),
            fee,
            min_payout,
            pool_type: "Custom".to_string(),
            location: "Custom".to_string(),
            features: vec!["Custom configuration".to_string()],
            recommended: false,
            url: url.trim().to_string(),
            port,
        })
    }

    async fn set_wallet(&mut self, lines: &mut InputLines) {
        let wallet = match prompt(lines, "Enter your Monero wallet address: ").await {
            Some(w) => w.trim().to_string(),
            None => return,
        };
        // 长度下限是最基本的健全性检查
        if wallet.len() > 50 {
            self.wallet_address = Some(wallet);
            println!("Wallet address set!");
        } else {
            println!("Invalid wallet address. Please try again.");
        }
    }

    async fn configure_cpu(&mut self, lines: &mut InputLines) {
        let logical = self.probe.logical_cores();
        let physical = self.probe.physical_cores();
        println!("--- CPU Configuration ---");
        println!("Physical cores: {}", physical);
        println!("Logical cores:  {}", logical);

        if let Ok(config) = self.config_store.load() {
            let current = ConfigStore::current_cpu(&config);
            match current.thread_count() {
                Some(n) => println!("Active threads: {}", n),
                None => println!("Active threads: Auto"),
            }
            println!(
                "CPU priority:   {}",
                current.priority_description()
            );
        }

        let threads: u32 = match prompt(lines, &format!("Number of CPU threads to use (1-{}): ", logical)).await {
            Some(t) => match t.trim().parse() {
                Ok(n) => n,
                Err(_) => {
                    println!("Invalid thread count");
                    return;
                }
            },
            None => return,
        };
        if threads < 1 || threads as usize > logical {
            println!("Invalid thread count");
            return;
        }

        let priority: u32 = match prompt(lines, "CPU priority (0=highest, 5=lowest): ").await {
            Some(p) => match p.trim().parse() {
                Ok(n) => n,
                Err(_) => {
                    println!("Invalid priority level");
                    return;
                }
            },
            None => return,
        };
        if priority > 5 {
            println!("Invalid priority level");
            return;
        }

        let mut config = match self.config_store.load() {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to update CPU configuration: {}", e);
                return;
            }
        };
        let updated =
            ConfigStore::apply_cpu(&mut config, Some(threads), Some(priority), None, logical);
        if updated {
            match self.config_store.save(&config) {
                Ok(()) => println!("CPU configured: {} threads, priority {}", threads, priority),
                Err(e) => println!("Failed to update CPU configuration: {}", e),
            }
        }
    }

    fn view_configuration(&self) {
        match self.config_store.load() {
            Ok(config) => {
                println!("Current Configuration:");
                match serde_json::to_string_pretty(&config) {
                    Ok(text) => println!("{}", text),
                    Err(_) => println!("{}", config),
                }
            }
            Err(e) => println!("Could not load configuration: {}", e),
        }
    }
}

/// 打印提示并读取一行输入；stdin 关闭时返回 None
async fn prompt(lines: &mut InputLines, message: &str) -> Option<String> {
    use std::io::Write;
    print!("{}", message);
    let _ = std::io::stdout().flush();
    lines.next_line().await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(45)), "45s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_uptime(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_render_stats_stopped() {
        let snapshot = MetricsSnapshot {
            hashrate: 0.0,
            peak_hashrate: 0.0,
            accepted_shares: 0,
            rejected_shares: 0,
            acceptance_rate: 0.0,
            cpu_usage: 12.5,
            memory_usage: 40.0,
            uptime: Duration::from_secs(0),
            running: false,
        };
        let text = render_stats(&snapshot);
        assert!(text.contains("Status:          Stopped"));
        assert!(text.contains("Hashrate:        N/A"));
    }

    #[test]
    fn test_render_pool_table_empty() {
        let catalog = PoolCatalog::default();
        assert_eq!(render_pool_table(&catalog), "No pools available!");
    }

    #[test]
    fn test_render_pool_table_marks_recommended() {
        let catalog = PoolCatalog {
            pools: vec![Pool {
                name: "P1".into(),
                fee: 1.0,
                min_payout: 0.1,
                pool_type: "PPLNS".into(),
                location: "EU".into(),
                description: "d".into(),
                features: vec![],
                recommended: true,
                url: "p1.example.com".into(),
                port: 443,
            }],
            notes: Default::default(),
        };
        let text = render_pool_table(&catalog);
        assert!(text.contains("P1 *"));
    }
}

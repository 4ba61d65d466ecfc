//! 矿池目录 - 只读的外部协作者
//!
//! 核心只消费 host/port/凭据上下文；目录本身不校验也不回写。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// 目录中的一个矿池条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool {
    pub name: String,
    pub fee: f64,
    pub min_payout: f64,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub recommended: bool,
    pub url: String,
    pub port: u16,
}

/// 目录附带的推荐说明
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogNotes {
    #[serde(default)]
    pub recommendations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pools: Vec<Pool>,
    #[serde(default)]
    notes: CatalogNotes,
}

/// 矿池目录
#[derive(Debug, Default)]
pub struct PoolCatalog {
    pub pools: Vec<Pool>,
    pub notes: CatalogNotes,
}

impl PoolCatalog {
    /// 从 JSON 文件加载目录
    ///
    /// 与配置文件不同，目录缺失或损坏不算失败：记一条警告并返回空目录，
    /// UI 会显示"无可用矿池"。
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Pools file {} not readable: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<CatalogFile>(&content) {
            Ok(file) => Self {
                pools: file.pools,
                notes: file.notes,
            },
            Err(e) => {
                warn!("Invalid pools file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// 按名称查找（大小写不敏感）
    pub fn find(&self, name: &str) -> Option<&Pool> {
        self.pools
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.json");
        std::fs::write(
            &path,
            r#"{
                "pools": [
                    {
                        "name": "ExamplePool",
                        "fee": 0.6,
                        "min_payout": 0.1,
                        "type": "PPLNS",
                        "location": "EU",
                        "description": "Example",
                        "recommended": true,
                        "url": "pool.example.com",
                        "port": 443
                    }
                ],
                "notes": { "recommendations": { "beginners": "use ExamplePool" } }
            }"#,
        )
        .unwrap();

        let catalog = PoolCatalog::load(&path);
        assert_eq!(catalog.pools.len(), 1);
        assert!(catalog.pools[0].recommended);
        assert_eq!(catalog.pools[0].port, 443);
        assert_eq!(
            catalog.notes.recommendations.get("beginners").unwrap(),
            "use ExamplePool"
        );
        assert!(catalog.find("examplepool").is_some());
        assert!(catalog.find("unknown").is_none());
    }

    #[test]
    fn test_missing_or_invalid_catalog_is_empty() {
        assert!(PoolCatalog::load("/nonexistent/pools.json").is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(PoolCatalog::load(&path).is_empty());
    }
}

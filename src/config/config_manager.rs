// ==========================================
// 海上物流报表 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::pipeline_config::{
    QualityRules, DEFAULT_BATCH_SIZE, DEFAULT_LOGISTICS_BASE, DEFAULT_NEEDS_REVIEW_THRESHOLD,
};
use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取并解析数值配置；解析失败时告警并回落默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 读取 global scope 的配置值（公开方法，供 CLI 复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取 config_kv 中 global 覆写项的原始快照（JSON格式）
    ///
    /// # 说明
    /// - 仅含显式写入的键值，未经默认值回落
    /// - 生效配置见 `EnrichmentSummary::config_snapshot`
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// PipelineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    // ===== 批处理配置 =====

    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(config_keys::BATCH_SIZE, DEFAULT_BATCH_SIZE)?;
        if size == 0 {
            tracing::warn!(config_key = config_keys::BATCH_SIZE, "批次大小为 0，使用默认值");
            return Ok(DEFAULT_BATCH_SIZE);
        }
        Ok(size)
    }

    async fn get_needs_review_threshold(&self) -> Result<u8, Box<dyn Error>> {
        let threshold = self.get_parsed_or_default(
            config_keys::NEEDS_REVIEW_THRESHOLD,
            DEFAULT_NEEDS_REVIEW_THRESHOLD,
        )?;
        Ok(threshold.min(100))
    }

    // ===== 数据质量配置 =====

    async fn get_max_effort_hours(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::MAX_EFFORT_HOURS,
            QualityRules::default().max_effort_hours,
        )
    }

    async fn get_daily_rate_band(&self) -> Result<(f64, f64), Box<dyn Error>> {
        let defaults = QualityRules::default();
        let min = self.get_parsed_or_default(config_keys::DAILY_RATE_MIN, defaults.daily_rate_min)?;
        let max = self.get_parsed_or_default(config_keys::DAILY_RATE_MAX, defaults.daily_rate_max)?;

        if min > max {
            tracing::warn!(min, max, "日费率区间上下限颠倒，使用默认区间");
            return Ok((defaults.daily_rate_min, defaults.daily_rate_max));
        }
        Ok((min, max))
    }

    async fn get_valid_year_range(&self) -> Result<(i32, i32), Box<dyn Error>> {
        let defaults = QualityRules::default();
        let min = self.get_parsed_or_default(config_keys::VALID_YEAR_MIN, defaults.valid_year_min)?;
        let max = self.get_parsed_or_default(config_keys::VALID_YEAR_MAX, defaults.valid_year_max)?;

        if min > max {
            tracing::warn!(min, max, "有效年份区间上下限颠倒，使用默认区间");
            return Ok((defaults.valid_year_min, defaults.valid_year_max));
        }
        Ok((min, max))
    }

    // ===== 航次配置 =====

    async fn get_logistics_bases(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::LOGISTICS_BASES, "[]")?;

        // 配置格式为 JSON 数组: ["Fourchon", "Galveston"]
        let bases: Vec<String> = serde_json::from_str::<Vec<String>>(&value)
            .unwrap_or_else(|_| {
                tracing::warn!(
                    config_key = config_keys::LOGISTICS_BASES,
                    raw_value = %value,
                    "物流基地配置格式错误，使用默认配置"
                );
                Vec::new()
            })
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if bases.is_empty() {
            Ok(vec![DEFAULT_LOGISTICS_BASE.to_string()])
        } else {
            Ok(bases)
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批处理
    pub const BATCH_SIZE: &str = "pipeline/batch_size";
    pub const NEEDS_REVIEW_THRESHOLD: &str = "pipeline/needs_review_threshold";

    // 数据质量
    pub const MAX_EFFORT_HOURS: &str = "quality/max_effort_hours";
    pub const DAILY_RATE_MIN: &str = "quality/daily_rate_min";
    pub const DAILY_RATE_MAX: &str = "quality/daily_rate_max";
    pub const VALID_YEAR_MIN: &str = "quality/valid_year_min";
    pub const VALID_YEAR_MAX: &str = "quality/valid_year_max";

    // 航次
    pub const LOGISTICS_BASES: &str = "voyage/logistics_bases"; // JSON 数组
}

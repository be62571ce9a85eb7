// ==========================================
// 物业数据迁移引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// 规则: 缺失或无法解析的值一律回退默认值（记 warn 日志）
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::{ensure_schema, open_sqlite_connection};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const MAX_CONCURRENT_WRITERS: usize = 4;
    pub const MAX_CONCURRENT_WRITERS_CAP: usize = 32;
    pub const ROW_WRITE_TIMEOUT_MS: u64 = 5_000;
    pub const RUN_TIMEOUT_MS: u64 = 600_000;
    pub const PREVIEW_ROWS: usize = 20;
    pub const HEADER_MATCH_THRESHOLD: f64 = 0.85;
    pub const FK_FUZZY_THRESHOLD: f64 = 0.90;
}

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
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：对传入连接再次应用统一 PRAGMA 与建表（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![GLOBAL_SCOPE, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// 读取并解析配置值，缺失或无法解析时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key = key, value = %raw, "配置值无法解析，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 阈值类配置必须落在 (0, 1]
    fn get_threshold_or_default(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let value = self.get_parsed_or_default(key, default)?;
        if value > 0.0 && value <= 1.0 {
            Ok(value)
        } else {
            warn!(key = key, value = value, "阈值超出 (0, 1]，使用默认值");
            Ok(default)
        }
    }
}

// ==========================================
// 实现 ImportConfigReader Trait
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_concurrent_writers(&self) -> ConfigResult<usize> {
        let value = self.get_parsed_or_default(config_keys::MAX_CONCURRENT_WRITERS, defaults::MAX_CONCURRENT_WRITERS)?;
        Ok(value.clamp(1, defaults::MAX_CONCURRENT_WRITERS_CAP))
    }

    async fn get_row_write_timeout_ms(&self) -> ConfigResult<u64> {
        let value = self.get_parsed_or_default(config_keys::ROW_WRITE_TIMEOUT_MS, defaults::ROW_WRITE_TIMEOUT_MS)?;
        Ok(if value == 0 { defaults::ROW_WRITE_TIMEOUT_MS } else { value })
    }

    async fn get_run_timeout_ms(&self) -> ConfigResult<u64> {
        let value = self.get_parsed_or_default(config_keys::RUN_TIMEOUT_MS, defaults::RUN_TIMEOUT_MS)?;
        Ok(if value == 0 { defaults::RUN_TIMEOUT_MS } else { value })
    }

    async fn get_preview_rows(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::PREVIEW_ROWS, defaults::PREVIEW_ROWS)
    }

    async fn get_header_match_threshold(&self) -> ConfigResult<f64> {
        self.get_threshold_or_default(config_keys::HEADER_MATCH_THRESHOLD, defaults::HEADER_MATCH_THRESHOLD)
    }

    async fn get_fk_fuzzy_threshold(&self) -> ConfigResult<f64> {
        self.get_threshold_or_default(config_keys::FK_FUZZY_THRESHOLD, defaults::FK_FUZZY_THRESHOLD)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 执行期资源
    pub const MAX_CONCURRENT_WRITERS: &str = "import_max_concurrent_writers";
    pub const ROW_WRITE_TIMEOUT_MS: &str = "import_row_write_timeout_ms";
    pub const RUN_TIMEOUT_MS: &str = "import_run_timeout_ms";

    // 预演
    pub const PREVIEW_ROWS: &str = "import_preview_rows";

    // 匹配阈值
    pub const HEADER_MATCH_THRESHOLD: &str = "import_header_match_threshold";
    pub const FK_FUZZY_THRESHOLD: &str = "import_fk_fuzzy_threshold";
}

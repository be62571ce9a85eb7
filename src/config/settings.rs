// ==========================================
// 物业数据迁移引擎 - 导入运行参数
// ==========================================
// 职责: 把配置读取结果收敛为一份纯数据快照，交给引擎使用
// ==========================================

use crate::config::config_manager::defaults;
use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub max_concurrent_writers: usize,
    pub row_write_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub preview_rows: usize,
    pub header_match_threshold: f64,
    pub fk_fuzzy_threshold: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_concurrent_writers: defaults::MAX_CONCURRENT_WRITERS,
            row_write_timeout_ms: defaults::ROW_WRITE_TIMEOUT_MS,
            run_timeout_ms: defaults::RUN_TIMEOUT_MS,
            preview_rows: defaults::PREVIEW_ROWS,
            header_match_threshold: defaults::HEADER_MATCH_THRESHOLD,
            fk_fuzzy_threshold: defaults::FK_FUZZY_THRESHOLD,
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载
    pub async fn load<C>(reader: &C) -> ConfigResult<Self>
    where
        C: ImportConfigReader + ?Sized,
    {
        Ok(Self {
            max_concurrent_writers: reader.get_max_concurrent_writers().await?,
            row_write_timeout_ms: reader.get_row_write_timeout_ms().await?,
            run_timeout_ms: reader.get_run_timeout_ms().await?,
            preview_rows: reader.get_preview_rows().await?,
            header_match_threshold: reader.get_header_match_threshold().await?,
            fk_fuzzy_threshold: reader.get_fk_fuzzy_threshold().await?,
        })
    }

    pub fn row_write_timeout(&self) -> Duration {
        Duration::from_millis(self.row_write_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

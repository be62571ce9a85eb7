// ==========================================
// 物业数据迁移引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 执行期资源 =====

    /// 并发写入数
    ///
    /// # 默认值
    /// - 4（取值收敛到 1..=32）
    async fn get_max_concurrent_writers(&self) -> ConfigResult<usize>;

    /// 单行写入超时（毫秒）
    ///
    /// # 默认值
    /// - 5000
    async fn get_row_write_timeout_ms(&self) -> ConfigResult<u64>;

    /// 整次运行超时（毫秒）
    ///
    /// # 默认值
    /// - 600000
    async fn get_run_timeout_ms(&self) -> ConfigResult<u64>;

    // ===== 预演 =====

    /// 预演结果中的示例行数
    ///
    /// # 默认值
    /// - 20
    async fn get_preview_rows(&self) -> ConfigResult<usize>;

    // ===== 匹配阈值 =====

    /// 表头模糊匹配阈值（默认 0.85）
    async fn get_header_match_threshold(&self) -> ConfigResult<f64>;

    /// 外键模糊匹配阈值（默认 0.90）
    async fn get_fk_fuzzy_threshold(&self) -> ConfigResult<f64>;
}

// ==========================================
// 物业数据迁移引擎 - 配置层
// ==========================================
// 职责: 导入运行参数（并发、超时、阈值、预演行数）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportConfigReader};
pub use settings::ImportSettings;

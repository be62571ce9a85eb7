// ==========================================
// 物业数据迁移引擎 - 核心库
// ==========================================
// 系统定位: 物业管理 SaaS 的历史数据迁移/导入核心
// 技术栈: Rust + SQLite
// 调用方式: 由宿主应用以库的形式调用（validate / execute / template）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 目标实体库
pub mod repository;

// 导入层 - 映射/校验/转换/执行
pub mod importer;

// 配置层 - 导入运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 宿主接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CanonicalRecord, EntityType, ForeignKeyOverrides, ImportJob, ImportOutcome, IssueKind, JobStatus,
    Severity, ValidationIssue, ValidationResult,
};

// 导入
pub use importer::{DataImporter, ImportEngine, ImportError, ImportResult};

// 仓储
pub use repository::{EntityStore, SqliteEntityStore};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物业数据迁移引擎";

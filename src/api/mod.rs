// ==========================================
// 物业数据迁移引擎 - API 层
// ==========================================
// 职责: 提供导入 API 接口,供宿主应用调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;

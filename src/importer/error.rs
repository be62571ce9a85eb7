// ==========================================
// 物业数据迁移引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅“文件级”与“运行级”失败走错误通道；
//       行级问题以 ValidationIssue / RowError 作为数据返回
// ==========================================

use crate::domain::import::{ImportOutcome, InvalidTransition};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件级错误（整个文件拒收）=====
    #[error("文件无法读取: {0}")]
    UnreadableFile(String),

    #[error("缺少必填列 ({entity}): {}", .fields.join(", "))]
    MissingRequiredColumn { entity: String, fields: Vec<String> },

    #[error("列映射存在歧义: 字段 {field} 同时匹配 {}", .columns.join(", "))]
    AmbiguousColumnMapping { field: String, columns: Vec<String> },

    #[error("不支持的实体类型: {0}")]
    UnsupportedEntityType(String),

    // ===== 作业状态错误 =====
    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidTransition),

    // ===== 运行级错误（携带已完成部分的结果）=====
    #[error("目标库不可用: {message}")]
    StoreUnavailable {
        message: String,
        partial: Box<ImportOutcome>,
    },

    #[error("导入运行超时 ({elapsed_ms} ms)")]
    RunTimeout {
        elapsed_ms: u64,
        partial: Box<ImportOutcome>,
    },

    // ===== 依赖层错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("配置错误: {0}")]
    Config(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 文件级错误：validate 以 Err 返回，作业进入 Failed
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            ImportError::UnreadableFile(_)
                | ImportError::MissingRequiredColumn { .. }
                | ImportError::AmbiguousColumnMapping { .. }
                | ImportError::UnsupportedEntityType(_)
        )
    }

    /// 运行级错误携带的部分结果
    pub fn partial_outcome(&self) -> Option<&ImportOutcome> {
        match self {
            ImportError::StoreUnavailable { partial, .. } | ImportError::RunTimeout { partial, .. } => {
                Some(partial.as_ref())
            }
            _ => None,
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::UnreadableFile(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::UnreadableFile(format!("CSV 解析失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

// ==========================================
// 物业数据迁移引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把导入层/仓储层错误转换为宿主可展示的错误
// 红线: 行级问题不经过这里，它们是结果数据
// ==========================================

use crate::domain::import::ImportOutcome;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用参数错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 文件级拒收（未处理任何行）
    // ==========================================
    #[error("文件被拒收: {0}")]
    FileRejected(String),

    // ==========================================
    // 运行级失败（保留已提交部分）
    // ==========================================
    #[error("导入失败: {message}")]
    ImportFailed {
        message: String,
        partial: Option<Box<ImportOutcome>>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 运行级失败时已提交部分的结果
    pub fn partial_outcome(&self) -> Option<&ImportOutcome> {
        match self {
            ApiError::ImportFailed { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedEntityType(entity) => {
                ApiError::InvalidInput(format!("不支持的实体类型: {}", entity))
            }
            ImportError::UnreadableFile(_)
            | ImportError::MissingRequiredColumn { .. }
            | ImportError::AmbiguousColumnMapping { .. } => ApiError::FileRejected(err.to_string()),
            ImportError::StoreUnavailable { message, partial } => ApiError::ImportFailed {
                message: format!("目标库不可用: {}", message),
                partial: Some(partial),
            },
            ImportError::RunTimeout { elapsed_ms, partial } => ApiError::ImportFailed {
                message: format!("超过整次运行时限 ({} ms)", elapsed_ms),
                partial: Some(partial),
            },
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::InvalidStateTransition(e) => ApiError::InternalError(e.to_string()),
            ImportError::Config(msg) | ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseError(format!("数据库连接失败: {}", msg))
            }
            RepositoryError::LockError(msg) => ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg)),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

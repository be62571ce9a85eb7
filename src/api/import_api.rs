// ==========================================
// 物业数据迁移引擎 - 导入API
// ==========================================
// 职责: 面向宿主应用的导入入口（基于 SQLite 目标库路径）
// 说明: 鉴权、租户隔离、上传处理均由宿主负责
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::domain::import::{ForeignKeyOverrides, ImportOutcome, ValidationResult};
use crate::importer::{CsvParser, DataImporter, ImportEngine};
use crate::repository::SqliteEntityStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// 每次调用新建引擎：配置按调用时生效，外键缓存只在本次调用内有效
    async fn create_engine(&self) -> ApiResult<ImportEngine> {
        let store = SqliteEntityStore::new(&self.db_path)?;
        let config = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::DatabaseError(format!("创建配置管理器失败: {}", e)))?;
        let settings = match ImportSettings::load(&config).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "读取导入配置失败，使用默认配置");
                ImportSettings::default()
            }
        };
        Ok(ImportEngine::new(Arc::new(store), settings))
    }

    /// 预演
    ///
    /// # 返回
    /// - Ok(ValidationResult): 行级问题作为数据返回
    /// - Err(FileRejected / InvalidInput): 文件级拒收
    pub async fn validate(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ApiResult<ValidationResult> {
        let engine = self.create_engine().await?;
        let overrides = fk_override.cloned().unwrap_or_default();
        Ok(engine
            .validate_with_overrides(file, entity_type, source_system, &overrides)
            .await?)
    }

    /// 执行导入
    pub async fn execute(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ApiResult<ImportOutcome> {
        let engine = self.create_engine().await?;
        let outcome = engine.execute(file, entity_type, source_system, fk_override).await?;
        info!(
            job_id = %outcome.job_id,
            status = %outcome.status,
            successful_imports = outcome.successful_imports,
            failed_imports = outcome.failed_imports,
            "导入API调用完成"
        );
        Ok(outcome)
    }

    /// 从文件路径预演（仅支持 .csv）
    pub async fn validate_file(
        &self,
        file_path: &str,
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ApiResult<ValidationResult> {
        let bytes = CsvParser::read_path(Path::new(file_path))?;
        self.validate(&bytes, entity_type, source_system, fk_override).await
    }

    /// 从文件路径执行导入（仅支持 .csv）
    pub async fn execute_file(
        &self,
        file_path: &str,
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ApiResult<ImportOutcome> {
        let bytes = CsvParser::read_path(Path::new(file_path))?;
        self.execute(&bytes, entity_type, source_system, fk_override).await
    }

    /// 导入模板
    pub fn template(&self, entity_type: &str) -> ApiResult<String> {
        Ok(ImportEngine::template_for(entity_type)?)
    }
}

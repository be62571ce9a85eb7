// ==========================================
// 物业数据迁移引擎 - 导入器 Trait
// ==========================================
// 职责: 宿主应用调用导入核心的唯一接口
// 红线: 只返回结构化结果，不做任何面向用户的 I/O
// ==========================================

use crate::domain::import::{ForeignKeyOverrides, ImportOutcome, ValidationResult};
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// DataImporter Trait
// ==========================================
// 实现者: ImportEngine
#[async_trait]
pub trait DataImporter: Send + Sync {
    /// 预演：解析、映射、校验、外键解析，不写库
    ///
    /// # 参数
    /// - file: UTF-8 CSV 内容（首行为表头）
    /// - entity_type: building / unit / tenant / contract / payment / provider / expense
    /// - source_system: 来源系统 ID，未知值使用通用配置
    ///
    /// # 返回
    /// - Ok(ValidationResult): 行级问题作为数据返回
    /// - Err: 文件级致命错误（UnreadableFile / MissingRequiredColumn /
    ///   AmbiguousColumnMapping / UnsupportedEntityType）或目标库读取失败
    async fn validate(&self, file: &[u8], entity_type: &str, source_system: &str) -> ImportResult<ValidationResult>;

    /// 执行导入：逐行写入，单行失败不影响其他行
    ///
    /// # 参数
    /// - fk_override: 人工指定的外键目标（如目标楼宇 ID）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): total_rows = successful_imports + failed_imports
    /// - Err(StoreUnavailable / RunTimeout): 携带已提交部分的结果
    async fn execute(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ImportResult<ImportOutcome>;

    /// 生成导入模板（标准表头 + 示例行）
    fn template(&self, entity_type: &str) -> ImportResult<String>;
}

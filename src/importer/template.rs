// ==========================================
// 物业数据迁移引擎 - 导入模板生成
// ==========================================
// 输出: 标准表头 + 一行示例（UTF-8，逗号分隔）
// ==========================================

use crate::domain::schema::EntitySchema;
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;

/// 生成实体导入模板
///
/// 示例行按通用配置（ISO 日期、'.' 小数点）书写，可直接回灌校验
pub fn generate_template(schema: &EntitySchema) -> ImportResult<String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    writer.write_record(schema.fields.iter().map(|f| f.name))?;
    writer.write_record(schema.fields.iter().map(|f| f.example))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::InternalError(format!("模板写出失败: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ImportError::InternalError(e.to_string()))
}

// ==========================================
// 物业数据迁移引擎 - 导入层
// ==========================================
// 职责: 历史系统 CSV → 标准实体
// 流程: 解析 → 表头映射 → 校验 → 转换 → 外键解析 → 写入
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod error;
pub mod executor;
pub mod file_parser;
pub mod fk_resolver;
pub mod import_engine;
pub mod importer_trait;
pub mod record_validator;
pub mod row_processor;
pub mod schema_mapper;
pub mod source_profile;
pub mod template;
pub mod transformer;

// 重导出核心类型
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use executor::{ImportExecutor, PendingRow};
pub use file_parser::{CsvParser, ParsedFile, RawRow};
pub use fk_resolver::{ForeignKeyResolver, Resolution};
pub use import_engine::ImportEngine;
pub use importer_trait::DataImporter;
pub use record_validator::{RecordValidator, RowReport};
pub use row_processor::{Prepared, RowProcessor};
pub use schema_mapper::{HeaderMapping, SchemaMapper};
pub use source_profile::{get_profile, resolve_header_alias, SourceProfile};
pub use template::generate_template;
pub use transformer::Transformer;

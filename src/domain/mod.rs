// ==========================================
// 物业数据迁移引擎 - 领域模型层
// ==========================================
// 职责: 实体类型、标准结构、规范记录、导入作业
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod record;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use import::{
    FailureKind, ForeignKeyOverrides, ImportAudit, ImportJob, ImportOutcome, InvalidTransition,
    MappingSummary, PreviewRow, RowError, ValidationIssue, ValidationResult,
};
pub use record::{
    BuildingRecord, CanonicalRecord, ContractRecord, ExpenseRecord, PaymentRecord, ProviderRecord,
    TenantRecord, UnitRecord,
};
pub use schema::{EntitySchema, FieldSpec};
pub use types::{EntityType, FieldType, IssueKind, JobStatus, Severity};

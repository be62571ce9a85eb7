// ==========================================
// 物业数据迁移引擎 - 领域类型定义
// ==========================================
// 职责: 实体类型 / 字段类型 / 问题级别 / 作业状态
// 红线: 作业状态只允许前进，不允许回退
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 实体类型 (Entity Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Building, // 建筑/楼宇
    Unit,     // 房源单元
    Tenant,   // 租户
    Contract, // 租约
    Payment,  // 收款
    Provider, // 供应商
    Expense,  // 支出
}

impl EntityType {
    /// 全部实体类型（声明顺序）
    pub const ALL: [EntityType; 7] = [
        EntityType::Building,
        EntityType::Unit,
        EntityType::Tenant,
        EntityType::Contract,
        EntityType::Payment,
        EntityType::Provider,
        EntityType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Building => "building",
            EntityType::Unit => "unit",
            EntityType::Tenant => "tenant",
            EntityType::Contract => "contract",
            EntityType::Payment => "payment",
            EntityType::Provider => "provider",
            EntityType::Expense => "expense",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// 接受单复数形式（宿主应用路由中两种都有）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "building" | "buildings" => Ok(EntityType::Building),
            "unit" | "units" => Ok(EntityType::Unit),
            "tenant" | "tenants" => Ok(EntityType::Tenant),
            "contract" | "contracts" => Ok(EntityType::Contract),
            "payment" | "payments" => Ok(EntityType::Payment),
            "provider" | "providers" => Ok(EntityType::Provider),
            "expense" | "expenses" => Ok(EntityType::Expense),
            other => Err(other.to_string()),
        }
    }
}

// ==========================================
// 字段类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Date,
    Enum,
    Boolean,
    ForeignKey,
}

// ==========================================
// 问题级别 (Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,   // 错误（该行不导入）
    Warning, // 警告（该行照常导入）
}

// ==========================================
// 行级问题类型 (Issue Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    // ===== 行级错误 =====
    RequiredFieldMissing,
    TypeCoercionFailed,
    AmbiguousForeignKey,
    UnresolvedForeignKey,
    OutOfRangeValue,

    // ===== 行级警告 =====
    UnknownEnumValueDefaulted,
    DateOutOfExpectedRange,
    ExtraUnmappedColumnIgnored,
    ExistingRecordSkipped,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::RequiredFieldMissing
            | IssueKind::TypeCoercionFailed
            | IssueKind::AmbiguousForeignKey
            | IssueKind::UnresolvedForeignKey
            | IssueKind::OutOfRangeValue => Severity::Error,
            IssueKind::UnknownEnumValueDefaulted
            | IssueKind::DateOutOfExpectedRange
            | IssueKind::ExtraUnmappedColumnIgnored
            | IssueKind::ExistingRecordSkipped => Severity::Warning,
        }
    }
}

// ==========================================
// 导入作业状态 (Job Status)
// ==========================================
// 合法迁移:
//   Created → Validated | Failed
//   Validated → Importing
//   Importing → Completed | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Validated,
    Importing,
    Completed,
    Failed,
}

impl JobStatus {
    /// 状态迁移表
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Created, JobStatus::Validated)
                | (JobStatus::Created, JobStatus::Failed)
                | (JobStatus::Validated, JobStatus::Importing)
                | (JobStatus::Importing, JobStatus::Completed)
                | (JobStatus::Importing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::Validated => write!(f, "VALIDATED"),
            JobStatus::Importing => write!(f, "IMPORTING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("units".parse::<EntityType>(), Ok(EntityType::Unit));
        assert_eq!(" Building ".parse::<EntityType>(), Ok(EntityType::Building));
        assert!("parking".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_job_status_forward_only() {
        assert!(JobStatus::Created.can_transition_to(JobStatus::Validated));
        assert!(JobStatus::Validated.can_transition_to(JobStatus::Importing));
        assert!(JobStatus::Importing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Importing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Validated.can_transition_to(JobStatus::Created));
        assert!(!JobStatus::Created.can_transition_to(JobStatus::Importing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Importing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Validated));
    }

    #[test]
    fn test_issue_kind_severity() {
        assert_eq!(IssueKind::TypeCoercionFailed.severity(), Severity::Error);
        assert_eq!(IssueKind::UnknownEnumValueDefaulted.severity(), Severity::Warning);
    }
}

// ==========================================
// 物业数据迁移引擎 - 导入作业领域模型
// ==========================================
// 职责: ImportJob 状态机 / 校验问题 / 校验结果 / 导入结果 / 审计记录
// 红线: total_rows = successful_imports + failed_imports
// ==========================================

use crate::domain::record::CanonicalRecord;
use crate::domain::types::{EntityType, IssueKind, JobStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// InvalidTransition - 非法状态迁移
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无效的状态转换: from={from} to={to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

// ==========================================
// ImportJob - 导入作业
// ==========================================
// 生命周期: 仅由 validate (Created→Validated) 与 execute (Validated→Importing→终态) 推进
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    pub entity_type: EntityType,
    pub source_profile_id: String,
    pub file_checksum: String, // SHA-256（十六进制）
    pub status: JobStatus,
    pub file_level_valid: bool, // 文件级校验通过（无致命错误）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn new(entity_type: EntityType, source_profile_id: &str, file_checksum: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            entity_type,
            source_profile_id: source_profile_id.to_string(),
            file_checksum,
            status: JobStatus::Created,
            file_level_valid: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 按迁移表推进状态
    pub fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Validated → Importing，要求文件级校验通过
    pub fn begin_import(&mut self) -> Result<(), InvalidTransition> {
        if !self.file_level_valid {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Importing,
            });
        }
        self.transition(JobStatus::Importing)
    }
}

// ==========================================
// ValidationIssue - 行级问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: usize, // 从 1 开始，不含表头
    pub field: String,
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    pub raw_value: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        row: usize,
        field: impl Into<String>,
        kind: IssueKind,
        message: impl Into<String>,
        raw_value: Option<&str>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            severity: kind.severity(),
            kind,
            message: message.into(),
            raw_value: raw_value.map(str::to_string),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

// ==========================================
// 表头映射摘要
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub index: usize,
    pub header: String,
    pub field: String,
    pub confidence: f64, // 1.0 = 精确匹配
    pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoredColumn {
    pub index: usize,
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub mapped: Vec<MappedColumn>,
    pub ignored: Vec<IgnoredColumn>,
    pub unmapped_optional: Vec<String>,
}

// ==========================================
// ValidationResult - 预演结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub row: usize,
    pub record: CanonicalRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool, // 无任何 Error 级问题
    pub total_records: usize,
    pub importable_records: usize,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub preview: Vec<PreviewRow>,
    pub mapping: MappingSummary,
}

// ==========================================
// RowError - 执行期行失败
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Issue(IssueKind), // 校验/外键解析错误
    WriteRejected,    // 写入异常或约束违反
    WriteTimedOut,    // 单行写入超时（不自动重试）
    NotAttempted,     // 取消或运行级超时导致未派发
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub field: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl RowError {
    pub fn from_issue(issue: &ValidationIssue) -> Self {
        Self {
            row: issue.row,
            field: Some(issue.field.clone()),
            kind: FailureKind::Issue(issue.kind),
            message: issue.message.clone(),
        }
    }

    pub fn new(row: usize, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            row,
            field: None,
            kind,
            message: message.into(),
        }
    }
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub imported_ids: Vec<String>, // 按原始行序
    pub errors: Vec<RowError>,      // 按原始行序
    pub warnings: Vec<ValidationIssue>,
    pub aborted_reason: Option<String>,
    pub elapsed_ms: u64,
}

impl ImportOutcome {
    pub fn empty(job_id: &str, status: JobStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            total_rows: 0,
            successful_imports: 0,
            failed_imports: 0,
            imported_ids: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            aborted_reason: None,
            elapsed_ms: 0,
        }
    }

    /// 计数一致性: total = success + failed
    pub fn is_balanced(&self) -> bool {
        self.total_rows == self.successful_imports + self.failed_imports
    }
}

// ==========================================
// ForeignKeyOverrides - 人工指定外键目标
// ==========================================
// 例: 上传房源时操作员在界面选定目标楼宇
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyOverrides(BTreeMap<EntityType, String>);

impl ForeignKeyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: EntityType, id: impl Into<String>) -> Self {
        self.0.insert(target, id.into());
        self
    }

    pub fn get(&self, target: EntityType) -> Option<&str> {
        self.0.get(&target).map(String::as_str)
    }

    pub fn contains(&self, target: EntityType) -> bool {
        self.0.contains_key(&target)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ==========================================
// ImportAudit - 导入审计记录
// ==========================================
// 对齐: import_job 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAudit {
    pub job_id: String,
    pub entity_type: EntityType,
    pub source_profile_id: String,
    pub file_checksum: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    /// 本次运行生效的导入参数（JSON）
    pub settings_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportAudit {
    pub fn from_run(job: &ImportJob, outcome: &ImportOutcome) -> Self {
        Self {
            job_id: job.id.clone(),
            entity_type: job.entity_type,
            source_profile_id: job.source_profile_id.clone(),
            file_checksum: job.file_checksum.clone(),
            status: job.status,
            total_rows: outcome.total_rows,
            successful_imports: outcome.successful_imports,
            failed_imports: outcome.failed_imports,
            settings_json: None,
            created_at: job.created_at,
            finished_at: Utc::now(),
        }
    }
}

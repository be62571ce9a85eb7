// ==========================================
// 物业数据迁移引擎 - 单行处理管道
// ==========================================
// 流程: 转换（强类型）→ 外键解析 → 组装 CanonicalRecord
// 说明: 预演（validate）与执行（execute）共用，保证两者结论一致
// ==========================================

use crate::domain::import::{ForeignKeyOverrides, ValidationIssue};
use crate::domain::record::CanonicalRecord;
use crate::domain::schema::FieldSpec;
use crate::domain::types::IssueKind;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRow;
use crate::importer::fk_resolver::{ForeignKeyResolver, Resolution, UnresolvedReason};
use crate::importer::schema_mapper::HeaderMapping;
use crate::importer::transformer::{ResolvedReferences, Transformer};
use crate::repository::entity_store::ReferenceCandidate;
use std::sync::Arc;

/// 单行处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    Ready(CanonicalRecord),
    Rejected(Vec<ValidationIssue>),
}

pub struct RowProcessor {
    transformer: Transformer,
    mapping: HeaderMapping,
    resolver: Arc<ForeignKeyResolver>,
    overrides: ForeignKeyOverrides,
}

impl RowProcessor {
    pub fn new(
        transformer: Transformer,
        mapping: HeaderMapping,
        resolver: Arc<ForeignKeyResolver>,
        overrides: ForeignKeyOverrides,
    ) -> Self {
        Self {
            transformer,
            mapping,
            resolver,
            overrides,
        }
    }

    pub fn mapping(&self) -> &HeaderMapping {
        &self.mapping
    }

    /// 处理一条（已通过校验的）原始行
    ///
    /// # 返回
    /// - Ok(Ready): 可写入的规范记录
    /// - Ok(Rejected): 行级问题（外键无法解析等）
    /// - Err: 目标库读取失败
    pub async fn prepare(&self, row: &RawRow) -> ImportResult<Prepared> {
        let typed = match self.transformer.transform(row, &self.mapping) {
            Ok(typed) => typed,
            Err(issue) => return Ok(Prepared::Rejected(vec![issue])),
        };

        let mut refs = ResolvedReferences::new();
        let mut issues = Vec::new();
        for field in self.transformer.schema().foreign_keys() {
            let Some(target) = field.foreign_key_target else {
                continue;
            };
            let override_id = self.overrides.get(target);
            let reference = typed.reference(field.name);
            if override_id.is_none() && reference.is_none() {
                continue;
            }

            let text = reference.unwrap_or_default();
            match self.resolver.resolve(target, text, override_id).await? {
                Resolution::Resolved(id) => {
                    refs.insert(field.name, id);
                }
                Resolution::Unresolved { reason, candidates } => {
                    issues.push(reference_issue(row.row_number, field, text, override_id, reason, &candidates));
                }
            }
        }

        if !issues.is_empty() {
            return Ok(Prepared::Rejected(issues));
        }

        Ok(match self.transformer.assemble(&typed, &refs) {
            Ok(record) => Prepared::Ready(record),
            Err(issue) => Prepared::Rejected(vec![issue]),
        })
    }
}

fn reference_issue(
    row: usize,
    field: &FieldSpec,
    reference: &str,
    override_id: Option<&str>,
    reason: UnresolvedReason,
    candidates: &[ReferenceCandidate],
) -> ValidationIssue {
    let target = field
        .foreign_key_target
        .map(|t| t.to_string())
        .unwrap_or_default();
    let names = candidates
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (kind, message) = match (reason, override_id) {
        (UnresolvedReason::Ambiguous, _) => (
            IssueKind::AmbiguousForeignKey,
            format!("引用 '{}' 同时匹配多个 {}: {}", reference, target, names),
        ),
        (UnresolvedReason::NotFound, Some(id)) => (
            IssueKind::UnresolvedForeignKey,
            format!("指定的 {} ID '{}' 不存在", target, id),
        ),
        (UnresolvedReason::NotFound, None) if names.is_empty() => (
            IssueKind::UnresolvedForeignKey,
            format!("未找到匹配的 {}: '{}'", target, reference),
        ),
        (UnresolvedReason::NotFound, None) => (
            IssueKind::UnresolvedForeignKey,
            format!("未找到匹配的 {}: '{}'（相近: {}）", target, reference, names),
        ),
    };

    let raw = override_id.unwrap_or(reference);
    ValidationIssue::new(row, field.name, kind, message, Some(raw))
}

// ==========================================
// 物业数据迁移引擎 - 记录校验器 (Record Validator)
// ==========================================
// 职责: 按标准结构逐行校验，产出 Error / Warning
// 说明: 只读、无状态，按行并行（rayon），结果按行号合并
// 红线: 行级问题只作为数据返回，从不作为错误抛出
// ==========================================

use crate::domain::import::{ForeignKeyOverrides, ValidationIssue};
use crate::domain::schema::{EntitySchema, FieldSpec};
use crate::domain::types::{FieldType, IssueKind};
use crate::importer::data_cleaner::{fold_enum, DataCleaner};
use crate::importer::file_parser::RawRow;
use crate::importer::schema_mapper::HeaderMapping;
use chrono::{Datelike, NaiveDate, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;

/// 日期合理区间下限
pub const MIN_EXPECTED_YEAR: i32 = 1900;
/// 日期合理区间上限（相对今年）
pub const MAX_YEARS_AHEAD: i32 = 50;

/// 单行校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub row: usize,
    pub issues: Vec<ValidationIssue>,
}

impl RowReport {
    pub fn has_error(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }
}

// ==========================================
// RecordValidator
// ==========================================
pub struct RecordValidator<'a> {
    schema: &'static EntitySchema,
    mapping: &'a HeaderMapping,
    cleaner: DataCleaner<'static>,
    overrides: &'a ForeignKeyOverrides,
    today: NaiveDate,
}

impl<'a> RecordValidator<'a> {
    pub fn new(
        schema: &'static EntitySchema,
        mapping: &'a HeaderMapping,
        cleaner: DataCleaner<'static>,
        overrides: &'a ForeignKeyOverrides,
    ) -> Self {
        Self {
            schema,
            mapping,
            cleaner,
            overrides,
            today: Utc::now().date_naive(),
        }
    }

    /// 固定“今天”（测试用）
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// 并行校验所有行，输出顺序与输入行序一致
    pub fn validate_rows(&self, rows: &[RawRow]) -> Vec<RowReport> {
        rows.par_iter().map(|row| self.validate_row(row)).collect()
    }

    /// 校验单行：字段按声明顺序，之后是被忽略列（按列序）
    pub fn validate_row(&self, row: &RawRow) -> RowReport {
        let mut issues = Vec::new();

        for field in self.schema.fields {
            let Some(index) = self.mapping.column_for(field.name) else {
                continue;
            };
            let raw = row.value(index);
            if let Some(issue) = self.check_field(row.row_number, field, raw) {
                issues.push(issue);
            }
        }

        for column in &self.mapping.ignored {
            let raw = row.value(column.index);
            if !raw.is_empty() {
                issues.push(ValidationIssue::new(
                    row.row_number,
                    column.header.clone(),
                    IssueKind::ExtraUnmappedColumnIgnored,
                    format!("列 '{}' 未映射到任何字段，已忽略", column.header),
                    Some(raw),
                ));
            }
        }

        RowReport {
            row: row.row_number,
            issues,
        }
    }

    fn check_field(&self, row: usize, field: &FieldSpec, raw: &str) -> Option<ValidationIssue> {
        if raw.is_empty() {
            let overridden = field
                .foreign_key_target
                .map(|target| self.overrides.contains(target))
                .unwrap_or(false);
            if field.required && !overridden {
                return Some(ValidationIssue::new(
                    row,
                    field.name,
                    IssueKind::RequiredFieldMissing,
                    format!("必填字段 '{}' 为空", field.name),
                    None,
                ));
            }
            return None;
        }

        match field.field_type {
            // 字符串与外键只做非空检查，外键解析延后
            FieldType::String | FieldType::ForeignKey => None,
            FieldType::Number => self.check_number(row, field, raw),
            FieldType::Date => self.check_date(row, field, raw),
            FieldType::Enum => {
                if fold_enum(field, raw).is_some() {
                    return None;
                }
                let fallback = field.default_enum_value().unwrap_or_default();
                Some(ValidationIssue::new(
                    row,
                    field.name,
                    IssueKind::UnknownEnumValueDefaulted,
                    format!("未知取值 '{}'，将使用缺省值 '{}'", raw, fallback),
                    Some(raw),
                ))
            }
            FieldType::Boolean => self.cleaner.parse_boolean(raw).err().map(|message| {
                ValidationIssue::new(row, field.name, IssueKind::TypeCoercionFailed, message, Some(raw))
            }),
        }
    }

    fn check_number(&self, row: usize, field: &FieldSpec, raw: &str) -> Option<ValidationIssue> {
        let coercion_failed =
            |message: String| ValidationIssue::new(row, field.name, IssueKind::TypeCoercionFailed, message, Some(raw));

        let value = match self.cleaner.parse_number(raw) {
            Ok(v) => v,
            Err(message) => return Some(coercion_failed(message)),
        };

        if field.integer {
            match self.cleaner.parse_integer(raw) {
                Ok(n) if i32::try_from(n).is_err() => {
                    return Some(ValidationIssue::new(
                        row,
                        field.name,
                        IssueKind::OutOfRangeValue,
                        format!("数值 {} 超出整数范围", n),
                        Some(raw),
                    ));
                }
                Ok(_) => {}
                Err(message) => return Some(coercion_failed(message)),
            }
        }

        if field.non_negative && value < Decimal::ZERO {
            return Some(ValidationIssue::new(
                row,
                field.name,
                IssueKind::OutOfRangeValue,
                format!("字段 '{}' 不允许为负数: {}", field.name, value),
                Some(raw),
            ));
        }
        None
    }

    fn check_date(&self, row: usize, field: &FieldSpec, raw: &str) -> Option<ValidationIssue> {
        match self.cleaner.parse_date(raw) {
            Err(message) => Some(ValidationIssue::new(
                row,
                field.name,
                IssueKind::TypeCoercionFailed,
                message,
                Some(raw),
            )),
            Ok(date) => {
                let max_year = self.today.year() + MAX_YEARS_AHEAD;
                if date.year() < MIN_EXPECTED_YEAR || date.year() > max_year {
                    Some(ValidationIssue::new(
                        row,
                        field.name,
                        IssueKind::DateOutOfExpectedRange,
                        format!(
                            "日期 {} 超出合理区间 [{}, {}]",
                            date, MIN_EXPECTED_YEAR, max_year
                        ),
                        Some(raw),
                    ))
                } else {
                    None
                }
            }
        }
    }
}

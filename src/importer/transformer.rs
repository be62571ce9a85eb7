// ==========================================
// 物业数据迁移引擎 - 转换器 (Transformer)
// ==========================================
// 职责: 无 Error 的原始行 → 强类型值 → CanonicalRecord
// 规则:
// - 数值按来源区域格式解析，金额字段两位小数、四舍五入（远离零）
// - 日期统一为 UTC 日历日
// - 枚举同义词折叠为标准值，未知值回退到缺省值
// - 可选字段为空时为 None，从不补 0
// ==========================================

use crate::domain::import::ValidationIssue;
use crate::domain::record::{
    BuildingRecord, CanonicalRecord, ContractRecord, ExpenseRecord, PaymentRecord, ProviderRecord,
    TenantRecord, UnitRecord,
};
use crate::domain::schema::{EntitySchema, FieldSpec, EXTERNAL_ID_FIELD};
use crate::domain::types::{EntityType, FieldType, IssueKind};
use crate::importer::data_cleaner::{fold_enum, DataCleaner};
use crate::importer::file_parser::RawRow;
use crate::importer::schema_mapper::HeaderMapping;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// 强类型字段值
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Number(Decimal),
    Integer(i32),
    Date(NaiveDate),
    Enum(&'static str),
    Boolean(bool),
    Reference(String), // 未解析的外键引用文本
}

/// 一行的强类型值（空字段不出现）
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    pub row: usize,
    values: HashMap<&'static str, TypedValue>,
}

impl TypedRow {
    pub fn get(&self, field: &str) -> Option<&TypedValue> {
        self.values.get(field)
    }

    pub fn reference(&self, field: &str) -> Option<&str> {
        match self.values.get(field) {
            Some(TypedValue::Reference(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn text(&self, field: &str) -> Option<String> {
        match self.values.get(field) {
            Some(TypedValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn decimal(&self, field: &str) -> Option<Decimal> {
        match self.values.get(field) {
            Some(TypedValue::Number(d)) => Some(*d),
            _ => None,
        }
    }

    fn integer(&self, field: &str) -> Option<i32> {
        match self.values.get(field) {
            Some(TypedValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    fn date(&self, field: &str) -> Option<NaiveDate> {
        match self.values.get(field) {
            Some(TypedValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    fn choice(&self, field: &str) -> Option<String> {
        match self.values.get(field) {
            Some(TypedValue::Enum(s)) => Some(s.to_string()),
            _ => None,
        }
    }

    fn boolean(&self, field: &str) -> Option<bool> {
        match self.values.get(field) {
            Some(TypedValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}

/// 已解析外键: 字段名 → 内部 ID
pub type ResolvedReferences = HashMap<&'static str, String>;

// ==========================================
// Transformer
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    schema: &'static EntitySchema,
    cleaner: DataCleaner<'static>,
}

impl Transformer {
    pub fn new(schema: &'static EntitySchema, cleaner: DataCleaner<'static>) -> Self {
        Self { schema, cleaner }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// 原始行 → 强类型行
    ///
    /// 只应对校验无 Error 的行调用；个别值若仍无法转换，以 TypeCoercionFailed 返回
    pub fn transform(&self, row: &RawRow, mapping: &HeaderMapping) -> Result<TypedRow, ValidationIssue> {
        let mut values = HashMap::new();
        for field in self.schema.fields {
            let Some(index) = mapping.column_for(field.name) else {
                continue;
            };
            let raw = row.value(index);
            if raw.is_empty() {
                continue;
            }
            let value = self
                .coerce(field, raw)
                .map_err(|message| {
                    ValidationIssue::new(row.row_number, field.name, IssueKind::TypeCoercionFailed, message, Some(raw))
                })?;
            values.insert(field.name, value);
        }
        Ok(TypedRow {
            row: row.row_number,
            values,
        })
    }

    fn coerce(&self, field: &FieldSpec, raw: &str) -> Result<TypedValue, String> {
        match field.field_type {
            FieldType::String => Ok(TypedValue::Text(raw.to_string())),
            FieldType::ForeignKey => Ok(TypedValue::Reference(raw.to_string())),
            FieldType::Number if field.integer => {
                let n = self.cleaner.parse_integer(raw)?;
                i32::try_from(n)
                    .map(TypedValue::Integer)
                    .map_err(|_| format!("数值 {} 超出整数范围", n))
            }
            FieldType::Number => {
                let value = self.cleaner.parse_number(raw)?;
                Ok(TypedValue::Number(if field.monetary {
                    round_money(value)
                } else {
                    value.normalize()
                }))
            }
            FieldType::Date => self.cleaner.parse_date(raw).map(TypedValue::Date),
            FieldType::Enum => Ok(TypedValue::Enum(
                fold_enum(field, raw)
                    .or_else(|| field.default_enum_value())
                    .unwrap_or_default(),
            )),
            FieldType::Boolean => self.cleaner.parse_boolean(raw).map(TypedValue::Boolean),
        }
    }

    /// 强类型行 + 已解析外键 → CanonicalRecord
    pub fn assemble(&self, typed: &TypedRow, refs: &ResolvedReferences) -> Result<CanonicalRecord, ValidationIssue> {
        let row = typed.row;
        let missing = |field: &str| {
            ValidationIssue::new(
                row,
                field,
                IssueKind::RequiredFieldMissing,
                format!("必填字段 '{}' 为空", field),
                None,
            )
        };
        let text = |field: &'static str| typed.text(field).ok_or_else(|| missing(field));
        let reference = |field: &'static str| refs.get(field).cloned().ok_or_else(|| missing(field));
        let date = |field: &'static str| typed.date(field).ok_or_else(|| missing(field));
        let amount = |field: &'static str| typed.decimal(field).ok_or_else(|| missing(field));
        let external_id = typed.text(EXTERNAL_ID_FIELD);

        let record = match self.schema.entity_type {
            EntityType::Building => CanonicalRecord::Building(BuildingRecord {
                nombre: text("nombre")?,
                direccion: text("direccion")?,
                ciudad: typed.text("ciudad"),
                codigo_postal: typed.text("codigo_postal"),
                plantas: typed.integer("plantas"),
                ano_construccion: typed.integer("ano_construccion"),
                external_id,
            }),
            EntityType::Unit => CanonicalRecord::Unit(UnitRecord {
                building_id: reference("building")?,
                numero: text("numero")?,
                planta: typed.text("planta"),
                superficie: typed.decimal("superficie"),
                habitaciones: typed.integer("habitaciones"),
                banos: typed.integer("banos"),
                renta: typed.decimal("renta"),
                amueblado: typed.boolean("amueblado"),
                estado: typed.choice("estado"),
                external_id,
            }),
            EntityType::Tenant => CanonicalRecord::Tenant(TenantRecord {
                nombre: text("nombre")?,
                apellidos: typed.text("apellidos"),
                documento: typed.text("documento"),
                email: typed.text("email"),
                telefono: typed.text("telefono"),
                building_id: refs.get("building").cloned(),
                external_id,
            }),
            EntityType::Contract => CanonicalRecord::Contract(ContractRecord {
                referencia: text("referencia")?,
                unit_id: reference("unit")?,
                tenant_id: reference("tenant")?,
                fecha_inicio: date("fecha_inicio")?,
                fecha_fin: typed.date("fecha_fin"),
                renta: amount("renta")?,
                fianza: typed.decimal("fianza"),
                estado: typed.choice("estado"),
                external_id,
            }),
            EntityType::Payment => CanonicalRecord::Payment(PaymentRecord {
                contract_id: reference("contract")?,
                fecha: date("fecha")?,
                importe: amount("importe")?,
                metodo: typed.choice("metodo"),
                estado: typed.choice("estado"),
                concepto: typed.text("concepto"),
                external_id,
            }),
            EntityType::Provider => CanonicalRecord::Provider(ProviderRecord {
                nombre: text("nombre")?,
                cif: typed.text("cif"),
                email: typed.text("email"),
                telefono: typed.text("telefono"),
                categoria: typed.choice("categoria"),
                external_id,
            }),
            EntityType::Expense => CanonicalRecord::Expense(ExpenseRecord {
                building_id: reference("building")?,
                provider_id: refs.get("provider").cloned(),
                fecha: date("fecha")?,
                importe: amount("importe")?,
                categoria: typed.choice("categoria"),
                descripcion: typed.text("descripcion"),
                external_id,
            }),
        };
        Ok(record)
    }
}

/// 金额: 两位小数，中点远离零（不截断分位）
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

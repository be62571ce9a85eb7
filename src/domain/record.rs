// ==========================================
// 物业数据迁移引擎 - 规范记录 (CanonicalRecord)
// ==========================================
// 用途: 转换器输出、执行器写入的强类型记录
// 红线: 外键字段均为已解析的内部 ID，不保留原始引用文本
// ==========================================

use crate::domain::types::EntityType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub nombre: String,
    pub direccion: String,
    pub ciudad: Option<String>,
    pub codigo_postal: Option<String>,
    pub plantas: Option<i32>,
    pub ano_construccion: Option<i32>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub building_id: String,
    pub numero: String,
    pub planta: Option<String>,
    pub superficie: Option<Decimal>, // 平方米
    pub habitaciones: Option<i32>,
    pub banos: Option<i32>,
    pub renta: Option<Decimal>,
    pub amueblado: Option<bool>,
    pub estado: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub nombre: String,
    pub apellidos: Option<String>,
    pub documento: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub building_id: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub referencia: String,
    pub unit_id: String,
    pub tenant_id: String,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: Option<NaiveDate>,
    pub renta: Decimal,
    pub fianza: Option<Decimal>,
    pub estado: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub contract_id: String,
    pub fecha: NaiveDate,
    pub importe: Decimal,
    pub metodo: Option<String>,
    pub estado: Option<String>,
    pub concepto: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub nombre: String,
    pub cif: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub categoria: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub building_id: String,
    pub provider_id: Option<String>,
    pub fecha: NaiveDate,
    pub importe: Decimal,
    pub categoria: Option<String>,
    pub descripcion: Option<String>,
    pub external_id: Option<String>,
}

// ==========================================
// CanonicalRecord - 按实体类型打标签的记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Building(BuildingRecord),
    Unit(UnitRecord),
    Tenant(TenantRecord),
    Contract(ContractRecord),
    Payment(PaymentRecord),
    Provider(ProviderRecord),
    Expense(ExpenseRecord),
}

impl CanonicalRecord {
    pub fn entity_type(&self) -> EntityType {
        match self {
            CanonicalRecord::Building(_) => EntityType::Building,
            CanonicalRecord::Unit(_) => EntityType::Unit,
            CanonicalRecord::Tenant(_) => EntityType::Tenant,
            CanonicalRecord::Contract(_) => EntityType::Contract,
            CanonicalRecord::Payment(_) => EntityType::Payment,
            CanonicalRecord::Provider(_) => EntityType::Provider,
            CanonicalRecord::Expense(_) => EntityType::Expense,
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            CanonicalRecord::Building(r) => r.external_id.as_deref(),
            CanonicalRecord::Unit(r) => r.external_id.as_deref(),
            CanonicalRecord::Tenant(r) => r.external_id.as_deref(),
            CanonicalRecord::Contract(r) => r.external_id.as_deref(),
            CanonicalRecord::Payment(r) => r.external_id.as_deref(),
            CanonicalRecord::Provider(r) => r.external_id.as_deref(),
            CanonicalRecord::Expense(r) => r.external_id.as_deref(),
        }
    }

    /// 可读标签（日志与外键候选展示）
    pub fn label(&self) -> String {
        match self {
            CanonicalRecord::Building(r) => r.nombre.clone(),
            CanonicalRecord::Unit(r) => r.numero.clone(),
            CanonicalRecord::Tenant(r) => match &r.apellidos {
                Some(apellidos) => format!("{} {}", r.nombre, apellidos),
                None => r.nombre.clone(),
            },
            CanonicalRecord::Contract(r) => r.referencia.clone(),
            CanonicalRecord::Payment(r) => format!("{} {}", r.fecha, r.importe),
            CanonicalRecord::Provider(r) => r.nombre.clone(),
            CanonicalRecord::Expense(r) => format!("{} {}", r.fecha, r.importe),
        }
    }
}

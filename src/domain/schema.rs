// ==========================================
// 物业数据迁移引擎 - 规范实体结构 (EntitySchema)
// ==========================================
// 职责: 定义 7 类实体的标准字段（名称/类型/必填/枚举/外键目标）
// 说明: 字段声明顺序即问题排序顺序、模板列顺序
// ==========================================

use crate::domain::types::{EntityType, FieldType};
use serde::Serialize;

// ==========================================
// FieldSpec - 字段规格
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub enum_values: &'static [&'static str], // 首个值为缺省回退值
    pub enum_synonyms: &'static [(&'static str, &'static str)], // (同义词, 标准值)
    pub foreign_key_target: Option<EntityType>,
    pub non_negative: bool, // 负数视为 OutOfRangeValue
    pub monetary: bool,     // 金额字段：两位小数，四舍五入
    pub integer: bool,      // 只接受整数
    pub example: &'static str, // 模板示例值
}

impl FieldSpec {
    const fn base(name: &'static str, field_type: FieldType, required: bool, example: &'static str) -> Self {
        Self {
            name,
            field_type,
            required,
            enum_values: &[],
            enum_synonyms: &[],
            foreign_key_target: None,
            non_negative: false,
            monetary: false,
            integer: false,
            example,
        }
    }

    const fn text(name: &'static str, required: bool, example: &'static str) -> Self {
        Self::base(name, FieldType::String, required, example)
    }

    const fn number(name: &'static str, required: bool, example: &'static str) -> Self {
        Self {
            non_negative: true,
            ..Self::base(name, FieldType::Number, required, example)
        }
    }

    const fn integer(name: &'static str, required: bool, example: &'static str) -> Self {
        Self {
            non_negative: true,
            integer: true,
            ..Self::base(name, FieldType::Number, required, example)
        }
    }

    const fn money(name: &'static str, required: bool, example: &'static str) -> Self {
        Self {
            non_negative: true,
            monetary: true,
            ..Self::base(name, FieldType::Number, required, example)
        }
    }

    const fn date(name: &'static str, required: bool, example: &'static str) -> Self {
        Self::base(name, FieldType::Date, required, example)
    }

    const fn boolean(name: &'static str, required: bool, example: &'static str) -> Self {
        Self::base(name, FieldType::Boolean, required, example)
    }

    const fn choice(
        name: &'static str,
        required: bool,
        values: &'static [&'static str],
        synonyms: &'static [(&'static str, &'static str)],
        example: &'static str,
    ) -> Self {
        Self {
            enum_values: values,
            enum_synonyms: synonyms,
            ..Self::base(name, FieldType::Enum, required, example)
        }
    }

    const fn reference(name: &'static str, target: EntityType, required: bool, example: &'static str) -> Self {
        Self {
            foreign_key_target: Some(target),
            ..Self::base(name, FieldType::ForeignKey, required, example)
        }
    }

    /// 外部系统主键（可选，用于重复导入去重）
    const fn external_id() -> Self {
        Self::text(EXTERNAL_ID_FIELD, false, "EXT-0001")
    }

    /// 缺省枚举值（未知枚举回退目标）
    pub fn default_enum_value(&self) -> Option<&'static str> {
        self.enum_values.first().copied()
    }
}

/// 外部主键字段名（所有实体共用）
pub const EXTERNAL_ID_FIELD: &str = "external_id";

// ==========================================
// EntitySchema - 实体结构
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    pub fields: &'static [FieldSpec],
}

impl EntitySchema {
    /// 获取指定实体的标准结构
    pub fn for_entity(entity_type: EntityType) -> &'static EntitySchema {
        match entity_type {
            EntityType::Building => &BUILDING_SCHEMA,
            EntityType::Unit => &UNIT_SCHEMA,
            EntityType::Tenant => &TENANT_SCHEMA,
            EntityType::Contract => &CONTRACT_SCHEMA,
            EntityType::Payment => &PAYMENT_SCHEMA,
            EntityType::Provider => &PROVIDER_SCHEMA,
            EntityType::Expense => &EXPENSE_SCHEMA,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 字段声明序号（问题排序用）
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.foreign_key_target.is_some())
    }
}

// ==========================================
// 枚举词表
// ==========================================
const UNIT_STATUS: &[&str] = &["disponible", "ocupada", "reforma"];
const UNIT_STATUS_SYNONYMS: &[(&str, &str)] = &[
    ("libre", "disponible"),
    ("vacia", "disponible"),
    ("available", "disponible"),
    ("vacant", "disponible"),
    ("alquilada", "ocupada"),
    ("alquilado", "ocupada"),
    ("ocupado", "ocupada"),
    ("rented", "ocupada"),
    ("occupied", "ocupada"),
    ("en obras", "reforma"),
    ("renovation", "reforma"),
];

const CONTRACT_STATUS: &[&str] = &["activo", "pendiente", "finalizado"];
const CONTRACT_STATUS_SYNONYMS: &[(&str, &str)] = &[
    ("vigente", "activo"),
    ("active", "activo"),
    ("en curso", "activo"),
    ("pending", "pendiente"),
    ("borrador", "pendiente"),
    ("terminado", "finalizado"),
    ("rescindido", "finalizado"),
    ("ended", "finalizado"),
    ("terminated", "finalizado"),
];

const PAYMENT_METHODS: &[&str] = &["transferencia", "domiciliacion", "efectivo", "tarjeta", "bizum"];
const PAYMENT_METHOD_SYNONYMS: &[(&str, &str)] = &[
    ("transfer", "transferencia"),
    ("bank transfer", "transferencia"),
    ("recibo", "domiciliacion"),
    ("direct debit", "domiciliacion"),
    ("sepa", "domiciliacion"),
    ("cash", "efectivo"),
    ("metalico", "efectivo"),
    ("card", "tarjeta"),
    ("credit card", "tarjeta"),
];

const PAYMENT_STATUS: &[&str] = &["pagado", "pendiente", "devuelto"];
const PAYMENT_STATUS_SYNONYMS: &[(&str, &str)] = &[
    ("cobrado", "pagado"),
    ("paid", "pagado"),
    ("pending", "pendiente"),
    ("impagado", "pendiente"),
    ("returned", "devuelto"),
    ("rechazado", "devuelto"),
];

const PROVIDER_CATEGORIES: &[&str] = &[
    "otros",
    "fontaneria",
    "electricidad",
    "limpieza",
    "mantenimiento",
    "seguros",
    "jardineria",
];
const PROVIDER_CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("fontanero", "fontaneria"),
    ("plumbing", "fontaneria"),
    ("electricista", "electricidad"),
    ("electrical", "electricidad"),
    ("cleaning", "limpieza"),
    ("maintenance", "mantenimiento"),
    ("insurance", "seguros"),
    ("aseguradora", "seguros"),
    ("other", "otros"),
];

const EXPENSE_CATEGORIES: &[&str] = &[
    "otros",
    "comunidad",
    "suministros",
    "reparacion",
    "seguro",
    "impuestos",
];
const EXPENSE_CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("ibi", "impuestos"),
    ("tasas", "impuestos"),
    ("taxes", "impuestos"),
    ("cuota comunidad", "comunidad"),
    ("hoa", "comunidad"),
    ("luz", "suministros"),
    ("agua", "suministros"),
    ("gas", "suministros"),
    ("utilities", "suministros"),
    ("averia", "reparacion"),
    ("repair", "reparacion"),
    ("insurance", "seguro"),
    ("other", "otros"),
];

// ==========================================
// 实体结构定义
// ==========================================
pub static BUILDING_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Building,
    fields: &[
        FieldSpec::text("nombre", true, "Edificio Sol"),
        FieldSpec::text("direccion", true, "Calle Mayor 12"),
        FieldSpec::text("ciudad", false, "Madrid"),
        FieldSpec::text("codigo_postal", false, "28013"),
        FieldSpec::integer("plantas", false, "6"),
        FieldSpec::integer("ano_construccion", false, "1975"),
        FieldSpec::external_id(),
    ],
};

pub static UNIT_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Unit,
    fields: &[
        FieldSpec::reference("building", EntityType::Building, true, "Edificio Sol"),
        FieldSpec::text("numero", true, "3B"),
        FieldSpec::text("planta", false, "3"),
        FieldSpec::number("superficie", false, "85.5"),
        FieldSpec::integer("habitaciones", false, "2"),
        FieldSpec::integer("banos", false, "1"),
        FieldSpec::money("renta", false, "950.00"),
        FieldSpec::boolean("amueblado", false, "si"),
        FieldSpec::choice("estado", false, UNIT_STATUS, UNIT_STATUS_SYNONYMS, "disponible"),
        FieldSpec::external_id(),
    ],
};

pub static TENANT_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Tenant,
    fields: &[
        FieldSpec::text("nombre", true, "Ana"),
        FieldSpec::text("apellidos", false, "García López"),
        FieldSpec::text("documento", false, "12345678Z"),
        FieldSpec::text("email", false, "ana.garcia@example.com"),
        FieldSpec::text("telefono", false, "+34 600 000 000"),
        FieldSpec::reference("building", EntityType::Building, false, "Edificio Sol"),
        FieldSpec::external_id(),
    ],
};

pub static CONTRACT_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Contract,
    fields: &[
        FieldSpec::text("referencia", true, "CTR-2024-001"),
        FieldSpec::reference("unit", EntityType::Unit, true, "Edificio Sol 3B"),
        FieldSpec::reference("tenant", EntityType::Tenant, true, "Ana García López"),
        FieldSpec::date("fecha_inicio", true, "2024-01-15"),
        FieldSpec::date("fecha_fin", false, "2025-01-14"),
        FieldSpec::money("renta", true, "950.00"),
        FieldSpec::money("fianza", false, "1900.00"),
        FieldSpec::choice("estado", false, CONTRACT_STATUS, CONTRACT_STATUS_SYNONYMS, "activo"),
        FieldSpec::external_id(),
    ],
};

pub static PAYMENT_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Payment,
    fields: &[
        FieldSpec::reference("contract", EntityType::Contract, true, "CTR-2024-001"),
        FieldSpec::date("fecha", true, "2024-02-01"),
        // 退款可为负数
        FieldSpec {
            non_negative: false,
            ..FieldSpec::money("importe", true, "950.00")
        },
        FieldSpec::choice("metodo", false, PAYMENT_METHODS, PAYMENT_METHOD_SYNONYMS, "transferencia"),
        FieldSpec::choice("estado", false, PAYMENT_STATUS, PAYMENT_STATUS_SYNONYMS, "pagado"),
        FieldSpec::text("concepto", false, "Renta febrero 2024"),
        FieldSpec::external_id(),
    ],
};

pub static PROVIDER_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Provider,
    fields: &[
        FieldSpec::text("nombre", true, "Fontanería Rápida SL"),
        FieldSpec::text("cif", false, "B12345678"),
        FieldSpec::text("email", false, "contacto@fontaneriarapida.es"),
        FieldSpec::text("telefono", false, "+34 910 000 000"),
        FieldSpec::choice("categoria", false, PROVIDER_CATEGORIES, PROVIDER_CATEGORY_SYNONYMS, "fontaneria"),
        FieldSpec::external_id(),
    ],
};

pub static EXPENSE_SCHEMA: EntitySchema = EntitySchema {
    entity_type: EntityType::Expense,
    fields: &[
        FieldSpec::reference("building", EntityType::Building, true, "Edificio Sol"),
        FieldSpec::reference("provider", EntityType::Provider, false, "Fontanería Rápida SL"),
        FieldSpec::date("fecha", true, "2024-03-10"),
        FieldSpec::money("importe", true, "120.50"),
        FieldSpec::choice("categoria", false, EXPENSE_CATEGORIES, EXPENSE_CATEGORY_SYNONYMS, "reparacion"),
        FieldSpec::text("descripcion", false, "Reparación bajante"),
        FieldSpec::external_id(),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entity_has_schema_with_external_id() {
        for entity in EntityType::ALL {
            let schema = EntitySchema::for_entity(entity);
            assert_eq!(schema.entity_type, entity);
            assert!(schema.field(EXTERNAL_ID_FIELD).is_some(), "{entity} 缺少 external_id");
            assert!(schema.required_fields().count() > 0);
        }
    }

    #[test]
    fn test_unit_schema_fields() {
        let schema = EntitySchema::for_entity(EntityType::Unit);
        let building = schema.field("building").unwrap();
        assert_eq!(building.field_type, FieldType::ForeignKey);
        assert_eq!(building.foreign_key_target, Some(EntityType::Building));
        assert!(building.required);

        let superficie = schema.field("superficie").unwrap();
        assert!(superficie.non_negative);
        assert!(!superficie.required);
        assert_eq!(schema.field_position("numero"), Some(1));
    }

    #[test]
    fn test_enum_examples_are_declared_values() {
        for entity in EntityType::ALL {
            for field in EntitySchema::for_entity(entity).fields {
                if field.field_type == FieldType::Enum {
                    assert!(field.enum_values.contains(&field.example), "{}", field.name);
                    for (_, canonical) in field.enum_synonyms {
                        assert!(field.enum_values.contains(canonical), "{canonical}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_payment_amount_allows_refunds() {
        let importe = PAYMENT_SCHEMA.field("importe").unwrap();
        assert!(importe.monetary);
        assert!(!importe.non_negative);
    }
}

// ==========================================
// 物业数据迁移引擎 - 来源系统配置目录 (Source Profile Registry)
// ==========================================
// 职责: 各历史系统导出文件的表头词汇与区域格式约定
// 说明: 编译期静态定义，不可变；未知来源回退到 generic
// ==========================================

use serde::Serialize;

/// 来源系统导出约定
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceProfile {
    pub id: &'static str,
    pub display_name: &'static str,
    /// 标准字段 → 可接受的表头写法（匹配时大小写/重音不敏感）
    pub header_aliases: &'static [(&'static str, &'static [&'static str])],
    pub date_format: &'static str, // chrono 格式串
    pub decimal_separator: char,
    pub boolean_true_tokens: &'static [&'static str],
}

pub const GENERIC_PROFILE_ID: &str = "generic";

// ==========================================
// generic - 通用回退配置
// ==========================================
pub static GENERIC: SourceProfile = SourceProfile {
    id: GENERIC_PROFILE_ID,
    display_name: "Genérico (CSV)",
    header_aliases: &[
        ("building", &["edificio", "finca", "propiedad", "building", "property"]),
        ("nombre", &["name", "nombre completo"]),
        ("direccion", &["address", "domicilio", "calle"]),
        ("ciudad", &["city", "localidad", "poblacion", "municipio"]),
        ("codigo_postal", &["cp", "c p", "zip", "zip code", "postal code"]),
        ("plantas", &["numero de plantas", "floors"]),
        ("ano_construccion", &["año", "año construccion", "year built"]),
        ("numero", &["unidad", "puerta", "unit number", "num"]),
        ("planta", &["floor"]),
        ("superficie", &["m2", "metros", "area", "sqm", "superficie util"]),
        ("habitaciones", &["dormitorios", "bedrooms", "hab"]),
        ("banos", &["bathrooms", "aseos"]),
        ("renta", &["alquiler", "rent", "precio", "renta mensual"]),
        ("amueblado", &["furnished"]),
        ("estado", &["status", "situacion"]),
        ("apellidos", &["apellido", "surname", "last name"]),
        ("documento", &["dni", "nie", "pasaporte", "document", "id document"]),
        ("email", &["correo", "e mail", "mail"]),
        ("telefono", &["phone", "movil", "tel"]),
        ("referencia", &["ref", "reference", "contract reference"]),
        ("unit", &["vivienda", "unidad", "unit"]),
        ("tenant", &["inquilino", "arrendatario", "tenant"]),
        ("fecha_inicio", &["inicio", "fecha alta", "start date", "desde"]),
        ("fecha_fin", &["fin", "fecha baja", "end date", "hasta"]),
        ("fianza", &["deposito", "deposit"]),
        ("contract", &["contrato", "contract"]),
        ("fecha", &["date", "fecha pago", "fecha gasto"]),
        ("importe", &["amount", "cantidad", "total"]),
        ("metodo", &["metodo pago", "forma de pago", "payment method"]),
        ("concepto", &["concept", "detalle pago"]),
        ("cif", &["nif", "cif nif", "tax id", "vat"]),
        ("categoria", &["category", "tipo"]),
        ("provider", &["proveedor", "supplier", "vendor"]),
        ("descripcion", &["description", "detalle", "notas"]),
        ("external_id", &["id externo", "external id", "codigo", "code", "id"]),
    ],
    date_format: "%d/%m/%Y",
    decimal_separator: '.',
    boolean_true_tokens: &["si", "s", "yes", "y", "true", "1", "x"],
};

// ==========================================
// homming
// ==========================================
pub static HOMMING: SourceProfile = SourceProfile {
    id: "homming",
    display_name: "Homming",
    header_aliases: &[
        ("building", &["Inmueble", "Edificio"]),
        ("numero", &["Unidad", "Nombre unidad"]),
        ("superficie", &["Metros2", "M2"]),
        ("renta", &["Precio alquiler"]),
        ("habitaciones", &["Habitaciones"]),
        ("amueblado", &["Amueblado"]),
        ("tenant", &["Inquilino"]),
        ("unit", &["Unidad", "Inmueble"]),
        ("external_id", &["ID Homming", "Id"]),
    ],
    date_format: "%d/%m/%Y",
    decimal_separator: ',',
    boolean_true_tokens: &["si", "s", "1", "true"],
};

// ==========================================
// rentger
// ==========================================
pub static RENTGER: SourceProfile = SourceProfile {
    id: "rentger",
    display_name: "Rentger",
    header_aliases: &[
        ("building", &["Propiedad", "Edificio"]),
        ("numero", &["Unidad", "Habitación/Unidad"]),
        ("renta", &["Renta mensual"]),
        ("tenant", &["Inquilino"]),
        ("fecha_inicio", &["Fecha de inicio"]),
        ("fecha_fin", &["Fecha de fin"]),
        ("importe", &["Importe total"]),
        ("external_id", &["ID Rentger"]),
    ],
    date_format: "%d/%m/%Y",
    decimal_separator: ',',
    boolean_true_tokens: &["si", "s", "1", "true", "x"],
};

// ==========================================
// witei
// ==========================================
pub static WITEI: SourceProfile = SourceProfile {
    id: "witei",
    display_name: "Witei",
    header_aliases: &[
        ("building", &["Edificio/Promoción", "Promoción"]),
        ("numero", &["Referencia inmueble"]),
        ("superficie", &["Superficie (m²)"]),
        ("habitaciones", &["Nº habitaciones"]),
        ("banos", &["Nº baños"]),
        ("renta", &["Precio"]),
        ("external_id", &["ID Witei"]),
    ],
    date_format: "%d-%m-%Y",
    decimal_separator: ',',
    boolean_true_tokens: &["si", "1"],
};

// ==========================================
// buildium - 美式区域约定
// ==========================================
pub static BUILDIUM: SourceProfile = SourceProfile {
    id: "buildium",
    display_name: "Buildium",
    header_aliases: &[
        ("building", &["Property", "Property Name"]),
        ("numero", &["Unit", "Unit Number"]),
        ("superficie", &["Size"]),
        ("renta", &["Market Rent"]),
        ("nombre", &["First Name"]),
        ("apellidos", &["Last Name"]),
        ("telefono", &["Phone Number"]),
        ("referencia", &["Lease ID"]),
        ("fecha_inicio", &["Lease Start"]),
        ("fecha_fin", &["Lease End"]),
        ("fianza", &["Security Deposit"]),
        ("external_id", &["Buildium ID"]),
    ],
    date_format: "%m/%d/%Y",
    decimal_separator: '.',
    boolean_true_tokens: &["yes", "y", "true", "1", "x"],
};

static PROFILES: [&SourceProfile; 5] = [&GENERIC, &HOMMING, &RENTGER, &WITEI, &BUILDIUM];

/// 获取来源配置（总是成功，未知 ID 回退到 generic）
pub fn get_profile(source_system_id: &str) -> &'static SourceProfile {
    let wanted = source_system_id.trim();
    PROFILES
        .iter()
        .copied()
        .find(|p| p.id.eq_ignore_ascii_case(wanted))
        .unwrap_or(&GENERIC)
}

/// 全部已注册来源
pub fn all_profiles() -> &'static [&'static SourceProfile] {
    &PROFILES
}

/// 某字段在该来源下可接受的表头写法
///
/// 顺序: 来源自有别名在前，generic 别名在后（去重）
pub fn resolve_header_alias(profile: &SourceProfile, canonical_field: &str) -> Vec<&'static str> {
    let mut aliases: Vec<&'static str> = Vec::new();
    let own = lookup(profile, canonical_field);
    let fallback = if profile.id == GENERIC.id {
        &[][..]
    } else {
        lookup(&GENERIC, canonical_field)
    };

    for alias in own.iter().chain(fallback.iter()) {
        if !aliases.contains(alias) {
            aliases.push(*alias);
        }
    }
    aliases
}

fn lookup(profile: &SourceProfile, canonical_field: &str) -> &'static [&'static str] {
    profile
        .header_aliases
        .iter()
        .find(|(field, _)| *field == canonical_field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

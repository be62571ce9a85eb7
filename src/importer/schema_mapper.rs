// ==========================================
// 物业数据迁移引擎 - 表头映射器 (Schema Mapper)
// ==========================================
// 职责: 源文件表头 → 标准字段
// 流程: 精确匹配（标准名 + 来源别名）→ 模糊匹配（编辑距离 / 词重叠，阈值以上才接受）
// 红线: 同一输入必须得到同一映射；歧义直接拒收整个文件
// ==========================================

use crate::domain::import::{ForeignKeyOverrides, IgnoredColumn, MappedColumn, MappingSummary};
use crate::domain::schema::{EntitySchema, FieldSpec};
use crate::importer::data_cleaner::{normalize_text, token_overlap};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::source_profile::{resolve_header_alias, SourceProfile};
use strsim::normalized_levenshtein;
use tracing::debug;

/// 默认模糊匹配阈值
pub const DEFAULT_HEADER_MATCH_THRESHOLD: f64 = 0.85;

const SCORE_EPSILON: f64 = 1e-9;

/// 一列与标准字段的绑定
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub index: usize,
    pub header: String,
    pub field: &'static FieldSpec,
    pub confidence: f64,
    pub exact: bool,
}

// ==========================================
// HeaderMapping - 映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMapping {
    pub bindings: Vec<ColumnBinding>, // 按字段声明顺序
    pub unmapped_required: Vec<&'static str>,
    pub unmapped_optional: Vec<&'static str>,
    pub ignored: Vec<IgnoredColumn>, // 按列序
}

impl HeaderMapping {
    pub fn binding(&self, field_name: &str) -> Option<&ColumnBinding> {
        self.bindings.iter().find(|b| b.field.name == field_name)
    }

    pub fn column_for(&self, field_name: &str) -> Option<usize> {
        self.binding(field_name).map(|b| b.index)
    }

    /// 必填列缺失则拒收文件
    pub fn ensure_required(&self, schema: &EntitySchema) -> ImportResult<()> {
        if self.unmapped_required.is_empty() {
            return Ok(());
        }
        Err(ImportError::MissingRequiredColumn {
            entity: schema.entity_type.to_string(),
            fields: self.unmapped_required.iter().map(|f| f.to_string()).collect(),
        })
    }

    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            mapped: self
                .bindings
                .iter()
                .map(|b| MappedColumn {
                    index: b.index,
                    header: b.header.clone(),
                    field: b.field.name.to_string(),
                    confidence: b.confidence,
                    exact: b.exact,
                })
                .collect(),
            ignored: self.ignored.clone(),
            unmapped_optional: self.unmapped_optional.iter().map(|f| f.to_string()).collect(),
        }
    }
}

// ==========================================
// SchemaMapper
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct SchemaMapper {
    threshold: f64,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_MATCH_THRESHOLD)
    }
}

impl SchemaMapper {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// 表头映射
    ///
    /// # 错误
    /// - AmbiguousColumnMapping: 两列对同一字段得分相同
    ///
    /// 必填列缺失不在此报错，由调用方通过 ensure_required 决定
    pub fn map_headers(
        &self,
        headers: &[String],
        schema: &EntitySchema,
        profile: &SourceProfile,
        overrides: &ForeignKeyOverrides,
    ) -> ImportResult<HeaderMapping> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_text(h)).collect();
        let mut claimed = vec![false; headers.len()];
        let mut bound: Vec<Option<ColumnBinding>> = vec![None; schema.fields.len()];

        let accepted: Vec<Vec<String>> = schema
            .fields
            .iter()
            .map(|field| accepted_names(field, profile))
            .collect();

        // ===== 第一轮: 精确匹配 =====
        for (pos, field) in schema.fields.iter().enumerate() {
            let hits: Vec<usize> = (0..headers.len())
                .filter(|&i| !claimed[i] && !normalized[i].is_empty())
                .filter(|&i| accepted[pos].contains(&normalized[i]))
                .collect();

            if hits.len() > 1 {
                return Err(ambiguous(field, headers, &hits));
            }
            if let Some(&index) = hits.first() {
                claimed[index] = true;
                bound[pos] = Some(ColumnBinding {
                    index,
                    header: headers[index].clone(),
                    field,
                    confidence: 1.0,
                    exact: true,
                });
            }
        }

        // ===== 第二轮: 模糊匹配 =====
        for (pos, field) in schema.fields.iter().enumerate() {
            if bound[pos].is_some() {
                continue;
            }

            let mut best_score = 0.0_f64;
            let mut best: Vec<usize> = Vec::new();
            for i in 0..headers.len() {
                if claimed[i] || normalized[i].is_empty() {
                    continue;
                }
                let score = accepted[pos]
                    .iter()
                    .map(|name| similarity(&normalized[i], name))
                    .fold(0.0_f64, f64::max);
                if score < self.threshold {
                    continue;
                }
                if (score - best_score).abs() < SCORE_EPSILON {
                    best.push(i);
                } else if score > best_score {
                    best_score = score;
                    best = vec![i];
                }
            }

            if best.len() > 1 {
                return Err(ambiguous(field, headers, &best));
            }
            if let Some(&index) = best.first() {
                debug!(
                    field = field.name,
                    header = %headers[index],
                    confidence = best_score,
                    "表头模糊匹配"
                );
                claimed[index] = true;
                bound[pos] = Some(ColumnBinding {
                    index,
                    header: headers[index].clone(),
                    field,
                    confidence: best_score,
                    exact: false,
                });
            }
        }

        // ===== 汇总 =====
        let mut unmapped_required = Vec::new();
        let mut unmapped_optional = Vec::new();
        for (pos, field) in schema.fields.iter().enumerate() {
            if bound[pos].is_some() {
                continue;
            }
            let overridden = field
                .foreign_key_target
                .map(|target| overrides.contains(target))
                .unwrap_or(false);
            if field.required && !overridden {
                unmapped_required.push(field.name);
            } else {
                unmapped_optional.push(field.name);
            }
        }

        let ignored = (0..headers.len())
            .filter(|&i| !claimed[i])
            .map(|i| IgnoredColumn {
                index: i,
                header: headers[i].clone(),
            })
            .collect();

        Ok(HeaderMapping {
            bindings: bound.into_iter().flatten().collect(),
            unmapped_required,
            unmapped_optional,
            ignored,
        })
    }
}

/// 标准名 + 来源别名（均已标准化）
fn accepted_names(field: &FieldSpec, profile: &SourceProfile) -> Vec<String> {
    let mut names = vec![normalize_text(field.name)];
    for alias in resolve_header_alias(profile, field.name) {
        let alias = normalize_text(alias);
        if !names.contains(&alias) {
            names.push(alias);
        }
    }
    names
}

/// 表头相似度: max(归一化编辑距离, 词重叠)
fn similarity(header: &str, name: &str) -> f64 {
    normalized_levenshtein(header, name).max(token_overlap(header, name))
}

fn ambiguous(field: &FieldSpec, headers: &[String], columns: &[usize]) -> ImportError {
    ImportError::AmbiguousColumnMapping {
        field: field.name.to_string(),
        columns: columns.iter().map(|&i| headers[i].clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{TENANT_SCHEMA, UNIT_SCHEMA};
    use crate::domain::types::EntityType;
    use crate::importer::source_profile::get_profile;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_on_canonical_names() {
        let mapping = SchemaMapper::default()
            .map_headers(
                &headers(&["Building", "NUMERO", "superficie"]),
                &UNIT_SCHEMA,
                get_profile("generic"),
                &ForeignKeyOverrides::new(),
            )
            .unwrap();

        assert_eq!(mapping.column_for("building"), Some(0));
        assert_eq!(mapping.column_for("numero"), Some(1));
        assert_eq!(mapping.column_for("superficie"), Some(2));
        assert!(mapping.unmapped_required.is_empty());
        assert!(mapping.ignored.is_empty());
    }

    #[test]
    fn test_homming_aliases() {
        let mapping = SchemaMapper::default()
            .map_headers(
                &headers(&["Inmueble", "Unidad", "Metros2"]),
                &UNIT_SCHEMA,
                get_profile("homming"),
                &ForeignKeyOverrides::new(),
            )
            .unwrap();

        assert_eq!(mapping.column_for("building"), Some(0));
        assert_eq!(mapping.column_for("numero"), Some(1));
        assert_eq!(mapping.column_for("superficie"), Some(2));
    }

    #[test]
    fn test_fuzzy_match_and_ignored_columns() {
        let mapping = SchemaMapper::default()
            .map_headers(
                &headers(&["building", "numero", "superfice", "Observaciones"]),
                &UNIT_SCHEMA,
                get_profile("generic"),
                &ForeignKeyOverrides::new(),
            )
            .unwrap();

        let binding = mapping.binding("superficie").unwrap();
        assert!(!binding.exact);
        assert!(binding.confidence >= DEFAULT_HEADER_MATCH_THRESHOLD);
        assert_eq!(mapping.ignored.len(), 1);
        assert_eq!(mapping.ignored[0].header, "Observaciones");
    }

    #[test]
    fn test_two_exact_columns_are_ambiguous() {
        let err = SchemaMapper::default()
            .map_headers(
                &headers(&["building", "numero", "m2", "metros"]),
                &UNIT_SCHEMA,
                get_profile("generic"),
                &ForeignKeyOverrides::new(),
            )
            .unwrap_err();

        match err {
            ImportError::AmbiguousColumnMapping { field, columns } => {
                assert_eq!(field, "superficie");
                assert_eq!(columns, vec!["m2", "metros"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_column() {
        let mapping = SchemaMapper::default()
            .map_headers(
                &headers(&["numero"]),
                &UNIT_SCHEMA,
                get_profile("generic"),
                &ForeignKeyOverrides::new(),
            )
            .unwrap();
        assert_eq!(mapping.unmapped_required, vec!["building"]);
        assert!(matches!(
            mapping.ensure_required(&UNIT_SCHEMA),
            Err(ImportError::MissingRequiredColumn { .. })
        ));
    }

    #[test]
    fn test_override_relaxes_required_reference_column() {
        let overrides = ForeignKeyOverrides::new().with(EntityType::Building, "b-1");
        let mapping = SchemaMapper::default()
            .map_headers(&headers(&["numero"]), &UNIT_SCHEMA, get_profile("generic"), &overrides)
            .unwrap();
        assert!(mapping.ensure_required(&UNIT_SCHEMA).is_ok());
        assert!(mapping.unmapped_optional.contains(&"building"));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let input = headers(&["Nombre", "Apellidos", "Correo", "Teléfono", "Edificio", "Notas"]);
        let mapper = SchemaMapper::default();
        let a = mapper
            .map_headers(&input, &TENANT_SCHEMA, get_profile("generic"), &ForeignKeyOverrides::new())
            .unwrap();
        let b = mapper
            .map_headers(&input, &TENANT_SCHEMA, get_profile("generic"), &ForeignKeyOverrides::new())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.column_for("email"), Some(2));
        assert_eq!(a.column_for("telefono"), Some(3));
        assert_eq!(a.column_for("building"), Some(4));
    }
}

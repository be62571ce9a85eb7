// ==========================================
// 物业数据迁移引擎 - 导入引擎
// ==========================================
// 职责: 整合导入流程，对宿主应用暴露 validate / execute / template
// 流程: 解析 → 表头映射 → 逐行校验 → 外键解析（预演）→ 执行写入
// 红线: 文件级致命错误只从这里直接返回，从不进入执行阶段
// 红线: 行级问题只作为数据返回
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import::{ForeignKeyOverrides, ImportJob, ImportOutcome, PreviewRow, ValidationResult};
use crate::domain::schema::EntitySchema;
use crate::domain::types::{EntityType, JobStatus};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::executor::{ImportExecutor, PendingRow};
use crate::importer::file_parser::{CsvParser, ParsedFile};
use crate::importer::fk_resolver::ForeignKeyResolver;
use crate::importer::importer_trait::DataImporter;
use crate::importer::record_validator::{RecordValidator, RowReport};
use crate::importer::row_processor::{Prepared, RowProcessor};
use crate::importer::schema_mapper::SchemaMapper;
use crate::importer::source_profile::get_profile;
use crate::importer::template::generate_template;
use crate::importer::transformer::Transformer;
use crate::repository::entity_store::EntityStore;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 预演阶段的完整产物（validate 与 execute 共用）
struct ValidatedFile {
    job: ImportJob,
    rows: Vec<PendingRow>,
    processor: Arc<RowProcessor>,
    preview: Vec<PreviewRow>,
}

// ==========================================
// ImportEngine
// ==========================================
pub struct ImportEngine {
    store: Arc<dyn EntityStore>,
    settings: ImportSettings,
}

impl ImportEngine {
    pub fn new(store: Arc<dyn EntityStore>, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    pub fn with_defaults(store: Arc<dyn EntityStore>) -> Self {
        Self::new(store, ImportSettings::default())
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 预演（带外键人工指定）
    ///
    /// # 返回
    /// - Ok(ValidationResult): 文件级通过；行级问题在 errors / warnings 中
    /// - Err: 文件级致命错误，或目标库读取失败
    #[instrument(skip(self, file, overrides), fields(job_id))]
    pub async fn validate_with_overrides(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        overrides: &ForeignKeyOverrides,
    ) -> ImportResult<ValidationResult> {
        let validated = self.prepare(file, entity_type, source_system, overrides).await?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut importable_records = 0;
        for pending in &validated.rows {
            if !pending.report.has_error() {
                importable_records += 1;
            }
            for issue in &pending.report.issues {
                if issue.is_error() {
                    errors.push(issue.clone());
                } else {
                    warnings.push(issue.clone());
                }
            }
        }

        let result = ValidationResult {
            valid: errors.is_empty(),
            total_records: validated.rows.len(),
            importable_records,
            errors,
            warnings,
            preview: validated.preview,
            mapping: validated.processor.mapping().summary(),
        };

        info!(
            job_id = %validated.job.id,
            total_records = result.total_records,
            importable_records = result.importable_records,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "预演完成"
        );
        Ok(result)
    }

    /// 执行导入（可取消）
    ///
    /// # 说明
    /// - 内部重新走一遍预演，作业按 Created → Validated → Importing 推进
    /// - 取消后返回 Ok，状态为 Failed，未派发的行记为 NotAttempted
    #[instrument(skip(self, file, overrides, cancel), fields(job_id))]
    pub async fn execute_with_cancel(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        overrides: Option<&ForeignKeyOverrides>,
        cancel: CancellationToken,
    ) -> ImportResult<ImportOutcome> {
        let overrides = overrides.cloned().unwrap_or_default();
        let ValidatedFile {
            mut job,
            rows,
            processor,
            ..
        } = self.prepare(file, entity_type, source_system, &overrides).await?;

        let settings_json =
            serde_json::to_string(&self.settings).map_err(|e| ImportError::InternalError(e.to_string()))?;
        let executor = ImportExecutor::new(
            self.settings.max_concurrent_writers,
            self.settings.row_write_timeout(),
            self.settings.run_timeout(),
        )
        .with_settings_snapshot(settings_json);
        executor
            .run(&mut job, rows, processor, Arc::clone(&self.store), cancel)
            .await
    }

    /// 生成导入模板
    pub fn template_for(entity_type: &str) -> ImportResult<String> {
        let entity = parse_entity_type(entity_type)?;
        generate_template(EntitySchema::for_entity(entity))
    }

    // ==========================================
    // 预演主流程
    // ==========================================
    async fn prepare(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        overrides: &ForeignKeyOverrides,
    ) -> ImportResult<ValidatedFile> {
        // === 步骤 1: 实体类型与文件解析 ===
        let entity = parse_entity_type(entity_type)?;
        let parsed = CsvParser::parse_bytes(file).map_err(|e| {
            warn!(error = %e, "文件无法读取");
            e
        })?;

        let profile = get_profile(source_system);
        let schema = EntitySchema::for_entity(entity);
        let mut job = ImportJob::new(entity, profile.id, parsed.checksum.clone());
        tracing::Span::current().record("job_id", job.id.as_str());
        info!(
            job_id = %job.id,
            entity_type = %entity,
            source_profile = profile.id,
            total_rows = parsed.rows.len(),
            "文件解析完成"
        );

        // === 步骤 2: 表头映射 ===
        let mapping = SchemaMapper::new(self.settings.header_match_threshold)
            .map_headers(&parsed.headers, schema, profile, overrides)
            .and_then(|mapping| mapping.ensure_required(schema).map(|_| mapping));
        let mapping = match mapping {
            Ok(mapping) => mapping,
            Err(e) => return Err(fail_job(&mut job, e)),
        };
        debug!(
            mapped = mapping.bindings.len(),
            ignored = mapping.ignored.len(),
            "表头映射完成"
        );

        // === 步骤 3: 逐行校验（并行，按行序合并）===
        let cleaner = DataCleaner::new(profile);
        let mut reports = RecordValidator::new(schema, &mapping, cleaner, overrides).validate_rows(&parsed.rows);

        // === 步骤 4: 外键解析与转换预演 ===
        let resolver = Arc::new(ForeignKeyResolver::new(
            Arc::clone(&self.store),
            self.settings.fk_fuzzy_threshold,
        ));
        let processor = Arc::new(RowProcessor::new(
            Transformer::new(schema, cleaner),
            mapping,
            resolver,
            overrides.clone(),
        ));

        let preview = match self.dry_run(&parsed, &mut reports, &processor).await {
            Ok(preview) => preview,
            Err(e) => return Err(fail_job(&mut job, e)),
        };

        for report in &mut reports {
            report
                .issues
                .sort_by_key(|issue| schema.field_position(&issue.field).unwrap_or(schema.fields.len()));
        }

        job.transition(JobStatus::Validated)?;
        job.file_level_valid = true;

        let rows = parsed
            .rows
            .into_iter()
            .zip(reports)
            .map(|(raw, report)| PendingRow { raw, report })
            .collect();

        Ok(ValidatedFile {
            job,
            rows,
            processor,
            preview,
        })
    }

    /// 对无 Error 的行做转换 + 外键解析，不写库
    ///
    /// 外键问题并入对应行的报告；返回前 N 条可导入记录作为预览
    async fn dry_run(
        &self,
        parsed: &ParsedFile,
        reports: &mut [RowReport],
        processor: &Arc<RowProcessor>,
    ) -> ImportResult<Vec<PreviewRow>> {
        let candidates: Vec<usize> = reports
            .iter()
            .enumerate()
            .filter(|(_, report)| !report.has_error())
            .map(|(idx, _)| idx)
            .collect();

        let pending: Vec<_> = candidates
            .iter()
            .map(|&idx| processor.prepare(&parsed.rows[idx]))
            .collect();
        let results: Vec<ImportResult<Prepared>> = stream::iter(pending)
            .buffered(self.settings.max_concurrent_writers.max(1))
            .collect()
            .await;

        let mut preview = Vec::new();
        for (&idx, result) in candidates.iter().zip(results) {
            match result? {
                Prepared::Ready(record) => {
                    if preview.len() < self.settings.preview_rows {
                        preview.push(PreviewRow {
                            row: parsed.rows[idx].row_number,
                            record,
                        });
                    }
                }
                Prepared::Rejected(issues) => reports[idx].issues.extend(issues),
            }
        }
        Ok(preview)
    }
}

fn parse_entity_type(entity_type: &str) -> ImportResult<EntityType> {
    entity_type
        .parse::<EntityType>()
        .map_err(ImportError::UnsupportedEntityType)
}

/// 文件级失败: 作业转入 Failed 后返回原错误
fn fail_job(job: &mut ImportJob, err: ImportError) -> ImportError {
    warn!(job_id = %job.id, error = %err, "文件级校验失败");
    match job.transition(JobStatus::Failed) {
        Ok(()) => err,
        Err(transition) => ImportError::from(transition),
    }
}

// ==========================================
// 实现 DataImporter Trait
// ==========================================
#[async_trait]
impl DataImporter for ImportEngine {
    async fn validate(&self, file: &[u8], entity_type: &str, source_system: &str) -> ImportResult<ValidationResult> {
        self.validate_with_overrides(file, entity_type, source_system, &ForeignKeyOverrides::new())
            .await
    }

    async fn execute(
        &self,
        file: &[u8],
        entity_type: &str,
        source_system: &str,
        fk_override: Option<&ForeignKeyOverrides>,
    ) -> ImportResult<ImportOutcome> {
        self.execute_with_cancel(file, entity_type, source_system, fk_override, CancellationToken::new())
            .await
    }

    fn template(&self, entity_type: &str) -> ImportResult<String> {
        Self::template_for(entity_type)
    }
}

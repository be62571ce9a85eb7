// ==========================================
// 物业数据迁移引擎 - 导入执行器 (Import Executor)
// ==========================================
// 状态: Validated → Importing → {Completed, Failed}
// 并发: 信号量限流的有界写入池；每行独立超时
// 红线: 单行失败不得中断循环；结果严格按原始行序汇总
// 红线: 取消只停止派发，已派发的写入照常完成，不回滚
// ==========================================

use crate::domain::import::{FailureKind, ImportAudit, ImportJob, ImportOutcome, RowError, ValidationIssue};
use crate::domain::types::{IssueKind, JobStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use crate::importer::record_validator::RowReport;
use crate::importer::row_processor::{Prepared, RowProcessor};
use crate::repository::entity_store::{CreateOutcome, EntityStore, WriteContext};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 默认并发写入数
pub const DEFAULT_MAX_WORKERS: usize = 4;
/// 默认单行写入超时
pub const DEFAULT_ROW_TIMEOUT: Duration = Duration::from_secs(5);
/// 默认整次运行超时
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(600);

/// 待执行的一行（原始值 + 预演期校验结论）
#[derive(Debug, Clone)]
pub struct PendingRow {
    pub raw: RawRow,
    pub report: RowReport,
}

// ==========================================
// 单行执行结果
// ==========================================
#[derive(Debug)]
struct RowResult {
    imported_id: Option<String>,
    errors: Vec<RowError>,
    warnings: Vec<ValidationIssue>,
}

impl RowResult {
    fn success(id: String, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            imported_id: Some(id),
            errors: Vec::new(),
            warnings,
        }
    }

    fn failure(errors: Vec<RowError>) -> Self {
        Self {
            imported_id: None,
            errors,
            warnings: Vec::new(),
        }
    }

    fn rejected(issues: &[ValidationIssue]) -> Self {
        Self::failure(
            issues
                .iter()
                .filter(|i| i.is_error())
                .map(RowError::from_issue)
                .collect(),
        )
    }
}

enum Slot {
    Done(RowResult),
    Pending(usize, JoinHandle<RowResult>),
    NotAttempted(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    RunTimeout,
}

impl StopReason {
    fn describe(&self) -> &'static str {
        match self {
            StopReason::Cancelled => "导入已被取消",
            StopReason::RunTimeout => "超过整次运行时限",
        }
    }
}

// ==========================================
// ImportExecutor
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportExecutor {
    max_workers: usize,
    row_timeout: Duration,
    run_timeout: Duration,
    settings_json: Option<String>,
}

impl Default for ImportExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS, DEFAULT_ROW_TIMEOUT, DEFAULT_RUN_TIMEOUT)
    }
}

impl ImportExecutor {
    pub fn new(max_workers: usize, row_timeout: Duration, run_timeout: Duration) -> Self {
        Self {
            max_workers: max_workers.max(1),
            row_timeout,
            run_timeout,
            settings_json: None,
        }
    }

    /// 附带本次生效的参数快照，随审计记录落库
    pub fn with_settings_snapshot(mut self, settings_json: String) -> Self {
        self.settings_json = Some(settings_json);
        self
    }

    /// 执行导入
    ///
    /// # 参数
    /// - job: 必须处于 Validated 且 file_level_valid = true
    /// - rows: 按原始行序排列
    ///
    /// # 返回
    /// - Ok(outcome): 全部行已尝试（Completed），或被取消（Failed，含部分结果）
    /// - Err(StoreUnavailable / RunTimeout): 携带已提交部分的结果
    pub async fn run(
        &self,
        job: &mut ImportJob,
        rows: Vec<PendingRow>,
        processor: Arc<RowProcessor>,
        store: Arc<dyn EntityStore>,
        cancel: CancellationToken,
    ) -> ImportResult<ImportOutcome> {
        let started = Instant::now();
        job.begin_import()?;
        info!(
            job_id = %job.id,
            entity_type = %job.entity_type,
            total_rows = rows.len(),
            max_workers = self.max_workers,
            "开始执行导入"
        );

        // ===== 目标库连通性 =====
        if let Err(e) = store.ping().await {
            error!(job_id = %job.id, error = %e, "目标库不可用，导入未开始");
            let slots = rows
                .iter()
                .map(|r| Slot::NotAttempted(r.raw.row_number))
                .collect();
            let message = e.to_string();
            let outcome = self
                .finish(job, slots, Some(message.clone()), &store, started)
                .await?;
            return Err(ImportError::StoreUnavailable {
                message,
                partial: Box::new(outcome),
            });
        }

        // ===== 按行序派发 =====
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let deadline = tokio::time::Instant::now() + self.run_timeout;
        let mut slots = Vec::with_capacity(rows.len());
        let mut stop: Option<StopReason> = None;

        for row in rows {
            let row_number = row.raw.row_number;
            if row.report.has_error() {
                slots.push(Slot::Done(RowResult::rejected(&row.report.issues)));
                continue;
            }
            if stop.is_some() {
                slots.push(Slot::NotAttempted(row_number));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stop = Some(StopReason::Cancelled);
                    None
                }
                _ = tokio::time::sleep_until(deadline) => {
                    stop = Some(StopReason::RunTimeout);
                    None
                }
                permit = Arc::clone(&semaphore).acquire_owned() => Some(
                    permit.map_err(|e| ImportError::InternalError(e.to_string()))?,
                ),
            };
            let Some(permit) = permit else {
                warn!(job_id = %job.id, row = row_number, "停止派发新行");
                slots.push(Slot::NotAttempted(row_number));
                continue;
            };

            let ctx = WriteContext {
                job_id: job.id.clone(),
                row: row_number,
                source_system: job.source_profile_id.clone(),
            };
            let processor = Arc::clone(&processor);
            let store = Arc::clone(&store);
            let row_timeout = self.row_timeout;
            let handle = tokio::spawn(async move {
                let result = write_row(&processor, store.as_ref(), row, &ctx, row_timeout).await;
                drop(permit);
                result
            });
            slots.push(Slot::Pending(row_number, handle));
        }

        let reason = stop.map(|s| s.describe().to_string());
        let outcome = self.finish(job, slots, reason, &store, started).await?;

        match stop {
            Some(StopReason::RunTimeout) => Err(ImportError::RunTimeout {
                elapsed_ms: outcome.elapsed_ms,
                partial: Box::new(outcome),
            }),
            _ => Ok(outcome),
        }
    }

    /// 按行序收集结果，推进作业终态并写审计
    async fn finish(
        &self,
        job: &mut ImportJob,
        slots: Vec<Slot>,
        aborted_reason: Option<String>,
        store: &Arc<dyn EntityStore>,
        started: Instant,
    ) -> ImportResult<ImportOutcome> {
        let not_attempted_message = aborted_reason
            .clone()
            .unwrap_or_else(|| "未尝试写入".to_string());

        let mut outcome = ImportOutcome::empty(&job.id, JobStatus::Importing);
        for slot in slots {
            let result = match slot {
                Slot::Done(result) => result,
                Slot::Pending(row, handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(job_id = %job.id, row = row, error = %e, "写入任务异常终止");
                        RowResult::failure(vec![RowError::new(
                            row,
                            FailureKind::WriteRejected,
                            format!("写入任务异常终止: {}", e),
                        )])
                    }
                },
                Slot::NotAttempted(row) => RowResult::failure(vec![RowError::new(
                    row,
                    FailureKind::NotAttempted,
                    not_attempted_message.clone(),
                )]),
            };

            outcome.total_rows += 1;
            match result.imported_id {
                Some(id) => {
                    outcome.successful_imports += 1;
                    outcome.imported_ids.push(id);
                }
                None => outcome.failed_imports += 1,
            }
            outcome.errors.extend(result.errors);
            outcome.warnings.extend(result.warnings);
        }

        let status = if aborted_reason.is_none() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        job.transition(status)?;
        outcome.status = status;
        outcome.aborted_reason = aborted_reason;
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            job_id = %job.id,
            status = %status,
            total_rows = outcome.total_rows,
            successful_imports = outcome.successful_imports,
            failed_imports = outcome.failed_imports,
            elapsed_ms = outcome.elapsed_ms,
            "导入执行结束"
        );

        // 审计写入失败不影响结果
        let audit = ImportAudit {
            settings_json: self.settings_json.clone(),
            ..ImportAudit::from_run(job, &outcome)
        };
        if let Err(e) = store.record_job(&audit).await {
            warn!(job_id = %job.id, error = %e, "导入审计写入失败");
        }

        Ok(outcome)
    }
}

enum Attempt {
    Stored(CreateOutcome),
    Rejected(Vec<ValidationIssue>),
}

/// 单行: 转换 + 外键解析 + 单次原子写入，整体受行超时约束
async fn write_row(
    processor: &RowProcessor,
    store: &dyn EntityStore,
    row: PendingRow,
    ctx: &WriteContext,
    row_timeout: Duration,
) -> RowResult {
    let row_number = row.raw.row_number;
    let attempt = async {
        Ok::<_, ImportError>(match processor.prepare(&row.raw).await? {
            Prepared::Ready(record) => Attempt::Stored(store.create(&record, ctx).await?),
            Prepared::Rejected(issues) => Attempt::Rejected(issues),
        })
    };

    let mut warnings = row.report.issues;
    match tokio::time::timeout(row_timeout, attempt).await {
        Err(_) => {
            warn!(job_id = %ctx.job_id, row = row_number, "单行写入超时");
            RowResult::failure(vec![RowError::new(
                row_number,
                FailureKind::WriteTimedOut,
                format!("写入超时 ({} ms)", row_timeout.as_millis()),
            )])
        }
        Ok(Err(e)) => {
            warn!(job_id = %ctx.job_id, row = row_number, error = %e, "单行写入失败");
            RowResult::failure(vec![RowError::new(row_number, FailureKind::WriteRejected, e.to_string())])
        }
        Ok(Ok(Attempt::Rejected(issues))) => RowResult::rejected(&issues),
        Ok(Ok(Attempt::Stored(CreateOutcome::Created(id)))) => {
            debug!(job_id = %ctx.job_id, row = row_number, id = %id, "写入成功");
            RowResult::success(id, warnings)
        }
        Ok(Ok(Attempt::Stored(CreateOutcome::AlreadyImported(id)))) => {
            warnings.push(ValidationIssue::new(
                row_number,
                "external_id",
                IssueKind::ExistingRecordSkipped,
                format!("该行已在先前的导入中写入 (id={})，未重复创建", id),
                None,
            ));
            RowResult::success(id, warnings)
        }
    }
}

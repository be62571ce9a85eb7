// ==========================================
// 物业数据迁移引擎 - 导入执行器测试
// ==========================================
// 使用故障注入的目标库，覆盖:
// - 单行失败隔离 / 单行超时 / 并发上限 / 结果行序
// - 协作式取消 / 目标库不可用 / 整次运行超时
// ==========================================


use async_trait::async_trait;
use property_migration::config::ImportSettings;
use property_migration::domain::import::{FailureKind, ImportAudit};
use property_migration::domain::record::CanonicalRecord;
use property_migration::domain::types::{EntityType, JobStatus};
use property_migration::importer::{DataImporter, ImportEngine, ImportError};
use property_migration::repository::{
    CreateOutcome, EntityStore, ReferenceCandidate, RepositoryError, RepositoryResult, WriteContext,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::csv;
use tokio_util::sync::CancellationToken;

// ==========================================
// FlakyStore - 故障注入目标库
// ==========================================
#[derive(Default)]
struct FlakyStore {
    unreachable: bool,
    rejected_rows: HashSet<usize>,
    slow_rows: HashSet<usize>,
    delay_per_row: Option<fn(usize) -> Duration>,
    cancel_on_first_write: Option<CancellationToken>,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    audits: Mutex<Vec<ImportAudit>>,
}

impl FlakyStore {
    fn last_audit(&self) -> ImportAudit {
        self.audits.lock().unwrap().last().cloned().expect("no audit recorded")
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn ping(&self) -> RepositoryResult<()> {
        if self.unreachable {
            return Err(RepositoryError::DatabaseConnectionError("connection refused".to_string()));
        }
        Ok(())
    }

    async fn create(&self, _record: &CanonicalRecord, ctx: &WriteContext) -> RepositoryResult<CreateOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(token) = &self.cancel_on_first_write {
            token.cancel();
        }

        let delay = if self.slow_rows.contains(&ctx.row) {
            Duration::from_millis(500)
        } else {
            self.delay_per_row.map(|f| f(ctx.row)).unwrap_or(Duration::from_millis(5))
        };
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.rejected_rows.contains(&ctx.row) {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "UNIQUE constraint failed at row {}",
                ctx.row
            )));
        }
        Ok(CreateOutcome::Created(format!("id-{}", ctx.row)))
    }

    async fn reference_candidates(&self, _entity_type: EntityType) -> RepositoryResult<Vec<ReferenceCandidate>> {
        Ok(Vec::new())
    }

    async fn record_job(&self, audit: &ImportAudit) -> RepositoryResult<()> {
        self.audits.lock().unwrap().push(audit.clone());
        Ok(())
    }
}

fn providers(count: usize) -> Vec<u8> {
    let mut lines = vec!["nombre".to_string()];
    lines.extend((1..=count).map(|n| format!("Proveedor {n}")));
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    csv(&refs)
}

fn engine(store: Arc<FlakyStore>, max_workers: usize, row_timeout_ms: u64, run_timeout_ms: u64) -> ImportEngine {
    let settings = ImportSettings {
        max_concurrent_writers: max_workers,
        row_write_timeout_ms: row_timeout_ms,
        run_timeout_ms,
        ..ImportSettings::default()
    };
    let engine = ImportEngine::new(store, settings);
    assert_eq!(engine.settings().max_concurrent_writers, max_workers);
    engine
}

// ==========================================
// 部分失败
// ==========================================

#[tokio::test]
async fn test_failed_writes_are_isolated() {
    let store = Arc::new(FlakyStore {
        rejected_rows: HashSet::from([2, 4]),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 3, 1_000, 60_000);

    let outcome = engine.execute(&providers(6), "provider", "generic", None).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.successful_imports, 4);
    assert_eq!(outcome.failed_imports, 2);
    assert_eq!(outcome.imported_ids, vec!["id-1", "id-3", "id-5", "id-6"]);
    let failed: Vec<(usize, FailureKind)> = outcome.errors.iter().map(|e| (e.row, e.kind)).collect();
    assert_eq!(
        failed,
        vec![(2, FailureKind::WriteRejected), (4, FailureKind::WriteRejected)]
    );
    assert_eq!(store.last_audit().status, JobStatus::Completed);
    assert_eq!(store.last_audit().failed_imports, 2);

    // 审计记录附带本次生效的参数
    let settings: ImportSettings =
        serde_json::from_str(store.last_audit().settings_json.as_deref().unwrap()).unwrap();
    assert_eq!(settings.max_concurrent_writers, 3);
    assert_eq!(settings.row_write_timeout_ms, 1_000);
}

#[tokio::test]
async fn test_row_timeout_is_recorded_not_retried() {
    let store = Arc::new(FlakyStore {
        slow_rows: HashSet::from([3]),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 4, 50, 60_000);

    let outcome = engine.execute(&providers(5), "provider", "generic", None).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.successful_imports, 4);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row, 3);
    assert_eq!(outcome.errors[0].kind, FailureKind::WriteTimedOut);
    assert_eq!(store.writes.load(Ordering::SeqCst), 5);
}

// ==========================================
// 并发与行序
// ==========================================

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let store = Arc::new(FlakyStore {
        delay_per_row: Some(|_: usize| Duration::from_millis(20)),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 3, 1_000, 60_000);

    let outcome = engine.execute(&providers(12), "provider", "generic", None).await.unwrap();

    assert_eq!(outcome.successful_imports, 12);
    assert!(store.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_outcome_follows_file_order_not_completion_order() {
    // 行号越小越慢
    let store = Arc::new(FlakyStore {
        delay_per_row: Some(|row: usize| Duration::from_millis(60 - 10 * row as u64)),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 5, 1_000, 60_000);

    let outcome = engine.execute(&providers(5), "provider", "generic", None).await.unwrap();

    assert_eq!(outcome.imported_ids, vec!["id-1", "id-2", "id-3", "id-4", "id-5"]);
}

// ==========================================
// 取消与基础设施失败
// ==========================================

#[tokio::test]
async fn test_cancel_before_start_attempts_nothing() {
    let store = Arc::new(FlakyStore::default());
    let engine = engine(Arc::clone(&store), 2, 1_000, 60_000);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = engine
        .execute_with_cancel(&providers(3), "provider", "generic", None, cancel)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.successful_imports, 0);
    assert_eq!(outcome.failed_imports, 3);
    assert!(outcome.errors.iter().all(|e| e.kind == FailureKind::NotAttempted));
    assert!(outcome.aborted_reason.is_some());
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.last_audit().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_cancel_lets_in_flight_write_finish() {
    let cancel = CancellationToken::new();
    let store = Arc::new(FlakyStore {
        cancel_on_first_write: Some(cancel.clone()),
        delay_per_row: Some(|_: usize| Duration::from_millis(20)),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 1, 1_000, 60_000);

    let outcome = engine
        .execute_with_cancel(&providers(4), "provider", "generic", None, cancel)
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.imported_ids, vec!["id-1"]);
    assert_eq!(outcome.failed_imports, 3);
    assert!(outcome.is_balanced());
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_store_fails_the_run() {
    let store = Arc::new(FlakyStore {
        unreachable: true,
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 2, 1_000, 60_000);

    let err = engine
        .execute(&providers(3), "provider", "generic", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::StoreUnavailable { .. }));
    let partial = err.partial_outcome().unwrap();
    assert_eq!(partial.status, JobStatus::Failed);
    assert_eq!(partial.total_rows, 3);
    assert_eq!(partial.failed_imports, 3);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_timeout_keeps_committed_rows() {
    let store = Arc::new(FlakyStore {
        delay_per_row: Some(|_: usize| Duration::from_millis(30)),
        ..FlakyStore::default()
    });
    let engine = engine(Arc::clone(&store), 1, 1_000, 70);

    let err = engine
        .execute(&providers(10), "provider", "generic", None)
        .await
        .unwrap_err();

    let partial = match &err {
        ImportError::RunTimeout { partial, .. } => partial,
        other => panic!("unexpected error: {other:?}"),
    };
    assert_eq!(partial.status, JobStatus::Failed);
    assert!(partial.is_balanced());
    assert!(partial.successful_imports >= 1);
    assert!(partial.successful_imports < 10);
    assert_eq!(partial.successful_imports, store.writes.load(Ordering::SeqCst));
    assert!(partial
        .errors
        .iter()
        .all(|e| e.kind == FailureKind::NotAttempted));
}

// ==========================================
// 物业数据迁移引擎 - ImportEngine 集成测试
// ==========================================
// 覆盖: 预演 / 执行 / 模板回灌 / 文件级拒收 / 外键歧义 / 重复导入
// ==========================================


use chrono::Datelike;
use property_migration::domain::import::FailureKind;
use property_migration::domain::record::CanonicalRecord;
use property_migration::domain::types::{EntityType, IssueKind, JobStatus};
use property_migration::importer::{DataImporter, ImportEngine, ImportError};
use property_migration::logging;
use property_migration::repository::SqliteEntityStore;
use property_migration::ForeignKeyOverrides;
use rust_decimal::Decimal;
use std::sync::Arc;
use test_helpers::{create_test_db, csv, seed_default_buildings};
use tokio_util::sync::CancellationToken;

fn engine_for(store: &SqliteEntityStore) -> ImportEngine {
    logging::init_test();
    ImportEngine::with_defaults(Arc::new(store.clone()))
}

// ==========================================
// 场景测试
// ==========================================

#[tokio::test]
async fn test_unparseable_area_is_a_row_error() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["building,numero,superficie", "Edificio Sol,3B,--"]);
    let result = engine.validate(&file, "unit", "generic").await.unwrap();

    assert!(!result.valid);
    assert_eq!(result.total_records, 1);
    assert_eq!(result.importable_records, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 1);
    assert_eq!(result.errors[0].field, "superficie");
    assert_eq!(result.errors[0].kind, IssueKind::TypeCoercionFailed);
    assert!(result.preview.is_empty());
}

#[tokio::test]
async fn test_ambiguous_building_fails_only_that_row() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&[
        "nombre,apellidos,building",
        "Ana,García López,Edificio Sol",
        "Luis,Pérez,Torre Norte",
    ]);

    let result = engine.validate(&file, "tenant", "generic").await.unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 2);
    assert_eq!(result.errors[0].field, "building");
    assert_eq!(result.errors[0].kind, IssueKind::AmbiguousForeignKey);
    assert!(result.errors[0].message.contains("Torre Norte A"));
    assert_eq!(result.importable_records, 1);

    let outcome = engine.execute(&file, "tenant", "generic", None).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.total_rows, 2);
    assert_eq!(outcome.successful_imports, 1);
    assert_eq!(outcome.failed_imports, 1);
    assert_eq!(outcome.errors[0].row, 2);
    assert_eq!(outcome.errors[0].kind, FailureKind::Issue(IssueKind::AmbiguousForeignKey));
    assert_eq!(store.count_entities(EntityType::Tenant).unwrap(), 1);
}

#[tokio::test]
async fn test_homming_headers_map_without_renaming() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    let ids = seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["Inmueble,Unidad,Metros2,Renta", "Edificio Sol,3B,\"85,5\",\"1.250,555\""]);
    let result = engine.validate(&file, "unit", "homming").await.unwrap();

    assert!(result.valid, "{:?}", result.errors);
    let mapped: Vec<(&str, &str)> = result
        .mapping
        .mapped
        .iter()
        .map(|m| (m.header.as_str(), m.field.as_str()))
        .collect();
    assert!(mapped.contains(&("Inmueble", "building")));
    assert!(mapped.contains(&("Metros2", "superficie")));

    match &result.preview[0].record {
        CanonicalRecord::Unit(unit) => {
            assert_eq!(unit.building_id, ids[0]);
            assert_eq!(unit.superficie, Some(Decimal::new(855, 1)));
            // 金额两位小数，四舍五入
            assert_eq!(unit.renta, Some(Decimal::new(125056, 2)));
        }
        other => panic!("unexpected record: {other:?}"),
    }
}

// ==========================================
// 性质测试
// ==========================================

#[tokio::test]
async fn test_validate_is_idempotent() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&[
        "building,numero,superficie,estado,Observaciones",
        "Edificio Sol,1A,70,libre,",
        "Edificio Sol,1B,x,raro,ojo",
        "Torre Norte,2A,80,,",
        "Torre Nrte A,2B,80,ocupada,",
    ]);

    let first = engine.validate(&file, "unit", "generic").await.unwrap();
    let second = engine.validate(&file, "unit", "generic").await.unwrap();
    assert_eq!(first, second);

    // 行升序，同行内按字段声明顺序，被忽略列最后
    let order: Vec<(usize, String)> = first
        .errors
        .iter()
        .chain(first.warnings.iter())
        .map(|i| (i.row, i.field.clone()))
        .collect();
    assert!(order.contains(&(2, "superficie".to_string())));
    let row2: Vec<&str> = first
        .warnings
        .iter()
        .filter(|i| i.row == 2)
        .map(|i| i.field.as_str())
        .collect();
    assert_eq!(row2, vec!["estado", "Observaciones"]);
    assert!(first.errors.windows(2).all(|w| w[0].row <= w[1].row));
}

/// 预演与执行可以放到独立任务中运行（宿主常用 tokio::spawn 调度）
#[tokio::test]
async fn test_engine_futures_run_on_spawned_tasks() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = Arc::new(engine_for(&store));
    let file = csv(&["building,numero,superficie", "Edificio Sol,1A,70", "Torre Nrte A,2B,80"]);

    let validate = tokio::spawn({
        let engine = Arc::clone(&engine);
        let file = file.clone();
        async move {
            engine
                .validate_with_overrides(&file, "unit", "generic", &ForeignKeyOverrides::new())
                .await
        }
    });
    let result = validate.await.unwrap().unwrap();
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.preview.len(), 2);

    let execute = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .execute_with_cancel(&file, "unit", "generic", None, CancellationToken::new())
                .await
        }
    });
    let outcome = execute.await.unwrap().unwrap();
    assert_eq!(outcome.successful_imports, 2);
}

#[tokio::test]
async fn test_headers_only_file() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    let engine = engine_for(&store);
    let file = csv(&["building,numero,superficie"]);

    let result = engine.validate(&file, "unit", "generic").await.unwrap();
    assert!(result.valid);
    assert_eq!(result.total_records, 0);

    let outcome = engine.execute(&file, "unit", "generic", None).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.successful_imports, 0);
    assert_eq!(outcome.failed_imports, 0);
    assert!(outcome.is_balanced());
}

#[tokio::test]
async fn test_all_valid_rows_are_imported_in_order() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let mut lines = vec!["building,numero,superficie,renta".to_string()];
    for n in 1..=12 {
        lines.push(format!("Edificio Sol,{n}A,{},{}.50", 50 + n, 700 + n));
    }
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let file = csv(&refs);

    let outcome = engine.execute(&file, "unit", "generic", None).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.successful_imports, 12);
    assert_eq!(outcome.failed_imports, 0);
    assert_eq!(outcome.imported_ids.len(), 12);
    assert!(outcome.errors.is_empty());
    assert_eq!(store.count_entities(EntityType::Unit).unwrap(), 12);
    assert_eq!(store.job_status(&outcome.job_id).unwrap().as_deref(), Some("COMPLETED"));
}

#[tokio::test]
async fn test_single_bad_row_does_not_block_others() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&[
        "building,numero,superficie",
        "Edificio Sol,1A,70",
        "Edificio Sol,1B,71",
        "Edificio Sol,1C,-10",
        "Edificio Sol,1D,73",
        "Edificio Sol,1E,74",
    ]);

    let outcome = engine.execute(&file, "unit", "generic", None).await.unwrap();
    assert_eq!(outcome.successful_imports, 4);
    assert_eq!(outcome.failed_imports, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row, 3);
    assert_eq!(outcome.errors[0].kind, FailureKind::Issue(IssueKind::OutOfRangeValue));
}

#[tokio::test]
async fn test_write_time_constraint_violation_is_row_failure() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    // 同楼同号违反唯一约束，只影响第二行
    let file = csv(&["building,numero", "Edificio Sol,1A", "Edificio Sol,1A", "Edificio Sol,1B"]);
    let outcome = engine.execute(&file, "unit", "generic", None).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.successful_imports, 2);
    assert_eq!(outcome.failed_imports, 1);
    assert_eq!(outcome.errors[0].kind, FailureKind::WriteRejected);
    assert!(outcome.is_balanced());
}

#[tokio::test]
async fn test_warning_rows_are_written_with_warnings_kept() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["building,numero,estado", "Edificio Sol,1A,desconocido"]);
    let result = engine.validate(&file, "unit", "generic").await.unwrap();
    assert!(result.valid);
    match &result.preview[0].record {
        CanonicalRecord::Unit(unit) => assert_eq!(unit.estado.as_deref(), Some("disponible")),
        other => panic!("unexpected record: {other:?}"),
    }

    let outcome = engine.execute(&file, "unit", "generic", None).await.unwrap();
    assert_eq!(outcome.successful_imports, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, IssueKind::UnknownEnumValueDefaulted);
}

#[tokio::test]
async fn test_far_future_date_is_imported_with_warning() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let max_year = chrono::Utc::now().year() + 50;
    let boundary = format!("Edificio Sol,{max_year}-06-30,100.00");
    let beyond = format!("Edificio Sol,{}-06-30,200.00", max_year + 1);
    let file = csv(&["building,fecha,importe", &boundary, &beyond]);

    let result = engine.validate(&file, "expense", "generic").await.unwrap();
    assert!(result.valid);
    assert_eq!(result.importable_records, 2);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].row, 2);
    assert_eq!(result.warnings[0].kind, IssueKind::DateOutOfExpectedRange);

    let outcome = engine.execute(&file, "expense", "generic", None).await.unwrap();
    assert_eq!(outcome.successful_imports, 2);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].row, 2);
    assert_eq!(store.count_entities(EntityType::Expense).unwrap(), 2);
}

#[tokio::test]
async fn test_rerun_with_external_ids_does_not_duplicate() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["building,numero,external_id", "Edificio Sol,1A,U-1", "Edificio Sol,1B,U-2"]);
    let first = engine.execute(&file, "unit", "generic", None).await.unwrap();
    let second = engine.execute(&file, "unit", "generic", None).await.unwrap();

    assert_eq!(first.successful_imports, 2);
    assert_eq!(second.successful_imports, 2);
    assert_eq!(first.imported_ids, second.imported_ids);
    assert_eq!(
        second
            .warnings
            .iter()
            .filter(|w| w.kind == IssueKind::ExistingRecordSkipped)
            .count(),
        2
    );
    assert_eq!(store.count_entities(EntityType::Unit).unwrap(), 2);
}

// ==========================================
// 外键人工指定
// ==========================================

#[tokio::test]
async fn test_override_supplies_missing_building_column() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    let ids = seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["numero,superficie", "1A,70", "1B,72"]);
    let overrides = ForeignKeyOverrides::new().with(EntityType::Building, ids[1].clone());

    let outcome = engine
        .execute(&file, "unit", "generic", Some(&overrides))
        .await
        .unwrap();
    assert_eq!(outcome.successful_imports, 2);

    let units = engine
        .validate_with_overrides(&file, "unit", "generic", &overrides)
        .await
        .unwrap();
    match &units.preview[0].record {
        CanonicalRecord::Unit(unit) => assert_eq!(unit.building_id, ids[1]),
        other => panic!("unexpected record: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_override_is_unresolved() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    seed_default_buildings(&store).await;
    let engine = engine_for(&store);

    let file = csv(&["numero", "1A"]);
    let overrides = ForeignKeyOverrides::new().with(EntityType::Building, "no-such-building");
    let result = engine
        .validate_with_overrides(&file, "unit", "generic", &overrides)
        .await
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, IssueKind::UnresolvedForeignKey);
    assert_eq!(result.errors[0].raw_value.as_deref(), Some("no-such-building"));
}

// ==========================================
// 文件级拒收
// ==========================================

#[tokio::test]
async fn test_file_level_fatal_errors() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    let engine = engine_for(&store);

    let missing = csv(&["numero,superficie", "1A,70"]);
    assert!(matches!(
        engine.validate(&missing, "unit", "generic").await,
        Err(ImportError::MissingRequiredColumn { .. })
    ));

    let ambiguous = csv(&["building,numero,m2,metros", "Edificio Sol,1A,70,70"]);
    assert!(matches!(
        engine.validate(&ambiguous, "unit", "generic").await,
        Err(ImportError::AmbiguousColumnMapping { .. })
    ));

    assert!(matches!(
        engine.validate(&missing, "parking", "generic").await,
        Err(ImportError::UnsupportedEntityType(_))
    ));

    assert!(matches!(
        engine.validate(&[0xff, 0xfe, 0x00], "unit", "generic").await,
        Err(ImportError::UnreadableFile(_))
    ));

    // 执行同样在任何行写入之前拒收
    let err = engine.execute(&missing, "unit", "generic", None).await.unwrap_err();
    assert!(err.is_file_level());
    assert_eq!(store.count_entities(EntityType::Unit).unwrap(), 0);
}

// ==========================================
// 模板回灌
// ==========================================

#[tokio::test]
async fn test_templates_validate_cleanly_in_dependency_order() {
    let (_tmp, _path, store) = create_test_db().unwrap();
    let engine = engine_for(&store);

    for entity in [
        "building", "unit", "tenant", "contract", "payment", "provider", "expense",
    ] {
        let template = engine.template(entity).unwrap();
        // 支出引用供应商，先导入供应商
        if entity == "expense" {
            assert_eq!(store.count_entities(EntityType::Provider).unwrap(), 1);
        }

        let result = engine.validate(template.as_bytes(), entity, "generic").await.unwrap();
        assert!(result.valid, "{entity}: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "{entity}: {:?}", result.warnings);
        assert_eq!(result.total_records, 1);

        let outcome = engine
            .execute(template.as_bytes(), entity, "generic", None)
            .await
            .unwrap();
        assert_eq!(outcome.successful_imports, 1, "{entity}: {:?}", outcome.errors);
    }
}

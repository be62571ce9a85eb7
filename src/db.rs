// ==========================================
// 物业数据迁移引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供目标实体库与审计表的建表脚本（幂等）
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前建表脚本对应的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// 约束:
/// - unit(building_id, numero) 唯一：同楼宇下房号不可重复
/// - contract(referencia) 唯一
/// - import_external_key(entity_type, source_system, external_id) 唯一：重复导入去重
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS building (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            direccion TEXT NOT NULL,
            ciudad TEXT,
            codigo_postal TEXT,
            plantas INTEGER,
            ano_construccion INTEGER,
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS unit (
            id TEXT PRIMARY KEY,
            building_id TEXT NOT NULL REFERENCES building(id),
            numero TEXT NOT NULL,
            planta TEXT,
            superficie TEXT,
            habitaciones INTEGER,
            banos INTEGER,
            renta TEXT,
            amueblado INTEGER,
            estado TEXT,
            import_job_id TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (building_id, numero)
        );

        CREATE TABLE IF NOT EXISTS tenant (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            apellidos TEXT,
            documento TEXT,
            email TEXT,
            telefono TEXT,
            building_id TEXT REFERENCES building(id),
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contract (
            id TEXT PRIMARY KEY,
            referencia TEXT NOT NULL UNIQUE,
            unit_id TEXT NOT NULL REFERENCES unit(id),
            tenant_id TEXT NOT NULL REFERENCES tenant(id),
            fecha_inicio TEXT NOT NULL,
            fecha_fin TEXT,
            renta TEXT NOT NULL,
            fianza TEXT,
            estado TEXT,
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payment (
            id TEXT PRIMARY KEY,
            contract_id TEXT NOT NULL REFERENCES contract(id),
            fecha TEXT NOT NULL,
            importe TEXT NOT NULL,
            metodo TEXT,
            estado TEXT,
            concepto TEXT,
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS provider (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            cif TEXT,
            email TEXT,
            telefono TEXT,
            categoria TEXT,
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expense (
            id TEXT PRIMARY KEY,
            building_id TEXT NOT NULL REFERENCES building(id),
            provider_id TEXT REFERENCES provider(id),
            fecha TEXT NOT NULL,
            importe TEXT NOT NULL,
            categoria TEXT,
            descripcion TEXT,
            import_job_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_external_key (
            entity_type TEXT NOT NULL,
            source_system TEXT NOT NULL,
            external_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            import_job_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (entity_type, source_system, external_id)
        );

        CREATE TABLE IF NOT EXISTS import_job (
            job_id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            source_profile_id TEXT NOT NULL,
            file_checksum TEXT NOT NULL,
            status TEXT NOT NULL,
            total_rows INTEGER NOT NULL,
            successful_imports INTEGER NOT NULL,
            failed_imports INTEGER NOT NULL,
            settings_json TEXT,
            created_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

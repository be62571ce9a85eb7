// ==========================================
// 物业数据迁移引擎 - 目标实体库 SQLite 实现
// ==========================================
// 职责: 单行事务写入 / external_id 去重 / 外键候选查询 / 导入审计
// 说明: rusqlite 为同步 API，统一放入 spawn_blocking 执行，
//       使执行器的单行超时能够生效
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::import::ImportAudit;
use crate::domain::record::CanonicalRecord;
use crate::domain::types::EntityType;
use crate::repository::entity_store::{CreateOutcome, EntityStore, ReferenceCandidate, WriteContext};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

fn fmt_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ==========================================
// SqliteEntityStore
// ==========================================
#[derive(Clone)]
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntityStore {
    /// 打开数据库并确保表结构存在
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> RepositoryResult<Self> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池中持锁执行
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(format!("阻塞任务异常: {}", e)))?
    }

    /// 统计某类实体的行数
    pub fn count_entities(&self, entity_type: EntityType) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let sql = format!("SELECT COUNT(*) FROM {}", entity_type.as_str());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 查询审计表中的作业状态
    pub fn job_status(&self, job_id: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let status = conn
            .query_row(
                "SELECT status FROM import_job WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    fn find_external_key(
        tx: &Transaction,
        entity_type: EntityType,
        source_system: &str,
        external_id: &str,
    ) -> RepositoryResult<Option<String>> {
        let id = tx
            .query_row(
                "SELECT entity_id FROM import_external_key
                 WHERE entity_type = ?1 AND source_system = ?2 AND external_id = ?3",
                params![entity_type.as_str(), source_system, external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// 在事务中插入一条规范记录
    fn insert_record_tx(tx: &Transaction, id: &str, record: &CanonicalRecord, job_id: &str) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        match record {
            CanonicalRecord::Building(r) => {
                tx.execute(
                    "INSERT INTO building (id, nombre, direccion, ciudad, codigo_postal, plantas,
                        ano_construccion, import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        r.nombre,
                        r.direccion,
                        r.ciudad,
                        r.codigo_postal,
                        r.plantas,
                        r.ano_construccion,
                        job_id,
                        now
                    ],
                )?;
            }
            CanonicalRecord::Unit(r) => {
                tx.execute(
                    "INSERT INTO unit (id, building_id, numero, planta, superficie, habitaciones, banos,
                        renta, amueblado, estado, import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        id,
                        r.building_id,
                        r.numero,
                        r.planta,
                        r.superficie.map(|d| d.to_string()),
                        r.habitaciones,
                        r.banos,
                        r.renta.map(|d| d.to_string()),
                        r.amueblado,
                        r.estado,
                        job_id,
                        now
                    ],
                )?;
            }
            CanonicalRecord::Tenant(r) => {
                tx.execute(
                    "INSERT INTO tenant (id, nombre, apellidos, documento, email, telefono, building_id,
                        import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        r.nombre,
                        r.apellidos,
                        r.documento,
                        r.email,
                        r.telefono,
                        r.building_id,
                        job_id,
                        now
                    ],
                )?;
            }
            CanonicalRecord::Contract(r) => {
                tx.execute(
                    "INSERT INTO contract (id, referencia, unit_id, tenant_id, fecha_inicio, fecha_fin,
                        renta, fianza, estado, import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        id,
                        r.referencia,
                        r.unit_id,
                        r.tenant_id,
                        fmt_date(&r.fecha_inicio),
                        r.fecha_fin.as_ref().map(fmt_date),
                        r.renta.to_string(),
                        r.fianza.map(|d| d.to_string()),
                        r.estado,
                        job_id,
                        now
                    ],
                )?;
            }
            CanonicalRecord::Payment(r) => {
                tx.execute(
                    "INSERT INTO payment (id, contract_id, fecha, importe, metodo, estado, concepto,
                        import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        r.contract_id,
                        fmt_date(&r.fecha),
                        r.importe.to_string(),
                        r.metodo,
                        r.estado,
                        r.concepto,
                        job_id,
                        now
                    ],
                )?;
            }
            CanonicalRecord::Provider(r) => {
                tx.execute(
                    "INSERT INTO provider (id, nombre, cif, email, telefono, categoria, import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![id, r.nombre, r.cif, r.email, r.telefono, r.categoria, job_id, now],
                )?;
            }
            CanonicalRecord::Expense(r) => {
                tx.execute(
                    "INSERT INTO expense (id, building_id, provider_id, fecha, importe, categoria,
                        descripcion, import_job_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        r.building_id,
                        r.provider_id,
                        fmt_date(&r.fecha),
                        r.importe.to_string(),
                        r.categoria,
                        r.descripcion,
                        job_id,
                        now
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn create_sync(conn: &Connection, record: &CanonicalRecord, ctx: &WriteContext) -> RepositoryResult<CreateOutcome> {
        let entity_type = record.entity_type();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if let Some(external_id) = record.external_id() {
            if let Some(existing) = Self::find_external_key(&tx, entity_type, &ctx.source_system, external_id)? {
                debug!(entity = %entity_type, external_id, existing = %existing, "external_id 已导入，跳过");
                return Ok(CreateOutcome::AlreadyImported(existing));
            }
        }

        let id = Uuid::new_v4().to_string();
        Self::insert_record_tx(&tx, &id, record, &ctx.job_id)?;

        if let Some(external_id) = record.external_id() {
            tx.execute(
                "INSERT INTO import_external_key (entity_type, source_system, external_id, entity_id,
                    import_job_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entity_type.as_str(),
                    ctx.source_system,
                    external_id,
                    id,
                    ctx.job_id,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(CreateOutcome::Created(id))
    }

    fn candidates_sync(conn: &Connection, entity_type: EntityType) -> RepositoryResult<Vec<ReferenceCandidate>> {
        let sql = match entity_type {
            EntityType::Building => "SELECT id, nombre, direccion FROM building ORDER BY created_at, id",
            EntityType::Unit => {
                "SELECT u.id, b.nombre || ' ' || u.numero, NULL
                 FROM unit u JOIN building b ON b.id = u.building_id
                 ORDER BY u.created_at, u.id"
            }
            EntityType::Tenant => {
                "SELECT id, nombre || COALESCE(' ' || apellidos, ''), NULL FROM tenant ORDER BY created_at, id"
            }
            EntityType::Contract => "SELECT id, referencia, NULL FROM contract ORDER BY created_at, id",
            EntityType::Provider => "SELECT id, nombre, NULL FROM provider ORDER BY created_at, id",
            // 收款与支出不会被其他实体引用
            EntityType::Payment | EntityType::Expense => return Ok(Vec::new()),
        };

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(ReferenceCandidate {
                id: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
            })
        })?;

        let mut candidates = Vec::new();
        for candidate in rows {
            candidates.push(candidate?);
        }
        Ok(candidates)
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn ping(&self) -> RepositoryResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn create(&self, record: &CanonicalRecord, ctx: &WriteContext) -> RepositoryResult<CreateOutcome> {
        let record = record.clone();
        let ctx = ctx.clone();
        self.with_conn(move |conn| Self::create_sync(conn, &record, &ctx)).await
    }

    async fn reference_candidates(&self, entity_type: EntityType) -> RepositoryResult<Vec<ReferenceCandidate>> {
        self.with_conn(move |conn| Self::candidates_sync(conn, entity_type)).await
    }

    async fn record_job(&self, audit: &ImportAudit) -> RepositoryResult<()> {
        let audit = audit.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO import_job (job_id, entity_type, source_profile_id, file_checksum,
                    status, total_rows, successful_imports, failed_imports, settings_json,
                    created_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    audit.job_id,
                    audit.entity_type.as_str(),
                    audit.source_profile_id,
                    audit.file_checksum,
                    audit.status.to_string(),
                    audit.total_rows as i64,
                    audit.successful_imports as i64,
                    audit.failed_imports as i64,
                    audit.settings_json,
                    audit.created_at.to_rfc3339(),
                    audit.finished_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }
}

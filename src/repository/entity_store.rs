// ==========================================
// 物业数据迁移引擎 - 目标实体库 Trait
// ==========================================
// 职责: 定义导入执行器与外键解析器依赖的数据访问接口
// 红线: 仓储不含业务规则，只做写入/查询
// ==========================================

use crate::domain::import::ImportAudit;
use crate::domain::record::CanonicalRecord;
use crate::domain::types::EntityType;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// ReferenceCandidate - 外键候选
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub id: String,
    pub name: String,
    pub address: Option<String>, // 仅楼宇有地址
}

impl ReferenceCandidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.map(str::to_string),
        }
    }
}

/// 单行写入上下文
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub job_id: String,
    pub row: usize,
    pub source_system: String, // 来源配置 ID，参与 external_id 去重
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    AlreadyImported(String), // 同来源同 external_id 已导入过，返回既有 ID
}

impl CreateOutcome {
    pub fn id(&self) -> &str {
        match self {
            CreateOutcome::Created(id) | CreateOutcome::AlreadyImported(id) => id,
        }
    }
}

// ==========================================
// EntityStore Trait
// ==========================================
// 实现者: SqliteEntityStore（rusqlite）；测试中可替换为故障注入实现
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 连通性检查（执行前调用，失败则整次导入不开始）
    async fn ping(&self) -> RepositoryResult<()>;

    /// 写入一条规范记录（单行事务）
    ///
    /// # 返回
    /// - Created(id): 新建
    /// - AlreadyImported(id): external_id 命中，未重复写入
    async fn create(&self, record: &CanonicalRecord, ctx: &WriteContext) -> RepositoryResult<CreateOutcome>;

    /// 列出可被引用的既有实体（外键解析候选）
    async fn reference_candidates(&self, entity_type: EntityType) -> RepositoryResult<Vec<ReferenceCandidate>>;

    /// 记录导入审计
    async fn record_job(&self, audit: &ImportAudit) -> RepositoryResult<()>;
}

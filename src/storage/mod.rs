//! 存储模块
//!
//! 定义检测周期和读取接口依赖的存储契约，并提供内存与SQLite两种实现

pub mod memory;
pub mod sqlite;

use crate::alert::{Alert, AlertFilter, AlertId};
use crate::config::types::{StorageBackend, StorageConfig};
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::StorageResult;
use crate::health::result::{HealthCheckRecord, RecordId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// 存储trait
///
/// 实现必须允许并发写入
#[async_trait]
pub trait Storage: Send + Sync {
    /// 列出所有端点，按创建时间升序
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>>;

    /// 按ID获取端点
    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>>;

    /// 新增端点
    async fn insert_endpoint(&self, endpoint: &Endpoint) -> StorageResult<EndpointId>;

    /// 更新端点的最后检测时间，端点不存在时返回 NotFound
    async fn update_endpoint_last_checked(
        &self,
        id: EndpointId,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// 写入一条检测记录
    async fn insert_health_check(&self, record: &HealthCheckRecord) -> StorageResult<RecordId>;

    /// 列出端点自 `since` 起（含）的检测记录，按时间升序
    async fn list_health_checks(
        &self,
        endpoint_id: EndpointId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HealthCheckRecord>>;

    /// 写入一条告警
    async fn insert_alert(&self, alert: &Alert) -> StorageResult<AlertId>;

    /// 修改告警的解决状态，告警不存在时返回 NotFound
    async fn update_alert_resolved(&self, id: AlertId, resolved: bool) -> StorageResult<()>;

    /// 列出告警，按创建时间降序
    async fn list_alerts(&self, filter: AlertFilter) -> StorageResult<Vec<Alert>>;
}

/// 根据配置创建存储实例
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("使用内存存储，进程退出后数据不保留");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            tracing::info!(database_url = %config.database_url, "使用SQLite存储");
            let store = SqliteStore::connect(&config.database_url).await?;
            Ok(Arc::new(store))
        }
    }
}

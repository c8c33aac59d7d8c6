//! 检测周期调度模块
//!
//! 一次检测周期：读取端点、选出到期端点、受限并发探测、分类、写入记录、
//! 更新最后检测时间并评估告警。运行器本身不持有定时器，由外部触发

use crate::alert::{AlertEvaluator, AlertFilter, AlertId};
use crate::config::Config;
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::{MonitorError, Result};
use crate::health::checker::Prober;
use crate::health::due::select_due;
use crate::health::result::{HealthCheckRecord, HealthStatus, RecordId};
use crate::stats::uptime_percent;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

/// 单个端点在本轮中的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// 端点ID
    pub endpoint_id: EndpointId,
    /// 健康状态
    pub status: HealthStatus,
    /// 响应时间（毫秒）
    pub latency_ms: u64,
    /// HTTP状态码，未收到响应时为 0
    pub status_code: u16,
    /// 写入的记录ID
    pub record_id: Option<RecordId>,
    /// 记录是否写入成功
    pub persisted: bool,
    /// 最后检测时间是否更新成功
    pub timestamp_updated: bool,
    /// 本次产生的告警
    pub alert_id: Option<AlertId>,
    /// 错误信息
    pub error: Option<String>,
}

impl CheckResult {
    fn from_record(record: &HealthCheckRecord) -> Self {
        Self {
            endpoint_id: record.endpoint_id,
            status: record.status,
            latency_ms: record.latency_ms,
            status_code: record.status_code,
            record_id: None,
            persisted: false,
            timestamp_updated: false,
            alert_id: None,
            error: record.error_message.clone(),
        }
    }

    /// 任务在探测边界之外异常结束
    fn task_failed(endpoint_id: EndpointId, message: String) -> Self {
        Self {
            endpoint_id,
            status: HealthStatus::Unknown,
            latency_ms: 0,
            status_code: 0,
            record_id: None,
            persisted: false,
            timestamp_updated: false,
            alert_id: None,
            error: Some(message),
        }
    }

    fn append_error(&mut self, message: String) {
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{}; {}", existing, message),
            None => message,
        });
    }
}

/// 检测周期报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// 本轮使用的时间点
    pub started_at: DateTime<Utc>,
    /// 检测的端点数量
    pub checked_count: usize,
    /// 未能写入记录的端点数量
    pub failed_count: usize,
    /// 各端点结果
    pub results: Vec<CheckResult>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, results: Vec<CheckResult>) -> Self {
        let failed_count = results.iter().filter(|r| !r.persisted).count();
        Self {
            started_at,
            checked_count: results.len(),
            failed_count,
            results,
        }
    }

    /// 按状态统计结果数量
    pub fn count_by_status(&self, status: HealthStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// 告警评估设置
#[derive(Debug, Clone, Copy)]
struct AlertSettings {
    evaluator: AlertEvaluator,
    uptime_window: chrono::Duration,
}

/// 单个探测任务共享的上下文
#[derive(Clone)]
struct CheckContext {
    storage: Arc<dyn Storage>,
    prober: Arc<dyn Prober>,
    semaphore: Arc<Semaphore>,
    probe_timeout: Duration,
    alerting: Option<AlertSettings>,
}

/// 检测周期运行器
pub struct CycleRunner {
    /// 任务上下文
    context: CheckContext,
    /// 最大并发探测数
    max_concurrent: usize,
    /// 周期互斥锁，同一时间只允许一个周期
    cycle_lock: Mutex<()>,
}

impl CycleRunner {
    /// 创建新的检测周期运行器
    ///
    /// # 参数
    /// * `storage` - 存储实现
    /// * `prober` - 探测器实现
    /// * `max_concurrent` - 最大并发探测数，至少为 1
    /// * `probe_timeout` - 单次探测超时
    pub fn new(
        storage: Arc<dyn Storage>,
        prober: Arc<dyn Prober>,
        max_concurrent: usize,
        probe_timeout: Duration,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            context: CheckContext {
                storage,
                prober,
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                probe_timeout,
                alerting: None,
            },
            max_concurrent,
            cycle_lock: Mutex::new(()),
        }
    }

    /// 根据配置创建运行器
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>, prober: Arc<dyn Prober>) -> Self {
        let runner = Self::new(
            storage,
            prober,
            config.global.max_concurrent_checks,
            config.global.request_timeout(),
        );

        if config.alerts.enabled {
            runner.with_alerts(
                AlertEvaluator::new(config.alerts.thresholds(), config.alerts.dedup),
                config.alerts.uptime_window(),
            )
        } else {
            runner
        }
    }

    /// 启用告警评估
    ///
    /// # 参数
    /// * `evaluator` - 告警评估器
    /// * `uptime_window` - 可用率统计窗口
    pub fn with_alerts(mut self, evaluator: AlertEvaluator, uptime_window: chrono::Duration) -> Self {
        self.context.alerting = Some(AlertSettings {
            evaluator,
            uptime_window,
        });
        self
    }

    /// 最大并发探测数
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// 是否有周期正在运行
    pub fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    /// 运行一次检测周期
    ///
    /// 已有周期在运行时立即返回 `CycleInProgress`，不排队。
    /// 读取端点失败时返回错误，单个端点的失败只体现在报告中
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| MonitorError::CycleInProgress)?;

        let endpoints = self.context.storage.list_endpoints().await?;
        let due = select_due(&endpoints, now);

        info!(
            total = endpoints.len(),
            due = due.len(),
            max_concurrent = self.max_concurrent,
            "开始检测周期"
        );

        let (endpoint_ids, handles): (Vec<_>, Vec<_>) = due
            .into_iter()
            .map(|endpoint| {
                let context = self.context.clone();
                let endpoint_id = endpoint.id;
                let handle = tokio::spawn(async move { context.check_endpoint(endpoint, now).await });
                (endpoint_id, handle)
            })
            .unzip();

        let joined = futures::future::join_all(handles).await;

        let results: Vec<CheckResult> = endpoint_ids
            .into_iter()
            .zip(joined)
            .map(|(endpoint_id, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(endpoint_id = %endpoint_id, error = %e, "检测任务异常结束");
                    CheckResult::task_failed(endpoint_id, format!("检测任务异常结束: {}", e))
                }
            })
            .collect();

        let report = CycleReport::new(now, results);

        info!(
            checked = report.checked_count,
            failed = report.failed_count,
            healthy = report.count_by_status(HealthStatus::Healthy),
            degraded = report.count_by_status(HealthStatus::Degraded),
            down = report.count_by_status(HealthStatus::Down),
            "检测周期完成"
        );

        Ok(report)
    }
}

impl CheckContext {
    /// 检测单个端点
    ///
    /// 探测中的 panic 在这里被捕获，记为 unknown 并照常写入
    async fn check_endpoint(self, endpoint: Endpoint, now: DateTime<Utc>) -> CheckResult {
        let outcome = {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return CheckResult::task_failed(endpoint.id, format!("获取并发许可失败: {}", e));
                }
            };

            AssertUnwindSafe(self.prober.probe(&endpoint.url, self.probe_timeout))
                .catch_unwind()
                .await
        };

        let record = match outcome {
            Ok(outcome) => HealthCheckRecord::from_outcome(endpoint.id, &outcome, now),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(endpoint = %endpoint.name, url = %endpoint.url, panic = %message, "探测过程发生panic");
                HealthCheckRecord::new(endpoint.id, HealthStatus::Unknown, now)
                    .with_error(format!("probe panicked: {}", message))
            }
        };

        debug!(
            endpoint = %endpoint.name,
            url = %endpoint.url,
            status = record.status.as_str(),
            status_code = record.status_code,
            latency_ms = record.latency_ms,
            "探测完成"
        );

        let mut result = CheckResult::from_record(&record);

        match self.storage.insert_health_check(&record).await {
            Ok(record_id) => {
                result.record_id = Some(record_id);
                result.persisted = true;
            }
            Err(e) => {
                error!(endpoint = %endpoint.name, error = %e, "写入检测记录失败，端点保持到期状态");
                result.append_error(format!("写入检测记录失败: {}", e));
                return result;
            }
        }

        match self
            .storage
            .update_endpoint_last_checked(endpoint.id, now)
            .await
        {
            Ok(()) => result.timestamp_updated = true,
            Err(e) => {
                warn!(endpoint = %endpoint.name, error = %e, "更新最后检测时间失败，检测记录已保留");
            }
        }

        if let Some(alerting) = self.alerting {
            result.alert_id = self.raise_alert(&alerting, &endpoint, &record, now).await;
        }

        result
    }

    /// 评估告警并按去重策略写入
    async fn raise_alert(
        &self,
        alerting: &AlertSettings,
        endpoint: &Endpoint,
        record: &HealthCheckRecord,
        now: DateTime<Utc>,
    ) -> Option<AlertId> {
        let uptime = match self
            .storage
            .list_health_checks(endpoint.id, now - alerting.uptime_window)
            .await
        {
            Ok(records) if !records.is_empty() => Some(uptime_percent(&records)),
            Ok(_) => None,
            Err(e) => {
                warn!(endpoint = %endpoint.name, error = %e, "读取历史记录失败，跳过可用率评估");
                None
            }
        };

        let alert = alerting.evaluator.evaluate(endpoint, record, uptime)?;

        let existing = match alerting.evaluator.dedup_policy() {
            crate::alert::AlertDedupPolicy::Always => Vec::new(),
            crate::alert::AlertDedupPolicy::SkipUnresolved => {
                match self.storage.list_alerts(AlertFilter::Active).await {
                    Ok(alerts) => alerts,
                    Err(e) => {
                        warn!(endpoint = %endpoint.name, error = %e, "读取未解决告警失败，不做去重");
                        Vec::new()
                    }
                }
            }
        };

        if !alerting.evaluator.dedup_policy().should_insert(&alert, &existing) {
            debug!(endpoint = %endpoint.name, alert_type = %alert.alert_type, "存在未解决的同类告警，跳过");
            return None;
        }

        match self.storage.insert_alert(&alert).await {
            Ok(alert_id) => {
                warn!(
                    endpoint = %endpoint.name,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    "产生告警: {}",
                    alert.message
                );
                Some(alert_id)
            }
            Err(e) => {
                error!(endpoint = %endpoint.name, error = %e, "写入告警失败");
                None
            }
        }
    }
}

/// 提取panic信息
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! 检测周期测试
//!
//! 使用模拟探测器和可注入故障的存储验证检测周期的行为

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use endpoint_vitals::alert::{
    Alert, AlertDedupPolicy, AlertEvaluator, AlertFilter, AlertId, AlertThresholds,
    ALERT_TYPE_HIGH_LATENCY, ALERT_TYPE_LOW_UPTIME,
};
use endpoint_vitals::endpoint::{Endpoint, EndpointId, NewEndpoint};
use endpoint_vitals::error::{MonitorError, StorageError, StorageResult};
use endpoint_vitals::health::{CycleRunner, HealthCheckRecord, HealthStatus, ProbeOutcome, Prober, RecordId};
use endpoint_vitals::storage::{MemoryStore, Storage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 固定返回同一结果的探测器
struct FixedProber {
    status_code: u16,
    latency: Duration,
    delay: Duration,
}

impl FixedProber {
    fn ok() -> Self {
        Self::with_status(200)
    }

    fn with_status(status_code: u16) -> Self {
        Self {
            status_code,
            latency: Duration::from_millis(10),
            delay: Duration::ZERO,
        }
    }

    fn with_latency(latency: Duration) -> Self {
        Self {
            status_code: 200,
            latency,
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            status_code: 200,
            latency: delay,
            delay,
        }
    }
}

#[async_trait]
impl Prober for FixedProber {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        ProbeOutcome::Response {
            status_code: self.status_code,
            latency: self.latency,
        }
    }
}

/// 对包含 "boom" 的URL直接panic
struct PanickingProber;

#[async_trait]
impl Prober for PanickingProber {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        if url.contains("boom") {
            panic!("prober exploded on {}", url);
        }
        ProbeOutcome::Response {
            status_code: 200,
            latency: Duration::from_millis(1),
        }
    }
}

/// 记录同时在途的探测数量
#[derive(Default)]
struct CountingProber {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ProbeOutcome::Response {
            status_code: 200,
            latency: Duration::from_millis(20),
        }
    }
}

/// 可以按操作注入故障的存储
#[derive(Default)]
struct FailingStore {
    inner: MemoryStore,
    fail_list_endpoints: AtomicBool,
    fail_insert_health_check: AtomicBool,
    fail_update_last_checked: AtomicBool,
    panic_list_health_checks: AtomicBool,
}

impl FailingStore {
    fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            inner: MemoryStore::with_endpoints(endpoints),
            ..Self::default()
        }
    }

    fn injected(flag: &AtomicBool, operation: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected failure: {}", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FailingStore {
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        Self::injected(&self.fail_list_endpoints, "list_endpoints")?;
        self.inner.list_endpoints().await
    }

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>> {
        self.inner.get_endpoint(id).await
    }

    async fn insert_endpoint(&self, endpoint: &Endpoint) -> StorageResult<EndpointId> {
        self.inner.insert_endpoint(endpoint).await
    }

    async fn update_endpoint_last_checked(
        &self,
        id: EndpointId,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        Self::injected(&self.fail_update_last_checked, "update_endpoint_last_checked")?;
        self.inner.update_endpoint_last_checked(id, checked_at).await
    }

    async fn insert_health_check(&self, record: &HealthCheckRecord) -> StorageResult<RecordId> {
        Self::injected(&self.fail_insert_health_check, "insert_health_check")?;
        self.inner.insert_health_check(record).await
    }

    async fn list_health_checks(
        &self,
        endpoint_id: EndpointId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HealthCheckRecord>> {
        if self.panic_list_health_checks.load(Ordering::SeqCst) {
            panic!("history read exploded for {}", endpoint_id);
        }
        self.inner.list_health_checks(endpoint_id, since).await
    }

    async fn insert_alert(&self, alert: &Alert) -> StorageResult<AlertId> {
        self.inner.insert_alert(alert).await
    }

    async fn update_alert_resolved(&self, id: AlertId, resolved: bool) -> StorageResult<()> {
        self.inner.update_alert_resolved(id, resolved).await
    }

    async fn list_alerts(&self, filter: AlertFilter) -> StorageResult<Vec<Alert>> {
        self.inner.list_alerts(filter).await
    }
}

fn endpoint(name: &str) -> Endpoint {
    NewEndpoint::new(name, format!("http://{}.local/health", name), 60)
        .validate()
        .unwrap()
}

fn endpoints(count: usize) -> Vec<Endpoint> {
    (0..count).map(|i| endpoint(&format!("svc{}", i))).collect()
}

fn runner(storage: Arc<dyn Storage>, prober: impl Prober + 'static) -> CycleRunner {
    CycleRunner::new(storage, Arc::new(prober), 8, Duration::from_secs(1))
}

fn alerting(policy: AlertDedupPolicy) -> AlertEvaluator {
    AlertEvaluator::new(
        AlertThresholds {
            max_latency_ms: 2000,
            min_uptime_pct: 95.0,
        },
        policy,
    )
}

#[tokio::test]
async fn test_second_cycle_at_same_instant_checks_nothing() {
    let store = Arc::new(MemoryStore::with_endpoints(endpoints(3)));
    let runner = runner(store.clone(), FixedProber::ok());
    let now = Utc::now();

    let first = runner.run_cycle(now).await.unwrap();
    assert_eq!(first.checked_count, 3);

    let second = runner.run_cycle(now).await.unwrap();
    assert_eq!(second.checked_count, 0);

    // 未到间隔
    let third = runner
        .run_cycle(now + chrono::Duration::seconds(45))
        .await
        .unwrap();
    assert_eq!(third.checked_count, 0);

    let fourth = runner
        .run_cycle(now + chrono::Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(fourth.checked_count, 3);
}

#[tokio::test]
async fn test_inactive_endpoints_are_skipped() {
    let mut inactive = endpoint("paused");
    inactive.active = false;
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("live"), inactive]));

    let report = runner(store, FixedProber::ok())
        .run_cycle(Utc::now())
        .await
        .unwrap();
    assert_eq!(report.checked_count, 1);
}

#[tokio::test]
async fn test_panicking_probe_is_isolated() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![
        endpoint("ok1"),
        endpoint("boom"),
        endpoint("ok2"),
    ]));
    let now = Utc::now();

    let report = runner(store.clone(), PanickingProber)
        .run_cycle(now)
        .await
        .unwrap();

    assert_eq!(report.checked_count, 3);
    assert_eq!(report.count_by_status(HealthStatus::Healthy), 2);
    assert_eq!(report.count_by_status(HealthStatus::Unknown), 1);

    let failed = report
        .results
        .iter()
        .find(|r| r.status == HealthStatus::Unknown)
        .unwrap();
    assert!(failed.persisted);
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("prober exploded"));

    let records = store
        .list_health_checks(failed.endpoint_id, now - chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HealthStatus::Unknown);
}

#[tokio::test]
async fn test_in_flight_probes_never_exceed_limit() {
    let store = Arc::new(MemoryStore::with_endpoints(endpoints(20)));
    let prober = Arc::new(CountingProber::default());
    let runner = CycleRunner::new(store, prober.clone(), 3, Duration::from_secs(1));

    let report = runner.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(report.checked_count, 20);
    let max = prober.max_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1);
    assert!(max <= 3, "max in flight was {}", max);
}

#[tokio::test]
async fn test_record_insert_failure_keeps_endpoint_due() {
    let store = Arc::new(FailingStore::with_endpoints(vec![endpoint("a")]));
    store.fail_insert_health_check.store(true, Ordering::SeqCst);
    let runner = runner(store.clone(), FixedProber::ok());
    let now = Utc::now();

    let report = runner.run_cycle(now).await.unwrap();
    assert_eq!(report.checked_count, 1);
    assert_eq!(report.failed_count, 1);
    assert!(!report.results[0].persisted);
    assert!(!report.results[0].timestamp_updated);
    assert!(report.results[0].record_id.is_none());
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("injected failure"));

    let stored = store.list_endpoints().await.unwrap();
    assert!(stored[0].last_checked_at.is_none());

    // 恢复后同一时刻仍然到期
    store.fail_insert_health_check.store(false, Ordering::SeqCst);
    let retry = runner.run_cycle(now).await.unwrap();
    assert_eq!(retry.checked_count, 1);
    assert_eq!(retry.failed_count, 0);
}

#[tokio::test]
async fn test_timestamp_failure_keeps_record() {
    let store = Arc::new(FailingStore::with_endpoints(vec![endpoint("a")]));
    store.fail_update_last_checked.store(true, Ordering::SeqCst);
    let runner = runner(store.clone(), FixedProber::ok());
    let now = Utc::now();

    let report = runner.run_cycle(now).await.unwrap();
    let result = &report.results[0];
    assert!(result.persisted);
    assert!(result.record_id.is_some());
    assert!(!result.timestamp_updated);
    assert_eq!(report.failed_count, 0);

    let records = store
        .list_health_checks(result.endpoint_id, now - chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    // 时间戳未更新，端点仍然到期
    let again = runner.run_cycle(now).await.unwrap();
    assert_eq!(again.checked_count, 1);
}

#[tokio::test]
async fn test_task_panic_after_persist_is_reported_unpersisted() {
    let store = Arc::new(FailingStore::with_endpoints(vec![endpoint("a")]));
    store.panic_list_health_checks.store(true, Ordering::SeqCst);
    let runner = runner(store.clone(), FixedProber::ok())
        .with_alerts(alerting(AlertDedupPolicy::Always), chrono::Duration::hours(24));
    let now = Utc::now();

    // 告警阶段的panic发生在隔离边界之外，整个任务异常结束
    let report = runner.run_cycle(now).await.unwrap();
    assert_eq!(report.checked_count, 1);
    assert_eq!(report.failed_count, 1);

    let result = &report.results[0];
    assert_eq!(result.status, HealthStatus::Unknown);
    assert!(!result.persisted);
    assert!(!result.timestamp_updated);
    assert!(result.record_id.is_none());
    assert!(result.alert_id.is_none());
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("检测任务异常结束"));

    // 任务结束前已写入的记录仍然保留
    store.panic_list_health_checks.store(false, Ordering::SeqCst);
    let records = store
        .list_health_checks(result.endpoint_id, now - chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, HealthStatus::Healthy);
    assert!(store.list_alerts(AlertFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_endpoint_read_failure_fails_cycle() {
    let store = Arc::new(FailingStore::with_endpoints(vec![endpoint("a")]));
    store.fail_list_endpoints.store(true, Ordering::SeqCst);

    let result = runner(store, FixedProber::ok()).run_cycle(Utc::now()).await;
    assert!(matches!(result, Err(MonitorError::Storage(_))));
}

#[tokio::test]
async fn test_overlapping_cycle_is_rejected() {
    let store = Arc::new(MemoryStore::with_endpoints(endpoints(2)));
    let runner = Arc::new(runner(store, FixedProber::slow(Duration::from_millis(300))));

    let first = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_cycle(Utc::now()).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runner.is_running());

    let second = runner.run_cycle(Utc::now()).await;
    assert!(matches!(second, Err(MonitorError::CycleInProgress)));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.checked_count, 2);
    assert!(!runner.is_running());
}

#[tokio::test]
async fn test_high_latency_raises_warning() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("slow")]));
    let runner = runner(store.clone(), FixedProber::with_latency(Duration::from_millis(2500)))
        .with_alerts(alerting(AlertDedupPolicy::Always), chrono::Duration::hours(24));

    let report = runner.run_cycle(Utc::now()).await.unwrap();
    assert!(report.results[0].alert_id.is_some());

    let alerts = store.list_alerts(AlertFilter::All).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, ALERT_TYPE_HIGH_LATENCY);
    assert!(!alerts[0].is_resolved);
}

#[tokio::test]
async fn test_latency_under_threshold_raises_nothing() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("fast")]));
    let runner = runner(store.clone(), FixedProber::with_latency(Duration::from_millis(1500)))
        .with_alerts(alerting(AlertDedupPolicy::Always), chrono::Duration::hours(24));

    let report = runner.run_cycle(Utc::now()).await.unwrap();
    assert!(report.results[0].alert_id.is_none());
    assert!(store.list_alerts(AlertFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_low_uptime_raises_critical() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("flaky")]));
    let runner = runner(store.clone(), FixedProber::with_status(503))
        .with_alerts(alerting(AlertDedupPolicy::Always), chrono::Duration::hours(24));

    let report = runner.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.results[0].status, HealthStatus::Degraded);

    let alerts = store.list_alerts(AlertFilter::Active).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, ALERT_TYPE_LOW_UPTIME);
    assert_eq!(alerts[0].severity.as_str(), "critical");
}

#[tokio::test]
async fn test_alerts_disabled_without_evaluator() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("down")]));
    let report = runner(store.clone(), FixedProber::with_status(500))
        .run_cycle(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.results[0].status, HealthStatus::Down);
    assert!(store.list_alerts(AlertFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_always_policy_repeats_alerts() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("slow")]));
    let runner = runner(store.clone(), FixedProber::with_latency(Duration::from_millis(2500)))
        .with_alerts(alerting(AlertDedupPolicy::Always), chrono::Duration::hours(24));
    let now = Utc::now();

    runner.run_cycle(now).await.unwrap();
    runner
        .run_cycle(now + chrono::Duration::seconds(61))
        .await
        .unwrap();

    assert_eq!(store.list_alerts(AlertFilter::All).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_skip_unresolved_policy_dedups_until_resolved() {
    let store = Arc::new(MemoryStore::with_endpoints(vec![endpoint("slow")]));
    let runner = runner(store.clone(), FixedProber::with_latency(Duration::from_millis(2500)))
        .with_alerts(
            alerting(AlertDedupPolicy::SkipUnresolved),
            chrono::Duration::hours(24),
        );
    let now = Utc::now();

    let first = runner.run_cycle(now).await.unwrap();
    let alert_id = first.results[0].alert_id.unwrap();

    let second = runner
        .run_cycle(now + chrono::Duration::seconds(61))
        .await
        .unwrap();
    assert!(second.results[0].alert_id.is_none());
    assert_eq!(store.list_alerts(AlertFilter::All).await.unwrap().len(), 1);

    store.update_alert_resolved(alert_id, true).await.unwrap();

    let third = runner
        .run_cycle(now + chrono::Duration::seconds(122))
        .await
        .unwrap();
    assert!(third.results[0].alert_id.is_some());
    assert_eq!(store.list_alerts(AlertFilter::All).await.unwrap().len(), 2);
    assert_eq!(store.list_alerts(AlertFilter::Active).await.unwrap().len(), 1);
}

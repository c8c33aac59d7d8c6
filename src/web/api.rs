//! API端点实现
//!
//! 所有响应都包装在 `ApiResponse` 中

use super::{ApiError, ApiResponse, AppState, HealthResponse};
use crate::alert::{Alert, AlertFilter, AlertId, NewAlert};
use crate::endpoint::{Endpoint, EndpointId, NewEndpoint};
use crate::error::ValidationError;
use crate::health::CycleReport;
use crate::stats::{EndpointMetrics, EndpointSummary, TimeRange};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// 服务自身的存活检查
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let uptime = Utc::now().signed_duration_since(state.start_time);
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    }))
}

/// 触发一次检测周期
pub async fn trigger_health_check(State(state): State<AppState>) -> ApiResult<CycleReport> {
    let report = state.runner.run_cycle(Utc::now()).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// 端点列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsQuery {
    /// 统计窗口
    pub window: Option<TimeRange>,
}

/// 端点列表，按创建时间降序
pub async fn list_endpoints(
    State(state): State<AppState>,
    query: Result<Query<EndpointsQuery>, QueryRejection>,
) -> ApiResult<Vec<EndpointSummary>> {
    let Query(query) = query?;
    let since = query.window.unwrap_or_default().since(Utc::now());
    let mut endpoints = state.storage.list_endpoints().await?;
    endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut summaries = Vec::with_capacity(endpoints.len());
    for endpoint in &endpoints {
        let records = state.storage.list_health_checks(endpoint.id, since).await?;
        summaries.push(EndpointSummary::new(endpoint, &records));
    }

    Ok(Json(ApiResponse::success(summaries)))
}

/// 新建端点请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub check_interval: Option<i64>,
    pub active: Option<bool>,
}

impl TryFrom<CreateEndpointRequest> for NewEndpoint {
    type Error = ValidationError;

    fn try_from(request: CreateEndpointRequest) -> Result<Self, Self::Error> {
        Ok(NewEndpoint {
            name: request.name.ok_or(ValidationError::MissingField("name"))?,
            url: request.url.ok_or(ValidationError::MissingField("url"))?,
            check_interval_seconds: request
                .check_interval
                .ok_or(ValidationError::MissingField("checkInterval"))?,
            active: request.active.unwrap_or(true),
        })
    }
}

/// 端点视图
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointView {
    pub id: EndpointId,
    pub name: String,
    pub url: String,
    pub check_interval: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Endpoint> for EndpointView {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            id: endpoint.id,
            name: endpoint.name,
            url: endpoint.url,
            check_interval: endpoint.check_interval_seconds,
            last_checked_at: endpoint.last_checked_at,
            active: endpoint.active,
            created_at: endpoint.created_at,
        }
    }
}

/// 新建端点
pub async fn create_endpoint(
    State(state): State<AppState>,
    request: Result<Json<CreateEndpointRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<EndpointView>>), ApiError> {
    let Json(request) = request?;
    let endpoint = NewEndpoint::try_from(request)?.validate()?;
    state.storage.insert_endpoint(&endpoint).await?;

    tracing::info!(endpoint_id = %endpoint.id, name = %endpoint.name, url = %endpoint.url, "新增端点");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(EndpointView::from(endpoint))),
    ))
}

/// 告警列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub filter: Option<AlertFilter>,
}

/// 告警视图，附带端点名称
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    pub id: AlertId,
    pub endpoint_id: EndpointId,
    pub endpoint_name: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertView {
    fn new(alert: Alert, endpoint_name: Option<&str>) -> Self {
        Self {
            id: alert.id,
            endpoint_id: alert.endpoint_id,
            endpoint_name: endpoint_name.unwrap_or("Unknown").to_string(),
            alert_type: alert.alert_type,
            severity: alert.severity.as_str().to_string(),
            message: alert.message,
            is_resolved: alert.is_resolved,
            created_at: alert.created_at,
        }
    }
}

/// 告警列表，按创建时间降序
pub async fn list_alerts(
    State(state): State<AppState>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> ApiResult<Vec<AlertView>> {
    let Query(query) = query?;
    let alerts = state
        .storage
        .list_alerts(query.filter.unwrap_or_default())
        .await?;
    let names: HashMap<EndpointId, String> = state
        .storage
        .list_endpoints()
        .await?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect();

    let views = alerts
        .into_iter()
        .map(|alert| {
            let name = names.get(&alert.endpoint_id).map(String::as_str);
            AlertView::new(alert, name)
        })
        .collect();

    Ok(Json(ApiResponse::success(views)))
}

/// 新建告警请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub endpoint_id: Option<EndpointId>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
}

impl From<CreateAlertRequest> for NewAlert {
    fn from(request: CreateAlertRequest) -> Self {
        NewAlert {
            endpoint_id: request.endpoint_id,
            alert_type: request.alert_type.unwrap_or_default(),
            severity: request.severity.unwrap_or_default(),
            message: request.message.unwrap_or_default(),
        }
    }
}

/// 手动新建告警
pub async fn create_alert(
    State(state): State<AppState>,
    request: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AlertView>>), ApiError> {
    let Json(request) = request?;
    let alert = NewAlert::from(request).validate()?;

    let endpoint = state
        .storage
        .get_endpoint(alert.endpoint_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("端点不存在: {}", alert.endpoint_id)))?;

    state.storage.insert_alert(&alert).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AlertView::new(alert, Some(&endpoint.name)))),
    ))
}

/// 修改告警状态请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    pub is_resolved: Option<bool>,
}

/// 告警状态
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResolution {
    pub id: AlertId,
    pub is_resolved: bool,
}

/// 修改告警的解决状态
pub async fn update_alert(
    State(state): State<AppState>,
    alert_id: Result<Path<AlertId>, PathRejection>,
    request: Result<Json<UpdateAlertRequest>, JsonRejection>,
) -> ApiResult<AlertResolution> {
    let Path(alert_id) = alert_id?;
    let Json(request) = request?;
    let is_resolved = request
        .is_resolved
        .ok_or(ValidationError::MissingField("isResolved"))?;

    state
        .storage
        .update_alert_resolved(alert_id, is_resolved)
        .await?;

    tracing::info!(alert_id = %alert_id, is_resolved, "更新告警状态");

    Ok(Json(ApiResponse::success(AlertResolution {
        id: alert_id,
        is_resolved,
    })))
}

/// 指标查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub time_range: Option<TimeRange>,
}

/// 单个端点在时间范围内的指标
pub async fn get_metrics(
    State(state): State<AppState>,
    endpoint_id: Result<Path<EndpointId>, PathRejection>,
    query: Result<Query<MetricsQuery>, QueryRejection>,
) -> ApiResult<EndpointMetrics> {
    let Path(endpoint_id) = endpoint_id?;
    let Query(query) = query?;
    let time_range = query.time_range.unwrap_or_default();

    if state.storage.get_endpoint(endpoint_id).await?.is_none() {
        return Err(ApiError::not_found(format!("端点不存在: {}", endpoint_id)));
    }

    let records = state
        .storage
        .list_health_checks(endpoint_id, time_range.since(Utc::now()))
        .await?;

    Ok(Json(ApiResponse::success(EndpointMetrics::new(
        endpoint_id,
        time_range,
        &records,
    ))))
}

//! Web API模块
//!
//! 提供检测周期触发接口以及端点、告警、指标的读取与管理接口

use crate::error::{MonitorError, StorageError};
use crate::health::CycleRunner;
use crate::storage::Storage;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod server;

pub use server::{create_router, WebServer};

/// Web服务器共享状态
#[derive(Clone)]
pub struct AppState {
    /// 存储
    pub storage: Arc<dyn Storage>,
    /// 检测周期运行器
    pub runner: Arc<CycleRunner>,
    /// 触发接口密钥，未配置时不校验
    pub trigger_secret: Option<Arc<str>>,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// 创建新的Web服务器状态
    pub fn new(
        storage: Arc<dyn Storage>,
        runner: Arc<CycleRunner>,
        trigger_secret: Option<String>,
    ) -> Self {
        Self {
            storage,
            runner,
            trigger_secret: trigger_secret.map(Arc::from),
            start_time: chrono::Utc::now(),
        }
    }
}

/// API响应包装器
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 是否成功
    pub success: bool,
    /// 响应数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 时间戳
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// 创建错误响应
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// API错误类型
#[derive(Debug)]
pub struct ApiError {
    /// HTTP状态码
    pub status: StatusCode,
    /// 错误消息
    pub message: String,
    /// 详细信息
    pub details: Option<String>,
}

impl ApiError {
    /// 创建新的API错误
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// 添加详细信息
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<MonitorError> for ApiError {
    fn from(error: MonitorError) -> Self {
        match error {
            MonitorError::CycleInProgress => Self::new(StatusCode::CONFLICT, error.to_string()),
            MonitorError::Validation(e) => Self::bad_request(e.to_string()),
            MonitorError::Storage(e) => Self::from(e),
            other => {
                tracing::error!(error = %other, "请求处理失败");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "内部服务器错误")
                    .with_details(other.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { .. } => Self::not_found(error.to_string()),
            other => {
                tracing::error!(error = %other, "存储操作失败");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "存储操作失败")
                    .with_details(other.to_string())
            }
        }
    }
}

impl From<crate::error::ValidationError> for ApiError {
    fn from(error: crate::error::ValidationError) -> Self {
        Self::bad_request(error.to_string())
    }
}

// 提取器拒绝的请求同样使用统一的响应格式
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("请求体无效").with_details(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request("路径参数无效").with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("查询参数无效").with_details(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self.details {
            Some(details) => format!("{}: {}", self.message, details),
            None => self.message,
        };
        (self.status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 版本信息
    pub version: String,
    /// 运行时间
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let response: ApiResponse<()> = ApiResponse::error("test error".to_string());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("test error".to_string()));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(MonitorError::CycleInProgress).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MonitorError::Validation(ValidationError::MissingField("name"))).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::NotFound {
                entity: "alert",
                id: "x".to_string()
            })
            .status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::Backend("disk full".to_string())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_details() {
        let error = ApiError::not_found("Not Found").with_details("Resource not found");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.details.as_deref(), Some("Resource not found"));
    }
}

//! 认证模块
//!
//! 触发接口的共享密钥校验。未配置密钥时直接放行

use super::{ApiError, AppState};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// 判断请求头是否携带正确的密钥
///
/// `Authorization` 必须与 `Bearer <secret>` 完全一致
pub fn is_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", secret))
        .unwrap_or(false)
}

/// 触发接口认证中间件
pub async fn require_trigger_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_authorized(request.headers(), state.trigger_secret.as_deref()) {
        tracing::warn!(uri = %request.uri(), "触发接口认证失败");
        return ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    next.run(request).await
}

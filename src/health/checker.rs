//! HTTP探测器实现
//!
//! 对目标URL发起一次带超时的GET请求，返回探测结果。网络错误不会向外传播

use crate::error::{MonitorError, ProbeError, Result};
use crate::health::result::ProbeOutcome;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 探测器trait，定义探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 对目标URL执行一次探测
    ///
    /// # 参数
    /// * `url` - 目标URL
    /// * `timeout_duration` - 从发送请求到读完响应体的总超时
    ///
    /// # 返回
    /// * `ProbeOutcome` - 探测结果，失败时带有已耗费的时间
    async fn probe(&self, url: &str, timeout_duration: Duration) -> ProbeOutcome;
}

/// HTTP探测器实现
#[derive(Clone)]
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `connect_timeout` - 建立连接的超时时间
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| {
                MonitorError::Other(anyhow::Error::new(e).context("创建HTTP客户端失败"))
            })?;

        Ok(Self { client })
    }

    /// 执行单次GET请求并读完响应体
    async fn perform_request(&self, url: &str) -> std::result::Result<u16, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();

        // 响应体读取失败时仍然认为拿到了响应
        if let Err(e) = response.bytes().await {
            tracing::debug!(url = %url, error = %e, "读取响应体失败");
        }

        Ok(status_code)
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn format_request_error(&self, error: &reqwest::Error) -> ProbeError {
        if error.is_timeout() {
            return ProbeError::Timeout;
        }

        let detail = error_chain_text(error);
        let message = if detail.contains("dns") || detail.contains("DNS") {
            "DNS resolution failed".to_string()
        } else if detail.contains("certificate")
            || detail.contains("tls")
            || detail.contains("TLS")
            || detail.contains("ssl")
        {
            "SSL/TLS certificate error".to_string()
        } else if error.is_connect() {
            "Connection refused".to_string()
        } else if error.is_builder() || error.is_request() {
            "Invalid request".to_string()
        } else if error.is_decode() {
            "Response decode error".to_string()
        } else if detail.contains("network") {
            "Network error".to_string()
        } else {
            format!("Request failed: {}", error)
        };

        ProbeError::Network(message)
    }
}

/// 拼接错误链上所有层级的描述
fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout_duration: Duration) -> ProbeOutcome {
        let start_time = Instant::now();

        let response_result = timeout(timeout_duration, self.perform_request(url)).await;

        let latency = start_time.elapsed();

        match response_result {
            Ok(Ok(status_code)) => ProbeOutcome::Response {
                status_code,
                latency,
            },
            Ok(Err(e)) => ProbeOutcome::Failed {
                latency,
                error: self.format_request_error(&e),
            },
            Err(_) => ProbeOutcome::Failed {
                latency,
                error: ProbeError::Timeout,
            },
        }
    }
}

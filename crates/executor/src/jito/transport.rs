//! 中继 HTTP 传输层

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::RelayError;

/// 原始 HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHttpResponse {
    pub status: u16,
    pub body: String,
}

impl RelayHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// 向中继发送一次 JSON POST
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        auth: &str,
        body: String,
    ) -> Result<RelayHttpResponse, RelayError>;
}

/// 基于 reqwest 的实现
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RelayTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        auth: &str,
        body: String,
    ) -> Result<RelayHttpResponse, RelayError> {
        let response = self.client
            .post(url)
            .header("content-type", "application/json")
            .header("x-jito-auth", auth)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        // 错误响应体读取失败时按空处理
        let body = response.text().await.unwrap_or_default();

        Ok(RelayHttpResponse { status, body })
    }
}

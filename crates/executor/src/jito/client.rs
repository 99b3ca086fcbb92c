//! Jito 中继客户端
//!
//! 负责与 Block Engine 的 JSON-RPC 通信：全局节流、429 退避、sendBundle 参数格式回退

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::throttle::{BackoffPolicy, RelayThrottle};
use super::transport::{HttpTransport, RelayTransport};
use super::types::*;

/// 编排器使用的中继能力
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// 提交 bundle，返回中继分配的 bundle id
    async fn send_bundle(
        &self,
        endpoint: &RelayEndpoint,
        txs: &[String],
    ) -> Result<String, RelayError>;

    /// 查询 bundle 状态
    async fn get_bundle_statuses(
        &self,
        endpoint: &RelayEndpoint,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatusReport>, RelayError>;

    /// 两次调用的最小间隔
    fn min_call_interval(&self) -> Duration;
}

/// Jito 中继客户端
pub struct RelayClient<T: RelayTransport = HttpTransport> {
    /// HTTP 传输
    transport: T,
    /// 全局节流（所有端点共享）
    throttle: RelayThrottle,
    /// 429 退避策略
    backoff: BackoffPolicy,
}

impl RelayClient<HttpTransport> {
    /// 创建基于 reqwest 的客户端
    pub fn with_http(
        min_interval: Duration,
        backoff: BackoffPolicy,
        http_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let transport = HttpTransport::new(http_timeout)?;
        info!(
            "🔒 Jito 中继客户端初始化: min_interval={:?}, backoff={:?}..{:?} x{}",
            min_interval, backoff.base, backoff.cap, backoff.factor
        );
        Ok(Self::new(transport, min_interval, backoff))
    }
}

impl<T: RelayTransport> RelayClient<T> {
    pub fn new(transport: T, min_interval: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            throttle: RelayThrottle::new(min_interval),
            backoff,
        }
    }

    /// 发送一次 JSON-RPC 调用
    ///
    /// 每次网络请求前都经过全局节流；HTTP 429 按退避策略重试，
    /// 其他非 2xx 直接返回 `RelayError::Http`。
    pub async fn call<R: DeserializeOwned>(
        &self,
        endpoint: &RelayEndpoint,
        method: &'static str,
        params: Value,
    ) -> Result<R, RelayError> {
        let url = endpoint.bundles_url();
        let body = serde_json::to_string(&JsonRpcRequest::new(method, params))
            .map_err(|e| RelayError::Decode(e.to_string()))?;
        let mut backoff = self.backoff.start(self.throttle.min_interval());

        loop {
            self.throttle.acquire().await;

            debug!(target: "relay_stats", "📤 [{}] POST {} body={}", method, url, body);
            let response = self.transport
                .post_json(&url, endpoint.secret.expose(), body.clone())
                .await?;

            if response.is_rate_limited() {
                let Some(base) = backoff.on_rate_limited() else {
                    warn!(target: "relay_stats", "[{}] 429 → 退避次数用尽 ({})", method, url);
                    return Err(RelayError::RateLimitExhausted {
                        method,
                        attempts: backoff.retries() + 1,
                    });
                };
                let wait = base + self.backoff.jitter();
                info!(
                    target: "relay_stats",
                    "[{}] 429 → backoff {}ms (attempt {})",
                    method,
                    wait.as_millis(),
                    backoff.retries()
                );
                sleep(wait).await;
                continue;
            }

            debug!(target: "relay_stats", "📥 [{}] HTTP {} {}", method, response.status, response.body);

            if !response.is_success() {
                return Err(RelayError::Http {
                    status: response.status,
                    body: response.body,
                });
            }

            let envelope: JsonRpcResponse<Value> = serde_json::from_str(&response.body)
                .map_err(|e| RelayError::Decode(format!("{}: {}", e, response.body)))?;

            if let Some(error) = envelope.error {
                return Err(RelayError::Protocol {
                    code: error.code,
                    message: error.message,
                });
            }

            let result = envelope
                .result
                .ok_or_else(|| RelayError::Decode(format!("{} response has no result", method)))?;

            return serde_json::from_value(result).map_err(|e| RelayError::Decode(e.to_string()));
        }
    }
}

#[async_trait]
impl<T: RelayTransport> BundleRelay for RelayClient<T> {
    async fn send_bundle(
        &self,
        endpoint: &RelayEndpoint,
        txs: &[String],
    ) -> Result<String, RelayError> {
        match self.call(endpoint, "sendBundle", SendBundleShape::Bare.params(txs)).await {
            Err(e) if e.is_invalid_params() => {
                info!(target: "relay_stats", "sendBundle fallback → with encoding param ({})", e);
                self.call(endpoint, "sendBundle", SendBundleShape::WithEncoding.params(txs))
                    .await
            }
            other => other,
        }
    }

    async fn get_bundle_statuses(
        &self,
        endpoint: &RelayEndpoint,
        bundle_ids: &[String],
    ) -> Result<Vec<BundleStatusReport>, RelayError> {
        let result: Value = self.call(endpoint, "getBundleStatuses", json!([bundle_ids])).await?;
        Ok(BundleStatusReport::parse_result(&result))
    }

    fn min_call_interval(&self) -> Duration {
        self.throttle.min_interval()
    }
}

//! Bundle 提交编排器
//!
//! 状态机：
//!
//! ```text
//! Idle → Building → Submitting → Polling → Landed
//!            ↑           │           │
//!            │           ↓           ↓
//!            └──────── Retry ──→ Exhausted
//! ```
//!
//! 每次尝试都重新获取 blockhash 并重签两笔交易，端点按尝试次数轮换。
//! 单线程顺序执行，所有等待都是异步 sleep。

use config_crate::BundleSubmitConfig;
use solana_chain::ChainRpc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::bundle::{Bundle, SignedBundle};
use crate::jito::{BundleRelay, BundleStatus, EndpointPool, RelayEndpoint};
use crate::types::{ExecutionError, LandedBundle};

/// 提交参数
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// 最多尝试次数
    pub retries: u32,
    /// 单次尝试的轮询超时
    pub poll_timeout: Duration,
    /// 轮询间隔（实际间隔不小于中继最小调用间隔）
    pub poll_interval: Duration,
}

impl From<&BundleSubmitConfig> for SubmissionConfig {
    fn from(config: &BundleSubmitConfig) -> Self {
        Self {
            retries: config.retries,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// 提交状态
#[derive(Debug)]
pub enum SubmissionState {
    Idle,
    /// 获取 blockhash 并重签
    Building { attempt: u32 },
    /// 调用 sendBundle
    Submitting { attempt: u32, signed: SignedBundle },
    /// 轮询 getBundleStatuses
    Polling { attempt: u32, bundle_id: String },
    /// 本次尝试结束，决定是否继续
    Retry { attempt: u32, cause: ExecutionError },
    Landed(LandedBundle),
    Exhausted { attempts: u32 },
}

/// 一次轮询的结果
#[derive(Debug)]
pub enum AttemptOutcome {
    Landed(LandedBundle),
    Retry(ExecutionError),
}

/// Bundle 提交编排器
pub struct SubmissionOrchestrator {
    relay: Arc<dyn BundleRelay>,
    rpc: Arc<dyn ChainRpc>,
    endpoints: EndpointPool,
    config: SubmissionConfig,
}

impl SubmissionOrchestrator {
    pub fn new(
        relay: Arc<dyn BundleRelay>,
        rpc: Arc<dyn ChainRpc>,
        endpoints: EndpointPool,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            relay,
            rpc,
            endpoints,
            config,
        }
    }

    /// 实际使用的轮询间隔
    pub fn effective_poll_interval(&self) -> Duration {
        self.config.poll_interval.max(self.relay.min_call_interval())
    }

    /// 提交直到上链或次数用尽
    ///
    /// 签名失败直接返回；链 RPC、中继和 bundle 状态错误只结束当前尝试。
    pub async fn run(&self, bundle: &mut Bundle) -> Result<LandedBundle, ExecutionError> {
        let mut state = SubmissionState::Idle;
        let mut last_error: Option<ExecutionError> = None;

        info!(
            target: "bundle_submit",
            "🚀 开始提交 bundle: {} | retries={} timeout={:?} interval={:?} endpoints={}",
            bundle.operation(),
            self.config.retries,
            self.config.poll_timeout,
            self.effective_poll_interval(),
            self.endpoints.endpoints().len()
        );

        loop {
            state = match state {
                SubmissionState::Idle => {
                    if self.config.retries == 0 {
                        SubmissionState::Exhausted { attempts: 0 }
                    } else {
                        SubmissionState::Building { attempt: 0 }
                    }
                }

                SubmissionState::Building { attempt } => match self.refresh(bundle).await {
                    Ok(signed) => SubmissionState::Submitting { attempt, signed },
                    Err(e @ ExecutionError::Chain(_)) => SubmissionState::Retry { attempt, cause: e },
                    Err(e) => {
                        error!(target: "bundle_submit", "❌ [attempt {}] 签名失败: {}", attempt + 1, e);
                        return Err(e);
                    }
                },

                SubmissionState::Submitting { attempt, signed } => {
                    let endpoint = self.endpoints.pick_endpoint(attempt);
                    info!(
                        target: "bundle_submit",
                        "📤 [attempt {}/{}] sendBundle → {} blockhash={}",
                        attempt + 1,
                        self.config.retries,
                        endpoint.base_url,
                        signed.blockhash
                    );
                    match self.relay.send_bundle(endpoint, &signed.transactions).await {
                        Ok(bundle_id) => {
                            info!(target: "bundle_submit", "✅ [attempt {}] bundle_id={}", attempt + 1, bundle_id);
                            SubmissionState::Polling { attempt, bundle_id }
                        }
                        Err(e) => SubmissionState::Retry { attempt, cause: e.into() },
                    }
                }

                SubmissionState::Polling { attempt, bundle_id } => {
                    let endpoint = self.endpoints.pick_endpoint(attempt);
                    match self.poll(attempt, endpoint, &bundle_id).await {
                        AttemptOutcome::Landed(landed) => SubmissionState::Landed(landed),
                        AttemptOutcome::Retry(cause) => SubmissionState::Retry { attempt, cause },
                    }
                }

                SubmissionState::Retry { attempt, cause } => {
                    warn!(
                        target: "bundle_submit",
                        "⚠️ [attempt {}/{}] {}",
                        attempt + 1,
                        self.config.retries,
                        cause
                    );
                    last_error = Some(cause);
                    let next = attempt + 1;
                    if next >= self.config.retries {
                        SubmissionState::Exhausted { attempts: next }
                    } else {
                        SubmissionState::Building { attempt: next }
                    }
                }

                SubmissionState::Landed(landed) => {
                    info!(
                        target: "bundle_submit",
                        "🎉 Bundle 已上链: {} ({:?}) attempt={} endpoint={} status={}",
                        landed.bundle_id,
                        landed.status,
                        landed.attempt,
                        landed.endpoint,
                        landed.raw_status
                    );
                    return Ok(landed);
                }

                SubmissionState::Exhausted { attempts } => {
                    let last_error = last_error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no attempts made".to_string());
                    error!(
                        target: "bundle_submit",
                        "❌ 提交失败，已尝试 {} 次: {}",
                        attempts,
                        last_error
                    );
                    return Err(ExecutionError::RetriesExhausted { attempts, last_error });
                }
            };
        }
    }

    /// 获取新的 blockhash 并重签
    async fn refresh(&self, bundle: &mut Bundle) -> Result<SignedBundle, ExecutionError> {
        let blockhash = self.rpc
            .latest_blockhash()
            .await
            .map_err(|e| ExecutionError::Chain(format!("{:#}", e)))?;
        bundle.refresh(blockhash)
    }

    /// 轮询直到终态或超时
    ///
    /// 超时只在每轮开始时检查，进行中的请求会等它完成。
    async fn poll(&self, attempt: u32, endpoint: &RelayEndpoint, bundle_id: &str) -> AttemptOutcome {
        let interval = self.effective_poll_interval();
        let deadline = Instant::now() + self.config.poll_timeout;
        let ids = [bundle_id.to_string()];

        while Instant::now() < deadline {
            let reports = match self.relay.get_bundle_statuses(endpoint, &ids).await {
                Ok(reports) => reports,
                Err(e) => return AttemptOutcome::Retry(e.into()),
            };

            let (status, raw) = reports
                .into_iter()
                .next()
                .map(|r| (r.status, r.raw))
                .unwrap_or((BundleStatus::Unknown, serde_json::Value::Null));

            info!(target: "bundle_submit", "🔍 [attempt {}] {} status={}", attempt + 1, bundle_id, raw);

            match status {
                BundleStatus::Landed(_) => {
                    return AttemptOutcome::Landed(LandedBundle {
                        attempt: attempt + 1,
                        endpoint: endpoint.base_url.clone(),
                        bundle_id: bundle_id.to_string(),
                        status,
                        raw_status: raw,
                    });
                }
                BundleStatus::Failed(reason) => {
                    return AttemptOutcome::Retry(ExecutionError::BundleFailed {
                        bundle_id: bundle_id.to_string(),
                        reason,
                    });
                }
                BundleStatus::Pending | BundleStatus::Unknown => {}
            }

            sleep(interval).await;
        }

        AttemptOutcome::Retry(ExecutionError::BundleTimeout {
            bundle_id: bundle_id.to_string(),
            timeout: self.config.poll_timeout,
        })
    }
}

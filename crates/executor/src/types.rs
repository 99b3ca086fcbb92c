//! 执行器类型定义

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::jito::{BundleStatus, RelayError};

/// 执行错误类型
///
/// `Relay` / `Chain` / `BundleFailed` / `BundleTimeout` 只结束当前尝试，
/// 是否放弃由编排器决定；`RetriesExhausted` 是整次运行的最终失败。
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Chain RPC error: {0}")]
    Chain(String),

    #[error("Bundle {bundle_id} failed: {reason}")]
    BundleFailed { bundle_id: String, reason: String },

    #[error("Bundle {bundle_id} not landed within {timeout:?}")]
    BundleTimeout { bundle_id: String, timeout: Duration },

    #[error("Failed to land bundle after {attempts} attempts (last: {last_error})")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Bundle build failed: {0}")]
    Build(String),

    #[error("No relay endpoints configured")]
    NoEndpoints,

    #[error("No tip account available")]
    NoTipAccount,
}

/// 成功上链的 bundle
#[derive(Debug, Clone)]
pub struct LandedBundle {
    /// 第几次尝试（从 1 开始）
    pub attempt: u32,
    /// 提交所用端点
    pub endpoint: String,
    pub bundle_id: String,
    pub status: BundleStatus,
    /// 中继返回的原始状态
    pub raw_status: Value,
}

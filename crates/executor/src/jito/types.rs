//! Jito 中继类型定义

use config_crate::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// 标准 JSON-RPC "invalid params" 错误码
pub const JSONRPC_INVALID_PARAMS: i64 = -32602;

/// 中继端点（Block Engine 区域）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    /// 基础 URL，如 https://frankfurt.mainnet.block-engine.jito.wtf
    pub base_url: String,
    /// x-jito-auth
    pub secret: SecretString,
}

impl RelayEndpoint {
    pub fn new(base_url: impl Into<String>, secret: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            secret,
        }
    }

    /// Bundle JSON-RPC 路径
    pub fn bundles_url(&self) -> String {
        format!("{}/api/v1/bundles", self.base_url.trim_end_matches('/'))
    }
}

/// 中继调用错误
#[derive(Debug, Error)]
pub enum RelayError {
    /// 非 2xx（429 除外）
    #[error("Jito HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 429 退避次数用尽
    #[error("Jito {method} HTTP 429 after {attempts} attempts (max backoff reached)")]
    RateLimitExhausted { method: &'static str, attempts: u32 },

    /// 响应中带有 error 对象
    #[error("Jito RPC error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// 网络层失败（连接、超时）
    #[error("Jito transport error: {0}")]
    Transport(String),

    /// 响应无法解析
    #[error("Jito response decode error: {0}")]
    Decode(String),
}

impl RelayError {
    /// 中继是否拒绝了 sendBundle 的参数格式
    ///
    /// 先看结构化信息（HTTP 400、JSON-RPC -32602）；只有中继返回了
    /// 非标准错误码时才退回到检查错误消息文本。
    pub fn is_invalid_params(&self) -> bool {
        match self {
            // 400 是中继对参数格式的结构化拒绝，不再看响应体
            RelayError::Http { status: 400, .. } => true,
            RelayError::Protocol { code, .. } if *code == JSONRPC_INVALID_PARAMS => true,
            RelayError::Protocol { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("invalid") && message.contains("param")
            }
            _ => false,
        }
    }
}

/// sendBundle 的参数格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBundleShape {
    /// `[[tx...]]`
    Bare,
    /// `[[tx...], "base64"]`
    WithEncoding,
}

impl SendBundleShape {
    pub fn params(&self, txs: &[String]) -> Value {
        match self {
            SendBundleShape::Bare => json!([txs]),
            SendBundleShape::WithEncoding => json!([txs, "base64"]),
        }
    }
}

/// JSON-RPC 请求
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: T,
}

impl<T: Serialize> JsonRpcRequest<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

/// JSON-RPC 响应
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 错误
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// 上链确认级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandedLevel {
    Confirmed,
    Finalized,
}

/// Bundle 状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleStatus {
    /// 中继已知但还没上链
    Pending,
    /// 已上链（终态）
    Landed(LandedLevel),
    /// 中继明确报告失败（终态）
    Failed(String),
    /// 中继没有这个 bundle 的记录
    Unknown,
}

impl BundleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleStatus::Landed(_) | BundleStatus::Failed(_))
    }

    /// 解析 getBundleStatuses 结果中的单个条目
    pub fn from_entry(entry: &Value) -> Self {
        if entry.is_null() {
            return BundleStatus::Unknown;
        }

        let confirmation = entry
            .get("confirmation_status")
            .or_else(|| entry.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_ascii_lowercase();

        match confirmation.as_str() {
            "finalized" => return BundleStatus::Landed(LandedLevel::Finalized),
            "confirmed" => return BundleStatus::Landed(LandedLevel::Confirmed),
            _ => {}
        }
        if entry.get("landed").and_then(Value::as_bool) == Some(true) {
            return BundleStatus::Landed(LandedLevel::Confirmed);
        }

        let error = entry.get("error").or_else(|| entry.get("err"));
        if let Some(err) = error.filter(|e| is_error_value(e)) {
            return BundleStatus::Failed(err.to_string());
        }
        if confirmation == "failed" {
            return BundleStatus::Failed("relay reported status=failed".to_string());
        }

        if confirmation.is_empty() {
            BundleStatus::Unknown
        } else {
            BundleStatus::Pending
        }
    }
}

/// `{"Ok": null}` 是 Solana 的成功标记，不算错误
fn is_error_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Object(map) => !(map.len() == 1 && map.contains_key("Ok")),
        _ => true,
    }
}

/// 单个 bundle 的状态，附带原始 payload 用于日志
#[derive(Debug, Clone, PartialEq)]
pub struct BundleStatusReport {
    pub status: BundleStatus,
    pub raw: Value,
}

impl BundleStatusReport {
    /// 解析 getBundleStatuses 的 result
    ///
    /// 接受裸数组、单个对象和 `{context, value: [...]}` 三种形式。
    pub fn parse_result(result: &Value) -> Vec<Self> {
        let entries: Vec<Value> = match result {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get("value") {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Null) => Vec::new(),
                _ => vec![result.clone()],
            },
            other => vec![other.clone()],
        };

        entries
            .into_iter()
            .map(|raw| Self {
                status: BundleStatus::from_entry(&raw),
                raw,
            })
            .collect()
    }
}

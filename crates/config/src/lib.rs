use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 默认 Jito Block Engine 区域
pub const DEFAULT_JITO_URLS: [&str; 2] = [
    "https://frankfurt.mainnet.block-engine.jito.wtf",
    "https://amsterdam.mainnet.block-engine.jito.wtf",
];

/// 默认小费 0.002 SOL
pub const DEFAULT_TIP_LAMPORTS: u64 = 2_000_000;

/// 配置错误（启动前检查，不可恢复）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing env {0}")]
    Missing(&'static str),

    #[error("Invalid env {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// 不会出现在日志里的密钥字符串
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub solana: SolanaRpcConfig,
    pub jito: JitoConfig,
    pub wallet: WalletConfig,
    pub buy: BuyConfig,
    pub compute: ComputeBudgetConfig,
    pub tip: TipConfig,
    pub bundle: BundleSubmitConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaRpcConfig {
    pub rpc_url: String,
}

/// Jito 中继配置
#[derive(Debug, Clone, Deserialize)]
pub struct JitoConfig {
    /// Block Engine 基础 URL 列表（按尝试次数轮询）
    pub urls: Vec<String>,
    /// x-jito-auth 认证
    pub secret: SecretString,
    /// 两次中继调用之间的最小间隔 (ms)，全局共享
    pub min_interval_ms: u64,
    /// 429 退避起始值 (ms)
    pub backoff_base_ms: u64,
    /// 429 退避上限 (ms)
    pub backoff_cap_ms: u64,
    /// 每次 429 后的退避增长倍数
    pub backoff_factor: f64,
    /// HTTP 请求超时 (秒)
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// 第一笔交易（主买入）签名私钥，base58
    pub sniper1_secret: SecretString,
    /// 第二笔交易（附带小费）签名私钥，base58
    pub sniper2_secret: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyConfig {
    /// 目标代币 mint
    pub mint: String,
    /// 期望买到的代币数量（UI 单位）
    pub amount_out_ui: f64,
    /// 最多花费的 SOL
    pub max_sol: f64,
    /// 兼容旧配置保留，exact-out 买入不使用
    pub slippage_bps: Option<u32>,
    pub share_fee_bps: u64,
    pub share_fee_receiver: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeBudgetConfig {
    pub cu_limit: u32,
    /// 每 CU 价格 (micro-lamports)
    pub cu_price_micro_lamports: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TipConfig {
    pub lamports: u64,
    /// 固定小费账户，为空时从默认列表随机挑选
    pub account_override: Option<String>,
}

/// Bundle 提交/轮询配置
#[derive(Debug, Clone, Deserialize)]
pub struct BundleSubmitConfig {
    /// 总尝试次数
    pub retries: u32,
    /// 单次尝试的轮询超时 (秒)
    pub poll_timeout_secs: u64,
    /// 轮询间隔 (ms)，已保证不小于 jito.min_interval_ms
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub utc_offset_hours: i8,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // 加载 .env 文件
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意 key/value 来源构建配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let need = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        // Solana RPC
        let solana = SolanaRpcConfig {
            rpc_url: need("RPC_URL")?,
        };

        // Jito 中继
        let urls: Vec<String> = get("JITO_URLS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().trim_end_matches('/').to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_JITO_URLS.iter().map(|s| s.to_string()).collect());
        if urls.is_empty() {
            return Err(ConfigError::Missing("JITO_URLS"));
        }

        let min_interval_ms = parse_or(&get, "JITO_MIN_INTERVAL_MS", 800u64)?;
        let backoff_factor: f64 = parse_or(&get, "JITO_BACKOFF_FACTOR", 1.7)?;
        if !(backoff_factor >= 1.0) {
            return Err(ConfigError::Invalid {
                key: "JITO_BACKOFF_FACTOR",
                value: backoff_factor.to_string(),
                reason: "must be >= 1.0".to_string(),
            });
        }

        let backoff_base_ms = parse_or(&get, "JITO_BACKOFF_BASE_MS", 600u64)?;
        let backoff_cap_ms = parse_or(&get, "JITO_BACKOFF_CAP_MS", 3000u64)?;
        if backoff_base_ms > backoff_cap_ms {
            return Err(ConfigError::Invalid {
                key: "JITO_BACKOFF_BASE_MS",
                value: backoff_base_ms.to_string(),
                reason: format!("must be <= JITO_BACKOFF_CAP_MS ({})", backoff_cap_ms),
            });
        }

        let jito = JitoConfig {
            urls,
            secret: SecretString::new(need("JITO_SECRET")?),
            min_interval_ms,
            backoff_base_ms,
            backoff_cap_ms,
            backoff_factor,
            http_timeout_secs: parse_or(&get, "RELAY_HTTP_TIMEOUT_S", 30u64)?,
        };

        let wallet = WalletConfig {
            sniper1_secret: SecretString::new(need("SNIPER1_SECRET_KEY")?),
            sniper2_secret: SecretString::new(need("SNIPER2_SECRET_KEY")?),
        };

        let buy = BuyConfig {
            mint: need("MINT")?,
            amount_out_ui: parse_positive(&need, "AMOUNT_OUT_UI")?,
            max_sol: parse_positive(&need, "MAX_SOL")?,
            slippage_bps: parse_opt(&get, "SLIPPAGE_BPS")?,
            share_fee_bps: parse_or(&get, "SHARE_FEE_BPS", 0u64)?,
            share_fee_receiver: get("SHARE_FEE_RECEIVER"),
        };

        let compute = ComputeBudgetConfig {
            cu_limit: parse_or(&get, "CU_LIMIT", 600_000u32)?,
            cu_price_micro_lamports: parse_or(&get, "BUY_CU_PRICE_MICRO", 0u64)?,
        };

        let tip = TipConfig {
            lamports: parse_or(&get, "TIP_LAMPORTS", DEFAULT_TIP_LAMPORTS)?,
            account_override: get("TIP_ACCOUNT_OVERRIDE"),
        };

        // 轮询间隔不能小于中继最小调用间隔
        let poll_interval_ms: u64 = parse_or(&get, "POLL_INTERVAL_MS", 900u64)?;
        let bundle = BundleSubmitConfig {
            retries: parse_or(&get, "BUNDLE_RETRIES", 6u32)?,
            poll_timeout_secs: parse_or(&get, "POLL_TIMEOUT_S", 12u64)?,
            poll_interval_ms: poll_interval_ms.max(min_interval_ms),
        };

        let log = LogConfig {
            level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            utc_offset_hours: parse_or(&get, "LOG_UTC_OFFSET_HOURS", 0i8)?,
        };

        Ok(Self {
            solana,
            jito,
            wallet,
            buy,
            compute,
            tip,
            bundle,
            log,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, raw),
        None => Ok(default),
    }
}

fn parse_opt<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key).map(|raw| parse_value(key, raw)).transpose()
}

fn parse_positive<N>(need: &N, key: &'static str) -> Result<f64, ConfigError>
where
    N: Fn(&'static str) -> Result<String, ConfigError>,
{
    let value: f64 = parse_value(key, need(key)?)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be a positive number".to_string(),
        });
    }
    Ok(value)
}

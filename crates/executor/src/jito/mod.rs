//! Jito 中继模块
//!
//! 通过 Block Engine 以 bundle 形式原子提交交易
//!
//! ## 工作原理
//!
//! ```text
//! 普通交易:  钱包 → RPC → leader，多笔交易各自落地
//! Bundle:    钱包 → Block Engine → leader，整包全部执行或全部丢弃
//! ```
//!
//! ## 特点
//! - 所有端点共用一个节流器（中继限流按账户计算）
//! - 429 有界退避，超出后返回 `RateLimitExhausted`
//! - sendBundle 参数被拒时带 encoding 参数重试一次

mod client;
mod endpoints;
mod throttle;
mod transport;
mod types;

pub use client::{BundleRelay, RelayClient};
pub use endpoints::EndpointPool;
pub use throttle::{Backoff, BackoffPolicy, RelayThrottle};
pub use transport::{HttpTransport, RelayHttpResponse, RelayTransport};
pub use types::*;

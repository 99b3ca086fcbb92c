//! Solana 链访问模块
//!
//! - `client`: 上游 RPC（最新 blockhash、账户查询、租金豁免余额）
//! - `dex`: 由外部提供的 swap 操作（LaunchLab buy-exact-out）
//! - `types`: 常用地址、Jito 小费账户、密钥解析

pub mod client;
pub mod dex;
pub mod types;

pub use client::{ChainRpc, SolanaClient};
pub use dex::SwapOperation;
pub use dex::launchpad::{LaunchpadBuy, LaunchpadBuyParams, LaunchpadPoolState};
pub use types::*;

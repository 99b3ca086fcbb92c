//! Solana 类型定义

use anyhow::{anyhow, Context, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;

/// 常用 Solana 代币地址
pub mod known_tokens {
    use super::Pubkey;

    /// SOL (Wrapped SOL)
    pub const WSOL: &str = "So11111111111111111111111111111111111111112";

    pub fn wsol() -> Pubkey {
        spl_token::native_mint::id()
    }
}

/// Jito 小费账户 (mainnet)
pub mod jito_tip {
    /// 未配置 TIP_ACCOUNT_OVERRIDE 时的候选列表
    pub const TIP_ACCOUNTS: [&str; 6] = [
        "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
        "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
        "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
        "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
        "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
        "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    ];
}

/// 解析地址，错误信息带上字段名
pub fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("Invalid {} address: {}", field, value))
}

/// 从 base58 编码的 64 字节私钥恢复 Keypair
pub fn keypair_from_base58(field: &str, secret: &str) -> Result<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .with_context(|| format!("{} is not valid base58", field))?;
    Keypair::from_bytes(&bytes).map_err(|e| anyhow!("{} is not a valid keypair: {}", field, e))
}

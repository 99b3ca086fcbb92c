//! Solana RPC 客户端模块

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 上游链 RPC 能力
///
/// Bundle 构建和提交只依赖这三个调用，测试中可替换为内存实现。
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// 获取最新的 blockhash（交易新鲜度令牌）
    async fn latest_blockhash(&self) -> Result<Hash>;

    /// 获取账户信息，不存在时返回 `None`
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    /// 获取指定数据长度的租金豁免最小余额
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;
}

/// Solana RPC 客户端
pub struct SolanaClient {
    /// RPC 客户端
    rpc: Arc<RpcClient>,
    /// RPC URL
    rpc_url: String,
}

impl SolanaClient {
    /// 创建新的 Solana 客户端
    pub fn new(rpc_url: &str) -> Self {
        let rpc = RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed(),
        );

        info!("[Solana] 创建 RPC 客户端: {}", rpc_url);

        Self {
            rpc: Arc::new(rpc),
            rpc_url: rpc_url.to_string(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 检查连接状态
    pub async fn health_check(&self) -> bool {
        match self.rpc.get_health().await {
            Ok(_) => true,
            Err(e) => {
                warn!("[Solana] RPC 健康检查失败: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ChainRpc for SolanaClient {
    async fn latest_blockhash(&self) -> Result<Hash> {
        // processed 级别的 blockhash 最新，给 bundle 留出最长有效期
        let (blockhash, last_valid_height) = self.rpc
            .get_latest_blockhash_with_commitment(CommitmentConfig::processed())
            .await
            .context("getLatestBlockhash failed")?;
        debug!("[Solana] blockhash={} last_valid_block_height={}", blockhash, last_valid_height);
        Ok(blockhash)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let account = self.rpc
            .get_account_with_commitment(address, CommitmentConfig::processed())
            .await
            .with_context(|| format!("getAccountInfo {} failed", address))?
            .value;
        Ok(account)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        let lamports = self.rpc
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .context("getMinimumBalanceForRentExemption failed")?;
        Ok(lamports)
    }
}

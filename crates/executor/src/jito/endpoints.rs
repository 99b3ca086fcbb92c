//! 中继端点与小费账户选择

use rand::seq::SliceRandom;
use solana_sdk::pubkey::Pubkey;

use super::types::RelayEndpoint;
use crate::types::ExecutionError;

/// 端点池
///
/// 端点按尝试次数轮询，多个区域时相邻两次尝试一定落在不同区域。
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<RelayEndpoint>,
    tip_override: Option<Pubkey>,
    tip_accounts: Vec<Pubkey>,
}

impl EndpointPool {
    pub fn new(
        endpoints: Vec<RelayEndpoint>,
        tip_override: Option<Pubkey>,
        tip_accounts: Vec<Pubkey>,
    ) -> Result<Self, ExecutionError> {
        if endpoints.is_empty() {
            return Err(ExecutionError::NoEndpoints);
        }
        if tip_override.is_none() && tip_accounts.is_empty() {
            return Err(ExecutionError::NoTipAccount);
        }
        Ok(Self {
            endpoints,
            tip_override,
            tip_accounts,
        })
    }

    pub fn endpoints(&self) -> &[RelayEndpoint] {
        &self.endpoints
    }

    /// 第 `attempt` 次尝试使用的端点
    pub fn pick_endpoint(&self, attempt: u32) -> &RelayEndpoint {
        &self.endpoints[attempt as usize % self.endpoints.len()]
    }

    /// 小费账户：有固定配置时用固定的，否则从候选列表均匀随机
    pub fn pick_tip_account(&self) -> Pubkey {
        if let Some(account) = self.tip_override {
            return account;
        }
        // new() 保证了非空
        self.tip_accounts
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
    }
}

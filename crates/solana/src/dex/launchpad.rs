//! Raydium LaunchLab (launchpad) 交互模块
//!
//! 只实现 bundle 买入需要的部分：
//! - 池子账户解析
//! - PDA 推导
//! - buy_exact_out 指令

use anyhow::{anyhow, bail, Result};
use solana_sdk::{
    hash::hashv,
    instruction::{AccountMeta, Instruction},
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    system_program,
};
use std::str::FromStr;
use tracing::info;

use super::SwapOperation;
use crate::client::ChainRpc;
use crate::types::known_tokens;

/// LaunchLab mainnet program
pub const LAUNCHPAD_PROGRAM: &str = "LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj";
/// Token-2022 program
pub const TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// SPL Mint 账户中 decimals 的偏移
const MINT_DECIMALS_OFFSET: usize = 44;

pub fn launchpad_program() -> Pubkey {
    Pubkey::from_str(LAUNCHPAD_PROGRAM).unwrap()
}

pub fn token_2022_program() -> Pubkey {
    Pubkey::from_str(TOKEN_2022_PROGRAM).unwrap()
}

/// PDA 推导
pub mod pda {
    use super::*;

    pub fn pool_id(program: &Pubkey, mint_a: &Pubkey, mint_b: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"pool", mint_a.as_ref(), mint_b.as_ref()], program).0
    }

    pub fn authority(program: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"vault_auth_seed"], program).0
    }

    pub fn platform_vault(program: &Pubkey, platform: &Pubkey, mint_b: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[platform.as_ref(), mint_b.as_ref()], program).0
    }

    pub fn creator_vault(program: &Pubkey, creator: &Pubkey, mint_b: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[creator.as_ref(), mint_b.as_ref()], program).0
    }

    pub fn event_authority(program: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"__event_authority"], program).0
    }
}

/// LaunchLab 池子状态（只保留构造指令需要的字段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadPoolState {
    pub status: u8,
    pub mint_decimals_a: u8,
    pub config_id: Pubkey,
    pub platform_id: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub vault_a: Pubkey,
    pub vault_b: Pubkey,
    pub creator: Pubkey,
}

impl LaunchpadPoolState {
    // 账户布局:
    // 8 discriminator | epoch u64 | auth_bump, status, decimals_a, decimals_b, migrate_type (u8 x5)
    // | 10 x u64 (supply .. migrate_fee) | vesting 5 x u64
    // | global_config | platform_config | mint_a | mint_b | vault_a | vault_b | creator
    const STATUS_OFFSET: usize = 17;
    const DECIMALS_A_OFFSET: usize = 18;
    const CONFIG_OFFSET: usize = 141;
    pub const MIN_LEN: usize = Self::CONFIG_OFFSET + 7 * 32;

    /// 从账户数据解析池子
    pub fn from_account_data(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_LEN {
            return None;
        }

        let key = |index: usize| {
            let start = Self::CONFIG_OFFSET + index * 32;
            Pubkey::try_from(&data[start..start + 32]).ok()
        };

        Some(Self {
            status: data[Self::STATUS_OFFSET],
            mint_decimals_a: data[Self::DECIMALS_A_OFFSET],
            config_id: key(0)?,
            platform_id: key(1)?,
            mint_a: key(2)?,
            mint_b: key(3)?,
            vault_a: key(4)?,
            vault_b: key(5)?,
            creator: key(6)?,
        })
    }
}

/// 买入参数（来自配置）
#[derive(Debug, Clone)]
pub struct LaunchpadBuyParams {
    pub mint: Pubkey,
    pub amount_out_ui: f64,
    pub max_sol: f64,
    pub share_fee_rate: u64,
    pub share_fee_receiver: Option<Pubkey>,
}

/// 一次 buy_exact_out 操作的完整快照
#[derive(Debug, Clone)]
pub struct LaunchpadBuy {
    pub program: Pubkey,
    pub pool_id: Pubkey,
    pub pool: LaunchpadPoolState,
    pub mint_a_program: Pubkey,
    pub decimals: u8,
    pub amount_out: u64,
    pub max_amount_in: u64,
    pub share_fee_rate: u64,
    pub share_fee_receiver: Option<Pubkey>,
    pub authority: Pubkey,
    pub platform_vault: Pubkey,
    pub creator_vault: Pubkey,
}

impl LaunchpadBuy {
    /// 拉取池子和 mint 信息，换算数量
    pub async fn load(rpc: &dyn ChainRpc, params: &LaunchpadBuyParams) -> Result<Self> {
        let program = launchpad_program();
        let mint_b = known_tokens::wsol();
        let pool_id = pda::pool_id(&program, &params.mint, &mint_b);

        let pool_account = rpc
            .get_account(&pool_id)
            .await?
            .ok_or_else(|| anyhow!("LaunchLab pool not found: {}", pool_id))?;
        let pool = LaunchpadPoolState::from_account_data(&pool_account.data)
            .ok_or_else(|| anyhow!("LaunchLab pool {} has unexpected layout", pool_id))?;
        if pool.mint_a != params.mint || pool.mint_b != mint_b {
            bail!(
                "LaunchLab pool {} mints mismatch: {} / {}",
                pool_id,
                pool.mint_a,
                pool.mint_b
            );
        }

        let mint_account = rpc
            .get_account(&params.mint)
            .await?
            .ok_or_else(|| anyhow!("Mint not found: {}", params.mint))?;
        let decimals = *mint_account
            .data
            .get(MINT_DECIMALS_OFFSET)
            .ok_or_else(|| anyhow!("Mint {} account too short", params.mint))?;
        let mint_a_program = if mint_account.owner == token_2022_program() {
            token_2022_program()
        } else {
            spl_token::id()
        };

        let amount_out = ui_to_base_units(params.amount_out_ui, decimals).ok_or_else(|| {
            anyhow!("AMOUNT_OUT_UI {} overflows u64 at {} decimals", params.amount_out_ui, decimals)
        })?;
        let max_amount_in = scale_to_u64(params.max_sol, LAMPORTS_PER_SOL as f64)
            .ok_or_else(|| anyhow!("MAX_SOL {} overflows u64 lamports", params.max_sol))?;
        if amount_out == 0 || max_amount_in == 0 {
            bail!("amount_out={} max_amount_in={} must be non-zero", amount_out, max_amount_in);
        }

        let buy = Self {
            program,
            pool_id,
            authority: pda::authority(&program),
            platform_vault: pda::platform_vault(&program, &pool.platform_id, &mint_b),
            creator_vault: pda::creator_vault(&program, &pool.creator, &mint_b),
            pool,
            mint_a_program,
            decimals,
            amount_out,
            max_amount_in,
            share_fee_rate: params.share_fee_rate,
            share_fee_receiver: params.share_fee_receiver,
        };

        info!(
            "[LaunchLab] pool={} status={} decimals={} amount_out={} max_in={} lamports",
            buy.pool_id, buy.pool.status, buy.decimals, buy.amount_out, buy.max_amount_in
        );

        Ok(buy)
    }

    /// Anchor 指令 discriminator: sha256("global:buy_exact_out")[..8]
    pub fn discriminator() -> [u8; 8] {
        let hash = hashv(&[b"global:buy_exact_out".as_ref()]);
        let mut out = [0u8; 8];
        out.copy_from_slice(&hash.to_bytes()[..8]);
        out
    }

    /// buy_exact_out 指令
    pub fn buy_exact_out_instruction(
        &self,
        owner: &Pubkey,
        user_token_a: &Pubkey,
        user_token_b: &Pubkey,
    ) -> Instruction {
        let mut data = Vec::with_capacity(32);
        data.extend_from_slice(&Self::discriminator());
        data.extend_from_slice(&self.amount_out.to_le_bytes());
        data.extend_from_slice(&self.max_amount_in.to_le_bytes());
        data.extend_from_slice(&self.share_fee_rate.to_le_bytes());

        let mut accounts = vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new_readonly(self.authority, false),
            AccountMeta::new_readonly(self.pool.config_id, false),
            AccountMeta::new_readonly(self.pool.platform_id, false),
            AccountMeta::new(self.pool_id, false),
            AccountMeta::new(*user_token_a, false),
            AccountMeta::new(*user_token_b, false),
            AccountMeta::new(self.pool.vault_a, false),
            AccountMeta::new(self.pool.vault_b, false),
            AccountMeta::new_readonly(self.pool.mint_a, false),
            AccountMeta::new_readonly(self.pool.mint_b, false),
            AccountMeta::new_readonly(self.mint_a_program, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(pda::event_authority(&self.program), false),
            AccountMeta::new_readonly(self.program, false),
        ];
        if let Some(receiver) = self.share_fee_receiver {
            accounts.push(AccountMeta::new(receiver, false));
        }
        accounts.push(AccountMeta::new_readonly(system_program::id(), false));
        accounts.push(AccountMeta::new(self.platform_vault, false));
        accounts.push(AccountMeta::new(self.creator_vault, false));

        Instruction {
            program_id: self.program,
            accounts,
            data,
        }
    }
}

impl SwapOperation for LaunchpadBuy {
    fn output_mint(&self) -> Pubkey {
        self.pool.mint_a
    }

    fn output_token_program(&self) -> Pubkey {
        self.mint_a_program
    }

    fn max_input_lamports(&self) -> u64 {
        self.max_amount_in
    }

    fn swap_instruction(
        &self,
        owner: &Pubkey,
        output_account: &Pubkey,
        input_account: &Pubkey,
    ) -> Instruction {
        self.buy_exact_out_instruction(owner, output_account, input_account)
    }

    fn describe(&self) -> String {
        format!(
            "launchlab buy_exact_out pool={} out={} max_in={}",
            self.pool_id, self.amount_out, self.max_amount_in
        )
    }
}

/// UI 数量转最小单位（向下取整），超出 u64 时返回 `None`
pub fn ui_to_base_units(ui_amount: f64, decimals: u8) -> Option<u64> {
    scale_to_u64(ui_amount, 10f64.powi(decimals as i32))
}

fn scale_to_u64(amount: f64, scale: f64) -> Option<u64> {
    let scaled = (amount * scale).floor();
    // u64::MAX as f64 == 2^64，已经越界
    (scaled.is_finite() && scaled >= 0.0 && scaled < u64::MAX as f64).then_some(scaled as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solana_sdk::{account::Account, hash::Hash};
    use std::collections::HashMap;

    struct StaticRpc {
        accounts: HashMap<Pubkey, Account>,
    }

    #[async_trait]
    impl ChainRpc for StaticRpc {
        async fn latest_blockhash(&self) -> Result<Hash> {
            Ok(Hash::new_unique())
        }

        async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
            Ok(self.accounts.get(address).cloned())
        }

        async fn minimum_balance_for_rent_exemption(&self, _data_len: usize) -> Result<u64> {
            Ok(2_039_280)
        }
    }

    fn pool_data(state: &LaunchpadPoolState) -> Vec<u8> {
        let mut data = vec![0u8; LaunchpadPoolState::MIN_LEN + 64];
        data[17] = state.status;
        data[18] = state.mint_decimals_a;
        let keys = [
            state.config_id,
            state.platform_id,
            state.mint_a,
            state.mint_b,
            state.vault_a,
            state.vault_b,
            state.creator,
        ];
        for (i, key) in keys.iter().enumerate() {
            let start = 141 + i * 32;
            data[start..start + 32].copy_from_slice(key.as_ref());
        }
        data
    }

    fn sample_state(mint: Pubkey) -> LaunchpadPoolState {
        LaunchpadPoolState {
            status: 0,
            mint_decimals_a: 6,
            config_id: Pubkey::new_unique(),
            platform_id: Pubkey::new_unique(),
            mint_a: mint,
            mint_b: known_tokens::wsol(),
            vault_a: Pubkey::new_unique(),
            vault_b: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
        }
    }

    fn mint_account(decimals: u8, owner: Pubkey) -> Account {
        let mut data = vec![0u8; 82];
        data[MINT_DECIMALS_OFFSET] = decimals;
        Account {
            lamports: 1_461_600,
            data,
            owner,
            executable: false,
            rent_epoch: 0,
        }
    }

    fn rpc_with_pool(mint: Pubkey, state: &LaunchpadPoolState, mint_owner: Pubkey) -> StaticRpc {
        let pool_id = pda::pool_id(&launchpad_program(), &mint, &known_tokens::wsol());
        let mut accounts = HashMap::new();
        accounts.insert(
            pool_id,
            Account {
                lamports: 1,
                data: pool_data(state),
                owner: launchpad_program(),
                executable: false,
                rent_epoch: 0,
            },
        );
        accounts.insert(mint, mint_account(6, mint_owner));
        StaticRpc { accounts }
    }

    fn params(mint: Pubkey) -> LaunchpadBuyParams {
        LaunchpadBuyParams {
            mint,
            amount_out_ui: 1234.5,
            max_sol: 0.25,
            share_fee_rate: 0,
            share_fee_receiver: None,
        }
    }

    #[test]
    fn test_pool_state_roundtrip_offsets() {
        let state = sample_state(Pubkey::new_unique());
        let decoded = LaunchpadPoolState::from_account_data(&pool_data(&state)).unwrap();
        assert_eq!(decoded, state);
        assert!(LaunchpadPoolState::from_account_data(&[0u8; 100]).is_none());
    }

    #[test]
    fn test_ui_to_base_units() {
        assert_eq!(ui_to_base_units(1234.5, 6), Some(1_234_500_000));
        assert_eq!(ui_to_base_units(0.25, 9), Some(250_000_000));
        assert_eq!(ui_to_base_units(0.0000001, 6), Some(0));
        assert_eq!(ui_to_base_units(2e10, 9), None);
        assert_eq!(ui_to_base_units(f64::INFINITY, 0), None);
    }

    #[tokio::test]
    async fn test_load_rejects_amounts_beyond_u64() {
        let mint = Pubkey::new_unique();
        let state = sample_state(mint);
        let rpc = rpc_with_pool(mint, &state, spl_token::id());

        let huge_sol = LaunchpadBuyParams {
            max_sol: 2e10,
            ..params(mint)
        };
        let err = LaunchpadBuy::load(&rpc, &huge_sol).await.unwrap_err();
        assert!(err.to_string().contains("MAX_SOL"));

        let huge_out = LaunchpadBuyParams {
            amount_out_ui: 1e20,
            ..params(mint)
        };
        let err = LaunchpadBuy::load(&rpc, &huge_out).await.unwrap_err();
        assert!(err.to_string().contains("AMOUNT_OUT_UI"));
    }

    #[tokio::test]
    async fn test_load_resolves_amounts_and_vaults() {
        let mint = Pubkey::new_unique();
        let state = sample_state(mint);
        let rpc = rpc_with_pool(mint, &state, spl_token::id());

        let buy = LaunchpadBuy::load(&rpc, &params(mint)).await.unwrap();
        assert_eq!(buy.amount_out, 1_234_500_000);
        assert_eq!(buy.max_amount_in, 250_000_000);
        assert_eq!(buy.mint_a_program, spl_token::id());
        assert_eq!(
            buy.platform_vault,
            pda::platform_vault(&launchpad_program(), &state.platform_id, &known_tokens::wsol())
        );
        assert_eq!(buy.output_mint(), mint);
    }

    #[tokio::test]
    async fn test_load_detects_token_2022() {
        let mint = Pubkey::new_unique();
        let state = sample_state(mint);
        let rpc = rpc_with_pool(mint, &state, token_2022_program());

        let buy = LaunchpadBuy::load(&rpc, &params(mint)).await.unwrap();
        assert_eq!(buy.output_token_program(), token_2022_program());
    }

    #[tokio::test]
    async fn test_load_missing_pool_names_pool() {
        let mint = Pubkey::new_unique();
        let rpc = StaticRpc { accounts: HashMap::new() };
        let pool_id = pda::pool_id(&launchpad_program(), &mint, &known_tokens::wsol());

        let err = LaunchpadBuy::load(&rpc, &params(mint)).await.unwrap_err();
        assert!(err.to_string().contains(&pool_id.to_string()));
    }

    #[tokio::test]
    async fn test_instruction_layout() {
        let mint = Pubkey::new_unique();
        let state = sample_state(mint);
        let rpc = rpc_with_pool(mint, &state, spl_token::id());
        let mut buy = LaunchpadBuy::load(&rpc, &params(mint)).await.unwrap();

        let owner = Pubkey::new_unique();
        let ix = buy.swap_instruction(&owner, &Pubkey::new_unique(), &Pubkey::new_unique());
        assert_eq!(ix.program_id, launchpad_program());
        assert_eq!(ix.data.len(), 32);
        assert_eq!(&ix.data[..8], &LaunchpadBuy::discriminator());
        assert_eq!(&ix.data[8..16], &1_234_500_000u64.to_le_bytes());
        assert_eq!(ix.accounts[0].pubkey, owner);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts.len(), 18);

        buy.share_fee_receiver = Some(Pubkey::new_unique());
        let ix = buy.swap_instruction(&owner, &Pubkey::new_unique(), &Pubkey::new_unique());
        assert_eq!(ix.accounts.len(), 19);
        assert_eq!(ix.accounts.last().unwrap().pubkey, buy.creator_vault);
    }
}

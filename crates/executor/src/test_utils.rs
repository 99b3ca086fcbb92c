//! 测试用的内存实现

use async_trait::async_trait;
use solana_chain::{ChainRpc, SwapOperation};
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// 调用顺序记录，多个 fake 共享
pub type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct MemoryRpc {
    accounts: Mutex<HashSet<Pubkey>>,
    /// 每次 latest_blockhash 依次弹出，`false` 表示这次调用失败
    blockhash_script: Mutex<VecDeque<bool>>,
    pub events: EventLog,
}

impl MemoryRpc {
    pub fn with_events(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn insert_account(&self, address: Pubkey) {
        self.accounts.lock().unwrap().insert(address);
    }

    pub fn fail_next_blockhash(&self) {
        self.blockhash_script.lock().unwrap().push_back(false);
    }
}

#[async_trait]
impl ChainRpc for MemoryRpc {
    async fn latest_blockhash(&self) -> anyhow::Result<Hash> {
        let ok = self.blockhash_script.lock().unwrap().pop_front().unwrap_or(true);
        if !ok {
            self.events.lock().unwrap().push("blockhash_err".to_string());
            anyhow::bail!("rpc unavailable");
        }
        let hash = Hash::new_unique();
        self.events.lock().unwrap().push(format!("blockhash:{}", hash));
        Ok(hash)
    }

    async fn get_account(&self, address: &Pubkey) -> anyhow::Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .contains(address)
            .then(Account::default))
    }

    async fn minimum_balance_for_rent_exemption(&self, _data_len: usize) -> anyhow::Result<u64> {
        Ok(2_039_280)
    }
}

/// 固定参数的 swap 操作
pub struct StubSwap {
    pub program: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub max_input: u64,
}

impl StubSwap {
    pub fn new() -> Self {
        Self {
            program: Pubkey::new_unique(),
            pool: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            max_input: 50_000_000,
        }
    }
}

impl SwapOperation for StubSwap {
    fn output_mint(&self) -> Pubkey {
        self.mint
    }

    fn output_token_program(&self) -> Pubkey {
        spl_token::id()
    }

    fn max_input_lamports(&self) -> u64 {
        self.max_input
    }

    fn swap_instruction(&self, owner: &Pubkey, output_account: &Pubkey, input_account: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program,
            accounts: vec![
                AccountMeta::new(*owner, true),
                AccountMeta::new(*output_account, false),
                AccountMeta::new(*input_account, false),
                AccountMeta::new(self.pool, false),
            ],
            data: vec![9],
        }
    }

    fn describe(&self) -> String {
        format!("stub swap pool={}", self.pool)
    }
}

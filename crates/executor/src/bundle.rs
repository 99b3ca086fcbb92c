//! Bundle 构建器
//!
//! 把同一个 swap 操作打包成两笔有序交易：
//! 1. 主买入
//! 2. 买入 + 给 Jito 小费账户转账
//!
//! 两笔交易只构建一次，之后每次尝试只换 blockhash 并完整重签。

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use solana_chain::{known_tokens, ChainRpc, SwapOperation};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::Message,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use spl_token::solana_program::program_pack::Pack;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::ExecutionError;

/// Bundle 中的交易角色，顺序固定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// 第一笔：主买入
    PrimaryBuyer,
    /// 第二笔：买入并支付小费
    TipPayingBuyer,
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRole::PrimaryBuyer => write!(f, "primary"),
            SlotRole::TipPayingBuyer => write!(f, "tip_payer"),
        }
    }
}

/// 小费转账
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipTransfer {
    pub account: Pubkey,
    pub lamports: u64,
}

/// Bundle 中的一笔交易
pub struct TransactionSlot {
    role: SlotRole,
    fee_payer: Pubkey,
    output_account: Pubkey,
    temp_input_account: Pubkey,
    instructions: Vec<Instruction>,
    /// 付款钱包 + 临时 WSOL 账户
    signers: Vec<Arc<Keypair>>,
    transaction: Transaction,
}

impl TransactionSlot {
    pub fn role(&self) -> SlotRole {
        self.role
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer
    }

    /// 接收输出代币的账户
    pub fn output_account(&self) -> Pubkey {
        self.output_account
    }

    /// 临时 WSOL 账户
    pub fn temp_input_account(&self) -> Pubkey {
        self.temp_input_account
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signer_pubkeys(&self) -> Vec<Pubkey> {
        self.signers.iter().map(|k| k.pubkey()).collect()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// 用新的 blockhash 完整重签并序列化为 base64
    fn sign(&mut self, blockhash: Hash) -> Result<(Signature, String), ExecutionError> {
        let keypairs: Vec<&Keypair> = self.signers.iter().map(|k| k.as_ref()).collect();
        self.transaction
            .try_sign(&keypairs[..], blockhash)
            .map_err(|e| ExecutionError::Build(format!("{} sign failed: {}", self.role, e)))?;

        let bytes = bincode::serialize(&self.transaction)
            .map_err(|e| ExecutionError::Build(format!("{} serialize failed: {}", self.role, e)))?;
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(ExecutionError::Build(format!(
                "{} transaction is {} bytes (max {})",
                self.role,
                bytes.len(),
                PACKET_DATA_SIZE
            )));
        }

        Ok((self.transaction.signatures[0], BASE64_STANDARD.encode(bytes)))
    }
}

/// 一次尝试的已签名载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBundle {
    pub blockhash: Hash,
    /// base64 编码的交易，顺序与 slot 一致
    pub transactions: Vec<String>,
    pub signatures: Vec<Signature>,
}

/// 两笔交易组成的原子 bundle
pub struct Bundle {
    slots: [TransactionSlot; 2],
    operation: String,
}

impl Bundle {
    pub fn primary(&self) -> &TransactionSlot {
        &self.slots[0]
    }

    pub fn tip_payer(&self) -> &TransactionSlot {
        &self.slots[1]
    }

    pub fn slots(&self) -> &[TransactionSlot; 2] {
        &self.slots
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// 两笔交易换上同一个 blockhash 后重新签名
    pub fn refresh(&mut self, blockhash: Hash) -> Result<SignedBundle, ExecutionError> {
        let mut transactions = Vec::with_capacity(self.slots.len());
        let mut signatures = Vec::with_capacity(self.slots.len());

        for slot in self.slots.iter_mut() {
            let (signature, encoded) = slot.sign(blockhash)?;
            debug!(target: "bundle_submit", "[{}] signed {} blockhash={}", slot.role, signature, blockhash);
            signatures.push(signature);
            transactions.push(encoded);
        }

        Ok(SignedBundle {
            blockhash,
            transactions,
            signatures,
        })
    }
}

/// Bundle 构建器
pub struct BundleBuilder<'a> {
    rpc: &'a dyn ChainRpc,
    cu_limit: u32,
    cu_price_micro_lamports: u64,
    tip: Option<TipTransfer>,
}

impl<'a> BundleBuilder<'a> {
    /// 创建新的 Bundle 构建器
    pub fn new(rpc: &'a dyn ChainRpc) -> Self {
        Self {
            rpc,
            cu_limit: 600_000,
            cu_price_micro_lamports: 0,
            tip: None,
        }
    }

    /// 设置计算预算（两笔交易相同）
    pub fn compute_budget(mut self, cu_limit: u32, cu_price_micro_lamports: u64) -> Self {
        self.cu_limit = cu_limit;
        self.cu_price_micro_lamports = cu_price_micro_lamports;
        self
    }

    /// 设置小费（只加在第二笔交易）
    pub fn tip(mut self, account: Pubkey, lamports: u64) -> Self {
        self.tip = Some(TipTransfer { account, lamports });
        self
    }

    /// 确保接收代币的 ATA 存在
    ///
    /// 已存在时不返回指令；不存在时返回幂等创建指令，链上已被别人
    /// 创建也不会失败。
    pub async fn ensure_token_account(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        token_program: &Pubkey,
        payer: &Pubkey,
    ) -> Result<(Pubkey, Option<Instruction>), ExecutionError> {
        let ata = get_associated_token_address_with_program_id(owner, mint, token_program);
        let existing = self.rpc
            .get_account(&ata)
            .await
            .map_err(|e| ExecutionError::Chain(format!("{:#}", e)))?;

        if existing.is_some() {
            debug!("ATA {} already exists", ata);
            return Ok((ata, None));
        }

        let ix = create_associated_token_account_idempotent(payer, owner, mint, token_program);
        Ok((ata, Some(ix)))
    }

    /// 创建并初始化临时 WSOL 账户，余额 = 租金 + 最大输入
    async fn temp_wsol_account(
        &self,
        payer: &Pubkey,
        lamports: u64,
    ) -> Result<(Keypair, Vec<Instruction>), ExecutionError> {
        let account = Keypair::new();
        let space = spl_token::state::Account::LEN;
        let rent = self.rpc
            .minimum_balance_for_rent_exemption(space)
            .await
            .map_err(|e| ExecutionError::Chain(format!("{:#}", e)))?;
        let funding = rent.checked_add(lamports).ok_or_else(|| {
            ExecutionError::Build(format!("WSOL funding overflows: rent {} + max input {}", rent, lamports))
        })?;

        let create = system_instruction::create_account(
            payer,
            &account.pubkey(),
            funding,
            space as u64,
            &spl_token::id(),
        );
        let init = spl_token::instruction::initialize_account(
            &spl_token::id(),
            &account.pubkey(),
            &known_tokens::wsol(),
            payer,
        )
        .map_err(|e| ExecutionError::Build(e.to_string()))?;

        Ok((account, vec![create, init]))
    }

    async fn build_slot(
        &self,
        role: SlotRole,
        owner: Arc<Keypair>,
        operation: &dyn SwapOperation,
    ) -> Result<TransactionSlot, ExecutionError> {
        let payer = owner.pubkey();

        let mut instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.cu_limit),
            ComputeBudgetInstruction::set_compute_unit_price(self.cu_price_micro_lamports),
        ];

        let (output_account, create_ata) = self
            .ensure_token_account(
                &payer,
                &operation.output_mint(),
                &operation.output_token_program(),
                &payer,
            )
            .await?;
        instructions.extend(create_ata);

        let (temp_account, wsol_init) = self
            .temp_wsol_account(&payer, operation.max_input_lamports())
            .await?;
        let temp_pubkey = temp_account.pubkey();
        instructions.extend(wsol_init);

        instructions.push(operation.swap_instruction(&payer, &output_account, &temp_pubkey));

        if role == SlotRole::TipPayingBuyer {
            let tip = self.tip.ok_or(ExecutionError::NoTipAccount)?;
            instructions.push(system_instruction::transfer(&payer, &tip.account, tip.lamports));
        }

        // 关闭临时账户，剩余 SOL 退回
        let close = spl_token::instruction::close_account(
            &spl_token::id(),
            &temp_pubkey,
            &payer,
            &payer,
            &[],
        )
        .map_err(|e| ExecutionError::Build(e.to_string()))?;
        instructions.push(close);

        let transaction = Transaction::new_unsigned(Message::new(&instructions, Some(&payer)));

        Ok(TransactionSlot {
            role,
            fee_payer: payer,
            output_account,
            temp_input_account: temp_pubkey,
            instructions,
            signers: vec![owner, Arc::new(temp_account)],
            transaction,
        })
    }

    /// 构建两笔交易
    ///
    /// 两笔交易使用同一个 `operation`，之后不会单独重建。
    pub async fn build(
        &self,
        operation: &dyn SwapOperation,
        primary: Arc<Keypair>,
        tip_payer: Arc<Keypair>,
    ) -> Result<Bundle, ExecutionError> {
        let tip = self.tip.ok_or(ExecutionError::NoTipAccount)?;

        let first = self.build_slot(SlotRole::PrimaryBuyer, primary, operation).await?;
        let second = self.build_slot(SlotRole::TipPayingBuyer, tip_payer, operation).await?;

        info!(
            target: "bundle_submit",
            "Bundle 已构建: {} | primary={} tip_payer={} tip={} ({} lamports)",
            operation.describe(),
            first.fee_payer,
            second.fee_payer,
            tip.account,
            tip.lamports
        );

        Ok(Bundle {
            slots: [first, second],
            operation: operation.describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryRpc, StubSwap};
    use solana_sdk::{compute_budget, system_program};

    const TIP_LAMPORTS: u64 = 2_000_000;

    async fn build_bundle(rpc: &MemoryRpc, swap: &StubSwap, tip: Pubkey) -> Bundle {
        BundleBuilder::new(rpc)
            .compute_budget(400_000, 5_000)
            .tip(tip, TIP_LAMPORTS)
            .build(swap, Arc::new(Keypair::new()), Arc::new(Keypair::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_token_account_idempotent() {
        let rpc = MemoryRpc::default();
        let builder = BundleBuilder::new(&rpc);
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let (first, ix1) = builder
            .ensure_token_account(&owner, &mint, &spl_token::id(), &owner)
            .await
            .unwrap();
        let (second, ix2) = builder
            .ensure_token_account(&owner, &mint, &spl_token::id(), &owner)
            .await
            .unwrap();

        assert_eq!(first, second);
        // 幂等创建指令的 data 为 [1]
        assert_eq!(ix1.unwrap().data, vec![1]);
        assert_eq!(ix2.unwrap().data, vec![1]);

        rpc.insert_account(first);
        let (third, ix3) = builder
            .ensure_token_account(&owner, &mint, &spl_token::id(), &owner)
            .await
            .unwrap();
        assert_eq!(third, first);
        assert!(ix3.is_none());
    }

    #[tokio::test]
    async fn test_slot_layout() {
        let rpc = MemoryRpc::default();
        let swap = StubSwap::new();
        let tip = Pubkey::new_unique();
        let bundle = build_bundle(&rpc, &swap, tip).await;

        for slot in bundle.slots() {
            let ixs = slot.instructions();
            assert_eq!(ixs[0].program_id, compute_budget::id());
            assert_eq!(ixs[1].program_id, compute_budget::id());
            assert_eq!(ixs[0], ComputeBudgetInstruction::set_compute_unit_limit(400_000));
            assert_eq!(ixs[1], ComputeBudgetInstruction::set_compute_unit_price(5_000));
            assert_eq!(ixs.last().unwrap().program_id, spl_token::id());
            assert_eq!(slot.signer_pubkeys(), vec![slot.fee_payer(), slot.temp_input_account()]);
            assert_eq!(slot.transaction().message.account_keys[0], slot.fee_payer());
        }

        let transfers_to_tip = |slot: &TransactionSlot| {
            slot.instructions()
                .iter()
                .filter(|ix| ix.program_id == system_program::id())
                .filter(|ix| ix.accounts.iter().any(|meta| meta.pubkey == tip))
                .count()
        };
        assert_eq!(bundle.primary().role(), SlotRole::PrimaryBuyer);
        assert_eq!(transfers_to_tip(bundle.primary()), 0);
        assert_eq!(bundle.tip_payer().role(), SlotRole::TipPayingBuyer);
        assert_eq!(transfers_to_tip(bundle.tip_payer()), 1);

        // 小费转账在 swap 之后、关闭临时账户之前
        let ixs = bundle.tip_payer().instructions();
        let n = ixs.len();
        assert_eq!(ixs[n - 2], system_instruction::transfer(&bundle.tip_payer().fee_payer(), &tip, TIP_LAMPORTS));
        assert_eq!(ixs[n - 3].program_id, swap.program);
    }

    #[tokio::test]
    async fn test_both_slots_target_same_operation() {
        let rpc = MemoryRpc::default();
        let swap = StubSwap::new();
        let bundle = build_bundle(&rpc, &swap, Pubkey::new_unique()).await;

        for slot in bundle.slots() {
            let swap_ix = slot
                .instructions()
                .iter()
                .find(|ix| ix.program_id == swap.program)
                .unwrap();
            assert!(swap_ix.accounts.iter().any(|meta| meta.pubkey == swap.pool));
            assert_eq!(swap_ix.accounts[1].pubkey, slot.output_account());
            assert_eq!(swap_ix.accounts[2].pubkey, slot.temp_input_account());
        }
        assert_ne!(bundle.primary().fee_payer(), bundle.tip_payer().fee_payer());
    }

    #[tokio::test]
    async fn test_refresh_resigns_with_shared_blockhash() {
        let rpc = MemoryRpc::default();
        let swap = StubSwap::new();
        let mut bundle = build_bundle(&rpc, &swap, Pubkey::new_unique()).await;

        let first_hash = Hash::new_unique();
        let first = bundle.refresh(first_hash).unwrap();
        assert_eq!(first.transactions.len(), 2);
        for slot in bundle.slots() {
            assert_eq!(slot.transaction().message.recent_blockhash, first_hash);
            assert!(slot.transaction().verify().is_ok());
        }

        let decoded: Transaction =
            bincode::deserialize(&BASE64_STANDARD.decode(&first.transactions[1]).unwrap()).unwrap();
        assert_eq!(decoded.message.recent_blockhash, first_hash);
        assert_eq!(decoded.signatures[0], first.signatures[1]);

        let second_hash = Hash::new_unique();
        let second = bundle.refresh(second_hash).unwrap();
        assert_eq!(second.blockhash, second_hash);
        assert_ne!(first.signatures, second.signatures);
        assert_ne!(first.transactions, second.transactions);
        for slot in bundle.slots() {
            assert_eq!(slot.transaction().message.recent_blockhash, second_hash);
            assert!(slot.transaction().verify().is_ok());
        }
    }

    #[tokio::test]
    async fn test_oversized_max_input_is_build_error() {
        let rpc = MemoryRpc::default();
        let swap = StubSwap {
            max_input: u64::MAX - 1_000,
            ..StubSwap::new()
        };
        let result = BundleBuilder::new(&rpc)
            .tip(Pubkey::new_unique(), TIP_LAMPORTS)
            .build(&swap, Arc::new(Keypair::new()), Arc::new(Keypair::new()))
            .await;
        assert!(matches!(result, Err(ExecutionError::Build(ref msg)) if msg.contains("overflows")));
    }

    #[tokio::test]
    async fn test_build_without_tip_rejected() {
        let rpc = MemoryRpc::default();
        let swap = StubSwap::new();
        let result = BundleBuilder::new(&rpc)
            .build(&swap, Arc::new(Keypair::new()), Arc::new(Keypair::new()))
            .await;
        assert!(matches!(result, Err(ExecutionError::NoTipAccount)));
    }
}

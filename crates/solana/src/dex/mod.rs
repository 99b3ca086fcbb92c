//! DEX 操作模块
//!
//! Bundle 构建器只通过 `SwapOperation` 使用具体的 swap 指令，
//! 指令布局、池子地址推导和数量换算都留在各 DEX 适配器里。

pub mod launchpad;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

/// 一次已经定好参数的 swap 操作（池子快照、输出数量、最大输入）
///
/// 同一个 bundle 的两笔交易共享同一个实例，保证两条腿指向同一个经济操作。
pub trait SwapOperation: Send + Sync {
    /// 买入得到的代币 mint
    fn output_mint(&self) -> Pubkey;

    /// 输出代币所属的 token program (Token / Token-2022)
    fn output_token_program(&self) -> Pubkey;

    /// 最多支付的 lamports，用于给临时 WSOL 账户充值
    fn max_input_lamports(&self) -> u64;

    /// 构造 swap 指令
    ///
    /// - `owner`: 付款并签名的钱包
    /// - `output_account`: 接收输出代币的账户
    /// - `input_account`: 提供 WSOL 的临时账户
    fn swap_instruction(
        &self,
        owner: &Pubkey,
        output_account: &Pubkey,
        input_account: &Pubkey,
    ) -> Instruction;

    /// 日志用的简短描述
    fn describe(&self) -> String;
}

//! Bundle 执行器模块
//!
//! 负责把两笔买入交易打包成 Jito bundle 并提交到上链
//!
//! ## 模块结构
//!
//! - `jito`: Jito Block Engine 中继客户端（节流、429 退避、端点轮换）
//! - `bundle`: 两笔交易的构建与每次尝试的重签
//! - `orchestrator`: 提交、轮询、重试的状态机
//! - `types`: 类型定义

pub mod jito;
pub mod bundle;
pub mod orchestrator;
mod types;

#[cfg(test)]
mod test_utils;

pub use types::{ExecutionError, LandedBundle};
pub use jito::{
    BackoffPolicy, BundleRelay, BundleStatus, EndpointPool, RelayClient, RelayEndpoint,
    RelayError,
};
pub use bundle::{Bundle, BundleBuilder, SignedBundle, SlotRole, TransactionSlot};
pub use orchestrator::{SubmissionConfig, SubmissionOrchestrator, SubmissionState};

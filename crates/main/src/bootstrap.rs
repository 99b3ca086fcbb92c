//! 应用启动引导模块
//!
//! 封装密钥解析、依赖组装和一次完整的 bundle 提交

use anyhow::{Context, Result};
use config_crate::AppConfig;
use executor::{
    BackoffPolicy, BundleBuilder, BundleRelay, EndpointPool, RelayClient, RelayEndpoint,
    SubmissionConfig, SubmissionOrchestrator,
};
use solana_chain::{
    jito_tip, keypair_from_base58, parse_pubkey, LaunchpadBuy, LaunchpadBuyParams, SolanaClient,
};
use solana_sdk::{
    native_token::lamports_to_sol,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 应用程序实例
pub struct Application {
    config: AppConfig,
    rpc: Arc<SolanaClient>,
    /// 第一笔交易签名者
    primary: Arc<Keypair>,
    /// 第二笔交易签名者（支付小费）
    tip_payer: Arc<Keypair>,
    mint: Pubkey,
    share_fee_receiver: Option<Pubkey>,
    endpoints: EndpointPool,
    /// 整次运行固定使用的小费账户
    tip_account: Pubkey,
}

impl Application {
    /// 解析密钥和地址，组装依赖
    pub fn new(config: AppConfig) -> Result<Self> {
        let primary = keypair_from_base58("SNIPER1_SECRET_KEY", config.wallet.sniper1_secret.expose())?;
        let tip_payer = keypair_from_base58("SNIPER2_SECRET_KEY", config.wallet.sniper2_secret.expose())?;
        let mint = parse_pubkey("MINT", &config.buy.mint)?;
        let share_fee_receiver = config
            .buy
            .share_fee_receiver
            .as_deref()
            .map(|value| parse_pubkey("SHARE_FEE_RECEIVER", value))
            .transpose()?;

        let tip_override = config
            .tip
            .account_override
            .as_deref()
            .map(|value| parse_pubkey("TIP_ACCOUNT_OVERRIDE", value))
            .transpose()?;
        let tip_accounts = jito_tip::TIP_ACCOUNTS
            .iter()
            .map(|value| parse_pubkey("TIP_ACCOUNTS", value))
            .collect::<Result<Vec<_>>>()?;

        let endpoints = config
            .jito
            .urls
            .iter()
            .map(|url| RelayEndpoint::new(url.clone(), config.jito.secret.clone()))
            .collect();
        let endpoints = EndpointPool::new(endpoints, tip_override, tip_accounts)?;
        let tip_account = endpoints.pick_tip_account();

        let rpc = Arc::new(SolanaClient::new(&config.solana.rpc_url));

        let app = Self {
            config,
            rpc,
            primary: Arc::new(primary),
            tip_payer: Arc::new(tip_payer),
            mint,
            share_fee_receiver,
            endpoints,
            tip_account,
        };
        app.log_config();
        Ok(app)
    }

    /// 构建 bundle 并提交到上链或次数用尽
    pub async fn run(self) -> Result<()> {
        if !self.rpc.health_check().await {
            warn!("⚠️ RPC 健康检查失败，继续尝试: {}", self.rpc.rpc_url());
        }

        let params = LaunchpadBuyParams {
            mint: self.mint,
            amount_out_ui: self.config.buy.amount_out_ui,
            max_sol: self.config.buy.max_sol,
            share_fee_rate: self.config.buy.share_fee_bps,
            share_fee_receiver: self.share_fee_receiver,
        };
        let operation = LaunchpadBuy::load(self.rpc.as_ref(), &params)
            .await
            .context("Failed to load LaunchLab buy operation")?;

        let mut bundle = BundleBuilder::new(self.rpc.as_ref())
            .compute_budget(
                self.config.compute.cu_limit,
                self.config.compute.cu_price_micro_lamports,
            )
            .tip(self.tip_account, self.config.tip.lamports)
            .build(&operation, self.primary.clone(), self.tip_payer.clone())
            .await?;

        let jito = &self.config.jito;
        let backoff = BackoffPolicy {
            base: Duration::from_millis(jito.backoff_base_ms),
            cap: Duration::from_millis(jito.backoff_cap_ms),
            factor: jito.backoff_factor,
            ..Default::default()
        };
        let relay: Arc<dyn BundleRelay> = Arc::new(RelayClient::with_http(
            Duration::from_millis(jito.min_interval_ms),
            backoff,
            Duration::from_secs(jito.http_timeout_secs),
        )?);

        let orchestrator = SubmissionOrchestrator::new(
            relay,
            self.rpc.clone(),
            self.endpoints,
            SubmissionConfig::from(&self.config.bundle),
        );

        let landed = orchestrator.run(&mut bundle).await?;

        info!("========================================");
        info!("  ✅ Bundle 已上链");
        info!("  bundle_id: {}", landed.bundle_id);
        info!("  状态: {:?}", landed.status);
        info!("  第 {} 次尝试, 端点: {}", landed.attempt, landed.endpoint);
        for slot in bundle.slots() {
            info!("  [{}] {}", slot.role(), slot.transaction().signatures[0]);
        }
        info!("========================================");
        Ok(())
    }

    fn log_config(&self) {
        info!("配置加载成功");
        info!("========================================");
        info!("RPC: {}", self.config.solana.rpc_url);
        for endpoint in self.endpoints.endpoints() {
            info!("Jito: {}", endpoint.base_url);
        }
        info!("Mint: {}", self.mint);
        info!(
            "买入: {} 个代币, 最多 {} SOL",
            self.config.buy.amount_out_ui, self.config.buy.max_sol
        );
        if let Some(bps) = self.config.buy.slippage_bps {
            info!("滑点: {} bps (exact-out 买入, 由最大输入兜底)", bps);
        }
        info!("主买入钱包: {}", self.primary.pubkey());
        info!("小费钱包: {}", self.tip_payer.pubkey());
        info!(
            "小费: {} ({} lamports = {} SOL)",
            self.tip_account,
            self.config.tip.lamports,
            lamports_to_sol(self.config.tip.lamports)
        );
        info!(
            "计算预算: {} CU @ {} micro-lamports",
            self.config.compute.cu_limit, self.config.compute.cu_price_micro_lamports
        );
        info!("========================================");
    }
}

/// 设置 panic hook，确保 panic 信息写入日志
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("========================================");
        error!("!!! 系统发生 PANIC !!!");
        error!("========================================");
        if let Some(location) = panic_info.location() {
            error!(
                "发生位置: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            error!("Panic 消息: {}", s);
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            error!("Panic 消息: {}", s);
        }
        error!("========================================");
    }));
}

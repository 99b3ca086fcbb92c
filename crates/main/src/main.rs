mod bootstrap;

use anyhow::Result;
use config_crate::AppConfig;
use tracing::{error, info};
use utils::LoggerManager;

use crate::bootstrap::{setup_panic_hook, Application};

#[tokio::main]
async fn main() -> Result<()> {
    // 日志级别来自配置，配置错误只能打到 stderr
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置错误: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化日志系统
    let logger = LoggerManager::init(&config.log);

    // 设置 panic hook
    setup_panic_hook();

    info!("========================================");
    info!("  LaunchLab Jito Bundle 买入启动");
    info!("========================================");

    let result = match Application::new(config) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("❌ 运行失败: {:#}", e);
        // 先让日志写完再退出
        drop(logger);
        std::process::exit(1);
    }

    Ok(())
}

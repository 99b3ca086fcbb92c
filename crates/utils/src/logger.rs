use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, Layer};
use tracing_subscriber::filter::{EnvFilter, FilterFn, LevelFilter};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_appender::{non_blocking, rolling};
use time::UtcOffset;

use config_crate::LogConfig;

/// Bundle 提交流程日志 target（每次尝试、端点、bundle id、状态）
pub const BUNDLE_LOG_TARGET: &str = "bundle_submit";
/// 中继 HTTP 调用统计日志 target（429 退避、参数格式回退）
pub const RELAY_LOG_TARGET: &str = "relay_stats";

/// 日志管理器 - 基于target分类的日志系统
pub struct LoggerManager {
    _guards: Vec<non_blocking::WorkerGuard>,
}

impl LoggerManager {
    /// 初始化日志系统
    ///
    /// 日志分类：
    /// - app.log: 通用应用日志
    /// - bundle.log: Bundle 提交、轮询和最终结果
    /// - relay.log: Jito 中继请求统计
    pub fn init(config: &LogConfig) -> Self {
        let mut guards = Vec::new();

        // 创建日志目录
        fs::create_dir_all("logs").ok();

        let offset = UtcOffset::from_hms(config.utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC);
        let timer = OffsetTime::new(offset, time::format_description::well_known::Rfc3339);

        // 1. 控制台输出 - 级别由 RUST_LOG 决定
        let console_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let console_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(console_filter);

        // 2. 通用应用日志 (app.log)
        let (app_writer, app_guard) = non_blocking(rolling::daily("logs", "app.log"));
        guards.push(app_guard);

        let app_layer = fmt::layer()
            .compact()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(LevelFilter::INFO)
            .with_filter(FilterFn::new(|metadata| {
                !matches!(metadata.target(), BUNDLE_LOG_TARGET | RELAY_LOG_TARGET)
            }));

        // 3. Bundle 提交日志 (bundle.log)
        let (bundle_writer, bundle_guard) = non_blocking(rolling::daily("logs", "bundle.log"));
        guards.push(bundle_guard);

        let bundle_layer = fmt::layer()
            .compact()
            .with_writer(bundle_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(FilterFn::new(|metadata| {
                metadata.target() == BUNDLE_LOG_TARGET
            }));

        // 4. 中继请求日志 (relay.log) - 包含 DEBUG 级别的每次请求
        let (relay_writer, relay_guard) = non_blocking(rolling::daily("logs", "relay.log"));
        guards.push(relay_guard);

        let relay_layer = fmt::layer()
            .compact()
            .with_writer(relay_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer)
            .with_filter(FilterFn::new(|metadata| {
                metadata.target() == RELAY_LOG_TARGET
            }));

        // 初始化tracing订阅器
        tracing_subscriber::registry()
            .with(console_layer)
            .with(app_layer)
            .with(bundle_layer)
            .with(relay_layer)
            .init();

        Self { _guards: guards }
    }
}

mod logger;

pub use logger::{LoggerManager, BUNDLE_LOG_TARGET, RELAY_LOG_TARGET};

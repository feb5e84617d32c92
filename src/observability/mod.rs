//! 可观测性：tracing 订阅器
//!
//! 默认级别 info，可用 RUST_LOG 覆盖（如 `RUST_LOG=sous=debug`）。工具审计行以 `audit` 字段输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试或嵌入场景下可能已初始化过，忽略重复初始化
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志，默认级别 info，`verbose` 为 true 时为 debug，可通过 `RUST_LOG` 覆盖
pub fn init_with_verbose(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 重复初始化（例如测试中）直接忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

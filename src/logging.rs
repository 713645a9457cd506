//! 日志初始化
//!
//! 库本身只通过 `tracing` 宏输出；这里提供给二进制和测试用的
//! 订阅器装配。重复初始化会被忽略。

use tracing_subscriber::EnvFilter;

/// 把配置的级别字符串转换为 tracing Level
pub fn tracing_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

/// 初始化日志输出
///
/// 环境变量 RUST_LOG 优先于传入的级别。
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(tracing_level(level).into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("aws_smithy_runtime=warn".parse().unwrap());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_level_parse() {
        assert_eq!(tracing_level("error"), tracing::Level::ERROR);
        assert_eq!(tracing_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(tracing_level("unknown"), tracing::Level::INFO);
    }
}

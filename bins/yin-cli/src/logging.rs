//! 命令行的日志级别映射.
//!
//! console 写 stderr (stdout 可能用于 PCM 数据), 文件日志写到 $cwd/logs/yin-cli.{date}.log.
//! `YIN_LOG` 环境变量优先于 -v/-vv.

use anyhow::Result;
use yin::logging::LoggingConfig;

/// 由 -v 次数得到日志配置
pub fn config_for(verbosity: u8, env_level: Option<String>) -> LoggingConfig {
    let level = env_level.unwrap_or_else(|| {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    });
    let console_level = if verbosity >= 2 { "debug" } else { "warn" };
    LoggingConfig {
        level,
        console_level: console_level.to_string(),
        file_prefix: "yin-cli".to_string(),
        ..LoggingConfig::default()
    }
}

pub fn init(verbosity: u8) -> Result<()> {
    yin::logging::init(config_for(verbosity, std::env::var("YIN_LOG").ok()))
}

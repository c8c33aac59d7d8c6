//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Endpoint Vitals - 端点健康检测调度工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "endpoint-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "ENDPOINT_VITALS_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "ENDPOINT_VITALS_LOG_LEVEL",
        global = true
    )]
    pub log_level: LogLevel,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志", global = true)]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动HTTP服务，可选内置定时触发
    Serve {
        /// 内置触发间隔（秒），覆盖配置文件
        #[arg(
            long,
            value_name = "SECONDS",
            help = "内置触发间隔（秒）",
            env = "ENDPOINT_VITALS_TICK_SECONDS"
        )]
        tick_seconds: Option<u64>,

        /// 触发接口密钥，覆盖配置文件
        #[arg(
            long,
            value_name = "SECRET",
            help = "触发接口密钥",
            env = "HEALTH_CHECK_SECRET",
            hide_env_values = true
        )]
        trigger_secret: Option<String>,
    },

    /// 运行一次检测周期并输出JSON报告
    RunOnce,

    /// 探测单个URL
    Check {
        /// 目标URL
        #[arg(value_name = "URL", help = "目标URL")]
        url: String,

        /// 超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "10",
            help = "超时时间（秒）"
        )]
        timeout: u64,
    },

    /// 验证配置文件
    Validate,

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 新增端点
    AddEndpoint {
        /// 端点名称
        #[arg(long, help = "端点名称")]
        name: String,

        /// 端点URL
        #[arg(long, help = "端点URL")]
        url: String,

        /// 检测间隔（秒，30-3600）
        #[arg(
            long,
            value_name = "SECONDS",
            default_value = "300",
            help = "检测间隔（秒，30-3600）"
        )]
        interval: i64,
    },

    /// 列出所有端点
    ListEndpoints,
}

impl Args {
    /// 获取配置文件路径
    ///
    /// 未指定时使用默认路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_tick() {
        let args =
            Args::try_parse_from(["endpoint-vitals", "serve", "--tick-seconds", "60"]).unwrap();
        match args.command {
            Commands::Serve { tick_seconds, .. } => assert_eq!(tick_seconds, Some(60)),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.log_level, LogLevel::Info);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "endpoint-vitals",
            "run-once",
            "-c",
            "/tmp/vitals.toml",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();
        assert!(matches!(args.command, Commands::RunOnce));
        assert_eq!(args.get_config_path(), PathBuf::from("/tmp/vitals.toml"));
        assert_eq!(args.log_level, LogLevel::Debug);
        assert!(args.json_logs);
    }

    #[test]
    fn test_parse_add_endpoint_defaults() {
        let args = Args::try_parse_from([
            "endpoint-vitals",
            "add-endpoint",
            "--name",
            "api",
            "--url",
            "https://example.com/health",
        ])
        .unwrap();
        match args.command {
            Commands::AddEndpoint {
                name,
                url,
                interval,
            } => {
                assert_eq!(name, "api");
                assert_eq!(url, "https://example.com/health");
                assert_eq!(interval, 300);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_check_requires_url() {
        assert!(Args::try_parse_from(["endpoint-vitals", "check"]).is_err());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Trace), log::LevelFilter::Trace);
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}

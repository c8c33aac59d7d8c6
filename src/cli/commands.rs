//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands};
use crate::config::{generate_default_config, Config, ConfigLoader, EndpointSeed, TomlConfigLoader};
use crate::endpoint::NewEndpoint;
use crate::error::{ConfigError, MonitorError, Result, ValidationError};
use crate::health::{classify, CycleRunner, HealthStatus, HttpProber, Prober};
use crate::storage::{create_storage, Storage};
use crate::web::{AppState, WebServer};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 按子命令分发
pub async fn execute_command(args: &Args) -> Result<()> {
    match &args.command {
        Commands::Serve { .. } => ServeCommand.execute(args).await,
        Commands::RunOnce => RunOnceCommand.execute(args).await,
        Commands::Check { .. } => CheckCommand.execute(args).await,
        Commands::Validate => ValidateCommand.execute(args).await,
        Commands::Init { .. } => InitCommand.execute(args).await,
        Commands::AddEndpoint { .. } => AddEndpointCommand.execute(args).await,
        Commands::ListEndpoints => ListEndpointsCommand.execute(args).await,
    }
}

/// 命令处理器收到了不属于自己的子命令
fn mismatched_command(expected: &str, actual: &Commands) -> MonitorError {
    MonitorError::Other(anyhow::anyhow!(
        "命令分发错误: {} 处理器收到了 {:?}",
        expected,
        actual
    ))
}

/// 加载并验证配置文件
pub async fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Err(ConfigError::FileNotFound {
            path: format!(
                "{}（请先运行 'endpoint-vitals init' 创建默认配置文件）",
                config_path.display()
            ),
        }
        .into());
    }

    TomlConfigLoader::new(true).load_from_file(config_path).await
}

/// 写入配置文件中预置的端点
///
/// 存储中已有相同URL的端点时跳过，返回新写入的数量
pub async fn seed_endpoints(storage: &dyn Storage, seeds: &[EndpointSeed]) -> Result<usize> {
    if seeds.is_empty() {
        return Ok(0);
    }

    let mut known_urls: HashSet<String> = storage
        .list_endpoints()
        .await?
        .into_iter()
        .map(|endpoint| endpoint.url)
        .collect();

    let mut inserted = 0;
    for seed in seeds {
        if known_urls.contains(&seed.url) {
            debug!(name = %seed.name, url = %seed.url, "预置端点已存在，跳过");
            continue;
        }

        let endpoint = NewEndpoint::from(seed).validate()?;
        storage.insert_endpoint(&endpoint).await?;
        info!(name = %endpoint.name, url = %endpoint.url, "写入预置端点");

        known_urls.insert(endpoint.url);
        inserted += 1;
    }

    Ok(inserted)
}

/// 运行检测所需的组件
pub struct Runtime {
    /// 生效的配置
    pub config: Config,
    /// 存储
    pub storage: Arc<dyn Storage>,
    /// 检测周期运行器
    pub runner: Arc<CycleRunner>,
}

/// 根据配置创建存储、写入预置端点并组装运行器
pub async fn build_runtime(config: Config) -> Result<Runtime> {
    let storage = create_storage(&config.storage).await?;
    seed_endpoints(storage.as_ref(), &config.endpoints).await?;

    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(config.global.request_timeout())?);
    let runner = Arc::new(CycleRunner::from_config(&config, storage.clone(), prober));

    Ok(Runtime {
        config,
        storage,
        runner,
    })
}

/// 按固定间隔触发检测周期，直到收到关闭信号
///
/// 上一轮未结束时本次触发被跳过
pub async fn run_trigger_loop(
    runner: Arc<CycleRunner>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = period.as_secs(), "内置触发器已启动");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match runner.run_cycle(Utc::now()).await {
                    Ok(report) => debug!(
                        checked = report.checked_count,
                        failed = report.failed_count,
                        "定时检测周期结束"
                    ),
                    Err(MonitorError::CycleInProgress) => {
                        info!("上一轮检测周期尚未结束，跳过本次触发");
                    }
                    Err(e) => error!(error = %e, "定时检测周期失败"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("内置触发器已停止");
                break;
            }
        }
    }
}

/// 启动服务命令
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Serve {
            tick_seconds,
            trigger_secret,
        } = &args.command
        else {
            return Err(mismatched_command("serve", &args.command));
        };

        let mut config = load_config(&args.get_config_path()).await?;
        if tick_seconds.is_some() {
            config.global.trigger_interval_seconds = *tick_seconds;
        }
        if let Some(secret) = trigger_secret.as_ref().filter(|s| !s.trim().is_empty()) {
            config.web.trigger_secret = Some(secret.clone());
        }
        if config.global.trigger_interval_seconds == Some(0) {
            return Err(ConfigError::ValidationError("触发间隔不能为0".to_string()).into());
        }

        let runtime = build_runtime(config).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let trigger_handle = runtime.config.global.trigger_interval_seconds.map(|secs| {
            tokio::spawn(run_trigger_loop(
                runtime.runner.clone(),
                Duration::from_secs(secs),
                shutdown_tx.subscribe(),
            ))
        });
        if trigger_handle.is_none() {
            info!("未配置内置触发间隔，检测周期只能通过 POST /api/health-check 触发");
        }

        let server_shutdown_rx = shutdown_tx.subscribe();

        // 设置Ctrl+C信号处理
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在停止服务...");
                    let _ = signal_tx.send(());
                }
                Err(err) => error!("监听中断信号失败: {}", err),
            }
        });

        let state = AppState::new(
            runtime.storage.clone(),
            runtime.runner.clone(),
            runtime.config.web.trigger_secret.clone(),
        );
        let server_result = WebServer::new(runtime.config.web.clone(), state)
            .start(server_shutdown_rx)
            .await;

        // 服务器提前退出时也要停掉触发器
        let _ = shutdown_tx.send(());
        if let Some(handle) = trigger_handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "内置触发器异常结束");
            }
        }

        server_result?;
        info!("服务已停止");
        Ok(())
    }
}

/// 单次检测命令
pub struct RunOnceCommand;

#[async_trait]
impl Command for RunOnceCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_config(&args.get_config_path()).await?;
        let runtime = build_runtime(config).await?;

        let report = runtime.runner.run_cycle(Utc::now()).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);

        Ok(())
    }
}

/// 探测单个URL命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Check { url, timeout } = &args.command else {
            return Err(mismatched_command("check", &args.command));
        };

        if reqwest::Url::parse(url).is_err() {
            return Err(ValidationError::InvalidUrl(url.clone()).into());
        }

        let timeout = Duration::from_secs((*timeout).max(1));
        let prober = HttpProber::new(timeout)?;
        let outcome = prober.probe(url, timeout).await;
        let status = classify(&outcome);

        println!("🔍 {}", url);
        println!("  状态: {} {} ({})", status_icon(status), status, status.as_str());
        match outcome.status_code() {
            0 => println!("  状态码: N/A"),
            code => println!("  状态码: {}", code),
        }
        println!("  响应时间: {}ms", outcome.latency_ms());
        if let Some(message) = outcome.error_message() {
            println!("  错误: {}", message);
        }

        Ok(())
    }
}

/// 验证配置命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config_path = args.get_config_path();
        println!("验证配置文件: {}", config_path.display());

        let config = load_config(&config_path).await?;

        println!("✓ 配置文件验证通过");
        println!(
            "  请求超时: {}秒, 最大并发: {}",
            config.global.request_timeout_seconds, config.global.max_concurrent_checks
        );
        match config.global.trigger_interval_seconds {
            Some(secs) => println!("  内置触发间隔: {}秒", secs),
            None => println!("  内置触发: 未启用"),
        }
        println!(
            "  Web: {}:{} (触发密钥: {})",
            config.web.bind_address,
            config.web.port,
            if config.web.trigger_secret.is_some() {
                "已配置"
            } else {
                "未配置"
            }
        );
        println!(
            "  告警: {} (延迟 > {}ms, 可用率 < {}%)",
            if config.alerts.enabled { "启用" } else { "停用" },
            config.alerts.max_latency_ms,
            config.alerts.min_uptime_pct
        );
        println!("  存储: {:?} {}", config.storage.backend, config.storage.database_url);
        println!("✓ 找到 {} 个预置端点", config.endpoints.len());

        Ok(())
    }
}

/// 初始化配置命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Init { config_path, force } = &args.command else {
            return Err(mismatched_command("init", &args.command));
        };
        self.create_config_file(config_path, *force).await
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, generate_default_config()).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的端点");

        Ok(())
    }
}

/// 新增端点命令
pub struct AddEndpointCommand;

#[async_trait]
impl Command for AddEndpointCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::AddEndpoint {
            name,
            url,
            interval,
        } = &args.command
        else {
            return Err(mismatched_command("add-endpoint", &args.command));
        };

        // 先校验再连接存储
        let endpoint = NewEndpoint::new(name.as_str(), url.as_str(), *interval).validate()?;

        let config = load_config(&args.get_config_path()).await?;
        let storage = create_storage(&config.storage).await?;
        storage.insert_endpoint(&endpoint).await?;

        println!("✓ 端点已添加: {} ({})", endpoint.name, endpoint.id);
        println!("  URL: {}", endpoint.url);
        println!("  检测间隔: {}秒", endpoint.check_interval_seconds);

        Ok(())
    }
}

/// 端点列表命令
pub struct ListEndpointsCommand;

#[async_trait]
impl Command for ListEndpointsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_config(&args.get_config_path()).await?;
        let storage = create_storage(&config.storage).await?;

        let mut endpoints = storage.list_endpoints().await?;
        endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if endpoints.is_empty() {
            println!("暂无端点，使用 'endpoint-vitals add-endpoint' 添加");
            return Ok(());
        }

        println!("┌──────────────────────────────────────┬──────────────────────┬──────────────────────────────────┬────────┬──────┬─────────────────┐");
        println!("│ ID                                   │ 名称                 │ URL                              │ 间隔   │ 启用 │ 最后检测时间    │");
        println!("├──────────────────────────────────────┼──────────────────────┼──────────────────────────────────┼────────┼──────┼─────────────────┤");

        for endpoint in &endpoints {
            let last_checked = endpoint
                .last_checked_at
                .map(|t| t.format("%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "从未检测".to_string());

            println!(
                "│ {:<36} │ {} │ {} │ {:<6} │ {:<4} │ {:<15} │",
                endpoint.id,
                truncate_string(&endpoint.name, 20),
                truncate_string(&endpoint.url, 32),
                format!("{}s", endpoint.check_interval_seconds),
                if endpoint.active { "是" } else { "否" },
                last_checked
            );
        }

        println!("└──────────────────────────────────────┴──────────────────────┴──────────────────────────────────┴────────┴──────┴─────────────────┘");
        println!("共 {} 个端点", endpoints.len());

        Ok(())
    }
}

fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✅",
        HealthStatus::Degraded => "⚠️",
        HealthStatus::Down => "❌",
        HealthStatus::Unknown => "❓",
    }
}

/// 截断或补齐到固定字符数
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{s:<max_len$}")
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

//! DarkOrbit 资源下载器（Rust 实现）。
//!
//! 本 crate 负责：配置加载、清单（filecollection XML）拉取与对账、
//! 限速/重试下的并发资源下载。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志等基础设施
//! - `manifest`：清单数据模型、XML 解析与本地基线对账
//! - `download`：限流、重试、候选 URL 与工作池下载调度

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info};

mod base_system;
mod download;
mod manifest;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::syncer::Syncer;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "darkorbit-resource-downloader")]
#[command(about = "DarkOrbit resource downloader (manifest sync)")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 最大并发下载数（覆盖配置文件）
    #[arg(long)]
    max_parallel: Option<usize>,

    /// 每秒请求数预算（覆盖配置文件）
    #[arg(long)]
    rps: Option<f64>,

    /// 令牌桶突发容量（覆盖配置文件）
    #[arg(long)]
    burst: Option<u32>,

    /// 最大重试次数（覆盖配置文件）
    #[arg(long)]
    retries: Option<u32>,

    /// 资源输出目录（覆盖配置文件）
    #[arg(long)]
    output_dir: Option<String>,

    /// 配置文件路径（默认当前目录 config.yml）
    #[arg(long)]
    config: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("darkorbit-resource-downloader v{VERSION}");
        return Ok(());
    }

    let _log = init_logging(cli.debug)?;

    let config_path = cli.config.as_ref().map(std::path::Path::new);
    let mut config = load_or_create::<Config>(config_path).map_err(|e| anyhow!(e.to_string()))?;
    apply_overrides(&mut config, &cli);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("构建 tokio 运行时失败")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    info!(target: "startup", "当前版本: v{VERSION}");

    let syncer = Syncer::new(&config)?;
    for manifest_url in &config.manifest_urls {
        if let Err(err) = syncer.sync_manifest(manifest_url).await {
            // 单个清单失败不影响后续清单
            error!(target: "sync", "清单处理中止 {manifest_url}: {err:#}");
        }
    }
    syncer.download_extra_files(&config.extra_files).await;
    Ok(())
}

/// 命令行参数优先于配置文件；非法值（零/负数）按配置原值处理。
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(v) = cli.max_parallel.filter(|v| *v > 0) {
        config.max_parallel = v;
    }
    if let Some(v) = cli.rps.filter(|v| *v > 0.0) {
        config.requests_per_second = v;
    }
    if let Some(v) = cli.burst.filter(|v| *v > 0) {
        config.burst = v;
    }
    if let Some(v) = cli.retries {
        config.max_retries = v;
    }
    if let Some(dir) = cli.output_dir.as_ref().filter(|d| !d.is_empty()) {
        config.output_dir = dir.clone();
    }
}

fn init_logging(debug: bool) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        console: true,
    };
    LogSystem::init(opts).map_err(|e| anyhow!(e))
}

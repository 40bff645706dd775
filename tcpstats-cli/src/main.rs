//! tcpstats - TCP连接扩展统计查看工具
//!
//! 提供:
//! - 系统范围的 TCP 连接枚举（IPv4 / IPv6）
//! - 每个连接的 8 类扩展统计
//! - 人类可读报告或 CSV 输出

use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tcpstats_core::platform::{
    create_enumerator, create_gateway, has_admin_privileges, platform_name,
};
use tcpstats_core::{run_pass, FamilyFilter, OutputFormat, RunConfig};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "tcpstats", version, about = "Windows TCP extended statistics, system-wide")]
struct Cli {
    /// 输出 CSV（表头 + 每个连接一行）
    #[arg(long)]
    csv: bool,

    /// 详细日志（debug 级别，输出到 stderr）
    #[arg(short, long)]
    verbose: bool,

    /// 显示所有状态的连接（默认只显示 ESTABLISHED）
    #[arg(short = 'a', long = "all", conflicts_with = "state")]
    all: bool,

    /// 只显示 IPv4 连接
    #[arg(short = '4', conflicts_with = "ipv6")]
    ipv4: bool,

    /// 只显示 IPv6 连接
    #[arg(short = '6')]
    ipv6: bool,

    /// 按进程 ID 过滤
    #[arg(short = 'p', long)]
    pid: Option<u32>,

    /// 按端口过滤（本地或远端）
    #[arg(long)]
    port: Option<u16>,

    /// 只显示某个状态的连接（如 TIME_WAIT）
    #[arg(long)]
    state: Option<String>,

    /// JSON 配置文件，命令行参数优先
    #[arg(long)]
    config: Option<PathBuf>,
}

/// 旧脚本使用单横线的 `-csv`，clap 会把它拆成 `-c -s -v`
fn legacy_args<I>(args: I) -> impl Iterator<Item = OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter().map(|arg| {
        if arg == "-csv" {
            OsString::from("--csv")
        } else {
            arg
        }
    })
}

impl Cli {
    /// 合并配置文件与命令行参数
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("加载配置文件 {}", path.display()))?,
            None => RunConfig::default(),
        };

        if self.csv {
            config.format = OutputFormat::Csv;
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.all {
            config.all_states = true;
            config.state = None;
        }
        if let Some(state) = &self.state {
            config.state = Some(state.clone());
            config.all_states = false;
        }
        if self.ipv4 {
            config.family = FamilyFilter::Ipv4;
        }
        if self.ipv6 {
            config.family = FamilyFilter::Ipv6;
        }
        if self.pid.is_some() {
            config.pid = self.pid;
        }
        if self.port.is_some() {
            config.port = self.port;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout 只承载报告 / CSV
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Windows TCP Statistics Tool - System-Wide View")?;
    writeln!(out, "===============================================")?;
    writeln!(out, "Note: Run as Administrator for full statistics")?;
    writeln!(out)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(legacy_args(std::env::args_os()));
    let config = cli.run_config()?;

    init_logging(config.verbose)?;
    debug!("平台: {}，配置: {:?}", platform_name(), config);

    if !has_admin_privileges() {
        warn!("未检测到管理员权限，扩展统计可能无法开启");
    }

    let enumerator = create_enumerator();
    let gateway = create_gateway();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if config.format == OutputFormat::Report {
        print_banner(&mut out)?;
    }

    run_pass(enumerator.as_ref(), gateway.as_ref(), &config, &mut out)?;
    out.flush()?;

    Ok(())
}

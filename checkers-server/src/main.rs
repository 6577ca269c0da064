use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkers_server::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "checkers-server", about = "跳棋对局服务端")]
struct Cli {
    /// 配置文件路径（不存在时使用默认配置）
    #[arg(long, default_value = "checkers.toml")]
    config: PathBuf,

    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(long)]
    port: Option<u16>,

    /// 新对局的默认棋盘边长
    #[arg(long)]
    board_size: Option<usize>,

    /// 禁用对局存档
    #[arg(long)]
    no_storage: bool,

    /// 存档目录
    #[arg(long)]
    saves_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(size) = self.board_size {
            config.board_size = size;
        }
        if self.no_storage {
            config.storage.enabled = false;
        }
        if self.saves_dir.is_some() {
            config.storage.saves_dir = self.saves_dir;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("checkers_server=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load_or_default(&cli.config)
        .with_context(|| format!("加载配置失败: {:?}", cli.config))?;
    cli.apply(&mut config);
    config.validate().context("配置无效")?;

    info!("跳棋服务端启动中...");

    let server = Server::bind(&config).await?;
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

use anyhow::Result;
use clap::Parser;
use tracing::info;

use snowledge_analyzer::bootstrap::Launcher;
use snowledge_analyzer::core::config::AppConfig;
use snowledge_analyzer::logger::{self, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    dotenv::dotenv().ok();

    let cfg = AppConfig::parse();
    logger::init(LogConfig::with_format(cfg.log_format));
    cfg.validate()?;

    info!(version = snowledge_analyzer::VERSION, "starting analyzer");
    Launcher::with_config(cfg).launch().await
}

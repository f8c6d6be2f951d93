use anyhow::Context;
use clap::Parser;
use park_impact::utils::error::ErrorSeverity;
use park_impact::utils::{logger, validation::Validate};
use park_impact::{app, CliConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting park-impact service");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            let exit_code = match e.severity() {
                ErrorSeverity::Critical => 3,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.server.host, config.server.port))?;

    let analyzer = app::build_analyzer(&config).context("failed to create Earth Engine client")?;
    let router = app::server::router(analyzer, config.server.cors_permissive);

    app::server::serve(router, addr).await.context("server terminated")?;
    Ok(())
}

pub mod toml_config;

use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use toml_config::TomlConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "park-impact")]
#[command(about = "Before/after green-space impact metrics backed by Google Earth Engine")]
pub struct CliConfig {
    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Override server.host")]
    pub host: Option<String>,

    #[arg(long, help = "Override server.port")]
    pub port: Option<u16>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 載入設定檔（或預設值），再套用命令列覆寫
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::from_env()?,
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        Ok(config)
    }
}

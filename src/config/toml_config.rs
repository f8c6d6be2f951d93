use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ImpactError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub earth_engine: EarthEngineConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 前端直接從瀏覽器呼叫時需要開啟
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

/// Where bearer tokens come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsMode {
    /// `static` when `access_token` is set, `metadata` otherwise.
    #[default]
    Auto,
    /// The configured `access_token`, never refreshed.
    Static,
    /// Service-account tokens from the Google Cloud metadata server.
    Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthEngineConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default)]
    pub credentials: CredentialsMode,
    #[serde(default = "default_access_token")]
    pub access_token: String,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_season_start")]
    pub season_start: String,
    #[serde(default = "default_season_end")]
    pub season_end: String,
    /// 步行十分鐘的距離
    #[serde(default = "default_walk_radius")]
    pub walk_radius_meters: f64,
    #[serde(default = "default_built_ndvi")]
    pub built_ndvi: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://earthengine.googleapis.com".to_string()
}

fn default_project() -> String {
    "${EE_PROJECT}".to_string()
}

fn default_access_token() -> String {
    "${EE_ACCESS_TOKEN}".to_string()
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
        .to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay_seconds() -> u64 {
    2
}

fn default_season_start() -> String {
    "2022-06-01".to_string()
}

fn default_season_end() -> String {
    "2022-09-01".to_string()
}

fn default_walk_radius() -> f64 {
    800.0
}

fn default_built_ndvi() -> f64 {
    0.1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_true(),
        }
    }
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            project: default_project(),
            credentials: CredentialsMode::default(),
            access_token: default_access_token(),
            metadata_url: default_metadata_url(),
            timeout_seconds: default_timeout_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

impl EarthEngineConfig {
    /// A usable static token: non-empty with no unresolved `${VAR}`.
    pub fn has_static_token(&self) -> bool {
        let token = self.access_token.trim();
        !token.is_empty() && !token.contains("${")
    }

    /// `Auto` resolved to a concrete mode.
    pub fn effective_credentials(&self) -> CredentialsMode {
        match self.credentials {
            CredentialsMode::Auto if self.has_static_token() => CredentialsMode::Static,
            CredentialsMode::Auto => CredentialsMode::Metadata,
            mode => mode,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            season_start: default_season_start(),
            season_end: default_season_end(),
            walk_radius_meters: default_walk_radius(),
            built_ndvi: default_built_ndvi(),
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImpactError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: TomlConfig =
            toml::from_str(&processed_content).map_err(|e| ImpactError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        // 預設值本身也可能是 ${VAR}
        config.resolve_defaults()?;
        Ok(config)
    }

    /// 沒有設定檔時，完全使用預設值與環境變數
    pub fn from_env() -> Result<Self> {
        let mut config = TomlConfig::default();
        config.resolve_defaults()?;
        Ok(config)
    }

    fn resolve_defaults(&mut self) -> Result<()> {
        self.earth_engine.project = Self::substitute_env_vars(&self.earth_engine.project)?;
        self.earth_engine.access_token = Self::substitute_env_vars(&self.earth_engine.access_token)?;
        Ok(())
    }

    /// 替換環境變數 (例如 ${EE_ACCESS_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImpactError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;

        validation::validate_url("earth_engine.endpoint", &self.earth_engine.endpoint)?;
        validation::validate_resolved("earth_engine.project", &self.earth_engine.project)?;
        validation::validate_non_empty_string("earth_engine.project", &self.earth_engine.project)?;
        match self.earth_engine.effective_credentials() {
            CredentialsMode::Static => {
                validation::validate_resolved(
                    "earth_engine.access_token",
                    &self.earth_engine.access_token,
                )?;
                validation::validate_non_empty_string(
                    "earth_engine.access_token",
                    &self.earth_engine.access_token,
                )?;
            }
            _ => validation::validate_url("earth_engine.metadata_url", &self.earth_engine.metadata_url)?,
        }
        validation::validate_positive_number(
            "earth_engine.timeout_seconds",
            self.earth_engine.timeout_seconds,
            1,
        )?;

        validation::validate_date_window(
            "analysis.season_start",
            &self.analysis.season_start,
            "analysis.season_end",
            &self.analysis.season_end,
        )?;
        validation::validate_positive_distance(
            "analysis.walk_radius_meters",
            self.analysis.walk_radius_meters,
        )?;
        validation::validate_range("analysis.built_ndvi", self.analysis.built_ndvi, -1.0, 1.0)?;

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn earth_engine(&self) -> &EarthEngineConfig {
        &self.earth_engine
    }

    fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

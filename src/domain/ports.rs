use crate::config::toml_config::{AnalysisConfig, EarthEngineConfig};
use crate::core::query::Expression;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait ConfigProvider: Send + Sync {
    fn earth_engine(&self) -> &EarthEngineConfig;
    fn analysis(&self) -> &AnalysisConfig;
}

/// 遠端地理運算平台：送出宣告式的運算圖，等待純量結果
#[async_trait]
pub trait EarthEngine: Send + Sync {
    async fn compute_value(&self, expression: &Expression) -> Result<serde_json::Value>;
}

pub mod server;

use crate::adapters::RestEarthEngine;
use crate::core::{analysis::ImpactAnalyzer, metrics::MetricsEngine};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use std::sync::Arc;

/// 以設定建立連到 Earth Engine REST API 的分析器
pub fn build_analyzer<C: ConfigProvider>(config: &C) -> Result<Arc<ImpactAnalyzer<RestEarthEngine>>> {
    let engine = Arc::new(RestEarthEngine::from_config(config.earth_engine())?);
    tracing::debug!("Earth Engine compute URL: {}", engine.compute_url());
    let metrics = MetricsEngine::new(engine, config.analysis().clone());
    Ok(Arc::new(ImpactAnalyzer::new(metrics)))
}

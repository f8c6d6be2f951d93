pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::RestEarthEngine;
pub use crate::app::server::{router, serve};
pub use crate::config::{toml_config::TomlConfig, CliConfig};
pub use crate::core::{analysis::ImpactAnalyzer, geometry::AreaOfInterest, metrics::MetricsEngine};
pub use crate::utils::error::{ImpactError, Result};

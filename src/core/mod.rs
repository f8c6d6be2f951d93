pub mod analysis;
pub mod geometry;
pub mod metrics;
pub mod query;
pub mod scoring;

pub use crate::domain::model::{ImpactReport, LandUseChange, NdviReport};
pub use crate::domain::ports::{ConfigProvider, EarthEngine};
pub use crate::utils::error::Result;

use crate::core::geometry::AreaOfInterest;
use crate::core::metrics::MetricsEngine;
use crate::core::scoring::round_to;
use crate::domain::model::{ImpactReport, LandUseChange, NdviReport};
use crate::domain::ports::EarthEngine;
use crate::utils::error::{ImpactError, Result};

pub struct ImpactAnalyzer<E: EarthEngine> {
    metrics: MetricsEngine<E>,
}

/// `null`、缺少、空物件、空字串或空陣列都視為沒有幾何
pub fn require_geometry(geometry: Option<&serde_json::Value>) -> Result<&serde_json::Value> {
    use serde_json::Value;
    match geometry {
        None | Some(Value::Null) => Err(ImpactError::MissingGeometry),
        Some(Value::Object(map)) if map.is_empty() => Err(ImpactError::MissingGeometry),
        Some(Value::String(text)) if text.is_empty() => Err(ImpactError::MissingGeometry),
        Some(Value::Array(items)) if items.is_empty() => Err(ImpactError::MissingGeometry),
        Some(value) => Ok(value),
    }
}

/// Park, park buffered by `radius`, and the buffer minus the park.
fn prepare_regions(
    geojson: &serde_json::Value,
    radius: f64,
) -> Result<(AreaOfInterest, AreaOfInterest, AreaOfInterest)> {
    let park = AreaOfInterest::from_geojson(geojson)?;
    let buffer = park.buffer(radius)?;
    let remainder = buffer.difference(&park);
    Ok((park, buffer, remainder))
}

impl<E: EarthEngine> ImpactAnalyzer<E> {
    pub fn new(metrics: MetricsEngine<E>) -> Self {
        Self { metrics }
    }

    pub async fn analyze(
        &self,
        geometry: Option<&serde_json::Value>,
        change: LandUseChange,
    ) -> Result<ImpactReport> {
        let geojson = require_geometry(geometry)?;
        tracing::debug!("Analyze geometry: {}", geojson);

        // 幾何運算佔用 CPU，移出 async worker
        let owned = geojson.clone();
        let radius = self.metrics.settings().walk_radius_meters;
        let (park, buffer, remainder) =
            tokio::task::spawn_blocking(move || prepare_regions(&owned, radius))
                .await
                .map_err(|e| ImpactError::ProcessingError {
                    message: format!("geometry task failed: {}", e),
                })??;
        tracing::info!(
            "🌳 Analyzing {} (park {:.0} m², buffer {:.0} m², remainder {:.0} m²)",
            change.as_str(),
            park.area_m2(),
            buffer.area_m2(),
            remainder.area_m2()
        );

        let (ndvi_before, walkability_before, pm25_before, affected_population) = tokio::try_join!(
            self.metrics.ndvi(&buffer),
            self.metrics.walkability(&buffer),
            self.metrics.aerosol_index(&buffer),
            self.metrics.affected_population(&buffer),
        )?;

        let (ndvi_after, walkability_after, pm25_after) = tokio::try_join!(
            async {
                match change {
                    LandUseChange::Removed => self.metrics.ndvi(&remainder).await,
                    LandUseChange::ReplacedByBuilding => {
                        self.metrics.ndvi_with_buildings(&buffer, &park).await
                    }
                    LandUseChange::Unchanged => Ok(ndvi_before),
                }
            },
            self.metrics.walkability(&remainder),
            self.metrics.aerosol_index(&remainder),
        )?;

        let report = ImpactReport {
            affected_population_10_min_walk: affected_population.trunc() as i64,
            ndvi_before: ndvi_before.map(|v| round_to(v, 4)),
            ndvi_after: ndvi_after.map(|v| round_to(v, 4)),
            walkability_before,
            walkability_after,
            pm25_before: pm25_before.map(|v| round_to(v, 2)),
            pm25_after: pm25_after.map(|v| round_to(v, 2)),
        };
        tracing::info!(
            "✅ Analysis complete: population {}, NDVI {:?} → {:?}",
            report.affected_population_10_min_walk,
            report.ndvi_before,
            report.ndvi_after
        );
        Ok(report)
    }

    pub async fn ndvi(&self, geometry: Option<&serde_json::Value>) -> Result<NdviReport> {
        let geojson = require_geometry(geometry)?;
        let area = AreaOfInterest::from_geojson(geojson)?;
        let ndvi = self.metrics.ndvi(&area).await?;
        Ok(NdviReport {
            ndvi: ndvi.map(|v| round_to(v, 4)),
        })
    }
}

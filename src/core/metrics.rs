use crate::config::toml_config::AnalysisConfig;
use crate::core::geometry::AreaOfInterest;
use crate::core::query::{Expr, Expression, Image, ImageCollection, Reducer};
use crate::core::scoring;
use crate::domain::ports::EarthEngine;
use crate::utils::error::Result;
use std::sync::Arc;

const LANDSAT_COLLECTION: &str = "LANDSAT/LC08/C02/T1_L2";
const WORLDPOP_COLLECTION: &str = "WorldPop/GP/100m/pop";
const AEROSOL_COLLECTION: &str = "COPERNICUS/S5P/NRTI/L3_AER_AI";

const NDVI_BAND: &str = "NDVI";
const POPULATION_BAND: &str = "population";
const AEROSOL_BAND: &str = "absorbing_aerosol_index";

/// Collection 2 Level-2 surface reflectance scaling.
const LANDSAT_SCALE: f64 = 0.000_027_5;
const LANDSAT_OFFSET: f64 = -0.2;

const LANDSAT_SCALE_M: f64 = 30.0;
const WORLDPOP_SCALE_M: f64 = 100.0;
const AEROSOL_SCALE_M: f64 = 1000.0;
const MAX_PIXELS: f64 = 1e9;

/// The four remote metric helpers.
pub struct MetricsEngine<E: EarthEngine> {
    engine: Arc<E>,
    settings: AnalysisConfig,
}

impl<E: EarthEngine> MetricsEngine<E> {
    pub fn new(engine: Arc<E>, settings: AnalysisConfig) -> Self {
        Self { engine, settings }
    }

    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    /// Seasonal median NDVI composite over `region`.
    fn ndvi_composite(&self, region: &AreaOfInterest) -> Image {
        ImageCollection::load(LANDSAT_COLLECTION)
            .filter_bounds(region)
            .filter_date(&self.settings.season_start, &self.settings.season_end)
            .sort("CLOUD_COVER")
            .map(|img| img.multiply(LANDSAT_SCALE).add(LANDSAT_OFFSET))
            .map(|img| {
                let ndvi = img.clone().normalized_difference("SR_B5", "SR_B4").rename(NDVI_BAND);
                img.add_bands(ndvi)
            })
            .select(NDVI_BAND)
            .median()
    }

    async fn reduce(&self, query: Expr, band: &str) -> Result<Option<f64>> {
        let expression = Expression::encode(&query);
        let value = self.engine.compute_value(&expression).await?;
        let reading = value.get(band).and_then(|v| v.as_f64());
        tracing::debug!("Reduced '{}' = {:?}", band, reading);
        Ok(reading)
    }

    pub async fn ndvi(&self, region: &AreaOfInterest) -> Result<Option<f64>> {
        if region.is_empty() {
            return Ok(None);
        }
        let query = self.ndvi_composite(region).reduce_region(
            Reducer::mean(),
            region,
            LANDSAT_SCALE_M,
            MAX_PIXELS,
        );
        self.reduce(query, NDVI_BAND).await
    }

    /// Total WorldPop residents inside `region`; missing values count as zero.
    pub async fn population(&self, region: &AreaOfInterest) -> Result<f64> {
        if region.is_empty() {
            return Ok(0.0);
        }
        let query = ImageCollection::load(WORLDPOP_COLLECTION).first().reduce_region(
            Reducer::sum(),
            region,
            WORLDPOP_SCALE_M,
            MAX_PIXELS,
        );
        Ok(self.reduce(query, POPULATION_BAND).await?.unwrap_or(0.0))
    }

    pub async fn walkability(&self, region: &AreaOfInterest) -> Result<f64> {
        let population = self.population(region).await?;
        let density = scoring::population_density(population, region.area_m2());
        Ok(scoring::walkability_score(density))
    }

    /// Sentinel-5P absorbing aerosol index, used as a PM2.5 proxy.
    pub async fn aerosol_index(&self, region: &AreaOfInterest) -> Result<Option<f64>> {
        if region.is_empty() {
            return Ok(None);
        }
        let query = ImageCollection::load(AEROSOL_COLLECTION)
            .filter_bounds(region)
            .filter_date(&self.settings.season_start, &self.settings.season_end)
            .select(AEROSOL_BAND)
            .median()
            .reduce_region(Reducer::mean(), region, AEROSOL_SCALE_M, MAX_PIXELS);
        self.reduce(query, AEROSOL_BAND).await
    }

    /// Residents within a ten-minute walk of the park. `catchment` is the
    /// park already buffered by the walk radius.
    pub async fn affected_population(&self, catchment: &AreaOfInterest) -> Result<f64> {
        self.population(catchment).await
    }

    /// Buffer NDVI with the park footprint overwritten by built-up NDVI.
    pub async fn ndvi_with_buildings(
        &self,
        buffer: &AreaOfInterest,
        park: &AreaOfInterest,
    ) -> Result<Option<f64>> {
        if buffer.is_empty() {
            return Ok(None);
        }
        let built = Image::constant(self.settings.built_ndvi).rename(NDVI_BAND).clip(park);
        let query = self.ndvi_composite(buffer).blend(built).reduce_region(
            Reducer::mean(),
            buffer,
            LANDSAT_SCALE_M,
            MAX_PIXELS,
        );
        self.reduce(query, NDVI_BAND).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    /// 記錄每次請求並回傳固定結果
    struct RecordingEngine {
        response: Value,
        calls: Mutex<Vec<Expression>>,
    }

    impl RecordingEngine {
        fn new(response: Value) -> Self {
            Self {
                response,
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }

        async fn last_call_json(&self) -> String {
            let calls = self.calls.lock().await;
            calls.last().map(|e| e.to_json().to_string()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl EarthEngine for RecordingEngine {
        async fn compute_value(&self, expression: &Expression) -> Result<Value> {
            self.calls.lock().await.push(expression.clone());
            Ok(self.response.clone())
        }
    }

    fn park() -> AreaOfInterest {
        let d = 0.008_993_2;
        AreaOfInterest::from_geojson(&json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [d, 0.0], [d, d], [0.0, d], [0.0, 0.0]]]
        }))
        .unwrap()
    }

    fn metrics(response: Value) -> (Arc<RecordingEngine>, MetricsEngine<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::new(response));
        let metrics = MetricsEngine::new(engine.clone(), AnalysisConfig::default());
        (engine, metrics)
    }

    #[tokio::test]
    async fn test_ndvi_reads_band_and_builds_landsat_query() {
        let (engine, metrics) = metrics(json!({"NDVI": 0.4321}));
        let value = metrics.ndvi(&park()).await.unwrap();

        assert_eq!(value, Some(0.4321));
        let sent = engine.last_call_json().await;
        assert!(sent.contains(LANDSAT_COLLECTION));
        assert!(sent.contains("Image.normalizedDifference"));
        assert!(sent.contains("2022-06-01"));
        assert!(sent.contains("CLOUD_COVER"));
    }

    #[tokio::test]
    async fn test_ndvi_null_result() {
        let (_, metrics) = metrics(json!({"NDVI": null}));
        assert_eq!(metrics.ndvi(&park()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_population_defaults_to_zero() {
        let (_, metrics) = metrics(json!({}));
        assert_eq!(metrics.population(&park()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_walkability_uses_local_area() {
        // 約 1 km²、100 人 → 密度約 100，分數約 50
        let (_, metrics) = metrics(json!({"population": 100.0}));
        let score = metrics.walkability(&park()).await.unwrap();
        assert!((score - 50.0).abs() < 0.5, "score was {}", score);
    }

    #[tokio::test]
    async fn test_aerosol_index_query() {
        let (engine, metrics) = metrics(json!({"absorbing_aerosol_index": -0.87}));
        assert_eq!(metrics.aerosol_index(&park()).await.unwrap(), Some(-0.87));
        assert!(engine.last_call_json().await.contains(AEROSOL_COLLECTION));
    }

    #[tokio::test]
    async fn test_empty_region_skips_remote_call() {
        let (engine, metrics) = metrics(json!({"NDVI": 0.5}));
        let empty = park().difference(&park().buffer(10.0).unwrap());

        assert_eq!(metrics.ndvi(&empty).await.unwrap(), None);
        assert_eq!(metrics.aerosol_index(&empty).await.unwrap(), None);
        assert_eq!(metrics.population(&empty).await.unwrap(), 0.0);
        assert_eq!(metrics.walkability(&empty).await.unwrap(), 4.74);
        assert_eq!(engine.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_affected_population_uses_given_catchment() {
        let (engine, metrics) = metrics(json!({"population": 321.0}));
        let catchment = park().buffer(800.0).unwrap();
        let value = metrics.affected_population(&catchment).await.unwrap();

        assert_eq!(value, 321.0);
        assert_eq!(engine.call_count().await, 1);
        let expected = Expression::encode(&ImageCollection::load(WORLDPOP_COLLECTION).first().reduce_region(
            Reducer::sum(),
            &catchment,
            WORLDPOP_SCALE_M,
            MAX_PIXELS,
        ));
        assert_eq!(engine.last_call_json().await, expected.to_json().to_string());
    }

    #[tokio::test]
    async fn test_ndvi_with_buildings_blends_constant() {
        let (engine, metrics) = metrics(json!({"NDVI": 0.21}));
        let buffer = park().buffer(800.0).unwrap();
        let value = metrics.ndvi_with_buildings(&buffer, &park()).await.unwrap();

        assert_eq!(value, Some(0.21));
        let sent = engine.last_call_json().await;
        assert!(sent.contains("ImageCollection.mosaic"));
        assert!(sent.contains("Image.clip"));
    }
}

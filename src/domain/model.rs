use serde::{Deserialize, Serialize};

/// 假設的土地使用變更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandUseChange {
    #[default]
    Removed,
    ReplacedByBuilding,
    /// 其他任何值：NDVI 視為不變
    Unchanged,
}

impl LandUseChange {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            None | Some("removed") => LandUseChange::Removed,
            Some("replaced_by_building") => LandUseChange::ReplacedByBuilding,
            Some(_) => LandUseChange::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandUseChange::Removed => "removed",
            LandUseChange::ReplacedByBuilding => "replaced_by_building",
            LandUseChange::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub land_use_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NdviRequest {
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    #[serde(rename = "affectedPopulation10MinWalk")]
    pub affected_population_10_min_walk: i64,
    pub ndvi_before: Option<f64>,
    pub ndvi_after: Option<f64>,
    pub walkability_before: f64,
    pub walkability_after: f64,
    pub pm25_before: Option<f64>,
    pub pm25_after: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviReport {
    pub ndvi: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_land_use_labels() {
        assert_eq!(LandUseChange::from_label(None), LandUseChange::Removed);
        assert_eq!(LandUseChange::from_label(Some("removed")), LandUseChange::Removed);
        assert_eq!(
            LandUseChange::from_label(Some("replaced_by_building")),
            LandUseChange::ReplacedByBuilding
        );
        assert_eq!(LandUseChange::from_label(Some("parking_lot")), LandUseChange::Unchanged);
    }

    #[test]
    fn test_report_wire_names() {
        let report = ImpactReport {
            affected_population_10_min_walk: 1234,
            ndvi_before: Some(0.4512),
            ndvi_after: None,
            walkability_before: 71.5,
            walkability_after: 60.25,
            pm25_before: Some(-1.2),
            pm25_after: None,
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["affectedPopulation10MinWalk"], 1234);
        assert_eq!(json["ndviBefore"], 0.4512);
        assert!(json["ndviAfter"].is_null());
        assert_eq!(json["walkabilityAfter"], 60.25);
        assert!(json["pm25After"].is_null());
    }

    #[test]
    fn test_request_accepts_camel_case() {
        let request: AnalyzeRequest = serde_json::from_value(serde_json::json!({
            "geometry": {"type": "Polygon", "coordinates": []},
            "landUseType": "replaced_by_building"
        }))
        .unwrap();
        assert_eq!(request.land_use_type.as_deref(), Some("replaced_by_building"));
        assert!(request.geometry.is_some());
    }
}

use crate::utils::error::{ImpactError, Result};
use geo::algorithm::geodesic_area::GeodesicArea;
use geo::orient::{Direction, Orient};
use geo::{BooleanOps, Buffer, Centroid, Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::GeoJson;

/// 平均地球半徑 (公尺)
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// User-drawn area in WGS84 lon/lat degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    shape: MultiPolygon<f64>,
}

impl AreaOfInterest {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        Self { shape }
    }

    /// Accepts a Polygon/MultiPolygon geometry, a Feature wrapping one, or a
    /// FeatureCollection whose polygonal features are merged. Non-polygonal
    /// members of a collection are skipped.
    ///
    /// Rings are reoriented (exterior counter-clockwise) since clients may
    /// send either winding.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self> {
        let geojson = GeoJson::from_json_value(value.clone())?;

        let mut polygons = Vec::new();
        match geojson {
            GeoJson::Geometry(geometry) => collect_polygons(&geometry.value, &mut polygons, false)?,
            GeoJson::Feature(feature) => match feature.geometry {
                Some(geometry) => collect_polygons(&geometry.value, &mut polygons, false)?,
                None => return Err(invalid("feature has no geometry")),
            },
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    if let Some(geometry) = feature.geometry {
                        collect_polygons(&geometry.value, &mut polygons, true)?;
                    }
                }
            }
        }

        if polygons.is_empty() {
            return Err(invalid("geometry contains no polygons"));
        }

        Ok(Self::new(MultiPolygon::new(polygons).orient(Direction::Default)))
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn is_empty(&self) -> bool {
        self.shape.0.iter().all(|p| p.exterior().0.len() < 4)
    }

    /// Geodesic area in square meters.
    pub fn area_m2(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.shape.geodesic_area_unsigned()
    }

    /// Outward buffer by `meters`, with round joins, computed on a local
    /// tangent plane centred at the shape's centroid.
    pub fn buffer(&self, meters: f64) -> Result<Self> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(ImpactError::ProcessingError {
                message: format!("buffer distance must be positive, got {}", meters),
            });
        }
        if self.is_empty() {
            return Ok(self.clone());
        }

        let origin = self
            .shape
            .centroid()
            .ok_or_else(|| invalid("cannot determine centroid"))?;
        let plane = LocalPlane::new(origin);
        // 預設樣式即為圓角接合
        let buffered = plane.forward(&self.shape).buffer(meters);

        tracing::debug!(
            "Buffered {} polygon(s) by {}m into {} polygon(s)",
            self.shape.0.len(),
            meters,
            buffered.0.len()
        );
        Ok(Self::new(plane.inverse(&buffered)))
    }

    /// The part of `self` not covered by `other`.
    pub fn difference(&self, other: &AreaOfInterest) -> AreaOfInterest {
        if self.is_empty() || other.is_empty() {
            return self.clone();
        }
        Self::new(self.shape.difference(&other.shape))
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        let polygons = self
            .shape
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(ring_positions)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        geojson::Geometry::new(geojson::Value::MultiPolygon(polygons))
    }
}

fn invalid(message: impl Into<String>) -> ImpactError {
    ImpactError::InvalidGeometry {
        message: message.into(),
    }
}

fn ring_positions(ring: &LineString<f64>) -> Vec<Vec<f64>> {
    ring.0.iter().map(|c| vec![c.x, c.y]).collect()
}

/// `skip_other` drops non-polygonal members instead of rejecting them.
fn collect_polygons(
    value: &geojson::Value,
    out: &mut Vec<Polygon<f64>>,
    skip_other: bool,
) -> Result<()> {
    match value {
        geojson::Value::Polygon(rings) => out.push(polygon_from_rings(rings)?),
        geojson::Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(polygon_from_rings(rings)?);
            }
        }
        geojson::Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_polygons(&geometry.value, out, true)?;
            }
        }
        other if skip_other => {
            tracing::debug!("Skipping non-polygonal '{}' member", other.type_name());
        }
        other => {
            return Err(invalid(format!(
                "unsupported geometry type '{}', expected Polygon or MultiPolygon",
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut converted = Vec::with_capacity(rings.len());
    for ring in rings {
        let coords = ring
            .iter()
            .map(|position| coord_from_position(position))
            .collect::<Result<Vec<_>>>()?;
        let mut line = LineString::new(coords);
        line.close();
        // 至少三個不同的頂點加上閉合點
        if line.0.len() < 4 {
            return Err(invalid("polygon ring needs at least three distinct positions"));
        }
        converted.push(line);
    }

    let mut iter = converted.into_iter();
    let exterior = iter
        .next()
        .ok_or_else(|| invalid("polygon has no exterior ring"))?;
    Ok(Polygon::new(exterior, iter.collect()))
}

fn coord_from_position(position: &[f64]) -> Result<Coord<f64>> {
    if position.len() < 2 {
        return Err(invalid("position needs longitude and latitude"));
    }
    let (x, y) = (position[0], position[1]);
    if !x.is_finite() || !y.is_finite() {
        return Err(invalid("coordinates must be finite numbers"));
    }
    if !(-180.0..=180.0).contains(&x) {
        return Err(invalid(format!("longitude {} out of range", x)));
    }
    if !(-90.0..=90.0).contains(&y) {
        return Err(invalid(format!("latitude {} out of range", y)));
    }
    Ok(Coord { x, y })
}

/// Equirectangular projection around an origin, in meters.
struct LocalPlane {
    lon0: f64,
    lat0: f64,
    cos_lat0: f64,
}

impl LocalPlane {
    fn new(origin: Point<f64>) -> Self {
        Self {
            lon0: origin.x(),
            lat0: origin.y(),
            cos_lat0: origin.y().to_radians().cos().max(1e-9),
        }
    }

    fn forward(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        map_shape(shape, |c| Coord {
            x: EARTH_RADIUS_M * (c.x - self.lon0).to_radians() * self.cos_lat0,
            y: EARTH_RADIUS_M * (c.y - self.lat0).to_radians(),
        })
    }

    fn inverse(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        map_shape(shape, |c| Coord {
            x: self.lon0 + (c.x / (EARTH_RADIUS_M * self.cos_lat0)).to_degrees(),
            y: self.lat0 + (c.y / EARTH_RADIUS_M).to_degrees(),
        })
    }
}

fn map_shape(shape: &MultiPolygon<f64>, f: impl Fn(Coord<f64>) -> Coord<f64>) -> MultiPolygon<f64> {
    let map_ring = |ring: &LineString<f64>| LineString::new(ring.0.iter().map(|c| f(*c)).collect());
    MultiPolygon::new(
        shape
            .0
            .iter()
            .map(|p| Polygon::new(map_ring(p.exterior()), p.interiors().iter().map(map_ring).collect()))
            .collect(),
    )
}

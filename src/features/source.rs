use super::{FeatureError, FeatureSource};
use crate::allocation::{DemandPoint, Facility};
use crate::ids::{DemandId, EdgeId, FacilityId};
use crate::network::{Direction, Polyline};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, JsonValue, Value, feature::Id};
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs stored as one GeoJSON FeatureCollection per layer.
///
/// Feature identifiers come from the feature `id`, then an `id` property,
/// and otherwise the 1-based position in the collection. Coordinates are
/// taken as planar; impedance and tolerances share their unit.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    pub facilities: PathBuf,
    pub demand: PathBuf,
    pub boundary: PathBuf,
    pub network: PathBuf,
}

impl FeatureSource for GeoJsonSource {
    fn facilities(&self) -> Result<Vec<Facility>, FeatureError> {
        let features = read_collection(&self.facilities)?;
        let facilities = facilities_from(&features, &self.facilities)?;
        info!("Read {} candidate facilities", facilities.len());
        Ok(facilities)
    }

    fn demand(&self) -> Result<Vec<DemandPoint>, FeatureError> {
        let features = read_collection(&self.demand)?;
        let demand = demand_from(&features, &self.demand)?;
        info!("Read {} demand points", demand.len());
        Ok(demand)
    }

    fn boundary(&self) -> Result<MultiPolygon<f64>, FeatureError> {
        let features = read_collection(&self.boundary)?;
        boundary_from(&features, &self.boundary)
    }

    fn network(&self) -> Result<Vec<Polyline>, FeatureError> {
        let features = read_collection(&self.network)?;
        let lines = network_from(&features, &self.network)?;
        info!("Read {} road segments", lines.len());
        Ok(lines)
    }
}

fn read_collection(path: &Path) -> Result<Vec<Feature>, FeatureError> {
    let text = std::fs::read_to_string(path).map_err(|source| FeatureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_collection(&text, path)
}

fn parse_collection(text: &str, path: &Path) -> Result<Vec<Feature>, FeatureError> {
    match text.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => Ok(collection.features),
        Ok(_) => Err(FeatureError::NotFeatureCollection(path.to_path_buf())),
        Err(source) => Err(FeatureError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        }),
    }
}

struct Attributes<'a> {
    feature: &'a Feature,
    index: usize,
    path: &'a Path,
}

impl Attributes<'_> {
    fn invalid(&self, name: &'static str, reason: impl Into<String>) -> FeatureError {
        FeatureError::InvalidAttribute {
            path: self.path.to_path_buf(),
            index: self.index,
            name,
            reason: reason.into(),
        }
    }

    fn unsupported(&self, expected: &'static str) -> FeatureError {
        FeatureError::UnsupportedGeometry {
            path: self.path.to_path_buf(),
            index: self.index,
            expected,
        }
    }

    fn property(&self, name: &str) -> Option<&JsonValue> {
        self.feature.property(name).filter(|v| !v.is_null())
    }

    fn id(&self) -> Result<Option<u64>, FeatureError> {
        let parse = |value: &str| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| self.invalid("id", format!("`{value}` is not a non-negative integer")))
        };

        if let Some(id) = &self.feature.id {
            return match id {
                Id::Number(n) => n
                    .as_u64()
                    .map(Some)
                    .ok_or_else(|| self.invalid("id", format!("{n} is not a non-negative integer"))),
                Id::String(s) => parse(s).map(Some),
            };
        }
        match self.property("id") {
            None => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid("id", format!("{n} is not a non-negative integer"))),
            Some(JsonValue::String(s)) => parse(s).map(Some),
            Some(other) => Err(self.invalid("id", format!("unexpected value {other}"))),
        }
    }

    fn id_or_ordinal(&self) -> Result<u64, FeatureError> {
        Ok(self.id()?.unwrap_or(self.index as u64 + 1))
    }

    fn number(&self, name: &'static str) -> Result<Option<f64>, FeatureError> {
        match self.property(name) {
            None => Ok(None),
            Some(JsonValue::Number(n)) => Ok(n.as_f64()),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(name, format!("`{s}` is not a number"))),
            Some(other) => Err(self.invalid(name, format!("unexpected value {other}"))),
        }
    }

    fn direction(&self) -> Result<Direction, FeatureError> {
        match self.property("oneway") {
            None => Ok(Direction::Both),
            Some(JsonValue::Bool(true)) => Ok(Direction::Forward),
            Some(JsonValue::Bool(false)) => Ok(Direction::Both),
            Some(JsonValue::String(s)) => match s.trim().to_ascii_uppercase().as_str() {
                "FT" | "YES" => Ok(Direction::Forward),
                "TF" | "-1" => Ok(Direction::Backward),
                "B" | "NO" | "" => Ok(Direction::Both),
                _ => Err(self.invalid("oneway", format!("unknown value `{s}`"))),
            },
            Some(other) => Err(self.invalid("oneway", format!("unexpected value {other}"))),
        }
    }

    fn value(&self) -> Option<&Value> {
        self.feature.geometry.as_ref().map(|g| &g.value)
    }

    fn point(&self) -> Result<Coord<f64>, FeatureError> {
        match self.value() {
            Some(Value::Point(position)) => {
                coord(position).ok_or_else(|| self.unsupported("a two-dimensional Point"))
            }
            _ => Err(self.unsupported("Point")),
        }
    }
}

fn coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn line_string(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| line_string(ring));
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

fn attributes<'a>(features: &'a [Feature], path: &'a Path) -> impl Iterator<Item = Attributes<'a>> {
    features
        .iter()
        .enumerate()
        .map(move |(index, feature)| Attributes {
            feature,
            index,
            path,
        })
}

fn facilities_from(features: &[Feature], path: &Path) -> Result<Vec<Facility>, FeatureError> {
    attributes(features, path)
        .map(|a| -> Result<Facility, FeatureError> {
            Ok(Facility {
                id: FacilityId(a.id_or_ordinal()?),
                coord: a.point()?,
                capacity: a.number("capacity")?,
            })
        })
        .collect()
}

fn demand_from(features: &[Feature], path: &Path) -> Result<Vec<DemandPoint>, FeatureError> {
    attributes(features, path)
        .map(|a| -> Result<DemandPoint, FeatureError> {
            Ok(DemandPoint {
                id: DemandId(a.id_or_ordinal()?),
                coord: a.point()?,
                weight: a.number("weight")?.unwrap_or(1.0),
            })
        })
        .collect()
}

/// Every Polygon and MultiPolygon feature, gathered into one multipolygon.
fn boundary_from(features: &[Feature], path: &Path) -> Result<MultiPolygon<f64>, FeatureError> {
    let mut polygons = Vec::new();
    for a in attributes(features, path) {
        match a.value() {
            Some(Value::Polygon(rings)) => {
                polygons.push(polygon(rings).ok_or_else(|| a.unsupported("a valid Polygon"))?);
            }
            Some(Value::MultiPolygon(parts)) => {
                for rings in parts {
                    polygons.push(polygon(rings).ok_or_else(|| a.unsupported("a valid MultiPolygon"))?);
                }
            }
            _ => return Err(a.unsupported("Polygon or MultiPolygon")),
        }
    }
    Ok(MultiPolygon::new(polygons))
}

/// Road segments. Only the first part of a MultiLineString keeps an explicit
/// id; the other parts are numbered by the network builder.
fn network_from(features: &[Feature], path: &Path) -> Result<Vec<Polyline>, FeatureError> {
    let mut lines = Vec::new();
    for a in attributes(features, path) {
        let id = a.id()?.map(EdgeId);
        let impedance = a.number("impedance")?;
        if let Some(value) = impedance
            && (!value.is_finite() || value < 0.0)
        {
            return Err(a.invalid("impedance", format!("{value} is not a non-negative number")));
        }
        let direction = a.direction()?;

        let parts: Vec<LineString<f64>> = match a.value() {
            Some(Value::LineString(positions)) => {
                vec![line_string(positions).ok_or_else(|| a.unsupported("a valid LineString"))?]
            }
            Some(Value::MultiLineString(parts)) => parts
                .iter()
                .map(|positions| line_string(positions))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| a.unsupported("a valid MultiLineString"))?,
            _ => return Err(a.unsupported("LineString or MultiLineString")),
        };

        for (part, geometry) in parts.into_iter().enumerate() {
            lines.push(Polyline {
                id: if part == 0 { id } else { None },
                geometry,
                impedance,
                direction,
            });
        }
    }
    Ok(lines)
}

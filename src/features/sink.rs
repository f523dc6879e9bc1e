use super::{FeatureError, FeatureSink};
use crate::allocation::ExtractedResults;
use crate::pipeline::PipelineOutput;
use crate::polygonize::PrecinctPolygon;
use geo_types::Coord;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value, feature::Id};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

const ASSIGNED_DEMAND_FILE: &str = "assigned_demand.geojson";
const SELECTED_FACILITIES_FILE: &str = "selected_facilities.geojson";
const PRECINCTS_FILE: &str = "precincts.geojson";
const SUMMARY_FILE: &str = "run_summary.json";

/// Writes each output layer as a FeatureCollection into one directory.
#[derive(Debug, Clone)]
pub struct GeoJsonSink {
    dir: PathBuf,
}

impl GeoJsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), FeatureError> {
        let path = self.dir.join(name);
        let file = File::create(&path).map_err(|source| FeatureError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), value)?;
        Ok(())
    }
}

impl FeatureSink for GeoJsonSink {
    fn write(&mut self, output: &PipelineOutput) -> Result<(), FeatureError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| FeatureError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let (demand, facilities) = result_collections(&output.results);
        self.write_json(ASSIGNED_DEMAND_FILE, &GeoJson::FeatureCollection(demand))?;
        self.write_json(SELECTED_FACILITIES_FILE, &GeoJson::FeatureCollection(facilities))?;
        self.write_json(
            PRECINCTS_FILE,
            &GeoJson::FeatureCollection(precinct_collection(&output.precincts)),
        )?;
        self.write_json(SUMMARY_FILE, &output.summary())?;

        info!("Wrote results to {}", self.dir.display());
        Ok(())
    }
}

fn point(coord: Coord<f64>) -> Option<Geometry> {
    Some(Geometry::new(Value::Point(vec![coord.x, coord.y])))
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn result_collections(results: &ExtractedResults) -> (FeatureCollection, FeatureCollection) {
    let demand = results
        .assigned_demand
        .iter()
        .map(|d| {
            let mut properties = JsonObject::new();
            properties.insert("facility_id".to_string(), d.facility.0.into());
            properties.insert("impedance".to_string(), d.impedance.into());
            Feature {
                bbox: None,
                geometry: point(d.coord),
                id: Some(Id::Number(d.id.0.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let facilities = results
        .selected_facilities
        .iter()
        .map(|f| {
            let mut properties = JsonObject::new();
            properties.insert(
                "assigned_demand_count".to_string(),
                f.assigned_demand_count.into(),
            );
            properties.insert("assigned_weight".to_string(), f.assigned_weight.into());
            Feature {
                bbox: None,
                geometry: point(f.coord),
                id: Some(Id::Number(f.id.0.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    (collection(demand), collection(facilities))
}

fn precinct_collection(precincts: &[PrecinctPolygon]) -> FeatureCollection {
    collection(
        precincts
            .iter()
            .map(|p| {
                let mut properties = JsonObject::new();
                properties.insert("facility_id".to_string(), p.facility.0.into());
                properties.insert("area".to_string(), p.area.into());
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::from(&p.polygon))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect(),
    )
}

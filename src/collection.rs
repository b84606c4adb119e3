//! Reading and writing GeoJSON FeatureCollections.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::output::write_atomic;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "No GeoJSON found. Provide --in or --fallback that exists (tried {} and {})",
        .primary.display(),
        .fallback.display()
    )]
    MissingInput { primary: PathBuf, fallback: PathBuf },
    #[error("Input is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,
    #[error("Failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn point_feature(longitude: f64, latitude: f64, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(vec![longitude, latitude]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn new(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Pretty-prints the collection to `path`.
pub fn write(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let data = serde_json::to_vec_pretty(collection).context("Failed to encode GeoJSON")?;
    write_atomic(path, &data)
}

/// Loads the features of `primary`, or of `fallback` when `primary` does not exist.
pub fn load(primary: &Path, fallback: &Path) -> Result<Vec<Feature>, LoadError> {
    let path = if primary.exists() {
        primary
    } else if fallback.exists() {
        info!("{} not found, using {}", primary.display(), fallback.display());
        fallback
    } else {
        return Err(LoadError::MissingInput {
            primary: primary.to_path_buf(),
            fallback: fallback.to_path_buf(),
        });
    };

    let data = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&data).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    features(value)
}

/// Extracts the features of a FeatureCollection. An object that only carries a
/// `features` list is accepted as one. Entries that are not valid GeoJSON
/// features are dropped.
pub fn features(value: Value) -> Result<Vec<Feature>, LoadError> {
    let Value::Object(mut object) = value else {
        return Err(LoadError::NotFeatureCollection);
    };

    let is_collection = object.get("type").and_then(Value::as_str) == Some("FeatureCollection");
    let raw = match object.remove("features") {
        Some(Value::Array(x)) => x,
        None if is_collection => Vec::new(),
        _ => return Err(LoadError::NotFeatureCollection),
    };
    if !is_collection {
        debug!("treating object with a features list as a FeatureCollection");
    }

    let total = raw.len();
    let features: Vec<_> = raw
        .into_iter()
        .filter_map(|x| match Feature::from_json_value(x) {
            Ok(feature) => Some(feature),
            Err(e) => {
                debug!("skipping feature: {e}");
                None
            }
        })
        .collect();
    if features.len() < total {
        debug!("{} of {total} entries are not features", total - features.len());
    }

    Ok(features)
}

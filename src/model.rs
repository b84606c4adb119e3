use geojson::{Feature, JsonObject};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::normalize::{self, Label, NormalizeConfig};

/// Open property mapping of a feature, in source order.
pub type Properties = JsonObject;

/// Coarse device category inferred from capture properties.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ap,
    Client,
    Bridge,
    Unknown,
}

impl DeviceType {
    /// Human readable name used by the filter panel and the legend.
    pub fn title(self) -> &'static str {
        match self {
            DeviceType::Ap => "AP",
            DeviceType::Client => "Client",
            DeviceType::Bridge => "Bridge",
            DeviceType::Unknown => "Unknown",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            DeviceType::Ap => "Access Points",
            DeviceType::Client => "Clients",
            DeviceType::Bridge => "Bridges",
            DeviceType::Unknown => "Unknown",
        }
    }
}

/// A placeable observation with its normalized fields.
///
/// Records are built once and never modified afterwards; colouring and
/// filtering only derive display state from them.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    longitude: f64,
    latitude: f64,
    properties: Properties,
    signal_dbm: Option<f64>,
    device_type: DeviceType,
    label: Label,
}

impl CanonicalRecord {
    /// Returns `None` when either coordinate is not finite.
    pub fn new(
        longitude: f64,
        latitude: f64,
        properties: Properties,
        config: &NormalizeConfig,
    ) -> Option<Self> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return None;
        }

        let signal_dbm = normalize::signal_dbm(config, &properties);
        let device_type = normalize::device_type(config, &properties);
        let label = normalize::label(config, &properties);
        Some(Self {
            longitude,
            latitude,
            properties,
            signal_dbm,
            device_type,
            label,
        })
    }

    /// Builds a record from a GeoJSON feature with a `[lon, lat]` point geometry.
    /// Any other geometry, or none at all, yields `None`.
    pub fn from_feature(feature: Feature, config: &NormalizeConfig) -> Option<Self> {
        let geometry = feature.geometry?;
        let (longitude, latitude) = match geometry.value {
            geojson::Value::Point(position) if position.len() >= 2 => (position[0], position[1]),
            _ => return None,
        };
        Self::new(
            longitude,
            latitude,
            feature.properties.unwrap_or_default(),
            config,
        )
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn signal_dbm(&self) -> Option<f64> {
        self.signal_dbm
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn label(&self) -> &Label {
        &self.label
    }
}

//! Colouring and filtering of rendered records.
//!
//! The map page takes every record's bucket, fill colours and the legends from
//! [`FilterEngine`] and applies the same predicate as [`FilterState::passes`] on
//! every control change.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoEnumIterator};

use crate::model::{CanonicalRecord, DeviceType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Type,
    Signal,
}

/// Marker colours per device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub ap: String,
    pub client: String,
    pub bridge: String,
    pub unknown: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            ap: "#43a047".to_string(),
            client: "#fb8c00".to_string(),
            bridge: "#1e88e5".to_string(),
            unknown: "#9e9e9e".to_string(),
        }
    }
}

impl Palette {
    pub fn color(&self, device_type: DeviceType) -> &str {
        match device_type {
            DeviceType::Ap => &self.ap,
            DeviceType::Client => &self.client,
            DeviceType::Bridge => &self.bridge,
            DeviceType::Unknown => &self.unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBucket {
    Strong,
    Medium,
    Weak,
    Absent,
}

/// Thresholds and colours of the signal colouring mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalScale {
    /// Readings at or above this are strong.
    pub strong_min: f64,
    /// Readings at or above this, and below `strong_min`, are medium.
    pub medium_min: f64,
    pub strong: String,
    pub medium: String,
    pub weak: String,
    pub absent: String,
}

impl Default for SignalScale {
    fn default() -> Self {
        Self {
            strong_min: -60.0,
            medium_min: -75.0,
            strong: "#2e7d32".to_string(),
            medium: "#f9a825".to_string(),
            weak: "#c62828".to_string(),
            absent: "#9e9e9e".to_string(),
        }
    }
}

impl SignalScale {
    pub fn bucket(&self, signal_dbm: Option<f64>) -> SignalBucket {
        match signal_dbm {
            None => SignalBucket::Absent,
            Some(x) if x >= self.strong_min => SignalBucket::Strong,
            Some(x) if x >= self.medium_min => SignalBucket::Medium,
            Some(_) => SignalBucket::Weak,
        }
    }

    pub fn color(&self, bucket: SignalBucket) -> &str {
        match bucket {
            SignalBucket::Strong => &self.strong,
            SignalBucket::Medium => &self.medium,
            SignalBucket::Weak => &self.weak,
            SignalBucket::Absent => &self.absent,
        }
    }

    /// Popup description of a bucket.
    pub fn describe(&self, bucket: SignalBucket) -> String {
        match bucket {
            SignalBucket::Strong => format!("≥ {} dBm", self.strong_min),
            SignalBucket::Medium => format!("{} to {} dBm", self.medium_min, self.strong_min),
            SignalBucket::Weak => format!("< {} dBm", self.medium_min),
            SignalBucket::Absent => "N/A".to_string(),
        }
    }

    /// Short legend label of a bucket.
    pub fn legend_label(&self, bucket: SignalBucket) -> String {
        match bucket {
            SignalBucket::Strong => format!("≥ {}", self.strong_min),
            SignalBucket::Medium => format!("{}..{}", self.medium_min, self.strong_min),
            SignalBucket::Weak => format!("< {}", self.medium_min),
            SignalBucket::Absent => "N/A".to_string(),
        }
    }
}

pub const SIGNAL_BUCKETS: [SignalBucket; 4] = [
    SignalBucket::Strong,
    SignalBucket::Medium,
    SignalBucket::Weak,
    SignalBucket::Absent,
];

/// Range of the minimum-signal slider; `min` means "no filtering".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for SignalRange {
    fn default() -> Self {
        Self {
            min: -120.0,
            max: -20.0,
            step: 1.0,
        }
    }
}

impl SignalRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

pub fn legend(mode: ColorMode, palette: &Palette, scale: &SignalScale) -> Vec<LegendEntry> {
    match mode {
        ColorMode::Type => DeviceType::iter()
            .map(|x| LegendEntry {
                label: x.title().to_string(),
                color: palette.color(x).to_string(),
            })
            .collect(),
        ColorMode::Signal => SIGNAL_BUCKETS
            .iter()
            .map(|&x| LegendEntry {
                label: scale.legend_label(x),
                color: scale.color(x).to_string(),
            })
            .collect(),
    }
}

/// Filter controls of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub active: BTreeSet<DeviceType>,
    pub min_signal: f64,
    /// Trimmed, lowercased SSID search text.
    pub query: String,
}

impl FilterState {
    /// Everything visible: all types active, threshold at the slider floor.
    pub fn new(range: &SignalRange) -> Self {
        Self {
            active: DeviceType::iter().collect(),
            min_signal: range.min,
            query: String::new(),
        }
    }

    pub fn passes(&self, record: &CanonicalRecord) -> bool {
        if !self.active.contains(&record.device_type()) {
            return false;
        }
        if record.signal_dbm().is_some_and(|x| x < self.min_signal) {
            return false;
        }
        if !self.query.is_empty() {
            let ssid = record.label().ssid.as_deref().unwrap_or_default();
            if !ssid.to_lowercase().contains(&self.query) {
                return false;
            }
        }
        true
    }
}

/// What the page shows for one filter state.
#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    /// Indices of the passing records, in record order.
    pub visible: Vec<usize>,
    /// Fill colour of every record, visible or not.
    pub colors: Vec<&'a str>,
    pub legend: Vec<LegendEntry>,
}

impl View<'_> {
    pub fn count(&self) -> usize {
        self.visible.len()
    }
}

/// Filter state machine over a fixed set of records.
///
/// Every setter leaves the records untouched; [`FilterEngine::view`] derives the
/// visible subset and colours from scratch.
pub struct FilterEngine<'a> {
    records: &'a [CanonicalRecord],
    palette: &'a Palette,
    scale: &'a SignalScale,
    range: SignalRange,
    state: FilterState,
    mode: ColorMode,
}

impl<'a> FilterEngine<'a> {
    pub fn new(
        records: &'a [CanonicalRecord],
        palette: &'a Palette,
        scale: &'a SignalScale,
        range: SignalRange,
    ) -> Self {
        Self {
            records,
            palette,
            scale,
            range,
            state: FilterState::new(&range),
            mode: ColorMode::default(),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn set_type(&mut self, device_type: DeviceType, active: bool) {
        if active {
            self.state.active.insert(device_type);
        } else {
            self.state.active.remove(&device_type);
        }
    }

    pub fn set_min_signal(&mut self, value: f64) {
        self.state.min_signal = self.range.clamp(value);
    }

    pub fn set_query(&mut self, query: &str) {
        self.state.query = query.trim().to_lowercase();
    }

    pub fn set_mode(&mut self, mode: ColorMode) {
        self.mode = mode;
    }

    /// Restores every control, including the colour mode, to its default.
    pub fn reset(&mut self) {
        self.state = FilterState::new(&self.range);
        self.mode = ColorMode::default();
    }

    pub fn color(&self, record: &CanonicalRecord) -> &'a str {
        match self.mode {
            ColorMode::Type => self.palette.color(record.device_type()),
            ColorMode::Signal => self.scale.color(self.scale.bucket(record.signal_dbm())),
        }
    }

    pub fn view(&self) -> View<'a> {
        let visible = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, x)| self.state.passes(x))
            .map(|(i, _)| i)
            .collect();
        let colors = self.records.iter().map(|x| self.color(x)).collect();

        View {
            visible,
            colors,
            legend: legend(self.mode, self.palette, self.scale),
        }
    }
}

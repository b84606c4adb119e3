//! Renders a FeatureCollection as one self-contained Leaflet page.
//!
//! Normalization happens here, once. The page receives the derived type,
//! signal, bucket and fill colours of every record together with the legends
//! and filter defaults, and only shows or hides markers in the browser.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use geo::{BoundingRect, MultiPoint, Point};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::info;

use crate::{
    collection,
    config::Config,
    filter::{
        ColorMode, FilterEngine, LegendEntry, Palette, SignalBucket, SignalRange, SignalScale,
        SIGNAL_BUCKETS,
    },
    model::{CanonicalRecord, DeviceType, Properties},
    normalize::NormalizeConfig,
    output::write_atomic,
};

const PAGE_CSS: &str = include_str!("page.css");
const PAGE_JS: &str = include_str!("page.js");

#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    /// Primary GeoJSON path
    #[arg(long = "in", default_value = "data/networks_fixed.geojson")]
    pub input: PathBuf,
    /// GeoJSON path used when the primary one does not exist
    #[arg(long, default_value = "data/networks_geojson_fallback.geojson")]
    pub fallback: PathBuf,
    /// Output HTML path
    #[arg(long, default_value = "data/networks_colored.html")]
    pub out: PathBuf,
    /// Map title
    #[arg(long, default_value = "Wardrive Map")]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub palette: Palette,
    pub signal: SignalScale,
    pub slider: SignalRange,
    pub tiles: TileConfig,
    pub assets: AssetConfig,
    /// `[lat, lon]` shown when there is nothing to fit the view to
    pub default_center: [f64; 2],
    pub default_zoom: u8,
    /// Fraction the fitted bounds are grown by on each side
    pub bounds_padding: f64,
    /// Delay before the SSID search is applied, in milliseconds
    pub search_debounce_ms: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            signal: SignalScale::default(),
            slider: SignalRange::default(),
            tiles: TileConfig::default(),
            assets: AssetConfig::default(),
            default_center: [47.4979, 19.0402],
            default_zoom: 12,
            bounds_padding: 0.1,
            search_debounce_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub url: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors".to_string(),
            max_zoom: 19,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub leaflet_css: String,
    pub leaflet_js: String,
    pub cluster_css: String,
    pub cluster_css_default: String,
    pub cluster_js: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            leaflet_css: "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".to_string(),
            leaflet_js: "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".to_string(),
            cluster_css: "https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css"
                .to_string(),
            cluster_css_default:
                "https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css"
                    .to_string(),
            cluster_js:
                "https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"
                    .to_string(),
        }
    }
}

/// Everything the page script reads, embedded as one JSON document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageData<'a> {
    records: Vec<PageRecord<'a>>,
    signal: PageSignal,
    legend: PageLegend,
    slider: SignalRange,
    tiles: &'a TileConfig,
    view: PageView,
    debounce_ms: u32,
}

#[derive(Serialize)]
struct PageRecord<'a> {
    lat: f64,
    lon: f64,
    #[serde(rename = "type")]
    device_type: DeviceType,
    signal: Option<f64>,
    bucket: SignalBucket,
    fill: PageFill<'a>,
    ssid: Option<&'a str>,
    bssid: Option<&'a str>,
    channel: Option<&'a str>,
    encryption: Option<&'a str>,
    properties: &'a Properties,
}

/// Fill colour of a record in each colouring mode.
#[derive(Serialize)]
struct PageFill<'a> {
    #[serde(rename = "type")]
    by_type: &'a str,
    #[serde(rename = "signal")]
    by_signal: &'a str,
}

impl<'a> PageRecord<'a> {
    fn new(record: &'a CanonicalRecord, bucket: SignalBucket, fill: PageFill<'a>) -> Self {
        let label = record.label();
        Self {
            lat: record.latitude(),
            lon: record.longitude(),
            device_type: record.device_type(),
            signal: record.signal_dbm(),
            bucket,
            fill,
            ssid: label.ssid.as_deref(),
            bssid: label.bssid.as_deref(),
            channel: label.channel.as_deref(),
            encryption: label.encryption.as_deref(),
            properties: record.properties(),
        }
    }
}

#[derive(Serialize)]
struct PageSignal {
    /// Popup description per bucket
    labels: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct PageLegend {
    #[serde(rename = "type")]
    by_type: Vec<LegendEntry>,
    #[serde(rename = "signal")]
    by_signal: Vec<LegendEntry>,
}

#[derive(Serialize)]
struct PageView {
    /// `[[south, west], [north, east]]`
    bounds: Option<[[f64; 2]; 2]>,
    padding: f64,
    center: [f64; 2],
    zoom: u8,
}

/// Bounding box of the records in Leaflet's `[lat, lon]` order.
fn bounds(records: &[CanonicalRecord]) -> Option<[[f64; 2]; 2]> {
    let points: MultiPoint = records
        .iter()
        .map(|x| Point::new(x.longitude(), x.latitude()))
        .collect();
    let rect = points.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    Some([[min.y, min.x], [max.y, max.x]])
}

// colours and legends come from the same engine the filter tests exercise
fn page_data<'a>(records: &'a [CanonicalRecord], config: &'a MapConfig) -> PageData<'a> {
    let scale = &config.signal;
    let labels = SIGNAL_BUCKETS
        .iter()
        .map(|&x| {
            let key = serde_json::to_value(x)
                .ok()
                .and_then(|x| x.as_str().map(str::to_string))
                .unwrap_or_default();
            (key, serde_json::Value::String(scale.describe(x)))
        })
        .collect();

    let mut engine = FilterEngine::new(records, &config.palette, scale, config.slider);
    let by_type = engine.view();
    engine.set_mode(ColorMode::Signal);
    let by_signal = engine.view();

    let page_records = records
        .iter()
        .zip(by_type.colors.iter().zip(&by_signal.colors))
        .map(|(record, (&by_type, &by_signal))| {
            PageRecord::new(
                record,
                scale.bucket(record.signal_dbm()),
                PageFill { by_type, by_signal },
            )
        })
        .collect();

    PageData {
        records: page_records,
        signal: PageSignal { labels },
        legend: PageLegend {
            by_type: by_type.legend,
            by_signal: by_signal.legend,
        },
        slider: config.slider,
        tiles: &config.tiles,
        view: PageView {
            bounds: bounds(records),
            padding: config.bounds_padding,
            center: config.default_center,
            zoom: config.default_zoom,
        },
        debounce_ms: config.search_debounce_ms,
    }
}

// `<` only occurs inside JSON strings, where < is equivalent and cannot
// close the surrounding script element
fn embed_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("Failed to encode page data")?;
    Ok(json.replace('<', "\\u003c"))
}

/// Builds the HTML document. The output depends only on the arguments, so equal
/// inputs render byte-identical pages.
pub fn render(
    records: &[CanonicalRecord],
    title: &str,
    config: &MapConfig,
    generated: DateTime<Utc>,
) -> Result<String> {
    let data = embed_json(&page_data(records, config))?;
    let assets = &config.assets;
    let slider = &config.slider;

    let page: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="stylesheet" href=(assets.leaflet_css);
                link rel="stylesheet" href=(assets.cluster_css);
                link rel="stylesheet" href=(assets.cluster_css_default);
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                div id="map" {}

                div class="topbar" {
                    strong { (title) }
                    div class="mode row" {
                        label class="row" {
                            input type="radio" name="mode" value=(ColorMode::Type.to_string()) checked;
                            " By type"
                        }
                        label class="row" {
                            input type="radio" name="mode" value=(ColorMode::Signal.to_string());
                            " By signal"
                        }
                        span class="count-pill" id="count" title="Double-click to zoom to shown" { "0" }
                    }
                    div class="legend" id="legend" {}
                }

                div class="panel" {
                    h3 { "Filters" }
                    @for device_type in DeviceType::iter() {
                        label {
                            input type="checkbox" class="flt-type" value=(device_type.as_ref()) checked;
                            " " (device_type.plural())
                        }
                    }
                    label {
                        "Min signal (dBm): "
                        span id="sigval" { (slider.min) }
                        input type="range" id="minsig" min=(slider.min) max=(slider.max) step=(slider.step) value=(slider.min);
                    }
                    label {
                        "SSID contains:"
                        input type="text" id="ssidq" placeholder="e.g., eduroam";
                    }
                    button id="reset" { "Reset filters" }
                }

                div class="footer" { "Generated: " (generated.format("%Y-%m-%d %H:%M UTC").to_string()) }

                script src=(assets.leaflet_js) {}
                script src=(assets.cluster_js) {}
                script type="application/json" id="map-data" { (PreEscaped(data)) }
                script { (PreEscaped(PAGE_JS)) }
            }
        }
    };

    Ok(page.into_string())
}

/// Normalizes the features that have a point geometry, dropping the rest.
pub fn records(features: Vec<geojson::Feature>, config: &NormalizeConfig) -> Vec<CanonicalRecord> {
    features
        .into_iter()
        .filter_map(|x| CanonicalRecord::from_feature(x, config))
        .collect()
}

pub fn run(args: &MapArgs, config: &Config) -> Result<()> {
    let features = collection::load(&args.input, &args.fallback)?;
    let total = features.len();
    let records = records(features, &config.normalize);
    info!("{} of {total} features have a point position", records.len());

    let html = render(&records, &args.title, &config.map, Utc::now())?;
    write_atomic(&args.out, html.as_bytes())?;
    println!("Wrote map: {}", args.out.display());
    Ok(())
}

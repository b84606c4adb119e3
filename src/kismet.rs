//! Kismet `.netxml` logs.
//!
//! Each document is turned into a flat CSV next to it and a GeoJSON
//! FeatureCollection of the networks that carry an averaged GPS position.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use encoding_rs::{Encoding, UTF_8};
use geojson::{Feature, JsonObject};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::{collection, normalize::parse_dbm, output::write_atomic};

pub const CSV_HEADER: [&str; 7] = [
    "SSID",
    "BSSID",
    "Encryption",
    "Channel",
    "Latitude",
    "Longitude",
    "Signal_dBm",
];

/// Serde representation of the `<detection-run>` root
#[derive(Debug, Deserialize)]
struct DetectionRun {
    #[serde(rename = "wireless-network", default)]
    networks: Vec<WirelessNetwork>,
}

#[derive(Debug, Deserialize)]
struct WirelessNetwork {
    #[serde(rename = "@BSSID")]
    bssid_attribute: Option<String>,
    #[serde(rename = "BSSID")]
    bssid: Option<String>,
    #[serde(rename = "SSID", default)]
    ssids: Vec<SsidInfo>,
    channel: Option<String>,
    #[serde(rename = "snr-info")]
    snr: Option<SnrInfo>,
    #[serde(rename = "gps-info")]
    gps: Option<GpsInfo>,
}

#[derive(Debug, Deserialize)]
struct SsidInfo {
    #[serde(default)]
    encryption: Vec<String>,
    essid: Option<Essid>,
}

// <essid cloaked="false">name</essid>
#[derive(Debug, Deserialize)]
struct Essid {
    #[serde(rename = "$text", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SnrInfo {
    last_signal_dbm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GpsInfo {
    #[serde(rename = "avg-lat")]
    avg_lat: Option<String>,
    #[serde(rename = "avg-lon")]
    avg_lon: Option<String>,
}

/// One network as written to the flat CSV, missing fields as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub ssid: String,
    pub bssid: String,
    pub encryption: String,
    pub channel: String,
    pub latitude: String,
    pub longitude: String,
    pub signal: String,
}

impl From<WirelessNetwork> for Row {
    fn from(net: WirelessNetwork) -> Self {
        let first = net.ssids.into_iter().next();

        let bssid = [net.bssid_attribute, net.bssid]
            .into_iter()
            .flatten()
            .map(|x| x.trim().to_string())
            .find(|x| !x.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let ssid = first
            .as_ref()
            .and_then(|x| x.essid.as_ref())
            .map(|x| x.name.trim())
            .filter(|x| !x.is_empty())
            .unwrap_or("hidden")
            .to_string();
        let encryption = first
            .and_then(|x| x.encryption.into_iter().next())
            .unwrap_or_else(|| "unknown".to_string())
            .to_uppercase();
        let (latitude, longitude) = match net.gps {
            Some(gps) => (gps.avg_lat, gps.avg_lon),
            None => (None, None),
        };

        Self {
            ssid,
            bssid,
            encryption,
            channel: net.channel.unwrap_or_default(),
            latitude: latitude.unwrap_or_default(),
            longitude: longitude.unwrap_or_default(),
            signal: net.snr.and_then(|x| x.last_signal_dbm).unwrap_or_default(),
        }
    }
}

impl Row {
    fn record(&self) -> [&str; 7] {
        [
            self.ssid.as_str(),
            self.bssid.as_str(),
            self.encryption.as_str(),
            self.channel.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.signal.as_str(),
        ]
    }

    /// A point feature, when both coordinates parse as finite numbers.
    pub fn feature(&self) -> Option<Feature> {
        let lat = parse_coordinate(&self.latitude)?;
        let lon = parse_coordinate(&self.longitude)?;

        let mut properties = JsonObject::new();
        properties.insert("SSID".to_string(), json!(self.ssid));
        properties.insert("BSSID".to_string(), json!(self.bssid));
        properties.insert("Encryption".to_string(), json!(self.encryption));
        properties.insert("Channel".to_string(), json!(self.channel));
        properties.insert(
            "Signal".to_string(),
            parse_dbm(&self.signal).map_or(Value::Null, |x| json!(x)),
        );
        Some(collection::point_feature(lon, lat, properties))
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Parsed contents of one netxml document.
#[derive(Debug)]
pub struct Document {
    pub rows: Vec<Row>,
    pub features: Vec<Feature>,
}

pub fn parse_str(xml: &str) -> Result<Document> {
    let run: DetectionRun = quick_xml::de::from_str(xml).context("Failed to parse netxml")?;

    let rows: Vec<Row> = run.networks.into_iter().map(Row::from).collect();
    let features: Vec<Feature> = rows.iter().filter_map(Row::feature).collect();
    if features.len() < rows.len() {
        debug!(
            "{} of {} networks have no usable position",
            rows.len() - features.len(),
            rows.len()
        );
    }

    Ok(Document { rows, features })
}

pub fn parse(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_str(&decode(&bytes)).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Decodes a document by its BOM or XML declaration, UTF-8 when neither names
/// one. Kismet declares ISO-8859-1. Undecodable bytes become U+FFFD.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = declared_encoding(bytes).unwrap_or(UTF_8);
    let (text, used, lossy) = encoding.decode(bytes);
    if lossy {
        debug!("replaced malformed {} sequences", used.name());
    }
    text
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let mut reader = quick_xml::Reader::from_reader(bytes);
    match reader.read_event().ok()? {
        quick_xml::events::Event::Decl(decl) => {
            let label = decl.encoding()?.ok()?;
            Encoding::for_label(&label)
        }
        _ => None,
    }
}

fn csv_bytes(rows: &[Row]) -> Result<Vec<u8>> {
    let mut csv = csv::Writer::from_writer(Vec::new());
    csv.write_record(CSV_HEADER)?;
    for row in rows {
        csv.write_record(row.record())?;
    }
    csv.into_inner().map_err(|e| e.into_error().into())
}

/// Paths named by `arg`: the glob matches in sorted order when it contains a
/// glob metacharacter, otherwise the path itself.
pub fn expand(arg: &str) -> Result<Vec<PathBuf>> {
    if !arg.contains(['*', '?', '[', ']']) {
        return Ok(vec![PathBuf::from(arg)]);
    }

    let mut paths = Vec::new();
    for entry in glob::glob(arg).with_context(|| format!("Invalid pattern {arg}"))? {
        match entry {
            Ok(x) => paths.push(x),
            Err(e) => warn!("{e}"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Converts one document, returning the number of features written.
pub fn convert(path: &Path) -> Result<usize> {
    let document = parse(path)?;
    let csv_out = path.with_extension("csv");
    let geo_out = path.with_extension("geojson");

    write_atomic(&csv_out, &csv_bytes(&document.rows)?)?;
    let count = document.features.len();
    collection::write(&geo_out, &collection::new(document.features))?;

    println!(
        "OK: {} → {}, {} ({count} points)",
        file_name(path),
        file_name(&csv_out),
        file_name(&geo_out)
    );
    Ok(count)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run(args: &[String]) -> Result<()> {
    let mut failed = 0;
    for arg in args {
        let paths = match expand(arg) {
            Ok(x) => x,
            Err(e) => {
                warn!("{e:#}");
                println!("Skip (not found): {arg}");
                continue;
            }
        };
        if paths.is_empty() {
            warn!("no files match {arg}");
            println!("Skip (not found): {arg}");
        }

        for path in paths {
            if !path.exists() {
                warn!("{} does not exist", path.display());
                println!("Skip (not found): {}", path.display());
                continue;
            }
            if let Err(e) = convert(&path) {
                error!("{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} document(s) could not be converted");
    }
    Ok(())
}

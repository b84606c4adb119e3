//! WiGLE CSV exports.
//!
//! The first line of an export is a `WigleWifi-1.4,appRelease=...` banner, the
//! second the column header.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use geojson::{Feature, JsonObject};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{collection, config::IngestConfig, normalize::parse_dbm};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Record {
    #[serde(rename = "MAC")]
    mac: Option<String>,
    #[serde(rename = "SSID")]
    ssid: Option<String>,
    auth_mode: Option<String>,
    channel: Option<String>,
    #[serde(rename = "RSSI")]
    rssi: Option<String>,
    current_latitude: Option<String>,
    current_longitude: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

impl Record {
    fn position(&self) -> Option<(f64, f64)> {
        let lat = coordinate(&self.current_latitude, &self.latitude)?;
        let lon = coordinate(&self.current_longitude, &self.longitude)?;
        Some((lat, lon))
    }
}

// the first non-blank of the two columns, which must then parse
fn coordinate(current: &Option<String>, fallback: &Option<String>) -> Option<f64> {
    let raw = [current, fallback]
        .into_iter()
        .filter_map(|x| x.as_deref())
        .map(str::trim)
        .find(|x| !x.is_empty())?;
    raw.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn is_no_fix(lat: f64, lon: f64, tolerance: f64) -> bool {
    lat.abs() < tolerance && lon.abs() < tolerance
}

pub fn parse(path: &Path, config: &IngestConfig) -> Result<Vec<Feature>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
    );
    read(reader, config)
}

pub fn read<R: BufRead>(mut reader: R, config: &IngestConfig) -> Result<Vec<Feature>> {
    reader
        .read_line(&mut String::new())
        .context("Failed to read metadata line")?; // skip banner
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let mut features = Vec::new();
    let mut skipped = 0;
    for (i, result) in reader.deserialize().enumerate() {
        let record: Record = match result {
            Ok(x) => x,
            Err(e) => {
                debug!("row {}: {e}", i + 1);
                skipped += 1;
                continue;
            }
        };

        let Some((lat, lon)) = record.position() else {
            skipped += 1;
            continue;
        };
        if is_no_fix(lat, lon, config.zero_tolerance) {
            skipped += 1;
            continue;
        }

        features.push(collection::point_feature(lon, lat, properties(record)));
    }

    if skipped > 0 {
        debug!("skipped {skipped} rows without a usable position");
    }
    Ok(features)
}

fn properties(record: Record) -> JsonObject {
    let ssid = record
        .ssid
        .as_deref()
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .unwrap_or("hidden");
    let signal = record.rssi.as_deref().and_then(parse_dbm);

    let mut properties = JsonObject::new();
    properties.insert("SSID".to_string(), json!(ssid));
    properties.insert("BSSID".to_string(), json!(record.mac.unwrap_or_default()));
    properties.insert("Channel".to_string(), json!(record.channel.unwrap_or_default()));
    properties.insert("Signal".to_string(), signal.map_or(Value::Null, |x| json!(x)));
    properties.insert(
        "Encryption".to_string(),
        json!(record.auth_mode.unwrap_or_default()),
    );
    properties
}

/// Converts `input` into a FeatureCollection at `output`.
pub fn run(input: &Path, output: &Path, config: &IngestConfig) -> Result<()> {
    let features = parse(input, config)?;
    let count = features.len();
    collection::write(output, &collection::new(features))?;
    println!("Saved {count} features to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const HEADER: &str = "WigleWifi-1.4,appRelease=2.53,model=Pixel,release=11,device=x,display=x,board=x,brand=x\n\
        MAC,SSID,AuthMode,FirstSeen,Channel,RSSI,CurrentLatitude,CurrentLongitude,AltitudeMeters,AccuracyMeters,Type\n";

    fn read_str(rows: &str) -> Vec<Feature> {
        read(format!("{HEADER}{rows}").as_bytes(), &IngestConfig::default()).unwrap()
    }

    #[test]
    fn hidden_ssid_and_signal() {
        let features = read_str(
            "aa:bb:cc:dd:ee:ff,,[WPA2-PSK-CCMP][ESS],2024-05-01 10:00:00,6,-67dbm,47.5,19.0,120,5,WIFI\n",
        );
        assert_eq!(features.len(), 1);

        let feature = &features[0];
        let geometry = feature.geometry.as_ref().unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![19.0, 47.5]));
        assert_eq!(feature.property("SSID"), Some(&json!("hidden")));
        assert_eq!(feature.property("BSSID"), Some(&json!("aa:bb:cc:dd:ee:ff")));
        assert_eq!(feature.property("Channel"), Some(&json!("6")));
        assert_eq!(feature.property("Signal"), Some(&json!(-67.0)));
        assert_eq!(
            feature.property("Encryption"),
            Some(&json!("[WPA2-PSK-CCMP][ESS]"))
        );

        let keys: Vec<_> = feature.properties.as_ref().unwrap().keys().collect();
        assert_eq!(keys, ["SSID", "BSSID", "Channel", "Signal", "Encryption"]);
    }

    #[test]
    fn zero_position_dropped() {
        let features = read_str(
            "aa:bb:cc:dd:ee:01,home,[ESS],2024-05-01,1,-50,47.5,19.0,0,0,WIFI\n\
             aa:bb:cc:dd:ee:02,home,[ESS],2024-05-01,1,-50,0,0,0,0,WIFI\n\
             aa:bb:cc:dd:ee:03,home,[ESS],2024-05-01,1,-50,0.00001,-0.00002,0,0,WIFI\n",
        );
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn zero_tolerance_disabled() {
        let config = IngestConfig { zero_tolerance: 0.0 };
        let data = format!("{HEADER}aa,net,[ESS],t,1,-50,0.00001,-0.00002,0,0,WIFI\n");
        assert_eq!(read(data.as_bytes(), &config).unwrap().len(), 1);
    }

    #[test]
    fn bad_rows_skipped() {
        let features = read_str(
            "aa,a,[ESS],t,1,-50,,,0,0,WIFI\n\
             bb,b,[ESS],t,1,-50,north,19.0,0,0,WIFI\n\
             cc,c,[ESS],t,1,-50,NaN,19.0,0,0,WIFI\n\
             dd,d,[ESS],t,1,n/a,47.5,19.0,0,0,WIFI\n",
        );
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].property("SSID"), Some(&json!("d")));
        assert_eq!(features[0].property("Signal"), Some(&Value::Null));
    }

    #[test]
    fn legacy_position_columns() {
        let data = "WigleWifi-1.0\nMAC,SSID,AuthMode,Channel,RSSI,Latitude,Longitude\n\
            aa,net,WPA2,11,\"-71,5\",52.1,4.3\n";
        let features = read(data.as_bytes(), &IngestConfig::default()).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(
            features[0].geometry.as_ref().unwrap().value,
            geojson::Value::Point(vec![4.3, 52.1])
        );
        assert_eq!(features[0].property("Signal"), Some(&json!(-71.5)));
    }

    #[test]
    fn current_position_preferred() {
        let data = "WigleWifi-1.4\nMAC,SSID,CurrentLatitude,CurrentLongitude,Latitude,Longitude\n\
            aa,net,1.5,2.5,9.0,9.0\n\
            bb,net,,,3.5,4.5\n";
        let features = read(data.as_bytes(), &IngestConfig::default()).unwrap();
        let points: Vec<_> = features
            .iter()
            .map(|x| x.geometry.as_ref().unwrap().value.clone())
            .collect();
        assert_eq!(
            points,
            [
                geojson::Value::Point(vec![2.5, 1.5]),
                geojson::Value::Point(vec![4.5, 3.5]),
            ]
        );
        assert_eq!(features[0].property("Encryption"), Some(&json!("")));
    }

    #[test]
    fn run_writes_collection() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wigle.csv");
        let output = dir.path().join("out/networks.geojson");
        fs::write(
            &input,
            format!("{HEADER}aa,net,[ESS],t,6,-60,47.5,19.0,0,0,WIFI\nbb,net,[ESS],t,6,-60,0,0,0,0,WIFI\n"),
        )
        .unwrap();

        run(&input, &output, &IngestConfig::default()).unwrap();
        let loaded = collection::load(&output, &output).unwrap();
        assert_eq!(loaded.len(), 1);
    }
}

//! Maps the loosely typed property sets of different capture tools onto one
//! canonical shape.
//!
//! Everything here is a pure function of the properties and the key lists in
//! [`NormalizeConfig`]. Unrecognised or unparseable values resolve to "absent" or
//! [`DeviceType::Unknown`](crate::model::DeviceType::Unknown), never to an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{DeviceType, Properties};

mod device;
mod signal;

pub use device::{TypeRule, TYPE_RULES};
pub use signal::{coerce_dbm, parse_dbm, SignalSource, SIGNAL_SOURCES};

/// Key lists consulted by the normalizer, in priority order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub signal_keys: Vec<String>,
    pub type_keys: Vec<String>,
    pub explicit_type_keys: Vec<String>,
    pub ssid_keys: Vec<String>,
    pub bssid_keys: Vec<String>,
    pub channel_keys: Vec<String>,
    pub encryption_keys: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        fn keys(keys: &[&str]) -> Vec<String> {
            keys.iter().map(|x| x.to_string()).collect()
        }

        Self {
            signal_keys: keys(&[
                "Signal dBm",
                "Signal",
                "signal_dbm",
                "kismet.device.base.signal.kismet.common.signal.last_signal",
                "kismet.device.base.signal/kismet.common.signal.last_signal",
                "kismet.common.signal.last_signal",
                "last_signal",
                "signal",
            ]),
            type_keys: keys(&[
                "type",
                "Type",
                "device_type",
                "kismet.device.base.type",
                "dot11.device.type",
                "kismet.device.base.typename",
                "typename",
            ]),
            explicit_type_keys: keys(&["Type", "type"]),
            ssid_keys: keys(&["SSID", "ssid", "dot11.device.ssid"]),
            bssid_keys: keys(&["BSSID", "bssid", "dot11.device.bssid"]),
            channel_keys: keys(&["Channel", "channel", "kismet.device.base.channel"]),
            encryption_keys: keys(&["Encryption", "encryption", "dot11.device.encryption"]),
        }
    }
}

/// Display fields shown in a marker popup and matched by the SSID search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Label {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub channel: Option<String>,
    pub encryption: Option<String>,
}

/// Canonical signal strength in dBm, see [`SIGNAL_SOURCES`].
pub fn signal_dbm(config: &NormalizeConfig, properties: &Properties) -> Option<f64> {
    SIGNAL_SOURCES
        .iter()
        .find_map(|source| source.extract(config, properties))
}

/// Device category, see [`TYPE_RULES`]. Always returns a category.
pub fn device_type(config: &NormalizeConfig, properties: &Properties) -> DeviceType {
    device::classify(config, properties)
}

pub fn label(config: &NormalizeConfig, properties: &Properties) -> Label {
    let field = |keys: &[String]| first_truthy(properties, keys).map(text);
    Label {
        ssid: field(&config.ssid_keys),
        bssid: field(&config.bssid_keys),
        channel: field(&config.channel_keys),
        encryption: field(&config.encryption_keys),
    }
}

/// Truthiness as the rendered page sees JSON values: null, `false`, zero and the
/// empty string are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(x) => *x,
        Value::Number(x) => x.as_f64().is_some_and(|x| x != 0.0),
        Value::String(x) => !x.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a value: strings as-is, null as empty, anything else as JSON.
pub fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(x) => x.clone(),
        other => other.to_string(),
    }
}

/// First value under `keys` that is truthy.
pub fn first_truthy<'a>(properties: &'a Properties, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| properties.get(key))
        .find(|value| truthy(value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!(false)));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!(6)));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn text_forms() {
        assert_eq!(text(&json!(null)), "");
        assert_eq!(text(&json!("WPA2")), "WPA2");
        assert_eq!(text(&json!(6)), "6");
        assert_eq!(text(&json!(true)), "true");
    }

    #[test]
    fn label_priority() {
        let config = NormalizeConfig::default();
        let label = label(
            &config,
            &props(json!({
                "SSID": "",
                "ssid": "lower",
                "dot11.device.ssid": "nested",
                "bssid": "aa:bb",
                "kismet.device.base.channel": 11,
            })),
        );
        assert_eq!(label.ssid.as_deref(), Some("lower"));
        assert_eq!(label.bssid.as_deref(), Some("aa:bb"));
        assert_eq!(label.channel.as_deref(), Some("11"));
        assert_eq!(label.encryption, None);
    }

    #[test]
    fn config_from_toml() {
        let config: NormalizeConfig = toml::from_str(r#"signal_keys = ["rssi"]"#).unwrap();
        assert_eq!(config.signal_keys, vec!["rssi".to_string()]);
        assert_eq!(config.type_keys, NormalizeConfig::default().type_keys);
    }
}

use serde_json::Value;

use super::NormalizeConfig;
use crate::model::Properties;

/// Places a signal value is looked up, tried in [`SIGNAL_SOURCES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    /// Flat keys from [`NormalizeConfig::signal_keys`], first parseable wins.
    RankedKeys,
    /// Keys containing "signal" or "dbm" inside nested objects, one level deep.
    NestedScan,
}

pub const SIGNAL_SOURCES: [SignalSource; 2] = [SignalSource::RankedKeys, SignalSource::NestedScan];

impl SignalSource {
    pub fn extract(self, config: &NormalizeConfig, properties: &Properties) -> Option<f64> {
        match self {
            SignalSource::RankedKeys => config
                .signal_keys
                .iter()
                .filter_map(|key| properties.get(key))
                .find_map(coerce_dbm),
            SignalSource::NestedScan => properties
                .values()
                .filter_map(Value::as_object)
                .flat_map(|nested| nested.iter())
                .filter(|(key, _)| {
                    let key = key.to_lowercase();
                    key.contains("signal") || key.contains("dbm")
                })
                .find_map(|(_, value)| coerce_dbm(value)),
        }
    }
}

/// Coerces a JSON value into a finite dBm reading.
pub fn coerce_dbm(value: &Value) -> Option<f64> {
    match value {
        Value::Number(x) => x.as_f64().filter(|x| x.is_finite()),
        Value::String(x) => parse_dbm(x),
        _ => None,
    }
}

/// Parses readings such as `-67`, `"-67dbm"`, `"−75 dBm"` or `"-67,5 dB"`.
pub fn parse_dbm(raw: &str) -> Option<f64> {
    let s = raw.trim().replace('\u{2212}', "-");
    let s = strip_unit(&s).replace(',', ".");
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

// trailing "dB" or "dBm", any case, with optional whitespace before it
fn strip_unit(s: &str) -> &str {
    let lower = s.to_ascii_lowercase();
    let unit = if lower.ends_with("dbm") {
        3
    } else if lower.ends_with("db") {
        2
    } else {
        return s;
    };
    s[..s.len() - unit].trim_end()
}

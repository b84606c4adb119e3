use super::{first_truthy, text, truthy, NormalizeConfig};
use crate::model::{DeviceType, Properties};

/// One step of the device classifier. Rules are evaluated in [`TYPE_RULES`]
/// order and the first one that produces a category wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRule {
    /// `Type`/`type` is exactly "client", "ap", "access point" or "bridge".
    Explicit,
    /// Type text mentions "bridge" (or "bridged").
    BridgeText,
    /// Type text mentions "client", "station" or the token "sta".
    ClientText,
    /// Type text mentions "wifi"; generic WiFi records describe access points.
    WifiText,
    /// Both an SSID and a channel are present.
    SsidAndChannel,
    /// An encryption value other than "unknown" or "open" is present.
    Encrypted,
}

pub const TYPE_RULES: [TypeRule; 6] = [
    TypeRule::Explicit,
    TypeRule::BridgeText,
    TypeRule::ClientText,
    TypeRule::WifiText,
    TypeRule::SsidAndChannel,
    TypeRule::Encrypted,
];

/// What the rules look at, gathered once per record.
struct Evidence<'a> {
    config: &'a NormalizeConfig,
    properties: &'a Properties,
    type_text: String,
}

impl<'a> Evidence<'a> {
    fn new(config: &'a NormalizeConfig, properties: &'a Properties) -> Self {
        let type_text = config
            .type_keys
            .iter()
            .filter_map(|key| properties.get(key))
            .filter(|value| !value.is_object() && !value.is_array())
            .map(text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        Self {
            config,
            properties,
            type_text,
        }
    }

    fn has(&self, keys: &[String]) -> bool {
        first_truthy(self.properties, keys).is_some()
    }
}

impl TypeRule {
    fn apply(self, evidence: &Evidence) -> Option<DeviceType> {
        let type_text = evidence.type_text.as_str();
        match self {
            TypeRule::Explicit => {
                let explicit = first_truthy(evidence.properties, &evidence.config.explicit_type_keys)
                    .map(text)?
                    .trim()
                    .to_lowercase();
                match explicit.as_str() {
                    "client" => Some(DeviceType::Client),
                    "ap" | "access point" => Some(DeviceType::Ap),
                    "bridge" => Some(DeviceType::Bridge),
                    _ => None,
                }
            }
            TypeRule::BridgeText => type_text.contains("bridge").then_some(DeviceType::Bridge),
            TypeRule::ClientText => (type_text.contains("client")
                || type_text.contains("station")
                || has_token(type_text, "sta"))
            .then_some(DeviceType::Client),
            TypeRule::WifiText => type_text.contains("wifi").then_some(DeviceType::Ap),
            TypeRule::SsidAndChannel => (evidence.has(&evidence.config.ssid_keys)
                && evidence.has(&evidence.config.channel_keys))
            .then_some(DeviceType::Ap),
            TypeRule::Encrypted => {
                let encryption =
                    first_truthy(evidence.properties, &evidence.config.encryption_keys)
                        .map(text)?
                        .to_lowercase();
                (!encryption.is_empty() && encryption != "unknown" && encryption != "open")
                    .then_some(DeviceType::Ap)
            }
        }
    }
}

pub(super) fn classify(config: &NormalizeConfig, properties: &Properties) -> DeviceType {
    let evidence = Evidence::new(config, properties);
    TYPE_RULES
        .iter()
        .find_map(|rule| rule.apply(&evidence))
        .unwrap_or(DeviceType::Unknown)
}

// `token` delimited by non-word characters or the ends of `text`
fn has_token(text: &str, token: &str) -> bool {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word == token)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn classify(value: Value) -> DeviceType {
        super::classify(
            &NormalizeConfig::default(),
            value.as_object().unwrap(),
        )
    }

    #[test]
    fn rule_order() {
        assert_eq!(
            TYPE_RULES,
            [
                TypeRule::Explicit,
                TypeRule::BridgeText,
                TypeRule::ClientText,
                TypeRule::WifiText,
                TypeRule::SsidAndChannel,
                TypeRule::Encrypted,
            ]
        );
    }

    #[test]
    fn explicit_wins() {
        assert_eq!(
            classify(json!({ "Type": "client", "SSID": "x", "Channel": "6" })),
            DeviceType::Client
        );
        assert_eq!(
            classify(json!({ "Type": " CLIENT ", "device_type": "bridge" })),
            DeviceType::Client
        );
        assert_eq!(
            classify(json!({ "type": "Access Point", "typename": "Wi-Fi Client" })),
            DeviceType::Ap
        );
        assert_eq!(
            classify(json!({ "Type": "bridge", "Encryption": "WPA2" })),
            DeviceType::Bridge
        );
        assert_eq!(classify(json!({ "type": "AP" })), DeviceType::Ap);
    }

    #[test]
    fn explicit_prefers_capitalised_key() {
        assert_eq!(
            classify(json!({ "type": "bridge", "Type": "client" })),
            DeviceType::Client
        );
        // an empty Type falls through to type
        assert_eq!(
            classify(json!({ "Type": "", "type": "bridge" })),
            DeviceType::Bridge
        );
    }

    #[test]
    fn type_text() {
        assert_eq!(
            classify(json!({ "kismet.device.base.type": "Wi-Fi Bridged" })),
            DeviceType::Bridge
        );
        assert_eq!(
            classify(json!({ "kismet.device.base.typename": "Wi-Fi Client" })),
            DeviceType::Client
        );
        assert_eq!(
            classify(json!({ "dot11.device.type": "Station" })),
            DeviceType::Client
        );
        assert_eq!(classify(json!({ "typename": "wifi sta" })), DeviceType::Client);
        assert_eq!(classify(json!({ "Type": "WIFI" })), DeviceType::Ap);

        // bridge outranks client
        assert_eq!(
            classify(json!({ "typename": "bridged client" })),
            DeviceType::Bridge
        );
    }

    #[test]
    fn structured_type_values_are_ignored() {
        assert_eq!(
            classify(json!({ "type": { "name": "station" } })),
            DeviceType::Unknown
        );
        assert_eq!(
            classify(json!({ "typename": { "x": "wifi" } })),
            DeviceType::Unknown
        );
        assert_eq!(
            classify(json!({ "device_type": ["bridge"], "typename": "wifi client" })),
            DeviceType::Client
        );
    }

    #[test]
    fn sta_needs_a_token() {
        assert!(has_token("wi-fi sta", "sta"));
        assert!(has_token("sta", "sta"));
        assert!(!has_token("status", "sta"));
        assert!(!has_token("sta_x", "sta"));
        assert_eq!(classify(json!({ "type": "status" })), DeviceType::Unknown);
    }

    #[test]
    fn ssid_and_channel() {
        assert_eq!(classify(json!({ "SSID": "x", "Channel": "6" })), DeviceType::Ap);
        assert_eq!(
            classify(json!({ "dot11.device.ssid": "x", "kismet.device.base.channel": 11 })),
            DeviceType::Ap
        );
        assert_eq!(classify(json!({ "SSID": "x", "Channel": "" })), DeviceType::Unknown);
        assert_eq!(classify(json!({ "SSID": "x" })), DeviceType::Unknown);
    }

    #[test]
    fn encryption() {
        assert_eq!(classify(json!({ "Encryption": "WPA2" })), DeviceType::Ap);
        assert_eq!(classify(json!({ "encryption": "[WPA2-PSK-CCMP][ESS]" })), DeviceType::Ap);
        assert_eq!(classify(json!({ "Encryption": "UNKNOWN" })), DeviceType::Unknown);
        assert_eq!(classify(json!({ "Encryption": "Open" })), DeviceType::Unknown);
        assert_eq!(classify(json!({ "Encryption": "" })), DeviceType::Unknown);
    }

    #[test]
    fn total_and_deterministic() {
        let samples = [
            json!({}),
            json!({ "Type": 7 }),
            json!({ "type": null, "SSID": null }),
            json!({ "Type": { "nested": true } }),
            json!({ "typename": ["ap"] }),
            json!({ "Signal": -60, "SSID": "hidden", "Channel": "1", "Encryption": "UNKNOWN" }),
        ];
        for sample in samples {
            let first = classify(sample.clone());
            assert_eq!(first, classify(sample));
        }
        assert_eq!(classify(json!({})), DeviceType::Unknown);
    }
}

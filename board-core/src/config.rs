//! Gerätekonfiguration aus `/conf.json`
//!
//! Nur vorhandene Schlüssel überschreiben die Defaults. Ein fehlerhaftes
//! Dokument lässt die bestehende Konfiguration unverändert.

use heapless::{String, Vec};
use serde::Deserialize;

pub const CONFIG_PATH: &str = "/conf.json";
/// Maximale Größe von `/conf.json`
pub const CONFIG_FILE_CAPACITY: usize = 1024;
pub const MAX_PERSONAL_PARAMETERS: usize = 8;
pub const DEFAULT_BROKER_PORT: u16 = 1883;
/// Heartbeat-Intervall in Sekunden
pub const DEFAULT_PUBLISH_DELAY_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    InvalidJson,
    ValueTooLong,
}

pub type Parameter = (String<32>, String<64>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub node_name: String<32>,
    pub update_server: String<64>,
    pub broker_host: String<64>,
    pub broker_port: u16,
    pub broker_user: String<32>,
    pub broker_password: String<64>,
    pub publish_delay_secs: u32,
    pub fw_version: String<32>,
    pub platform_password: String<32>,
    pub personal_parameters: Vec<Parameter, MAX_PERSONAL_PARAMETERS>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            update_server: String::new(),
            broker_host: String::new(),
            broker_port: DEFAULT_BROKER_PORT,
            broker_user: String::new(),
            broker_password: String::new(),
            publish_delay_secs: DEFAULT_PUBLISH_DELAY_SECS,
            fw_version: String::new(),
            platform_password: String::new(),
            personal_parameters: Vec::new(),
        }
    }
}

/// JSON-Dokument wie es auf dem Update-Server gespeichert ist
#[derive(Deserialize)]
struct ConfigDocument<'a> {
    #[serde(borrow)]
    nodename: Option<&'a str>,
    #[serde(borrow)]
    configupdateserver: Option<&'a str>,
    #[serde(borrow)]
    configbrokerurl: Option<&'a str>,
    configbrokerport: Option<u16>,
    #[serde(borrow)]
    configbrokeruser: Option<&'a str>,
    #[serde(borrow)]
    configbrokerpassword: Option<&'a str>,
    configpublishdelay: Option<u32>,
    #[serde(borrow)]
    fw_version: Option<&'a str>,
    #[serde(borrow, rename = "personalParameters")]
    personal_parameters: Option<&'a str>,
    #[serde(borrow)]
    platformpassword: Option<&'a str>,
}

impl DeviceConfig {
    /// Übernimmt alle vorhandenen Schlüssel eines JSON-Dokuments
    pub fn apply_json(&mut self, json: &str) -> Result<(), ConfigError> {
        let (doc, _) =
            serde_json_core::from_str::<ConfigDocument<'_>>(json).map_err(|_| ConfigError::InvalidJson)?;

        let mut next = self.clone();
        copy_opt(&mut next.node_name, doc.nodename)?;
        copy_opt(&mut next.update_server, doc.configupdateserver)?;
        copy_opt(&mut next.broker_host, doc.configbrokerurl)?;
        copy_opt(&mut next.broker_user, doc.configbrokeruser)?;
        copy_opt(&mut next.broker_password, doc.configbrokerpassword)?;
        copy_opt(&mut next.fw_version, doc.fw_version)?;
        copy_opt(&mut next.platform_password, doc.platformpassword)?;
        if let Some(port) = doc.configbrokerport {
            next.broker_port = port;
        }
        if let Some(delay) = doc.configpublishdelay {
            next.publish_delay_secs = delay;
        }
        if let Some(params) = doc.personal_parameters {
            next.personal_parameters = parse_parameters(params)?;
        }

        *self = next;
        Ok(())
    }

    /// Wert eines persönlichen Parameters
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.personal_parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn copy_opt<const N: usize>(target: &mut String<N>, value: Option<&str>) -> Result<(), ConfigError> {
    if let Some(value) = value {
        *target = String::try_from(value).map_err(|_| ConfigError::ValueTooLong)?;
    }
    Ok(())
}

/// `key:value,key:value,...` → höchstens acht Paare
fn parse_parameters(text: &str) -> Result<Vec<Parameter, MAX_PERSONAL_PARAMETERS>, ConfigError> {
    let mut params = Vec::new();
    for entry in text.split(',').filter(|e| !e.trim().is_empty()) {
        let (key, value) = entry.split_once(':').unwrap_or((entry, ""));
        let key = String::try_from(key.trim()).map_err(|_| ConfigError::ValueTooLong)?;
        let value = String::try_from(value.trim()).map_err(|_| ConfigError::ValueTooLong)?;
        if params.push((key, value)).is_err() {
            warn!("CONFIG: Ignoring personal parameters beyond {}", MAX_PERSONAL_PARAMETERS);
            break;
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides_present_keys_only() {
        let mut config = DeviceConfig::default();
        config
            .apply_json(r#"{"nodename":"Werkbank","configbrokerurl":"broker.local","configbrokerport":8883}"#)
            .unwrap();
        assert_eq!(config.node_name.as_str(), "Werkbank");
        assert_eq!(config.broker_host.as_str(), "broker.local");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.publish_delay_secs, DEFAULT_PUBLISH_DELAY_SECS);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut config = DeviceConfig::default();
        config.apply_json(r#"{"foo":1,"fw_version":"2.1"}"#).unwrap();
        assert_eq!(config.fw_version.as_str(), "2.1");
    }

    #[test]
    fn test_invalid_json_leaves_config_untouched() {
        let mut config = DeviceConfig::default();
        config.apply_json(r#"{"nodename":"A"}"#).unwrap();
        let before = config.clone();
        assert_eq!(config.apply_json("{nodename"), Err(ConfigError::InvalidJson));
        assert_eq!(config, before);
    }

    #[test]
    fn test_too_long_value_is_atomic() {
        let mut config = DeviceConfig::default();
        let json = r#"{"nodename":"B","configbrokeruser":"0123456789012345678901234567890123456789"}"#;
        assert_eq!(config.apply_json(json), Err(ConfigError::ValueTooLong));
        assert!(config.node_name.is_empty());
    }

    #[test]
    fn test_personal_parameters() {
        let mut config = DeviceConfig::default();
        config
            .apply_json(r#"{"personalParameters":"farbe:rot,zahl:7,leer"}"#)
            .unwrap();
        assert_eq!(config.parameter("farbe"), Some("rot"));
        assert_eq!(config.parameter("zahl"), Some("7"));
        assert_eq!(config.parameter("leer"), Some(""));
        assert_eq!(config.parameter("fehlt"), None);
    }

    #[test]
    fn test_at_most_eight_parameters() {
        let mut config = DeviceConfig::default();
        config
            .apply_json(r#"{"personalParameters":"a:1,b:2,c:3,d:4,e:5,f:6,g:7,h:8,i:9"}"#)
            .unwrap();
        assert_eq!(config.personal_parameters.len(), MAX_PERSONAL_PARAMETERS);
        assert_eq!(config.parameter("i"), None);
    }
}

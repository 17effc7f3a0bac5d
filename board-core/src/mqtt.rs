//! MQTT-Sitzungszustand
//!
//! Gruppen-Präfix, Management-Topics, Resubscribe-Ring und Heartbeat-Takt.
//! Die eigentliche Verbindung liegt hinter [`MqttTransport`](crate::traits::MqttTransport).

use core::fmt::Write;
use heapless::String;

use crate::traits::MqttError;
use crate::types::{DeviceInfo, Topic};

/// Anzahl gemerkter Subscriptions für den Reconnect
pub const RESUBSCRIBE_SLOTS: usize = 10;
/// Basis-Präfix aller Gruppen-Topics
pub const DEFAULT_BASE_TOPIC: &str = "";

// Unter-Topics des Status-Heartbeats
pub const STATUS_LIB_VERSION: &str = "/libversion";
pub const STATUS_FIRMWARE: &str = "/firmware";
pub const STATUS_RESET_REASON: &str = "/resetReason";
pub const STATUS_NUMBER: &str = "/number";
pub const STATUS_LOG: &str = "/log";

pub const UPDATE_CONFIGURATION: &str = "configuration";
pub const UPDATE_FIRMWARE: &str = "firmware";

/// Zuletzt abonnierte Topics, neueste zuerst; leere Slots sind frei
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRing {
    slots: [Topic; RESUBSCRIBE_SLOTS],
}

impl SubscriptionRing {
    /// Fügt vorne ein; der älteste Slot fällt heraus
    pub fn push_front(&mut self, topic: &str) {
        self.slots.rotate_right(1);
        self.slots[0].clear();
        let _ = self.slots[0].push_str(topic);
    }

    /// Leert alle Slots mit diesem Topic
    pub fn remove(&mut self, topic: &str) {
        for slot in self.slots.iter_mut().filter(|s| s.as_str() == topic) {
            slot.clear();
        }
    }

    /// Belegte Slots, neueste zuerst
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter(|s| !s.is_empty()).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geräte-spezifische Management-Topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementTopics {
    pub request_password: String<64>,
    pub update: String<64>,
    pub enable_log: String<64>,
    pub response_password: String<64>,
    pub status: String<64>,
}

impl ManagementTopics {
    /// `/management/to/<MAC>/...` (eingehend) und `/management/from/<MAC>/...` (ausgehend)
    pub fn for_device(info: &DeviceInfo) -> Self {
        let mac = info.mac_compact();
        let build = |dir: &str, leaf: &str| {
            let mut topic = String::new();
            let _ = write!(topic, "/management/{}/{}/{}", dir, mac, leaf);
            topic
        };
        Self {
            request_password: build("to", "reqBrokerPwd"),
            update: build("to", "update"),
            enable_log: build("to", "enableMQTTLog"),
            response_password: build("from", "resBrokerPwd"),
            status: build("from", "status"),
        }
    }

    /// Status-Unter-Topic, z.B. `.../status/firmware`
    pub fn status_topic(&self, leaf: &str) -> Topic {
        let mut topic = Topic::new();
        let _ = write!(topic, "{}{}", self.status, leaf);
        topic
    }
}

#[derive(Debug, Clone)]
pub struct MqttSession {
    base: String<32>,
    group: Topic,
    pub ring: SubscriptionRing,
    pub topics: ManagementTopics,
    last_heartbeat_ms: Option<u64>,
    pub log_mirroring: bool,
    /// `RGB/COLOR` steuert die LED
    pub rgb_remote: bool,
    /// `MATRIX/ICON` und `MATRIX/TEXT` steuern die Matrix
    pub matrix_remote: bool,
}

impl MqttSession {
    pub fn new(info: &DeviceInfo, base: &str) -> Self {
        let base = String::try_from(base).unwrap_or_default();
        let group = Topic::try_from(base.as_str()).unwrap_or_default();
        Self {
            base,
            group,
            ring: SubscriptionRing::default(),
            topics: ManagementTopics::for_device(info),
            last_heartbeat_ms: None,
            log_mirroring: false,
            rgb_remote: false,
            matrix_remote: false,
        }
    }

    pub fn group(&self) -> &str {
        self.group.as_str()
    }

    /// Setzt das Gruppen-Präfix auf `<basis><gruppe>/` (leer = nur Basis)
    pub fn set_group(&mut self, group: &str) -> Result<(), MqttError> {
        let mut prefix = Topic::new();
        prefix.push_str(&self.base).map_err(|_| MqttError::TopicTooLong)?;
        if !group.is_empty() {
            prefix.push_str(group).map_err(|_| MqttError::TopicTooLong)?;
            prefix.push('/').map_err(|_| MqttError::TopicTooLong)?;
        }
        self.group = prefix;
        Ok(())
    }

    /// Topic inkl. Gruppen-Präfix
    pub fn group_topic(&self, topic: &str) -> Result<Topic, MqttError> {
        join(&self.group, topic)
    }

    /// Topic ohne Gruppe (nur Basis-Präfix)
    pub fn public_topic(&self, topic: &str) -> Result<Topic, MqttError> {
        join(&self.base, topic)
    }

    /// Entfernt das Gruppen-Präfix für den Anwendungs-Callback
    pub fn strip_group<'t>(&self, topic: &'t str) -> &'t str {
        topic.strip_prefix(self.group.as_str()).unwrap_or(topic)
    }

    /// Ist ein Heartbeat fällig?
    pub fn heartbeat_due(&self, now_ms: u64, period_secs: u32) -> bool {
        match self.last_heartbeat_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) / 1000 > u64::from(period_secs),
        }
    }

    pub fn mark_heartbeat(&mut self, now_ms: u64) {
        self.last_heartbeat_ms = Some(now_ms);
    }
}

fn join(prefix: &str, topic: &str) -> Result<Topic, MqttError> {
    let mut full = Topic::new();
    full.push_str(prefix).map_err(|_| MqttError::TopicTooLong)?;
    full.push_str(topic).map_err(|_| MqttError::TopicTooLong)?;
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DeviceInfo {
        DeviceInfo {
            mac: [0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03],
            reset_reason: "PowerOn",
            board_number: 3,
            device_type: "ESP32C6",
            name_prefix: "Lernboard",
        }
    }

    #[test]
    fn test_management_topics() {
        let topics = ManagementTopics::for_device(&info());
        assert_eq!(topics.request_password.as_str(), "/management/to/AABBCC010203/reqBrokerPwd");
        assert_eq!(topics.response_password.as_str(), "/management/from/AABBCC010203/resBrokerPwd");
        assert_eq!(topics.status_topic(STATUS_FIRMWARE).as_str(), "/management/from/AABBCC010203/status/firmware");
    }

    #[test]
    fn test_group_prefix() {
        let mut session = MqttSession::new(&info(), DEFAULT_BASE_TOPIC);
        assert_eq!(session.group_topic("RGB/COLOR").unwrap().as_str(), "RGB/COLOR");
        session.set_group("klasse5a").unwrap();
        assert_eq!(session.group_topic("RGB/COLOR").unwrap().as_str(), "klasse5a/RGB/COLOR");
        assert_eq!(session.public_topic("news").unwrap().as_str(), "news");
        assert_eq!(session.strip_group("klasse5a/MESSAGE"), "MESSAGE");
        assert_eq!(session.strip_group("andere/MESSAGE"), "andere/MESSAGE");
    }

    #[test]
    fn test_ring_keeps_ten_newest_first() {
        let mut ring = SubscriptionRing::default();
        for topic in ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10"] {
            ring.push_front(topic);
        }
        assert_eq!(ring.len(), RESUBSCRIBE_SLOTS);
        assert_eq!(ring.iter().next(), Some("t10"));
        assert!(!ring.iter().any(|t| t == "t0"));

        ring.remove("t5");
        assert_eq!(ring.len(), RESUBSCRIBE_SLOTS - 1);
    }

    #[test]
    fn test_heartbeat_period() {
        let mut session = MqttSession::new(&info(), "");
        assert!(session.heartbeat_due(0, 300));
        session.mark_heartbeat(1_000);
        assert!(!session.heartbeat_due(301_000, 300));
        assert!(session.heartbeat_due(302_000, 300));
    }
}

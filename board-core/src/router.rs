//! Einordnung eingehender MQTT-Nachrichten
//!
//! Die Ausführung der Routen übernimmt [`Board`](crate::board::Board).

use crate::mqtt::{MqttSession, UPDATE_CONFIGURATION, UPDATE_FIRMWARE};

// Anwendungs-Topics (relativ zur Gruppe)
pub const TOPIC_RGB_COLOR: &str = "RGB/COLOR";
pub const TOPIC_MATRIX_ICON: &str = "MATRIX/ICON";
pub const TOPIC_MATRIX_TEXT: &str = "MATRIX/TEXT";
pub const TOPIC_RGB_ALL: &str = "RGB/#";
pub const TOPIC_MATRIX_ALL: &str = "MATRIX/#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    PasswordRequest,
    ConfigUpdate,
    FirmwareUpdate,
    /// Update-Topic mit unbekannter Nutzlast
    UpdateIgnored,
    LogMirroring(bool),
    RgbColor,
    MatrixIcon,
    MatrixText,
    /// Keine eingebaute Aktion
    Application,
}

impl Route {
    pub fn classify(topic: &str, payload: &str, session: &MqttSession) -> Self {
        let topics = &session.topics;
        if topic == topics.request_password {
            return Route::PasswordRequest;
        }
        if topic == topics.update {
            return match payload {
                UPDATE_CONFIGURATION => Route::ConfigUpdate,
                UPDATE_FIRMWARE => Route::FirmwareUpdate,
                _ => Route::UpdateIgnored,
            };
        }
        if topic == topics.enable_log {
            return Route::LogMirroring(payload == "on");
        }

        let Some(local) = topic.strip_prefix(session.group()) else {
            return Route::Application;
        };
        if session.rgb_remote && local.starts_with(TOPIC_RGB_COLOR) {
            Route::RgbColor
        } else if session.matrix_remote && local.starts_with(TOPIC_MATRIX_ICON) {
            Route::MatrixIcon
        } else if session.matrix_remote && local.starts_with(TOPIC_MATRIX_TEXT) {
            Route::MatrixText
        } else {
            Route::Application
        }
    }
}

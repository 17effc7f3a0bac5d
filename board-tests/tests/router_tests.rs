//! Integration Tests für das Nachrichten-Routing eingehender MQTT-Nachrichten

mod common;

use board_core::color::{BLACK, GREEN, RED, STATE_ERROR, STATE_UPDATE};
use board_core::{Cycles, Effect, FirmwareUpdate, UpdateError};
use common::{BROKER_CONFIG, Harness, with_rt};
use embassy_futures::block_on;

const TO: &str = "/management/to/5CCF7F4F2A10";
const FROM: &str = "/management/from/5CCF7F4F2A10";

fn inbound(h: &Harness, topic: &str, payload: &str) {
    h.mqtt.borrow_mut().push_inbound(topic, payload);
}

// ============================================================================
// Tests: Management-Topics
// ============================================================================

#[test]
fn test_password_request_is_answered() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));

    inbound(&h, &format!("{TO}/reqBrokerPwd"), "");
    block_on(board.loop_once());

    assert_eq!(h.mqtt.borrow().published_on(&format!("{FROM}/resBrokerPwd")), ["pw123"]);
}

#[test]
fn test_log_mirroring_toggle() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    let log_topic = format!("{FROM}/status/log");

    block_on(board.log("vorher"));
    inbound(&h, &format!("{TO}/enableMQTTLog"), "on");
    block_on(board.loop_once());
    block_on(board.log("hallo"));

    inbound(&h, &format!("{TO}/enableMQTTLog"), "off");
    block_on(board.loop_once());
    block_on(board.log("nachher"));

    assert_eq!(h.mqtt.borrow().published_on(&log_topic), ["hallo"]);
}

#[test]
fn test_config_update_saves_and_restarts() {
    let h = Harness::online();
    let new_config = r#"{"configbrokerurl":"neu.local","configbrokerport":8883}"#;
    h.updater.borrow_mut().config_response = Ok(new_config.to_string());

    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "configuration");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 1);
    assert_eq!(h.storage.get("/conf.json").unwrap(), new_config);
    assert_eq!(board.config().broker_host, "neu.local");
    assert_eq!(board.config().broker_port, 8883);
    assert!(!h.mqtt.borrow().connected);

    let updater = h.updater.borrow();
    assert_eq!(updater.config_requests[0], ("update.local".to_string(), "5C:CF:7F:4F:2A:10".to_string()));
}

#[test]
fn test_config_update_without_new_config() {
    let h = Harness::online();
    h.updater.borrow_mut().config_response = Err(UpdateError::Status(304));

    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "configuration");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 0);
    assert_eq!(h.storage.get("/conf.json").unwrap(), BROKER_CONFIG);
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.color(), STATE_UPDATE);
        assert_eq!(rt.rgb.effect(), Effect::BLINK);
        assert_ne!(rt.matrix.buffer(), &[0u16; 8]);
    });
}

#[test]
fn test_invalid_config_is_not_saved() {
    let h = Harness::online();
    h.updater.borrow_mut().config_response = Ok("{kaputt".to_string());

    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "configuration");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 0);
    assert_eq!(h.storage.get("/conf.json").unwrap(), BROKER_CONFIG);
    assert_eq!(board.config().broker_host, "broker.local");
    with_rt(&h.runtime, |rt| assert_eq!(rt.rgb.color(), STATE_UPDATE));
}

#[test]
fn test_firmware_update_failed_shows_text() {
    let h = Harness::online();
    h.updater.borrow_mut().firmware = FirmwareUpdate::Failed;

    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "firmware");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 0);
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.color(), STATE_ERROR);
        assert_eq!(rt.matrix.text(), "Update Failed! ");
        assert!(rt.matrix.text_done());
    });
}

#[test]
fn test_firmware_updated_restarts() {
    let h = Harness::online();
    h.updater.borrow_mut().firmware = FirmwareUpdate::Updated;

    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "firmware");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 1);
    assert!(!h.mqtt.borrow().connected);
    with_rt(&h.runtime, |rt| assert_eq!(rt.rgb.color(), STATE_UPDATE));
}

#[test]
fn test_firmware_up_to_date_clears_display() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    assert_eq!(block_on(board.check_firmware_update()), FirmwareUpdate::NoUpdate);

    assert_eq!(h.restarts.get(), 0);
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.shown(), BLACK);
        assert_eq!(rt.matrix.buffer(), &[0u16; 8]);
    });
}

#[test]
fn test_unknown_update_request_is_ignored() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    inbound(&h, &format!("{TO}/update"), "alles");
    block_on(board.loop_once());

    assert_eq!(h.restarts.get(), 0);
    assert!(h.updater.borrow().config_requests.is_empty());
}

// ============================================================================
// Tests: RGB und Matrix per MQTT
// ============================================================================

#[test]
fn test_rgb_requires_connect_rgb() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));

    inbound(&h, "RGB/COLOR", "FF0000");
    block_on(board.loop_once());
    assert_ne!(with_rt(&h.runtime, |rt| rt.rgb.color()), RED);

    assert!(block_on(board.connect_rgb()));
    assert_eq!(h.mqtt.borrow().subscribed.last().unwrap(), "RGB/#");

    inbound(&h, "RGB/COLOR", "FF0000:5:3");
    block_on(board.loop_once());
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.color(), RED);
        assert_eq!(rt.rgb.effect(), Effect::BLINK);
        assert_eq!(rt.rgb.cycles(), Cycles::Remaining(3));
    });
}

#[test]
fn test_invalid_color_is_ignored() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    assert!(block_on(board.connect_rgb()));

    inbound(&h, "RGB/COLOR", "00FF00");
    inbound(&h, "RGB/COLOR", "00FF00:99");
    block_on(board.loop_once());
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.color(), GREEN);
        assert_eq!(rt.rgb.effect(), Effect::On);
    });
}

#[test]
fn test_messages_are_routed_while_text_scrolls() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    assert!(block_on(board.connect_rgb()));

    inbound(&h, "RGB/COLOR", "FF0000");
    block_on(board.write_text("AB", Cycles::Remaining(1), true));

    assert!(h.mqtt.borrow().inbound.is_empty());
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.rgb.color(), RED);
        assert!(rt.matrix.text_done());
    });
}

#[test]
fn test_matrix_text_and_icon() {
    let h = Harness::online();
    let mut board = h.board();
    assert!(block_on(board.mqtt_setup()));
    assert!(block_on(board.connect_matrix()));

    inbound(&h, "MATRIX/TEXT", "HALLO");
    block_on(board.loop_once());
    assert_eq!(with_rt(&h.runtime, |rt| rt.matrix.text().to_string()), "HALLO");

    inbound(&h, "MATRIX/ICON", "B1111111111111111111111111");
    block_on(board.loop_once());
    with_rt(&h.runtime, |rt| {
        assert_eq!(rt.matrix.text(), "");
        assert!(rt.matrix.get_pixel(2, 2));
    });

    inbound(&h, "MATRIX/TEXT", "");
    block_on(board.loop_once());
    assert_eq!(with_rt(&h.runtime, |rt| *rt.matrix.buffer()), [0u16; 8]);
}

// ============================================================================
// Tests: Anwendungs-Callback
// ============================================================================

#[test]
fn test_callback_receives_topic_without_group() {
    let h = Harness::online();
    let mut seen: Vec<(String, String)> = Vec::new();
    let mut handler = |topic: &str, payload: &str| seen.push((topic.to_string(), payload.to_string()));

    let mut board = h.board();
    board.on_message(&mut handler);
    assert!(block_on(board.mqtt_setup()));
    assert!(board.set_group("g"));
    assert!(block_on(board.connect_rgb()));
    assert_eq!(h.mqtt.borrow().subscribed.last().unwrap(), "g/RGB/#");

    inbound(&h, "g/RGB/COLOR", "00FF00");
    inbound(&h, "other/RGB/COLOR", "FF0000");
    inbound(&h, "g/sensor", "42");
    block_on(board.loop_once());

    assert_eq!(with_rt(&h.runtime, |rt| rt.rgb.color()), GREEN);
    drop(board);
    assert_eq!(
        seen,
        [
            ("RGB/COLOR".to_string(), "00FF00".to_string()),
            ("other/RGB/COLOR".to_string(), "FF0000".to_string()),
            ("sensor".to_string(), "42".to_string()),
        ]
    );
}

//! Integration Tests für Taster und I/O-Pins

mod common;

use board_core::input::PinMode;
use board_core::{Button, IoPin, KeyScan, PinDirection};
use common::{Harness, runtime, tick_n, with_rt};

fn press(rt: &common::TestRuntime, a: bool, b: bool) {
    with_rt(rt, |rt| rt.bus_mut().keys = KeyScan { a, b });
    tick_n(rt, 1);
}

// ============================================================================
// Tests: Onboard-Taster
// ============================================================================

#[test]
fn test_click_counts_after_release() {
    let h = Harness::new();
    let mut board = h.board();

    press(&h.runtime, true, false);
    assert!(board.is_down(Button::A));
    assert!(!board.clicked(Button::A));

    press(&h.runtime, false, false);
    assert!(!board.is_down(Button::A));
    assert!(board.clicked(Button::A));
    assert!(!board.clicked(Button::A));
    assert!(!board.clicked(Button::B));
}

#[test]
fn test_both_buttons_consume_single_clicks() {
    let h = Harness::new();
    let mut board = h.board();

    press(&h.runtime, true, true);
    assert!(!board.clicked_both());

    press(&h.runtime, false, false);
    assert!(board.clicked_both());
    assert!(!board.clicked(Button::A));
    assert!(!board.clicked(Button::B));
    assert!(!board.clicked_both());
}

#[test]
fn test_failed_key_scan_keeps_state() {
    let rt = runtime();
    press(&rt, true, false);

    with_rt(&rt, |rt| {
        rt.bus_mut().fail_keys = true;
        rt.bus_mut().keys = KeyScan::default();
    });
    tick_n(&rt, 3);
    assert!(with_rt(&rt, |rt| rt.input.is_down(Button::A)));
}

// ============================================================================
// Tests: I/O-Pins
// ============================================================================

#[test]
fn test_pin_output_follows_duty_cycle() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.input.set_pin_effect(IoPin::D5, 3));

    let mut levels = Vec::new();
    for _ in 0..10 {
        tick_n(&rt, 1);
        levels.push(with_rt(&rt, |rt| rt.pins().levels[IoPin::D5.index()]));
    }

    assert_eq!(
        with_rt(&rt, |rt| rt.pins().directions[IoPin::D5.index()]),
        Some(PinDirection::Output)
    );
    assert_eq!(levels, [true, true, true, false, false, false, false, false, false, false]);
}

#[test]
fn test_pin_effect_duty_is_capped() {
    let rt = runtime();
    with_rt(&rt, |rt| {
        rt.input.set_pin_effect(IoPin::D7, 200);
        assert_eq!(rt.input.pin_mode(IoPin::D7), PinMode::Output(10));
    });
    tick_n(&rt, 10);
    assert!(with_rt(&rt, |rt| rt.pins().levels[IoPin::D7.index()]));
}

#[test]
fn test_pin_button_click() {
    let h = Harness::new();
    let mut board = h.board();
    with_rt(&h.runtime, |rt| rt.input.enable_pin_button(IoPin::D0));
    tick_n(&h.runtime, 1);
    assert_eq!(
        with_rt(&h.runtime, |rt| rt.pins().directions[IoPin::D0.index()]),
        Some(PinDirection::InputPullUp)
    );

    // Aktiv LOW
    with_rt(&h.runtime, |rt| rt.pins_mut().low[IoPin::D0.index()] = true);
    tick_n(&h.runtime, 1);
    assert!(!board.pin_clicked(IoPin::D0));
    with_rt(&h.runtime, |rt| rt.pins_mut().low[IoPin::D0.index()] = false);
    tick_n(&h.runtime, 1);
    assert!(board.pin_clicked(IoPin::D0));
    assert!(!board.pin_clicked(IoPin::D0));
}

#[test]
fn test_clear_pin_drives_low() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.input.set_pin_effect(IoPin::D6, 10));
    tick_n(&rt, 1);
    assert!(with_rt(&rt, |rt| rt.pins().levels[IoPin::D6.index()]));

    with_rt(&rt, |rt| rt.input.clear_pin(IoPin::D6));
    tick_n(&rt, 1);
    with_rt(&rt, |rt| {
        assert!(!rt.pins().levels[IoPin::D6.index()]);
        assert_eq!(rt.input.pin_mode(IoPin::D6), PinMode::Unused);
    });
}

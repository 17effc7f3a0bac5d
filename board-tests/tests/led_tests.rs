//! Integration Tests für die RGB-Effekt-Engine
//!
//! Die Ticks werden direkt über `run_tick` ausgelöst, die Schreibzugriffe
//! landen im MockLedWriter.

mod common;

use board_core::color::{self, BLACK, RED, WHITE};
use board_core::{Cycles, Effect};
use common::{Harness, runtime, tick_n, with_rt};
use embassy_futures::block_on;
use rgb::RGB8;

fn writes(rt: &common::TestRuntime) -> Vec<RGB8> {
    with_rt(rt, |rt| rt.rgb.led().writes.clone())
}

// ============================================================================
// Tests: Effekte
// ============================================================================

#[test]
fn test_color_appears_immediately() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_color(RED)).unwrap();
    assert_eq!(writes(&rt), vec![RED]);
}

#[test]
fn test_on_counts_ten_tick_windows() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_effect(RED, Effect::On, Cycles::Remaining(2))).unwrap();

    tick_n(&rt, 20);
    assert_eq!(writes(&rt), vec![RED]);
    assert!(with_rt(&rt, |rt| rt.rgb.cycles().is_done()));

    tick_n(&rt, 1);
    assert_eq!(writes(&rt), vec![RED, BLACK]);
}

#[test]
fn test_blink_duty_cycle() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_effect(RED, Effect::BLINK, Cycles::Forever)).unwrap();

    // Fünf Ticks an, fünf Ticks aus
    tick_n(&rt, 5);
    assert_eq!(writes(&rt), vec![RED]);
    tick_n(&rt, 1);
    assert_eq!(writes(&rt), vec![RED, BLACK]);
    tick_n(&rt, 14);
    assert_eq!(writes(&rt), vec![RED, BLACK, RED, BLACK]);
}

#[test]
fn test_off_effect_stays_dark() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_effect(RED, Effect::OFF, Cycles::Forever)).unwrap();
    tick_n(&rt, 30);

    // Nur der erste Schreibzugriff zeigt die Farbe, danach bleibt die LED aus
    assert_eq!(writes(&rt), vec![RED, BLACK]);
}

#[test]
fn test_spark_decays_and_ends_dark() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_effect(RED, Effect::Spark, Cycles::Remaining(2))).unwrap();

    tick_n(&rt, 16);
    let frames = writes(&rt);
    let reds: Vec<u8> = frames.iter().map(|c| c.r).collect();
    // Jeder Funke startet hell und halbiert sich
    assert_eq!(reds[0], 255);
    assert!(reds.windows(2).any(|w| w[1] > w[0]), "second spark restarts bright");
    assert!(with_rt(&rt, |rt| rt.rgb.cycles().is_done()));

    tick_n(&rt, 1);
    assert_eq!(writes(&rt).last(), Some(&BLACK));
}

#[test]
fn test_glow_stays_within_brightness() {
    let rt = runtime();
    with_rt(&rt, |rt| {
        rt.rgb.set_brightness(100)?;
        rt.rgb.set_effect(WHITE, Effect::Glow, Cycles::Forever)
    })
    .unwrap();

    tick_n(&rt, 120);
    let frames = writes(&rt);
    let max = frames.iter().map(|c| c.r).max().unwrap();
    assert_eq!(max, color::dim(WHITE, 100).r);

    // Start ganz unten, Anstieg bis zum Maximum, danach wieder abwärts
    assert_eq!(frames[1].r, 1);
    let peak = 1 + frames[1..].iter().position(|c| c.r == max).unwrap();
    assert!(frames[peak..].iter().any(|c| c.r <= 5));
}

#[test]
fn test_brightness_rewrites_lit_led_only() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.set_color(WHITE)).unwrap();
    with_rt(&rt, |rt| rt.rgb.set_brightness(127)).unwrap();
    assert_eq!(writes(&rt), vec![WHITE, color::dim(WHITE, 127)]);

    with_rt(&rt, |rt| rt.rgb.clear()).unwrap();
    with_rt(&rt, |rt| rt.rgb.set_brightness(200)).unwrap();
    assert_eq!(writes(&rt).len(), 3);
}

#[test]
fn test_failed_write_is_retried_by_blink() {
    let rt = runtime();
    with_rt(&rt, |rt| rt.rgb.led_mut().fail_next_write = true);

    let result = with_rt(&rt, |rt| rt.rgb.set_effect(RED, Effect::BLINK, Cycles::Forever));
    assert!(result.is_err());
    assert!(writes(&rt).is_empty());

    tick_n(&rt, 1);
    assert_eq!(writes(&rt), vec![RED]);
}

// ============================================================================
// Tests: Board-Fassade
// ============================================================================

#[test]
fn test_board_color_hex() {
    let h = Harness::new();
    let mut board = h.board();

    assert!(board.set_color_hex("00FF00"));
    assert!(!board.set_color_hex("XYZ"));
    assert_eq!(writes(&h.runtime), vec![RGB8::new(0, 255, 0)]);

    board.clear_color();
    assert_eq!(writes(&h.runtime).last(), Some(&BLACK));
}

#[test]
fn test_board_sleep_drives_effects() {
    let h = Harness::new();
    let mut board = h.board();

    board.set_color_effect(RED, Effect::BLINK, Cycles::Remaining(1));
    block_on(board.sleep(1000));

    assert_eq!(h.ticks(), 20);
    assert_eq!(writes(&h.runtime), vec![RED, BLACK]);
    assert_eq!(board.now_ms(), 1000);
}

// Tick-Task: treibt LED-Effekte, Matrix und Tasten im 50-ms-Raster

use board_core::{TICK_PERIOD_MS, run_tick};
use defmt::info;
use embassy_time::{Duration, Ticker};

use crate::FirmwareRuntime;

/// Läuft für immer; verpasste Ticks holt der Ticker nach
#[embassy_executor::task]
pub async fn tick_task(runtime: &'static FirmwareRuntime) {
    info!("TICK: Starting ({} ms)", TICK_PERIOD_MS);
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(TICK_PERIOD_MS)));
    loop {
        run_tick(runtime);
        ticker.next().await;
    }
}

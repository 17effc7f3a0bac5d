// System-Dienste: Neustart, Zeitbasis, Reset-Grund, MAC

use board_core::{Clock, SystemControl};
use defmt::info;
use embassy_time::Instant;
use esp_hal::rtc_cntl::{SocResetReason, reset_reason};
use esp_hal::system::Cpu;

pub struct EspSystem;

impl SystemControl for EspSystem {
    fn restart(&mut self) {
        info!("SYSTEM: Restarting...");
        esp_hal::system::software_reset();
    }
}

/// Millisekunden seit dem Booten (embassy-time)
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Reset-Grund im Klartext für den Status-Heartbeat
pub fn reset_reason_name() -> &'static str {
    match reset_reason(Cpu::ProCpu) {
        Some(SocResetReason::ChipPowerOn) => "PowerOn",
        Some(SocResetReason::CoreSw) | Some(SocResetReason::Cpu0Sw) => "Software/System restart",
        Some(SocResetReason::CoreDeepSleep) => "Deep-Sleep Wake",
        Some(SocResetReason::SysBrownOut) => "BrownOut",
        Some(SocResetReason::CoreMwdt0) | Some(SocResetReason::CoreRtcWdt) => "Watchdog",
        Some(_) => "Other",
        None => "Unknown",
    }
}

/// Station-MAC aus dem eFuse
pub fn station_mac() -> [u8; 6] {
    esp_hal::efuse::Efuse::mac_address()
}

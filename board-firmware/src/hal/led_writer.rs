// RGB-LED über das RMT-Peripheral (WS2812/Neopixel)

use board_core::{LedError, SmartLedWriter};
use esp_hal::Blocking;
use esp_hal::rmt::{PulseCode, Rmt};
use esp_hal::time::Rate;
use esp_hal_smartled::SmartLedsAdapter;
use rgb::RGB8;
use smart_leds_trait::SmartLedsWrite;

/// Buffer-Größe für 1 LED (3 Farben * 8 Bits + 1 Reset)
pub const LED_BUFFER_SIZE: usize = 25;

/// Die Onboard-LED des Lernboards
///
/// Der RMT-Buffer muss 'static sein, weil der Writer in der geteilten
/// Runtime lebt und vom Tick-Task beschrieben wird.
pub struct RmtLedWriter {
    led: SmartLedsAdapter<'static, LED_BUFFER_SIZE>,
}

impl RmtLedWriter {
    /// # Parameter
    /// - `pin`: Datenleitung der LED
    /// - `rmt_peripheral`: RMT Peripheral
    /// - `rmt_clock_mhz`: RMT Clock Frequenz in MHz (z.B. 80)
    /// - `buffer`: Puls-Buffer (erstellt mit `smart_led_buffer!(1)`)
    pub fn new(
        pin: esp_hal::peripherals::GPIO8<'static>,
        rmt_peripheral: esp_hal::peripherals::RMT<'static>,
        rmt_clock_mhz: u32,
        buffer: &'static mut [PulseCode; LED_BUFFER_SIZE],
    ) -> Self {
        let rmt: Rmt<'static, Blocking> =
            Rmt::new(rmt_peripheral, Rate::from_mhz(rmt_clock_mhz)).expect("Failed to initialize RMT");

        Self {
            led: SmartLedsAdapter::new(rmt.channel0, pin, buffer),
        }
    }
}

impl SmartLedWriter for RmtLedWriter {
    fn write(&mut self, color: RGB8) -> Result<(), LedError> {
        self.led
            .write([color].into_iter())
            .map_err(|_| LedError::WriteFailed)
    }
}

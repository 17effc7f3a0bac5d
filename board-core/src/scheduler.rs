//! 50-ms-Tick-Scheduler
//!
//! Der Tick-Kontext (Timer-Task in der Firmware, simulierte Verzögerung in
//! Tests) ruft [`run_tick`] auf. Foreground und Tick laufen auf demselben
//! Executor; der Mutex serialisiert nur den Zugriff auf die Runtime und sperrt
//! keine Interrupts, auch nicht während I2C- oder RMT-Transfers.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use crate::input::InputEngine;
use crate::matrix::MatrixEngine;
use crate::led::RgbEngine;
use crate::traits::{MatrixBus, PinIo, SmartLedWriter};

/// Periode des Tick-Kontexts
pub const TICK_PERIOD_MS: u32 = 50;

/// Monoton steigender (überlaufender) Tick-Zähler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounter(u32);

impl TickCounter {
    pub fn value(self) -> u32 {
        self.0
    }

    fn advance(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

/// Periodisch auszuführende Arbeit
pub trait PeriodicTask {
    fn on_tick(&mut self);
}

/// Gesamter Zustand, den der Tick-Kontext bedient
pub struct BoardRuntime<B, L: SmartLedWriter, P> {
    ticks: TickCounter,
    pub input: InputEngine,
    pub rgb: RgbEngine<L>,
    pub matrix: MatrixEngine,
    bus: B,
    pins: P,
}

impl<B: MatrixBus, L: SmartLedWriter, P: PinIo> BoardRuntime<B, L, P> {
    pub fn new(bus: B, led: L, pins: P) -> Self {
        Self {
            ticks: TickCounter::default(),
            input: InputEngine::new(),
            rgb: RgbEngine::new(led),
            matrix: MatrixEngine::new(),
            bus,
            pins,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.value()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Ein Tick in fester Reihenfolge: Eingaben → RGB → Matrix
    pub fn tick(&mut self) {
        let tick = self.ticks.advance();

        let keys = match self.bus.read_keys() {
            Ok(keys) => Some(keys),
            Err(_) => {
                warn!("TICK: Key scan failed");
                None
            }
        };
        self.input.poll(keys, &mut self.pins);

        if self.rgb.advance().is_err() {
            warn!("TICK: RGB write failed");
        }

        self.matrix.advance(tick, &mut self.bus);
    }
}

impl<B: MatrixBus, L: SmartLedWriter, P: PinIo> PeriodicTask for BoardRuntime<B, L, P> {
    fn on_tick(&mut self) {
        self.tick();
    }
}

/// Zwischen Foreground und Tick geteilte Runtime
pub type SharedRuntime<B, L, P> = Mutex<NoopRawMutex, RefCell<BoardRuntime<B, L, P>>>;

pub fn share<B: MatrixBus, L: SmartLedWriter, P: PinIo>(runtime: BoardRuntime<B, L, P>) -> SharedRuntime<B, L, P> {
    Mutex::new(RefCell::new(runtime))
}

/// Führt einen Tick unter dem Mutex aus
pub fn run_tick<T: PeriodicTask>(shared: &Mutex<NoopRawMutex, RefCell<T>>) {
    shared.lock(|cell| cell.borrow_mut().on_tick());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl PeriodicTask for Counter {
        fn on_tick(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_run_tick_advances_shared_task() {
        let shared: Mutex<NoopRawMutex, RefCell<Counter>> = Mutex::new(RefCell::new(Counter(0)));
        run_tick(&shared);
        run_tick(&shared);
        assert_eq!(shared.lock(|cell| cell.borrow().0), 2);
    }

    #[test]
    fn test_tick_and_foreground_interleave_on_one_executor() {
        use embassy_futures::{block_on, join::join, yield_now};

        let shared: Mutex<NoopRawMutex, RefCell<Counter>> = Mutex::new(RefCell::new(Counter(0)));
        let ticks = async {
            for _ in 0..3 {
                run_tick(&shared);
                yield_now().await;
            }
        };
        let foreground = async {
            let mut seen = [0u32; 3];
            for slot in seen.iter_mut() {
                *slot = shared.lock(|cell| cell.borrow().0);
                yield_now().await;
            }
            seen
        };

        let ((), seen) = block_on(join(ticks, foreground));
        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn test_tick_counter_wraps() {
        let mut counter = TickCounter(u32::MAX);
        assert_eq!(counter.advance(), 0);
        assert_eq!(counter.advance(), 1);
    }
}

//! Board collaborators for the core: status LED, watchdog, storage and the
//! parts this board does not fit (fuel gauge, radio).

use core::task::Poll;

use defmt::{info, Format};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use hal_abstractions::{
    BatteryReading, FuelGauge, LinkStatus, NetworkInfo, NotFitted, SensorReading, Status,
    StatusLeds, Storage, Watchdog, Wireless,
};
use heapless::HistoryBuffer;
use naturalist_core::Platform;

use crate::clock::BoardClock;

/// Readings kept in RAM
pub const LOG_CAPACITY: usize = 256;

pub struct FeatherPlatform;

impl Platform for FeatherPlatform {
    type Clock = BoardClock;
    type Leds = StatusLed;
    type Watchdog = Iwdg;
    type Gauge = NoGauge;
    type Storage = RamLog;
    type Radio = NoRadio;
}

/// The red user LED on PC1, lit while busy or in trouble
pub struct StatusLed {
    led: Output<'static>,
}

impl StatusLed {
    pub fn new(led: Output<'static>) -> Self {
        Self { led }
    }
}

impl StatusLeds for StatusLed {
    fn show(&mut self, status: Status) {
        match status {
            Status::Ready => self.led.set_low(),
            Status::Starting | Status::Busy | Status::Caution | Status::Fatal => {
                self.led.set_high()
            }
        }
    }
}

/// Independent watchdog; once started it cannot be stopped
pub struct Iwdg {
    wdg: IndependentWatchdog<'static, IWDG>,
}

impl Iwdg {
    pub fn new(wdg: IndependentWatchdog<'static, IWDG>) -> Self {
        Self { wdg }
    }
}

impl Watchdog for Iwdg {
    fn started(&mut self) {
        self.wdg.unleash();
        info!("Watchdog armed");
    }

    fn feed(&mut self) {
        self.wdg.pet();
    }
}

/// The Feather has no fuel gauge
pub struct NoGauge;

impl FuelGauge for NoGauge {
    type Error = NotFitted;

    fn read(&mut self) -> Result<BatteryReading, NotFitted> {
        Err(NotFitted)
    }
}

#[derive(Clone, Copy, Format)]
pub struct Record {
    pub module: u8,
    pub reading: SensorReading,
}

/// Keeps the most recent readings in RAM, oldest dropped first
pub struct RamLog {
    records: HistoryBuffer<Record, LOG_CAPACITY>,
}

impl RamLog {
    pub const fn new() -> Self {
        Self {
            records: HistoryBuffer::new(),
        }
    }

    /// Records held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&Record> {
        self.records.recent()
    }
}

impl Storage for RamLog {
    type Error = NotFitted;

    fn setup(&mut self) -> Result<(), NotFitted> {
        self.records.clear();
        Ok(())
    }

    fn append(&mut self, module: u8, reading: &SensorReading) -> Result<(), NotFitted> {
        self.records.write(Record {
            module,
            reading: *reading,
        });
        Ok(())
    }
}

/// No radio fitted: every connect fails and the link stays down
pub struct NoRadio;

impl Wireless for NoRadio {
    type Error = NotFitted;

    fn connect(&mut self, _network: &NetworkInfo) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn link(&mut self) -> LinkStatus {
        LinkStatus::Down
    }

    fn disconnect(&mut self) {}

    fn accept(&mut self) -> bool {
        false
    }

    fn serve(&mut self) -> Poll<Result<(), NotFitted>> {
        Poll::Ready(Err(NotFitted))
    }

    fn begin_upload(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn poll_upload(&mut self) -> Poll<Result<u32, NotFitted>> {
        Poll::Ready(Err(NotFitted))
    }

    fn request_time(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn poll_time(&mut self) -> Poll<Result<u32, NotFitted>> {
        Poll::Ready(Err(NotFitted))
    }
}

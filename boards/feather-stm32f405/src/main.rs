#![deny(unsafe_code)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod clock;
mod platform;
mod sensors;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true)]
mod app {
    use super::*;
    use core::cell::RefCell;
    use defmt::{error, info};
    use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
    use embassy_stm32::gpio::{Level, Output, Speed};
    use embassy_stm32::i2c::{self, I2c};
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals;
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::wdg::IndependentWatchdog;
    use embassy_stm32::Peri;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex;
    use hal_abstractions::Absent;
    use naturalist_core::{check, Device, DeviceConfig, Fitted, NaturalistReadings, Sensors, Services};
    use static_cell::StaticCell;

    use clock::BoardClock;
    use platform::{FeatherPlatform, Iwdg, NoGauge, NoRadio, RamLog, StatusLed};
    use sensors::{Mpl3115a2, Sht31, Tsl2591};

    /// No IMU, microphone or gauge on this board
    const FITTED: Fitted = Fitted {
        inertial: false,
        audio: false,
        gauge: false,
        ..Fitted::ALL
    };

    /// Long enough to cover the slowest main-loop step
    const WATCHDOG_TIMEOUT_US: u32 = 8_000_000;

    type I2cBus = Mutex<CriticalSectionRawMutex, RefCell<I2c<'static, Blocking>>>;
    type SharedI2c = I2cDevice<'static, CriticalSectionRawMutex, I2c<'static, Blocking>>;
    type Readings =
        NaturalistReadings<Sht31<SharedI2c>, Mpl3115a2<SharedI2c>, Tsl2591<SharedI2c>, Absent, Absent>;

    /// Peripherals handed from init to the main loop
    pub struct Board {
        i2c: Peri<'static, peripherals::I2C1>,
        scl: Peri<'static, peripherals::PB6>,
        sda: Peri<'static, peripherals::PB7>,
        rtc: Peri<'static, peripherals::RTC>,
        iwdg: Peri<'static, peripherals::IWDG>,
        led: Output<'static>,
    }

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        board: Option<Board>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Naturalist starting...");

        let p = embassy_stm32::init(clock::rcc_config());

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let board = Board {
            i2c: p.I2C1,
            scl: p.PB6,
            sda: p.PB7,
            rtc: p.RTC,
            iwdg: p.IWDG,
            led: Output::new(p.PC1, Level::High, Speed::Low),
        };

        (Shared {}, Local { board: Some(board) })
    }

    /// Main loop: the cooperative runtime owns the CPU from here on
    #[idle(local = [board])]
    fn idle(cx: idle::Context) -> ! {
        let Some(board) = cx.local.board.take() else {
            halt();
        };

        static I2C_BUS: StaticCell<I2cBus> = StaticCell::new();
        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = Hertz(100_000);
        let i2c = I2c::new_blocking(board.i2c, board.scl, board.sda, i2c_config);
        let bus: &'static I2cBus = I2C_BUS.init(Mutex::new(RefCell::new(i2c)));

        // Drivers take turns on the bus; only one touches it within a step
        let mut sensors = Sensors {
            hygrometer: Sht31::new(I2cDevice::new(bus)),
            barometer: Mpl3115a2::new(I2cDevice::new(bus)),
            light: Tsl2591::new(I2cDevice::new(bus)),
            inertial: Absent,
            audio: Absent,
        };

        let mut services = Services::<FeatherPlatform>::new(
            DeviceConfig::default(),
            BoardClock::new(Rtc::new(board.rtc, RtcConfig::default())),
            StatusLed::new(board.led),
            Iwdg::new(IndependentWatchdog::new(board.iwdg, WATCHDOG_TIMEOUT_US)),
            NoGauge,
            RamLog::new(),
            NoRadio,
        );

        if cfg!(feature = "self-check") {
            let report = check(&mut sensors, FITTED, &mut services);
            info!("{}", report);
            halt();
        }

        let readings: Readings = NaturalistReadings::new(sensors);
        let mut device = Device::new(services, readings);
        if let Err(e) = device.begin() {
            error!("Boot failed: {}", e);
            halt();
        }

        let mut cycles = 0;
        loop {
            if let Err(e) = device.tick() {
                error!("Halting: {}", e);
                halt();
            }

            let cx = device.services();
            if cx.state.cycles() != cycles {
                cycles = cx.state.cycles();
                if let Some(latest) = cx.storage.latest() {
                    info!("RAM log holds {} records, latest {}", cx.storage.len(), latest);
                }
            }
        }
    }

    /// Park the CPU. If the watchdog is armed it resets the board.
    fn halt() -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}

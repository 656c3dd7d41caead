//! Board time: TIM2 monotonic for uptime, the internal RTC (LSE-clocked)
//! for wall-clock time.

use defmt::warn;
use embassy_stm32::rcc::{self, Hse, HseMode, LsConfig, LseConfig, LseMode};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc};
use embassy_stm32::time::Hertz;
use hal_abstractions::{Clock, WallClock};
use rtic_monotonics::stm32::prelude::*;

use crate::Mono;

const SECONDS_PER_DAY: u32 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const EPOCH_SHIFT: i32 = 719_468;

/// Clock tree for the Adafruit Feather STM32F405.
///
/// 12 MHz HSE / 6 = 2 MHz PLL input, x168 = 336 MHz VCO, /4 = 84 MHz SYSCLK
/// (/7 = 48 MHz for USB). APB1 runs at 42 MHz, so TIM2 sees 84 MHz. The RTC
/// runs off the 32.768 kHz LSE crystal on PC14/PC15.
pub fn rcc_config() -> embassy_stm32::Config {
    let mut config = embassy_stm32::Config::default();
    let clocks = &mut config.rcc;

    clocks.hse = Some(Hse {
        freq: Hertz(12_000_000),
        mode: HseMode::Oscillator,
    });
    clocks.pll_src = rcc::PllSource::HSE;
    clocks.pll = Some(rcc::Pll {
        prediv: rcc::PllPreDiv::DIV6,
        mul: rcc::PllMul::MUL168,
        divp: Some(rcc::PllPDiv::DIV4),
        divq: Some(rcc::PllQDiv::DIV7),
        divr: None,
    });
    clocks.sys = rcc::Sysclk::PLL1_P;
    clocks.ahb_pre = rcc::AHBPrescaler::DIV1;
    clocks.apb1_pre = rcc::APBPrescaler::DIV2;
    clocks.apb2_pre = rcc::APBPrescaler::DIV1;

    clocks.ls = LsConfig {
        rtc: rcc::RtcClockSource::LSE,
        lsi: false,
        lse: Some(LseConfig {
            frequency: Hertz(32_768),
            mode: LseMode::Oscillator(rcc::LseDrive::MediumHigh),
        }),
    };

    config
}

/// Uptime and RTC wall clock
pub struct BoardClock {
    rtc: Rtc,
}

impl BoardClock {
    pub fn new(rtc: Rtc) -> Self {
        Self { rtc }
    }
}

impl Clock for BoardClock {
    fn uptime_ms(&self) -> u32 {
        // Wraps after ~49 days; the core works in wrapping arithmetic
        Mono::now().duration_since_epoch().to_millis() as u32
    }
}

impl WallClock for BoardClock {
    /// Zero until the first successful set
    fn unix_time(&self) -> u32 {
        match self.rtc.now() {
            Ok(now) => unix_from_datetime(&now),
            Err(_) => 0,
        }
    }

    fn set_unix_time(&mut self, unix_secs: u32) {
        let Some(datetime) = datetime_from_unix(unix_secs) else {
            warn!("RTC: {} out of range", unix_secs);
            return;
        };
        if self.rtc.set_datetime(datetime).is_err() {
            warn!("RTC: write failed");
        }
    }
}

/// Civil date from days since the Unix epoch (Hinnant's `civil_from_days`)
fn civil_from_days(days: i32) -> (u16, u8, u8) {
    let z = days + EPOCH_SHIFT;
    let era = z.div_euclid(146_097);
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe as i32 + era * 400 + i32::from(month <= 2);
    (year as u16, month, day)
}

/// Days since the Unix epoch of a civil date (Hinnant's `days_from_civil`)
fn days_from_civil(year: u16, month: u8, day: u8) -> i32 {
    let (y, m) = if month <= 2 {
        (i32::from(year) - 1, u32::from(month) + 9)
    } else {
        (i32::from(year), u32::from(month) - 3)
    };
    let era = y.div_euclid(400);
    let yoe = (y - era * 400) as u32;
    let doy = (153 * m + 2) / 5 + u32::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i32 - EPOCH_SHIFT
}

fn weekday(days: i32) -> DayOfWeek {
    // 1970-01-01 was a Thursday
    match (days + 3).rem_euclid(7) {
        0 => DayOfWeek::Monday,
        1 => DayOfWeek::Tuesday,
        2 => DayOfWeek::Wednesday,
        3 => DayOfWeek::Thursday,
        4 => DayOfWeek::Friday,
        5 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    }
}

fn datetime_from_unix(unix_secs: u32) -> Option<DateTime> {
    let days = (unix_secs / SECONDS_PER_DAY) as i32;
    let secs = unix_secs % SECONDS_PER_DAY;
    let (year, month, day) = civil_from_days(days);
    DateTime::from(
        year,
        month,
        day,
        weekday(days),
        (secs / 3600) as u8,
        (secs % 3600 / 60) as u8,
        (secs % 60) as u8,
        0,
    )
    .ok()
}

fn unix_from_datetime(datetime: &DateTime) -> u32 {
    let days = days_from_civil(datetime.year(), datetime.month(), datetime.day());
    if days < 0 {
        return 0;
    }
    (days as u32) * SECONDS_PER_DAY
        + u32::from(datetime.hour()) * 3600
        + u32::from(datetime.minute()) * 60
        + u32::from(datetime.second())
}

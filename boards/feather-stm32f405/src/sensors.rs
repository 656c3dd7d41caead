//! Drivers for the sensors on the naturalist wing
//!
//! All three share I2C1. Each driver keeps to short register transactions
//! and the conversion waits stay within a main-loop step.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use hal_abstractions::{
    Barometer, BarometricReading, Hygrometer, HygrometerReading, LightSensor, Luminosity,
};

/// Sensor driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum SensorError {
    /// Bus transaction failed
    Bus,
    /// Device answered with the wrong id
    WrongDevice,
    /// Conversion did not complete in time
    NotReady,
}

/// Busy-wait delay at the configured SYSCLK
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        const SYSCLK_MHZ: u32 = 84;
        cortex_m::asm::delay((ns / 1000).max(1) * SYSCLK_MHZ);
    }
}

/// SHT31 temperature and humidity sensor
pub struct Sht31<B> {
    bus: B,
}

impl<B: I2c> Sht31<B> {
    const ADDRESS: u8 = 0x44;
    const SOFT_RESET: [u8; 2] = [0x30, 0xA2];
    /// Single shot, high repeatability, no clock stretching
    const MEASURE: [u8; 2] = [0x24, 0x00];

    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// CRC-8, polynomial 0x31, init 0xFF
    fn crc(data: &[u8]) -> u8 {
        data.iter().fold(0xFF, |mut crc, byte| {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ 0x31
                } else {
                    crc << 1
                };
            }
            crc
        })
    }
}

impl<B: I2c> Hygrometer for Sht31<B> {
    type Error = SensorError;

    fn begin(&mut self) -> Result<(), SensorError> {
        self.bus
            .write(Self::ADDRESS, &Self::SOFT_RESET)
            .map_err(|_| SensorError::Bus)?;
        SpinDelay.delay_ms(10);
        Ok(())
    }

    /// A frame with a bad checksum reads as NaN
    fn read(&mut self) -> Result<HygrometerReading, SensorError> {
        self.bus
            .write(Self::ADDRESS, &Self::MEASURE)
            .map_err(|_| SensorError::Bus)?;
        SpinDelay.delay_ms(16);

        let mut frame = [0u8; 6];
        self.bus
            .read(Self::ADDRESS, &mut frame)
            .map_err(|_| SensorError::Bus)?;

        if Self::crc(&frame[0..2]) != frame[2] || Self::crc(&frame[3..5]) != frame[5] {
            return Ok(HygrometerReading {
                temperature_c: f32::NAN,
                humidity: f32::NAN,
            });
        }

        let raw_t = f32::from(u16::from_be_bytes([frame[0], frame[1]]));
        let raw_h = f32::from(u16::from_be_bytes([frame[3], frame[4]]));
        Ok(HygrometerReading {
            temperature_c: -45.0 + 175.0 * raw_t / 65535.0,
            humidity: 100.0 * raw_h / 65535.0,
        })
    }
}

/// MPL3115A2 barometric pressure sensor
pub struct Mpl3115a2<B> {
    bus: B,
}

impl<B: I2c> Mpl3115a2<B> {
    const ADDRESS: u8 = 0x60;
    const STATUS: u8 = 0x00;
    const OUT_P_MSB: u8 = 0x01;
    const WHO_AM_I: u8 = 0x0C;
    const CTRL_REG1: u8 = 0x26;
    const PT_DATA_CFG: u8 = 0x13;
    const DEVICE_ID: u8 = 0xC4;
    /// Barometer mode, 8x oversampling, one-shot
    const ONE_SHOT: u8 = 0b0001_1010;
    const PRESSURE_READY: u8 = 0x04;
    const SEA_LEVEL_PA: f32 = 101_325.0;

    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.bus
            .write(Self::ADDRESS, &[register, value])
            .map_err(|_| SensorError::Bus)
    }

    fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.bus
            .write_read(Self::ADDRESS, &[register], buf)
            .map_err(|_| SensorError::Bus)
    }
}

impl<B: I2c> Barometer for Mpl3115a2<B> {
    type Error = SensorError;

    fn begin(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8];
        self.read_registers(Self::WHO_AM_I, &mut id)?;
        if id[0] != Self::DEVICE_ID {
            return Err(SensorError::WrongDevice);
        }
        // Data-ready flags for pressure and temperature
        self.write_register(Self::PT_DATA_CFG, 0x07)
    }

    fn read(&mut self) -> Result<BarometricReading, SensorError> {
        self.write_register(Self::CTRL_REG1, Self::ONE_SHOT)?;

        let mut status = [0u8];
        let mut ready = false;
        for _ in 0..10 {
            SpinDelay.delay_ms(5);
            self.read_registers(Self::STATUS, &mut status)?;
            if status[0] & Self::PRESSURE_READY != 0 {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(SensorError::NotReady);
        }

        let mut out = [0u8; 5];
        self.read_registers(Self::OUT_P_MSB, &mut out)?;

        // Q18.2 pascals in the top 20 bits
        let raw_p = (u32::from(out[0]) << 16 | u32::from(out[1]) << 8 | u32::from(out[2])) >> 4;
        let pressure_pa = raw_p as f32 / 4.0;
        // Q8.4 degrees in the top 12 bits
        let raw_t = i16::from_be_bytes([out[3], out[4]]) >> 4;
        let temperature_c = f32::from(raw_t) / 16.0;
        let altitude_m = 44_330.77 * (1.0 - libm::powf(pressure_pa / Self::SEA_LEVEL_PA, 0.190_263_2));

        Ok(BarometricReading {
            pressure_pa,
            altitude_m,
            temperature_c,
        })
    }
}

/// TSL2591 light sensor
pub struct Tsl2591<B> {
    bus: B,
}

impl<B: I2c> Tsl2591<B> {
    const ADDRESS: u8 = 0x29;
    const COMMAND: u8 = 0xA0;
    const ENABLE: u8 = 0x00;
    const CONTROL: u8 = 0x01;
    const ID: u8 = 0x12;
    const C0DATAL: u8 = 0x14;
    const DEVICE_ID: u8 = 0x50;
    const POWER_ON_ALS: u8 = 0x03;
    /// Medium gain (25x), 100ms integration
    const GAIN_MED_100MS: u8 = 0x10;
    const GAIN: f32 = 25.0;
    const INTEGRATION_MS: f32 = 100.0;
    const LUX_DF: f32 = 408.0;

    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.bus
            .write(Self::ADDRESS, &[Self::COMMAND | register, value])
            .map_err(|_| SensorError::Bus)
    }
}

impl<B: I2c> LightSensor for Tsl2591<B> {
    type Error = SensorError;

    fn begin(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8];
        self.bus
            .write_read(Self::ADDRESS, &[Self::COMMAND | Self::ID], &mut id)
            .map_err(|_| SensorError::Bus)?;
        if id[0] != Self::DEVICE_ID {
            return Err(SensorError::WrongDevice);
        }
        self.write_register(Self::CONTROL, Self::GAIN_MED_100MS)?;
        self.write_register(Self::ENABLE, Self::POWER_ON_ALS)
    }

    /// Latest completed integration; the ALS free-runs after `begin()`
    fn read(&mut self) -> Result<Luminosity, SensorError> {
        let mut data = [0u8; 4];
        self.bus
            .write_read(Self::ADDRESS, &[Self::COMMAND | Self::C0DATAL], &mut data)
            .map_err(|_| SensorError::Bus)?;
        let full = u32::from(u16::from_le_bytes([data[0], data[1]]));
        let ir = u32::from(u16::from_le_bytes([data[2], data[3]]));
        Ok(Luminosity::from_packed(ir << 16 | full))
    }

    fn lux(&self, luminosity: Luminosity) -> f32 {
        if luminosity.full == 0 || luminosity.full == u16::MAX || luminosity.ir == u16::MAX {
            return 0.0;
        }
        let full = f32::from(luminosity.full);
        let ir = f32::from(luminosity.ir);
        let cpl = Self::INTEGRATION_MS * Self::GAIN / Self::LUX_DF;
        ((full - ir) * (1.0 - ir / full) / cpl).max(0.0)
    }
}

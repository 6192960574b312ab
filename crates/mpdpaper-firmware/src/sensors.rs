//! SHT30 temperature and humidity sensor.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const SHT30_ADDR: u8 = 0x44;

/// Single shot, high repeatability, clock stretching
const MEASURE_COMMAND: [u8; 2] = [0x2C, 0x06];
const MEASURE_WAIT_MS: u32 = 20;

#[derive(Debug)]
pub enum SensorError<E> {
    I2c(E),
    Checksum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn word(chunk: &[u8]) -> Option<u16> {
    match chunk {
        [hi, lo, crc] if crc8(&[*hi, *lo]) == *crc => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

pub struct Sht30<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Sht30<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    pub fn measure<D: DelayNs>(&mut self, delay: &mut D) -> Result<Climate, SensorError<I2C::Error>> {
        self.i2c
            .write(SHT30_ADDR, &MEASURE_COMMAND)
            .map_err(SensorError::I2c)?;
        delay.delay_ms(MEASURE_WAIT_MS);

        let mut raw = [0u8; 6];
        self.i2c
            .read(SHT30_ADDR, &mut raw)
            .map_err(SensorError::I2c)?;
        let temperature = word(&raw[0..3]).ok_or(SensorError::Checksum)?;
        let humidity = word(&raw[3..6]).ok_or(SensorError::Checksum)?;

        Ok(Climate {
            temperature_c: -45.0 + 175.0 * f32::from(temperature) / 65_535.0,
            humidity_pct: 100.0 * f32::from(humidity) / 65_535.0,
        })
    }
}

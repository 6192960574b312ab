//! BM8563 real-time clock: wall time and the wake-up timer.

use embedded_hal::i2c::I2c;
use mpdpaper_core::DateTime;

pub const BM8563_ADDR: u8 = 0x51;

const REG_CONTROL1: u8 = 0x00;
const REG_CONTROL2: u8 = 0x01;
const REG_SECONDS: u8 = 0x02;
const REG_TIMER_CONTROL: u8 = 0x0E;
const REG_TIMER: u8 = 0x0F;

/// Timer interrupt enable (TIE) and timer flag (TF)
const TIMER_WAKE_BITS: u8 = 0b101;
const TIMER_INTERRUPT_ENABLE: u8 = 0b001;
/// Alarm flag, cleared when arming the timer
const ALARM_FLAG: u8 = 0b1000_0000;
/// Enabled, 1 Hz source
const TIMER_SECONDS: u8 = 0x82;
/// Enabled, 1/60 Hz source
const TIMER_MINUTES: u8 = 0x83;

fn bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub struct Bm8563<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Bm8563<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(BM8563_ADDR, &[register], &mut value)?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(BM8563_ADDR, &[register, value])
    }

    /// Whether the armed timer fired. Must be read before [`Self::reset_control`].
    pub fn timer_fired(&mut self) -> Result<bool, I2C::Error> {
        let status = self.read_register(REG_CONTROL2)?;
        Ok(status & TIMER_WAKE_BITS == TIMER_WAKE_BITS)
    }

    /// Clear interrupt flags and start the oscillator
    pub fn reset_control(&mut self) -> Result<(), I2C::Error> {
        self.write_register(REG_CONTROL1, 0)?;
        self.write_register(REG_CONTROL2, 0)
    }

    pub fn time(&mut self) -> Result<DateTime, I2C::Error> {
        let mut raw = [0u8; 7];
        self.i2c
            .write_read(BM8563_ADDR, &[REG_SECONDS], &mut raw)?;
        Ok(DateTime::new(
            2000 + u16::from(bcd(raw[6])),
            bcd(raw[5] & 0x1F),
            bcd(raw[3] & 0x3F),
            bcd(raw[2] & 0x3F),
            bcd(raw[1] & 0x7F),
            bcd(raw[0] & 0x7F),
        ))
    }

    pub fn set_time(&mut self, time: &DateTime) -> Result<(), I2C::Error> {
        let year = time.year.saturating_sub(2000).min(99) as u8;
        self.i2c.write(
            BM8563_ADDR,
            &[
                REG_SECONDS,
                to_bcd(time.second),
                to_bcd(time.minute),
                to_bcd(time.hour),
                to_bcd(time.day),
                time.weekday(),
                to_bcd(time.month),
                to_bcd(year),
            ],
        )
    }

    /// Arm the countdown timer to raise INT after `seconds`. Counts in
    /// minutes above 255 s.
    pub fn arm_timer(&mut self, seconds: u32) -> Result<(), I2C::Error> {
        let (control, value) = if seconds > 255 {
            (TIMER_MINUTES, (seconds / 60).min(255) as u8)
        } else {
            (TIMER_SECONDS, seconds.max(1) as u8)
        };
        self.write_register(REG_TIMER, value)?;
        self.write_register(REG_TIMER_CONTROL, control)?;

        let status = self.read_register(REG_CONTROL2)?;
        self.write_register(
            REG_CONTROL2,
            (status | TIMER_INTERRUPT_ENABLE) & !ALARM_FLAG,
        )
    }
}

//! GT911 capacitive touch controller.

use embedded_hal::i2c::I2c;
use mpdpaper_core::{TouchPoint, DISPLAY_WIDTH};

pub const GT911_ADDR: u8 = 0x14;

const REG_STATUS: u16 = 0x814E;
const REG_FIRST_POINT: u16 = 0x814F;
const POINT_STRIDE: u16 = 8;
const MAX_POINTS: u8 = 2;
const STATUS_READY: u8 = 0x80;

pub struct Gt911<I2C> {
    i2c: I2C,
    was_down: bool,
}

impl<I2C: I2c> Gt911<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            was_down: false,
        }
    }

    fn read(&mut self, register: u16, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c
            .write_read(GT911_ADDR, &register.to_be_bytes(), buf)
    }

    fn write(&mut self, register: u16, value: u8) -> Result<(), I2C::Error> {
        let [hi, lo] = register.to_be_bytes();
        self.i2c.write(GT911_ADDR, &[hi, lo, value])
    }

    /// Points that touched down since the last scan, in portrait coordinates
    pub fn scan(&mut self) -> Result<Vec<TouchPoint>, I2C::Error> {
        let mut status = [0u8; 1];
        self.read(REG_STATUS, &mut status)?;
        if status[0] & STATUS_READY == 0 {
            return Ok(Vec::new());
        }
        let count = (status[0] & 0x0F).min(MAX_POINTS);

        let mut points = Vec::new();
        for index in 0..u16::from(count) {
            let mut raw = [0u8; 8];
            self.read(REG_FIRST_POINT + index * POINT_STRIDE, &mut raw)?;
            let raw_x = u16::from_le_bytes([raw[1], raw[2]]);
            let raw_y = u16::from_le_bytes([raw[3], raw[4]]);
            let x = (DISPLAY_WIDTH as u16).saturating_sub(raw_y);
            points.push(TouchPoint::new(x, raw_x));
        }
        self.write(REG_STATUS, 0)?;

        let down = !points.is_empty();
        let pressed = down && !self.was_down;
        self.was_down = down;
        if pressed {
            Ok(points)
        } else {
            Ok(Vec::new())
        }
    }
}

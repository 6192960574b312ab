//! Graphics support via embedded-graphics
//!
//! This module provides [`Canvas`], a packed 4bpp grayscale framebuffer that
//! implements the [`DrawTarget`](embedded_graphics_core::draw_target::DrawTarget)
//! trait. Its byte layout is exactly what
//! [`Display::update`](crate::display::Display::update) expects, so a canvas
//! covering one screen region can be pushed without conversion.
//!
//! ## Example
//!
//! ```rust,ignore
//! use it8951::{Area, Canvas, UpdateMode};
//! use embedded_graphics::{
//!     mono_font::{ascii::FONT_10X20, MonoTextStyle},
//!     pixelcolor::Gray4,
//!     prelude::*,
//!     text::Text,
//! };
//!
//! let mut canvas = Canvas::new(vec![0u8; 540 * 40 / 2], 540, 40)?;
//! canvas.clear(Gray4::WHITE)?;
//! Text::new("Hello", Point::new(10, 25), MonoTextStyle::new(&FONT_10X20, Gray4::BLACK))
//!     .draw(&mut canvas)?;
//!
//! display.update(Area::new(0, 0, 540, 40), canvas.as_bytes(), UpdateMode::Du4, &mut delay)?;
//! ```

use core::convert::Infallible;

use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{Gray4, GrayColor},
    prelude::Pixel,
};

use crate::error::BuilderError;

/// Packed 4bpp framebuffer, two pixels per byte, left pixel in the high nibble
///
/// `0x0` is black and `0xF` is white, matching the controller.
pub struct Canvas<B> {
    buffer: B,
    width: u16,
    height: u16,
}

impl<B> Canvas<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Wrap `buffer` as a `width` x `height` canvas
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::InvalidDimensions`] when `width` is not a
    /// multiple of 4, and [`BuilderError::BufferTooSmall`] when the buffer
    /// holds fewer than `width * height / 2` bytes.
    pub fn new(buffer: B, width: u16, height: u16) -> Result<Self, BuilderError> {
        if width == 0 || height == 0 || width % 4 != 0 {
            return Err(BuilderError::InvalidDimensions {
                rows: height,
                cols: width,
            });
        }
        let required = width as usize * height as usize / 2;
        let provided = buffer.as_ref().len();
        if provided < required {
            return Err(BuilderError::BufferTooSmall { required, provided });
        }
        Ok(Self {
            buffer,
            width,
            height,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Packed pixel bytes in wire order
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.width as usize * self.height as usize / 2;
        &self.buffer.as_ref()[..len]
    }

    /// Fill every pixel with `color`
    pub fn fill(&mut self, color: Gray4) {
        let luma = color.luma();
        let byte = (luma << 4) | luma;
        let len = self.width as usize * self.height as usize / 2;
        self.buffer.as_mut()[..len].fill(byte);
    }

    /// Read back one pixel, `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<Gray4> {
        let (index, high) = self.locate(x, y)?;
        let byte = self.buffer.as_ref()[index];
        let luma = if high { byte >> 4 } else { byte & 0x0F };
        Some(Gray4::new(luma))
    }

    /// Number of pixels darker than mid gray
    pub fn dark_pixel_count(&self) -> usize {
        self.as_bytes()
            .iter()
            .map(|byte| usize::from(byte >> 4 < 8) + usize::from(byte & 0x0F < 8))
            .sum()
    }

    fn locate(&self, x: u32, y: u32) -> Option<(usize, bool)> {
        if x >= self.width as u32 || y >= self.height as u32 {
            return None;
        }
        let offset = y as usize * self.width as usize + x as usize;
        Some((offset / 2, offset % 2 == 0))
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Gray4) {
        let Some((index, high)) = self.locate(x, y) else {
            return;
        };
        let luma = color.luma() & 0x0F;
        let byte = &mut self.buffer.as_mut()[index];
        *byte = if high {
            (*byte & 0x0F) | (luma << 4)
        } else {
            (*byte & 0xF0) | luma
        };
    }
}

impl<B> OriginDimensions for Canvas<B> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl<B> DrawTarget for Canvas<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    type Color = Gray4;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set_pixel(point.x as u32, point.y as u32, color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use embedded_graphics_core::geometry::Point;

    use super::*;

    #[test]
    fn rejects_unaligned_width_and_short_buffer() {
        assert!(matches!(
            Canvas::new([0u8; 64], 6, 2),
            Err(BuilderError::InvalidDimensions { rows: 2, cols: 6 })
        ));
        assert!(matches!(
            Canvas::new([0u8; 3], 4, 2),
            Err(BuilderError::BufferTooSmall {
                required: 4,
                provided: 3
            })
        ));
    }

    #[test]
    fn left_pixel_lands_in_high_nibble() {
        let mut canvas = Canvas::new([0xFFu8; 4], 4, 2).unwrap();
        canvas
            .draw_iter([Pixel(Point::new(0, 0), Gray4::BLACK)])
            .unwrap();
        canvas
            .draw_iter([Pixel(Point::new(3, 1), Gray4::new(0x5))])
            .unwrap();
        assert_eq!(canvas.as_bytes(), &[0x0F, 0xFF, 0xFF, 0xF5]);
        assert_eq!(canvas.pixel(0, 0), Some(Gray4::BLACK));
        assert_eq!(canvas.pixel(3, 1), Some(Gray4::new(0x5)));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn clear_and_count_dark_pixels() {
        let mut canvas = Canvas::new([0u8; 8], 4, 4).unwrap();
        canvas.clear(Gray4::WHITE).unwrap();
        assert_eq!(canvas.dark_pixel_count(), 0);
        canvas
            .draw_iter([
                Pixel(Point::new(1, 1), Gray4::BLACK),
                Pixel(Point::new(-1, 0), Gray4::BLACK),
                Pixel(Point::new(9, 0), Gray4::BLACK),
            ])
            .unwrap();
        assert_eq!(canvas.dark_pixel_count(), 1);
    }
}

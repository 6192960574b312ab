//! Core display operations

use embedded_hal::delay::DelayNs;

use crate::command::*;
use crate::config::{Area, Config, Dimensions, Rotation, UpdateMode};
use crate::error::Error;
use crate::interface::DisplayInterface;

/// Bytes streamed per transfer when filling the image buffer
const FILL_CHUNK: usize = 240;

/// Controller information returned by `GET_DEV_INFO`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub panel_width: u16,
    pub panel_height: u16,
    /// Base address of the image buffer in controller SDRAM
    pub image_buffer_address: u32,
}

impl DeviceInfo {
    fn from_words(words: &[u16; DEV_INFO_WORDS]) -> Self {
        Self {
            panel_width: words[0],
            panel_height: words[1],
            image_buffer_address: words[2] as u32 | ((words[3] as u32) << 16),
        }
    }
}

/// Core display driver for IT8951
///
/// Pixel data is loaded in logical (rotated) coordinates; the controller
/// applies the rotation on load and this driver maps display commands back
/// to native coordinates.
pub struct Display<I>
where
    I: DisplayInterface,
{
    interface: I,
    config: Config,
    info: Option<DeviceInfo>,
}

impl<I> Display<I>
where
    I: DisplayInterface,
{
    /// Create a new Display instance
    pub fn new(interface: I, config: Config) -> Self {
        Self {
            interface,
            config,
            info: None,
        }
    }

    /// Wake the controller, read its device information and apply configuration
    ///
    /// Enables packed pixel writes and programs VCOM.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interface`] if the controller does not answer.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<DeviceInfo, Error<I>> {
        self.interface.busy_wait(delay).map_err(Error::Interface)?;
        self.send_command(SYS_RUN)?;

        self.send_command(GET_DEV_INFO)?;
        let mut words = [0u16; DEV_INFO_WORDS];
        self.interface
            .read_words(&mut words)
            .map_err(Error::Interface)?;
        let info = DeviceInfo::from_words(&words);
        log::info!(
            "it8951: panel {}x{} image buffer 0x{:08x}",
            info.panel_width,
            info.panel_height,
            info.image_buffer_address
        );

        self.write_register(I80CPCR, 0x0001)?;
        self.send_command(VCOM)?;
        self.send_words(&[0x0001, self.config.vcom_mv])?;

        self.info = Some(info);
        Ok(info)
    }

    /// Load packed 4bpp pixels for `area` and refresh it with `mode`
    ///
    /// # Arguments
    ///
    /// * `area` - Logical rectangle, x and width multiples of 4
    /// * `pixels` - `area.buffer_size()` bytes, two pixels per byte, left pixel in the high nibble
    /// * `mode` - Waveform for the refresh
    /// * `delay` - Delay implementation for busy polling
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArea`] or [`Error::BufferTooSmall`] for bad input,
    /// [`Error::NotInitialized`] before [`init`](Self::init), and
    /// [`Error::Interface`] on communication failures.
    pub fn update<D: DelayNs>(
        &mut self,
        area: Area,
        pixels: &[u8],
        mode: UpdateMode,
        delay: &mut D,
    ) -> Result<(), Error<I>> {
        self.load_area(area, pixels, delay)?;
        self.display_area(area, mode, delay)
    }

    /// Load packed pixels into the controller image buffer without refreshing
    pub fn load_area<D: DelayNs>(
        &mut self,
        area: Area,
        pixels: &[u8],
        delay: &mut D,
    ) -> Result<(), Error<I>> {
        if !self.config.contains(&area) {
            return Err(Error::InvalidArea(area));
        }
        let required = area.buffer_size();
        if pixels.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                provided: pixels.len(),
            });
        }

        self.begin_load(area, delay)?;
        self.interface
            .write_pixels(&pixels[..required])
            .map_err(Error::Interface)?;
        self.send_command(LD_IMG_END)
    }

    /// Trigger a waveform update of a previously loaded logical area
    pub fn display_area<D: DelayNs>(
        &mut self,
        area: Area,
        mode: UpdateMode,
        delay: &mut D,
    ) -> Result<(), Error<I>> {
        if !self.config.contains(&area) {
            return Err(Error::InvalidArea(area));
        }
        let native = self.config.to_native(area);
        self.wait_for_display(delay)?;
        self.send_command(DPY_AREA)?;
        self.send_words(&[
            native.x,
            native.y,
            native.width,
            native.height,
            mode as u16,
        ])
    }

    /// Fill the whole panel with white and refresh with the INIT waveform
    pub fn clear<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        let dims = self.config.rotated_dimensions();
        let area = Area::new(0, 0, dims.cols, dims.rows);
        self.begin_load(area, delay)?;

        let white = [0xFFu8; FILL_CHUNK];
        let mut remaining = area.buffer_size();
        while remaining > 0 {
            let len = remaining.min(FILL_CHUNK);
            self.interface
                .write_pixels(&white[..len])
                .map_err(Error::Interface)?;
            remaining -= len;
        }
        self.send_command(LD_IMG_END)?;
        self.display_area(area, UpdateMode::Init, delay)
    }

    /// Put the controller to sleep; [`init`](Self::init) wakes it again
    pub fn sleep<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.wait_for_display(delay)?;
        self.send_command(SLEEP)
    }

    /// Put the controller in standby between updates
    pub fn standby<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        self.wait_for_display(delay)?;
        self.send_command(STANDBY)
    }

    /// Poll the LUT engine until every running waveform has finished
    pub fn wait_for_display<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I>> {
        let mut waited = 0u32;
        while self.read_register(LUTAFSR)? != 0 {
            delay.delay_ms(1);
            waited += 1;
            if waited >= self.config.busy_timeout_ms {
                return Err(Error::DisplayTimeout);
            }
        }
        Ok(())
    }

    fn begin_load<D: DelayNs>(&mut self, area: Area, delay: &mut D) -> Result<(), Error<I>> {
        let address = self
            .info
            .map(|info| info.image_buffer_address)
            .ok_or(Error::NotInitialized)?;
        self.wait_for_display(delay)?;
        self.write_register(LISAR + 2, (address >> 16) as u16)?;
        self.write_register(LISAR, address as u16)?;

        let flags = ((self.config.endian as u16) << 8)
            | (PIXEL_FORMAT_4BPP << 4)
            | self.config.rotation as u16;
        self.send_command(LD_IMG_AREA)?;
        self.send_words(&[flags, area.x, area.y, area.width, area.height])
    }

    fn write_register(&mut self, register: u16, value: u16) -> Result<(), Error<I>> {
        self.send_command(REG_WR)?;
        self.send_words(&[register, value])
    }

    fn read_register(&mut self, register: u16) -> Result<u16, Error<I>> {
        self.send_command(REG_RD)?;
        self.send_words(&[register])?;
        let mut value = [0u16; 1];
        self.interface
            .read_words(&mut value)
            .map_err(Error::Interface)?;
        Ok(value[0])
    }

    /// Send a command to the display controller
    fn send_command(&mut self, cmd: u16) -> Result<(), Error<I>> {
        self.interface.write_command(cmd).map_err(Error::Interface)
    }

    /// Send argument words to the display controller
    fn send_words(&mut self, words: &[u16]) -> Result<(), Error<I>> {
        self.interface.write_words(words).map_err(Error::Interface)
    }

    /// Device information, available after [`init`](Self::init)
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.info
    }

    /// Get native panel dimensions
    pub fn dimensions(&self) -> &Dimensions {
        &self.config.dimensions
    }

    /// Get display rotation
    pub fn rotation(&self) -> Rotation {
        self.config.rotation
    }

    /// Access the underlying configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access the underlying interface
    pub fn interface(&self) -> &I {
        &self.interface
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::config::{Builder, Dimensions, Rotation};

    #[derive(Debug, PartialEq)]
    enum Frame {
        Command(u16),
        Words(Vec<u16>),
        Pixels(usize),
    }

    #[derive(Debug, Default)]
    struct RecordingInterface {
        frames: Vec<Frame>,
        reads: Vec<Vec<u16>>,
    }

    impl DisplayInterface for RecordingInterface {
        type Error = ();

        fn write_command(&mut self, command: u16) -> Result<(), ()> {
            self.frames.push(Frame::Command(command));
            Ok(())
        }

        fn write_words(&mut self, words: &[u16]) -> Result<(), ()> {
            self.frames.push(Frame::Words(words.to_vec()));
            Ok(())
        }

        fn write_pixels(&mut self, pixels: &[u8]) -> Result<(), ()> {
            self.frames.push(Frame::Pixels(pixels.len()));
            Ok(())
        }

        fn read_words(&mut self, words: &mut [u16]) -> Result<(), ()> {
            let next = if self.reads.is_empty() {
                vec![0; words.len()]
            } else {
                self.reads.remove(0)
            };
            words.copy_from_slice(&next[..words.len()]);
            Ok(())
        }

        fn busy_wait<D: DelayNs>(&mut self, _delay: &mut D) -> Result<(), ()> {
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn display() -> Display<RecordingInterface> {
        let config = Builder::new()
            .dimensions(Dimensions::new(540, 960).unwrap())
            .rotation(Rotation::Rotate90)
            .build()
            .unwrap();
        let mut info = vec![0u16; DEV_INFO_WORDS];
        info[0] = 960;
        info[1] = 540;
        info[2] = 0x36e0;
        info[3] = 0x0012;
        let interface = RecordingInterface {
            frames: Vec::new(),
            reads: vec![info],
        };
        Display::new(interface, config)
    }

    #[test]
    fn init_reads_device_info_and_sets_vcom() {
        let mut display = display();
        let info = display.init(&mut NoDelay).unwrap();
        assert_eq!(info.panel_width, 960);
        assert_eq!(info.image_buffer_address, 0x0012_36e0);

        let frames = &display.interface().frames;
        assert_eq!(frames[0], Frame::Command(SYS_RUN));
        assert_eq!(frames[1], Frame::Command(GET_DEV_INFO));
        assert!(frames.contains(&Frame::Words(vec![I80CPCR, 1])));
        assert!(frames.contains(&Frame::Words(vec![1, 2300])));
    }

    #[test]
    fn update_before_init_is_rejected() {
        let mut display = display();
        let pixels = vec![0xFF; 540 * 40 / 2];
        let result = display.update(
            Area::new(0, 0, 540, 40),
            &pixels,
            UpdateMode::Du4,
            &mut NoDelay,
        );
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn update_loads_rotated_area_and_displays_native_area() {
        let mut display = display();
        display.init(&mut NoDelay).unwrap();
        display.interface.frames.clear();

        let pixels = vec![0xFF; 540 * 40 / 2];
        display
            .update(Area::new(0, 920, 540, 40), &pixels, UpdateMode::A2, &mut NoDelay)
            .unwrap();

        let frames = &display.interface().frames;
        let flags = (1 << 8) | (PIXEL_FORMAT_4BPP << 4) | 1;
        assert!(frames.contains(&Frame::Words(vec![flags, 0, 920, 540, 40])));
        assert!(frames.contains(&Frame::Pixels(10_800)));
        assert!(frames.contains(&Frame::Command(LD_IMG_END)));
        assert_eq!(
            frames.last(),
            Some(&Frame::Words(vec![920, 0, 40, 540, UpdateMode::A2 as u16]))
        );
    }

    #[test]
    fn update_rejects_short_buffer() {
        let mut display = display();
        display.init(&mut NoDelay).unwrap();
        let result = display.update(
            Area::new(0, 0, 540, 40),
            &[0u8; 16],
            UpdateMode::Gc16,
            &mut NoDelay,
        );
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall {
                required: 10_800,
                provided: 16
            })
        ));
    }

    #[test]
    fn clear_streams_whole_frame() {
        let mut display = display();
        display.init(&mut NoDelay).unwrap();
        display.interface.frames.clear();
        display.clear(&mut NoDelay).unwrap();

        let streamed: usize = display
            .interface()
            .frames
            .iter()
            .map(|frame| match frame {
                Frame::Pixels(len) => *len,
                _ => 0,
            })
            .sum();
        assert_eq!(streamed, 540 * 960 / 2);
    }
}

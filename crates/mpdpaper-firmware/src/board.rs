use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_svc::hal::gpio::{Gpio27, Input, PinDriver};
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver};
use it8951::Interface;
use mpdpaper_core::{Board, EpdSurface, TcpConnector};

use crate::display::It8951Panel;
use crate::input::M5PaperInput;
use crate::nvs_config::NvsConfigStore;
use crate::power::EspPlatform;
use crate::sd_card::SdConfigSource;
use crate::wifi::WifiManager;

/// The I2C bus shared by touch, RTC and climate sensor
pub type SharedI2c = RefCellDevice<'static, I2cDriver<'static>>;

pub type PanelInterface =
    Interface<SpiDeviceDriver<'static, &'static SpiDriver<'static>>, PinDriver<'static, Gpio27, Input>>;

pub struct M5Paper;

impl Board for M5Paper {
    type Display = EpdSurface<It8951Panel<PanelInterface>>;
    type Input = M5PaperInput;
    type Platform = EspPlatform;
    type Network = WifiManager;
    type Connector = TcpConnector;
    type ConfigSource = SdConfigSource;
    type ConfigStore = NvsConfigStore;
}

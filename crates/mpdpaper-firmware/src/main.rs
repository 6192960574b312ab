mod board;
mod display;
mod input;
mod nvs_config;
mod power;
mod rtc;
mod sd_card;
mod sensors;
mod touch;
mod wifi;

use core::cell::RefCell;

use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::{
    gpio::{InputPin, OutputPin, PinDriver},
    i2c::{I2cConfig, I2cDriver},
    peripherals::Peripherals,
    spi::{config::Config, Dma, SpiDeviceDriver, SpiDriver, SpiDriverConfig},
    units::Hertz,
};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use it8951::{Builder, Dimensions, Interface, Rotation};
use mpdpaper_core::{Context, EpdSurface, Session, SessionSettings, TcpConnector, WakeCause};

use board::M5Paper;
use display::It8951Panel;
use input::M5PaperInput;
use nvs_config::NvsConfigStore;
use power::{EspPlatform, PowerRails};
use rtc::Bm8563;
use sd_card::SdConfigSource;
use sensors::Sht30;
use touch::Gt911;
use wifi::WifiManager;

const WATCHDOG_TIMEOUT_MS: u32 = 10_000;
/// Native panel geometry, shown rotated to portrait
const PANEL_ROWS: u16 = 540;
const PANEL_COLS: u16 = 960;
const PANEL_VCOM_MV: u16 = 2_300;
const PANEL_SPI_HZ: u32 = 10_000_000;
const I2C_HZ: u32 = 400_000;
const SPI_DMA_BYTES: usize = 4_096;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    power::log_heap("startup");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // Hold the main power latch before anything else; releasing it on
    // battery switches the board off.
    let mut rails = PowerRails {
        main: PinDriver::output(pins.gpio2.downgrade_output())?,
        epd: PinDriver::output(pins.gpio23.downgrade_output())?,
        external: PinDriver::output(pins.gpio5.downgrade_output())?,
    };
    rails.main.set_high()?;
    rails.external.set_high()?;
    rails.epd.set_high()?;

    power::init_task_watchdog(WATCHDOG_TIMEOUT_MS);
    power::init_battery_adc();

    // Panel and SD card share one SPI bus
    let spi = SpiDriver::new(
        peripherals.spi2,
        pins.gpio14,
        pins.gpio12,
        Some(pins.gpio13),
        &SpiDriverConfig::new().dma(Dma::Auto(SPI_DMA_BYTES)),
    )?;
    let spi: &'static SpiDriver<'static> = Box::leak(Box::new(spi));

    let panel_spi_config = Config::default()
        .baudrate(Hertz(PANEL_SPI_HZ))
        .data_mode(embedded_hal::spi::MODE_0);
    let panel_spi = SpiDeviceDriver::new(spi, Some(pins.gpio15), &panel_spi_config)?;
    let hrdy = PinDriver::input(pins.gpio27)?;
    let panel_config = Builder::new()
        .dimensions(Dimensions::new(PANEL_ROWS, PANEL_COLS)?)
        .rotation(Rotation::Rotate90)
        .vcom_mv(PANEL_VCOM_MV)
        .build()?;
    let panel = it8951::Display::new(Interface::new(panel_spi, hrdy), panel_config);
    let display = EpdSurface::new(It8951Panel::new(panel))?;
    power::log_heap("after_display");

    let sd = SdConfigSource::mount(spi, pins.gpio4);

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(I2C_HZ)),
    )?;
    let i2c: &'static RefCell<I2cDriver<'static>> = Box::leak(Box::new(RefCell::new(i2c)));

    // The timer flag must be read before the control registers are reset
    let mut rtc = Bm8563::new(RefCellDevice::new(i2c));
    let wake = match rtc.timer_fired() {
        Ok(true) => WakeCause::RtcTimer,
        Ok(false) => WakeCause::User,
        Err(err) => {
            log::warn!("RTC status read failed: {:?}", err);
            WakeCause::User
        }
    };
    if let Err(err) = rtc.reset_control() {
        log::warn!("RTC reset failed: {:?}", err);
    }

    let input = M5PaperInput::new(
        PinDriver::input(pins.gpio37.downgrade_input())?,
        PinDriver::input(pins.gpio39.downgrade_input())?,
        PinDriver::input(pins.gpio38.downgrade_input())?,
        Gt911::new(RefCellDevice::new(i2c)),
    );
    let platform = EspPlatform::new(rtc, Sht30::new(RefCellDevice::new(i2c)), rails, wake);

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let network = WifiManager::new(peripherals.modem, sys_loop, nvs.clone());
    let flash = NvsConfigStore::new(nvs);

    power::log_heap("before_session");
    let ctx = Context::<M5Paper>::new(
        display,
        input,
        platform,
        network,
        TcpConnector::default(),
        sd,
        flash,
    );
    Session::new(ctx, SessionSettings::default()).run()
}

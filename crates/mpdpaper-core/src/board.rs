//! Hardware seams and the session context.
//!
//! Everything the menu engine, scheduler and status reporter touch goes
//! through the traits in this module. A [`Board`] names one concrete type per
//! seam and [`Context`] owns one instance of each, so the firmware, the
//! desktop simulator and the tests drive exactly the same control flow.

use core::fmt::{self, Debug};

use log::warn;

use crate::clock::DateTime;
use crate::config::{ConfigSource, ConfigStore, Configuration, NetworkConfig};
use crate::input::{ButtonEdges, TouchPoint};
use crate::menu::MenuLine;
use crate::mpd::{Connector, MpdClient};

/// Longest single delay before the watchdog is fed again
const MAX_UNFED_DELAY_MS: u32 = 1_000;

/// Text output to the e-paper regions.
pub trait DisplaySurface {
    type Error: Debug;

    fn init(&mut self) -> Result<(), Self::Error>;

    /// Replace the one-line top status region
    fn draw_top(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Replace the content canvas with status lines
    fn draw_status(&mut self, lines: &[String]) -> Result<(), Self::Error>;

    /// Replace the content canvas with menu rows, `selected` highlighted
    fn draw_menu(&mut self, lines: &[MenuLine], selected: usize) -> Result<(), Self::Error>;

    /// Replace the one-line bottom region
    fn draw_bottom(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Button and touch sampling, polled once per tick.
pub trait InputSource {
    /// Buttons pressed since the previous call
    fn poll_buttons(&mut self) -> ButtonEdges;

    /// Fingers that touched down since the previous call. A finger resting on
    /// the panel is reported once.
    fn poll_touches(&mut self) -> Vec<TouchPoint>;
}

/// What powered the device up this time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// The RTC timer armed before the last power-down fired
    RtcTimer,
    /// Power button, USB or reset
    User,
}

/// Device health figures for the telemetry status line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub free_heap_kb: u32,
    pub free_psram_mb: u32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Timing, clock, power and sensor services of the board.
pub trait Platform {
    /// Reset the task watchdog
    fn feed_watchdog(&mut self);

    fn delay_ms(&mut self, ms: u32);

    /// Current local time from the RTC
    fn now(&mut self) -> DateTime;

    /// Write local time to the RTC
    fn set_time(&mut self, time: &DateTime);

    fn wake_cause(&self) -> WakeCause;

    fn battery_millivolts(&mut self) -> u32;

    fn telemetry(&mut self) -> Telemetry;

    /// Arm a wake-up `seconds` from now and cut power. Never returns.
    fn power_down(&mut self, seconds: u32) -> !;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Station could not associate or obtain an address
    Association(String),
    /// SNTP did not complete
    TimeSync(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Association(msg) => write!(f, "wifi association failed: {}", msg),
            NetworkError::TimeSync(msg) => write!(f, "time sync failed: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}

/// WiFi station and network time.
pub trait Network {
    /// Associate and wait for an address; retries internally with timeouts
    fn connect(&mut self, config: &NetworkConfig) -> Result<(), NetworkError>;

    fn is_connected(&mut self) -> bool;

    fn disconnect(&mut self);

    /// Fetch local time over SNTP using the configured server and timezone
    fn sync_time(&mut self, config: &NetworkConfig) -> Result<DateTime, NetworkError>;
}

/// One concrete type per hardware seam.
pub trait Board {
    type Display: DisplaySurface;
    type Input: InputSource;
    type Platform: Platform;
    type Network: Network;
    type Connector: Connector;
    /// Removable configuration files
    type ConfigSource: ConfigSource;
    /// Persistent copy of the configuration and the active player index
    type ConfigStore: ConfigStore;
}

/// Everything a boot epoch owns, built once at startup and passed by `&mut`.
pub struct Context<B: Board> {
    pub display: B::Display,
    pub input: B::Input,
    pub platform: B::Platform,
    pub network: B::Network,
    pub player: MpdClient<B::Connector>,
    pub sd: B::ConfigSource,
    pub flash: B::ConfigStore,
    pub config: Configuration,
    /// Last known transport state of the active player
    pub playing: bool,
}

impl<B: Board> Context<B> {
    pub fn new(
        display: B::Display,
        input: B::Input,
        platform: B::Platform,
        network: B::Network,
        connector: B::Connector,
        sd: B::ConfigSource,
        flash: B::ConfigStore,
    ) -> Self {
        Self {
            display,
            input,
            platform,
            network,
            player: MpdClient::new(connector),
            sd,
            flash,
            config: Configuration::default(),
            playing: false,
        }
    }

    pub fn show_top(&mut self, text: &str) {
        self.platform.feed_watchdog();
        if let Err(err) = self.display.draw_top(text) {
            warn!("display: top line failed: {:?}", err);
        }
    }

    pub fn show_status(&mut self, lines: &[String]) {
        self.platform.feed_watchdog();
        if let Err(err) = self.display.draw_status(lines) {
            warn!("display: status failed: {:?}", err);
        }
    }

    pub fn show_menu(&mut self, lines: &[MenuLine], selected: usize) {
        self.platform.feed_watchdog();
        if let Err(err) = self.display.draw_menu(lines, selected) {
            warn!("display: menu failed: {:?}", err);
        }
    }

    pub fn show_bottom(&mut self, text: &str) {
        self.platform.feed_watchdog();
        if let Err(err) = self.display.draw_bottom(text) {
            warn!("display: bottom line failed: {:?}", err);
        }
    }

    /// Delay in slices short enough to keep the watchdog fed
    pub fn pause(&mut self, ms: u32) {
        let mut remaining = ms;
        while remaining > 0 {
            let slice = remaining.min(MAX_UNFED_DELAY_MS);
            self.platform.feed_watchdog();
            self.platform.delay_ms(slice);
            remaining -= slice;
        }
    }

    /// Bring the station up if it dropped; reports failure on the top line
    pub fn ensure_network(&mut self) -> bool {
        if self.network.is_connected() {
            return true;
        }
        match self.network.connect(&self.config.network) {
            Ok(()) => true,
            Err(err) => {
                warn!("network: {}", err);
                self.show_top(crate::session::NO_WIFI_MESSAGE);
                false
            }
        }
    }
}

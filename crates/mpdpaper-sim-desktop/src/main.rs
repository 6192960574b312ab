//! Desktop SDL simulator for the M5Paper MPD remote.
//!
//! Runs one boot epoch against a real MPD server, with the e-paper shown in
//! an SDL window. Keys stand in for the rocker switch and mouse clicks for
//! the touch panel.

use std::cell::RefCell;
use std::convert::Infallible;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use chrono::{Datelike, Local, Timelike};
use clap::Parser;
use embedded_graphics::pixelcolor::Gray4;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    sdl2::Keycode, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
};
use mpdpaper_core::layout::Area;
use mpdpaper_core::mock::MemoryConfigStore;
use mpdpaper_core::{
    Board, ButtonEdges, Button, Context, DateTime, EpdSurface, FileConfigSource, FramePanel,
    InputSource, Network, NetworkConfig, NetworkError, Panel, Platform, RefreshMode, Session,
    SessionSettings, TcpConnector, Telemetry, TouchPoint, WakeCause, DISPLAY_HEIGHT,
    DISPLAY_WIDTH,
};

#[derive(Parser, Debug)]
#[command(about = "M5Paper MPD remote simulator")]
struct Args {
    /// Directory holding wifi.txt, players.txt and favs.txt
    #[arg(default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/sd"))]
    config_dir: PathBuf,

    /// Boot as if the RTC timer fired (status refresh only, no menu)
    #[arg(long)]
    rtc_wake: bool,

    /// Window scale factor
    #[arg(long, default_value_t = 1)]
    scale: u32,
}

/// Window plus the image it shows
struct Screen {
    display: SimulatorDisplay<Gray4>,
    window: Window,
}

impl Screen {
    /// Pull pending window events, exiting on close
    fn events(&mut self) -> Vec<SimulatorEvent> {
        let events: Vec<SimulatorEvent> = self.window.events().collect();
        if events.iter().any(|event| matches!(event, SimulatorEvent::Quit))
            || events.iter().any(|event| {
                matches!(
                    event,
                    SimulatorEvent::KeyDown {
                        keycode: Keycode::Escape,
                        ..
                    }
                )
            })
        {
            log::info!("sim: window closed");
            std::process::exit(0);
        }
        events
    }
}

type SharedScreen = Rc<RefCell<Screen>>;

/// Frame panel mirrored into the simulator window after every push
struct WindowPanel {
    frame: FramePanel,
    screen: SharedScreen,
}

impl WindowPanel {
    fn present(&mut self) {
        let mut screen = self.screen.borrow_mut();
        let (width, _) = self.frame.dimensions();
        for (index, luma) in self.frame.lumas().enumerate() {
            let index = index as u32;
            let point = Point::new((index % width) as i32, (index / width) as i32);
            // Out of bounds pixels are ignored by the simulator
            let _ = Pixel(point, Gray4::new(luma)).draw(&mut screen.display);
        }
        let Screen { display, window } = &mut *screen;
        window.update(display);
    }
}

impl Panel for WindowPanel {
    type Error = Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.frame.init()?;
        self.present();
        Ok(())
    }

    fn push(&mut self, area: Area, pixels: &[u8], mode: RefreshMode) -> Result<(), Self::Error> {
        log::debug!("sim: push {:?} {:?}", area, mode);
        self.frame.push(area, pixels, mode)?;
        self.present();
        Ok(())
    }
}

/// Keyboard as buttons, mouse as touch
struct WindowInput {
    screen: SharedScreen,
    scale: u32,
    touches: Vec<TouchPoint>,
}

impl InputSource for WindowInput {
    fn poll_buttons(&mut self) -> ButtonEdges {
        let mut edges = ButtonEdges::NONE;
        self.touches.clear();
        for event in self.screen.borrow_mut().events() {
            match event {
                SimulatorEvent::KeyDown { keycode, repeat, .. } if !repeat => {
                    if let Some(button) = keycode_to_button(keycode) {
                        edges = edges.with(button);
                    }
                }
                SimulatorEvent::MouseButtonDown { point, .. } => {
                    let x = (point.x.max(0) as u32 / self.scale) as u16;
                    let y = (point.y.max(0) as u32 / self.scale) as u16;
                    self.touches.push(TouchPoint::new(x, y));
                }
                _ => {}
            }
        }
        edges
    }

    fn poll_touches(&mut self) -> Vec<TouchPoint> {
        std::mem::take(&mut self.touches)
    }
}

fn keycode_to_button(keycode: Keycode) -> Option<Button> {
    match keycode {
        Keycode::Up | Keycode::W => Some(Button::Up),
        Keycode::Down | Keycode::S => Some(Button::Down),
        Keycode::Return | Keycode::Space => Some(Button::Select),
        _ => None,
    }
}

fn local_now() -> DateTime {
    let now = Local::now();
    DateTime::new(
        now.year() as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
}

/// Host clock and canned health figures
struct HostPlatform {
    screen: SharedScreen,
    wake: WakeCause,
}

impl Platform for HostPlatform {
    fn feed_watchdog(&mut self) {}

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    fn now(&mut self) -> DateTime {
        local_now()
    }

    fn set_time(&mut self, time: &DateTime) {
        log::info!("sim: RTC would be set to {}", time);
    }

    fn wake_cause(&self) -> WakeCause {
        self.wake
    }

    fn battery_millivolts(&mut self) -> u32 {
        4_100
    }

    fn telemetry(&mut self) -> Telemetry {
        Telemetry {
            free_heap_kb: 200,
            free_psram_mb: 4,
            temperature_c: 21.0,
            humidity_pct: 50.0,
        }
    }

    fn power_down(&mut self, seconds: u32) -> ! {
        log::info!("sim: powered down, next wake in {} s; close the window to exit", seconds);
        loop {
            self.screen.borrow_mut().events();
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// The host is always online; time comes from the host clock
#[derive(Default)]
struct HostNetwork {
    connected: bool,
}

impl Network for HostNetwork {
    fn connect(&mut self, config: &NetworkConfig) -> Result<(), NetworkError> {
        log::info!("sim: pretending to join {}", config.ssid);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn sync_time(&mut self, _config: &NetworkConfig) -> Result<DateTime, NetworkError> {
        Ok(local_now())
    }
}

struct DesktopBoard;

impl Board for DesktopBoard {
    type Display = EpdSurface<WindowPanel>;
    type Input = WindowInput;
    type Platform = HostPlatform;
    type Network = HostNetwork;
    type Connector = TcpConnector;
    type ConfigSource = FileConfigSource;
    type ConfigStore = MemoryConfigStore;
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let output_settings = OutputSettingsBuilder::new().scale(args.scale).build();
    let display: SimulatorDisplay<Gray4> =
        SimulatorDisplay::new(Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT));
    let window = Window::new("M5Paper MPD remote", &output_settings);
    let screen = Rc::new(RefCell::new(Screen { display, window }));

    println!("M5Paper MPD remote simulator");
    println!("Config: {}", args.config_dir.display());
    println!("Controls:");
    println!("  Up / W            - Up");
    println!("  Down / S          - Down");
    println!("  Enter / Space     - Select");
    println!("  Mouse click       - Touch");
    println!("  Escape            - Quit");

    let panel = WindowPanel {
        frame: FramePanel::new(),
        screen: Rc::clone(&screen),
    };
    let input = WindowInput {
        screen: Rc::clone(&screen),
        scale: args.scale.max(1),
        touches: Vec::new(),
    };
    let platform = HostPlatform {
        screen,
        wake: if args.rtc_wake {
            WakeCause::RtcTimer
        } else {
            WakeCause::User
        },
    };

    let ctx = Context::<DesktopBoard>::new(
        EpdSurface::new(panel)?,
        input,
        platform,
        HostNetwork::default(),
        TcpConnector::default(),
        FileConfigSource::new(args.config_dir),
        MemoryConfigStore::default(),
    );
    Session::new(ctx, SessionSettings::default()).run()
}

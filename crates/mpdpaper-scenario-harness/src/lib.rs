//! Host-side scenario harness: a full boot epoch against in-memory hardware.
//!
//! The display renders into a [`FramePanel`] so scenarios can assert on
//! pixels and save screenshots, and every draw request is also recorded as a
//! [`DrawCall`] so they can assert on text.

use core::convert::Infallible;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use mpdpaper_core::layout::{BOTTOM_AREA, CONTENT_AREA, TOP_AREA};
use mpdpaper_core::mock::{
    DrawCall, MemoryConfigSource, MemoryConfigStore, MockDisplay, MockMpdServer, MockNetwork,
    MockPlatform, ScriptedInput,
};
use mpdpaper_core::{
    Board, Configuration, Context, DateTime, DisplaySurface, EpdSurface, FramePanel, MenuLine,
    Session, SessionSettings, SleepDecision, WakeCause,
};
use png::{BitDepth, ColorType, Encoder};

/// Renders to a framebuffer and keeps a log of what was drawn.
pub struct HarnessDisplay {
    surface: EpdSurface<FramePanel>,
    log: MockDisplay,
}

impl HarnessDisplay {
    pub fn new() -> Self {
        Self {
            surface: EpdSurface::new(FramePanel::new()).expect("screen regions are aligned"),
            log: MockDisplay::default(),
        }
    }

    pub fn frame(&self) -> &FramePanel {
        self.surface.panel()
    }

    pub fn calls(&self) -> &[DrawCall] {
        self.log.calls()
    }
}

impl Default for HarnessDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for HarnessDisplay {
    type Error = Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.log.init()?;
        self.surface.init()
    }

    fn draw_top(&mut self, text: &str) -> Result<(), Self::Error> {
        self.log.draw_top(text)?;
        self.surface.draw_top(text)
    }

    fn draw_status(&mut self, lines: &[String]) -> Result<(), Self::Error> {
        self.log.draw_status(lines)?;
        self.surface.draw_status(lines)
    }

    fn draw_menu(&mut self, lines: &[MenuLine], selected: usize) -> Result<(), Self::Error> {
        self.log.draw_menu(lines, selected)?;
        self.surface.draw_menu(lines, selected)
    }

    fn draw_bottom(&mut self, text: &str) -> Result<(), Self::Error> {
        self.log.draw_bottom(text)?;
        self.surface.draw_bottom(text)
    }
}

/// The mock board with a rendering display
pub struct HarnessBoard;

impl Board for HarnessBoard {
    type Display = HarnessDisplay;
    type Input = ScriptedInput;
    type Platform = MockPlatform;
    type Network = MockNetwork;
    type Connector = MockMpdServer;
    type ConfigSource = MemoryConfigSource;
    type ConfigStore = MemoryConfigStore;
}

/// One scripted boot epoch.
///
/// Defaults: user wake at 2024-06-02 14:03:20, reachable network, nothing on
/// the SD card or in flash.
pub struct ScenarioHarness {
    session: Session<HarnessBoard>,
    decision: Option<SleepDecision>,
}

impl ScenarioHarness {
    pub fn new(input: ScriptedInput, server: MockMpdServer) -> Self {
        let mut platform = MockPlatform::new();
        platform.set_clock(DateTime::new(2024, 6, 2, 14, 3, 20));
        let ctx = Context::new(
            HarnessDisplay::new(),
            input,
            platform,
            MockNetwork::new(),
            server,
            MemoryConfigSource::default(),
            MemoryConfigStore::default(),
        );
        Self {
            session: Session::new(ctx, SessionSettings::default()),
            decision: None,
        }
    }

    pub fn with_settings(self, settings: SessionSettings) -> Self {
        Self {
            session: Session::new(self.session.into_context(), settings),
            decision: None,
        }
    }

    pub fn with_sd_config(mut self, config: Configuration) -> Self {
        self.ctx_mut().sd = MemoryConfigSource::new(Some(config));
        self
    }

    pub fn with_flash(mut self, config: Configuration, player_index: Option<u16>) -> Self {
        self.ctx_mut().flash = MemoryConfigStore::with(config, player_index);
        self
    }

    pub fn with_wake(mut self, wake: WakeCause) -> Self {
        self.ctx_mut().platform.set_wake_cause(wake);
        self
    }

    pub fn with_clock(mut self, time: DateTime) -> Self {
        self.ctx_mut().platform.set_clock(time);
        self
    }

    pub fn with_network(mut self, network: MockNetwork) -> Self {
        self.ctx_mut().network = network;
        self
    }

    fn ctx_mut(&mut self) -> &mut Context<HarnessBoard> {
        self.session.context_mut()
    }

    /// Run the epoch up to the sleep announcement.
    pub fn run(&mut self) -> SleepDecision {
        let decision = self.session.run_epoch();
        self.decision = Some(decision.clone());
        decision
    }

    /// Access the context for assertions.
    pub fn ctx(&self) -> &Context<HarnessBoard> {
        self.session.context()
    }

    pub fn decision(&self) -> Option<&SleepDecision> {
        self.decision.as_ref()
    }

    pub fn calls(&self) -> &[DrawCall] {
        self.ctx().display.calls()
    }

    /// Every status screen shown, oldest first
    pub fn status_screens(&self) -> Vec<Vec<String>> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Status(lines) => Some(lines.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every top-line message, oldest first
    pub fn top_messages(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Top(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Labels of every menu painted, with the highlighted row
    pub fn menus(&self) -> Vec<(Vec<String>, usize)> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Menu { lines, selected } => Some((lines.clone(), *selected)),
                _ => None,
            })
            .collect()
    }

    pub fn frame(&self) -> &FramePanel {
        self.ctx().display.frame()
    }

    /// Ink in the top, content and bottom regions
    pub fn region_ink(&self) -> (usize, usize, usize) {
        let frame = self.frame();
        (
            frame.dark_pixels_in(TOP_AREA),
            frame.dark_pixels_in(CONTENT_AREA),
            frame.dark_pixels_in(BOTTOM_AREA),
        )
    }

    /// Save the current framebuffer to an 8-bit grayscale PNG.
    pub fn save_screenshot_png(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let frame = self.frame();
        let (width, height) = frame.dimensions();
        // 4-bit levels stretched to 8 bits
        let data: Vec<u8> = frame.lumas().map(|luma| luma * 17).collect();

        let file = File::create(path).map_err(|e| e.to_string())?;
        let writer = BufWriter::new(file);
        let mut encoder = Encoder::new(writer, width, height);
        encoder.set_color(ColorType::Grayscale);
        encoder.set_depth(BitDepth::Eight);
        let mut png_writer = encoder.write_header().map_err(|e| e.to_string())?;
        png_writer
            .write_image_data(&data)
            .map_err(|e| e.to_string())?;
        log::debug!("screenshot saved to {}", path.display());
        Ok(())
    }
}

//! In-memory board for tests and the scenario harness.
//!
//! Every seam of [`Board`] has a scriptable stand-in here. Time only moves
//! when something calls `delay_ms`, so long waits cost nothing in tests.

use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::board::{
    Board, Context, DisplaySurface, InputSource, Network, NetworkError, Platform, Telemetry,
    WakeCause,
};
use crate::clock::DateTime;
use crate::config::{
    ConfigError, ConfigSource, ConfigStore, Configuration, Favourite, NetworkConfig,
    PlayerEndpoint,
};
use crate::input::{Button, ButtonEdges, TouchPoint};
use crate::menu::MenuLine;
use crate::mpd::Connector;

/// Build a valid configuration with `players` players and `favourites`
/// favourites, numbered from 1.
pub fn sample_configuration(players: usize, favourites: usize) -> Configuration {
    let network = NetworkConfig {
        ssid: "home".into(),
        password: "secret".into(),
        ntp_server: "pool.ntp.org".into(),
        timezone: "CET-1CEST,M3.5.0,M10.5.0/3".into(),
    };
    let players = (1..=players)
        .map(|n| PlayerEndpoint {
            name: format!("Player {}", n),
            host: format!("player{}.local", n),
            port: 6600,
        })
        .collect();
    let favourites = (1..=favourites)
        .map(|n| Favourite {
            name: format!("Favourite {}", n),
            url: format!("http://stream.example/{}", n),
        })
        .collect();
    Configuration::new(network, players, favourites)
}

/// One recorded display operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCall {
    Init,
    Top(String),
    Status(Vec<String>),
    Menu { lines: Vec<String>, selected: usize },
    Bottom(String),
}

/// Display that records what it was asked to show
#[derive(Debug, Default)]
pub struct MockDisplay {
    calls: Vec<DrawCall>,
}

impl MockDisplay {
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Highlighted row of every menu paint, in order
    pub fn menu_selections(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Menu { selected, .. } => Some(*selected),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl DisplaySurface for MockDisplay {
    type Error = Infallible;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.calls.push(DrawCall::Init);
        Ok(())
    }

    fn draw_top(&mut self, text: &str) -> Result<(), Self::Error> {
        self.calls.push(DrawCall::Top(text.to_string()));
        Ok(())
    }

    fn draw_status(&mut self, lines: &[String]) -> Result<(), Self::Error> {
        self.calls.push(DrawCall::Status(lines.to_vec()));
        Ok(())
    }

    fn draw_menu(&mut self, lines: &[MenuLine], selected: usize) -> Result<(), Self::Error> {
        self.calls.push(DrawCall::Menu {
            lines: lines.iter().map(|line| line.text.clone()).collect(),
            selected,
        });
        Ok(())
    }

    fn draw_bottom(&mut self, text: &str) -> Result<(), Self::Error> {
        self.calls.push(DrawCall::Bottom(text.to_string()));
        Ok(())
    }
}

/// Polls allowed after the script ran out before the test is declared stuck
const EXHAUSTED_POLL_LIMIT: usize = 100_000;

#[derive(Debug, Default)]
struct InputStep {
    buttons: ButtonEdges,
    touches: Vec<TouchPoint>,
}

/// Input that replays a script, one step per tick.
///
/// A tick starts with `poll_buttons`; the touches of the same step are
/// returned by the following `poll_touches`. Once the script runs out every
/// tick is idle.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    steps: VecDeque<InputStep>,
    touches: Vec<TouchPoint>,
    exhausted_polls: usize,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(self, button: Button) -> Self {
        self.buttons(button.into())
    }

    /// Several buttons in the same tick
    pub fn buttons(mut self, buttons: ButtonEdges) -> Self {
        self.steps.push_back(InputStep {
            buttons,
            touches: Vec::new(),
        });
        self
    }

    pub fn touch(mut self, x: u16, y: u16) -> Self {
        self.steps.push_back(InputStep {
            buttons: ButtonEdges::NONE,
            touches: vec![TouchPoint::new(x, y)],
        });
        self
    }

    pub fn idle(mut self, ticks: usize) -> Self {
        self.steps
            .extend((0..ticks).map(|_| InputStep::default()));
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl InputSource for ScriptedInput {
    #[allow(clippy::panic)]
    fn poll_buttons(&mut self) -> ButtonEdges {
        match self.steps.pop_front() {
            Some(step) => {
                self.touches = step.touches;
                step.buttons
            }
            None => {
                self.exhausted_polls += 1;
                if self.exhausted_polls > EXHAUSTED_POLL_LIMIT {
                    panic!("input script exhausted; is a menu waiting for a commit?");
                }
                self.touches.clear();
                ButtonEdges::NONE
            }
        }
    }

    fn poll_touches(&mut self) -> Vec<TouchPoint> {
        core::mem::take(&mut self.touches)
    }
}

/// Platform with a virtual clock advanced by `delay_ms`
#[derive(Debug)]
pub struct MockPlatform {
    clock: DateTime,
    clock_set_at_ms: u64,
    elapsed_ms: u64,
    wake: WakeCause,
    battery_mv: u32,
    telemetry: Telemetry,
    watchdog_feeds: usize,
    unfed_ms: u64,
    max_unfed_ms: u64,
    rtc_writes: Vec<DateTime>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            clock: DateTime::new(2024, 1, 1, 12, 0, 0),
            clock_set_at_ms: 0,
            elapsed_ms: 0,
            wake: WakeCause::User,
            battery_mv: 4_000,
            telemetry: Telemetry {
                free_heap_kb: 200,
                free_psram_mb: 4,
                temperature_c: 22.0,
                humidity_pct: 45.0,
            },
            watchdog_feeds: 0,
            unfed_ms: 0,
            max_unfed_ms: 0,
            rtc_writes: Vec::new(),
        }
    }

    /// Set the clock without recording an RTC write
    pub fn set_clock(&mut self, time: DateTime) {
        self.clock = time;
        self.clock_set_at_ms = self.elapsed_ms;
    }

    pub fn set_wake_cause(&mut self, wake: WakeCause) {
        self.wake = wake;
    }

    pub fn set_battery_millivolts(&mut self, millivolts: u32) {
        self.battery_mv = millivolts;
    }

    pub fn set_telemetry(&mut self, telemetry: Telemetry) {
        self.telemetry = telemetry;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn watchdog_feeds(&self) -> usize {
        self.watchdog_feeds
    }

    /// Longest stretch of delays without a watchdog feed
    pub fn max_unfed_ms(&self) -> u64 {
        self.max_unfed_ms
    }

    pub fn rtc_writes(&self) -> &[DateTime] {
        &self.rtc_writes
    }
}

impl Platform for MockPlatform {
    fn feed_watchdog(&mut self) {
        self.watchdog_feeds += 1;
        self.unfed_ms = 0;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += u64::from(ms);
        self.unfed_ms += u64::from(ms);
        self.max_unfed_ms = self.max_unfed_ms.max(self.unfed_ms);
    }

    fn now(&mut self) -> DateTime {
        let seconds = (self.elapsed_ms - self.clock_set_at_ms) / 1_000;
        self.clock.plus_seconds(seconds as u32)
    }

    fn set_time(&mut self, time: &DateTime) {
        self.rtc_writes.push(*time);
        self.set_clock(*time);
    }

    fn wake_cause(&self) -> WakeCause {
        self.wake
    }

    fn battery_millivolts(&mut self) -> u32 {
        self.battery_mv
    }

    fn telemetry(&mut self) -> Telemetry {
        self.telemetry
    }

    #[allow(clippy::panic)]
    fn power_down(&mut self, seconds: u32) -> ! {
        panic!("mock platform powered down for {} s", seconds)
    }
}

/// Network with switchable reachability and a fixed SNTP answer
#[derive(Debug)]
pub struct MockNetwork {
    reachable: bool,
    connected: bool,
    time: Option<DateTime>,
    connect_attempts: usize,
    time_syncs: usize,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    /// What `sync_time` returns
    pub const SYNCED_TIME: DateTime = DateTime::new(2024, 6, 2, 14, 5, 0);

    pub fn new() -> Self {
        Self {
            reachable: true,
            connected: false,
            time: Some(Self::SYNCED_TIME),
            connect_attempts: 0,
            time_syncs: 0,
        }
    }

    /// Access point never answers
    pub fn failing() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// SNTP never answers
    pub fn without_time(mut self) -> Self {
        self.time = None;
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts
    }

    pub fn time_syncs(&self) -> usize {
        self.time_syncs
    }
}

impl Network for MockNetwork {
    fn connect(&mut self, config: &NetworkConfig) -> Result<(), NetworkError> {
        self.connect_attempts += 1;
        if self.reachable {
            self.connected = true;
            Ok(())
        } else {
            Err(NetworkError::Association(format!(
                "{} not found",
                config.ssid
            )))
        }
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn sync_time(&mut self, _config: &NetworkConfig) -> Result<DateTime, NetworkError> {
        self.time_syncs += 1;
        self.time
            .ok_or_else(|| NetworkError::TimeSync("no reply".into()))
    }
}

#[derive(Debug, Default)]
struct ServerState {
    unreachable: bool,
    playing: bool,
    queue: Vec<String>,
    commands: Vec<String>,
    connections: Vec<String>,
    hang_up_on: Option<String>,
}

impl ServerState {
    /// Response to one command line, `None` to hang up
    fn respond(&mut self, line: &str) -> Option<String> {
        self.commands.push(line.to_string());
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, Some(arg)),
            None => (line, None),
        };
        if self.hang_up_on.as_deref() == Some(command) || command == "close" {
            return None;
        }
        let response = match command {
            "status" => format!(
                "volume: 80\nrepeat: 0\nplaylistlength: {}\nstate: {}\nOK\n",
                self.queue.len(),
                if self.playing { "play" } else { "stop" }
            ),
            "currentsong" => match self.queue.first() {
                Some(file) => format!("file: {}\nPos: 0\nOK\n", file),
                None => "OK\n".to_string(),
            },
            "play" if self.queue.is_empty() => "ACK [2@0] {play} No such song\n".to_string(),
            "play" => {
                self.playing = true;
                "OK\n".to_string()
            }
            "stop" => {
                self.playing = false;
                "OK\n".to_string()
            }
            "clear" => {
                self.queue.clear();
                self.playing = false;
                "OK\n".to_string()
            }
            "add" => match arg.and_then(unquote) {
                Some(url) => {
                    self.queue.push(url);
                    "OK\n".to_string()
                }
                None => "ACK [2@0] {add} wrong number of arguments\n".to_string(),
            },
            other => format!("ACK [5@0] {{}} unknown command \"{}\"\n", other),
        };
        Some(response)
    }
}

fn unquote(arg: &str) -> Option<String> {
    let inner = arg.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// In-process MPD server; clones share state, so a test can keep a handle
/// while the client owns another as its [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct MockMpdServer {
    state: Rc<RefCell<ServerState>>,
}

impl MockMpdServer {
    pub const VERSION: &'static str = "0.23.5";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(self, urls: &[&str]) -> Self {
        self.state.borrow_mut().queue = urls.iter().map(|url| url.to_string()).collect();
        self
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.borrow_mut().playing = playing;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().unreachable = !reachable;
    }

    /// Drop the connection instead of answering `command`
    pub fn hang_up_on(&self, command: &str) {
        self.state.borrow_mut().hang_up_on = Some(command.to_string());
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn queue(&self) -> Vec<String> {
        self.state.borrow().queue.clone()
    }

    /// Every command line received, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// `host:port` of every accepted connection
    pub fn connections(&self) -> Vec<String> {
        self.state.borrow().connections.clone()
    }
}

impl Connector for MockMpdServer {
    type Stream = MockStream;

    fn connect(&mut self, host: &str, port: u16) -> io::Result<MockStream> {
        let mut state = self.state.borrow_mut();
        if state.unreachable {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{}:{} refused", host, port),
            ));
        }
        state.connections.push(format!("{}:{}", host, port));
        Ok(MockStream {
            state: Rc::clone(&self.state),
            pending: format!("OK MPD {}\n", Self::VERSION).into_bytes().into(),
            partial: Vec::new(),
            closed: false,
        })
    }
}

/// Client end of a [`MockMpdServer`] connection
#[derive(Debug)]
pub struct MockStream {
    state: Rc<RefCell<ServerState>>,
    pending: VecDeque<u8>,
    partial: Vec<u8>,
    closed: bool,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        for &byte in buf {
            if byte != b'\n' {
                self.partial.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.partial.clear();
            match self.state.borrow_mut().respond(&line) {
                Some(response) => self.pending.extend(response.into_bytes()),
                None => self.closed = true,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Configuration source that either has a configuration or does not
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    config: Option<Configuration>,
}

impl MemoryConfigSource {
    pub fn new(config: Option<Configuration>) -> Self {
        Self { config }
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load(&mut self) -> Result<Configuration, ConfigError> {
        self.config.clone().ok_or(ConfigError::Missing("sd card"))
    }
}

/// Flash store backed by memory
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Option<Configuration>,
    player_index: Option<u16>,
}

impl MemoryConfigStore {
    pub fn with(config: Configuration, player_index: Option<u16>) -> Self {
        Self {
            config: Some(config),
            player_index,
        }
    }

    pub fn stored(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    pub fn player_index(&self) -> Option<u16> {
        self.player_index
    }
}

impl ConfigSource for MemoryConfigStore {
    fn load(&mut self) -> Result<Configuration, ConfigError> {
        self.config.clone().ok_or(ConfigError::Missing("flash"))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn save(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn load_player_index(&mut self) -> Result<Option<u16>, ConfigError> {
        Ok(self.player_index)
    }

    fn save_player_index(&mut self, index: u16) -> Result<(), ConfigError> {
        self.player_index = Some(index);
        Ok(())
    }
}

/// Board made of the mocks above
pub struct MockBoard;

impl Board for MockBoard {
    type Display = MockDisplay;
    type Input = ScriptedInput;
    type Platform = MockPlatform;
    type Network = MockNetwork;
    type Connector = MockMpdServer;
    type ConfigSource = MemoryConfigSource;
    type ConfigStore = MemoryConfigStore;
}

impl MockBoard {
    /// Context with no input, a reachable network and an idle player
    pub fn context() -> Context<MockBoard> {
        Self::context_with(ScriptedInput::new(), MockMpdServer::new())
    }

    pub fn context_with_input(input: ScriptedInput) -> Context<MockBoard> {
        Self::context_with(input, MockMpdServer::new())
    }

    pub fn context_with_server(server: MockMpdServer) -> Context<MockBoard> {
        Self::context_with(ScriptedInput::new(), server)
    }

    pub fn context_with(input: ScriptedInput, server: MockMpdServer) -> Context<MockBoard> {
        Context::new(
            MockDisplay::default(),
            input,
            MockPlatform::new(),
            MockNetwork::new(),
            server,
            MemoryConfigSource::default(),
            MemoryConfigStore::default(),
        )
    }
}

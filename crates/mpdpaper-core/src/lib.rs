//! Control logic for the M5Paper MPD remote.
//! Runs unchanged on the ESP32, in the desktop simulator and in host tests.

#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::unreachable,
        clippy::unwrap_used
    )
)]

pub mod board;
pub mod clock;
pub mod config;
pub mod input;
pub mod layout;
pub mod menu;
pub mod mock;
pub mod mpd;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod surface;

pub use board::{
    Board, Context, DisplaySurface, InputSource, Network, NetworkError, Platform, Telemetry,
    WakeCause,
};
pub use clock::DateTime;
pub use config::{
    load_configuration, ConfigError, ConfigSource, ConfigStore, Configuration, Favourite,
    FileConfigSource, NetworkConfig, PlayerEndpoint,
};
pub use input::{Button, ButtonEdges, ButtonState, TouchPoint};
pub use menu::{Menu, MenuCursor, MenuLine, SubMenu, TouchPolicy};
pub use mpd::{Connector, MpdClient, MpdError, PlayerState, TcpConnector};
pub use scheduler::{decide_sleep, PlaybackContext, SleepDecision, SleepPolicy};
pub use session::{Session, SessionSettings};
pub use surface::{EpdSurface, FramePanel, Panel, RefreshMode};

/// UI display dimensions (portrait mode).
/// The IT8951 panel is 960x540 in its native orientation.
pub const DISPLAY_WIDTH: u32 = layout::DISPLAY_WIDTH as u32;
pub const DISPLAY_HEIGHT: u32 = layout::DISPLAY_HEIGHT as u32;

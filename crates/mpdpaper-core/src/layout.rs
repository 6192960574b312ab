//! Screen regions in portrait coordinates.
//!
//! The panel is split into three horizontal strips that refresh independently:
//! a one-line top status region, the content canvas used for status lines and
//! menus, and a one-line bottom region for transient messages.

pub use it8951::Area;

pub const DISPLAY_WIDTH: u16 = 540;
pub const DISPLAY_HEIGHT: u16 = 960;

pub const LINE_HEIGHT: u16 = 40;

pub const TOP_AREA: Area = Area::new(0, 0, DISPLAY_WIDTH, LINE_HEIGHT);

/// Menu row coordinates are relative to this offset
pub const CONTENT_Y: u16 = LINE_HEIGHT;
pub const CONTENT_HEIGHT: u16 = 880;
pub const CONTENT_AREA: Area = Area::new(0, CONTENT_Y, DISPLAY_WIDTH, CONTENT_HEIGHT);

pub const BOTTOM_AREA: Area = Area::new(
    0,
    DISPLAY_HEIGHT - LINE_HEIGHT,
    DISPLAY_WIDTH,
    LINE_HEIGHT,
);

/// Left and top inset of text inside every region
pub const TEXT_MARGIN: u16 = 10;

//! Driver for the IT8951 e-paper timing controller
//!
//! The IT8951 sits between a host MCU and large parallel e-paper panels such
//! as the 540x960 ED047TC1 used by M5Paper. The host talks to it over SPI in
//! 16-bit words, loads packed grayscale pixels into controller SDRAM and then
//! asks it to run a waveform over an area.
//!
//! - [`Interface`] / [`DisplayInterface`]: SPI framing and HRDY handshake
//! - [`Display`]: init, area load, area refresh, sleep
//! - [`Canvas`]: 4bpp `DrawTarget` whose bytes can be pushed as-is (`graphics` feature)

#![no_std]

mod command;
pub mod config;
pub mod display;
pub mod error;
#[cfg(feature = "graphics")]
pub mod graphics;
pub mod interface;

pub use config::{Area, Builder, Config, Dimensions, Endian, Rotation, UpdateMode};
pub use display::{DeviceInfo, Display};
pub use error::{BuilderError, Error};
#[cfg(feature = "graphics")]
pub use graphics::Canvas;
pub use interface::{DisplayInterface, Interface, InterfaceError};

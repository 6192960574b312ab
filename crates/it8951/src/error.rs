//! Error types for the driver
//!
//! This module defines error types for configuration building ([`BuilderError`])
//! and display operations ([`Error`]).
//!
//! ## Error Types
//!
//! - [`BuilderError`] - Errors during configuration or canvas construction
//! - [`Error`] - Runtime errors during display operations
//! - [`InterfaceError`](crate::interface::InterfaceError) - Low-level hardware communication errors
//!
//! ## Example
//!
//! ```
//! use it8951::{Builder, Dimensions, BuilderError};
//!
//! // Missing dimensions
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(BuilderError::MissingDimensions)));
//!
//! // Width not aligned to a packed 4bpp word
//! let result = Dimensions::new(540, 962);
//! assert!(result.is_err());
//! ```

use crate::config::Area;
use crate::interface::DisplayInterface;

/// Largest panel edge the controller can drive
pub const MAX_PANEL_EDGE: u16 = 2048;

/// Errors that can occur when interacting with the display
///
/// Generic over the interface type to preserve the specific error type.
#[derive(Debug)]
pub enum Error<I: DisplayInterface> {
    /// Interface error (SPI/GPIO)
    ///
    /// Wraps the underlying hardware error from the [`DisplayInterface`] implementation.
    Interface(I::Error),
    /// [`Display::init`](crate::display::Display::init) has not completed yet
    NotInitialized,
    /// Area is outside the rotated panel or not aligned to 4 pixels horizontally
    InvalidArea(Area),
    /// Buffer is too small for the requested area
    BufferTooSmall {
        /// Required buffer size in bytes
        required: usize,
        /// Provided buffer size in bytes
        provided: usize,
    },
    /// The waveform engine did not become idle in time
    DisplayTimeout,
}

impl<I: DisplayInterface> core::fmt::Display for Error<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Interface(e) => write!(f, "Interface error: {e:?}"),
            Error::NotInitialized => write!(f, "Controller not initialized"),
            Error::InvalidArea(area) => write!(
                f,
                "Invalid area {}x{} at ({}, {})",
                area.width, area.height, area.x, area.y
            ),
            Error::BufferTooSmall { required, provided } => {
                write!(
                    f,
                    "Buffer too small: required {required} bytes, provided {provided}"
                )
            }
            Error::DisplayTimeout => write!(f, "Timeout waiting for waveform engine"),
        }
    }
}

impl<I: DisplayInterface + core::fmt::Debug> core::error::Error for Error<I> {}

/// Errors that can occur when building configuration
#[derive(Debug, PartialEq)]
pub enum BuilderError {
    /// Dimensions were not specified
    ///
    /// [`Builder::dimensions()`](crate::config::Builder::dimensions) must be called before building.
    MissingDimensions,
    /// Invalid dimensions provided
    ///
    /// See [`Dimensions::new()`](crate::config::Dimensions::new) for constraints.
    InvalidDimensions {
        /// Number of rows (height) requested
        rows: u16,
        /// Number of columns (width) requested
        cols: u16,
    },
    /// Canvas backing buffer cannot hold the requested size
    BufferTooSmall {
        /// Required buffer size in bytes
        required: usize,
        /// Provided buffer size in bytes
        provided: usize,
    },
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BuilderError::MissingDimensions => write!(f, "Dimensions must be specified"),
            BuilderError::InvalidDimensions { rows, cols } => write!(
                f,
                "Invalid dimensions {rows}x{cols} (max {MAX_PANEL_EDGE}, both edges must be multiples of 4)"
            ),
            BuilderError::BufferTooSmall { required, provided } => write!(
                f,
                "Canvas buffer too small: required {required} bytes, provided {provided}"
            ),
        }
    }
}

impl core::error::Error for BuilderError {}

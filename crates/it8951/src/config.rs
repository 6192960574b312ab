//! Display configuration types and builder

pub use crate::error::{BuilderError, MAX_PANEL_EDGE};

/// Native panel dimensions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dimensions {
    /// Number of rows (height in pixels, native orientation)
    pub rows: u16,
    /// Number of columns (width in pixels, native orientation)
    pub cols: u16,
}

impl Dimensions {
    /// Create new dimensions with validation
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidDimensions` if either edge is zero, larger
    /// than [`MAX_PANEL_EDGE`], or not a multiple of 4 (one packed 4bpp word).
    pub fn new(rows: u16, cols: u16) -> Result<Self, BuilderError> {
        let valid = |edge: u16| edge != 0 && edge <= MAX_PANEL_EDGE && edge % 4 == 0;
        if !valid(rows) || !valid(cols) {
            return Err(BuilderError::InvalidDimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }
}

/// Display rotation relative to native orientation
///
/// The discriminant is the rotate field of the load-image command.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0 = 0,
    /// Rotate 90 degrees clockwise
    Rotate90 = 1,
    /// Rotate 180 degrees
    Rotate180 = 2,
    /// Rotate 270 degrees clockwise
    Rotate270 = 3,
}

/// Byte order of pixel words on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Endian {
    /// Low byte first
    Little = 0,
    /// High byte first, so the first byte of a packed buffer holds the leftmost pixels
    #[default]
    Big = 1,
}

/// Waveform used for a display update
///
/// Values follow the default waveform table of 4.7" panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// Full clear to white with heavy flashing
    Init = 0,
    /// Fast monochrome, any gray to black or white
    Du = 1,
    /// 16 gray levels, flashing, highest quality
    Gc16 = 2,
    /// 16 gray levels, non-flashing
    Gl16 = 3,
    /// Ghost-reduced GL16
    Glr16 = 4,
    /// Ghost-reduced GL16 with dithering
    Gld16 = 5,
    /// Four gray levels, fast
    Du4 = 6,
    /// Black and white only, fastest, ghosts
    A2 = 7,
}

/// Rectangle in logical (rotated) coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Area {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Area {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Packed 4bpp bytes needed to hold this area
    pub fn buffer_size(&self) -> usize {
        self.width as usize * self.height as usize / 2
    }
}

/// Display configuration
///
/// Use [`Builder`] to create a Config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Native panel dimensions
    pub dimensions: Dimensions,
    /// Logical rotation applied on load and display
    pub rotation: Rotation,
    /// Pixel word byte order
    pub endian: Endian,
    /// VCOM voltage in millivolts (absolute value, written as-is)
    pub vcom_mv: u16,
    /// Timeout for HRDY and waveform engine polling
    pub busy_timeout_ms: u32,
}

impl Config {
    /// Get the rotated dimensions based on rotation setting
    pub fn rotated_dimensions(&self) -> Dimensions {
        match self.rotation {
            Rotation::Rotate0 | Rotation::Rotate180 => self.dimensions,
            Rotation::Rotate90 | Rotation::Rotate270 => Dimensions {
                rows: self.dimensions.cols,
                cols: self.dimensions.rows,
            },
        }
    }

    /// True when `area` lies inside the rotated panel and starts and ends on
    /// a packed word boundary
    pub fn contains(&self, area: &Area) -> bool {
        let dims = self.rotated_dimensions();
        area.width > 0
            && area.height > 0
            && area.x % 4 == 0
            && area.width % 4 == 0
            && area.x as u32 + area.width as u32 <= dims.cols as u32
            && area.y as u32 + area.height as u32 <= dims.rows as u32
    }

    /// Map a logical area to native panel coordinates for the display command
    pub fn to_native(&self, area: Area) -> Area {
        let cols = self.dimensions.cols;
        let rows = self.dimensions.rows;
        match self.rotation {
            Rotation::Rotate0 => area,
            Rotation::Rotate90 => Area::new(
                area.y,
                rows - area.x - area.width,
                area.height,
                area.width,
            ),
            Rotation::Rotate180 => Area::new(
                cols - area.x - area.width,
                rows - area.y - area.height,
                area.width,
                area.height,
            ),
            Rotation::Rotate270 => Area::new(
                cols - area.y - area.height,
                area.x,
                area.height,
                area.width,
            ),
        }
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```
/// use it8951::{Builder, Dimensions, Rotation};
///
/// let config = Builder::new()
///     .dimensions(Dimensions::new(540, 960).unwrap())
///     .rotation(Rotation::Rotate90)
///     .vcom_mv(2300)
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.rotated_dimensions().cols, 540);
/// ```
pub struct Builder {
    dimensions: Option<Dimensions>,
    rotation: Rotation,
    endian: Endian,
    vcom_mv: u16,
    busy_timeout_ms: u32,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            dimensions: None,
            rotation: Rotation::Rotate0,
            endian: Endian::Big,
            // -2.30 V, printed on the flex cable of M5Paper panels
            vcom_mv: 2300,
            busy_timeout_ms: 3_000,
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set native panel dimensions (required)
    pub fn dimensions(mut self, dims: Dimensions) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Set display rotation
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set pixel word byte order
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Set VCOM in millivolts
    pub fn vcom_mv(mut self, value: u16) -> Self {
        self.vcom_mv = value;
        self
    }

    /// Set how long to poll HRDY and the waveform engine before giving up
    pub fn busy_timeout_ms(mut self, value: u32) -> Self {
        self.busy_timeout_ms = value;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::MissingDimensions` if dimensions were not set
    pub fn build(self) -> Result<Config, BuilderError> {
        Ok(Config {
            dimensions: self.dimensions.ok_or(BuilderError::MissingDimensions)?,
            rotation: self.rotation,
            endian: self.endian,
            vcom_mv: self.vcom_mv,
            busy_timeout_ms: self.busy_timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portrait() -> Config {
        Builder::new()
            .dimensions(Dimensions::new(540, 960).unwrap())
            .rotation(Rotation::Rotate90)
            .build()
            .unwrap()
    }

    #[test]
    fn dimensions_must_be_word_aligned() {
        assert!(Dimensions::new(540, 960).is_ok());
        assert_eq!(
            Dimensions::new(540, 962),
            Err(BuilderError::InvalidDimensions { rows: 540, cols: 962 })
        );
        assert!(Dimensions::new(0, 960).is_err());
    }

    #[test]
    fn rotate90_swaps_logical_edges() {
        let dims = portrait().rotated_dimensions();
        assert_eq!((dims.cols, dims.rows), (540, 960));
    }

    #[test]
    fn rotate90_maps_top_strip_to_left_column() {
        let config = portrait();
        let native = config.to_native(Area::new(0, 0, 540, 40));
        assert_eq!(native, Area::new(0, 0, 40, 540));

        let native = config.to_native(Area::new(0, 920, 540, 40));
        assert_eq!(native, Area::new(920, 0, 40, 540));
    }

    #[test]
    fn rotate90_maps_offset_area() {
        let native = portrait().to_native(Area::new(20, 100, 100, 60));
        assert_eq!(native, Area::new(100, 420, 60, 100));
    }

    #[test]
    fn contains_rejects_unaligned_and_overflowing_areas() {
        let config = portrait();
        assert!(config.contains(&Area::new(0, 40, 540, 880)));
        assert!(!config.contains(&Area::new(2, 40, 540, 880)));
        assert!(!config.contains(&Area::new(0, 40, 542, 880)));
        assert!(!config.contains(&Area::new(0, 900, 540, 80)));
        assert!(!config.contains(&Area::new(0, 0, 0, 10)));
    }

    #[test]
    fn area_buffer_size_is_packed_nibbles() {
        assert_eq!(Area::new(0, 0, 540, 40).buffer_size(), 10_800);
    }
}

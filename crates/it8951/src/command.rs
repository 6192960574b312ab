// IT8951 host command, register and SPI framing definitions

// SPI preambles (first word of every transfer)
pub const PREAMBLE_COMMAND: u16 = 0x6000;
pub const PREAMBLE_WRITE: u16 = 0x0000;
pub const PREAMBLE_READ: u16 = 0x1000;

// System commands
pub const SYS_RUN: u16 = 0x0001; // Wake the controller
pub const STANDBY: u16 = 0x0002; // Standby, clocks kept
pub const SLEEP: u16 = 0x0003; // Sleep, clocks gated
pub const REG_RD: u16 = 0x0010; // Read register
pub const REG_WR: u16 = 0x0011; // Write register

// Image loading
pub const LD_IMG_AREA: u16 = 0x0021; // Load image area (args: flags, x, y, w, h)
pub const LD_IMG_END: u16 = 0x0022; // End of image load

// User defined commands
pub const DPY_AREA: u16 = 0x0034; // Display area (args: x, y, w, h, mode)
pub const VCOM: u16 = 0x0039; // Get/set VCOM (args: 1 = set, value in mV)
pub const GET_DEV_INFO: u16 = 0x0302; // Returns 20 words of device information

// Registers
pub const I80CPCR: u16 = 0x0004; // Packed pixel write enable
pub const LISAR: u16 = 0x1208; // Load image start address (low word, high word at +2)
pub const LUTAFSR: u16 = 0x1224; // LUT engine status, 0 when all waveforms finished

// LD_IMG_AREA flag fields
pub const PIXEL_FORMAT_4BPP: u16 = 2;

/// Number of words returned by [`GET_DEV_INFO`]
pub const DEV_INFO_WORDS: usize = 20;

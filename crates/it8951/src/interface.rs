//! Hardware interface abstraction
//!
//! This module provides the [`DisplayInterface`] trait and the [`Interface`] struct
//! for communicating with the IT8951 controller over SPI.
//!
//! ## Hardware Requirements
//!
//! The IT8951 requires:
//! - SPI bus (MOSI + MISO + SCK + CS), mode 0, 16-bit words sent high byte first
//! - 1 GPIO pin:
//!   - **HRDY**: Host ready (input, high when the controller accepts a transfer)
//!
//! Every transfer starts with a preamble word selecting command, write or read.
//!
//! ## Example
//!
//! ```rust,ignore
//! use it8951::Interface;
//!
//! let mut interface = Interface::new(spi_device, hrdy_pin);
//!
//! interface.write_command(0x0001)?; // SYS_RUN
//! interface.write_words(&[0x0004, 0x0001])?;
//! ```

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::command::{PREAMBLE_COMMAND, PREAMBLE_READ, PREAMBLE_WRITE};

/// Largest number of words moved by one [`DisplayInterface::read_words`] or
/// one chunk of [`DisplayInterface::write_words`]
pub const MAX_TRANSFER_WORDS: usize = 32;

/// Trait for hardware interface to IT8951 controller
///
/// This trait abstracts over different hardware implementations,
/// allowing the [`Display`](crate::display::Display) to work with any
/// SPI + GPIO implementation that satisfies embedded-hal traits.
pub trait DisplayInterface {
    /// Error type for interface operations
    type Error: Debug;

    /// Send one command word
    ///
    /// # Errors
    ///
    /// Returns an error if SPI communication or GPIO fails.
    fn write_command(&mut self, command: u16) -> Result<(), Self::Error>;

    /// Send argument or register words
    ///
    /// # Errors
    ///
    /// Returns an error if SPI communication or GPIO fails.
    fn write_words(&mut self, words: &[u16]) -> Result<(), Self::Error>;

    /// Send packed pixel bytes in a single transfer
    ///
    /// # Arguments
    ///
    /// * `pixels` - Bytes already laid out in wire order
    ///
    /// # Errors
    ///
    /// Returns an error if SPI communication or GPIO fails.
    fn write_pixels(&mut self, pixels: &[u8]) -> Result<(), Self::Error>;

    /// Read response words following a command
    ///
    /// # Errors
    ///
    /// Returns an error if SPI communication or GPIO fails, or more than
    /// [`MAX_TRANSFER_WORDS`] words are requested.
    fn read_words(&mut self, words: &mut [u16]) -> Result<(), Self::Error>;

    /// Wait for HRDY to go high (with timeout)
    ///
    /// # Errors
    ///
    /// Returns [`InterfaceError::Timeout`] if HRDY doesn't go high within
    /// the implementation-specific timeout period.
    fn busy_wait<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Self::Error>;
}

/// Errors that can occur at the interface level
///
/// Generic over SPI and GPIO error types.
#[derive(Debug)]
pub enum InterfaceError<SpiErr, PinErr> {
    /// SPI communication error
    Spi(SpiErr),
    /// GPIO pin error
    Pin(PinErr),
    /// Timeout waiting for HRDY
    Timeout,
    /// Read larger than [`MAX_TRANSFER_WORDS`]
    TransferTooLarge(usize),
}

impl<SpiErr: Debug, PinErr: Debug> core::fmt::Display for InterfaceError<SpiErr, PinErr> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InterfaceError::Spi(e) => write!(f, "SPI error: {e:?}"),
            InterfaceError::Pin(e) => write!(f, "Pin error: {e:?}"),
            InterfaceError::Timeout => write!(f, "Timeout waiting for HRDY"),
            InterfaceError::TransferTooLarge(n) => {
                write!(f, "Transfer of {n} words exceeds {MAX_TRANSFER_WORDS}")
            }
        }
    }
}

impl<SpiErr: Debug, PinErr: Debug> core::error::Error for InterfaceError<SpiErr, PinErr> {}

/// Hardware interface implementation for IT8951
///
/// ## Type Parameters
///
/// * `SPI` - SPI device implementing [`SpiDevice`], owns chip select
/// * `HRDY` - Host ready pin implementing [`InputPin`]
pub struct Interface<SPI, HRDY> {
    spi: SPI,
    hrdy: HRDY,
    /// HRDY polling budget in milliseconds
    timeout_ms: u32,
}

impl<SPI, HRDY> Interface<SPI, HRDY>
where
    SPI: SpiDevice,
    HRDY: InputPin,
{
    /// Create a new Interface with a 3 second HRDY timeout
    pub fn new(spi: SPI, hrdy: HRDY) -> Self {
        Self {
            spi,
            hrdy,
            timeout_ms: 3_000,
        }
    }

    /// Override the HRDY polling budget
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Release the bus and pin
    pub fn release(self) -> (SPI, HRDY) {
        (self.spi, self.hrdy)
    }

    fn hrdy_high(&mut self) -> Result<bool, InterfaceError<SPI::Error, HRDY::Error>> {
        self.hrdy.is_high().map_err(InterfaceError::Pin)
    }

    /// HRDY must be high before chip select is asserted. Controllers answer within
    /// microseconds between commands, so this spins without a delay provider.
    fn wait_ready(&mut self) -> Result<(), InterfaceError<SPI::Error, HRDY::Error>> {
        let mut spins = 0u32;
        while !self.hrdy_high()? {
            spins += 1;
            if spins >= self.timeout_ms.saturating_mul(1_000) {
                return Err(InterfaceError::Timeout);
            }
        }
        Ok(())
    }
}

fn encode(words: &[u16], bytes: &mut [u8]) -> usize {
    for (word, chunk) in words.iter().zip(bytes.chunks_exact_mut(2)) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    words.len() * 2
}

impl<SPI, HRDY> DisplayInterface for Interface<SPI, HRDY>
where
    SPI: SpiDevice,
    SPI::Error: Debug,
    HRDY: InputPin,
    HRDY::Error: Debug,
{
    type Error = InterfaceError<SPI::Error, HRDY::Error>;

    fn write_command(&mut self, command: u16) -> Result<(), Self::Error> {
        self.wait_ready()?;
        let mut frame = [0u8; 4];
        encode(&[PREAMBLE_COMMAND, command], &mut frame);
        self.spi.write(&frame).map_err(InterfaceError::Spi)
    }

    fn write_words(&mut self, words: &[u16]) -> Result<(), Self::Error> {
        let mut bytes = [0u8; MAX_TRANSFER_WORDS * 2];
        for chunk in words.chunks(MAX_TRANSFER_WORDS) {
            self.wait_ready()?;
            let len = encode(chunk, &mut bytes);
            self.spi
                .transaction(&mut [
                    Operation::Write(&PREAMBLE_WRITE.to_be_bytes()),
                    Operation::Write(&bytes[..len]),
                ])
                .map_err(InterfaceError::Spi)?;
        }
        Ok(())
    }

    fn write_pixels(&mut self, pixels: &[u8]) -> Result<(), Self::Error> {
        self.wait_ready()?;
        self.spi
            .transaction(&mut [
                Operation::Write(&PREAMBLE_WRITE.to_be_bytes()),
                Operation::Write(pixels),
            ])
            .map_err(InterfaceError::Spi)
    }

    fn read_words(&mut self, words: &mut [u16]) -> Result<(), Self::Error> {
        if words.len() > MAX_TRANSFER_WORDS {
            return Err(InterfaceError::TransferTooLarge(words.len()));
        }
        self.wait_ready()?;
        let mut dummy = [0u8; 2];
        let mut bytes = [0u8; MAX_TRANSFER_WORDS * 2];
        let len = words.len() * 2;
        self.spi
            .transaction(&mut [
                Operation::Write(&PREAMBLE_READ.to_be_bytes()),
                Operation::Read(&mut dummy),
                Operation::Read(&mut bytes[..len]),
            ])
            .map_err(InterfaceError::Spi)?;
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(())
    }

    fn busy_wait<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Self::Error> {
        let mut waited = 0u32;
        loop {
            if self.hrdy_high()? {
                return Ok(());
            }
            delay.delay_ms(1);
            waited += 1;
            if waited >= self.timeout_ms {
                return Err(InterfaceError::Timeout);
            }
        }
    }
}

//! Enum wrapper for card reader dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn CardReader>`
//! is not available. The CLI picks a reader at runtime from its `--device`
//! argument and hands the agent an [`AnyCardReader`] instead.
//!
//! # Examples
//!
//! ```
//! use tapin_hardware::devices::AnyCardReader;
//! use tapin_hardware::mock::MockReader;
//! use tapin_hardware::CardReader;
//!
//! let (reader, _handle) = MockReader::new();
//! let any_reader = AnyCardReader::Mock(reader);
//! assert_eq!(any_reader.info().name, "Mock Card Reader");
//! ```

use tapin_core::CardId;

use crate::line::LineReader;
use crate::mock::MockReader;
#[cfg(feature = "hardware-pcsc")]
use crate::pcsc_reader::PcscReader;
use crate::{CardReader, ReaderInfo, Result};

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    /// Hex-per-line reader (stdin, TTY, FIFO).
    Line(LineReader),

    /// PC/SC contactless reader.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscReader),

    /// Mock reader for development and testing.
    Mock(MockReader),
}

impl CardReader for AnyCardReader {
    async fn open(&mut self) -> Result<()> {
        match self {
            Self::Line(device) => device.open().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.open().await,
            Self::Mock(device) => device.open().await,
        }
    }

    async fn await_card(&mut self) -> Result<CardId> {
        match self {
            Self::Line(device) => device.await_card().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.await_card().await,
            Self::Mock(device) => device.await_card().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Line(device) => device.close().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.close().await,
            Self::Mock(device) => device.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Line(device) => device.is_open(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.is_open(),
            Self::Mock(device) => device.is_open(),
        }
    }

    fn info(&self) -> ReaderInfo {
        match self {
            Self::Line(device) => device.info(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.info(),
            Self::Mock(device) => device.info(),
        }
    }
}

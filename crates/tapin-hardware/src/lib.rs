//! Card reader abstraction layer for the tapin check-in agent.
//!
//! This crate provides the [`CardReader`] trait, the boundary between the
//! agent loop and a proximity-card reader, plus the readers the agent ships
//! with:
//!
//! - [`LineReader`]: one hex UID per line from stdin, a TTY or a FIFO
//!   (keyboard-wedge and serial UID readers).
//! - `PcscReader` (feature `hardware-pcsc`): PC/SC contactless readers such
//!   as the ACR122U.
//! - [`mock::MockReader`]: channel-driven reader for tests and development.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Enum dispatch**: [`devices::AnyCardReader`] stands in for trait objects.
//! - **Error-aware**: All operations return [`Result<T>`][error::Result];
//!   [`HardwareError::is_unavailable`] separates "cannot open" from
//!   "failed while in use".
//!
//! # Example
//!
//! ```no_run
//! use tapin_hardware::{CardReader, LineReader};
//!
//! # async fn example() -> tapin_hardware::Result<()> {
//! let mut reader = LineReader::stdin();
//! reader.open().await?;
//! let card = reader.await_card().await?;
//! println!("card {}", card.to_hex());
//! reader.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod line;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_reader;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnyCardReader;
pub use error::{HardwareError, Result};
pub use line::LineReader;
#[cfg(feature = "hardware-pcsc")]
pub use pcsc_reader::PcscReader;
pub use traits::CardReader;
pub use types::ReaderInfo;

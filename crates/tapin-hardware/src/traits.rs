//! Card reader trait definition.
//!
//! This module defines the contract between the agent loop and a physical
//! (or simulated) proximity-card reader. The agent only ever sees three
//! operations: open the device, wait for the next card, close the device.
//! Whatever the underlying protocol needs in between (poll ticks, connect
//! probes, status words) stays inside the implementation.
//!
//! All methods use native `async fn` (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use tapin_core::CardId;

use crate::error::Result;
use crate::types::ReaderInfo;

/// Proximity-card reader abstraction.
///
/// # Lifecycle
///
/// 1. `open()` acquires the device. Failure here is reported as
///    [`HardwareError::Unavailable`](crate::HardwareError::Unavailable).
/// 2. `await_card()` is called repeatedly; each call returns one card
///    presentation.
/// 3. `close()` releases the device. It is idempotent.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper
/// [`AnyCardReader`](crate::devices::AnyCardReader) when the concrete reader
/// is picked at runtime.
///
/// # Examples
///
/// ```no_run
/// use tapin_hardware::traits::CardReader;
/// use tapin_hardware::error::Result;
///
/// async fn next_card_hex<R: CardReader>(reader: &mut R) -> Result<String> {
///     if !reader.is_open() {
///         reader.open().await?;
///     }
///     let card = reader.await_card().await?;
///     Ok(card.to_hex())
/// }
/// ```
pub trait CardReader: Send {
    /// Acquire the device.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Unavailable` if the device is missing, busy,
    /// or cannot be reached.
    async fn open(&mut self) -> Result<()>;

    /// Wait for the next card presentation and return its identifier.
    ///
    /// Blocks (asynchronously) for as long as it takes a card to be
    /// presented. Must not return on internal polling ticks. Dropping the
    /// returned future abandons the wait without losing the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reader is not open
    /// - The device is disconnected
    /// - A communication error occurs
    async fn await_card(&mut self) -> Result<CardId>;

    /// Release the device. Calling it on a closed reader is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the device reports a failure while releasing;
    /// the reader is considered closed either way.
    async fn close(&mut self) -> Result<()>;

    /// Whether `open()` succeeded and `close()` has not been called since.
    fn is_open(&self) -> bool;

    /// Reader metadata for logs and operator output.
    fn info(&self) -> ReaderInfo;
}

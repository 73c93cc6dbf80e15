//! Mock card reader implementation for testing and development.
//!
//! This module provides a simulated reader driven through a channel, so
//! tests can present cards, inject failures, and observe how often the
//! device was opened and released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tapin_core::CardId;
use tokio::sync::mpsc;

use crate::{CardReader, HardwareError, ReaderInfo, Result};

/// Internal event type for the mock reader.
#[derive(Debug, Clone)]
enum ReaderEvent {
    CardPresented(CardId),
    Failure(String),
}

#[derive(Debug, Default)]
struct MockState {
    opens: AtomicUsize,
    releases: AtomicUsize,
    unavailable: AtomicBool,
    open_blocks: AtomicBool,
    open_attempts: AtomicUsize,
}

/// Mock card reader for testing and development.
///
/// # Examples
///
/// ```
/// use tapin_hardware::mock::MockReader;
/// use tapin_hardware::CardReader;
///
/// #[tokio::main]
/// async fn main() -> tapin_hardware::Result<()> {
///     let (mut reader, handle) = MockReader::new();
///     reader.open().await?;
///
///     handle.present_card(vec![0x04, 0xAB, 0xCD, 0xEF]).await?;
///
///     let card = reader.await_card().await?;
///     assert_eq!(card.to_hex(), "04abcdef");
///
///     reader.close().await?;
///     assert_eq!(handle.release_count(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    /// Channel receiver for reader events
    event_rx: mpsc::Receiver<ReaderEvent>,

    /// Device name
    name: String,

    /// Whether the device is currently open
    open: bool,

    state: Arc<MockState>,
}

impl MockReader {
    /// Create a new mock reader with the default name.
    ///
    /// Returns a tuple of (MockReader, MockReaderHandle) where the handle
    /// can be used to simulate card presentations.
    pub fn new() -> (Self, MockReaderHandle) {
        Self::with_name("Mock Card Reader")
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockReaderHandle) {
        let name = name.into();
        let (event_tx, event_rx) = mpsc::channel(32);
        let state = Arc::new(MockState::default());

        let reader = Self {
            event_rx,
            name: name.clone(),
            open: false,
            state: Arc::clone(&state),
        };

        let handle = MockReaderHandle {
            event_tx,
            name,
            state,
        };

        (reader, handle)
    }
}

impl Default for MockReader {
    fn default() -> Self {
        Self::new().0
    }
}

impl CardReader for MockReader {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        self.state.open_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.open_blocks.load(Ordering::SeqCst) {
            // Like a FIFO with no writer.
            std::future::pending::<()>().await;
        }
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(HardwareError::unavailable(&self.name, "device not found"));
        }
        self.open = true;
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn await_card(&mut self) -> Result<CardId> {
        if !self.open {
            return Err(HardwareError::not_open(&self.name));
        }

        let event = self
            .event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected(&self.name))?;

        match event {
            ReaderEvent::CardPresented(card) => Ok(card),
            ReaderEvent::Failure(message) => Err(HardwareError::communication(message)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn info(&self) -> ReaderInfo {
        ReaderInfo::new(
            self.name.clone(),
            vec!["ISO14443A".to_string(), "ISO14443B".to_string()],
        )
    }
}

/// Handle for controlling a mock reader.
///
/// Clones share the same reader: events from any clone arrive in order at
/// the single `MockReader`.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    /// Channel sender for reader events
    event_tx: mpsc::Sender<ReaderEvent>,

    /// Device name
    name: String,

    state: Arc<MockState>,
}

impl MockReaderHandle {
    /// Present a card with the given UID to the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The UID length is invalid
    /// - The reader has been dropped and the channel is closed
    pub async fn present_card(&self, uid: Vec<u8>) -> Result<()> {
        let card = CardId::new(uid).map_err(|e| HardwareError::invalid_data(e.to_string()))?;
        self.send(ReaderEvent::CardPresented(card)).await
    }

    /// Make the next `await_card()` fail with a communication error.
    pub async fn inject_failure(&self, message: impl Into<String>) -> Result<()> {
        self.send(ReaderEvent::Failure(message.into())).await
    }

    /// Make subsequent `open()` calls fail as if the device were unplugged.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make subsequent `open()` calls never complete.
    pub fn set_open_blocks(&self, blocks: bool) {
        self.state.open_blocks.store(blocks, Ordering::SeqCst);
    }

    /// Number of `open()` calls on a closed reader, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.state.open_attempts.load(Ordering::SeqCst)
    }

    /// Number of successful `open()` calls.
    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Number of times an open device was released.
    pub fn release_count(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: ReaderEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("mock reader event channel closed"))
    }
}

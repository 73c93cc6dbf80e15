//! PC/SC card reader (ACR122U and other CCID contactless readers).
//!
//! The PC/SC API is blocking, so every call runs on Tokio's blocking pool in
//! short ticks. Waiting for a card looks like this:
//!
//! ```text
//! get_status_change(tick) ──timeout──> (no-op, wait again)
//!        │
//!        ├─ EMPTY ────────────────────> forget last card, wait again
//!        ├─ PRESENT (already reported) > wait for removal
//!        └─ PRESENT (new) ──> connect ──> FF CA 00 00 00 ──> 90 00 ──> UID
//! ```
//!
//! A present state whose connect or exchange fails because the card already
//! left the field is treated as a no-op tick, not as a failure.

use std::ffi::CString;
use std::time::Duration;

use pcsc::{Context, Disposition, Protocols, ReaderState, Scope, ShareMode, State};
use tapin_core::CardId;
use tracing::{debug, info, warn};

use crate::{CardReader, HardwareError, ReaderInfo, Result};

/// How long one blocking status wait may take before control returns to the
/// runtime.
const STATUS_TICK: Duration = Duration::from_millis(250);

/// PC/SC pseudo-APDU: get the UID of the card in the field.
const GET_UID_APDU: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Status word for a successful exchange.
const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

struct Session {
    context: Context,
    reader: CString,
    current_state: State,
    card_reported: bool,
}

/// Card reader backed by the platform PC/SC service.
pub struct PcscReader {
    reader_filter: Option<String>,
    session: Option<Session>,
}

impl PcscReader {
    /// Use the first reader PC/SC reports.
    pub fn new() -> Self {
        Self {
            reader_filter: None,
            session: None,
        }
    }

    /// Use the first reader whose name contains `filter`.
    pub fn with_reader(filter: impl Into<String>) -> Self {
        Self {
            reader_filter: Some(filter.into()),
            session: None,
        }
    }

    fn device_name(&self) -> String {
        match (&self.session, &self.reader_filter) {
            (Some(session), _) => session.reader.to_string_lossy().into_owned(),
            (None, Some(filter)) => format!("pcsc:{filter}"),
            (None, None) => "pcsc".to_string(),
        }
    }
}

impl Default for PcscReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PcscReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscReader")
            .field("reader", &self.device_name())
            .field("open", &self.session.is_some())
            .finish()
    }
}

/// Map PC/SC errors that mean the reader or service went away.
fn is_gone(error: &pcsc::Error) -> bool {
    matches!(
        error,
        pcsc::Error::ReaderUnavailable
            | pcsc::Error::UnknownReader
            | pcsc::Error::NoReadersAvailable
            | pcsc::Error::NoService
            | pcsc::Error::ServiceStopped
    )
}

/// The card left the field between detection and exchange.
fn is_card_gone(error: &pcsc::Error) -> bool {
    matches!(
        error,
        pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard | pcsc::Error::ResetCard
    )
}

fn read_uid(context: &Context, reader: &CString) -> std::result::Result<Vec<u8>, pcsc::Error> {
    let card = context.connect(reader, ShareMode::Shared, Protocols::ANY)?;
    let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
    let response = card.transmit(&GET_UID_APDU, &mut buffer)?.to_vec();
    if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
        debug!(error = %e, "Card disconnect failed");
    }
    Ok(response)
}

/// Split a GET UID response into the UID, checking the trailing status word.
pub(crate) fn uid_from_response(response: &[u8]) -> Result<Vec<u8>> {
    match response.split_last_chunk::<2>() {
        Some((uid, sw)) if *sw == SW_SUCCESS => Ok(uid.to_vec()),
        Some((_, sw)) => Err(HardwareError::invalid_data(format!(
            "GET UID failed with status {:02X}{:02X}",
            sw[0], sw[1]
        ))),
        None => Err(HardwareError::invalid_data("GET UID response too short")),
    }
}

impl CardReader for PcscReader {
    async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let device = self.device_name();
        let filter = self.reader_filter.clone();
        let session = tokio::task::spawn_blocking(move || {
            let context = Context::establish(Scope::User)
                .map_err(|e| HardwareError::unavailable(&device, format!("PC/SC service: {e}")))?;
            let readers = context
                .list_readers_owned()
                .map_err(|e| HardwareError::unavailable(&device, format!("listing readers: {e}")))?;
            let reader = readers
                .into_iter()
                .find(|name| {
                    filter
                        .as_deref()
                        .is_none_or(|f| name.to_string_lossy().contains(f))
                })
                .ok_or_else(|| HardwareError::unavailable(&device, "no matching reader connected"))?;
            Ok::<_, HardwareError>(Session {
                context,
                reader,
                current_state: State::UNAWARE,
                card_reported: false,
            })
        })
        .await
        .map_err(|e| HardwareError::unavailable(self.device_name(), e.to_string()))??;

        info!(device = %session.reader.to_string_lossy(), "PC/SC reader opened");
        self.session = Some(session);
        Ok(())
    }

    async fn await_card(&mut self) -> Result<CardId> {
        let device = self.device_name();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| HardwareError::not_open(&device))?;

        loop {
            let context = session.context.clone();
            let reader = session.reader.clone();
            let current = session.current_state;

            let (event, status) = tokio::task::spawn_blocking(move || {
                let mut states = [ReaderState::new(reader, current)];
                let status = context.get_status_change(Some(STATUS_TICK), &mut states);
                (states[0].event_state(), status)
            })
            .await
            .map_err(|e| HardwareError::communication(format!("status task failed: {e}")))?;

            match status {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => continue,
                Err(e) if is_gone(&e) => {
                    warn!(device = %device, error = %e, "PC/SC reader went away");
                    self.session = None;
                    return Err(HardwareError::disconnected(device));
                }
                Err(e) => return Err(HardwareError::communication(e.to_string())),
            }

            let mut next = event;
            next.remove(State::CHANGED);
            session.current_state = next;

            if event.contains(State::EMPTY) {
                session.card_reported = false;
                continue;
            }
            if !event.contains(State::PRESENT) || event.contains(State::MUTE) {
                continue;
            }
            if session.card_reported {
                continue;
            }

            let context = session.context.clone();
            let reader = session.reader.clone();
            let exchange = tokio::task::spawn_blocking(move || read_uid(&context, &reader))
                .await
                .map_err(|e| HardwareError::communication(format!("exchange task failed: {e}")))?;

            let response = match exchange {
                Ok(response) => response,
                Err(e) if is_card_gone(&e) => {
                    debug!(device = %device, error = %e, "Card left before exchange");
                    continue;
                }
                Err(e) if is_gone(&e) => {
                    self.session = None;
                    return Err(HardwareError::disconnected(device));
                }
                Err(e) => return Err(HardwareError::communication(e.to_string())),
            };

            session.card_reported = true;
            let uid = uid_from_response(&response)?;
            return CardId::new(uid).map_err(|e| HardwareError::invalid_data(e.to_string()));
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            info!(device = %session.reader.to_string_lossy(), "PC/SC reader closed");
            if let Err((_, e)) = session.context.release() {
                warn!(error = %e, "Releasing PC/SC context failed");
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn info(&self) -> ReaderInfo {
        ReaderInfo::new(
            self.device_name(),
            vec!["ISO14443A".to_string(), "ISO14443B".to_string()],
        )
    }
}

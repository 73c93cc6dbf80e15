//! Line-oriented card reader.
//!
//! Keyboard-wedge readers and most USB-serial "UID printer" modules emit one
//! card identifier per line as hex text. This reader consumes such a stream
//! from stdin, from a device node or FIFO, or from any async byte source.
//!
//! Lines that are blank or not a hex UID (banners, firmware chatter) are
//! skipped without returning to the caller.

use std::fmt;
use std::path::PathBuf;

use tapin_core::CardId;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{debug, info, trace};

use crate::{CardReader, HardwareError, ReaderInfo, Result};

type LineStream = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Where the reader's lines come from.
enum LineSource {
    Stdin,
    Path(PathBuf),
    /// A pre-opened stream; it can be opened once.
    Stream(Option<Box<dyn AsyncRead + Send + Unpin>>),
}

/// Card reader that parses one hex identifier per input line.
///
/// # Examples
///
/// ```
/// use tapin_hardware::{CardReader, LineReader};
///
/// #[tokio::main]
/// async fn main() -> tapin_hardware::Result<()> {
///     let input: &[u8] = b"reader v1.2 ready\n04:AB:CD:EF\n";
///     let mut reader = LineReader::from_stream("test", input);
///
///     reader.open().await?;
///     let card = reader.await_card().await?;
///     assert_eq!(card.to_hex(), "04abcdef");
///     reader.close().await?;
///     Ok(())
/// }
/// ```
pub struct LineReader {
    name: String,
    source: LineSource,
    lines: Option<LineStream>,
}

impl LineReader {
    /// Read identifiers from the process's standard input.
    pub fn stdin() -> Self {
        Self {
            name: "stdin".to_string(),
            source: LineSource::Stdin,
            lines: None,
        }
    }

    /// Read identifiers from a device node, FIFO or file.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            source: LineSource::Path(path),
            lines: None,
        }
    }

    /// Read identifiers from an already open byte stream.
    pub fn from_stream(name: impl Into<String>, stream: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            source: LineSource::Stream(Some(Box::new(stream))),
            lines: None,
        }
    }

    async fn open_source(&mut self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        match &mut self.source {
            LineSource::Stdin => Ok(Box::new(tokio::io::stdin())),
            LineSource::Path(path) => {
                let file = tokio::fs::File::open(&*path)
                    .await
                    .map_err(|e| HardwareError::unavailable(&self.name, e.to_string()))?;
                Ok(Box::new(file))
            }
            LineSource::Stream(stream) => stream
                .take()
                .ok_or_else(|| HardwareError::unavailable(&self.name, "stream already consumed")),
        }
    }
}

impl fmt::Debug for LineReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineReader")
            .field("name", &self.name)
            .field("open", &self.lines.is_some())
            .finish()
    }
}

/// Extract a card id from one input line, if it holds one.
pub(crate) fn parse_card_line(line: &str) -> Option<CardId> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    CardId::from_hex(line).ok()
}

impl CardReader for LineReader {
    async fn open(&mut self) -> Result<()> {
        if self.lines.is_some() {
            return Ok(());
        }

        let source = self.open_source().await?;
        self.lines = Some(BufReader::new(source).lines());
        info!(device = %self.name, "Line reader opened");
        Ok(())
    }

    async fn await_card(&mut self) -> Result<CardId> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| HardwareError::not_open(&self.name))?;

        loop {
            match lines.next_line().await? {
                Some(line) => match parse_card_line(&line) {
                    Some(card) => {
                        trace!(device = %self.name, card_id = %card, "Card line received");
                        return Ok(card);
                    }
                    None => debug!(device = %self.name, line = %line.trim(), "Ignoring non-card line"),
                },
                None => {
                    self.lines = None;
                    return Err(HardwareError::disconnected(&self.name));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.lines.take().is_some() {
            info!(device = %self.name, "Line reader closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    fn info(&self) -> ReaderInfo {
        ReaderInfo::new(self.name.clone(), vec!["hex-lines".to_string()])
    }
}

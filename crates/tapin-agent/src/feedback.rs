//! Operator-facing feedback.
//!
//! Feedback is built as plain data from the scan event and its result, then
//! handed to a [`FeedbackSink`]. The wording is presentation only; what each
//! block carries (card id, user, action, duration, failure reason) is what
//! the operator relies on.
//!
//! # Examples
//!
//! ```
//! use tapin_agent::Feedback;
//! use tapin_core::CheckResult;
//!
//! let feedback = Feedback::for_result(
//!     &CheckResult::CheckedIn { user: "Alice".to_string() },
//!     "http://localhost:3000/api/checkin",
//! );
//! assert_eq!(feedback.headline(), Some("CHECK IN: Alice"));
//! ```

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tapin_core::{CheckResult, ScanEvent, TransportFailureKind};
use tapin_hardware::{HardwareError, ReaderInfo};

/// Width of separator rules and the banner box.
const RULE_WIDTH: usize = 50;

/// How a line is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Boxed title text.
    Heading,
    /// Something happened that needs no judgement.
    Notice,
    /// Positive outcome.
    Success,
    /// Negative outcome.
    Failure,
    /// Supporting text under the previous line.
    Detail,
    /// Horizontal rule.
    Separator,
}

/// One line of operator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackLine {
    pub kind: LineKind,
    pub text: String,
}

impl FeedbackLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn separator() -> Self {
        Self::new(LineKind::Separator, String::new())
    }
}

/// A block of operator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    lines: Vec<FeedbackLine>,
    /// Lines belong to a scan and are indented under its notice.
    nested: bool,
}

impl Feedback {
    fn top(lines: Vec<FeedbackLine>) -> Self {
        Self {
            lines,
            nested: false,
        }
    }

    fn nested(lines: Vec<FeedbackLine>) -> Self {
        Self {
            lines,
            nested: true,
        }
    }

    /// Startup banner.
    pub fn banner(version: &str) -> Self {
        Self::top(vec![
            FeedbackLine::new(LineKind::Heading, format!("tapin check-in agent v{version}")),
            FeedbackLine::new(LineKind::Heading, "Press Ctrl+C to exit"),
        ])
    }

    /// The reader opened and the loop is about to wait for cards.
    pub fn ready(reader: &ReaderInfo, endpoint: &str) -> Self {
        Self::top(vec![
            FeedbackLine::new(
                LineKind::Success,
                format!("Card reader connected: {}", reader.name),
            ),
            FeedbackLine::new(LineKind::Success, format!("API endpoint: {endpoint}")),
            FeedbackLine::separator(),
            FeedbackLine::new(LineKind::Notice, "Reader ready. Waiting for cards..."),
            FeedbackLine::separator(),
        ])
    }

    /// The reader could not be opened at startup.
    pub fn reader_unavailable(error: &HardwareError) -> Self {
        Self::top(vec![
            FeedbackLine::new(
                LineKind::Failure,
                format!("Error connecting to card reader: {error}"),
            ),
            FeedbackLine::new(LineKind::Detail, "Make sure the reader is connected"),
        ])
    }

    /// A card was presented.
    pub fn card_detected(event: &ScanEvent) -> Self {
        Self::top(vec![
            FeedbackLine::new(LineKind::Notice, "Card detected"),
            FeedbackLine::new(LineKind::Detail, format!("Card ID: {}", event.card_id())),
            FeedbackLine::new(
                LineKind::Detail,
                format!("Time: {}", event.scanned_at().format("%Y-%m-%d %H:%M:%S")),
            ),
        ])
    }

    /// Outcome of a submission.
    pub fn for_result(result: &CheckResult, endpoint: &str) -> Self {
        let mut lines = match result {
            CheckResult::CheckedIn { user } => {
                vec![FeedbackLine::new(LineKind::Success, format!("CHECK IN: {user}"))]
            }
            CheckResult::CheckedOut { user, duration } => {
                let mut lines = vec![FeedbackLine::new(
                    LineKind::Success,
                    format!("CHECK OUT: {user}"),
                )];
                if let Some(duration) = duration {
                    lines.push(FeedbackLine::new(
                        LineKind::Detail,
                        format!("Duration: {duration}"),
                    ));
                }
                lines
            }
            CheckResult::UnknownCard => vec![
                FeedbackLine::new(LineKind::Failure, "Card not registered"),
                FeedbackLine::new(LineKind::Detail, "Please add this card in the web interface"),
            ],
            CheckResult::ServiceError { status_code, body } => {
                let mut lines = vec![FeedbackLine::new(
                    LineKind::Failure,
                    format!("Error: {status_code}"),
                )];
                if !body.is_empty() {
                    lines.push(FeedbackLine::new(LineKind::Detail, body.clone()));
                }
                lines
            }
            CheckResult::TransportFailure { kind, detail } => match kind {
                TransportFailureKind::Connection => vec![
                    FeedbackLine::new(LineKind::Failure, "Cannot connect to server"),
                    FeedbackLine::new(
                        LineKind::Detail,
                        format!("Check if API is running at: {endpoint}"),
                    ),
                ],
                TransportFailureKind::Timeout => vec![
                    FeedbackLine::new(LineKind::Failure, "Request timeout"),
                    FeedbackLine::new(LineKind::Detail, detail.clone()),
                ],
                TransportFailureKind::Other => vec![FeedbackLine::new(
                    LineKind::Failure,
                    format!("Network error: {detail}"),
                )],
            },
        };
        lines.push(FeedbackLine::separator());
        Self::nested(lines)
    }

    /// The reader failed while the loop was running.
    pub fn device_failure(error: &HardwareError) -> Self {
        Self::top(vec![FeedbackLine::new(
            LineKind::Failure,
            format!("Reader error: {error}"),
        )])
    }

    /// Shutdown was requested.
    pub fn shutting_down() -> Self {
        Self::top(vec![FeedbackLine::new(
            LineKind::Success,
            "Shutting down card reader...",
        )])
    }

    /// The reader was released.
    pub fn reader_closed() -> Self {
        Self::top(vec![FeedbackLine::new(LineKind::Success, "Card reader closed")])
    }

    /// All lines, separators included.
    pub fn lines(&self) -> &[FeedbackLine] {
        &self.lines
    }

    /// Text of every non-separator line.
    pub fn texts(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| line.kind != LineKind::Separator)
            .map(|line| line.text.as_str())
            .collect()
    }

    /// First non-separator line.
    pub fn headline(&self) -> Option<&str> {
        self.texts().into_iter().next()
    }

    /// Whether the block is indented under a scan notice.
    pub fn is_nested(&self) -> bool {
        self.nested
    }
}

/// Destination for operator feedback.
pub trait FeedbackSink {
    fn emit(&mut self, feedback: &Feedback);
}

/// Writes feedback as text, stdout by default.
///
/// Write errors are dropped: a closed terminal must not stop the agent.
#[derive(Debug)]
pub struct ConsoleSink<W = io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_block(&mut self, feedback: &Feedback) -> io::Result<()> {
        let indent = if feedback.is_nested() { "   " } else { "" };
        let lines = feedback.lines();

        let mut i = 0;
        while i < lines.len() {
            if lines[i].kind == LineKind::Heading {
                let start = i;
                while i < lines.len() && lines[i].kind == LineKind::Heading {
                    i += 1;
                }
                self.write_box(&lines[start..i])?;
                continue;
            }

            let line = &lines[i];
            match line.kind {
                LineKind::Notice => writeln!(self.out, "\n🔵 {}", line.text)?,
                LineKind::Success => writeln!(self.out, "{indent}✓ {}", line.text)?,
                LineKind::Failure => writeln!(self.out, "{indent}✗ {}", line.text)?,
                LineKind::Detail => writeln!(self.out, "   {}", line.text)?,
                LineKind::Separator => writeln!(self.out, "{}", "━".repeat(RULE_WIDTH))?,
                LineKind::Heading => {}
            }
            i += 1;
        }
        self.out.flush()
    }

    fn write_box(&mut self, lines: &[FeedbackLine]) -> io::Result<()> {
        let inner = RULE_WIDTH - 2;
        writeln!(self.out, "╔{}╗", "═".repeat(inner))?;
        for line in lines {
            writeln!(self.out, "║   {:<width$}║", line.text, width = inner - 3)?;
        }
        writeln!(self.out, "╚{}╝", "═".repeat(inner))
    }
}

impl<W: Write> FeedbackSink for ConsoleSink<W> {
    fn emit(&mut self, feedback: &Feedback) {
        let _ = self.write_block(feedback);
    }
}

/// Records feedback in memory.
///
/// Clones share the same record, so a test can keep one clone and hand the
/// other to the agent.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Feedback>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn records(&self) -> Vec<Feedback> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Text of every non-separator line emitted so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.records()
            .iter()
            .flat_map(|feedback| feedback.texts().into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    /// Whether any emitted line equals `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.texts().iter().any(|line| line == text)
    }
}

impl FeedbackSink for MemorySink {
    fn emit(&mut self, feedback: &Feedback) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(feedback.clone());
    }
}

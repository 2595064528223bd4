use std::fmt;

use harvest_core::PageNumber;
use serde::{Deserialize, Serialize};

use crate::export::ExportError;

/// One harvested search result, in export order of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: f64,
    pub sender: String,
    pub text: String,
    pub channel: Option<String>,
}

/// Outcome of running the extractor over one message group.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Accepted(Message),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoMessageElement,
    NoTimestamp,
    NoSender,
    NoText,
}

impl Rejection {
    pub fn field(&self) -> &'static str {
        match self {
            Rejection::NoMessageElement => "message",
            Rejection::NoTimestamp => "timestamp",
            Rejection::NoSender => "sender",
            Rejection::NoText => "text",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoMessageElement => write!(f, "no message element"),
            Rejection::NoTimestamp => write!(f, "no timestamp"),
            Rejection::NoSender => write!(f, "no sender"),
            Rejection::NoText => write!(f, "no text"),
        }
    }
}

/// Counts for one drained results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub page: PageNumber,
    /// Timestamps seen for the first time on this page.
    pub discovered: usize,
    /// Records that reached the export file.
    pub written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The browser session is gone; nothing else can succeed.
    pub fn is_fatal(&self) -> bool {
        self.kind == DriverErrorKind::Disconnected
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DriverError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    NotFound,
    Timeout,
    Script,
    Disconnected,
    Io,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverErrorKind::NotFound => write!(f, "not found"),
            DriverErrorKind::Timeout => write!(f, "timeout"),
            DriverErrorKind::Script => write!(f, "script error"),
            DriverErrorKind::Disconnected => write!(f, "browser disconnected"),
            DriverErrorKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("selector not found: {selector}")]
    SelectorNotFound { selector: String },
    #[error("timed out waiting for {what}")]
    WaitTimeout { what: String },
    #[error("extraction field missing: {field}")]
    ExtractionFieldMissing { field: &'static str },
    #[error("write failure: {0}")]
    WriteFailure(#[from] ExportError),
    #[error("session setup failed: {0}")]
    SessionFatal(String),
    #[error("cancelled")]
    Cancelled,
    #[error("driver error: {0}")]
    Driver(DriverError),
}

impl HarvestError {
    /// Errors that only concern the message group being processed.
    pub fn is_node_local(&self) -> bool {
        match self {
            HarvestError::SelectorNotFound { .. }
            | HarvestError::WaitTimeout { .. }
            | HarvestError::ExtractionFieldMissing { .. } => true,
            HarvestError::Driver(err) => !err.is_fatal(),
            HarvestError::WriteFailure(_)
            | HarvestError::SessionFatal(_)
            | HarvestError::Cancelled => false,
        }
    }

    /// Collapses everything except cancellation into `SessionFatal`.
    pub(crate) fn into_fatal(self) -> Self {
        match self {
            HarvestError::Cancelled | HarvestError::SessionFatal(_) => self,
            other => HarvestError::SessionFatal(other.to_string()),
        }
    }
}

impl From<DriverError> for HarvestError {
    fn from(err: DriverError) -> Self {
        match err.kind {
            DriverErrorKind::Timeout => HarvestError::WaitTimeout { what: err.message },
            _ => HarvestError::Driver(err),
        }
    }
}

impl From<Rejection> for HarvestError {
    fn from(reason: Rejection) -> Self {
        HarvestError::ExtractionFieldMissing {
            field: reason.field(),
        }
    }
}

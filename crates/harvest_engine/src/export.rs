//! Incremental, crash-tolerant export of harvested messages.
//!
//! Every record is rendered in full, written with a single call and synced
//! before the next one is accepted, so an interrupted run leaves a readable
//! file behind. A JSON export that was never closed is missing only its
//! closing bracket. A record whose write fails is cut back off the file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, TimeZone};

use crate::persist::{ensure_output_dir, PersistError};
use crate::Message;

/// Placeholder for messages whose channel could not be resolved.
pub const UNKNOWN_CHANNEL: &str = "unknown-channel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Text => write!(f, "text"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub written: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("record {index} not written: {source}")]
    Write { index: usize, source: io::Error },
    #[error("export already closed")]
    Closed,
}

/// Storage behind an [`ExportSink`]; a plain file unless a caller supplies
/// something else.
pub trait ExportTarget: Write + Seek + Send + fmt::Debug {
    /// Makes everything written so far durable.
    fn sync(&mut self) -> io::Result<()>;
    /// Cuts the storage back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl ExportTarget for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

#[derive(Debug)]
pub struct ExportSink {
    file: Option<Box<dyn ExportTarget>>,
    path: PathBuf,
    format: ExportFormat,
    written: usize,
}

impl ExportSink {
    /// Creates (or truncates) the export file. For JSON the array is opened
    /// immediately.
    pub fn create(path: impl Into<PathBuf>, format: ExportFormat) -> Result<Self, ExportError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            ensure_output_dir(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Self::with_target(path, format, Box::new(file))
    }

    /// Opens the document on `target`; `path` is only reported back.
    pub fn with_target(
        path: impl Into<PathBuf>,
        format: ExportFormat,
        mut target: Box<dyn ExportTarget>,
    ) -> Result<Self, ExportError> {
        let path = path.into();
        let opening: &[u8] = match format {
            ExportFormat::Json => b"[\n",
            ExportFormat::Text => b"",
        };
        write_durably(target.as_mut(), opening)?;
        engine_logging::engine_debug!("Export opened: {} ({format})", path.display());
        Ok(Self {
            file: Some(target),
            path,
            format,
            written: 0,
        })
    }

    /// Appends one record. The count only moves once the record is on disk;
    /// on failure the file is cut back to where the record started and the
    /// sink stays usable.
    pub fn write(&mut self, message: &Message) -> Result<(), ExportError> {
        let record = render_record(self.format, message, self.written)?;
        let index = self.written;
        let file = self.file.as_mut().ok_or(ExportError::Closed)?;
        let start = file.stream_position()?;
        if let Err(source) = write_durably(file.as_mut(), record.as_bytes()) {
            if let Err(err) = rewind(file.as_mut(), start) {
                engine_logging::engine_error!(
                    "Could not remove partial record {index} from {}: {err}",
                    self.path.display()
                );
            }
            return Err(ExportError::Write { index, source });
        }
        self.written += 1;
        Ok(())
    }

    /// Terminates the document. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<ExportSummary, ExportError> {
        if let Some(mut file) = self.file.take() {
            if self.format == ExportFormat::Json {
                let closing: &[u8] = if self.written == 0 { b"]" } else { b"\n]" };
                write_durably(file.as_mut(), closing)?;
            }
            engine_logging::engine_info!(
                "Export closed: {} record(s) in {}",
                self.written,
                self.path.display()
            );
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            path: self.path.clone(),
            format: self.format,
            written: self.written,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for ExportSink {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(err) = self.close() {
                engine_logging::engine_error!("Closing export on drop failed: {err}");
            }
        }
    }
}

fn write_durably(file: &mut dyn ExportTarget, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync()
}

fn rewind(file: &mut dyn ExportTarget, start: u64) -> io::Result<()> {
    file.truncate(start)?;
    file.seek(SeekFrom::Start(start))?;
    file.sync()
}

fn render_record(format: ExportFormat, message: &Message, index: usize) -> Result<String, ExportError> {
    match format {
        ExportFormat::Text => Ok(format!(
            "[{}] {} in #{}:\n{}\n\n",
            format_local_timestamp(message.timestamp),
            message.sender,
            message.channel.as_deref().unwrap_or(UNKNOWN_CHANNEL),
            message.text
        )),
        ExportFormat::Json => {
            let body = serde_json::to_string_pretty(message)?;
            if index == 0 {
                Ok(body)
            } else {
                Ok(format!(",\n{body}"))
            }
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` in the local zone; seconds since the epoch in, fraction dropped.
pub fn format_local_timestamp(timestamp: f64) -> String {
    format_timestamp_in(&Local, timestamp)
}

pub(crate) fn format_timestamp_in<Tz>(zone: &Tz, timestamp: f64) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let secs = timestamp.trunc() as i64;
    match zone.timestamp_opt(secs, 0).earliest() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{format_timestamp_in, ExportFormat};

    #[test]
    fn timestamps_drop_the_fraction() {
        assert_eq!(
            format_timestamp_in(&Utc, 1_700_000_000.123456),
            "2023-11-14 22:13:20"
        );
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("txt".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert!("csv".parse::<ExportFormat>().is_err());
    }
}

use chrono::{DateTime, TimeZone};

use crate::ExportFormat;

const FILENAME_PREFIX: &str = "slack_export";

/// `slack_export_YYYYmmdd_HHMMSS.<ext>`, stamped with `now`.
pub fn default_output_filename<Tz>(format: ExportFormat, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{FILENAME_PREFIX}_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

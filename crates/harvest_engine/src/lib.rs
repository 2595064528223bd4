//! Harvest engine: browser-driven search harvesting and incremental export.
mod convert;
mod driver;
mod export;
mod extract;
mod filename;
mod harvest;
mod normalize;
mod orchestrator;
mod paginate;
mod persist;
mod preview;
mod progress;
mod session;
mod settings;
mod types;
mod wait;

pub use convert::{ConvertOptions, Converter, HtmlTextConverter};
pub use driver::{ElementHandle, PageDriver, UrlPattern, WaitState, WAIT_POLL_INTERVAL};
pub use export::{
    format_local_timestamp, ExportError, ExportFormat, ExportSink, ExportSummary, ExportTarget,
    UNKNOWN_CHANNEL,
};
pub use extract::{channel_from_href, parse_timestamp, PageExtractor};
pub use filename::default_output_filename;
pub use harvest::MessageHarvester;
pub use normalize::normalize_text;
pub use orchestrator::{Orchestrator, SearchRequest, SessionReport};
pub use paginate::PaginationController;
pub use persist::{ensure_output_dir, write_atomically, PersistError};
pub use preview::{text_preview, MAX_PREVIEW_CHARS};
pub use progress::{HarvestEvent, NullProgressSink, ProgressSink};
pub use session::{parse_result_count, LoginOutcome, SearchNavigator, WorkspaceLogin};
pub use settings::{
    EngineConfig, ExtractorOptions, HarvestSettings, LoginSettings, SearchSettings, Selectors,
    SortOrder, DEFAULT_IDLE_POLLS_LIMIT, DEFAULT_PER_PAGE_TARGET, DEFAULT_POLL_INTERVAL,
    DEFAULT_SCROLL_DELTA,
};
pub use types::{
    DriverError, DriverErrorKind, Extraction, HarvestError, Message, PageReport, Rejection,
};

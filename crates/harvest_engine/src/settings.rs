use std::time::Duration;

/// Scroll passes without a new timestamp before a page counts as exhausted.
pub const DEFAULT_IDLE_POLLS_LIMIT: u32 = 100;
/// Delay between scroll passes; with the idle limit this gives 10 s of quiet.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Mouse-wheel delta per scroll pass, in pixels.
pub const DEFAULT_SCROLL_DELTA: f64 = 50.0;
/// Soft per-page size, only used to size progress reporting.
pub const DEFAULT_PER_PAGE_TARGET: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub selectors: Selectors,
    pub harvest: HarvestSettings,
    pub login: LoginSettings,
    pub search: SearchSettings,
    pub extractor: ExtractorOptions,
}

/// Every DOM address the engine relies on, for the one page layout it targets.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub search_entry: String,
    pub results_content: String,
    pub message_group: String,
    /// Cheap dedup lookup inside a message group.
    pub group_timestamp: String,
    pub message: String,
    pub timestamp: String,
    pub timestamp_attribute: String,
    pub sender: String,
    pub content_blocks: String,
    pub channel_name: String,
    /// Tried in order; the first match is clicked.
    pub show_more: Vec<String>,
    pub loading_indicator: String,
    /// `{page}` is replaced by the 1-based target page.
    pub page_button: String,
    pub result_count: Vec<String>,
    pub sort_control: String,
    /// `{order}` is replaced by [`SortOrder::key`].
    pub sort_option: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            search_entry: r#"[data-qa="top_nav_search"]"#.to_string(),
            results_content: ".c-search_message__content".to_string(),
            message_group: ".c-message_group--ia4".to_string(),
            group_timestamp: "a.c-timestamp".to_string(),
            message: ".c-message_kit__actions .c-search_message".to_string(),
            timestamp: ".c-search_message__content a.c-timestamp".to_string(),
            timestamp_attribute: "data-ts".to_string(),
            sender: ".c-search_message__content button.c-message__sender_button".to_string(),
            content_blocks: ".c-message__message_blocks .p-rich_text_block".to_string(),
            channel_name: ".c-channel_entity__name".to_string(),
            show_more: vec![
                ".c-search__expand".to_string(),
                "button.c-message__expand_button".to_string(),
                r#"[data-qa="message_content_expand"]"#.to_string(),
            ],
            loading_indicator: r#"[data-qa="search_results_loading"]"#.to_string(),
            page_button: r#"[data-qa="c-pagination_page_btn_{page}"]"#.to_string(),
            result_count: vec![
                r#"[data-qa="search_result_header"] [data-qa="search_result_count"]"#
                    .to_string(),
                r#"[data-qa="search_result_count"]"#.to_string(),
                ".p-search_results__count".to_string(),
            ],
            sort_control: r#"[data-qa="search_sort_button"]"#.to_string(),
            sort_option: r#"[data-qa="search_sort_{order}"]"#.to_string(),
        }
    }
}

impl Selectors {
    pub fn page_button_for(&self, page: u32) -> String {
        self.page_button.replace("{page}", &page.to_string())
    }

    pub fn sort_option_for(&self, order: SortOrder) -> String {
        self.sort_option.replace("{order}", order.key())
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub poll_interval: Duration,
    pub idle_polls_limit: u32,
    pub scroll_delta: f64,
    pub per_page_target: usize,
    /// Wait after clicking a "show more" control.
    pub expand_settle: Duration,
    /// Upper bound for the loading indicator to go away after expanding.
    pub loading_timeout: Duration,
    /// Upper bound for results to reappear after a page change.
    pub results_timeout: Duration,
    pub page_settle: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_polls_limit: DEFAULT_IDLE_POLLS_LIMIT,
            scroll_delta: DEFAULT_SCROLL_DELTA,
            per_page_target: DEFAULT_PER_PAGE_TARGET,
            expand_settle: Duration::from_millis(500),
            loading_timeout: Duration::from_secs(2),
            results_timeout: Duration::from_secs(30),
            page_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// How long to look for an already logged-in workspace.
    pub signed_in_timeout: Duration,
    /// How long the user has to complete an interactive login.
    pub login_timeout: Duration,
    pub workspace_timeout: Duration,
    pub post_login_settle: Duration,
    pub client_url_pattern: String,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            signed_in_timeout: Duration::from_secs(5),
            login_timeout: Duration::from_secs(120),
            workspace_timeout: Duration::from_secs(30),
            post_login_settle: Duration::from_secs(5),
            client_url_pattern: "**/client**".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub entry_timeout: Duration,
    pub focus_settle: Duration,
    pub typing_settle: Duration,
    pub results_timeout: Duration,
    pub count_timeout: Duration,
    pub sort: Option<SortOrder>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            entry_timeout: Duration::from_secs(30),
            focus_settle: Duration::from_secs(2),
            typing_settle: Duration::from_secs(1),
            results_timeout: Duration::from_secs(30),
            count_timeout: Duration::from_secs(5),
            sort: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevance,
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn key(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "score",
            SortOrder::Newest => "timestamp_desc",
            SortOrder::Oldest => "timestamp_asc",
        }
    }
}

/// Extractor behaviour chosen by the caller at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractorOptions {
    /// Report rejections and accepted previews at info level instead of debug.
    pub verbose: bool,
}

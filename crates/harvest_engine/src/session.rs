//! Getting from a fresh browser to a loaded results page: login, query
//! submission and the result count shown above the results.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::settings::{LoginSettings, SearchSettings, Selectors, SortOrder};
use crate::wait::{cancellable, pause};
use crate::{ElementHandle, HarvestError, PageDriver, UrlPattern, WaitState};

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A restored session already showed the workspace.
    AlreadyLoggedIn,
    /// The user logged in interactively; session state was saved.
    LoggedIn,
}

pub struct WorkspaceLogin<'a> {
    selectors: &'a Selectors,
    settings: &'a LoginSettings,
    cancel: &'a CancellationToken,
}

impl<'a> WorkspaceLogin<'a> {
    pub fn new(
        selectors: &'a Selectors,
        settings: &'a LoginSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            selectors,
            settings,
            cancel,
        }
    }

    /// Any failure other than cancellation comes back as `SessionFatal`.
    pub async fn authenticate<D: PageDriver>(
        &self,
        driver: &D,
        workspace_url: &str,
        auth_file: &Path,
    ) -> Result<LoginOutcome, HarvestError> {
        self.run(driver, workspace_url, auth_file)
            .await
            .map_err(HarvestError::into_fatal)
    }

    async fn run<D: PageDriver>(
        &self,
        driver: &D,
        workspace_url: &str,
        auth_file: &Path,
    ) -> Result<LoginOutcome, HarvestError> {
        if auth_file.exists() {
            match cancellable(self.cancel, driver.restore_session_state(auth_file)).await {
                Ok(()) => engine_logging::engine_info!(
                    "Restored session state from {}",
                    auth_file.display()
                ),
                Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
                Err(err) => engine_logging::engine_warn!(
                    "Ignoring unreadable session state {}: {err}",
                    auth_file.display()
                ),
            }
        }

        engine_logging::engine_info!("Opening {workspace_url}");
        cancellable(self.cancel, driver.goto(workspace_url)).await?;

        let signed_in = cancellable(
            self.cancel,
            driver.wait_for_selector(
                &self.selectors.search_entry,
                self.settings.signed_in_timeout,
                WaitState::Attached,
            ),
        )
        .await;
        match signed_in {
            Ok(_) => {
                engine_logging::engine_info!("Already logged in");
                return Ok(LoginOutcome::AlreadyLoggedIn);
            }
            Err(HarvestError::WaitTimeout { .. }) => {}
            Err(err) => return Err(err),
        }

        engine_logging::engine_warn!(
            "Not logged in; complete the login in the browser window within {}s",
            self.settings.login_timeout.as_secs()
        );
        let pattern = UrlPattern::glob(&self.settings.client_url_pattern).map_err(|err| {
            HarvestError::SessionFatal(format!(
                "invalid client url pattern {}: {err}",
                self.settings.client_url_pattern
            ))
        })?;
        cancellable(
            self.cancel,
            driver.wait_for_url(&pattern, self.settings.login_timeout),
        )
        .await?;
        cancellable(
            self.cancel,
            driver.wait_for_selector(
                &self.selectors.search_entry,
                self.settings.workspace_timeout,
                WaitState::Attached,
            ),
        )
        .await?;
        pause(driver, self.cancel, self.settings.post_login_settle).await?;

        match cancellable(self.cancel, driver.persist_session_state(auth_file)).await {
            Ok(()) => engine_logging::engine_info!("Saved session state to {}", auth_file.display()),
            Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
            Err(err) => engine_logging::engine_warn!(
                "Could not save session state to {}: {err}",
                auth_file.display()
            ),
        }
        Ok(LoginOutcome::LoggedIn)
    }
}

pub struct SearchNavigator<'a> {
    selectors: &'a Selectors,
    settings: &'a SearchSettings,
    cancel: &'a CancellationToken,
}

impl<'a> SearchNavigator<'a> {
    pub fn new(
        selectors: &'a Selectors,
        settings: &'a SearchSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            selectors,
            settings,
            cancel,
        }
    }

    /// Types `query` into the search box and waits for the first results.
    pub async fn submit<D: PageDriver>(&self, driver: &D, query: &str) -> Result<(), HarvestError> {
        self.run(driver, query).await.map_err(HarvestError::into_fatal)?;
        if let Some(order) = self.settings.sort {
            match self.apply_sort(driver, order).await {
                Ok(()) => engine_logging::engine_info!("Results sorted by {}", order.key()),
                Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
                Err(err) => engine_logging::engine_warn!("Could not change sort order: {err}"),
            }
        }
        Ok(())
    }

    async fn run<D: PageDriver>(&self, driver: &D, query: &str) -> Result<(), HarvestError> {
        let entry = self
            .wait_attached(driver, &self.selectors.search_entry, self.settings.entry_timeout)
            .await?;
        cancellable(self.cancel, entry.click()).await?;
        pause(driver, self.cancel, self.settings.focus_settle).await?;

        engine_logging::engine_info!("Searching for {query:?}");
        cancellable(self.cancel, driver.type_text(query)).await?;
        pause(driver, self.cancel, self.settings.typing_settle).await?;
        cancellable(self.cancel, driver.press_key("Enter")).await?;

        self.wait_attached(driver, &self.selectors.results_content, self.settings.results_timeout)
            .await?;
        Ok(())
    }

    async fn apply_sort<D: PageDriver>(&self, driver: &D, order: SortOrder) -> Result<(), HarvestError> {
        let control = self
            .wait_attached(driver, &self.selectors.sort_control, self.settings.entry_timeout)
            .await?;
        cancellable(self.cancel, control.click()).await?;
        let option = self
            .wait_attached(
                driver,
                &self.selectors.sort_option_for(order),
                self.settings.entry_timeout,
            )
            .await?;
        cancellable(self.cancel, option.click()).await?;
        self.wait_attached(driver, &self.selectors.results_content, self.settings.results_timeout)
            .await?;
        Ok(())
    }

    /// Result count shown above the results, if any of the known counters
    /// can be read. Only cancellation is an error.
    pub async fn read_total_results<D: PageDriver>(
        &self,
        driver: &D,
    ) -> Result<Option<u64>, HarvestError> {
        for selector in &self.selectors.result_count {
            let found = cancellable(
                self.cancel,
                driver.wait_for_selector(selector, self.settings.count_timeout, WaitState::Attached),
            )
            .await;
            let element = match found {
                Ok(Some(element)) => element,
                Ok(None) => continue,
                Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
                Err(err) => {
                    engine_logging::engine_debug!("Result count not at {selector}: {err}");
                    continue;
                }
            };
            let text = match cancellable(self.cancel, element.text_content()).await {
                Ok(text) => text.unwrap_or_default(),
                Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
                Err(_) => continue,
            };
            if let Some(total) = parse_result_count(&text) {
                return Ok(Some(total));
            }
        }
        Ok(None)
    }

    async fn wait_attached<D: PageDriver>(
        &self,
        driver: &D,
        selector: &str,
        timeout: std::time::Duration,
    ) -> Result<D::Element, HarvestError> {
        cancellable(
            self.cancel,
            driver.wait_for_selector(selector, timeout, WaitState::Attached),
        )
        .await?
        .ok_or_else(|| HarvestError::SelectorNotFound {
            selector: selector.to_string(),
        })
    }
}

/// First integer in a counter label such as `1,234 results`.
pub fn parse_result_count(text: &str) -> Option<u64> {
    let digits = FIRST_NUMBER.find(text)?.as_str().replace(',', "");
    digits.parse().ok()
}

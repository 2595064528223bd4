use harvest_core::PageNumber;
use tokio_util::sync::CancellationToken;

use crate::settings::{HarvestSettings, Selectors};
use crate::wait::{cancellable, pause};
use crate::{ElementHandle, HarvestError, PageDriver, WaitState};

/// Numbered-page navigation through the search results.
pub struct PaginationController {
    selectors: Selectors,
    settings: HarvestSettings,
    cancel: CancellationToken,
}

impl PaginationController {
    pub fn new(selectors: Selectors, settings: HarvestSettings, cancel: CancellationToken) -> Self {
        Self {
            selectors,
            settings,
            cancel,
        }
    }

    /// Moves from `current` to `current + 1`. `Ok(false)` means there is no
    /// further page: the button is missing or disabled, or results never
    /// came back after clicking it.
    pub async fn advance<D: PageDriver>(
        &self,
        driver: &D,
        current: PageNumber,
    ) -> Result<bool, HarvestError> {
        let next = current + 1;
        let selector = self.selectors.page_button_for(next);
        let Some(button) = cancellable(&self.cancel, driver.query_selector(&selector)).await? else {
            engine_logging::engine_info!("No button for page {next}; last page reached");
            return Ok(false);
        };
        if is_disabled(&button, &self.cancel).await? {
            engine_logging::engine_info!("Button for page {next} is disabled; last page reached");
            return Ok(false);
        }

        engine_logging::engine_info!("Moving to page {next}");
        cancellable(&self.cancel, button.click()).await?;
        let reloaded = cancellable(
            &self.cancel,
            driver.wait_for_selector(
                &self.selectors.results_content,
                self.settings.results_timeout,
                WaitState::Attached,
            ),
        )
        .await;
        match reloaded {
            Ok(_) => {}
            Err(HarvestError::WaitTimeout { what }) => {
                engine_logging::engine_warn!("Page {next} did not load: {what}");
                return Ok(false);
            }
            Err(err) => return Err(err),
        }
        pause(driver, &self.cancel, self.settings.page_settle).await?;
        Ok(true)
    }
}

async fn is_disabled<E: ElementHandle>(
    button: &E,
    cancel: &CancellationToken,
) -> Result<bool, HarvestError> {
    if cancellable(cancel, button.attribute("disabled")).await?.is_some() {
        return Ok(true);
    }
    let aria = cancellable(cancel, button.attribute("aria-disabled")).await?;
    Ok(aria.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
}

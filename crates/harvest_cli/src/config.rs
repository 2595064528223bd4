//! Optional RON settings file with timing overrides.
//!
//! Every field is optional; anything left out keeps the engine default.
//!
//! ```ron
//! (
//!     idle_polls_limit: Some(50),
//!     poll_interval_ms: Some(200),
//!     login_timeout_secs: Some(300),
//! )
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use engine_logging::engine_info;
use harvest_engine::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub idle_polls_limit: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub scroll_delta: Option<f64>,
    pub per_page_target: Option<usize>,
    pub expand_settle_ms: Option<u64>,
    pub loading_timeout_ms: Option<u64>,
    pub results_timeout_ms: Option<u64>,
    pub page_settle_ms: Option<u64>,
    pub login_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ConfigFile = ron::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        engine_info!("Loaded settings overrides from {:?}", path);
        Ok(config)
    }

    pub fn apply(&self, config: &mut EngineConfig) {
        let harvest = &mut config.harvest;
        if let Some(limit) = self.idle_polls_limit {
            harvest.idle_polls_limit = limit;
        }
        if let Some(ms) = self.poll_interval_ms {
            harvest.poll_interval = Duration::from_millis(ms);
        }
        if let Some(delta) = self.scroll_delta {
            harvest.scroll_delta = delta;
        }
        if let Some(target) = self.per_page_target {
            harvest.per_page_target = target;
        }
        if let Some(ms) = self.expand_settle_ms {
            harvest.expand_settle = Duration::from_millis(ms);
        }
        if let Some(ms) = self.loading_timeout_ms {
            harvest.loading_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.results_timeout_ms {
            harvest.results_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.page_settle_ms {
            harvest.page_settle = Duration::from_millis(ms);
        }
        if let Some(secs) = self.login_timeout_secs {
            config.login.login_timeout = Duration::from_secs(secs);
        }
    }
}

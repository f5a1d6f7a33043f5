use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::contract::InvoiceKind;
use crate::download::RetryPolicy;

/// Everything the job needs, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub sales: EndpointConfig,
    pub purchase: EndpointConfig,
    pub output_dir_base: PathBuf,
    pub max_archive_folders: usize,
    pub schedule: ScheduleConfig,
    pub retry: RetryPolicy,
    /// Rate-limit pause after every status lookup.
    pub status_pause: Duration,
    pub log_file: PathBuf,
}

impl Config {
    pub fn endpoint(&self, kind: InvoiceKind) -> &EndpointConfig {
        match kind {
            InvoiceKind::Sales => &self.sales,
            InvoiceKind::Purchase => &self.purchase,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            api_key_len = self.api.api_key.len(),
            sales_url = %self.sales.base_url,
            purchase_url = %self.purchase.base_url,
            output_dir = %self.output_dir_base.display(),
            max_archive_folders = self.max_archive_folders,
            interval_secs = self.schedule.interval.as_secs(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Authentication and transport settings for the provider.
#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    /// Per-request timeout. `None` leaves reqwest's default in place.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One invoice kind's base endpoint and listing filter.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Status filter for the id listing; `None` lists every status.
    pub status_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub lookback_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(6 * 60 * 60),
            lookback_days: 30,
        }
    }
}

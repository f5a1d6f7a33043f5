use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::{ApiConfig, Config, EndpointConfig, ScheduleConfig};
use crate::download::RetryPolicy;

pub const DEFAULT_OUTPUT_DIR_BASE: &str = "eFakture";
pub const DEFAULT_MAX_ARCHIVE_FOLDERS: usize = 5;
pub const DEFAULT_LOG_FILE: &str = "eFakture.log";

/// Loads the configuration from the process environment.
///
/// `main` loads `.env` beforehand, so values from that file are visible here.
pub fn load_config() -> Result<Config> {
    info!("Loading configuration from environment");
    load_config_from(|key| std::env::var(key).ok())
}

/// Resolves `LOG_FILE` on its own, so logging can be installed before the
/// rest of the configuration is validated.
pub fn log_file() -> PathBuf {
    log_file_from(|key| std::env::var(key).ok())
}

pub fn log_file_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_FILE")
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Loads the configuration from an arbitrary key lookup.
pub fn load_config_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = required(&lookup, "API_KEY")?;
    let sales_url = required(&lookup, "BASE_URL_SALES")?;
    let purchase_url = required(&lookup, "BASE_URL_PURCHASE")?;

    let output_dir_base = lookup("OUTPUT_DIR_BASE")
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR_BASE));

    let max_archive_folders =
        parsed(&lookup, "MAX_ARCHIVE_FOLDERS")?.unwrap_or(DEFAULT_MAX_ARCHIVE_FOLDERS);

    let defaults = ScheduleConfig::default();
    let schedule = ScheduleConfig {
        interval: parsed(&lookup, "SYNC_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval),
        lookback_days: parsed(&lookup, "LOOKBACK_DAYS")?.unwrap_or(defaults.lookback_days),
    };

    let default_retry = RetryPolicy::default();
    let max_attempts: u32 =
        parsed(&lookup, "FETCH_MAX_ATTEMPTS")?.unwrap_or(default_retry.max_attempts);
    if max_attempts == 0 {
        error!("FETCH_MAX_ATTEMPTS must be at least 1");
        anyhow::bail!("FETCH_MAX_ATTEMPTS must be at least 1");
    }
    let retry = RetryPolicy {
        max_attempts,
        delay: parsed(&lookup, "FETCH_RETRY_DELAY_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(default_retry.delay),
    };

    let status_pause = parsed(&lookup, "STATUS_PAUSE_SECS")?
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1));

    let timeout = parsed(&lookup, "HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

    let log_file = log_file_from(&lookup);

    let config = Config {
        api: ApiConfig { api_key, timeout },
        sales: EndpointConfig {
            base_url: sales_url.trim_end_matches('/').to_string(),
            status_filter: optional(&lookup, "SALES_STATUS"),
        },
        purchase: EndpointConfig {
            base_url: purchase_url.trim_end_matches('/').to_string(),
            status_filter: optional(&lookup, "PURCHASE_STATUS"),
        },
        output_dir_base,
        max_archive_folders,
        schedule,
        retry,
        status_pause,
        log_file,
    };

    info!(
        output_dir = %config.output_dir_base.display(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => {
            info!(key, "Required setting found");
            Ok(value)
        }
        None => {
            error!(key, "Required setting missing");
            Err(anyhow::anyhow!("{key} environment variable not set"))
        }
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(lookup, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| {
                error!(key, value = %raw, error = %e, "Setting is not a valid number");
                e
            })
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
    }
}

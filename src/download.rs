use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::contract::{ApiRequest, InvoiceApi, Pause};
use crate::error::SyncError;

/// Bounded polling for resources the provider answers with 202.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between a 202 answer and the next attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// What happened to a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written to the destination.
    Saved { bytes: usize },
    /// Still 202 after every attempt.
    NotReady { attempts: u32 },
    /// Answered with a status other than 200/202.
    Rejected { status: u16 },
    /// The request never produced a response.
    Unreachable,
}

impl FetchOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved { .. })
    }
}

/// Fetches `request` and writes the body verbatim to `dest`.
///
/// Nothing is written unless the provider answers 200. Failing to write the
/// file is the only error; every HTTP-level problem is reported through the
/// returned [`FetchOutcome`].
pub async fn download_file<A, P>(
    api: &A,
    pause: &P,
    policy: &RetryPolicy,
    request: ApiRequest,
    dest: &Path,
) -> Result<FetchOutcome, SyncError>
where
    A: InvoiceApi + ?Sized,
    P: Pause + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        let response = match api.get(request.clone()).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(url = %request.url, error = %e, "[FETCH][ERROR] Request failed");
                return Ok(FetchOutcome::Unreachable);
            }
        };

        if response.is_ready() {
            fs::write(dest, &response.body).map_err(SyncError::io("write", dest))?;
            info!(path = %dest.display(), bytes = response.body.len(), "[FETCH] Saved file");
            return Ok(FetchOutcome::Saved {
                bytes: response.body.len(),
            });
        }

        if !response.is_pending() {
            error!(
                url = %request.url,
                status = response.status,
                body = %response.text(),
                "[FETCH][ERROR] Provider rejected request"
            );
            return Ok(FetchOutcome::Rejected {
                status: response.status,
            });
        }

        if attempt < policy.max_attempts {
            info!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_secs = policy.delay.as_secs(),
                "[FETCH] File not ready, waiting"
            );
            pause.pause(policy.delay).await;
        }
    }

    warn!(
        path = %dest.display(),
        attempts = policy.max_attempts,
        "[FETCH][ERROR] File still not ready after all attempts"
    );
    Ok(FetchOutcome::NotReady {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ApiResponse, MockInvoiceApi, MockPause};
    use tempfile::tempdir;

    #[tokio::test]
    async fn rejected_status_is_not_retried() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("x.pdf");

        let mut api = MockInvoiceApi::new();
        api.expect_get()
            .times(1)
            .returning(|_| Ok(ApiResponse::new(404, "no such invoice")));
        let mut pause = MockPause::new();
        pause.expect_pause().never();

        let outcome = download_file(
            &api,
            &pause,
            &RetryPolicy::default(),
            ApiRequest::new("http://api/pdf"),
            &dest,
        )
        .await
        .unwrap();

        assert_eq!(outcome, FetchOutcome::Rejected { status: 404 });
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn transport_error_reports_unreachable() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("x.xml");

        let mut api = MockInvoiceApi::new();
        api.expect_get()
            .times(1)
            .returning(|_| Err("connection refused".into()));
        let pause = MockPause::new();

        let outcome = download_file(
            &api,
            &pause,
            &RetryPolicy::default(),
            ApiRequest::new("http://api/xml"),
            &dest,
        )
        .await
        .unwrap();

        assert_eq!(outcome, FetchOutcome::Unreachable);
        assert!(!outcome.is_saved());
    }

    #[tokio::test]
    async fn write_failure_is_an_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("x.xml");

        let mut api = MockInvoiceApi::new();
        api.expect_get()
            .returning(|_| Ok(ApiResponse::new(200, "<x/>")));
        let pause = MockPause::new();

        let result = download_file(
            &api,
            &pause,
            &RetryPolicy::default(),
            ApiRequest::new("http://api/xml"),
            &dest,
        )
        .await;

        assert!(matches!(result, Err(SyncError::Io { action: "write", .. })));
    }
}

//! # contract: seams between the pipeline and the outside world
//!
//! The pipeline never talks to `reqwest` or the tokio timer directly. It goes
//! through two small traits so the whole download-and-reconcile flow can run
//! against mocks in tests:
//!
//! - [`InvoiceApi`]: issues a request against the invoicing provider and hands
//!   back the raw status code and body. HTTP statuses are data, not errors;
//!   only transport failures come back as [`ApiError`].
//! - [`Pause`]: waits for a duration. Used for the 202 polling delay, the
//!   rate-limit pause after status lookups and the interval between cycles.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; `MockInvoiceApi` and `MockPause`
//!   are exported under the default `test-export-mocks` feature so the
//!   integration tests in `tests/` can use them.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

/// Transport-level failure (connection refused, DNS, timeout, body read).
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// The two invoice categories, each with its own endpoint and output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceKind {
    /// Outgoing invoices.
    Sales,
    /// Incoming invoices.
    Purchase,
}

impl InvoiceKind {
    pub const ALL: [InvoiceKind; 2] = [InvoiceKind::Sales, InvoiceKind::Purchase];

    pub fn label(self) -> &'static str {
        match self {
            InvoiceKind::Sales => "sales",
            InvoiceKind::Purchase => "purchase",
        }
    }

    /// Name of the live output directory below the output base.
    pub fn output_dir_name(self) -> &'static str {
        match self {
            InvoiceKind::Sales => "Izlazne fakture",
            InvoiceKind::Purchase => "Ulazne fakture",
        }
    }
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque invoice identifier as returned by the provider.
///
/// The provider may send ids as JSON strings or numbers; both are kept in
/// their textual form since they are only ever echoed back in query strings
/// and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RawInvoiceId")]
pub struct InvoiceId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInvoiceId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawInvoiceId> for InvoiceId {
    fn from(raw: RawInvoiceId) -> Self {
        match raw {
            RawInvoiceId::Text(s) => InvoiceId(s),
            RawInvoiceId::Number(n) => InvoiceId(n.to_string()),
        }
    }
}

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        InvoiceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request against the provider: absolute URL plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Looks up the first query parameter with the given key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status code and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200: the resource is ready.
    pub fn is_ready(&self) -> bool {
        self.status == 200
    }

    /// 202: accepted, but the provider is still rendering the resource.
    pub fn is_pending(&self) -> bool {
        self.status == 202
    }

    /// Body decoded lossily, for log messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport to the invoicing provider.
///
/// The implementor is responsible for authentication headers and for turning
/// the response into an [`ApiResponse`]; every status code is returned as-is.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait InvoiceApi: Send + Sync {
    /// Issue a POST with an empty body.
    async fn post(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Issue a GET.
    async fn get(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Clock seam for every wait in the pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real [`Pause`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

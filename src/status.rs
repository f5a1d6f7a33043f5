use std::time::Duration;

use serde::Deserialize;
use tracing::{error, warn};

use crate::contract::{ApiRequest, InvoiceApi, InvoiceId, Pause};
use crate::invoice_number::sanitize_filename;

/// Status used when the provider cannot tell us one.
pub const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Deserialize)]
struct StatusBody {
    #[serde(rename = "Status")]
    status: Option<String>,
}

/// Looks up an invoice's status and returns it sanitized for use in file names.
///
/// Falls back to [`UNKNOWN_STATUS`] on any failure. Pauses for
/// `rate_limit_pause` afterwards in every case.
pub async fn fetch_invoice_status<A, P>(
    api: &A,
    pause: &P,
    rate_limit_pause: Duration,
    base_url: &str,
    invoice_id: &InvoiceId,
) -> String
where
    A: InvoiceApi + ?Sized,
    P: Pause + ?Sized,
{
    let request = ApiRequest::new(base_url).with_param("invoiceId", invoice_id.as_str());
    let status = lookup(api, request, invoice_id).await;
    pause.pause(rate_limit_pause).await;
    status.unwrap_or_else(|| UNKNOWN_STATUS.to_string())
}

async fn lookup<A>(api: &A, request: ApiRequest, invoice_id: &InvoiceId) -> Option<String>
where
    A: InvoiceApi + ?Sized,
{
    let response = match api.get(request).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(invoice_id = %invoice_id, error = %e, "[STATUS][ERROR] Status request failed");
            return None;
        }
    };
    if !response.is_ready() {
        error!(
            invoice_id = %invoice_id,
            status = response.status,
            "[STATUS][ERROR] Status lookup rejected"
        );
        return None;
    }
    match serde_json::from_slice::<StatusBody>(&response.body) {
        Ok(StatusBody { status: Some(raw) }) => {
            let sanitized = sanitize_filename(&raw);
            if sanitized.is_empty() {
                warn!(invoice_id = %invoice_id, raw = %raw, "[STATUS] Status has no usable characters");
                None
            } else {
                Some(sanitized)
            }
        }
        Ok(StatusBody { status: None }) => {
            warn!(invoice_id = %invoice_id, "[STATUS] Response has no Status field");
            None
        }
        Err(e) => {
            warn!(invoice_id = %invoice_id, error = %e, "[STATUS] Status body is not valid JSON");
            None
        }
    }
}

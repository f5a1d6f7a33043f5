//! Invoice id discovery.
//!
//! The `/ids` endpoint answers in one of three shapes depending on the
//! invoice kind and API version. The body is validated once, at the boundary,
//! into [`IdListing`]; anything else lands in [`IdListing::Unrecognized`].

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::contract::{ApiRequest, InvoiceApi, InvoiceId};

/// Timestamp format the provider expects for `dateFrom`/`dateTo`.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Known response shapes of the id listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdListing {
    Sales {
        #[serde(rename = "SalesInvoiceIds")]
        ids: Vec<InvoiceId>,
    },
    Purchase {
        #[serde(rename = "PurchaseInvoiceIds")]
        ids: Vec<InvoiceId>,
    },
    Bare(Vec<InvoiceId>),
    Unrecognized(serde_json::Value),
}

impl IdListing {
    pub fn parse(body: &[u8]) -> Result<IdListing, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The listed ids, or `None` for an unrecognized shape.
    pub fn into_ids(self) -> Option<Vec<InvoiceId>> {
        match self {
            IdListing::Sales { ids } | IdListing::Purchase { ids } | IdListing::Bare(ids) => {
                Some(ids)
            }
            IdListing::Unrecognized(_) => None,
        }
    }
}

/// Filters for a listing call. Empty filters are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<String>,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
}

impl ListQuery {
    pub fn to_request(&self, base_url: &str) -> ApiRequest {
        let mut request = ApiRequest::new(format!("{base_url}/ids"));
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            request = request.with_param("status", status);
        }
        if let Some(from) = self.date_from {
            request = request.with_param("dateFrom", from.format(DATE_FORMAT).to_string());
        }
        if let Some(to) = self.date_to {
            request = request.with_param("dateTo", to.format(DATE_FORMAT).to_string());
        }
        request
    }
}

/// Lists invoice ids for one endpoint.
///
/// Never fails: a rejected request, a transport error or an unknown body shape
/// are logged and read as "no invoices this cycle".
pub async fn list_invoice_ids<A>(api: &A, base_url: &str, query: &ListQuery) -> Vec<InvoiceId>
where
    A: InvoiceApi + ?Sized,
{
    let request = query.to_request(base_url);
    info!(url = %request.url, params = ?request.query, "[LIST] Fetching invoice ids");

    let response = match api.post(request.clone()).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(url = %request.url, error = %e, "[LIST][ERROR] Id listing request failed");
            return Vec::new();
        }
    };

    if !response.is_ready() {
        error!(
            url = %request.url,
            status = response.status,
            body = %response.text(),
            "[LIST][ERROR] Id listing rejected"
        );
        return Vec::new();
    }

    match IdListing::parse(&response.body) {
        Ok(listing) => match listing.into_ids() {
            Some(ids) => ids,
            None => {
                warn!(body = %response.text(), "[LIST] Unrecognized id listing shape");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(error = %e, body = %response.text(), "[LIST] Id listing is not valid JSON");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ids(raw: &[&str]) -> Vec<InvoiceId> {
        raw.iter().map(|s| InvoiceId::new(*s)).collect()
    }

    #[test]
    fn parses_sales_shape() {
        let listing = IdListing::parse(br#"{"SalesInvoiceIds": [3, 1, 2]}"#).unwrap();
        assert_eq!(listing.into_ids(), Some(ids(&["3", "1", "2"])));
    }

    #[test]
    fn parses_purchase_shape_with_extra_fields() {
        let listing =
            IdListing::parse(br#"{"PurchaseInvoiceIds": ["a", "b"], "Total": 2}"#).unwrap();
        assert!(matches!(listing, IdListing::Purchase { .. }));
        assert_eq!(listing.into_ids(), Some(ids(&["a", "b"])));
    }

    #[test]
    fn parses_bare_array() {
        let listing = IdListing::parse(b"[10, 20]").unwrap();
        assert_eq!(listing.into_ids(), Some(ids(&["10", "20"])));
    }

    #[test]
    fn sales_field_wins_when_both_present() {
        let listing =
            IdListing::parse(br#"{"PurchaseInvoiceIds": [2], "SalesInvoiceIds": [1]}"#).unwrap();
        assert_eq!(listing.into_ids(), Some(ids(&["1"])));
    }

    #[test]
    fn other_shapes_are_unrecognized() {
        let bodies: [&[u8]; 3] = [br#"{"Ids": [1]}"#, b"42", br#"{"SalesInvoiceIds": "oops"}"#];
        for body in bodies {
            let listing = IdListing::parse(body).unwrap();
            assert!(matches!(listing, IdListing::Unrecognized(_)), "{listing:?}");
            assert_eq!(listing.into_ids(), None);
        }
    }

    #[test]
    fn query_skips_empty_filters() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let query = ListQuery {
            status: Some(String::new()),
            date_from: Some(from),
            date_to: None,
        };
        let request = query.to_request("https://api/sales");
        assert_eq!(request.url, "https://api/sales/ids");
        assert_eq!(request.param("status"), None);
        assert_eq!(request.param("dateFrom"), Some("2024-01-01T23:59:59"));
        assert_eq!(request.param("dateTo"), None);
    }
}

use chrono::NaiveDate;
use efakture_sync::contract::{ApiResponse, InvoiceId, MockInvoiceApi};
use efakture_sync::listing::{list_invoice_ids, ListQuery};

fn api_posting(status: u16, body: &'static str) -> MockInvoiceApi {
    let mut api = MockInvoiceApi::new();
    api.expect_post()
        .withf(|req| req.url == "https://api.example/sales/ids")
        .times(1)
        .returning(move |_| Ok(ApiResponse::new(status, body)));
    api
}

fn as_strings(ids: Vec<InvoiceId>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn each_known_shape_yields_its_ids_in_order() {
    let cases = [
        (r#"{"SalesInvoiceIds": [9, 3, 7]}"#, vec!["9", "3", "7"]),
        (r#"{"PurchaseInvoiceIds": ["p-2", "p-1"]}"#, vec!["p-2", "p-1"]),
        ("[101, 100]", vec!["101", "100"]),
        ("[]", vec![]),
    ];
    for (body, expected) in cases {
        let api = api_posting(200, body);
        let ids = list_invoice_ids(&api, "https://api.example/sales", &ListQuery::default()).await;
        assert_eq!(as_strings(ids), expected, "body: {body}");
    }
}

#[tokio::test]
async fn unknown_shape_or_garbage_is_empty() {
    for body in [r#"{"Invoices": [1]}"#, "not json at all", "null"] {
        let api = api_posting(200, body);
        let ids = list_invoice_ids(&api, "https://api.example/sales", &ListQuery::default()).await;
        assert!(ids.is_empty(), "body: {body}");
    }
}

#[tokio::test]
async fn rejected_listing_is_empty() {
    let api = api_posting(401, r#"{"SalesInvoiceIds": [1]}"#);
    let ids = list_invoice_ids(&api, "https://api.example/sales", &ListQuery::default()).await;
    assert!(ids.is_empty());
}

#[tokio::test]
async fn transport_failure_is_empty() {
    let mut api = MockInvoiceApi::new();
    api.expect_post()
        .times(1)
        .returning(|_| Err("dns failure".into()));
    let ids = list_invoice_ids(&api, "https://api.example/sales", &ListQuery::default()).await;
    assert!(ids.is_empty());
}

#[tokio::test]
async fn window_and_status_are_sent_as_query_parameters() {
    let from = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();
    let to = NaiveDate::from_ymd_opt(2024, 5, 31)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();

    let mut api = MockInvoiceApi::new();
    api.expect_post()
        .withf(|req| {
            req.url == "https://api.example/sales/ids"
                && req.param("status") == Some("Approved")
                && req.param("dateFrom") == Some("2024-05-01T23:59:59")
                && req.param("dateTo") == Some("2024-05-31T23:59:59")
        })
        .times(1)
        .returning(|_| Ok(ApiResponse::new(200, "[1]")));

    let query = ListQuery {
        status: Some("Approved".into()),
        date_from: Some(from),
        date_to: Some(to),
    };
    let ids = list_invoice_ids(&api, "https://api.example/sales", &query).await;
    assert_eq!(as_strings(ids), vec!["1"]);
}

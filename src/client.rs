use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use crate::config::ApiConfig;
use crate::contract::{ApiError, ApiRequest, ApiResponse, InvoiceApi};

/// Header carrying the provider API key (`ApiKey`; header names are case-insensitive).
pub const API_KEY_HEADER: &str = "apikey";

/// [`InvoiceApi`] over HTTP, authenticated with a static API key header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().default_headers(default_headers(&config.api_key)?);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

pub fn default_headers(api_key: &str) -> anyhow::Result<HeaderMap> {
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|e| anyhow::anyhow!("API_KEY is not a valid header value: {e}"))?;
    key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Ok(headers)
}

async fn into_response(resp: reqwest::Response) -> Result<ApiResponse, ApiError> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?.to_vec();
    debug!(status, bytes = body.len(), "Received API response");
    Ok(ApiResponse { status, body })
}

#[async_trait]
impl InvoiceApi for ApiClient {
    async fn post(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(url = %request.url, "POST");
        let resp = self
            .http
            .post(&request.url)
            .query(&request.query)
            .send()
            .await?;
        into_response(resp).await
    }

    async fn get(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(url = %request.url, "GET");
        let resp = self
            .http
            .get(&request.url)
            .query(&request.query)
            .send()
            .await?;
        into_response(resp).await
    }
}

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Method, redirect};
use tracing::debug;

use crate::args::HttpMethod;
use crate::error::HttpError;
use crate::template::MaterializedRequest;

use super::{Transport, TransportErrorKind, TransportFailure, TransportResponse};

const USER_AGENT: &str = concat!("surge-loadtest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy)]
pub struct HttpClientSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub disable_keepalive: bool,
    pub insecure: bool,
}

/// Reqwest-backed transport. The client owns the connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend or client cannot be initialized.
    pub fn new(settings: &HttpClientSettings) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .http1_only();

        if settings.disable_keepalive {
            builder = builder
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Some(Duration::from_secs(0)));
        }

        if settings.insecure {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = builder
            .build()
            .map_err(|err| HttpError::BuildClientFailed { source: err })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: MaterializedRequest,
    ) -> Result<TransportResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }
        let built = builder.build().map_err(|err| failure(&err))?;

        let response = self.client.execute(built).await.map_err(|err| {
            debug!("Request failed: {}", err);
            failure(&err)
        })?;
        let status = response.status().as_u16();
        let body_bytes = drain_response_body(response).await.map_err(|err| {
            debug!("Failed to read response body: {}", err);
            failure(&err)
        })?;

        Ok(TransportResponse { status, body_bytes })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn failure(err: &reqwest::Error) -> TransportFailure {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Request
    };
    TransportFailure::new(kind, err.to_string())
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}

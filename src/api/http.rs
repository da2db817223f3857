use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;

use super::{ApiRequest, ApiResponse, Transport, TransportError};

/// reqwest-backed transport rooted at the server's base url
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// No timeout unless one is given; a request can stay pending forever.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder =
            Client::builder().user_agent(concat!("userdesk/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        let client = self.client.clone();
        let url = self.url_for(&request.path);

        async move {
            let url = url?;
            tracing::debug!("{} {}", request.method, url);

            let mut builder = client.request(request.method, url);
            if let Some(authorization) = request.authorization {
                builder = builder.header(AUTHORIZATION, authorization);
            }
            if let Some(body) = request.body {
                builder = builder.json(&body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok(ApiResponse::new(status, body))
        }
    }
}

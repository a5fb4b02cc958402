// Backend HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction and response
// decoding. Every endpoint is served as JSON at `{base}/api/{endpoint}`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Maximum number of body bytes echoed into error messages.
const BODY_PREVIEW_LEN: usize = 200;

/// HTTP client for fetching endpoint values.
///
/// Cheaply cloneable; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root, e.g. `http://127.0.0.1:8082`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the full URL of an endpoint: `{base}/api/{endpoint}`.
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{endpoint}"))?)
    }

    /// Fetch the current value of an endpoint.
    pub async fn fetch(&self, endpoint: &Endpoint) -> Result<Value, Error> {
        self.fetch_as(endpoint).await
    }

    /// Fetch an endpoint and decode it into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, Error> {
        let url = self.endpoint_url(endpoint)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

fn preview(body: &str) -> &str {
    if body.len() <= BODY_PREVIEW_LEN {
        return body;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

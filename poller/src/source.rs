//! Where the remote version descriptor comes from.

use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap, HeaderValue, PRAGMA};
use url::Url;

use crate::CheckError;

/// Fetches the raw descriptor body.
///
/// The returned future must be `'static` so the poller can run it on its own
/// task and abort it.
pub trait VersionSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, Result<Vec<u8>, CheckError>>;
}

/// `GET <endpoint>?t=<epoch-millis>` with caching disabled end to end.
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpVersionSource {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(no_cache_headers())
            .build()
            .map_err(|e| CheckError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl VersionSource for HttpVersionSource {
    fn fetch(&self) -> BoxFuture<'static, Result<Vec<u8>, CheckError>> {
        let client = self.client.clone();
        let url = cache_busted(&self.endpoint);
        let timeout = self.timeout;

        Box::pin(async move {
            tracing::debug!(url = %url, "Fetching version descriptor");
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| request_error(e, timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CheckError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| request_error(e, timeout))?;
            Ok(body.to_vec())
        })
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}

fn cache_busted(endpoint: &Url) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("t", &Utc::now().timestamp_millis().to_string());
    url
}

fn request_error(err: reqwest::Error, timeout: Duration) -> CheckError {
    if err.is_timeout() {
        CheckError::Timeout(timeout)
    } else {
        CheckError::from(err)
    }
}

//! The HTTP round trip to the Sixpack server.
use std::time::Duration;

use url::Url;

use crate::Result;

/// Status code and fully read body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        RawResponse {
            status: 200,
            body: body.into(),
        }
    }
}

/// Performs HTTP GET requests for the [`Client`](crate::Client).
///
/// The default implementation is [`HttpTransport`]. A custom transport can be set with
/// [`ClientConfig::transport()`](crate::ClientConfig::transport); closures taking a `&Url` work
/// too:
///
/// ```
/// # use sixpack::{ClientConfig, RawResponse};
/// let client = ClientConfig::from_base_url("https://sixpack.test")
///     .transport(|_url: &sixpack::Url| {
///         Ok::<_, sixpack::Error>(RawResponse::ok(r#"{"status": "ok"}"#))
///     })
///     .to_client()?;
/// # Ok::<(), sixpack::Error>(())
/// ```
pub trait Transport {
    /// Send a GET request to `url`, returning the response once the body has been read.
    ///
    /// Errors should be reported as [`Error::Network`](crate::Error::Network).
    fn get(&self, url: &Url) -> Result<RawResponse>;
}

impl<T: Fn(&Url) -> Result<RawResponse>> Transport for T {
    fn get(&self, url: &Url) -> Result<RawResponse> {
        self(url)
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport that gives up connecting after `connect_timeout` and abandons the whole
    /// request after `timeout`.
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("sixpack-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<RawResponse> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status().as_u16();
        // Reading the body to the end releases the connection back to the pool.
        let body = response.bytes()?.to_vec();
        Ok(RawResponse { status, body })
    }
}

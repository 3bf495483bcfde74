use std::time::Duration;

use rand::{rngs::OsRng, RngCore};

use crate::{
    identity::ClientIdGenerator, transport::HttpTransport, Client, ClientIdFormat, Result,
    Transport,
};

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use sixpack::{ClientConfig, ClientIdFormat};
/// let client = ClientConfig::from_base_url("http://localhost:5000")
///     .timeout(Duration::from_millis(500))
///     .client_id_format(ClientIdFormat::Letters)
///     .to_client()?;
/// # Ok::<(), sixpack::Error>(())
/// ```
pub struct ClientConfig<'a> {
    pub(crate) base_url: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) timeout: Duration,
    pub(crate) client_id_format: ClientIdFormat,
    pub(crate) rng: Box<dyn RngCore + Send>,
    pub(crate) transport: Option<Box<dyn Transport + Send + Sync + 'a>>,
}

impl<'a> ClientConfig<'a> {
    /// Default base URL for API calls: a Sixpack server running locally.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:5000";

    /// Default bound on establishing a connection to the server.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

    /// Default bound on the whole request, including reading the response.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Create a default configuration for the server at `base_url`.
    ///
    /// ```
    /// # use sixpack::ClientConfig;
    /// ClientConfig::from_base_url("https://sixpack.example.com");
    /// ```
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            timeout: Self::DEFAULT_TIMEOUT,
            client_id_format: ClientIdFormat::default(),
            rng: Box::new(OsRng),
            transport: None,
        }
    }

    /// Override the connection timeout. Requests to an unreachable server fail after this long.
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Override the total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Select the shape of generated client ids.
    pub fn client_id_format(mut self, client_id_format: ClientIdFormat) -> Self {
        self.client_id_format = client_id_format;
        self
    }

    /// Set the random source used to generate client ids. Defaults to the operating system's
    /// secure generator.
    ///
    /// ```
    /// # use rand::{rngs::StdRng, SeedableRng};
    /// # use sixpack::ClientConfig;
    /// let config = ClientConfig::from_base_url("http://localhost:5000")
    ///     .rng(StdRng::seed_from_u64(42));
    /// ```
    pub fn rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the HTTP transport. Timeouts configured on this builder only apply to the default
    /// [`HttpTransport`].
    pub fn transport(mut self, transport: impl Transport + Send + Sync + 'a) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`](crate::Error::InvalidBaseUrl) if the base URL cannot be parsed.
    /// - [`Error::Network`](crate::Error::Network) if the HTTP client cannot be initialized.
    pub fn to_client(self) -> Result<Client<'a>> {
        let transport: Box<dyn Transport + Send + Sync + 'a> = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(self.connect_timeout, self.timeout)?),
        };
        let generator = ClientIdGenerator::from_boxed(self.client_id_format, self.rng);

        Client::new(&self.base_url, transport, generator)
    }
}

use url::Url;

#[cfg(doc)]
use crate::ClientConfig;
use crate::{
    identity::{ClientIdGenerator, RequestContext},
    options::{RequestBuilder, RequestOption},
    params::RequestParams,
    Error, Experiment, Response, Result, Transport, Visitor,
};

const PARTICIPATE_ENDPOINT: &str = "/participate";
const CONVERT_ENDPOINT: &str = "/convert";

/// A client for the Sixpack server.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// # Fallback behavior
///
/// The client never blocks a feature on the experimentation server. When the server cannot be
/// reached, responds with an internal server error or sends an unreadable response, the call
/// still succeeds: [`Participation::alternative`] holds the forced alternative or the first
/// alternative of the experiment, and [`Participation::error`] holds the error for logging.
///
/// `Err(_)` is returned only for programming mistakes (bad names, missing alternatives, no
/// options) and when a client id cannot be generated. In these cases no request is made.
///
/// # Examples
/// ```no_run
/// # use sixpack::{ClientConfig, Experiment, Visitor};
/// let client = ClientConfig::from_base_url("http://localhost:5000").to_client()?;
/// let experiment = Experiment::new("button-color", ["red", "blue"])?;
///
/// let participation = client.participate(&experiment, &Visitor::new().client_id("user-1"))?;
/// if let Some(err) = &participation.error {
///     eprintln!("sixpack is unavailable: {err}");
/// }
/// println!("showing {} button", participation.alternative);
/// # Ok::<(), sixpack::Error>(())
/// ```
pub struct Client<'a> {
    participate_url: Url,
    convert_url: Url,
    transport: Box<dyn Transport + Send + Sync + 'a>,
    generator: ClientIdGenerator,
}

/// Result of a participate call.
#[derive(Debug, Clone)]
pub struct Participation {
    /// Alternative to show: the server's choice, or the local fallback if the call failed.
    pub alternative: String,
    /// Decoded server response, if one was received.
    pub response: Option<Response>,
    /// The recovered failure, if the server could not be used.
    pub error: Option<Error>,
}

/// Result of a convert call.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Alternative the conversion was recorded for. If the call failed, the forced or first
    /// alternative when known.
    pub alternative: Option<String>,
    /// Decoded server response, if one was received.
    pub response: Option<Response>,
    /// The recovered failure, if the server could not be used.
    pub error: Option<Error>,
}

impl Conversion {
    /// Returns `true` if the server acknowledged the conversion.
    pub fn is_recorded(&self) -> bool {
        self.response.as_ref().is_some_and(Response::is_ok)
    }
}

impl<'a> Client<'a> {
    pub(crate) fn new(
        base_url: &str,
        transport: Box<dyn Transport + Send + Sync + 'a>,
        generator: ClientIdGenerator,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(Error::InvalidBaseUrl)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }

        let participate_url = base_url
            .join(PARTICIPATE_ENDPOINT)
            .map_err(Error::InvalidBaseUrl)?;
        let convert_url = base_url
            .join(CONVERT_ENDPOINT)
            .map_err(Error::InvalidBaseUrl)?;

        Ok(Client {
            participate_url,
            convert_url,
            transport,
            generator,
        })
    }

    /// Assign `visitor` to an alternative of `experiment`.
    ///
    /// A client id is generated if the visitor has none.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidForce`] if the visitor's forced alternative is not a valid name.
    /// - [`Error::IdentityGeneration`] if a client id cannot be generated.
    pub fn participate(
        &self,
        experiment: &Experiment,
        visitor: &Visitor,
    ) -> Result<Participation> {
        let builder = RequestBuilder::participation(experiment, visitor)?;
        self.participate_inner(&builder)
    }

    /// Assign the visitor of the incoming request to an alternative of `experiment`.
    ///
    /// The client id is read from `context`; if there is none, a new one is generated and written
    /// back to `context` so that later calls reuse it. IP address and user agent come from the
    /// request, and the query parameter `sixpack-force-<experiment name>` forces an alternative.
    pub fn participate_from_context(
        &self,
        experiment: &Experiment,
        context: &dyn RequestContext,
    ) -> Result<Participation> {
        let mut builder = RequestBuilder::from_context(experiment, context);
        builder.traffic_fraction(experiment.traffic_fraction());
        self.participate_inner(&builder)
    }

    /// Assign a visitor to an alternative of the experiment named `experiment`, with settings
    /// given as [`RequestOption`]s.
    ///
    /// # Errors
    ///
    /// Options are checked before any request is made:
    /// - [`Error::NoOptions`] if `options` is empty.
    /// - [`Error::NotEnoughAlternatives`] unless at least two alternatives are given.
    /// - [`Error::InvalidExperimentName`], [`Error::InvalidAlternativeName`],
    /// [`Error::DuplicateAlternative`], [`Error::InvalidForce`] or
    /// [`Error::InvalidTrafficFraction`] for invalid settings.
    ///
    /// # Examples
    /// ```no_run
    /// # fn test(client: &sixpack::Client) -> sixpack::Result<()> {
    /// use sixpack::RequestOption;
    ///
    /// let participation = client.participate_with(
    ///     "test-package",
    ///     &[
    ///         RequestOption::client_id("my-user-client-id"),
    ///         RequestOption::alternatives(["a", "b", "c", "d"]),
    ///         RequestOption::traffic_fraction(0.55),
    ///     ],
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn participate_with(
        &self,
        experiment: &str,
        options: &[RequestOption<'_>],
    ) -> Result<Participation> {
        let builder = RequestBuilder::with_options(experiment, options)?;
        self.participate_inner(&builder)
    }

    /// Record a conversion of `visitor` in `experiment`, optionally for a `kpi`.
    pub fn convert(
        &self,
        experiment: &Experiment,
        visitor: &Visitor,
        kpi: Option<&str>,
    ) -> Result<Conversion> {
        let builder = RequestBuilder::conversion(experiment, visitor, kpi);
        self.convert_inner(&builder)
    }

    /// Record a conversion of the visitor of the incoming request.
    ///
    /// The client id is resolved as in [`Client::participate_from_context()`].
    pub fn convert_from_context(
        &self,
        experiment: &Experiment,
        context: &dyn RequestContext,
        kpi: Option<&str>,
    ) -> Result<Conversion> {
        let mut builder = RequestBuilder::from_context(experiment, context);
        builder.clear_force().kpi(kpi);
        self.convert_inner(&builder)
    }

    /// Record a conversion in the experiment named `experiment`, with settings given as
    /// [`RequestOption`]s.
    ///
    /// # Errors
    ///
    /// [`Error::NoOptions`] if `options` is empty, or the error of the first invalid option.
    pub fn convert_with(
        &self,
        experiment: &str,
        options: &[RequestOption<'_>],
    ) -> Result<Conversion> {
        let builder = RequestBuilder::with_options(experiment, options)?;
        self.convert_inner(&builder)
    }

    fn participate_inner(&self, builder: &RequestBuilder) -> Result<Participation> {
        let params = builder.participate_params(&self.generator)?;
        // Alternatives have been validated, so there is always a fallback.
        let fallback = builder.fallback().unwrap_or_default().to_owned();

        match self.exchange(&self.participate_url, &params) {
            Ok(response) => {
                let alternative = response
                    .alternative_name()
                    .map(str::to_owned)
                    .unwrap_or(fallback);
                log::trace!(target: "sixpack",
                            experiment = builder.experiment(),
                            alternative:display = alternative;
                            "participated");
                Ok(Participation {
                    alternative,
                    response: Some(response),
                    error: None,
                })
            }
            Err(err) => {
                log::warn!(target: "sixpack",
                           experiment = builder.experiment(),
                           fallback:display = fallback;
                           "participate failed, using fallback alternative: {:?}", err);
                Ok(Participation {
                    alternative: fallback,
                    response: None,
                    error: Some(err),
                })
            }
        }
    }

    fn convert_inner(&self, builder: &RequestBuilder) -> Result<Conversion> {
        let params = builder.convert_params(&self.generator)?;
        let fallback = builder.fallback().map(str::to_owned);

        match self.exchange(&self.convert_url, &params) {
            Ok(response) => Ok(Conversion {
                alternative: response.alternative_name().map(str::to_owned).or(fallback),
                response: Some(response),
                error: None,
            }),
            Err(err) => {
                log::warn!(target: "sixpack",
                           experiment = builder.experiment();
                           "convert failed: {:?}", err);
                Ok(Conversion {
                    alternative: fallback,
                    response: None,
                    error: Some(err),
                })
            }
        }
    }

    /// Send one request and decode the response. Only an internal server error is treated as a
    /// failure status; other statuses carry a JSON body describing the problem.
    fn exchange(&self, endpoint: &Url, params: &RequestParams) -> Result<Response> {
        let mut url = endpoint.clone();
        params.encode_into(&mut url);

        log::debug!(target: "sixpack", path = url.path(); "sending request");
        let raw = self.transport.get(&url)?;

        if raw.status == reqwest::StatusCode::INTERNAL_SERVER_ERROR.as_u16() {
            return Err(Error::ServerError(raw.status));
        }

        let response: Response = serde_json::from_slice(&raw.body)?;
        log::debug!(target: "sixpack",
                    status = raw.status,
                    response:serde = response;
                    "received response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use rand::{rngs::StdRng, SeedableRng};
    use url::Url;

    use crate::{
        identity::{tests::TestContext, IdentityStore},
        ClientConfig, Error, Experiment, RawResponse, RequestOption, Result, Visitor,
    };

    const OK_BODY: &str = r#"{"status": "OK", "client_id": "123456", "alternative": {"name": "my-alternative"}, "experiment": {"version": 1, "name": "my-test"}}"#;

    type Requests = Arc<Mutex<Vec<Url>>>;

    /// Client whose transport records every URL and answers with `reply`.
    fn mock_client(
        reply: impl Fn(&Url) -> Result<RawResponse> + Send + Sync + 'static,
    ) -> (super::Client<'static>, Requests) {
        let requests = Requests::default();
        let recorded = requests.clone();
        let client = ClientConfig::from_base_url("https://sixpack.test")
            .rng(StdRng::seed_from_u64(1))
            .transport(move |url: &Url| {
                recorded.lock().unwrap().push(url.clone());
                reply(url)
            })
            .to_client()
            .unwrap();
        (client, requests)
    }

    fn ok_client() -> (super::Client<'static>, Requests) {
        mock_client(|_| Ok(RawResponse::ok(OK_BODY)))
    }

    fn timeout(_: &Url) -> Result<RawResponse> {
        Err(Error::Network(Arc::new(
            reqwest::blocking::Client::new()
                .get("not a url")
                .build()
                .unwrap_err(),
        )))
    }

    fn query(url: &Url) -> HashMap<String, Vec<String>> {
        let mut query: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in url.query_pairs() {
            query.entry(k.into_owned()).or_default().push(v.into_owned());
        }
        query
    }

    fn single<'q>(query: &'q HashMap<String, Vec<String>>, key: &str) -> Option<&'q str> {
        query.get(key).map(|v| {
            assert_eq!(v.len(), 1, "{key} should have a single value");
            v[0].as_str()
        })
    }

    #[test]
    fn participate_with_options_sends_all_parameters() {
        let (client, requests) = ok_client();

        let participation = client
            .participate_with(
                "test-package",
                &[
                    RequestOption::client_id("my-user-client-id"),
                    RequestOption::alternatives(["a", "b", "c", "d"]),
                    RequestOption::force("b"),
                    RequestOption::traffic_fraction(0.55),
                ],
            )
            .unwrap();

        assert_eq!(participation.alternative, "my-alternative");
        assert!(participation.error.is_none());
        assert_eq!(participation.response.unwrap().client_id, "123456");

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path(), "/participate");
        let query = query(&requests[0]);
        assert_eq!(query["alternatives"], ["a", "b", "c", "d"]);
        assert_eq!(single(&query, "client_id"), Some("my-user-client-id"));
        assert_eq!(single(&query, "experiment"), Some("test-package"));
        assert_eq!(single(&query, "traffic_fraction"), Some("0.55"));
        assert_eq!(single(&query, "force"), Some("b"));
    }

    #[test]
    fn convert_with_options_sends_parameters() {
        let (client, requests) = ok_client();

        let conversion = client
            .convert_with(
                "test-package",
                &[
                    RequestOption::client_id("my-user-client-id"),
                    RequestOption::force("b"),
                    RequestOption::traffic_fraction(0.55),
                ],
            )
            .unwrap();

        assert!(conversion.error.is_none());
        assert!(conversion.is_recorded());

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].path(), "/convert");
        let query = query(&requests[0]);
        assert_eq!(single(&query, "client_id"), Some("my-user-client-id"));
        assert_eq!(single(&query, "experiment"), Some("test-package"));
        assert_eq!(single(&query, "traffic_fraction"), Some("0.55"));
        assert_eq!(single(&query, "force"), Some("b"));
    }

    #[test]
    fn participate_sends_experiment_and_visitor() {
        let (client, requests) = ok_client();
        let experiment = Experiment::new("my-test", ["control", "variant"])
            .unwrap()
            .with_traffic_fraction(0.1)
            .unwrap();
        let visitor = Visitor::new()
            .client_id("user-1")
            .ip_address("10.0.0.1")
            .user_agent("Mozilla/5.0");

        let participation = client.participate(&experiment, &visitor).unwrap();
        assert_eq!(participation.alternative, "my-alternative");

        let query = query(&requests.lock().unwrap()[0]);
        assert_eq!(query["alternatives"], ["control", "variant"]);
        assert_eq!(single(&query, "traffic_fraction"), Some("0.10"));
        assert_eq!(single(&query, "ip_address"), Some("10.0.0.1"));
        assert_eq!(single(&query, "user_agent"), Some("Mozilla/5.0"));
        assert_eq!(single(&query, "force"), None);
    }

    #[test]
    fn convert_sends_kpi() {
        let (client, requests) = ok_client();
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        client
            .convert(&experiment, &Visitor::new().client_id("user-1"), Some("signup"))
            .unwrap();

        let query = query(&requests.lock().unwrap()[0]);
        assert_eq!(single(&query, "kpi"), Some("signup"));
        assert_eq!(single(&query, "client_id"), Some("user-1"));
        assert_eq!(query.get("alternatives"), None);
        assert_eq!(query.get("traffic_fraction"), None);
    }

    #[test]
    fn timeout_falls_back_to_forced_alternative() {
        let (client, _) = mock_client(timeout);

        let participation = client
            .participate_with(
                "my-test",
                &[
                    RequestOption::alternatives(["a", "b", "c"]),
                    RequestOption::force("c"),
                ],
            )
            .unwrap();

        assert_eq!(participation.alternative, "c");
        assert!(matches!(participation.error, Some(Error::Network(_))));
        assert!(participation.response.is_none());
    }

    #[test]
    fn timeout_falls_back_to_first_alternative() {
        let (client, _) = mock_client(timeout);
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        let participation = client.participate(&experiment, &Visitor::new()).unwrap();

        assert_eq!(participation.alternative, "a");
        assert!(participation.error.is_some());
    }

    #[test]
    fn server_error_falls_back() {
        let (client, _) = mock_client(|_| {
            Ok(RawResponse {
                status: 500,
                body: b"Internal Server Error".to_vec(),
            })
        });
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        let participation = client
            .participate(&experiment, &Visitor::new().force("b"))
            .unwrap();
        assert_eq!(participation.alternative, "b");
        assert!(matches!(participation.error, Some(Error::ServerError(500))));

        let conversion = client.convert(&experiment, &Visitor::new(), None).unwrap();
        assert_eq!(conversion.alternative.as_deref(), Some("a"));
        assert!(matches!(conversion.error, Some(Error::ServerError(500))));
        assert!(!conversion.is_recorded());
    }

    #[test]
    fn undecodable_response_falls_back() {
        let (client, _) = mock_client(|_| Ok(RawResponse::ok("<html>")));
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        let participation = client.participate(&experiment, &Visitor::new()).unwrap();
        assert_eq!(participation.alternative, "a");
        assert!(matches!(participation.error, Some(Error::Decode(_))));
    }

    #[test]
    fn null_fields_keep_server_alternative() {
        let (client, _) = mock_client(|_| {
            Ok(RawResponse::ok(
                r#"{"status": "ok", "client_id": null, "alternative": {"name": "b"}, "experiment": {"version": null, "name": "my-test"}}"#,
            ))
        });
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        let participation = client.participate(&experiment, &Visitor::new()).unwrap();
        assert_eq!(participation.alternative, "b");
        assert!(participation.error.is_none());
    }

    #[test]
    fn empty_optional_values_are_not_sent() {
        let (client, requests) = ok_client();
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        client
            .convert(
                &experiment,
                &Visitor::new().client_id("x").ip_address("").user_agent(""),
                Some(""),
            )
            .unwrap();
        client
            .convert_with(
                "my-test",
                &[
                    RequestOption::client_id("x"),
                    RequestOption::ip_address(""),
                    RequestOption::user_agent(""),
                    RequestOption::kpi(""),
                ],
            )
            .unwrap();
        client
            .participate_with(
                "my-test",
                &[
                    RequestOption::alternatives(["a", "b"]),
                    RequestOption::ip_address(""),
                    RequestOption::force(""),
                ],
            )
            .unwrap();

        for url in requests.lock().unwrap().iter() {
            let query = query(url);
            for key in ["ip_address", "user_agent", "kpi", "force"] {
                assert_eq!(query.get(key), None, "{key} sent in {url}");
            }
        }
    }

    #[test]
    fn failed_status_without_alternative_keeps_fallback() {
        let (client, _) = mock_client(|_| {
            Ok(RawResponse {
                status: 400,
                body: br#"{"status": "failed", "message": "missing arguments"}"#.to_vec(),
            })
        });
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();

        let participation = client.participate(&experiment, &Visitor::new()).unwrap();
        assert_eq!(participation.alternative, "a");
        assert!(participation.error.is_none());
        assert_eq!(participation.response.unwrap().status, "failed");
    }

    #[test]
    fn validation_errors_skip_the_network() {
        let (client, requests) = ok_client();

        let results = [
            client.participate_with("my-test", &[RequestOption::alternatives(["a"])]),
            client.participate_with("my-test", &[RequestOption::alternatives(["a", "B"])]),
            client.participate_with("my-test", &[RequestOption::client_id("id")]),
            client.participate_with("My-Test", &[RequestOption::alternatives(["a", "b"])]),
            client.participate_with("my-test", &[]),
        ];
        assert!(results.iter().all(|r| r.is_err()));

        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();
        assert!(matches!(
            client.participate(&experiment, &Visitor::new().force("Nope")),
            Err(Error::InvalidForce(_))
        ));
        assert!(matches!(
            client.convert_with("my-test", &[]),
            Err(Error::NoOptions)
        ));

        assert_eq!(requests.lock().unwrap().len(), 0);
    }

    #[test]
    fn context_identity_is_generated_once_and_reused() {
        let (client, requests) = ok_client();
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();
        let ctx = TestContext {
            remote_addr: Some("192.168.1.1".to_owned()),
            user_agent: Some("Mozilla/5.0".to_owned()),
            ..Default::default()
        };

        client.participate_from_context(&experiment, &ctx).unwrap();
        client
            .convert_from_context(&experiment, &ctx, Some("purchase"))
            .unwrap();

        let requests = requests.lock().unwrap();
        let participate = query(&requests[0]);
        let convert = query(&requests[1]);
        let client_id = ctx.read_client_id().unwrap();

        assert_eq!(*ctx.writes.borrow(), 1);
        assert_eq!(single(&participate, "client_id"), Some(client_id.as_str()));
        assert_eq!(single(&convert, "client_id"), Some(client_id.as_str()));
        assert_eq!(single(&participate, "ip_address"), Some("192.168.1.1"));
        assert_eq!(single(&convert, "user_agent"), Some("Mozilla/5.0"));
        assert_eq!(single(&convert, "kpi"), Some("purchase"));
    }

    #[test]
    fn context_force_is_sent_when_participating_only() {
        let (client, requests) = mock_client(timeout);
        let experiment = Experiment::new("my-test", ["a", "b"]).unwrap();
        let ctx = TestContext {
            query: HashMap::from([("sixpack-force-my-test".to_owned(), "b".to_owned())]),
            ..Default::default()
        };

        let participation = client.participate_from_context(&experiment, &ctx).unwrap();
        let conversion = client.convert_from_context(&experiment, &ctx, None).unwrap();

        assert_eq!(participation.alternative, "b");
        assert_eq!(conversion.alternative.as_deref(), Some("a"));

        let requests = requests.lock().unwrap();
        assert_eq!(single(&query(&requests[0]), "force"), Some("b"));
        assert_eq!(single(&query(&requests[1]), "force"), None);
    }

    #[test]
    fn endpoints_replace_base_path() {
        let client = ClientConfig::from_base_url("https://sixpack.test/ignored/")
            .transport(|url: &Url| {
                assert_eq!(url.path(), "/participate");
                Ok::<_, Error>(RawResponse::ok(OK_BODY))
            })
            .to_client()
            .unwrap();

        client
            .participate_with("my-test", &[RequestOption::alternatives(["a", "b"])])
            .unwrap();
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ClientConfig::from_base_url("not a url").to_client(),
            Err(Error::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ClientConfig::from_base_url("mailto:sixpack@example.com").to_client(),
            Err(Error::InvalidBaseUrl(_))
        ));
    }
}

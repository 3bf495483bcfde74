//! Composable request options and the builder they are applied to.
use std::fmt;

use crate::{
    experiment::{validate_traffic_fraction, Experiment, Visitor},
    identity::{resolve_client_id, ClientIdGenerator, IdentityStore, RequestContext},
    name::{is_valid_name, validate_alternatives, validate_experiment_name, validate_force},
    params::{self, RequestParams},
    Error, Result,
};

/// Prefix of the query parameter that forces an alternative from the incoming request, followed
/// by the experiment name.
pub const FORCE_QUERY_PREFIX: &str = "sixpack-force-";

/// A single setting for [`Client::participate_with()`](crate::Client::participate_with) and
/// [`Client::convert_with()`](crate::Client::convert_with).
///
/// Options are applied in order. For single-valued settings the last option wins.
///
/// # Examples
/// ```
/// # use sixpack::RequestOption;
/// let options = [
///     RequestOption::client_id("my-user-client-id"),
///     RequestOption::alternatives(["a", "b", "c"]),
///     RequestOption::traffic_fraction(0.55),
///     RequestOption::force("b"),
/// ];
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub enum RequestOption<'a> {
    /// Send this client id.
    ClientId(String),
    /// Visitor's IP address.
    IpAddress(String),
    /// Visitor's user agent.
    UserAgent(String),
    /// Pin the visitor to an alternative. An empty name means no force.
    Force(String),
    /// Fraction of traffic included in the experiment.
    TrafficFraction(f64),
    /// Alternatives of the experiment, the first being the default.
    Alternatives(Vec<String>),
    /// KPI a conversion is recorded for.
    Kpi(String),
    /// Take client id, IP address, user agent and forced alternative from the incoming request.
    FromContext(&'a dyn RequestContext),
}

impl<'a> RequestOption<'a> {
    /// Send `client_id` instead of resolving one.
    pub fn client_id(client_id: impl Into<String>) -> Self {
        Self::ClientId(client_id.into())
    }

    /// Visitor's IP address. Not sent if empty.
    pub fn ip_address(ip_address: impl Into<String>) -> Self {
        Self::IpAddress(ip_address.into())
    }

    /// Visitor's user agent. Not sent if empty.
    pub fn user_agent(user_agent: impl Into<String>) -> Self {
        Self::UserAgent(user_agent.into())
    }

    /// Pin the visitor to `alternative`. An empty name clears an earlier force.
    pub fn force(alternative: impl Into<String>) -> Self {
        Self::Force(alternative.into())
    }

    /// Fraction of traffic included in the experiment, within `[0, 1]`.
    pub fn traffic_fraction(traffic_fraction: f64) -> Self {
        Self::TrafficFraction(traffic_fraction)
    }

    /// Alternatives of the experiment. At least two distinct names are required.
    pub fn alternatives<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Alternatives(alternatives.into_iter().map(Into::into).collect())
    }

    /// KPI a conversion is recorded for. Not sent if empty.
    pub fn kpi(kpi: impl Into<String>) -> Self {
        Self::Kpi(kpi.into())
    }

    /// Read identity and forced alternative from the incoming request.
    pub fn from_context(context: &'a dyn RequestContext) -> Self {
        Self::FromContext(context)
    }
}

impl fmt::Debug for RequestOption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientId(v) => f.debug_tuple("ClientId").field(v).finish(),
            Self::IpAddress(v) => f.debug_tuple("IpAddress").field(v).finish(),
            Self::UserAgent(v) => f.debug_tuple("UserAgent").field(v).finish(),
            Self::Force(v) => f.debug_tuple("Force").field(v).finish(),
            Self::TrafficFraction(v) => f.debug_tuple("TrafficFraction").field(v).finish(),
            Self::Alternatives(v) => f.debug_tuple("Alternatives").field(v).finish(),
            Self::Kpi(v) => f.debug_tuple("Kpi").field(v).finish(),
            Self::FromContext(_) => f.write_str("FromContext(..)"),
        }
    }
}

#[derive(Clone, Copy)]
enum ClientIdSource<'s, 'a> {
    Explicit(&'s str),
    Context(&'a dyn RequestContext),
}

/// Settings for one request, accumulated from options or from an [`Experiment`] and [`Visitor`].
pub(crate) struct RequestBuilder<'s, 'a> {
    experiment: &'s str,
    client_id: Option<ClientIdSource<'s, 'a>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    force: Option<String>,
    traffic_fraction: Option<f64>,
    alternatives: Vec<String>,
    kpi: Option<String>,
}

impl<'s, 'a> RequestBuilder<'s, 'a> {
    pub fn new(experiment: &'s str) -> Self {
        RequestBuilder {
            experiment,
            client_id: None,
            ip_address: None,
            user_agent: None,
            force: None,
            traffic_fraction: None,
            alternatives: Vec::new(),
            kpi: None,
        }
    }

    /// Apply `options` in order.
    ///
    /// Fails on an empty option list or on the first invalid option.
    pub fn with_options(experiment: &'s str, options: &'s [RequestOption<'a>]) -> Result<Self> {
        if options.is_empty() {
            return Err(Error::NoOptions);
        }

        let mut builder = RequestBuilder::new(experiment);
        for option in options {
            builder.apply(option)?;
        }
        Ok(builder)
    }

    /// Settings for the struct-based participate flow.
    pub fn participation(experiment: &'s Experiment, visitor: &'s Visitor) -> Result<Self> {
        let mut builder = RequestBuilder::new(experiment.name());
        builder.alternatives = experiment.alternatives().to_vec();
        builder.traffic_fraction = Some(experiment.traffic_fraction());
        builder.apply_visitor(visitor);
        builder.force = visitor.validated_force()?.map(str::to_owned);
        Ok(builder)
    }

    /// Settings for the struct-based convert flow. The visitor's force is not sent.
    pub fn conversion(
        experiment: &'s Experiment,
        visitor: &'s Visitor,
        kpi: Option<&str>,
    ) -> Self {
        let mut builder = RequestBuilder::new(experiment.name());
        builder.alternatives = experiment.alternatives().to_vec();
        builder.apply_visitor(visitor);
        builder.kpi = kpi.filter(|k| !k.is_empty()).map(str::to_owned);
        builder
    }

    /// Settings derived from the incoming request.
    pub fn from_context(experiment: &'s Experiment, context: &'a dyn RequestContext) -> Self {
        let mut builder = RequestBuilder::new(experiment.name());
        builder.alternatives = experiment.alternatives().to_vec();
        builder.apply_context(context);
        builder
    }

    pub fn experiment(&self) -> &str {
        self.experiment
    }

    pub fn traffic_fraction(&mut self, traffic_fraction: f64) -> &mut Self {
        self.traffic_fraction = Some(traffic_fraction);
        self
    }

    pub fn kpi(&mut self, kpi: Option<&str>) -> &mut Self {
        self.kpi = kpi.filter(|k| !k.is_empty()).map(str::to_owned);
        self
    }

    /// Drop any forced alternative, e.g. one picked up from the request for a conversion.
    pub fn clear_force(&mut self) -> &mut Self {
        self.force = None;
        self
    }

    pub fn apply(&mut self, option: &'s RequestOption<'a>) -> Result<()> {
        match option {
            RequestOption::ClientId(client_id) => {
                self.client_id = Some(ClientIdSource::Explicit(client_id));
            }
            RequestOption::IpAddress(ip_address) => self.ip_address = Some(ip_address.clone()),
            RequestOption::UserAgent(user_agent) => self.user_agent = Some(user_agent.clone()),
            RequestOption::Force(force) if force.is_empty() => self.force = None,
            RequestOption::Force(force) => {
                validate_force(force)?;
                self.force = Some(force.clone());
            }
            RequestOption::TrafficFraction(traffic_fraction) => {
                self.traffic_fraction = Some(validate_traffic_fraction(*traffic_fraction)?);
            }
            RequestOption::Alternatives(alternatives) => {
                validate_alternatives(alternatives)?;
                self.alternatives = alternatives.clone();
            }
            RequestOption::Kpi(kpi) => self.kpi = Some(kpi.clone()),
            RequestOption::FromContext(context) => self.apply_context(*context),
        }
        Ok(())
    }

    fn apply_visitor(&mut self, visitor: &'s Visitor) {
        if let Some(client_id) = visitor.client_id.as_deref() {
            self.client_id = Some(ClientIdSource::Explicit(client_id));
        }
        self.ip_address = visitor.ip_address.clone().or(self.ip_address.take());
        self.user_agent = visitor.user_agent.clone().or(self.user_agent.take());
    }

    fn apply_context(&mut self, context: &'a dyn RequestContext) {
        self.client_id = Some(ClientIdSource::Context(context));
        if let Some(ip_address) = context.remote_addr() {
            self.ip_address = Some(ip_address);
        }
        if let Some(user_agent) = context.user_agent() {
            self.user_agent = Some(user_agent);
        }

        let force_param = format!("{}{}", FORCE_QUERY_PREFIX, self.experiment);
        match context.query_param(&force_param).filter(|f| !f.is_empty()) {
            Some(force) if is_valid_name(&force) => self.force = Some(force),
            Some(force) => {
                log::warn!(target: "sixpack",
                           experiment = self.experiment,
                           force:display = force;
                           "ignoring invalid forced alternative from request");
            }
            None => {}
        }
    }

    /// Alternative handed out when the server cannot be reached: the forced one if any, else the
    /// first alternative.
    pub fn fallback(&self) -> Option<&str> {
        self.force
            .as_deref()
            .or_else(|| self.alternatives.first().map(String::as_str))
    }

    fn resolve_client_id(&self, generator: &ClientIdGenerator) -> Result<String> {
        match self.client_id {
            Some(ClientIdSource::Explicit(client_id)) => {
                resolve_client_id::<dyn IdentityStore>(Some(client_id), None, generator)
            }
            Some(ClientIdSource::Context(context)) => {
                resolve_client_id(None, Some(context), generator)
            }
            None => resolve_client_id::<dyn IdentityStore>(None, None, generator),
        }
    }

    /// Validate and build the `/participate` parameters.
    pub fn participate_params(&self, generator: &ClientIdGenerator) -> Result<RequestParams> {
        validate_experiment_name(self.experiment)?;
        validate_alternatives(&self.alternatives)?;

        let client_id = self.resolve_client_id(generator)?;
        let traffic_fraction = self.traffic_fraction.unwrap_or(1.0);

        let mut params = RequestParams::new();
        params
            .set(params::CLIENT_ID, client_id)
            .set(params::EXPERIMENT, self.experiment)
            .set(params::TRAFFIC_FRACTION, format!("{:.2}", traffic_fraction))
            .set_opt(params::IP_ADDRESS, self.ip_address.as_deref())
            .set_opt(params::USER_AGENT, self.user_agent.as_deref())
            .set_opt(params::FORCE, self.force.as_deref());
        for alternative in &self.alternatives {
            params.append(params::ALTERNATIVES, alternative.as_str());
        }
        Ok(params)
    }

    /// Build the `/convert` parameters. Traffic fraction and force are sent only when set
    /// explicitly through options.
    pub fn convert_params(&self, generator: &ClientIdGenerator) -> Result<RequestParams> {
        let client_id = self.resolve_client_id(generator)?;

        let mut params = RequestParams::new();
        params
            .set(params::CLIENT_ID, client_id)
            .set(params::EXPERIMENT, self.experiment)
            .set_opt(params::IP_ADDRESS, self.ip_address.as_deref())
            .set_opt(params::USER_AGENT, self.user_agent.as_deref())
            .set_opt(params::KPI, self.kpi.as_deref())
            .set_opt(
                params::TRAFFIC_FRACTION,
                self.traffic_fraction.map(|f| format!("{:.2}", f)).as_deref(),
            )
            .set_opt(params::FORCE, self.force.as_deref());
        Ok(params)
    }
}

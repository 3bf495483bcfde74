use crate::{
    name::{validate_alternatives, validate_experiment_name, validate_force},
    Error, Result,
};

/// An A/B(/n) test: a name, an ordered list of alternatives and the fraction of traffic included.
///
/// The first alternative is the control and is handed out whenever the server cannot be reached.
///
/// # Examples
/// ```
/// # use sixpack::Experiment;
/// let experiment = Experiment::new("button-color", ["red", "blue"])?
///     .with_traffic_fraction(0.1)?;
/// assert_eq!(experiment.default_alternative(), "red");
/// # Ok::<(), sixpack::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    name: String,
    alternatives: Vec<String>,
    traffic_fraction: f64,
}

impl Experiment {
    /// Create an experiment, checking the experiment and alternative names.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidExperimentName`] if `name` does not match the naming grammar.
    /// - [`Error::NotEnoughAlternatives`] if fewer than two alternatives are given.
    /// - [`Error::InvalidAlternativeName`] or [`Error::DuplicateAlternative`] for a bad
    /// alternative.
    pub fn new<I, S>(name: impl Into<String>, alternatives: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let alternatives: Vec<String> = alternatives.into_iter().map(Into::into).collect();

        validate_experiment_name(&name)?;
        validate_alternatives(&alternatives)?;

        Ok(Experiment {
            name,
            alternatives,
            traffic_fraction: 1.0,
        })
    }

    /// Include only a fraction of visitors in the experiment.
    pub fn with_traffic_fraction(mut self, traffic_fraction: f64) -> Result<Self> {
        self.traffic_fraction = validate_traffic_fraction(traffic_fraction)?;
        Ok(self)
    }

    /// Name of the experiment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternatives in order, the first being the control.
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    /// Fraction of traffic included, `1.0` unless set.
    pub fn traffic_fraction(&self) -> f64 {
        self.traffic_fraction
    }

    /// The alternative returned when the server is unavailable and nothing is forced.
    pub fn default_alternative(&self) -> &str {
        &self.alternatives[0]
    }
}

/// Identity inputs for a single participate or convert call.
///
/// Every field is optional. Without a client id, a fresh one is generated for the call.
///
/// ```
/// # use sixpack::Visitor;
/// let visitor = Visitor::new()
///     .client_id("my-user-client-id")
///     .ip_address("10.0.0.1")
///     .force("b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visitor {
    pub(crate) client_id: Option<String>,
    pub(crate) ip_address: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) force: Option<String>,
}

impl Visitor {
    /// A visitor without any identity inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client_id` instead of generating one.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Visitor's IP address. Not sent if empty.
    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Visitor's user agent. Not sent if empty.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Pin the visitor to an alternative. Only used when participating. An empty name means no
    /// force.
    pub fn force(mut self, alternative: impl Into<String>) -> Self {
        self.force = Some(alternative.into());
        self
    }

    pub(crate) fn validated_force(&self) -> Result<Option<&str>> {
        match self.force.as_deref().filter(|f| !f.is_empty()) {
            Some(force) => {
                validate_force(force)?;
                Ok(Some(force))
            }
            None => Ok(None),
        }
    }
}

pub(crate) fn validate_traffic_fraction(traffic_fraction: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&traffic_fraction) {
        Ok(traffic_fraction)
    } else {
        Err(Error::InvalidTrafficFraction(traffic_fraction))
    }
}

//! Query parameters sent to the Sixpack server.
use url::Url;

pub(crate) const CLIENT_ID: &str = "client_id";
pub(crate) const EXPERIMENT: &str = "experiment";
pub(crate) const ALTERNATIVES: &str = "alternatives";
pub(crate) const TRAFFIC_FRACTION: &str = "traffic_fraction";
pub(crate) const FORCE: &str = "force";
pub(crate) const IP_ADDRESS: &str = "ip_address";
pub(crate) const USER_AGENT: &str = "user_agent";
pub(crate) const KPI: &str = "kpi";

/// An ordered set of query parameters.
///
/// Keys set with [`RequestParams::set()`] hold a single value (last write wins), while
/// [`RequestParams::append()`] keeps every value in insertion order (used for `alternatives`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RequestParams {
    pairs: Vec<(&'static str, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `key` with `value`.
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| *k == key) {
            Some(pos) => {
                self.pairs[pos].1 = value;
                let mut seen = false;
                self.pairs.retain(|(k, _)| {
                    if *k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Set `key` only if `value` is present and not empty.
    pub fn set_opt(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.set(key, value);
        }
        self
    }

    /// Add another value for `key`, keeping the existing ones.
    pub fn append(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key, value.into()));
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the query string of `url` with the URL-encoded parameters.
    pub fn encode_into(&self, url: &mut Url) {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())));
    }
}

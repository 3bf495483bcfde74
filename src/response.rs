use serde::{Deserialize, Deserializer, Serialize};

/// Decoded response of the Sixpack server.
///
/// All fields are optional on the wire and default to empty values when absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// `"ok"` on success, `"failed"` otherwise.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// The client id the server recorded the call for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_id: String,
    /// Alternative the visitor is assigned to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub alternative: AlternativeInfo,
    /// Experiment the call was recorded for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub experiment: ExperimentInfo,
    /// Human-readable explanation sent along with failed calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Response {
    /// Name of the assigned alternative, if the server sent one.
    pub fn alternative_name(&self) -> Option<&str> {
        Some(self.alternative.name.as_str()).filter(|name| !name.is_empty())
    }

    /// Returns `true` if the server reported success.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

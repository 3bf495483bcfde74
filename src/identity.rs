//! Client identity: resolving, generating and persisting the token that ties a visitor's
//! participate and convert calls together.
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

use crate::Result;

/// Suggested name for the cookie holding the client id.
pub const CLIENT_ID_COOKIE: &str = "sixpack_client_id";

/// Lifetime of a freshly generated client id.
pub const CLIENT_ID_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Storage for a visitor's client id, usually backed by a cookie of the host web framework.
///
/// Methods take `&self`, so implementations needing to record a write should use interior
/// mutability.
pub trait IdentityStore {
    /// Return the previously persisted client id, if any.
    fn read_client_id(&self) -> Option<String>;

    /// Persist a newly generated client id until `expires_at`.
    fn write_client_id(&self, client_id: &str, expires_at: DateTime<Utc>);
}

/// The incoming web request the client is serving.
///
/// Implement this for your framework's request/response pair to use
/// [`Client::participate_from_context()`](crate::Client::participate_from_context) and friends.
pub trait RequestContext: IdentityStore {
    /// Remote address of the visitor.
    fn remote_addr(&self) -> Option<String>;

    /// `User-Agent` header of the request.
    fn user_agent(&self) -> Option<String>;

    /// Value of a query parameter of the request URL.
    fn query_param(&self, name: &str) -> Option<String>;
}

/// Shape of generated client ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientIdFormat {
    /// Random UUID in the hyphenated v4 layout, e.g. `0b5f6a5c-3b0e-4c55-9a4e-7c8e3d9f1a2b`.
    #[default]
    Uuid,
    /// 32 characters drawn uniformly from ASCII letters.
    Letters,
}

const LETTERS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LETTERS_LEN: usize = 32;

/// Generates fresh client ids from an injected random source.
pub struct ClientIdGenerator {
    format: ClientIdFormat,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ClientIdGenerator {
    /// Create a generator producing ids of `format` from `rng`.
    pub fn new(format: ClientIdFormat, rng: impl RngCore + Send + 'static) -> Self {
        Self::from_boxed(format, Box::new(rng))
    }

    pub(crate) fn from_boxed(format: ClientIdFormat, rng: Box<dyn RngCore + Send>) -> Self {
        ClientIdGenerator {
            format,
            rng: Mutex::new(rng),
        }
    }

    /// Generate a new client id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityGeneration`](crate::Error::IdentityGeneration) if the random
    /// source fails.
    pub fn generate(&self) -> Result<String> {
        // A panic while holding the lock leaves the generator state intact.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        match self.format {
            ClientIdFormat::Uuid => uuid_v4(&mut **rng),
            ClientIdFormat::Letters => letters(&mut **rng),
        }
    }
}

impl Default for ClientIdGenerator {
    fn default() -> Self {
        ClientIdGenerator::new(ClientIdFormat::default(), OsRng)
    }
}

impl std::fmt::Debug for ClientIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdGenerator")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

fn uuid_v4(rng: &mut dyn RngCore) -> Result<String> {
    let mut bytes = [0u8; 16];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string())
}

fn letters(rng: &mut dyn RngCore) -> Result<String> {
    // Bytes at or above 4 * 52 are rejected so that every letter is equally likely.
    const LIMIT: u8 = 4 * LETTERS.len() as u8;

    let mut id = String::with_capacity(LETTERS_LEN);
    let mut buf = [0u8; 48];
    while id.len() < LETTERS_LEN {
        rng.try_fill_bytes(&mut buf)?;
        for &b in buf.iter().filter(|&&b| b < LIMIT) {
            if id.len() == LETTERS_LEN {
                break;
            }
            id.push(LETTERS[usize::from(b) % LETTERS.len()] as char);
        }
    }
    Ok(id)
}

/// Resolve the client id for one call.
///
/// Uses `explicit` if non-empty, then the id persisted in `store`, and otherwise generates a new
/// one and writes it back to `store`. The store is read and written at most once.
pub(crate) fn resolve_client_id<S: IdentityStore + ?Sized>(
    explicit: Option<&str>,
    store: Option<&S>,
    generator: &ClientIdGenerator,
) -> Result<String> {
    if let Some(client_id) = explicit.filter(|id| !id.is_empty()) {
        return Ok(client_id.to_owned());
    }

    if let Some(client_id) = store
        .and_then(|store| store.read_client_id())
        .filter(|id| !id.is_empty())
    {
        return Ok(client_id);
    }

    let client_id = generator.generate()?;
    log::trace!(target: "sixpack", client_id:display = client_id; "generated new client id");

    if let Some(store) = store {
        let expires_at = Utc::now() + chrono::Duration::seconds(CLIENT_ID_TTL.as_secs() as i64);
        store.write_client_id(&client_id, expires_at);
    }

    Ok(client_id)
}

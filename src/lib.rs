//! A Rust client for [Sixpack](https://github.com/sixpack/sixpack), a language-agnostic A/B
//! testing server.
//!
//! # Overview
//!
//! The client revolves around a [`Client`] that talks to the Sixpack server on behalf of
//! visitors. A visitor *participates* in an [`Experiment`] to get assigned one of its
//! alternatives, and later *converts* when reaching the experiment's goal. Both calls identify the
//! visitor by an opaque client id, which is supplied by the caller, read from the visitor's cookie
//! or generated on the fly.
//!
//! ```no_run
//! # use sixpack::{ClientConfig, Experiment, Visitor};
//! let client = ClientConfig::from_base_url("http://localhost:5000").to_client()?;
//! let experiment = Experiment::new("button-color", ["red", "blue"])?;
//! let visitor = Visitor::new().client_id("user-1");
//!
//! let participation = client.participate(&experiment, &visitor)?;
//! println!("showing {} button", participation.alternative);
//!
//! client.convert(&experiment, &visitor, Some("signup"))?;
//! # Ok::<(), sixpack::Error>(())
//! ```
//!
//! # Request options
//!
//! Besides [`Experiment`] and [`Visitor`], requests can be described by a list of
//! [`RequestOption`]s, applied in order, with [`Client::participate_with()`] and
//! [`Client::convert_with()`].
//!
//! # Web requests
//!
//! Implement [`RequestContext`] for your web framework to take the client id, IP address and user
//! agent from the incoming request. A newly generated client id is written back to the context,
//! typically as a cookie named [`CLIENT_ID_COOKIE`] that expires after [`CLIENT_ID_TTL`].
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! The experimentation server should never take a feature down. Network failures, internal server
//! errors and malformed responses are therefore not returned as `Err(_)`: the call falls back to
//! the forced or first alternative and reports the error in [`Participation::error`].
//! `Err(_)` is reserved for mistakes in calling code, like invalid experiment names, which are
//! detected before any request is made.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `sixpack` target. Consider integrating a `log`-compatible logger implementation for better
//! visibility into client operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod experiment;
mod identity;
mod name;
mod options;
mod params;
mod response;
mod transport;

pub use client::{Client, Conversion, Participation};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use experiment::{Experiment, Visitor};
pub use identity::{
    ClientIdFormat, ClientIdGenerator, IdentityStore, RequestContext, CLIENT_ID_COOKIE,
    CLIENT_ID_TTL,
};
pub use name::is_valid_name;
pub use options::{RequestOption, FORCE_QUERY_PREFIX};
pub use response::{AlternativeInfo, ExperimentInfo, Response};
pub use transport::{HttpTransport, RawResponse, Transport};
#[doc(no_inline)]
pub use url::Url;

//! Error types for the Okta + Duo login flow.
//!
//! Library code returns [`Result`]; the CLI layer wraps these in `anyhow`
//! with additional context.

use thiserror::Error;

/// Errors surfaced by the credential flow. The first failing step is returned
/// as-is; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or its body could not be read. The URL
    /// is dropped since Duo carries the signature in its query string.
    #[error("HTTP request failed: {0}")]
    Transport(reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("{url} responded with HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// A response was missing a field or element the flow depends on.
    #[error("unexpected response from {service}: {message}")]
    Protocol {
        service: &'static str,
        message: String,
    },

    /// The Okta app page carried no `SAMLResponse`, usually because the
    /// session ID is expired or invalid.
    #[error("okta: no SAML assertion returned from server")]
    NoAssertion,

    /// The Duo push was denied, timed out on the relay, or otherwise failed.
    #[error("duo: login request was not approved (result: {result})")]
    AuthRejected { result: String },

    #[error("failed to decode SAML assertion: {0}")]
    Decode(String),

    #[error("{0}")]
    RoleSelection(String),

    #[error("AWS STS AssumeRoleWithSAML failed: {0}")]
    Sts(String),
}

impl Error {
    pub(crate) fn protocol(service: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            service,
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! HTTP clients for the two services taking part in the login: Okta (primary
//! authentication and SAML) and the Duo relay (push second factor).
//!
//! Both clients are stateless request/response wrappers around a shared
//! `reqwest::Client`. Every call is an ordinary future, so dropping it aborts
//! the in-flight request.

pub mod duo;
pub mod okta;

use scraper::{ElementRef, Html};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub use self::duo::DuoClient;
pub use self::okta::OktaClient;

/// URL scheme used to reach Okta and the Duo relay. Both services are only
/// ever served over HTTPS; plain HTTP exists for local test servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }

    /// `host` may carry a port, `path` must start with `/`.
    pub fn url(self, host: &str, path: &str) -> String {
        format!("{}://{}{}", self.as_str(), host, path)
    }

    pub(crate) fn origin(self, host: &str) -> String {
        format!("{}://{}", self.as_str(), host)
    }
}

/// Split a Duo signature of the form `<authSig>:<appSig>`.
pub(crate) fn split_signature(signature: &str) -> Result<(&str, &str)> {
    let mut parts = signature.split(':');
    match (parts.next(), parts.next()) {
        (Some(auth), Some(app)) if !auth.is_empty() && !app.is_empty() => Ok((auth, app)),
        _ => Err(Error::protocol(
            "okta",
            "verification signature is not of the form <authSig>:<appSig>",
        )),
    }
}

/// Find the first element whose `name` attribute equals `name` and return its
/// `value` attribute. `None` when no such element exists or it has no value.
pub(crate) fn find_input_value(html: &str, name: &str) -> Option<String> {
    Html::parse_document(html)
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().attr("name") == Some(name))
        .and_then(|element| element.value().attr("value"))
        .map(str::to_string)
}

/// Read a response body, turning non-success statuses into [`Error::Status`].
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let mut url = response.url().clone();
    url.set_query(None);

    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message: error_summary(&body),
        });
    }

    Ok(body)
}

pub(crate) fn parse_json<T: DeserializeOwned>(service: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| Error::protocol(service, format!("malformed JSON response: {e}")))
}

// Okta reports failures as {"errorCode": ..., "errorSummary": ...}; Duo as
// {"stat": "FAIL", "message": ...}. Anything else is not echoed back since
// login pages may carry user data.
fn error_summary(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return "no error details".to_string();
    };

    ["errorSummary", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .unwrap_or("no error details")
        .to_string()
}

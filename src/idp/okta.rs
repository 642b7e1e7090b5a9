use reqwest::header::{ACCEPT, COOKIE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Scheme, find_input_value, parse_json, read_body, split_signature};
use crate::error::{Error, Result};

const AUTHN_PATH: &str = "/api/v1/authn";
const SESSIONS_PATH: &str = "/api/v1/sessions";
const SAML_RESPONSE_FIELD: &str = "SAMLResponse";

fn verify_path(factor_id: &str) -> String {
    format!("/api/v1/authn/factors/{factor_id}/verify")
}

/// Outcome of primary authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authn {
    pub state_token: String,
    pub status: Option<String>,
    /// Enrolled MFA factors, in the order Okta lists them
    pub factor_ids: Vec<String>,
}

/// Outcome of a factor verify call. Before the Duo factor is satisfied Okta
/// returns the Duo challenge; afterwards it returns a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorVerification {
    pub status: Option<String>,
    pub session_token: Option<String>,
    pub challenge: Option<DuoChallenge>,
}

impl FactorVerification {
    pub fn into_challenge(self) -> Result<DuoChallenge> {
        self.challenge.ok_or_else(|| {
            Error::protocol(
                "okta",
                format!(
                    "verify response has no Duo verification (status: {})",
                    self.status.as_deref().unwrap_or("unknown")
                ),
            )
        })
    }

    pub fn into_session_token(self) -> Result<String> {
        self.session_token.ok_or_else(|| {
            Error::protocol(
                "okta",
                format!(
                    "verify response has no session token (status: {})",
                    self.status.as_deref().unwrap_or("unknown")
                ),
            )
        })
    }
}

/// Duo relay parameters handed out by Okta for one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuoChallenge {
    /// Duo relay host, e.g. `api-abc.duosecurity.com`
    pub host: String,
    /// `<authSig>:<appSig>`
    pub signature: String,
    /// Okta endpoint completing the factor once Duo has approved
    pub callback_url: String,
}

#[derive(Serialize)]
struct AuthnRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthnResponse {
    state_token: Option<String>,
    status: Option<String>,
    #[serde(rename = "_embedded", default)]
    embedded: AuthnEmbedded,
}

#[derive(Deserialize, Default)]
struct AuthnEmbedded {
    #[serde(default)]
    factors: Vec<FactorRef>,
}

#[derive(Deserialize)]
struct FactorRef {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    state_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    status: Option<String>,
    session_token: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<VerifyEmbedded>,
}

#[derive(Deserialize)]
struct VerifyEmbedded {
    factor: Option<VerifyFactor>,
}

#[derive(Deserialize)]
struct VerifyFactor {
    #[serde(rename = "_embedded")]
    embedded: Option<VerifyFactorEmbedded>,
}

#[derive(Deserialize)]
struct VerifyFactorEmbedded {
    verification: Option<Verification>,
}

#[derive(Deserialize)]
struct Verification {
    host: String,
    signature: String,
    #[serde(rename = "_links")]
    links: VerificationLinks,
}

#[derive(Deserialize)]
struct VerificationLinks {
    complete: Link,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

impl From<VerifyResponse> for FactorVerification {
    fn from(response: VerifyResponse) -> Self {
        let challenge = response
            .embedded
            .and_then(|e| e.factor)
            .and_then(|f| f.embedded)
            .and_then(|e| e.verification)
            .map(|v| DuoChallenge {
                host: v.host,
                signature: v.signature,
                callback_url: v.links.complete.href,
            });

        Self {
            status: response.status,
            session_token: response.session_token,
            challenge,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    session_token: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    id: Option<String>,
}

/// Client for the Okta authentication and sessions APIs of one organization.
#[derive(Debug, Clone)]
pub struct OktaClient {
    http: reqwest::Client,
    scheme: Scheme,
    host: String,
    app_path: String,
}

impl OktaClient {
    /// `app_path` is the embed link of the AWS app, either a path on `host`
    /// or an absolute URL.
    pub fn new(http: reqwest::Client, scheme: Scheme, host: &str, app_path: &str) -> Self {
        Self {
            http,
            scheme,
            host: host.to_string(),
            app_path: app_path.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        self.scheme.url(&self.host, path)
    }

    fn app_url(&self) -> String {
        if self.app_path.starts_with("https://") || self.app_path.starts_with("http://") {
            self.app_path.clone()
        } else if self.app_path.starts_with('/') {
            self.url(&self.app_path)
        } else {
            self.url(&format!("/{}", self.app_path))
        }
    }

    /// Primary authentication with username and password.
    pub async fn authn(&self, username: &str, password: &str) -> Result<Authn> {
        debug!("okta: primary authentication for {}", username);

        let response = self
            .http
            .post(self.url(AUTHN_PATH))
            .header(ACCEPT, "application/json")
            .json(&AuthnRequest { username, password })
            .send()
            .await?;
        let body = read_body(response).await?;
        let authn: AuthnResponse = parse_json("okta", &body)?;

        let state_token = authn.state_token.ok_or_else(|| {
            Error::protocol(
                "okta",
                format!(
                    "authn response has no state token (status: {})",
                    authn.status.as_deref().unwrap_or("unknown")
                ),
            )
        })?;

        debug!("okta: authn status {:?}", authn.status);
        Ok(Authn {
            state_token,
            status: authn.status,
            factor_ids: authn.embedded.factors.into_iter().map(|f| f.id).collect(),
        })
    }

    /// Verify `factor_id` within the authentication attempt `state_token`.
    pub async fn verify(&self, state_token: &str, factor_id: &str) -> Result<FactorVerification> {
        debug!("okta: verifying factor {}", factor_id);

        let response = self
            .http
            .post(self.url(&verify_path(factor_id)))
            .header(ACCEPT, "application/json")
            .json(&VerifyRequest { state_token })
            .send()
            .await?;
        let body = read_body(response).await?;
        let verify: VerifyResponse = parse_json("okta", &body)?;

        debug!("okta: verify status {:?}", verify.status);
        Ok(verify.into())
    }

    /// Complete the Duo factor on the Okta side. The `sig_response` is the Duo
    /// cookie joined with the application half of `signature`.
    pub async fn callback(
        &self,
        state_token: &str,
        callback_url: &str,
        signature: &str,
        duo_cookie: &str,
    ) -> Result<()> {
        debug!("okta: completing Duo callback");

        let (_, app_signature) = split_signature(signature)?;
        let sig_response = format!("{duo_cookie}:{app_signature}");

        let response = self
            .http
            .post(callback_url)
            .form(&[
                ("stateToken", state_token),
                ("sig_response", sig_response.as_str()),
            ])
            .send()
            .await?;
        read_body(response).await?;

        Ok(())
    }

    /// Exchange a one-time session token for a session ID.
    pub async fn create_session(&self, session_token: &str) -> Result<String> {
        debug!("okta: creating session");

        let response = self
            .http
            .post(self.url(SESSIONS_PATH))
            .header(ACCEPT, "application/json")
            .json(&CreateSessionRequest { session_token })
            .send()
            .await?;
        let body = read_body(response).await?;
        let session: CreateSessionResponse = parse_json("okta", &body)?;

        session
            .id
            .ok_or_else(|| Error::protocol("okta", "session response has no id"))
    }

    /// Load the app embed page with the session cookie and pull the base64
    /// SAML assertion out of its auto-submit form.
    pub async fn get_saml(&self, session_id: &str) -> Result<String> {
        debug!("okta: fetching SAML assertion");

        let response = self
            .http
            .get(self.app_url())
            .header(COOKIE, format!("sid={session_id}"))
            .send()
            .await?;
        let body = read_body(response).await?;

        find_input_value(&body, SAML_RESPONSE_FIELD).ok_or(Error::NoAssertion)
    }
}

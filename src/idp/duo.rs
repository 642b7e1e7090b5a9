use reqwest::header::ORIGIN;
use serde::Deserialize;
use tracing::debug;

use super::{Scheme, find_input_value, parse_json, read_body, split_signature};
use crate::error::{Error, Result};

const AUTH_PATH: &str = "/frame/web/v1/auth";
const PROMPT_PATH: &str = "/frame/prompt";
const STATUS_PATH: &str = "/frame/status";

/// The relay only checks that a parent URL is present.
const DUMMY_PARENT: &str = "http://0.0.0.0:3000/duo";
const PROTOCOL_VERSION: &str = "2.1";
const PUSH_FACTOR: &str = "Duo Push";
const SESSION_ID_FIELD: &str = "sid";

pub const PUSH_SUCCESS: &str = "SUCCESS";

/// Duo frame JSON responses wrap their payload as
/// `{"stat": "OK", "response": {...}}` or `{"stat": "FAIL", "message": "..."}`.
#[derive(Deserialize)]
struct Envelope<T> {
    stat: Option<String>,
    message: Option<String>,
    response: Option<T>,
}

impl<T> Envelope<T> {
    fn into_response(self, call: &str) -> Result<T> {
        if let Some(stat) = self.stat.as_deref().filter(|s| *s != "OK") {
            return Err(Error::protocol(
                "duo",
                format!(
                    "{call} failed with stat {stat}: {}",
                    self.message.as_deref().unwrap_or("no message")
                ),
            ));
        }

        self.response
            .ok_or_else(|| Error::protocol("duo", format!("{call} response has no payload")))
    }
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    txid: Option<String>,
}

/// State of a push transaction as reported by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushStatus {
    /// `SUCCESS` once approved; absent while the push is pending
    #[serde(default)]
    pub result: Option<String>,
    /// Path to post to for the completion cookie
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub cookie: Option<String>,
    /// Machine-readable progress, e.g. `pushed`, `allow`, `deny`
    #[serde(default)]
    pub status_code: Option<String>,
}

impl PushStatus {
    pub fn is_success(&self) -> bool {
        self.result.as_deref() == Some(PUSH_SUCCESS)
    }

    /// Human-readable result for error reporting.
    pub fn describe(&self) -> String {
        self.result
            .clone()
            .or_else(|| self.status_code.clone())
            .unwrap_or_else(|| "no result".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RedirectResponse {
    cookie: Option<String>,
}

/// Client for the Duo frame endpoints. The relay host differs per
/// verification, so every call names it.
#[derive(Debug, Clone)]
pub struct DuoClient {
    http: reqwest::Client,
    scheme: Scheme,
}

impl DuoClient {
    pub fn new(http: reqwest::Client, scheme: Scheme) -> Self {
        Self { http, scheme }
    }

    // Frame endpoints expect the XHR headers a browser would send.
    async fn post_frame(&self, host: &str, path: &str, form: &[(&str, &str)]) -> Result<String> {
        let response = self
            .http
            .post(self.scheme.url(host, path))
            .header(ORIGIN, self.scheme.origin(host))
            .header("X-Requested-With", "XMLHttpRequest")
            .form(form)
            .send()
            .await?;
        read_body(response).await
    }

    /// Open a Duo frame session seeded with the auth half of the Okta
    /// verification signature. Returns the Duo session ID.
    pub async fn auth(&self, signature: &str, host: &str) -> Result<String> {
        debug!("duo: opening frame session on {}", host);

        let (tx, _) = split_signature(signature)?;
        let response = self
            .http
            .post(self.scheme.url(host, AUTH_PATH))
            .query(&[
                ("tx", tx),
                ("parent", DUMMY_PARENT),
                ("v", PROTOCOL_VERSION),
            ])
            .send()
            .await?;
        let body = read_body(response).await?;

        find_input_value(&body, SESSION_ID_FIELD).ok_or_else(|| {
            Error::protocol("duo", "auth page has no sid input; the signature may be stale")
        })
    }

    /// Send a push to `device`. Returns the transaction ID to poll.
    pub async fn prompt(&self, duo_session_id: &str, host: &str, device: &str) -> Result<String> {
        debug!("duo: sending push to {}", device);

        let body = self
            .post_frame(
                host,
                PROMPT_PATH,
                &[
                    ("sid", duo_session_id),
                    ("device", device),
                    ("factor", PUSH_FACTOR),
                    ("out_of_date", "False"),
                ],
            )
            .await?;
        let envelope: Envelope<PromptResponse> = parse_json("duo", &body)?;

        envelope
            .into_response("prompt")?
            .txid
            .ok_or_else(|| Error::protocol("duo", "prompt response has no txid"))
    }

    /// Poll a push transaction. Once the push has been delivered the relay
    /// holds this request open until the user approves or denies it.
    pub async fn status(
        &self,
        duo_session_id: &str,
        transaction_id: &str,
        host: &str,
    ) -> Result<PushStatus> {
        let body = self
            .post_frame(
                host,
                STATUS_PATH,
                &[("sid", duo_session_id), ("txid", transaction_id)],
            )
            .await?;
        let envelope: Envelope<PushStatus> = parse_json("duo", &body)?;
        let status = envelope.into_response("status")?;

        debug!(
            "duo: status {:?} result {:?}",
            status.status_code, status.result
        );
        Ok(status)
    }

    /// Post to the `result_url` of an approved push. Returns the signed cookie
    /// Okta expects in its callback.
    pub async fn status_redirect(
        &self,
        duo_session_id: &str,
        result_url: &str,
        host: &str,
    ) -> Result<String> {
        debug!("duo: fetching completion cookie");

        let path = if result_url.starts_with('/') {
            result_url.to_string()
        } else {
            format!("/{result_url}")
        };
        let body = self
            .post_frame(host, &path, &[("sid", duo_session_id)])
            .await?;
        let envelope: Envelope<RedirectResponse> = parse_json("duo", &body)?;

        envelope
            .into_response("status redirect")?
            .cookie
            .ok_or_else(|| Error::protocol("duo", "status redirect response has no cookie"))
    }
}

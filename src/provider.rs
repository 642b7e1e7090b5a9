//! Credential orchestrator: sequences the Okta and Duo calls into one login
//! and exchanges the resulting SAML assertion for STS credentials.
//!
//! ```text
//! START -> FAST_PATH? -> PRIMARY_AUTH -> FACTOR_VERIFY -> DUO_CHALLENGE
//!       -> DUO_POLL -> DUO_COMPLETE -> OKTA_CALLBACK -> RE_VERIFY
//!       -> SESSION_CREATE -> SAML_FETCH -> SAML_DECODE -> STS_EXCHANGE -> DONE
//! ```
//!
//! Every step consumes the previous step's output, so the flow is strictly
//! sequential. The first error aborts the flow; the only recovery is falling
//! back from a stale cached session ID to a full login.

use tracing::{debug, info};

use crate::aws::{Credentials, IamRole, SamlAssumer};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::idp::okta::DuoChallenge;
use crate::idp::{DuoClient, OktaClient, Scheme};
use crate::saml;

/// Credentials together with the Okta session they were obtained with, so
/// the caller can reuse the session next time.
#[derive(Debug, Clone)]
pub struct CredentialsResult {
    pub credentials: Credentials,
    pub okta_session_id: String,
    pub role: IamRole,
}

/// One login flow. Holds no mutable state; concurrent acquisitions should
/// each use their own `Provider`.
pub struct Provider<S> {
    settings: Settings,
    okta: OktaClient,
    duo: DuoClient,
    sts: S,
}

impl<S: SamlAssumer> Provider<S> {
    pub fn new(settings: Settings, http: reqwest::Client, sts: S) -> Self {
        Self::with_scheme(settings, http, sts, Scheme::Https)
    }

    pub fn with_scheme(settings: Settings, http: reqwest::Client, sts: S, scheme: Scheme) -> Self {
        let okta = OktaClient::new(
            http.clone(),
            scheme,
            &settings.okta_host,
            &settings.okta_app_path,
        );
        let duo = DuoClient::new(http, scheme);

        Self {
            settings,
            okta,
            duo,
            sts,
        }
    }

    /// Run the login. A cached session ID is tried first and silently
    /// discarded if it no longer yields credentials.
    ///
    /// Dropping the returned future cancels whichever request is in flight,
    /// including the long-blocking Duo status poll.
    pub async fn get_credentials(&self) -> Result<CredentialsResult> {
        if let Some(session_id) = self.settings.okta_session_id.as_deref() {
            match self.credentials_from_session(session_id).await {
                Ok((credentials, role)) => {
                    info!("Reused existing Okta session");
                    return Ok(CredentialsResult {
                        credentials,
                        okta_session_id: session_id.to_string(),
                        role,
                    });
                }
                Err(e) => debug!("Cached Okta session unusable, logging in again: {}", e),
            }
        }

        let okta_session_id = self.create_okta_session().await?;
        let (credentials, role) = self.credentials_from_session(&okta_session_id).await?;

        Ok(CredentialsResult {
            credentials,
            okta_session_id,
            role,
        })
    }

    /// SAML_FETCH -> SAML_DECODE -> STS_EXCHANGE
    async fn credentials_from_session(&self, session_id: &str) -> Result<(Credentials, IamRole)> {
        let raw_assertion = self.okta.get_saml(session_id).await?;

        let role = saml::decode_assertion(&raw_assertion)?.assume(self.settings.role.as_deref())?;
        info!("Assuming role {}", role.role_arn);

        let credentials = self
            .sts
            .assume_role_with_saml(
                &role.principal_arn,
                &role.role_arn,
                &raw_assertion,
                self.settings.session_duration_seconds(),
            )
            .await?;

        Ok((credentials, role))
    }

    /// PRIMARY_AUTH through SESSION_CREATE. Returns a fresh Okta session ID.
    async fn create_okta_session(&self) -> Result<String> {
        info!("Authenticating {} with Okta", self.settings.okta_username);

        let authn = self
            .okta
            .authn(&self.settings.okta_username, &self.settings.okta_password)
            .await?;
        let factor_id = authn
            .factor_ids
            .first()
            .ok_or_else(|| Error::protocol("okta", "no MFA factors are enrolled for this user"))?;

        let challenge = self
            .okta
            .verify(&authn.state_token, factor_id)
            .await?
            .into_challenge()?;

        let duo_cookie = self.approve_push(&challenge).await?;

        self.okta
            .callback(
                &authn.state_token,
                &challenge.callback_url,
                &challenge.signature,
                &duo_cookie,
            )
            .await?;

        let session_token = self
            .okta
            .verify(&authn.state_token, factor_id)
            .await?
            .into_session_token()?;

        let session_id = self.okta.create_session(&session_token).await?;
        info!("Created Okta session");
        Ok(session_id)
    }

    /// DUO_CHALLENGE -> DUO_POLL -> DUO_COMPLETE. Returns the cookie Okta
    /// needs to complete the factor.
    async fn approve_push(&self, challenge: &DuoChallenge) -> Result<String> {
        let host = challenge.host.as_str();

        let duo_session_id = self.duo.auth(&challenge.signature, host).await?;
        let transaction_id = self
            .duo
            .prompt(&duo_session_id, host, &self.settings.duo_device)
            .await?;

        info!(
            "Sent Duo push to {}, waiting for approval",
            self.settings.duo_device
        );

        // The first poll answers immediately with the push still pending; the
        // second blocks on the relay until the user responds. Should the relay
        // ever answer the first poll with a result, that result is used.
        let first = self.duo.status(&duo_session_id, &transaction_id, host).await?;
        let status = if first.is_success() {
            first
        } else {
            self.duo.status(&duo_session_id, &transaction_id, host).await?
        };

        if !status.is_success() {
            return Err(Error::AuthRejected {
                result: status.describe(),
            });
        }

        let result_url = status.result_url.as_deref().ok_or_else(|| {
            Error::protocol("duo", "approved status response has no result_url")
        })?;

        self.duo
            .status_redirect(&duo_session_id, result_url, host)
            .await
    }
}

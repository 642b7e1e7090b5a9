#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_okta_duo::aws::{Credentials, SamlAssumer};
use aws_okta_duo::config::Settings;
use aws_okta_duo::error::Result;
use aws_okta_duo::idp::Scheme;
use aws_okta_duo::provider::Provider;
use aws_smithy_types::DateTime;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const APP_PATH: &str = "/home/amazon_aws/0oa1example/272";
pub const STATE_TOKEN: &str = "st1";
pub const FACTOR_ID: &str = "f1";
pub const SIGNATURE: &str = "abc:def";
pub const DUO_SID: &str = "duo-sid-1";
pub const TXID: &str = "tx-1";
pub const DUO_COOKIE: &str = "COOKIE";
pub const SESSION_TOKEN: &str = "session-token-1";
pub const SESSION_ID: &str = "sess-1";

pub const ADMIN_ROLE: &str =
    "arn:aws:iam::123456789012:saml-provider/Okta,arn:aws:iam::123456789012:role/Admin";
pub const READ_ONLY_ROLE: &str =
    "arn:aws:iam::123456789012:saml-provider/Okta,arn:aws:iam::123456789012:role/ReadOnly";

/// One recorded `assume_role_with_saml` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeCall {
    pub principal_arn: String,
    pub role_arn: String,
    pub saml_assertion: String,
    pub duration_seconds: Option<i32>,
}

/// STS stand-in that records its calls and hands back fixed credentials.
#[derive(Debug, Clone, Default)]
pub struct RecordingAssumer {
    calls: Arc<Mutex<Vec<AssumeCall>>>,
}

impl RecordingAssumer {
    pub fn calls(&self) -> Vec<AssumeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SamlAssumer for RecordingAssumer {
    async fn assume_role_with_saml(
        &self,
        principal_arn: &str,
        role_arn: &str,
        saml_assertion: &str,
        duration_seconds: Option<i32>,
    ) -> Result<Credentials> {
        self.calls.lock().unwrap().push(AssumeCall {
            principal_arn: principal_arn.to_string(),
            role_arn: role_arn.to_string(),
            saml_assertion: saml_assertion.to_string(),
            duration_seconds,
        });

        Ok(Credentials {
            access_key_id: "ASIATESTKEY".to_string(),
            secret_access_key: "test-secret".to_string(),
            session_token: "test-session-token".to_string(),
            expiration: DateTime::from_secs(1_900_000_000),
        })
    }
}

/// Settings pointing both Okta and the Duo relay at `server`.
pub fn settings(server: &MockServer) -> Settings {
    Settings {
        okta_host: server.address().to_string(),
        okta_username: "jane@example.com".to_string(),
        okta_password: "hunter2".to_string(),
        okta_app_path: APP_PATH.to_string(),
        duo_device: "phone1".to_string(),
        okta_session_id: None,
        role: None,
        session_duration_hours: None,
    }
}

pub fn provider(settings: Settings, sts: RecordingAssumer) -> Provider<RecordingAssumer> {
    Provider::with_scheme(settings, reqwest::Client::new(), sts, Scheme::Http)
}

pub fn encoded_assertion(roles: &[&str]) -> String {
    let values = roles
        .iter()
        .map(|v| format!("<saml2:AttributeValue>{v}</saml2:AttributeValue>"))
        .collect::<String>();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol">
  <saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
    <saml2:AttributeStatement>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/Role">{values}</saml2:Attribute>
    </saml2:AttributeStatement>
  </saml2:Assertion>
</saml2p:Response>"#
    );
    STANDARD.encode(xml)
}

/// The auto-submit page Okta serves for the AWS app.
pub fn saml_form(encoded: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><body onload="document.forms[0].submit()">
  <form id="appForm" action="https://signin.aws.amazon.com/saml" method="POST">
    <input name="SAMLResponse" type="hidden" value="{encoded}"/>
    <input name="RelayState" type="hidden" value=""/>
  </form>
</body></html>"#
    )
}

pub fn login_page() -> String {
    r#"<html><body><form id="login"><input name="username"/></form></body></html>"#.to_string()
}

pub fn duo_status(response: Value) -> Value {
    json!({"stat": "OK", "response": response})
}

pub fn pending_status() -> Value {
    duo_status(json!({"status": "Pushed a login request to your device...", "status_code": "pushed"}))
}

pub fn approved_status() -> Value {
    duo_status(json!({
        "result": "SUCCESS",
        "result_url": format!("/frame/status/{TXID}"),
        "status": "Success. Logging you in...",
        "status_code": "allow"
    }))
}

pub fn denied_status() -> Value {
    duo_status(json!({
        "result": "FAILURE",
        "status": "Login request denied.",
        "status_code": "deny"
    }))
}

/// Serve the app page for `session_id`.
pub async fn mount_app_page(server: &MockServer, session_id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(APP_PATH))
        .and(header("cookie", format!("sid={session_id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Okta authn, both verify calls, the Duo callback and session creation.
pub async fn mount_okta(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/authn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateToken": STATE_TOKEN,
            "status": "MFA_REQUIRED",
            "_embedded": {"factors": [{"id": FACTOR_ID, "factorType": "web", "provider": "DUO"}]}
        })))
        .mount(server)
        .await;

    // The first verify hands out the Duo challenge, the second the token.
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/authn/factors/{FACTOR_ID}/verify")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateToken": STATE_TOKEN,
            "status": "MFA_CHALLENGE",
            "_embedded": {"factor": {"_embedded": {"verification": {
                "host": server.address().to_string(),
                "signature": SIGNATURE,
                "_links": {"complete": {"href": callback_url(server)}}
            }}}}
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/api/v1/authn/factors/{FACTOR_ID}/verify")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "sessionToken": SESSION_TOKEN
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(callback_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": SESSION_ID,
            "login": "jane@example.com",
            "status": "ACTIVE"
        })))
        .mount(server)
        .await;
}

/// Duo frame auth and prompt, then the given status responses in order, then
/// the completion cookie.
pub async fn mount_duo(server: &MockServer, statuses: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/frame/web/v1/auth"))
        .and(query_param("tx", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><form method="POST"><input type="hidden" name="sid" value="{DUO_SID}"></form></body></html>"#
        )))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/frame/prompt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(duo_status(json!({"txid": TXID}))),
        )
        .mount(server)
        .await;

    for status in statuses {
        Mock::given(method("POST"))
            .and(path("/frame/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path(format!("/frame/status/{TXID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(duo_status(json!({
                "cookie": DUO_COOKIE,
                "parent": "http://0.0.0.0:3000/duo"
            }))),
        )
        .mount(server)
        .await;
}

pub fn callback_path() -> String {
    format!("/api/v1/authn/factors/{FACTOR_ID}/lifecycle/duoCallback")
}

pub fn callback_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), callback_path())
}

pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}

pub fn form_fields(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

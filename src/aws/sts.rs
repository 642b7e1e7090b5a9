use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::Client as StsClient;
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::{debug, info};

use super::Credentials;
use crate::constants::DEFAULT_AWS_REGION;
use crate::error::{Error, Result};

/// The single STS operation the login flow depends on.
#[async_trait]
pub trait SamlAssumer: Send + Sync {
    async fn assume_role_with_saml(
        &self,
        principal_arn: &str,
        role_arn: &str,
        saml_assertion: &str,
        duration_seconds: Option<i32>,
    ) -> Result<Credentials>;
}

/// [`SamlAssumer`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct StsSamlAssumer {
    client: StsClient,
}

impl StsSamlAssumer {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration.
    /// Priority: ENV vars -> Config file -> EC2 metadata -> DEFAULT_AWS_REGION
    pub async fn from_env() -> Self {
        let loaded = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let config = match loaded.region() {
            Some(region) => {
                debug!("Using region: {}", region);
                loaded
            }
            None => {
                debug!(
                    "No region configured, using default {} for STS",
                    DEFAULT_AWS_REGION
                );
                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(DEFAULT_AWS_REGION))
                    .load()
                    .await
            }
        };

        Self::new(StsClient::new(&config))
    }
}

#[async_trait]
impl SamlAssumer for StsSamlAssumer {
    async fn assume_role_with_saml(
        &self,
        principal_arn: &str,
        role_arn: &str,
        saml_assertion: &str,
        duration_seconds: Option<i32>,
    ) -> Result<Credentials> {
        info!("Calling AWS STS AssumeRoleWithSAML");
        debug!("Role ARN: {}", role_arn);
        debug!("Principal ARN: {}", principal_arn);

        let response = self
            .client
            .assume_role_with_saml()
            .role_arn(role_arn)
            .principal_arn(principal_arn)
            .saml_assertion(saml_assertion)
            .set_duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| Error::Sts(DisplayErrorContext(&e).to_string()))?;

        let sts_creds = response
            .credentials()
            .ok_or_else(|| Error::Sts("AWS STS returned no credentials".to_string()))?;

        Ok(Credentials {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration: *sts_creds.expiration(),
        })
    }
}

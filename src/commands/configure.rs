use anyhow::Result;
use clap::Args;

use crate::config;

// Prompts for the Okta host, username and app path, the Duo device, the
// default role and the session duration. The password is never stored.
#[derive(Debug, Clone, Args)]
pub struct ConfigureCommand {}

impl ConfigureCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        config::configure_interactive(profile).await
    }
}

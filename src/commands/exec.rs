use anyhow::{Context, Result, bail};
use aws_smithy_types::date_time::Format;
use clap::Args;
use std::{env, process::Command, time::Duration};
use tokio::{signal, time};
use tracing::{debug, info};

use crate::{
    aws::{Credentials, StsSamlAssumer},
    cli::LoginArgs,
    config,
    constants::{DEFAULT_LOGIN_TIMEOUT, ENV_PREFIX, OKTA_SESSION_ID_ENV},
    provider::Provider,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Args)]
pub struct ExecCommand {
    #[arg(
        long,
        env = "AWS_OKTA_DUO_SAVE_SESSION_CMD",
        value_delimiter = ',',
        help = "A process to run after acquiring a new Okta session ID, which it receives as OKTA_SESSION_ID"
    )]
    pub save_session_cmd: Vec<String>,

    #[arg(
        long,
        env = "AWS_OKTA_DUO_TIMEOUT_SECS",
        default_value_t = DEFAULT_LOGIN_TIMEOUT.as_secs(),
        help = "Give up if credentials are not acquired within this many seconds"
    )]
    pub timeout_secs: u64,

    #[arg(
        required = true,
        trailing_var_arg = true,
        value_name = "CMD",
        help = "Command to run, after `--`"
    )]
    pub command: Vec<String>,
}

impl ExecCommand {
    pub async fn execute(self, profile: &str, login: &LoginArgs) -> Result<()> {
        let settings = config::load_settings(profile, login)
            .await
            .with_context(|| format!("Failed to load settings for profile '{profile}'"))?;
        let cached_session_id = settings.okta_session_id.clone();

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let sts = StsSamlAssumer::from_env().await;
        let provider = Provider::new(settings, http, sts);

        // Dropping the flow on timeout or Ctrl-C aborts the outstanding request.
        let result = tokio::select! {
            result = time::timeout(Duration::from_secs(self.timeout_secs), provider.get_credentials()) => {
                result
                    .context("Timed out waiting for Okta/Duo authentication")?
                    .context("Failed to acquire AWS credentials")?
            }
            _ = signal::ctrl_c() => bail!("Interrupted before AWS credentials were acquired"),
        };

        info!(
            "Acquired credentials for {}, expiring at {}",
            result.role.role_arn,
            result
                .credentials
                .expiration
                .fmt(Format::DateTime)
                .unwrap_or_else(|_| "unknown".to_string())
        );

        let is_new_session = cached_session_id.as_deref() != Some(result.okta_session_id.as_str());
        if is_new_session && !self.save_session_cmd.is_empty() {
            let mut save = save_session_command(&self.save_session_cmd, &result.okta_session_id)?;
            save.spawn()
                .with_context(|| format!("Failed to start {}", self.save_session_cmd[0]))?;
        }

        let child = child_command(&self.command, &result.credentials)?;
        launch(child, &self.command[0])
    }
}

fn save_session_command(save_session_cmd: &[String], session_id: &str) -> Result<Command> {
    let (program, args) = save_session_cmd
        .split_first()
        .context("Save-session command is empty")?;

    let mut command = Command::new(program);
    command.args(args).env(OKTA_SESSION_ID_ENV, session_id);
    Ok(command)
}

/// Build the command to run with the acquired credentials. This tool's own
/// `AWS_OKTA_DUO*` variables are not passed on.
fn child_command(command: &[String], credentials: &Credentials) -> Result<Command> {
    let (program, args) = command.split_first().context("No command to run")?;

    let mut child = Command::new(program);
    child.args(args);

    for (key, _) in env::vars_os() {
        if key.to_string_lossy().starts_with(ENV_PREFIX) {
            child.env_remove(&key);
        }
    }

    child
        .env("AWS_ACCESS_KEY_ID", &credentials.access_key_id)
        .env("AWS_SECRET_ACCESS_KEY", &credentials.secret_access_key)
        .env("AWS_SESSION_TOKEN", &credentials.session_token);

    Ok(child)
}

#[cfg(unix)]
fn launch(mut child: Command, program: &str) -> Result<()> {
    use std::os::unix::process::CommandExt;

    debug!("Replacing process with {}", program);
    // exec only returns on failure
    let err = child.exec();
    Err(err).with_context(|| format!("Failed to execute {program}"))
}

#[cfg(not(unix))]
fn launch(mut child: Command, program: &str) -> Result<()> {
    debug!("Running {}", program);
    let status = child
        .status()
        .with_context(|| format!("Failed to execute {program}"))?;
    std::process::exit(status.code().unwrap_or(1));
}

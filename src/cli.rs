use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::commands::{CompletionsCommand, ConfigureCommand, ExecCommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "aws-okta-duo", version, about = "A CLI tool that automates creating AWS sessions via Okta + Duo", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        env = "AWS_OKTA_DUO_PROFILE",
        help = "Config profile to read Okta settings from"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(flatten)]
    pub login: LoginArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Login settings. Each flag falls back to its `AWS_OKTA_DUO_*` environment
/// variable and then to the config profile.
#[derive(Debug, Clone, Default, Args)]
pub struct LoginArgs {
    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_OKTA_SESSION_ID",
        hide_env_values = true,
        help = "An existing Okta session ID to try to use instead of authenticating"
    )]
    pub okta_session_id: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_OKTA_HOST",
        help = "The host that your Okta organization is served from"
    )]
    pub okta_host: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_OKTA_USERNAME",
        help = "Your Okta username"
    )]
    pub okta_username: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_OKTA_PASSWORD",
        hide_env_values = true,
        help = "Your Okta password (prompted for when absent)"
    )]
    pub okta_password: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_OKTA_APP_PATH",
        help = "The embed URL of the Okta app to log into"
    )]
    pub okta_app_path: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_DUO_DEVICE",
        help = "The device that Duo pushes should be sent to [default: phone1]"
    )]
    pub duo_device: Option<String>,

    #[arg(
        short = 'r',
        long,
        global = true,
        env = "AWS_OKTA_DUO_ROLE",
        help = "AWS IAM role name to assume when the assertion grants several"
    )]
    pub role: Option<String>,

    #[arg(
        long,
        global = true,
        env = "AWS_OKTA_DUO_SESSION_DURATION_HOURS",
        value_parser = clap::value_parser!(u8).range(1..=12),
        help = "Lifetime of the AWS credentials in hours (1-12)"
    )]
    pub session_duration_hours: Option<u8>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Run a command with temporary AWS credentials in its environment")]
    Exec(ExecCommand),
    #[command(
        about = "Store Okta and Duo settings in a config profile",
        long_about = "Store Okta and Duo settings in a config profile.\n\n\
            Prompts for okta_host, okta_username, okta_app_path, duo_device, role and \
            session_duration_hours and saves them under [default] or [profile NAME]. \
            The Okta password is never stored."
    )]
    Configure(ConfigureCommand),
    #[command(about = "Generate shell completion scripts for aws-okta-duo")]
    Completions(CompletionsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let profile = self.profile;

        match self.command {
            Commands::Exec(cmd) => cmd.execute(&profile, &self.login).await,
            Commands::Configure(cmd) => cmd.execute(&profile).await,
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}

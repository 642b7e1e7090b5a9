use std::{env, path::PathBuf, time::Duration};

use dirs;

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "aws-okta-duo";

/// Profile file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config";

/// Prefix shared by every environment variable this tool reads
pub const ENV_PREFIX: &str = "AWS_OKTA_DUO";

/// Overrides the profile file location
pub const CONFIG_FILE_ENV: &str = "AWS_OKTA_DUO_CONFIG_FILE";

/// Environment variable handed to the save-session command
pub const OKTA_SESSION_ID_ENV: &str = "OKTA_SESSION_ID";

/// Duo device that receives pushes when none is configured
pub const DEFAULT_DUO_DEVICE: &str = "phone1";

/// SAML attribute carrying the `PrincipalARN,RoleARN` pair
pub const AWS_ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

pub const MIN_SESSION_DURATION_HOURS: u8 = 1;

pub const MAX_SESSION_DURATION_HOURS: u8 = 12;

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Upper bound on the whole login, including waiting for push approval
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Get the profile file path
/// Respects AWS_OKTA_DUO_CONFIG_FILE if set, otherwise ~/.config/aws-okta-duo/config
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| {
        home.join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}

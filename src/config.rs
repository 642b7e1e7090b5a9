use anyhow::{Context, Result, bail};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use ini::{Ini, Properties};
use std::path::PathBuf;
use tokio::fs;

use crate::cli::LoginArgs;
use crate::constants::{
    self, DEFAULT_DUO_DEVICE, MAX_SESSION_DURATION_HOURS, MIN_SESSION_DURATION_HOURS,
};

/// Values stored for one profile in the config file. The password is never
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub okta_host: Option<String>,
    pub okta_username: Option<String>,
    pub okta_app_path: Option<String>,
    pub duo_device: Option<String>,
    pub role: Option<String>,
    pub session_duration_hours: Option<u8>,
}

impl Profile {
    fn from_ini_section(section: &Properties) -> Result<Self> {
        let get = |key: &str| non_empty(section.get(key));

        let session_duration_hours = get("session_duration_hours")
            .map(|s| {
                s.parse::<u8>()
                    .with_context(|| format!("Invalid session_duration_hours '{s}'"))
            })
            .transpose()?;

        Ok(Self {
            okta_host: get("okta_host"),
            okta_username: get("okta_username"),
            okta_app_path: get("okta_app_path"),
            duo_device: get("duo_device"),
            role: get("role"),
            session_duration_hours,
        })
    }

    fn save_to_ini(&self, ini: &mut Ini, profile: &str) {
        let section = section_name(profile);
        let fields = [
            ("okta_host", self.okta_host.clone()),
            ("okta_username", self.okta_username.clone()),
            ("okta_app_path", self.okta_app_path.clone()),
            ("duo_device", self.duo_device.clone()),
            ("role", self.role.clone()),
            (
                "session_duration_hours",
                self.session_duration_hours.map(|h| h.to_string()),
            ),
        ];

        for (key, value) in fields {
            match value {
                Some(value) => ini.set_to(Some(section.as_str()), key.to_string(), value),
                None => {
                    ini.delete_from(Some(section.as_str()), key);
                }
            }
        }
    }
}

/// Everything the login flow needs, resolved once and passed around by value.
#[derive(Clone)]
pub struct Settings {
    pub okta_host: String,
    pub okta_username: String,
    pub okta_password: String,
    pub okta_app_path: String,
    pub duo_device: String,
    /// Previously issued Okta session ID to try before a full login
    pub okta_session_id: Option<String>,
    pub role: Option<String>,
    pub session_duration_hours: Option<u8>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("okta_host", &self.okta_host)
            .field("okta_username", &self.okta_username)
            .field("okta_password", &"<redacted>")
            .field("okta_app_path", &self.okta_app_path)
            .field("duo_device", &self.duo_device)
            .field(
                "okta_session_id",
                &self.okta_session_id.as_ref().map(|_| "<redacted>"),
            )
            .field("role", &self.role)
            .field("session_duration_hours", &self.session_duration_hours)
            .finish()
    }
}

impl Settings {
    /// Merge command-line/environment values over the stored profile.
    /// `password` is only called when no password was supplied.
    pub fn resolve(
        args: &LoginArgs,
        profile: Option<&Profile>,
        password: impl FnOnce() -> Result<String>,
    ) -> Result<Self> {
        let stored = profile.cloned().unwrap_or_default();
        let pick = |arg: &Option<String>, stored: Option<String>| {
            non_empty(arg.as_deref()).or(stored)
        };

        let okta_host = pick(&args.okta_host, stored.okta_host)
            .context("Okta host is required (--okta-host, AWS_OKTA_DUO_OKTA_HOST or `configure`)")?;
        let okta_username = pick(&args.okta_username, stored.okta_username).context(
            "Okta username is required (--okta-username, AWS_OKTA_DUO_OKTA_USERNAME or `configure`)",
        )?;
        let okta_app_path = pick(&args.okta_app_path, stored.okta_app_path).context(
            "Okta app path is required (--okta-app-path, AWS_OKTA_DUO_OKTA_APP_PATH or `configure`)",
        )?;
        let duo_device = pick(&args.duo_device, stored.duo_device)
            .unwrap_or_else(|| DEFAULT_DUO_DEVICE.to_string());
        let role = pick(&args.role, stored.role);

        let session_duration_hours = args.session_duration_hours.or(stored.session_duration_hours);
        if let Some(hours) = session_duration_hours {
            validate_session_duration(hours)?;
        }

        let okta_password = match non_empty(args.okta_password.as_deref()) {
            Some(password) => password,
            None => password()?,
        };

        Ok(Self {
            okta_host,
            okta_username,
            okta_password,
            okta_app_path,
            duo_device,
            okta_session_id: non_empty(args.okta_session_id.as_deref()),
            role,
            session_duration_hours,
        })
    }

    pub fn session_duration_seconds(&self) -> Option<i32> {
        self.session_duration_hours.map(|h| i32::from(h) * 3600)
    }
}

/// Resolve settings for `profile`, prompting for the password if needed.
pub async fn load_settings(profile: &str, args: &LoginArgs) -> Result<Settings> {
    let stored = load(profile).await?;
    Settings::resolve(args, stored.as_ref(), prompt_password)
}

fn prompt_password() -> Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Okta password")
        .interact()
        .context("Failed to read Okta password")
}

/// Load a stored profile. A missing file or missing `default` section is not
/// an error since every value can come from flags or the environment.
pub async fn load(profile: &str) -> Result<Option<Profile>> {
    let path = get_config_path()?;
    if !fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(None);
    }

    let ini = Ini::load_from_file(&path)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;

    match ini.section(Some(section_name(profile))) {
        Some(section) => Profile::from_ini_section(section)
            .map(Some)
            .with_context(|| format!("Profile '{profile}' in {} is invalid", path.display())),
        None if profile == "default" => Ok(None),
        None => bail!("Profile '{profile}' not found in {}", path.display()),
    }
}

pub async fn save(profile: &str, stored: &Profile) -> Result<()> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut ini = if path.exists() {
        Ini::load_from_file(&path).with_context(|| {
            format!("Refusing to overwrite unreadable config file {}", path.display())
        })?
    } else {
        Ini::new()
    };

    stored.save_to_ini(&mut ini, profile);

    ini.write_to_file(&path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

pub async fn configure_interactive(profile: &str) -> Result<()> {
    println!("Configuring aws-okta-duo for profile: {profile}");

    let existing = load(profile).await.ok().flatten();
    if existing.is_some() {
        println!("Press Enter to keep current values, or type new values.");
    }
    println!();

    let theme = ColorfulTheme::default();
    let current = existing.unwrap_or_default();

    let required = |prompt: &str, current: Option<String>| -> Result<String> {
        let mut input = Input::<String>::with_theme(&theme).with_prompt(prompt);
        if let Some(value) = current {
            input = input.default(value);
        }
        input
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("A value is required")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .with_context(|| format!("Failed to read {prompt}"))
    };

    let okta_host = required("Okta host (e.g. acme.okta.com)", current.okta_host)?;
    let okta_username = required("Okta username", current.okta_username)?;
    let okta_app_path = required("Okta AWS app embed path", current.okta_app_path)?;

    let duo_device = Input::<String>::with_theme(&theme)
        .with_prompt("Duo device")
        .default(
            current
                .duo_device
                .unwrap_or_else(|| DEFAULT_DUO_DEVICE.to_string()),
        )
        .interact_text()
        .context("Failed to read Duo device")?;

    let role = Input::<String>::with_theme(&theme)
        .with_prompt("Role name (empty to pick automatically)")
        .default(current.role.unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read role name")?;

    let session_duration_hours = Input::<String>::with_theme(&theme)
        .with_prompt("Session duration hours (1-12, empty for the STS default)")
        .default(
            current
                .session_duration_hours
                .map(|h| h.to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                return Ok(());
            }
            match input.trim().parse::<u8>() {
                Ok(hours) if validate_session_duration(hours).is_ok() => Ok(()),
                _ => Err("Please enter a value between 1 and 12"),
            }
        })
        .interact_text()
        .context("Failed to read session duration")?;

    let stored = Profile {
        okta_host: Some(okta_host),
        okta_username: Some(okta_username),
        okta_app_path: Some(okta_app_path),
        duo_device: Some(duo_device),
        role: non_empty(Some(role.as_str())),
        session_duration_hours: session_duration_hours.trim().parse().ok(),
    };

    save(profile, &stored).await?;

    println!("\nConfiguration saved successfully.");
    Ok(())
}

fn validate_session_duration(hours: u8) -> Result<()> {
    if !(MIN_SESSION_DURATION_HOURS..=MAX_SESSION_DURATION_HOURS).contains(&hours) {
        bail!(
            "Session duration must be between {MIN_SESSION_DURATION_HOURS} and {MAX_SESSION_DURATION_HOURS} hours, got {hours}"
        );
    }
    Ok(())
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_config_path().context("Failed to determine config file path")
}

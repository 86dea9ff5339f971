// Profile resolution: which auth mode a named profile uses
use crate::aws_config::AwsConfigFile;
use crate::error::{CredsError, Result};
use crate::models::AuthMode;
use std::collections::HashMap;
use std::path::PathBuf;

const DEFAULT_SOURCE_PROFILE: &str = "default";

/// A profile listed alongside its resolved mode, or why it couldn't resolve
#[derive(Debug)]
pub struct ProfileSummary {
    pub name: String,
    pub auth_mode: Result<AuthMode>,
}

pub struct ProfileResolver {
    config_file: PathBuf,
}

impl ProfileResolver {
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
        }
    }

    /// Determine the auth mode for `profile_name`.
    ///
    /// The config file is re-read on every call so edits are picked up
    /// immediately. `sso_start_url` wins when a profile has both SSO and
    /// role settings.
    pub fn resolve_auth_mode(&self, profile_name: &str) -> Result<AuthMode> {
        let config = AwsConfigFile::load(&self.config_file)?;
        resolve_from_config(&config, profile_name)
    }

    /// Every profile in the config file with its resolution outcome. One bad
    /// profile doesn't fail the listing.
    pub fn list_profiles(&self) -> Result<Vec<ProfileSummary>> {
        let config = AwsConfigFile::load(&self.config_file)?;
        Ok(config
            .profile_names()
            .into_iter()
            .map(|name| {
                let auth_mode = resolve_from_config(&config, &name);
                ProfileSummary { name, auth_mode }
            })
            .collect())
    }
}

fn resolve_from_config(config: &AwsConfigFile, profile_name: &str) -> Result<AuthMode> {
    let section = config
        .profile(profile_name)
        .ok_or_else(|| CredsError::ProfileNotFound(profile_name.to_string()))?;

    let session = match value(section, "sso_session") {
        Some(session_name) => Some(config.sso_session(session_name).ok_or_else(|| {
            CredsError::misconfigured(
                profile_name,
                format!("sso_session '{}' has no [sso-session] section", session_name),
            )
        })?),
        None => None,
    };

    if let Some(start_url) = sso_value(section, session, "sso_start_url") {
        let mut missing = Vec::new();
        let region = sso_value(section, session, "sso_region");
        let role_name = value(section, "sso_role_name");
        let account_id = value(section, "sso_account_id");
        for (key, v) in [
            ("sso_region", region),
            ("sso_role_name", role_name),
            ("sso_account_id", account_id),
        ] {
            if v.is_none() {
                missing.push(key);
            }
        }
        if !missing.is_empty() {
            return Err(CredsError::misconfigured(
                profile_name,
                format!("SSO profile is missing {}", missing.join(", ")),
            ));
        }

        return Ok(AuthMode::Sso {
            start_url: start_url.to_string(),
            region: region.unwrap_or_default().to_string(),
            role_name: role_name.unwrap_or_default().to_string(),
            account_id: account_id.unwrap_or_default().to_string(),
        });
    }

    if let Some(role_arn) = value(section, "role_arn") {
        return Ok(AuthMode::AssumeRole {
            role_arn: normalize_role_arn(profile_name, role_arn)?,
            mfa_serial: value(section, "mfa_serial").map(str::to_string),
            source_profile: value(section, "source_profile")
                .unwrap_or(DEFAULT_SOURCE_PROFILE)
                .to_string(),
        });
    }

    Err(CredsError::misconfigured(
        profile_name,
        "neither sso_start_url nor role_arn is set",
    ))
}

fn value<'a>(section: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Profile-level keys take precedence over the referenced sso-session
fn sso_value<'a>(
    section: &'a HashMap<String, String>,
    session: Option<&'a HashMap<String, String>>,
    key: &str,
) -> Option<&'a str> {
    value(section, key).or_else(|| session.and_then(|s| value(s, key)))
}

/// Rebuild a role ARN as `arn:aws:sts::<account>:role/<name>` from the
/// account id (5th `:` field) and everything after `role/`.
pub fn normalize_role_arn(profile_name: &str, role_arn: &str) -> Result<String> {
    let account_id = role_arn
        .split(':')
        .nth(4)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            CredsError::misconfigured(
                profile_name,
                format!("role_arn '{}' has no account id", role_arn),
            )
        })?;

    let role_name = role_arn
        .split_once("role/")
        .map(|(_, name)| name)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            CredsError::misconfigured(
                profile_name,
                format!("role_arn '{}' has no role name", role_arn),
            )
        })?;

    Ok(format!("arn:aws:sts::{}:role/{}", account_id, role_name))
}

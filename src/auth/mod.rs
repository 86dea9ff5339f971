// SSO access token lookup and the interactive login flow
mod token_cache;

pub use token_cache::TokenCache;

use crate::error::{CredsError, Result};
use crate::models::SsoToken;
use crate::prompt::Prompter;
use std::path::PathBuf;
use std::process::Command;

/// Something that can populate the SSO token cache for a profile
#[cfg_attr(test, mockall::automock)]
pub trait SsoLogin {
    /// Run the login and block until it finishes
    fn login(&self, profile_name: &str) -> Result<()>;
}

/// Shells out to `aws sso login --profile <name>`, which opens the browser
/// device authorization flow and writes the token cache file itself.
/// The child is pointed at the same config file the profile was resolved from.
pub struct AwsCliLogin {
    command: String,
    config_file: PathBuf,
}

impl AwsCliLogin {
    pub fn new(command: impl Into<String>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            config_file: config_file.into(),
        }
    }
}

impl SsoLogin for AwsCliLogin {
    fn login(&self, profile_name: &str) -> Result<()> {
        tracing::info!(
            "Running '{} sso login --profile {}'",
            self.command,
            profile_name
        );

        let status = Command::new(&self.command)
            .args(["sso", "login", "--profile", profile_name])
            .env("AWS_CONFIG_FILE", &self.config_file)
            .status()
            .map_err(|e| {
                CredsError::LoginFailed(format!("could not run '{}': {}", self.command, e))
            })?;

        if !status.success() {
            return Err(CredsError::LoginFailed(format!(
                "'{} sso login' exited with {}",
                self.command,
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            )));
        }

        Ok(())
    }
}

/// High-level SSO token interface
pub struct AuthManager {
    token_cache: TokenCache,
    login: Box<dyn SsoLogin>,
}

impl AuthManager {
    pub fn new(token_cache: TokenCache, login: Box<dyn SsoLogin>) -> Self {
        Self { token_cache, login }
    }

    /// Get a cached token if one is valid, None if expired or not found
    pub fn cached_token(&self, start_url: &str) -> Result<Option<SsoToken>> {
        self.token_cache.find_token(start_url)
    }

    /// Return a cached token, running the interactive login when there is none
    pub fn ensure_token(
        &self,
        profile_name: &str,
        start_url: &str,
        prompter: &dyn Prompter,
    ) -> Result<SsoToken> {
        if let Some(token) = self.cached_token(start_url)? {
            return Ok(token);
        }
        self.interactive_login(profile_name, start_url, prompter)
    }

    /// Ask before launching the external login, then re-scan the token cache.
    /// Declining, a failed login, or a login that leaves no usable token all
    /// end in `TokenUnavailable`.
    pub fn interactive_login(
        &self,
        profile_name: &str,
        start_url: &str,
        prompter: &dyn Prompter,
    ) -> Result<SsoToken> {
        let message = format!(
            "No valid SSO access token for {} (profile {}).\n\
             Press RETURN to request a new token. This will open a web browser.\n\
             You can also do this manually with: aws sso login --profile {}",
            start_url, profile_name, profile_name
        );

        if !prompter.confirm(&message)? {
            tracing::info!("SSO login declined for {}", start_url);
            return Err(CredsError::TokenUnavailable(start_url.to_string()));
        }

        if let Err(e) = self.login.login(profile_name) {
            tracing::warn!("SSO login for profile {} failed: {}", profile_name, e);
            return Err(CredsError::TokenUnavailable(start_url.to_string()));
        }

        let token = self
            .cached_token(start_url)?
            .ok_or_else(|| CredsError::TokenUnavailable(start_url.to_string()))?;

        tracing::info!(
            "SSO access token valid for all profiles using {} (expires in {} minutes)",
            start_url,
            token.expires_in_minutes()
        );
        Ok(token)
    }
}

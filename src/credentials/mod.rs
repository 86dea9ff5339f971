// Credential resolution, caching and refresh
mod cache;
mod fetcher;

pub use cache::{CacheLookup, CredentialCache};
pub use fetcher::{AwsCredentialService, CredentialService, MfaChallenge, ServiceResult};

#[cfg(test)]
pub use fetcher::MockCredentialService;

use crate::auth::{AuthManager, AwsCliLogin, SsoLogin, TokenCache};
use crate::config::Settings;
use crate::error::{CredsError, Result, ServiceError};
use crate::models::{AuthMode, CredentialRequest, Credentials};
use crate::profile::ProfileResolver;
use crate::prompt::{Prompter, TerminalPrompter};
use chrono::Utc;

/// AWS limit on role session name length
const MAX_SESSION_NAME_LEN: usize = 64;

/// Resolves, caches and refreshes temporary credentials for named profiles
pub struct CredentialManager {
    settings: Settings,
    resolver: ProfileResolver,
    auth: AuthManager,
    cache: CredentialCache,
    service: Box<dyn CredentialService>,
    prompter: Box<dyn Prompter>,
}

impl CredentialManager {
    pub fn new(
        settings: Settings,
        service: Box<dyn CredentialService>,
        login: Box<dyn SsoLogin>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            resolver: ProfileResolver::new(&settings.aws_config_file),
            auth: AuthManager::new(TokenCache::new(&settings.sso_cache_dir), login),
            cache: CredentialCache::new(&settings.credential_cache_dir),
            settings,
            service,
            prompter,
        }
    }

    /// Wire up the real AWS SDK, `aws sso login` and terminal prompts
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let service =
            AwsCredentialService::new(&settings.sts_region, &settings.aws_config_file)?;
        let login = AwsCliLogin::new(
            settings.login_command.clone(),
            settings.aws_config_file.clone(),
        );
        Ok(Self::new(
            settings,
            Box::new(service),
            Box::new(login),
            Box::new(TerminalPrompter),
        ))
    }

    pub fn service(&self) -> &dyn CredentialService {
        self.service.as_ref()
    }

    /// Temporary credentials for `profile_name`.
    ///
    /// A cached entry is returned if it passes a live identity probe. A
    /// missing, unreadable or rejected entry is replaced by exactly one fresh
    /// fetch. Probe failures other than a credential rejection are returned
    /// as errors rather than triggering a fetch.
    pub fn get_credentials(&self, profile_name: &str) -> Result<Credentials> {
        let mode = self.resolver.resolve_auth_mode(profile_name)?;
        tracing::debug!("Profile {} uses {} credentials", profile_name, mode.kind());

        let request = self.build_request(profile_name, &mode)?;
        let key = CredentialCache::cache_key(&request);

        match self.cache.load(&key) {
            CacheLookup::Hit(credentials) => match self.service.get_caller_identity(&credentials) {
                Ok(identity) => {
                    tracing::debug!(
                        "Cached credentials {} are valid for {}",
                        key,
                        identity.arn
                    );
                    return Ok(credentials);
                }
                Err(ServiceError::Rejected { code, .. }) => {
                    tracing::info!("Cached credentials {} rejected ({}), refreshing", key, code);
                }
                Err(e) => return Err(e.into_creds_error("sts:GetCallerIdentity")),
            },
            CacheLookup::Miss => {
                tracing::debug!("No cached credentials for {}", key);
            }
            CacheLookup::Corrupt(reason) => {
                tracing::warn!("Ignoring unreadable credential cache entry: {}", reason);
            }
        }

        let credentials = self.fetch(profile_name, &mode, &request)?;

        if let Err(e) = self.cache.store(&key, &credentials) {
            tracing::warn!("Could not cache credentials for {}: {}", profile_name, e);
        } else {
            tracing::debug!(
                "Cached credentials at {}",
                self.cache.cache_file_path(&key).display()
            );
        }

        Ok(credentials)
    }

    /// The request AWS will be sent for this mode. SSO needs a valid access
    /// token, which may mean an interactive login.
    fn build_request(&self, profile_name: &str, mode: &AuthMode) -> Result<CredentialRequest> {
        match mode {
            AuthMode::Sso {
                start_url,
                role_name,
                account_id,
                ..
            } => {
                let token =
                    self.auth
                        .ensure_token(profile_name, start_url, self.prompter.as_ref())?;
                Ok(CredentialRequest::Sso {
                    role_name: role_name.clone(),
                    account_id: account_id.clone(),
                    access_token: token.access_token,
                })
            }
            AuthMode::AssumeRole { role_arn, .. } => Ok(CredentialRequest::AssumeRole {
                role_arn: role_arn.clone(),
                role_session_name: session_name(&self.settings.session_name_prefix),
                duration_seconds: self.settings.session_duration_seconds,
            }),
        }
    }

    fn fetch(
        &self,
        profile_name: &str,
        mode: &AuthMode,
        request: &CredentialRequest,
    ) -> Result<Credentials> {
        match (mode, request) {
            (
                AuthMode::Sso {
                    start_url, region, ..
                },
                CredentialRequest::Sso {
                    role_name,
                    account_id,
                    access_token,
                },
            ) => self.fetch_sso(
                profile_name,
                start_url,
                region,
                role_name,
                account_id,
                access_token,
            ),
            (
                AuthMode::AssumeRole {
                    mfa_serial,
                    source_profile,
                    ..
                },
                CredentialRequest::AssumeRole {
                    role_arn,
                    role_session_name,
                    duration_seconds,
                },
            ) => self.fetch_assumed_role(
                source_profile,
                mfa_serial.as_deref(),
                role_arn,
                role_session_name,
                *duration_seconds,
            ),
            _ => Err(CredsError::misconfigured(
                profile_name,
                "credential request does not match the profile's auth mode",
            )),
        }
    }

    /// sso:GetRoleCredentials. An unauthorized token gets one fresh login and
    /// one retry; a second rejection is fatal.
    fn fetch_sso(
        &self,
        profile_name: &str,
        start_url: &str,
        region: &str,
        role_name: &str,
        account_id: &str,
        access_token: &str,
    ) -> Result<Credentials> {
        tracing::info!(
            "Fetching SSO role credentials for {} in {}",
            role_name,
            account_id
        );

        match self
            .service
            .get_role_credentials(region, role_name, account_id, access_token)
        {
            Ok(credentials) => Ok(credentials),
            Err(ServiceError::Unauthorized(message)) => {
                tracing::warn!("SSO access token was rejected ({}), logging in again", message);
                let token =
                    self.auth
                        .interactive_login(profile_name, start_url, self.prompter.as_ref())?;
                self.service
                    .get_role_credentials(region, role_name, account_id, &token.access_token)
                    .map_err(|e| e.into_creds_error("sso:GetRoleCredentials"))
            }
            Err(e) => Err(e.into_creds_error("sso:GetRoleCredentials")),
        }
    }

    /// MFA-derived identity (never cached or returned), a who-am-I check on
    /// it, then the AssumeRole whose result is what gets cached
    fn fetch_assumed_role(
        &self,
        source_profile: &str,
        mfa_serial: Option<&str>,
        role_arn: &str,
        role_session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        let mfa = match mfa_serial {
            Some(serial) => {
                let code = self
                    .prompter
                    .read_secret(&format!("Enter MFA code for {}: ", serial))?;
                if code.is_empty() {
                    return Err(CredsError::Prompt("No MFA code entered".to_string()));
                }
                Some(MfaChallenge {
                    serial: serial.to_string(),
                    code,
                })
            }
            None => None,
        };

        tracing::info!("Assuming {} via source profile {}", role_arn, source_profile);

        let base = self
            .service
            .assume_role_from_profile(source_profile, role_arn, role_session_name, mfa)
            .map_err(|e| e.into_creds_error("sts:AssumeRole (source profile)"))?;

        let identity = self
            .service
            .get_caller_identity(&base)
            .map_err(|e| e.into_creds_error("sts:GetCallerIdentity"))?;
        tracing::debug!("Intermediate identity is {}", identity.arn);

        self.service
            .assume_role(&base, role_arn, role_session_name, duration_seconds)
            .map_err(|e| e.into_creds_error("sts:AssumeRole"))
    }
}

/// `<prefix>-<unix seconds>`, with the prefix clipped to fit the AWS length limit
pub fn session_name(prefix: &str) -> String {
    let suffix = format!("-{}", Utc::now().timestamp());
    let max_prefix = MAX_SESSION_NAME_LEN.saturating_sub(suffix.len());
    let prefix = &prefix[..floor_char_boundary(prefix, max_prefix.min(prefix.len()))];
    format!("{}{}", prefix, suffix)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests;

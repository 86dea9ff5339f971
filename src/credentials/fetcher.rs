use crate::error::{CredsError, Result, ServiceError};
use crate::models::{CallerIdentity, Credentials};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sso::operation::get_role_credentials::GetRoleCredentialsError;
use aws_sdk_sso::Client as SsoClient;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sts::Client as StsClient;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// STS error codes that mean "these credentials are no good" rather than
/// "something else went wrong"
const REJECTED_CREDENTIAL_CODES: &[&str] =
    &["ExpiredToken", "ExpiredTokenException", "InvalidClientTokenId"];

const CREDENTIALS_PROVIDER_NAME: &str = "prx-aws-creds";

/// MFA device and the one-time code read from the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaChallenge {
    pub serial: String,
    pub code: String,
}

/// The AWS endpoints the credential flows talk to
#[cfg_attr(test, mockall::automock)]
pub trait CredentialService {
    /// sso:GetRoleCredentials
    fn get_role_credentials(
        &self,
        sso_region: &str,
        role_name: &str,
        account_id: &str,
        access_token: &str,
    ) -> ServiceResult<Credentials>;

    /// sts:AssumeRole signed with the long-lived keys of `source_profile`,
    /// answering the MFA challenge when there is one
    fn assume_role_from_profile(
        &self,
        source_profile: &str,
        role_arn: &str,
        role_session_name: &str,
        mfa: Option<MfaChallenge>,
    ) -> ServiceResult<Credentials>;

    /// sts:GetCallerIdentity, the side-effect free "who am I" probe
    fn get_caller_identity(&self, credentials: &Credentials) -> ServiceResult<CallerIdentity>;

    /// sts:AssumeRole signed with `credentials`
    fn assume_role(
        &self,
        credentials: &Credentials,
        role_arn: &str,
        role_session_name: &str,
        duration_seconds: i32,
    ) -> ServiceResult<Credentials>;
}

/// `CredentialService` backed by the AWS SDK.
///
/// The SDK is async; each call blocks on a private current-thread runtime so
/// callers stay synchronous. Don't construct this from inside another tokio
/// runtime.
pub struct AwsCredentialService {
    runtime: Runtime,
    base_config: SdkConfig,
    sts_region: String,
    config_file: PathBuf,
}

impl AwsCredentialService {
    /// `config_file` is where source profiles are looked up, the same file
    /// the profile itself was resolved from
    pub fn new(sts_region: &str, config_file: &Path) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CredsError::Config(format!("Failed to start async runtime: {}", e)))?;

        // No ambient credential chain: every signed call is given its
        // credentials explicitly.
        let base_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(sts_region.to_string()))
                .no_credentials()
                .load(),
        );

        Ok(Self {
            runtime,
            base_config,
            sts_region: sts_region.to_string(),
            config_file: config_file.to_path_buf(),
        })
    }

    fn sts_client(&self, credentials: &Credentials) -> StsClient {
        let provider = aws_sdk_sts::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let config = aws_sdk_sts::config::Builder::from(&self.base_config)
            .credentials_provider(provider)
            .build();

        StsClient::from_conf(config)
    }

    fn sso_client(&self, sso_region: &str) -> SsoClient {
        let config = aws_sdk_sso::config::Builder::from(&self.base_config)
            .region(Region::new(sso_region.to_string()))
            .build();

        SsoClient::from_conf(config)
    }
}

impl CredentialService for AwsCredentialService {
    fn get_role_credentials(
        &self,
        sso_region: &str,
        role_name: &str,
        account_id: &str,
        access_token: &str,
    ) -> ServiceResult<Credentials> {
        tracing::debug!(
            account_id = account_id,
            role_name = role_name,
            sso_region = sso_region,
            "Calling sso:GetRoleCredentials"
        );

        let client = self.sso_client(sso_region);
        let response = self
            .runtime
            .block_on(
                client
                    .get_role_credentials()
                    .role_name(role_name)
                    .account_id(account_id)
                    .access_token(access_token)
                    .send(),
            )
            .map_err(classify_sso_error)?;

        let role_creds = response.role_credentials().ok_or_else(|| {
            ServiceError::Unavailable("No role_credentials in response".to_string())
        })?;

        let field = |value: Option<&str>, name: &str| {
            value.map(str::to_string).ok_or_else(|| {
                ServiceError::Unavailable(format!("No {} in role credentials", name))
            })
        };

        Ok(Credentials {
            access_key_id: field(role_creds.access_key_id(), "access_key_id")?,
            secret_access_key: field(role_creds.secret_access_key(), "secret_access_key")?,
            session_token: field(role_creds.session_token(), "session_token")?,
        })
    }

    fn assume_role_from_profile(
        &self,
        source_profile: &str,
        role_arn: &str,
        role_session_name: &str,
        mfa: Option<MfaChallenge>,
    ) -> ServiceResult<Credentials> {
        tracing::debug!(
            source_profile = source_profile,
            role_arn = role_arn,
            mfa = mfa.is_some(),
            "Calling sts:AssumeRole with source profile credentials"
        );

        let (serial, code) = match mfa {
            Some(challenge) => (Some(challenge.serial), Some(challenge.code)),
            None => (None, None),
        };

        let output = self.runtime.block_on(async {
            let config = aws_config::defaults(BehaviorVersion::latest())
                .profile_files(source_profile_files(&self.config_file))
                .profile_name(source_profile)
                .region(Region::new(self.sts_region.clone()))
                .load()
                .await;

            StsClient::new(&config)
                .assume_role()
                .role_arn(role_arn)
                .role_session_name(role_session_name)
                .set_serial_number(serial)
                .set_token_code(code)
                .send()
                .await
        });

        let output = output.map_err(|e| classify_sts_error("sts:AssumeRole", e))?;
        sts_credentials(output.credentials())
    }

    fn get_caller_identity(&self, credentials: &Credentials) -> ServiceResult<CallerIdentity> {
        let client = self.sts_client(credentials);
        let output = self
            .runtime
            .block_on(client.get_caller_identity().send())
            .map_err(|e| classify_sts_error("sts:GetCallerIdentity", e))?;

        Ok(CallerIdentity {
            account: output.account().unwrap_or_default().to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
            user_id: output.user_id().unwrap_or_default().to_string(),
        })
    }

    fn assume_role(
        &self,
        credentials: &Credentials,
        role_arn: &str,
        role_session_name: &str,
        duration_seconds: i32,
    ) -> ServiceResult<Credentials> {
        tracing::debug!(
            role_arn = role_arn,
            role_session_name = role_session_name,
            duration_seconds = duration_seconds,
            "Calling sts:AssumeRole"
        );

        let client = self.sts_client(credentials);
        let output = self
            .runtime
            .block_on(
                client
                    .assume_role()
                    .role_arn(role_arn)
                    .role_session_name(role_session_name)
                    .duration_seconds(duration_seconds)
                    .send(),
            )
            .map_err(|e| classify_sts_error("sts:AssumeRole", e))?;

        sts_credentials(output.credentials())
    }
}

fn sts_credentials(creds: Option<&aws_sdk_sts::types::Credentials>) -> ServiceResult<Credentials> {
    let creds = creds.ok_or_else(|| {
        ServiceError::Unavailable("STS AssumeRole returned empty credentials".to_string())
    })?;

    Ok(Credentials {
        access_key_id: creds.access_key_id().to_string(),
        secret_access_key: creds.secret_access_key().to_string(),
        session_token: creds.session_token().to_string(),
    })
}

/// Configured config file plus the default shared credentials file, which
/// is where a source profile's long-lived keys normally live
fn source_profile_files(config_file: &Path) -> ProfileFiles {
    ProfileFiles::builder()
        .with_file(ProfileFileKind::Config, config_file)
        .include_default_credentials_file(true)
        .build()
}

/// An `UnauthorizedException` means the access token is no good; anything
/// else is a service problem
fn classify_sso_error<R>(err: SdkError<GetRoleCredentialsError, R>) -> ServiceError
where
    R: Debug + Send + Sync + 'static,
{
    let unauthorized = err
        .as_service_error()
        .map(|e| e.is_unauthorized_exception())
        .unwrap_or(false);
    if unauthorized {
        ServiceError::Unauthorized(DisplayErrorContext(&err).to_string())
    } else {
        ServiceError::Unavailable(format!(
            "sso:GetRoleCredentials failed: {}",
            DisplayErrorContext(&err)
        ))
    }
}

/// Map an STS SDK error to `Rejected` when the error code says the
/// credentials are expired or unknown, and `Unavailable` for everything else
/// (throttling, access denied, transport failures)
fn classify_sts_error<E, R>(step: &str, err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let code = err.as_service_error().and_then(|e| e.code());
    match code {
        Some(code) if is_rejected_code(code) => ServiceError::Rejected {
            code: code.to_string(),
            message: err
                .as_service_error()
                .and_then(|e| e.message())
                .unwrap_or_default()
                .to_string(),
        },
        _ => ServiceError::Unavailable(format!("{} failed: {}", step, DisplayErrorContext(&err))),
    }
}

fn is_rejected_code(code: &str) -> bool {
    REJECTED_CREDENTIAL_CODES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sso::types::error::UnauthorizedException;
    use aws_sdk_sts::operation::get_caller_identity::GetCallerIdentityError;
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;
    use aws_smithy_types::error::ErrorMetadata;

    fn raw_response(status: u16) -> Response {
        Response::new(StatusCode::try_from(status).unwrap(), SdkBody::empty())
    }

    fn sts_service_error(code: &str, status: u16) -> SdkError<GetCallerIdentityError, Response> {
        let metadata = ErrorMetadata::builder()
            .code(code)
            .message("request failed")
            .build();
        SdkError::service_error(
            GetCallerIdentityError::generic(metadata),
            raw_response(status),
        )
    }

    #[test]
    fn test_expired_sts_token_is_rejected() {
        let err = classify_sts_error("sts:GetCallerIdentity", sts_service_error("ExpiredToken", 403));
        assert_eq!(
            err,
            ServiceError::Rejected {
                code: "ExpiredToken".to_string(),
                message: "request failed".to_string(),
            }
        );

        let err = classify_sts_error(
            "sts:GetCallerIdentity",
            sts_service_error("InvalidClientTokenId", 403),
        );
        assert!(matches!(err, ServiceError::Rejected { code, .. } if code == "InvalidClientTokenId"));
    }

    #[test]
    fn test_access_denied_is_unavailable() {
        let err = classify_sts_error("sts:AssumeRole", sts_service_error("AccessDenied", 403));
        match err {
            ServiceError::Unavailable(message) => assert!(message.starts_with("sts:AssumeRole failed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let err: SdkError<GetCallerIdentityError, Response> =
            SdkError::timeout_error("connection timed out");
        assert!(matches!(
            classify_sts_error("sts:GetCallerIdentity", err),
            ServiceError::Unavailable(_)
        ));
    }

    #[test]
    fn test_sso_unauthorized_is_unauthorized() {
        let err = SdkError::service_error(
            GetRoleCredentialsError::UnauthorizedException(
                UnauthorizedException::builder()
                    .message("Session token not found or invalid")
                    .build(),
            ),
            raw_response(401),
        );
        assert!(matches!(classify_sso_error(err), ServiceError::Unauthorized(_)));
    }

    #[test]
    fn test_other_sso_failures_are_unavailable() {
        let err: SdkError<GetRoleCredentialsError, Response> =
            SdkError::timeout_error("connection timed out");
        assert!(matches!(classify_sso_error(err), ServiceError::Unavailable(_)));
    }

    #[test]
    fn test_rejected_codes() {
        assert!(is_rejected_code("ExpiredToken"));
        assert!(is_rejected_code("InvalidClientTokenId"));
        assert!(!is_rejected_code("AccessDenied"));
        assert!(!is_rejected_code("Throttling"));
        assert!(!is_rejected_code("expiredtoken"));
    }
}

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// How a profile obtains temporary credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// IAM Identity Center: exchange a cached SSO access token for role credentials
    Sso {
        start_url: String,
        region: String,
        role_name: String,
        account_id: String,
    },
    /// STS AssumeRole using long-lived keys from `source_profile`, optionally
    /// behind an MFA challenge
    AssumeRole {
        role_arn: String,
        mfa_serial: Option<String>,
        source_profile: String,
    },
}

impl AuthMode {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMode::Sso { .. } => "sso",
            AuthMode::AssumeRole {
                mfa_serial: Some(_),
                ..
            } => "assume-role+mfa",
            AuthMode::AssumeRole { .. } => "assume-role",
        }
    }
}

/// Parameters sent to AWS to obtain temporary credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRequest {
    /// Arguments to sso:GetRoleCredentials
    Sso {
        role_name: String,
        account_id: String,
        access_token: String,
    },
    /// Arguments to sts:AssumeRole
    AssumeRole {
        role_arn: String,
        role_session_name: String,
        duration_seconds: i32,
    },
}

/// Temporary AWS credentials usable for request signing
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .finish()
    }
}

/// On-disk shape of a cached credential file.
///
/// Matches the `credentials` member of an sts:AssumeRole response so files
/// written by other tooling (which may carry extra fields such as
/// `expiration` or `assumed_role_user`) are still readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCredentialRecord {
    pub credentials: Credentials,
}

/// Entry from the AWS CLI SSO token cache (~/.aws/sso/cache/*.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoToken {
    #[serde(rename = "accessToken")]
    pub access_token: String,

    #[serde(rename = "expiresAt", deserialize_with = "deserialize_expires_at")]
    pub expires_at: DateTime<Utc>,

    #[serde(rename = "startUrl", skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl SsoToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn expires_in_minutes(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}

/// The AWS CLI has written both RFC 3339 (`...Z`) and `...UTC` suffixed
/// timestamps into the token cache over the years.
fn deserialize_expires_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expires_at(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognized expiresAt timestamp: {}", raw))
    })
}

pub(crate) fn parse_expires_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SUTC")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Result of sts:GetCallerIdentity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

use crate::error::{CredsError, Result};
use crate::models::{CachedCredentialRecord, CredentialRequest, Credentials};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Outcome of looking up a cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Credentials),
    Miss,
    /// File exists but couldn't be read or parsed
    Corrupt(String),
}

// Key material, serialized in this field order. Volatile fields (the random
// session name, the SSO access token) are left out so they don't fragment
// the cache. Any future map-valued field (a policy document) must be
// key-sorted before it is added here.
#[derive(Serialize)]
struct SsoKeyMaterial<'a> {
    role_name: &'a str,
    account_id: &'a str,
}

#[derive(Serialize)]
struct AssumeRoleKeyMaterial<'a> {
    role_arn: &'a str,
    duration_seconds: i32,
}

/// Temporary credential cache, one `<sha1>.json` file per request
pub struct CredentialCache {
    cache_dir: PathBuf,
}

impl CredentialCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// SHA-1 hex digest of the request's canonical JSON, minus volatile fields
    pub fn cache_key(request: &CredentialRequest) -> String {
        let canonical = match request {
            CredentialRequest::Sso {
                role_name,
                account_id,
                ..
            } => serde_json::to_string(&SsoKeyMaterial {
                role_name,
                account_id,
            }),
            CredentialRequest::AssumeRole {
                role_arn,
                duration_seconds,
                ..
            } => serde_json::to_string(&AssumeRoleKeyMaterial {
                role_arn,
                duration_seconds: *duration_seconds,
            }),
        }
        // Serializing plain strings and integers can't fail
        .unwrap_or_default();

        let mut hasher = Sha1::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn cache_file_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    pub fn load(&self, key: &str) -> CacheLookup {
        let cache_file = self.cache_file_path(key);

        let contents = match fs::read_to_string(&cache_file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheLookup::Miss,
            Err(e) => {
                return CacheLookup::Corrupt(format!(
                    "Failed to read {}: {}",
                    cache_file.display(),
                    e
                ))
            }
        };

        match serde_json::from_str::<CachedCredentialRecord>(&contents) {
            Ok(record) => CacheLookup::Hit(record.credentials),
            Err(e) => CacheLookup::Corrupt(format!(
                "Failed to parse {}: {}",
                cache_file.display(),
                e
            )),
        }
    }

    /// Write (or overwrite) the entry for `key`
    pub fn store(&self, key: &str, credentials: &Credentials) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            CredsError::Cache(format!(
                "Failed to create cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        let record = CachedCredentialRecord {
            credentials: credentials.clone(),
        };
        let json = serde_json::to_string(&record)?;

        let cache_file = self.cache_file_path(key);
        fs::write(&cache_file, json)
            .map_err(|e| CredsError::Cache(format!("Failed to write cache file: {}", e)))?;

        restrict_permissions(&cache_file);
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

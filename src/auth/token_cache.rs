use crate::error::Result;
use crate::models::SsoToken;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only view of the AWS CLI v2 SSO token cache (~/.aws/sso/cache/).
/// The files are written by `aws sso login`; we only ever look.
pub struct TokenCache {
    cache_dir: PathBuf,
}

impl TokenCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Find an unexpired token whose `startUrl` equals `start_url` exactly.
    ///
    /// Files are scanned in filename order and the first match wins. Files
    /// that aren't token JSON (client registrations, half-written files) are
    /// skipped.
    pub fn find_token(&self, start_url: &str) -> Result<Option<SsoToken>> {
        for (path, token) in self.list_tokens()? {
            if token.start_url.as_deref() != Some(start_url) {
                continue;
            }
            if token.is_expired() {
                tracing::debug!("Skipping expired SSO token in {}", path.display());
                continue;
            }
            tracing::debug!("Using SSO token from {}", path.display());
            return Ok(Some(token));
        }

        Ok(None)
    }

    /// All parseable token files, sorted by path
    pub fn list_tokens(&self) -> Result<Vec<(PathBuf, SsoToken)>> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tokens = Vec::new();
        for path in paths {
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!("Failed to read SSO cache file {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<SsoToken>(&contents) {
                Ok(token) => tokens.push((path, token)),
                Err(e) => tracing::debug!("Ignoring {}: {}", path.display(), e),
            }
        }

        Ok(tokens)
    }
}

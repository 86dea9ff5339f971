//! Profile-aware AWS temporary credentials for the PRX dev tools.
//!
//! [`CredentialManager::get_credentials`] turns a named profile from the
//! shared AWS config file into a set of temporary credentials, reusing a
//! cached set while AWS still accepts it.

pub mod auth;
pub mod aws_config;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod profile;
pub mod prompt;

pub use config::Settings;
pub use credentials::CredentialManager;
pub use error::{CredsError, Result};
pub use models::{AuthMode, CallerIdentity, Credentials};
pub use profile::ProfileResolver;

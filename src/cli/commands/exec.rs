use prx_aws_creds::{CredentialManager, CredsError, Result, Settings};
use std::process::Command;

pub fn execute(settings: Settings, profile: &str, command: Vec<String>) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| CredsError::Config("No command specified".to_string()))?;

    let manager = CredentialManager::from_settings(settings)?;
    let creds = manager.get_credentials(profile)?;

    tracing::debug!("Running {} with credentials for {}", program, profile);

    // Execute command with credentials in environment
    let status = Command::new(program)
        .args(args)
        .env("AWS_ACCESS_KEY_ID", &creds.access_key_id)
        .env("AWS_SECRET_ACCESS_KEY", &creds.secret_access_key)
        .env("AWS_SESSION_TOKEN", &creds.session_token)
        .env_remove("AWS_PROFILE")
        .status()?;

    // Exit with same code as the command
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }

    Ok(())
}

use prx_aws_creds::{CredentialManager, Result, Settings};

pub fn execute(settings: Settings, profile: &str) -> Result<()> {
    let manager = CredentialManager::from_settings(settings)?;
    let creds = manager.get_credentials(profile)?;

    let identity = manager
        .service()
        .get_caller_identity(&creds)
        .map_err(|e| e.into_creds_error("sts:GetCallerIdentity"))?;

    println!("Profile: {}", profile);
    println!("Account: {}", identity.account);
    println!("ARN:     {}", identity.arn);
    println!("UserId:  {}", identity.user_id);

    Ok(())
}

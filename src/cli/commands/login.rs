use prx_aws_creds::auth::{AuthManager, AwsCliLogin, TokenCache};
use prx_aws_creds::prompt::TerminalPrompter;
use prx_aws_creds::{AuthMode, ProfileResolver, Result, Settings};

pub fn execute(settings: &Settings, profile: &str) -> Result<()> {
    let resolver = ProfileResolver::new(&settings.aws_config_file);

    let start_url = match resolver.resolve_auth_mode(profile)? {
        AuthMode::Sso { start_url, .. } => start_url,
        mode => {
            eprintln!(
                "Profile {} uses {} credentials; there is no SSO session to log in to",
                profile,
                mode.kind()
            );
            return Ok(());
        }
    };

    let auth = AuthManager::new(
        TokenCache::new(&settings.sso_cache_dir),
        Box::new(AwsCliLogin::new(
            settings.login_command.clone(),
            settings.aws_config_file.clone(),
        )),
    );
    let token = auth.ensure_token(profile, &start_url, &TerminalPrompter)?;

    eprintln!("✓ SSO session active for {}", start_url);
    eprintln!("  Token expires in: {} minutes", token.expires_in_minutes());

    Ok(())
}

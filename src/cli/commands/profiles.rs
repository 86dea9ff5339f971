use prx_aws_creds::profile::ProfileSummary;
use prx_aws_creds::{AuthMode, ProfileResolver, Result, Settings};

pub fn execute(settings: &Settings, json: bool) -> Result<()> {
    let resolver = ProfileResolver::new(&settings.aws_config_file);
    let profiles = resolver.list_profiles()?;

    if json {
        let entries: Vec<serde_json::Value> = profiles.iter().map(summary_json).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if profiles.is_empty() {
        println!(
            "No profiles found in {}",
            settings.aws_config_file.display()
        );
        return Ok(());
    }

    for summary in &profiles {
        match &summary.auth_mode {
            Ok(mode) => println!("{:<30} {:<16} {}", summary.name, mode.kind(), target(mode)),
            Err(e) => println!("{:<30} {:<16} {}", summary.name, "invalid", e),
        }
    }

    Ok(())
}

/// What the profile ends up as: the SSO account/role or the role ARN
fn target(mode: &AuthMode) -> String {
    match mode {
        AuthMode::Sso {
            role_name,
            account_id,
            ..
        } => format!("{}/{}", account_id, role_name),
        AuthMode::AssumeRole { role_arn, .. } => role_arn.clone(),
    }
}

fn summary_json(summary: &ProfileSummary) -> serde_json::Value {
    match &summary.auth_mode {
        Ok(mode) => serde_json::json!({
            "name": summary.name,
            "mode": mode.kind(),
            "target": target(mode),
        }),
        Err(e) => serde_json::json!({
            "name": summary.name,
            "mode": null,
            "error": e.to_string(),
        }),
    }
}

use prx_aws_creds::{CredentialManager, Credentials, Result, Settings};

pub fn execute(settings: Settings, profile: &str, json: bool) -> Result<()> {
    let manager = CredentialManager::from_settings(settings)?;
    let creds = manager.get_credentials(profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&process_output(&creds))?);
    } else {
        for line in export_lines(&creds) {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Same shape the AWS CLI expects from a `credential_process`
fn process_output(creds: &Credentials) -> serde_json::Value {
    serde_json::json!({
        "Version": 1,
        "AccessKeyId": creds.access_key_id,
        "SecretAccessKey": creds.secret_access_key,
        "SessionToken": creds.session_token,
    })
}

fn export_lines(creds: &Credentials) -> [String; 3] {
    [
        format!("export AWS_ACCESS_KEY_ID=\"{}\"", creds.access_key_id),
        format!("export AWS_SECRET_ACCESS_KEY=\"{}\"", creds.secret_access_key),
        format!("export AWS_SESSION_TOKEN=\"{}\"", creds.session_token),
    ]
}

use super::*;
use crate::auth::MockSsoLogin;
use crate::models::CallerIdentity;
use crate::prompt::MockPrompter;
use chrono::Duration;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const START_URL: &str = "https://example.awsapps.com/start";
const DEPLOY_ARN: &str = "arn:aws:sts::123456789012:role/Deploy";

const SSO_CONFIG: &str = "[profile dev]
sso_start_url = https://example.awsapps.com/start
sso_region = us-east-1
sso_role_name = Admin
sso_account_id = 111122223333
";

const LEGACY_CONFIG: &str = "[profile prx-legacy]
role_arn = arn:aws:iam::123456789012:role/Deploy
source_profile = keys
";

const MFA_CONFIG: &str = "[profile prx-legacy]
role_arn = arn:aws:iam::123456789012:role/Deploy
mfa_serial = arn:aws:iam::123456789012:mfa/dev
source_profile = keys
";

struct Fixture {
    _dir: TempDir,
    settings: Settings,
}

impl Fixture {
    fn new(aws_config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_home(dir.path());
        fs::create_dir_all(settings.aws_config_file.parent().unwrap()).unwrap();
        fs::write(&settings.aws_config_file, aws_config).unwrap();
        fs::create_dir_all(&settings.sso_cache_dir).unwrap();
        Self {
            _dir: dir,
            settings,
        }
    }

    fn write_sso_token(&self, token: &str) {
        write_sso_token(&self.settings.sso_cache_dir, token);
    }

    fn cache(&self) -> CredentialCache {
        CredentialCache::new(&self.settings.credential_cache_dir)
    }

    fn sso_key(&self) -> String {
        CredentialCache::cache_key(&CredentialRequest::Sso {
            role_name: "Admin".to_string(),
            account_id: "111122223333".to_string(),
            access_token: "irrelevant".to_string(),
        })
    }

    fn cache_files(&self) -> Vec<String> {
        match fs::read_dir(&self.settings.credential_cache_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn manager(
        &self,
        service: MockCredentialService,
        login: MockSsoLogin,
        prompter: MockPrompter,
    ) -> CredentialManager {
        CredentialManager::new(
            self.settings.clone(),
            Box::new(service),
            Box::new(login),
            Box::new(prompter),
        )
    }
}

fn write_sso_token(dir: &Path, token: &str) {
    let body = serde_json::json!({
        "startUrl": START_URL,
        "region": "us-east-1",
        "accessToken": token,
        "expiresAt": (Utc::now() + Duration::hours(8)).to_rfc3339(),
    });
    fs::write(dir.join("token.json"), body.to_string()).unwrap();
}

fn identity() -> CallerIdentity {
    CallerIdentity {
        account: "123456789012".to_string(),
        arn: "arn:aws:sts::123456789012:assumed-role/Deploy/session".to_string(),
        user_id: "AROAEXAMPLE:session".to_string(),
    }
}

fn expired() -> ServiceError {
    ServiceError::Rejected {
        code: "ExpiredToken".to_string(),
        message: "The security token included in the request is expired".to_string(),
    }
}

fn quiet_prompter() -> MockPrompter {
    let mut prompter = MockPrompter::new();
    prompter.expect_confirm().never();
    prompter.expect_read_secret().never();
    prompter
}

fn no_login() -> MockSsoLogin {
    let mut login = MockSsoLogin::new();
    login.expect_login().never();
    login
}

#[test]
fn test_missing_cache_fetches_once_and_creates_one_file() {
    let fixture = Fixture::new(LEGACY_CONFIG);
    let base = Credentials::new("ASIABASE", "base-secret", "base-token");
    let fresh = Credentials::new("ASIAFRESH", "fresh-secret", "fresh-token");

    let mut service = MockCredentialService::new();
    let base_clone = base.clone();
    service
        .expect_assume_role_from_profile()
        .withf(|source, arn, _, mfa| source == "keys" && arn == DEPLOY_ARN && mfa.is_none())
        .times(1)
        .returning(move |_, _, _, _| Ok(base_clone.clone()));
    let expected_base = base.clone();
    service
        .expect_get_caller_identity()
        .withf(move |creds| creds == &expected_base)
        .times(1)
        .returning(|_| Ok(identity()));
    let fresh_clone = fresh.clone();
    service
        .expect_assume_role()
        .withf(move |creds, arn, session, duration| {
            creds == &base && arn == DEPLOY_ARN && session.starts_with("prx-aws-creds-session-")
                && *duration == 3600
        })
        .times(1)
        .returning(move |_, _, _, _| Ok(fresh_clone.clone()));
    service.expect_get_role_credentials().never();

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    let creds = manager.get_credentials("prx-legacy").unwrap();

    assert_eq!(creds, fresh);
    let files = fixture.cache_files();
    assert_eq!(files.len(), 1);
    let key = files[0].trim_end_matches(".json");
    assert_eq!(fixture.cache().load(key), CacheLookup::Hit(fresh));
}

#[test]
fn test_assume_role_cache_survives_new_session_names() {
    let fixture = Fixture::new(LEGACY_CONFIG);
    let fresh = Credentials::new("ASIAFRESH", "fresh-secret", "fresh-token");

    let mut service = MockCredentialService::new();
    service
        .expect_assume_role_from_profile()
        .times(1)
        .returning(|_, _, _, _| Ok(Credentials::new("ASIABASE", "s", "t")));
    // One intermediate who-am-I on the first call, one cache probe on the second
    service
        .expect_get_caller_identity()
        .times(2)
        .returning(|_| Ok(identity()));
    let fresh_clone = fresh.clone();
    service
        .expect_assume_role()
        .times(1)
        .returning(move |_, _, _, _| Ok(fresh_clone.clone()));

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    assert_eq!(manager.get_credentials("prx-legacy").unwrap(), fresh);
    assert_eq!(manager.get_credentials("prx-legacy").unwrap(), fresh);
    assert_eq!(fixture.cache_files().len(), 1);
}

#[test]
fn test_valid_cached_record_is_reused_without_fetch() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("sso-token");
    let cached = Credentials::new("ASIACACHED", "cached-secret", "cached-token");
    fixture.cache().store(&fixture.sso_key(), &cached).unwrap();

    let mut service = MockCredentialService::new();
    let expected = cached.clone();
    service
        .expect_get_caller_identity()
        .withf(move |creds| creds == &expected)
        .times(2)
        .returning(|_| Ok(identity()));
    service.expect_get_role_credentials().never();
    service.expect_assume_role().never();
    service.expect_assume_role_from_profile().never();

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    assert_eq!(manager.get_credentials("dev").unwrap(), cached);
    assert_eq!(manager.get_credentials("dev").unwrap(), cached);
}

#[test]
fn test_expired_cached_record_is_refetched_and_overwritten() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("sso-token");
    let key = fixture.sso_key();
    fixture
        .cache()
        .store(&key, &Credentials::new("ASIAOLD", "old", "old"))
        .unwrap();
    let fresh = Credentials::new("ASIANEW", "new-secret", "new-token");

    let mut service = MockCredentialService::new();
    service
        .expect_get_caller_identity()
        .times(1)
        .returning(|_| Err(expired()));
    let fresh_clone = fresh.clone();
    service
        .expect_get_role_credentials()
        .withf(|region, role, account, token| {
            region == "us-east-1" && role == "Admin" && account == "111122223333"
                && token == "sso-token"
        })
        .times(1)
        .returning(move |_, _, _, _| Ok(fresh_clone.clone()));

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    assert_eq!(manager.get_credentials("dev").unwrap(), fresh);
    assert_eq!(fixture.cache().load(&key), CacheLookup::Hit(fresh));
    assert_eq!(fixture.cache_files().len(), 1);
}

#[test]
fn test_invalid_client_token_is_refetched() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("sso-token");
    fixture
        .cache()
        .store(&fixture.sso_key(), &Credentials::new("ASIAOLD", "old", "old"))
        .unwrap();

    let mut service = MockCredentialService::new();
    service.expect_get_caller_identity().times(1).returning(|_| {
        Err(ServiceError::Rejected {
            code: "InvalidClientTokenId".to_string(),
            message: "The security token included in the request is invalid".to_string(),
        })
    });
    service
        .expect_get_role_credentials()
        .times(1)
        .returning(|_, _, _, _| Ok(Credentials::new("ASIANEW", "s", "t")));

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    assert_eq!(
        manager.get_credentials("dev").unwrap().access_key_id,
        "ASIANEW"
    );
}

#[test]
fn test_corrupt_cache_entry_is_treated_as_miss() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("sso-token");
    fs::create_dir_all(&fixture.settings.credential_cache_dir).unwrap();
    fs::write(
        fixture.cache().cache_file_path(&fixture.sso_key()),
        "{\"credentials\": {\"access_",
    )
    .unwrap();

    let mut service = MockCredentialService::new();
    service.expect_get_caller_identity().never();
    service
        .expect_get_role_credentials()
        .times(1)
        .returning(|_, _, _, _| Ok(Credentials::new("ASIANEW", "s", "t")));

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    let creds = manager.get_credentials("dev").unwrap();
    assert_eq!(
        fixture.cache().load(&fixture.sso_key()),
        CacheLookup::Hit(creds)
    );
}

#[test]
fn test_unreachable_probe_is_an_error_not_a_refetch() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("sso-token");
    fixture
        .cache()
        .store(&fixture.sso_key(), &Credentials::new("ASIA", "s", "t"))
        .unwrap();

    let mut service = MockCredentialService::new();
    service
        .expect_get_caller_identity()
        .times(1)
        .returning(|_| Err(ServiceError::Unavailable("dispatch failure".to_string())));
    service.expect_get_role_credentials().never();

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    let err = manager.get_credentials("dev").unwrap_err();
    assert!(matches!(err, CredsError::ServiceUnavailable { .. }));
}

#[test]
fn test_unauthorized_sso_token_logs_in_and_retries_once() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("stale-token");
    let sso_cache_dir = fixture.settings.sso_cache_dir.clone();

    let mut service = MockCredentialService::new();
    let mut calls = 0;
    service
        .expect_get_role_credentials()
        .times(2)
        .returning(move |_, _, _, token| {
            calls += 1;
            if calls == 1 {
                assert_eq!(token, "stale-token");
                Err(ServiceError::Unauthorized("Session token not found or invalid".to_string()))
            } else {
                assert_eq!(token, "fresh-token");
                Ok(Credentials::new("ASIANEW", "s", "t"))
            }
        });

    let mut login = MockSsoLogin::new();
    login
        .expect_login()
        .withf(|profile| profile == "dev")
        .times(1)
        .returning(move |_| {
            write_sso_token(&sso_cache_dir, "fresh-token");
            Ok(())
        });
    let mut prompter = MockPrompter::new();
    prompter.expect_confirm().times(1).returning(|_| Ok(true));

    let manager = fixture.manager(service, login, prompter);
    assert_eq!(
        manager.get_credentials("dev").unwrap().access_key_id,
        "ASIANEW"
    );
    assert_eq!(fixture.cache_files().len(), 1);
}

#[test]
fn test_second_sso_rejection_is_fatal() {
    let fixture = Fixture::new(SSO_CONFIG);
    fixture.write_sso_token("token");

    let mut service = MockCredentialService::new();
    service
        .expect_get_role_credentials()
        .times(2)
        .returning(|_, _, _, _| Err(ServiceError::Unauthorized("nope".to_string())));

    let mut login = MockSsoLogin::new();
    login.expect_login().times(1).returning(|_| Ok(()));
    let mut prompter = MockPrompter::new();
    prompter.expect_confirm().times(1).returning(|_| Ok(true));

    let manager = fixture.manager(service, login, prompter);
    let err = manager.get_credentials("dev").unwrap_err();
    assert!(matches!(err, CredsError::CredentialRejected { .. }));
    assert!(fixture.cache_files().is_empty());
}

#[test]
fn test_missing_sso_token_triggers_login_before_fetch() {
    let fixture = Fixture::new(SSO_CONFIG);
    let sso_cache_dir = fixture.settings.sso_cache_dir.clone();

    let mut login = MockSsoLogin::new();
    login.expect_login().times(1).returning(move |_| {
        write_sso_token(&sso_cache_dir, "new-token");
        Ok(())
    });
    let mut prompter = MockPrompter::new();
    prompter.expect_confirm().times(1).returning(|_| Ok(true));

    let mut service = MockCredentialService::new();
    service
        .expect_get_role_credentials()
        .withf(|_, _, _, token| token == "new-token")
        .times(1)
        .returning(|_, _, _, _| Ok(Credentials::new("ASIANEW", "s", "t")));

    let manager = fixture.manager(service, login, prompter);
    assert!(manager.get_credentials("dev").is_ok());
}

#[test]
fn test_declined_login_is_token_unavailable() {
    let fixture = Fixture::new(SSO_CONFIG);

    let mut prompter = MockPrompter::new();
    prompter.expect_confirm().times(1).returning(|_| Ok(false));
    let mut service = MockCredentialService::new();
    service.expect_get_role_credentials().never();

    let manager = fixture.manager(service, no_login(), prompter);
    let err = manager.get_credentials("dev").unwrap_err();
    assert!(matches!(err, CredsError::TokenUnavailable(_)));
}

#[test]
fn test_mfa_profile_prompts_and_caches_only_the_assumed_role() {
    let fixture = Fixture::new(MFA_CONFIG);
    let base = Credentials::new("ASIAMFA", "mfa-secret", "mfa-token");
    let fresh = Credentials::new("ASIAROLE", "role-secret", "role-token");

    let mut prompter = MockPrompter::new();
    prompter
        .expect_read_secret()
        .withf(|message| message.contains("arn:aws:iam::123456789012:mfa/dev"))
        .times(1)
        .returning(|_| Ok("123456".to_string()));
    prompter.expect_confirm().never();

    let mut service = MockCredentialService::new();
    let base_clone = base.clone();
    service
        .expect_assume_role_from_profile()
        .withf(|source, arn, _, mfa| {
            source == "keys"
                && arn == DEPLOY_ARN
                && mfa
                    == &Some(MfaChallenge {
                        serial: "arn:aws:iam::123456789012:mfa/dev".to_string(),
                        code: "123456".to_string(),
                    })
        })
        .times(1)
        .returning(move |_, _, _, _| Ok(base_clone.clone()));
    service
        .expect_get_caller_identity()
        .times(1)
        .returning(|_| Ok(identity()));
    let fresh_clone = fresh.clone();
    service
        .expect_assume_role()
        .times(1)
        .returning(move |_, _, _, _| Ok(fresh_clone.clone()));

    let manager = fixture.manager(service, no_login(), prompter);
    assert_eq!(manager.get_credentials("prx-legacy").unwrap(), fresh);

    let files = fixture.cache_files();
    assert_eq!(files.len(), 1);
    let raw = fs::read_to_string(fixture.settings.credential_cache_dir.join(&files[0])).unwrap();
    assert!(raw.contains("ASIAROLE"));
    assert!(!raw.contains("ASIAMFA"));
}

#[test]
fn test_empty_mfa_code_stops_before_any_aws_call() {
    let fixture = Fixture::new(MFA_CONFIG);

    let mut prompter = MockPrompter::new();
    prompter
        .expect_read_secret()
        .times(1)
        .returning(|_| Ok(String::new()));
    let mut service = MockCredentialService::new();
    service.expect_assume_role_from_profile().never();
    service.expect_assume_role().never();

    let manager = fixture.manager(service, no_login(), prompter);
    let err = manager.get_credentials("prx-legacy").unwrap_err();
    assert!(matches!(err, CredsError::Prompt(_)));
}

#[test]
fn test_rejected_intermediate_identity_is_fatal() {
    let fixture = Fixture::new(LEGACY_CONFIG);

    let mut service = MockCredentialService::new();
    service
        .expect_assume_role_from_profile()
        .times(1)
        .returning(|_, _, _, _| Ok(Credentials::new("ASIABASE", "s", "t")));
    service
        .expect_get_caller_identity()
        .times(1)
        .returning(|_| Err(expired()));
    service.expect_assume_role().never();

    let manager = fixture.manager(service, no_login(), quiet_prompter());
    let err = manager.get_credentials("prx-legacy").unwrap_err();
    assert!(matches!(err, CredsError::CredentialRejected { .. }));
    assert!(fixture.cache_files().is_empty());
}

#[test]
fn test_unknown_profile_makes_no_aws_calls() {
    let fixture = Fixture::new(SSO_CONFIG);

    let manager = fixture.manager(MockCredentialService::new(), no_login(), quiet_prompter());
    let err = manager.get_credentials("ghost").unwrap_err();
    assert!(matches!(err, CredsError::ProfileNotFound(_)));
}

#[test]
fn test_misconfigured_profile_makes_no_aws_calls() {
    let fixture = Fixture::new("[profile plain]\nregion = us-east-1\n");

    let manager = fixture.manager(MockCredentialService::new(), no_login(), quiet_prompter());
    let err = manager.get_credentials("plain").unwrap_err();
    assert!(matches!(err, CredsError::ProfileMisconfigured { .. }));
}

#[test]
fn test_session_name_format() {
    let name = session_name("prx-aws-creds-session");
    let (prefix, ts) = name.rsplit_once('-').unwrap();
    assert_eq!(prefix, "prx-aws-creds-session");
    assert!(ts.parse::<i64>().is_ok());
}

#[test]
fn test_session_name_is_clipped() {
    let name = session_name(&"x".repeat(100));
    assert_eq!(name.len(), MAX_SESSION_NAME_LEN);
    assert!(name.starts_with("xxxx"));
}

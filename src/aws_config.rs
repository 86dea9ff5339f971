// AWS shared config file reader
use crate::error::{CredsError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parsed `~/.aws/config`, loaded fresh for each lookup
#[derive(Debug, Clone, Default)]
pub struct AwsConfigFile {
    sections: HashMap<String, HashMap<String, String>>,
    order: Vec<String>,
}

impl AwsConfigFile {
    /// Load and parse the config file. A missing file parses as empty so
    /// lookups fail with a profile error rather than an IO error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("AWS config file not found at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CredsError::Config(format!(
                "Failed to read AWS config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self::parse(&content))
    }

    /// Parse INI content. Later duplicate keys win; indented sub-properties
    /// (e.g. the `s3 =` block) are skipped.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut current: Option<String> = None;
        let mut in_nested_block = false;

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let name = normalize_section_name(&trimmed[1..trimmed.len() - 1]);
                if !config.sections.contains_key(&name) {
                    config.order.push(name.clone());
                }
                config.sections.entry(name.clone()).or_default();
                current = Some(name);
                in_nested_block = false;
                continue;
            }

            let indented = line.starts_with(' ') || line.starts_with('\t');
            if indented && in_nested_block {
                continue;
            }

            let Some(section) = current.as_ref() else {
                continue;
            };

            if let Some(eq_pos) = trimmed.find('=') {
                let key = trimmed[..eq_pos].trim().to_string();
                let value = trimmed[eq_pos + 1..].trim().to_string();
                in_nested_block = value.is_empty();
                if let Some(values) = config.sections.get_mut(section) {
                    values.insert(key, value);
                }
            }
        }

        config
    }

    pub fn section(&self, name: &str) -> Option<&HashMap<String, String>> {
        self.sections.get(name)
    }

    /// Section for a named profile. `default` is conventionally `[default]`
    /// but `[profile default]` is accepted too.
    pub fn profile(&self, profile_name: &str) -> Option<&HashMap<String, String>> {
        let section = self.section(&format!("profile {}", profile_name));
        if profile_name == "default" {
            return section.or_else(|| self.section("default"));
        }
        section
    }

    pub fn sso_session(&self, session_name: &str) -> Option<&HashMap<String, String>> {
        self.section(&format!("sso-session {}", session_name))
    }

    /// Profile names in file order
    pub fn profile_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for section in &self.order {
            let name = if section == "default" {
                Some("default")
            } else {
                section.strip_prefix("profile ")
            };
            if let Some(name) = name {
                if !names.iter().any(|n: &String| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }
}

/// Collapse runs of whitespace so `[profile   foo]` matches `profile foo`
fn normalize_section_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

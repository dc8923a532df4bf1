//! Mail configuration.
//!
//! The effective config is merged from a global file in the user's home
//! directory and a workbench-local file, then patched from environment
//! variables:
//! - `$HOME/.md-mailer/config.json`
//! - `<workbench>/md-mailer.json` (wins over the global file, key by key)
//! - `MD_MAILER_SMTP_SERVER`, `MD_MAILER_SMTP_PORT`, `MD_MAILER_USERNAME`,
//!   `MD_MAILER_PASSWORD`
//!
//! Both files hold a top-level `mail` object.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::compose::fields::Recipients;
use crate::error::ConfigError;

/// Name of the workbench-local config file.
pub const LOCAL_CONFIG_FILE: &str = "md-mailer.json";

/// Subject date format used when `format` is unset.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_SMTP_PORT: u16 = 25;

/// The `mail` section of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    #[serde(deserialize_with = "secret")]
    pub password: Option<SecretString>,
    /// Implicit TLS when set, STARTTLS otherwise.
    #[serde(deserialize_with = "flag")]
    pub ssl: bool,
    /// The stored password is encrypted.
    #[serde(deserialize_with = "flag")]
    pub safer: bool,
    pub to: Option<Recipients>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub account: Option<String>,
    /// strftime-style pattern for `$now` / `$last_week` in subjects.
    pub format: Option<String>,
}

impl MailConfig {
    /// Load and merge the global and workbench config files, then apply
    /// environment overrides. Missing files are skipped.
    pub fn load(workbench: &Path) -> Result<Self, ConfigError> {
        let mut merged = Map::new();
        if let Some(global) = global_config_path() {
            merge_mail_section(&mut merged, &global)?;
        }
        merge_mail_section(&mut merged, &workbench.join(LOCAL_CONFIG_FILE))?;

        let mut config: MailConfig =
            serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::ParseError {
                path: "mail".into(),
                reason: e.to_string(),
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override connection settings from `MD_MAILER_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var("MD_MAILER_SMTP_SERVER") {
            self.smtp_server = Some(server);
        }
        if let Some(port) = std::env::var("MD_MAILER_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.port = Some(port);
        }
        if let Ok(username) = std::env::var("MD_MAILER_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var("MD_MAILER_PASSWORD") {
            self.password = Some(SecretString::from(password));
        }
    }

    /// Check that the settings needed to send anything are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_blank(&self.smtp_server) {
            return Err(ConfigError::MissingRequired {
                key: "mail.smtp_server".into(),
                hint: format!("Set it in {LOCAL_CONFIG_FILE} or MD_MAILER_SMTP_SERVER"),
            });
        }
        if is_blank(&self.account) {
            return Err(ConfigError::MissingRequired {
                key: "mail.account".into(),
                hint: "Set the mailbox you send from, e.g. \"me@example.com\"".into(),
            });
        }
        if let Some(format) = &self.format {
            crate::compose::date_macro::check_format(format)?;
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SMTP_PORT)
    }

    pub fn date_format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn global_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".md-mailer/config.json"))
}

/// Merge the `mail` object of the JSON file at `path` into `target`.
fn merge_mail_section(target: &mut Map<String, Value>, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let raw = std::fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    match parsed.get("mail") {
        Some(Value::Object(mail)) => {
            for (key, value) in mail {
                target.insert(key.clone(), value.clone());
            }
            tracing::debug!(path = %path.display(), keys = mail.len(), "Merged mail config");
            Ok(())
        }
        Some(_) => Err(ConfigError::InvalidValue {
            key: "mail".into(),
            message: format!("expected an object in {}", path.display()),
        }),
        None => Ok(()),
    }
}

/// Accept `true`/`false` as well as the legacy `"y"`/`"n"` strings.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => matches!(s.trim().to_lowercase().as_str(), "y" | "yes" | "true"),
        None => false,
    })
}

fn secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    fn parse(json: &str) -> MailConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn legacy_flag_strings() {
        let config = parse(r#"{"ssl": "y", "safer": "n"}"#);
        assert!(config.ssl);
        assert!(!config.safer);
    }

    #[test]
    fn bool_flags_and_defaults() {
        let config = parse(r#"{"ssl": true}"#);
        assert!(config.ssl);
        assert!(!config.safer);
        assert_eq!(config.port(), 25);
        assert_eq!(config.date_format(), "%Y-%m-%d");
    }

    #[test]
    fn to_accepts_string_or_list() {
        let single = parse(r#"{"to": "a@example.com"}"#);
        assert_eq!(
            single.to,
            Some(Recipients::One("a@example.com".into()))
        );

        let many = parse(r#"{"to": ["a@example.com", "b@example.com"]}"#);
        assert_eq!(
            many.to,
            Some(Recipients::Many(vec![
                "a@example.com".into(),
                "b@example.com".into()
            ]))
        );
    }

    #[test]
    fn password_is_wrapped_in_secret() {
        let config = parse(r#"{"password": "hunter2"}"#);
        assert_eq!(config.password.unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn validate_requires_server_and_account() {
        let missing_server = parse(r#"{"account": "me@example.com"}"#);
        assert!(matches!(
            missing_server.validate(),
            Err(ConfigError::MissingRequired { ref key, .. }) if key == "mail.smtp_server"
        ));

        let missing_account = parse(r#"{"smtp_server": "smtp.example.com", "account": "  "}"#);
        assert!(matches!(
            missing_account.validate(),
            Err(ConfigError::MissingRequired { ref key, .. }) if key == "mail.account"
        ));

        let ok = parse(r#"{"smtp_server": "smtp.example.com", "account": "me@example.com"}"#);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_date_format() {
        let config = parse(
            r#"{"smtp_server": "smtp.example.com", "account": "me@example.com", "format": "%Q"}"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn validate_rejects_time_of_day_format() {
        let config = parse(
            r#"{"smtp_server": "smtp.example.com", "account": "me@example.com",
                "format": "%Y-%m-%d %H:%M"}"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "mail.format"
        ));
    }

    #[test]
    fn local_file_overrides_keys() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.json");
        let local = dir.path().join("local.json");
        std::fs::write(
            &global,
            r#"{"mail": {"smtp_server": "smtp.global", "subject": "Weekly"}}"#,
        )
        .unwrap();
        std::fs::write(&local, r#"{"mail": {"subject": "Local"}}"#).unwrap();

        let mut merged = Map::new();
        merge_mail_section(&mut merged, &global).unwrap();
        merge_mail_section(&mut merged, &local).unwrap();
        let config: MailConfig = serde_json::from_value(Value::Object(merged)).unwrap();

        assert_eq!(config.smtp_server.as_deref(), Some("smtp.global"));
        assert_eq!(config.subject.as_deref(), Some("Local"));
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut merged = Map::new();
        merge_mail_section(&mut merged, &dir.path().join("nope.json")).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn non_object_mail_section_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"mail": 3}"#).unwrap();
        let mut merged = Map::new();
        assert!(matches!(
            merge_mail_section(&mut merged, &path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}

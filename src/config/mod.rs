//! Configuration loading.
//!
//! Settings live in an INI file layered with `TASKWATCH_<SECTION>__<KEY>`
//! environment overrides. Everything is normalized into a [`ConfigStore`]
//! with lowercase section and key names, so lookups are case-insensitive.
//! Encrypted values are decrypted once while loading; the rest of the
//! program only ever sees plaintext.
//!
//! ```ini
//! [Monitoring]
//! max_tasks_limit = 100
//!
//! [Slack]
//! webhook_url = https://hooks.slack.com/services/T000/B000/XXXX
//! timeout_secs = 10
//!
//! [Database]
//! database_connection_string = gAAAAABl...
//! login_timeout_secs = 15
//! ```
//!
//! `[Webhook] url` and `[Database] connection_string` are accepted as
//! alternative spellings.

mod secret;

pub use secret::{Secret, SecretCipher, DOTENV_FILE, ENCRYPTION_KEY_VAR};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat, Source};
use thiserror::Error;
use tracing::debug;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TASKWATCH";

/// Values stored encrypted in the configuration file, as `(section, key)`.
pub const SECRET_KEYS: &[(&str, &str)] = &[
    ("database", "database_connection_string"),
    ("database", "connection_string"),
];

/// Webhook request timeout when no `timeout_secs` is configured.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

// Accepted `(section, key)` spellings per setting, preferred first
const MAX_TASKS_LIMIT: &[(&str, &str)] = &[("Monitoring", "max_tasks_limit")];
const WEBHOOK_URL: &[(&str, &str)] = &[("Slack", "webhook_url"), ("Webhook", "url")];
const WEBHOOK_TIMEOUT: &[(&str, &str)] = &[("Slack", "timeout_secs"), ("Webhook", "timeout_secs")];
const CONNECTION_STRING: &[(&str, &str)] = &[
    ("Database", "database_connection_string"),
    ("Database", "connection_string"),
];
const LOGIN_TIMEOUT: &[(&str, &str)] = &[("Database", "login_timeout_secs")];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Section '{0}' not found in configuration")]
    MissingSection(String),

    #[error("Key '{key}' not found in section '{section}'")]
    MissingKey { section: String, key: String },

    #[error("Invalid value for '{section}.{key}': {reason}")]
    Invalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("'{section}.{key}' is encrypted but ENCRYPTION_KEY is not set")]
    MissingEncryptionKey { section: String, key: String },

    #[error("ENCRYPTION_KEY is not a valid Fernet key")]
    InvalidEncryptionKey,

    #[error("Could not read {}: {reason}", path.display())]
    EnvFile { path: PathBuf, reason: String },

    #[error("Could not decrypt '{section}.{key}': {reason}")]
    Decrypt {
        section: String,
        key: String,
        reason: String,
    },
}

/// The `TASKWATCH_<SECTION>__<KEY>` override source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// Flat section → key → value view of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigStore {
    /// Load `path` (INI) plus process environment overrides and decrypt secrets.
    ///
    /// `cipher` is only required when the file actually contains one of the
    /// [`SECRET_KEYS`].
    pub fn load(path: impl AsRef<Path>, cipher: Option<&SecretCipher>) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, environment(), cipher)
    }

    /// Load `path` with an explicit override source. Overrides always win
    /// over the file, whatever the case of the file's section names.
    pub fn load_with_environment(
        path: impl AsRef<Path>,
        overrides: Environment,
        cipher: Option<&SecretCipher>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_error = |source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };

        let file = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .build()
            .map_err(load_error)?;
        let overrides = Config::builder()
            .add_source(overrides)
            .build()
            .map_err(load_error)?;

        let store = Self::from_layers([file, overrides], cipher).map_err(|e| match e {
            ConfigError::Load { source, .. } => load_error(source),
            other => other,
        })?;
        debug!(
            "Loaded configuration from {} ({} sections)",
            path.display(),
            store.sections.len()
        );
        Ok(store)
    }

    /// Normalize an already-built [`Config`] and decrypt secrets.
    pub fn from_config(config: Config, cipher: Option<&SecretCipher>) -> Result<Self, ConfigError> {
        Self::from_layers([config], cipher)
    }

    /// Normalize configuration layers in order and decrypt secrets.
    ///
    /// A value in a later layer replaces the same section and key of an
    /// earlier one once names are lowercased.
    pub fn from_layers(
        layers: impl IntoIterator<Item = Config>,
        cipher: Option<&SecretCipher>,
    ) -> Result<Self, ConfigError> {
        let mut store = Self::default();
        for layer in layers {
            store.merge_layer(layer)?;
        }
        store.decrypt_secrets(cipher)?;
        Ok(store)
    }

    fn merge_layer(&mut self, layer: Config) -> Result<(), ConfigError> {
        let table = layer.collect().map_err(|source| ConfigError::Load {
            path: PathBuf::new(),
            source,
        })?;

        for (section, value) in table {
            let section = section.to_lowercase();
            // Top-level scalars (e.g. a stray TASKWATCH_FOO) have no section
            let Ok(table) = value.into_table() else {
                debug!("Ignoring top-level configuration value '{}'", section);
                continue;
            };

            let entries = self.sections.entry(section.clone()).or_default();
            for (key, value) in table {
                let key = key.to_lowercase();
                let value = value.into_string().map_err(|e| ConfigError::Invalid {
                    section: section.clone(),
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
                entries.insert(key, value);
            }
        }
        Ok(())
    }

    /// Build a store from plaintext values. Secrets are taken as given.
    pub fn from_entries<S, K, V>(entries: impl IntoIterator<Item = (S, K, V)>) -> Self
    where
        S: AsRef<str>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (section, key, value) in entries {
            sections
                .entry(section.as_ref().to_lowercase())
                .or_default()
                .insert(key.as_ref().to_lowercase(), value.into());
        }
        Self { sections }
    }

    fn decrypt_secrets(&mut self, cipher: Option<&SecretCipher>) -> Result<(), ConfigError> {
        for (section, key) in SECRET_KEYS {
            let Some(token) = self.sections.get_mut(*section).and_then(|s| s.get_mut(*key))
            else {
                continue;
            };

            let cipher = cipher.ok_or_else(|| ConfigError::MissingEncryptionKey {
                section: section.to_string(),
                key: key.to_string(),
            })?;
            let secret = cipher.decrypt(token).map_err(|reason| ConfigError::Decrypt {
                section: section.to_string(),
                key: key.to_string(),
                reason,
            })?;
            *token = secret.expose().to_string();
            debug!("Decrypted '{}.{}'", section, key);
        }
        Ok(())
    }

    /// Look up a value. Section and key are matched case-insensitively.
    pub fn get_setting(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        let entries = self
            .sections
            .get(&section.to_lowercase())
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
        entries
            .get(&key.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Look up a value that may be absent.
    ///
    /// A missing key yields `None`; a missing section is still an error.
    pub fn get_optional(&self, section: &str, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.get_setting(section, key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::MissingKey { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Look up and parse a value.
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        parse_value(section, key, self.get_setting(section, key)?)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(&section.to_lowercase())
    }

    /// First configured spelling among `candidates`, with its value.
    fn find(&self, candidates: &[(&'static str, &'static str)]) -> Option<(Spelling, &str)> {
        candidates
            .iter()
            .find_map(|&(section, key)| Some(((section, key), self.get_setting(section, key).ok()?)))
    }

    /// Like [`ConfigStore::find`], reporting the preferred spelling when absent.
    fn require(
        &self,
        candidates: &[(&'static str, &'static str)],
    ) -> Result<(Spelling, &str), ConfigError> {
        if let Some(found) = self.find(candidates) {
            return Ok(found);
        }
        let (section, key) = candidates[0];
        self.get_setting(section, key).map(|value| ((section, key), value))
    }
}

type Spelling = (&'static str, &'static str);

fn parse_value<T>(section: &str, key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("'{}': {}", raw, e),
    })
}

/// Typed settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub monitoring: MonitoringSettings,
    pub webhook: WebhookSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringSettings {
    /// Task count above which a category is reported as over the limit.
    pub max_tasks_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    /// Target URL. Empty disables delivery.
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Decrypted ODBC connection string.
    pub connection_string: Secret,
    pub login_timeout: Option<Duration>,
}

impl Settings {
    /// Build typed settings from a loaded store.
    pub fn from_store(store: &ConfigStore) -> Result<Self, ConfigError> {
        let ((section, key), raw) = store.require(MAX_TASKS_LIMIT)?;
        let monitoring = MonitoringSettings {
            max_tasks_limit: parse_value(section, key, raw)?,
        };

        let timeout = match store.find(WEBHOOK_TIMEOUT) {
            Some(((section, key), raw)) => Duration::from_secs(parse_value(section, key, raw)?),
            None => DEFAULT_WEBHOOK_TIMEOUT,
        };
        let (_, url) = store.require(WEBHOOK_URL)?;
        let webhook = WebhookSettings {
            url: url.trim().to_string(),
            timeout,
        };

        // Bounded to what the ODBC login timeout attribute can hold
        let login_timeout = store
            .find(LOGIN_TIMEOUT)
            .map(|((section, key), raw)| parse_value::<u32>(section, key, raw))
            .transpose()?
            .map(|secs| Duration::from_secs(u64::from(secs)));
        let (_, connection_string) = store.require(CONNECTION_STRING)?;
        let database = DatabaseSettings {
            connection_string: Secret::new(connection_string),
            login_timeout,
        };

        Ok(Self {
            monitoring,
            webhook,
            database,
        })
    }
}

//! Encrypted configuration values.

use std::fmt;
use std::path::Path;

use fernet::Fernet;
use tracing::debug;

use super::ConfigError;

/// Environment variable holding the Fernet key used for configuration secrets.
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";

/// File searched for [`ENCRYPTION_KEY_VAR`] when the variable is not exported.
pub const DOTENV_FILE: &str = ".env";

/// A decrypted secret. `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the plaintext.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Fernet cipher for configuration secrets.
pub struct SecretCipher {
    fernet: Fernet,
}

impl SecretCipher {
    /// Create a cipher from a url-safe base64 Fernet key.
    pub fn new(key: &str) -> Result<Self, ConfigError> {
        Fernet::new(key.trim())
            .map(|fernet| Self { fernet })
            .ok_or(ConfigError::InvalidEncryptionKey)
    }

    /// Read the key from [`ENCRYPTION_KEY_VAR`].
    ///
    /// Returns `Ok(None)` when the variable is unset so that configurations
    /// without secrets still load; a present but malformed key is an error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(ENCRYPTION_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::new(&key).map(Some),
            _ => Ok(None),
        }
    }

    /// Read the key from the process environment, falling back to a dotenv file.
    ///
    /// With `dotenv` unset, `.env` is searched for in the current directory
    /// and its parents. The process environment always wins.
    pub fn from_env_or_dotenv(dotenv: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        match Self::from_env()? {
            Some(cipher) => Ok(Some(cipher)),
            None => Self::from_dotenv(dotenv),
        }
    }

    /// Read the key from a dotenv file without touching the process environment.
    ///
    /// A missing file or a file without the key yields `Ok(None)`.
    pub fn from_dotenv(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        let shown = path.unwrap_or(Path::new(DOTENV_FILE));
        let env_file_error = |e: dotenvy::Error| ConfigError::EnvFile {
            path: shown.to_path_buf(),
            reason: e.to_string(),
        };

        let entries = match path {
            Some(path) => dotenvy::from_path_iter(path),
            None => dotenvy::dotenv_iter(),
        };
        let entries = match entries {
            Ok(entries) => entries,
            Err(e) if e.not_found() => return Ok(None),
            Err(e) => return Err(env_file_error(e)),
        };

        // Later assignments override earlier ones
        let mut key = None;
        for entry in entries {
            let (name, value) = entry.map_err(env_file_error)?;
            if name == ENCRYPTION_KEY_VAR {
                key = Some(value);
            }
        }

        match key {
            Some(key) if !key.trim().is_empty() => {
                debug!("Using {} from {}", ENCRYPTION_KEY_VAR, shown.display());
                Self::new(&key).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Generate a fresh random key.
    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    /// Encrypt a plaintext into a token suitable for the configuration file.
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a token produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<Secret, String> {
        let bytes = self
            .fernet
            .decrypt(token.trim())
            .map_err(|_| "token is invalid or was encrypted with a different key".to_string())?;
        String::from_utf8(bytes)
            .map(Secret)
            .map_err(|_| "decrypted value is not valid UTF-8".to_string())
    }
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

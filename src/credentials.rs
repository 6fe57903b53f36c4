// Username/password resolution.
//
// Runs once when a client is built. The username comes from the caller,
// then the config file, then the OS account. The password comes from the
// caller, then the config file, then each `PasswordSource` in turn until
// one of them answers.
//
// A known username without a password is an error; no username at all
// means the client talks to the service unauthenticated.

use crate::config::Config;
use crate::error::{OlogError, Result};
use std::fmt;
use tracing::{debug, info, warn};

/// Service name under which passwords live in the OS credential store.
pub const KEYRING_SERVICE: &str = "olog";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One place a password might be found for a given user.
pub trait PasswordSource {
    fn name(&self) -> &str;

    /// `Ok(None)` means "not here, try the next source".
    fn password(&self, username: &str) -> Result<Option<String>>;
}

/// The OS credential store (Keychain, Credential Manager, kernel keyring).
pub struct KeyringSource {
    service: String,
}

impl KeyringSource {
    pub fn new() -> Self {
        KeyringSource {
            service: KEYRING_SERVICE.to_string(),
        }
    }
}

impl Default for KeyringSource {
    fn default() -> Self {
        KeyringSource::new()
    }
}

impl PasswordSource for KeyringSource {
    fn name(&self) -> &str {
        "keyring"
    }

    fn password(&self, username: &str) -> Result<Option<String>> {
        let entry = match keyring::Entry::new(&self.service, username) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "keyring unavailable");
                return Ok(None);
            }
        };
        match entry.get_password() {
            Ok(p) => Ok(Some(p)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!(error = %e, "keyring lookup failed");
                Ok(None)
            }
        }
    }
}

/// Asks on the terminal without echoing.
pub struct PromptSource;

impl PasswordSource for PromptSource {
    fn name(&self) -> &str {
        "prompt"
    }

    fn password(&self, username: &str) -> Result<Option<String>> {
        let password = dialoguer::Password::new()
            .with_prompt(format!("Olog Password (username = {username})"))
            .allow_empty_password(true)
            .interact()?;
        Ok(Some(password).filter(|p| !p.is_empty()))
    }
}

/// Fixed answer, for scripts and tests.
pub struct StaticSource(pub Option<String>);

impl PasswordSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn password(&self, _username: &str) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Name of the logged-in OS account.
pub fn os_username() -> Option<String> {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|u| !u.trim().is_empty())
}

pub struct CredentialResolver {
    sources: Vec<Box<dyn PasswordSource>>,
    os_username: Option<String>,
}

impl CredentialResolver {
    /// Keyring, then the terminal prompt when `prompt` is set.
    pub fn standard(prompt: bool) -> Self {
        let mut sources: Vec<Box<dyn PasswordSource>> = vec![Box::new(KeyringSource::new())];
        if prompt {
            sources.push(Box::new(PromptSource));
        }
        CredentialResolver::with_sources(sources)
    }

    pub fn with_sources(sources: Vec<Box<dyn PasswordSource>>) -> Self {
        CredentialResolver {
            sources,
            os_username: os_username(),
        }
    }

    /// Overrides the OS account fallback.
    pub fn os_account(mut self, username: Option<String>) -> Self {
        self.os_username = username;
        self
    }

    pub fn resolve(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        config: &Config,
    ) -> Result<Option<Credentials>> {
        if let (Some(u), Some(p)) = (username, password) {
            info!(username = u, "using explicit credentials");
            return Ok(Some(Credentials::new(u, p)));
        }

        let Some(username) = config
            .value("username", username)
            .or_else(|| self.os_username.clone())
        else {
            info!("no username configured, authentication disabled");
            return Ok(None);
        };

        if let Some(p) = config.value("password", password) {
            info!(username = %username, "using configured password");
            return Ok(Some(Credentials::new(username, p)));
        }

        for source in &self.sources {
            match source.password(&username)? {
                Some(p) => {
                    info!(username = %username, source = source.name(), "password resolved");
                    return Ok(Some(Credentials::new(username, p)));
                }
                None => debug!(source = source.name(), "no password found"),
            }
        }
        Err(OlogError::AuthConfig(username))
    }
}

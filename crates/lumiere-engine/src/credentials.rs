use std::env;
use std::io::{self, BufRead, Write};
use std::sync::RwLock;

/// Host-supplied API key capability.
///
/// `request_credential` is the interactive "select a key" trigger; it reports
/// whether a key is available afterwards.
pub trait CredentialProvider: Send + Sync {
    fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn request_credential(&self) -> bool;

    fn credential(&self) -> Option<String>;
}

const KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Reads `GEMINI_API_KEY`, then `GOOGLE_API_KEY`. A key entered through
/// `request_credential` is kept in memory for the rest of the session.
#[derive(Debug, Default)]
pub struct EnvCredentials {
    entered: RwLock<Option<String>>,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts on stderr and reads one line from `input`.
    pub fn request_from(&self, input: &mut dyn BufRead) -> io::Result<bool> {
        eprint!("Paste a Gemini API key (blank to cancel): ");
        io::stderr().flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let key = line.trim();
        if !key.is_empty() {
            if let Ok(mut entered) = self.entered.write() {
                *entered = Some(key.to_string());
            }
        }
        Ok(self.has_credential())
    }
}

impl CredentialProvider for EnvCredentials {
    fn request_credential(&self) -> bool {
        if self.has_credential() {
            return true;
        }
        let stdin = io::stdin();
        let mut locked = stdin.lock();
        self.request_from(&mut locked).unwrap_or(false)
    }

    fn credential(&self) -> Option<String> {
        if let Some(key) = self.entered.read().ok().and_then(|entered| entered.clone()) {
            return Some(key);
        }
        KEY_VARS.iter().find_map(|key| non_empty_env(key))
    }
}

/// Fixed key, for embedding hosts that resolve credentials themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Option<String>);

impl CredentialProvider for StaticCredentials {
    fn request_credential(&self) -> bool {
        self.has_credential()
    }

    fn credential(&self) -> Option<String> {
        self.0
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

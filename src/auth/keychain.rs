//! Optional "remember my password" storage in the OS keychain.
//!
//! This is separate from the credential store: the keychain holds the
//! login password for form prefill, never the session tokens. A
//! password that gets rejected at login is removed again so a stale
//! entry does not keep prefilling the form.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "shopdash";

pub struct Keychain;

impl Keychain {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")
    }

    /// Remember the password for a username
    pub fn store(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve the remembered password for a username
    pub fn get_password(username: &str) -> Result<String> {
        Self::entry(username)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the remembered password
    pub fn delete(username: &str) -> Result<()> {
        Self::entry(username)?
            .delete_credential()
            .context("Failed to delete password from keychain")
    }

    pub fn has_password(username: &str) -> bool {
        Self::entry(username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}

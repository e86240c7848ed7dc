//! Durable credential persistence.
//!
//! The store keeps the access token, refresh token, and a serialized
//! snapshot of the signed-in user's profile in a JSON file under the
//! cache directory, so a session survives restarts.
//!
//! It has no logic beyond save/load/clear. A corrupt file or an
//! unparsable profile snapshot reads as "nothing stored" - corruption is
//! never surfaced past this module. All writes go through the session
//! manager; no other component touches these keys.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::Profile;

/// Credential file name in the cache directory
const CREDENTIAL_FILE: &str = "credentials.json";

/// On-disk layout. The profile snapshot is stored as a serialized JSON
/// string so a snapshot that no longer matches the `Profile` shape can
/// be dropped without losing the tokens next to it.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<String>,
}

/// What `load()` hands back: absent fields were never stored or failed
/// to parse.
#[derive(Debug, Default)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<Profile>,
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }

    /// Read the raw file, treating a missing or corrupt file as empty
    fn read_file(&self) -> CredentialFile {
        let path = self.file_path();
        if !path.exists() {
            return CredentialFile::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(file) => file,
                Err(e) => {
                    warn!(error = %e, "Credential file is corrupt, treating as empty");
                    CredentialFile::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to read credential file, treating as empty");
                CredentialFile::default()
            }
        }
    }

    fn write_file(&self, file: &CredentialFile) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let contents = serde_json::to_string_pretty(file)?;
        std::fs::write(self.file_path(), contents).context("Failed to write credential file")?;
        Ok(())
    }

    /// Persist both tokens, leaving any stored profile snapshot in place
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let mut file = self.read_file();
        file.access_token = Some(access_token.to_string());
        file.refresh_token = Some(refresh_token.to_string());
        self.write_file(&file)
    }

    /// Persist a rotated access token only
    pub fn save_access_token(&self, access_token: &str) -> Result<()> {
        let mut file = self.read_file();
        file.access_token = Some(access_token.to_string());
        self.write_file(&file)
    }

    /// Persist the profile snapshot
    pub fn save_user(&self, profile: &Profile) -> Result<()> {
        let mut file = self.read_file();
        file.user = Some(serde_json::to_string(profile)?);
        self.write_file(&file)
    }

    /// Load whatever is stored. Side-effect-free; an unparsable profile
    /// snapshot comes back as `user: None`.
    pub fn load(&self) -> StoredCredentials {
        let file = self.read_file();
        let user = file.user.as_deref().and_then(|snapshot| {
            match serde_json::from_str::<Profile>(snapshot) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    debug!(error = %e, "Stored profile snapshot is unparsable, ignoring");
                    None
                }
            }
        });
        StoredCredentials {
            access_token: file.access_token.filter(|t| !t.is_empty()),
            refresh_token: file.refresh_token.filter(|t| !t.is_empty()),
            user,
        }
    }

    /// Remove all stored credentials. Idempotent.
    pub fn clear(&self) -> Result<()> {
        let path = self.file_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_profile() -> Profile {
        Profile {
            id: "u1".to_string(),
            username: "alice".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: None,
            email: None,
            role: "Admin".to_string(),
        }
    }

    #[test]
    fn tokens_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        store.save_tokens("X", "R").unwrap();
        let loaded = store.load();
        assert_eq!(loaded.access_token.as_deref(), Some("X"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("R"));
        assert!(loaded.user.is_none());
    }

    #[test]
    fn profile_snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        store.save_tokens("X", "R").unwrap();
        store.save_user(&test_profile()).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.user.unwrap(), test_profile());
        // tokens untouched by the profile write
        assert_eq!(loaded.access_token.as_deref(), Some("X"));
    }

    #[test]
    fn rotating_access_token_keeps_refresh_token() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        store.save_tokens("X", "R").unwrap();
        store.save_access_token("X2").unwrap();

        let loaded = store.load();
        assert_eq!(loaded.access_token.as_deref(), Some("X2"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("R"));
    }

    #[test]
    fn clear_removes_everything_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        store.save_tokens("X", "R").unwrap();
        store.clear().unwrap();
        store.clear().unwrap();

        let loaded = store.load();
        assert!(loaded.access_token.is_none());
        assert!(loaded.refresh_token.is_none());
        assert!(loaded.user.is_none());
    }

    #[test]
    fn corrupt_snapshot_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        let raw = r#"{"access_token":"X","refresh_token":"R","user":"{not valid json"}"#;
        std::fs::write(dir.path().join(CREDENTIAL_FILE), raw).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.access_token.as_deref(), Some("X"));
        assert!(loaded.user.is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        std::fs::write(dir.path().join(CREDENTIAL_FILE), "garbage").unwrap();

        let loaded = store.load();
        assert!(loaded.access_token.is_none());
        assert!(loaded.refresh_token.is_none());
    }

    #[test]
    fn empty_token_strings_read_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());

        let raw = r#"{"access_token":"","refresh_token":""}"#;
        std::fs::write(dir.path().join(CREDENTIAL_FILE), raw).unwrap();

        let loaded = store.load();
        assert!(loaded.access_token.is_none());
        assert!(loaded.refresh_token.is_none());
    }
}

use serde::{Deserialize, Serialize};

/// Profile record for the signed-in user, as returned by `GET /users/{id}`.
///
/// A serialized copy of this struct is what the credential store keeps as
/// the session snapshot, so it must round-trip through JSON losslessly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
}

impl Profile {
    /// Display name for the status bar: "First Last", falling back to the username
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_payload() {
        let json = r#"{"id":"u1","username":"alice","firstName":"Alice","lastName":"Smith","email":"alice@example.com","role":"Administrator"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.display_name(), "Alice Smith");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let json = r#"{"id":"u2","username":"bob","role":"Clerk"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.display_name(), "bob");
    }
}

//! Access-token claim extraction.
//!
//! The backend's access tokens are JWTs; the only claim this client
//! consumes is the user id, which bootstraps the profile fetch after
//! login. The signature is deliberately NOT verified here - the token is
//! opaque to the client and the backend validates it on every request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

pub type Claims = serde_json::Map<String, Value>;

/// Decode the payload segment of a JWT into its claim set.
///
/// Malformed input (wrong segment count, invalid base64url, payload that
/// is not a JSON object) yields an empty claim set rather than an error;
/// callers treat a missing claim as the failure, not the parse.
pub fn decode_claims(token: &str) -> Claims {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Claims::new(),
    };

    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload) else {
        return Claims::new();
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => map,
        _ => Claims::new(),
    }
}

/// Resolve the user id from a claim set: the backend's `id` claim first,
/// then the standard `sub`. Numeric ids are stringified.
pub fn user_id(claims: &Claims) -> Option<String> {
    let value = claims.get("id").or_else(|| claims.get("sub"))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build an unsigned JWT with the given payload JSON (tests only)
#[cfg(test)]
pub(crate) fn make_token(claims_json: &str) -> String {
    let header = r#"{"alg":"HS256","typ":"JWT"}"#;
    let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json.as_bytes());
    format!("{}.{}.fake_signature", header_b64, claims_b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_id_claim() {
        let token = make_token(r#"{"id":"u1","name":"alice"}"#);
        let claims = decode_claims(&token);
        assert_eq!(user_id(&claims).as_deref(), Some("u1"));
        assert_eq!(claims.get("name").and_then(|v| v.as_str()), Some("alice"));
    }

    #[test]
    fn falls_back_to_sub_claim() {
        let token = make_token(r#"{"sub":"u7"}"#);
        assert_eq!(user_id(&decode_claims(&token)).as_deref(), Some("u7"));
    }

    #[test]
    fn stringifies_numeric_id() {
        let token = make_token(r#"{"id":42}"#);
        assert_eq!(user_id(&decode_claims(&token)).as_deref(), Some("42"));
    }

    #[test]
    fn wrong_segment_count_yields_empty_claims() {
        assert!(decode_claims("only-one-segment").is_empty());
        assert!(decode_claims("two.segments").is_empty());
        assert!(decode_claims("a.b.c.d").is_empty());
    }

    #[test]
    fn invalid_base64_yields_empty_claims() {
        assert!(decode_claims("head.???not-base64???.sig").is_empty());
    }

    #[test]
    fn non_object_payload_yields_empty_claims() {
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(decode_claims(&format!("h.{}.s", payload)).is_empty());
    }

    #[test]
    fn empty_id_claim_is_not_a_user_id() {
        let token = make_token(r#"{"id":""}"#);
        assert!(user_id(&decode_claims(&token)).is_none());
    }
}

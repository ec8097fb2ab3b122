//! Verida auth token parsing.
//!
//! Tokens reach us as a JSON document, a redirect URL / query string or a bare
//! token string. The raw input is first classified into a [`RawToken`], then
//! an ordered list of extraction strategies is tried; the first hit wins.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Auth token plus the DID it carries, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub did: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawToken {
    Json(Value),
    Text(String),
}

impl RawToken {
    pub fn classify(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with('{') || trimmed.starts_with('"') {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::String(inner)) => return RawToken::classify(&inner),
                Ok(value @ Value::Object(_)) => return Some(RawToken::Json(value)),
                _ => {}
            }
        }

        Some(RawToken::Text(trimmed.to_string()))
    }
}

type Strategy = fn(&RawToken) -> Option<TokenInfo>;

/// Extraction strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("nested token object", nested_token_object),
    ("token field", token_field),
    ("auth_token query", auth_token_query),
    ("bare token", bare_token),
];

/// Parses a raw token in any of the accepted shapes.
pub fn parse_token(raw: &str) -> Option<TokenInfo> {
    let classified = RawToken::classify(raw)?;
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let info = strategy(&classified)?;
        tracing::debug!("Verida token parsed via {} strategy", name);
        Some(info)
    })
}

fn did_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"did:[^:\s]+:[^:\s]+:[^&\s]+").ok())
        .as_ref()
}

/// Finds a `did:<method>:<network>:<id>` identifier inside arbitrary text.
pub fn extract_did(text: &str) -> Option<String> {
    did_pattern()?
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['"', '\'', ',', '}']).to_string())
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `{"token": {"did": "...", "_id": "..."}}`
fn nested_token_object(raw: &RawToken) -> Option<TokenInfo> {
    let RawToken::Json(value) = raw else {
        return None;
    };
    let inner = value.get("token").filter(|t| t.is_object())?;
    let token = text_field(inner, "_id").or_else(|| text_field(inner, "token"))?;

    Some(TokenInfo {
        did: text_field(inner, "did").or_else(|| text_field(value, "did")),
        token,
    })
}

/// `{"token": "..."}`, `{"auth_token": "..."}` or `{"_id": "..."}`
fn token_field(raw: &RawToken) -> Option<TokenInfo> {
    let RawToken::Json(value) = raw else {
        return None;
    };
    let token = ["token", "auth_token", "authToken", "_id"]
        .iter()
        .find_map(|key| text_field(value, key))?;

    Some(TokenInfo {
        did: text_field(value, "did").or_else(|| extract_did(&token)),
        token,
    })
}

/// Redirect URL or bare query string carrying `auth_token=` (and maybe `did=`).
fn auth_token_query(raw: &RawToken) -> Option<TokenInfo> {
    let RawToken::Text(text) = raw else {
        return None;
    };
    if !text.contains("auth_token=") {
        return None;
    }

    let query = match url::Url::parse(text) {
        Ok(parsed) => parsed.query().unwrap_or_default().to_string(),
        Err(_) => text
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or(text)
            .to_string(),
    };

    let mut token = None;
    let mut did = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "auth_token" => token = Some(value),
            "did" => did = Some(value),
            _ => {}
        }
    }

    let token = token?;
    Some(TokenInfo {
        did: did.or_else(|| extract_did(&token)),
        token,
    })
}

/// Plain token string, optionally prefixed with `Bearer `.
fn bare_token(raw: &RawToken) -> Option<TokenInfo> {
    let RawToken::Text(text) = raw else {
        return None;
    };
    let token = text.strip_prefix("Bearer ").unwrap_or(text).trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(TokenInfo {
        did: extract_did(token),
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_token_object() {
        let info = parse_token(r#"{"token":{"did":"did:vda:mainnet:0xabc","_id":"tok-1"}}"#).unwrap();
        assert_eq!(info.token, "tok-1");
        assert_eq!(info.did.as_deref(), Some("did:vda:mainnet:0xabc"));
    }

    #[test]
    fn test_json_string_wrapping_object() {
        let raw = serde_json::to_string(r#"{"token":{"_id":"tok-2"}}"#).unwrap();
        let info = parse_token(&raw).unwrap();
        assert_eq!(info.token, "tok-2");
        assert_eq!(info.did, None);
    }

    #[test]
    fn test_token_field_variants() {
        let info = parse_token(r#"{"token":"tok-3","did":"did:vda:testnet:0x1"}"#).unwrap();
        assert_eq!(info.token, "tok-3");
        assert_eq!(info.did.as_deref(), Some("did:vda:testnet:0x1"));

        let info = parse_token(r#"{"_id":"tok-4"}"#).unwrap();
        assert_eq!(info.token, "tok-4");
    }

    #[test]
    fn test_redirect_url_and_query_string() {
        let info = parse_token(
            "https://app.example.com/dashboard?did=did%3Avda%3Amainnet%3A0xdef&auth_token=tok-5",
        )
        .unwrap();
        assert_eq!(info.token, "tok-5");
        assert_eq!(info.did.as_deref(), Some("did:vda:mainnet:0xdef"));

        let info = parse_token("auth_token=tok-6").unwrap();
        assert_eq!(info.token, "tok-6");
        assert_eq!(info.did, None);
    }

    #[test]
    fn test_bare_token_with_bearer_prefix() {
        let info = parse_token("Bearer tok-7").unwrap();
        assert_eq!(info.token, "tok-7");

        let info = parse_token("did:vda:mainnet:0x99").unwrap();
        assert_eq!(info.did.as_deref(), Some("did:vda:mainnet:0x99"));
    }

    #[test]
    fn test_unusable_inputs() {
        assert_eq!(parse_token(""), None);
        assert_eq!(parse_token("   "), None);
        assert_eq!(parse_token(r#"{"other":1}"#), None);
        assert_eq!(parse_token("two words"), None);
    }

    #[test]
    fn test_extract_did_stops_at_query_separator() {
        assert_eq!(
            extract_did("x?did=did:vda:mainnet:0x1&y=2").as_deref(),
            Some("did:vda:mainnet:0x1")
        );
        assert_eq!(extract_did("no identifier here"), None);
    }
}

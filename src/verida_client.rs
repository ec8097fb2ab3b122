use crate::errors::AppError;
use crate::keywords::KeywordMatchResult;
use crate::source_models::{CountOrItems, TelegramMetrics};
use crate::verida_token::{self, TokenInfo};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

/// Base64 of the Verida social chat group schema URL.
pub const GROUP_SCHEMA_ENCODED: &str =
    "aHR0cHM6Ly9jb21tb24uc2NoZW1hcy52ZXJpZGEuaW8vc29jaWFsL2NoYXQvZ3JvdXAvdjAuMS4wL3NjaGVtYS5qc29u";
/// Base64 of the Verida social chat message schema URL (already URL-encoded).
pub const MESSAGE_SCHEMA_ENCODED: &str =
    "aHR0cHM6Ly9jb21tb24uc2NoZW1hcy52ZXJpZGEuaW8vc29jaWFsL2NoYXQvbWVzc2FnZS92MC4xLjAvc2NoZW1hLmpzb24%3D";

const QUERY_LIMIT: u32 = 100;
const UNKNOWN_DID: &str = "unknown";

/// Client for the Verida vault REST API.
///
/// Every request goes to the primary base URL first and to the legacy one if
/// that fails. Telegram lookups degrade through count, query and search
/// endpoints and finally to an all-zero result; they never fail.
#[derive(Clone)]
pub struct VeridaClient {
    client: reqwest::Client,
    base_urls: Vec<String>,
    keywords: Vec<String>,
    default_did: Option<String>,
}

impl VeridaClient {
    pub fn new(
        primary_url: &str,
        legacy_url: &str,
        timeout: Duration,
        keywords: Vec<String>,
        default_did: Option<String>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Verida client: {}", e))
            })?;

        let mut base_urls = vec![primary_url.trim_end_matches('/').to_string()];
        let legacy = legacy_url.trim_end_matches('/');
        if !legacy.is_empty() && legacy != base_urls[0] {
            base_urls.push(legacy.to_string());
        }

        Ok(Self {
            client,
            base_urls,
            keywords,
            default_did,
        })
    }

    async fn send_once(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth_header: &str,
    ) -> Result<Value, AppError> {
        let url = format!("{}{}", base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", auth_header);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Verida request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Verida returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Verida response: {}", e))
        })
    }

    /// Sends one request, trying each base URL in order.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth_header: &str,
    ) -> Result<Value, AppError> {
        let mut last_error =
            AppError::ExternalApiError("No Verida base URL configured".to_string());

        for base_url in &self.base_urls {
            match self
                .send_once(base_url, method.clone(), path, body, auth_header)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!("Verida {} via {} failed: {}", path, base_url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Telegram groups and messages for the token's vault.
    pub async fn telegram_activity(&self, token: &TokenInfo) -> TelegramMetrics {
        let auth = bearer(&token.token);

        let mut metrics = match self.count_activity(&auth).await {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::info!("Verida count API failed, trying query API: {}", e);
                match self.query_activity(&auth).await {
                    Ok(metrics) => metrics,
                    Err(e) => {
                        tracing::warn!("Verida query API failed, trying search API: {}", e);
                        match self.search_activity(&auth).await {
                            Ok(metrics) => metrics,
                            Err(e) => {
                                tracing::error!("Verida search API failed: {}", e);
                                self.metrics(0.0, 0.0, KeywordMatchResult::empty(&self.keywords))
                            }
                        }
                    }
                }
            }
        };

        metrics.did = token.did.clone();
        tracing::info!(
            "Verida Telegram activity: {} groups, {} messages",
            metrics.groups.count(),
            metrics.messages.count()
        );
        metrics
    }

    fn metrics(&self, groups: f64, messages: f64, matches: KeywordMatchResult) -> TelegramMetrics {
        TelegramMetrics {
            groups: CountOrItems::Count(groups),
            messages: CountOrItems::Count(messages),
            keyword_matches: Some(matches),
            did: None,
        }
    }

    async fn count_activity(&self, auth: &str) -> Result<TelegramMetrics, AppError> {
        let empty = json!({});
        let groups = self
            .request(
                Method::POST,
                &format!("/api/rest/v1/ds/count/{}", GROUP_SCHEMA_ENCODED),
                Some(&empty),
                auth,
            )
            .await?;
        let messages = self
            .request(
                Method::POST,
                &format!("/api/rest/v1/ds/count/{}", MESSAGE_SCHEMA_ENCODED),
                Some(&empty),
                auth,
            )
            .await?;

        Ok(self.metrics(
            count_field(&groups),
            count_field(&messages),
            KeywordMatchResult::empty(&self.keywords),
        ))
    }

    async fn query_activity(&self, auth: &str) -> Result<TelegramMetrics, AppError> {
        let body = json!({
            "options": {
                "sort": [{ "_id": "desc" }],
                "limit": QUERY_LIMIT
            }
        });
        let groups = self
            .request(
                Method::POST,
                &format!("/api/rest/v1/ds/query/{}", GROUP_SCHEMA_ENCODED),
                Some(&body),
                auth,
            )
            .await?;
        let messages = self
            .request(
                Method::POST,
                &format!("/api/rest/v1/ds/query/{}", MESSAGE_SCHEMA_ENCODED),
                Some(&body),
                auth,
            )
            .await?;

        let group_items = list_field(&groups, "results");
        let message_items = list_field(&messages, "results");

        let mut matches = KeywordMatchResult::empty(&self.keywords);
        for message in message_items {
            for key in ["content", "subject"] {
                if let Some(text) = message.get(key).and_then(Value::as_str) {
                    matches.absorb(text, &self.keywords);
                }
            }
        }

        Ok(self.metrics(
            group_items.len() as f64,
            message_items.len() as f64,
            matches,
        ))
    }

    async fn search_activity(&self, auth: &str) -> Result<TelegramMetrics, AppError> {
        let response = self
            .request(
                Method::GET,
                "/api/rest/v1/search/universal?keywords=telegram",
                None,
                auth,
            )
            .await?;

        let schema_has = |item: &Value, needle: &str| {
            item.get("schema")
                .and_then(Value::as_str)
                .is_some_and(|s| s.contains(needle))
        };
        let telegram_items: Vec<&Value> = list_field(&response, "items")
            .iter()
            .filter(|item| {
                schema_has(item, "chat/group")
                    || schema_has(item, "chat/message")
                    || item
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.to_lowercase().contains("telegram"))
            })
            .collect();

        let groups = telegram_items
            .iter()
            .filter(|item| schema_has(item, "chat/group"))
            .count();
        let messages: Vec<&Value> = telegram_items
            .iter()
            .copied()
            .filter(|item| schema_has(item, "chat/message"))
            .collect();

        let mut matches = KeywordMatchResult::empty(&self.keywords);
        for message in &messages {
            if let Some(text) = message.get("content").and_then(Value::as_str) {
                matches.absorb(text, &self.keywords);
            }
            let title = message
                .get("subject")
                .and_then(Value::as_str)
                .or_else(|| message.get("name").and_then(Value::as_str));
            if let Some(text) = title {
                matches.absorb(text, &self.keywords);
            }
        }

        Ok(self.metrics(groups as f64, messages.len() as f64, matches))
    }

    /// Resolves the vault owner's DID.
    ///
    /// Order: DID carried by the token, `/api/profile`, `/api/user/info`, a
    /// DID embedded in the raw token, the configured default, `"unknown"`.
    pub async fn resolve_did(&self, token: &TokenInfo) -> String {
        if let Some(did) = &token.did {
            return did.clone();
        }

        let auth = bearer(&token.token);
        for path in ["/api/profile", "/api/user/info"] {
            match self.request(Method::GET, path, None, &auth).await {
                Ok(body) => {
                    if let Some(did) = body.get("did").and_then(Value::as_str) {
                        tracing::info!("Resolved DID from {}", path);
                        return did.to_string();
                    }
                }
                Err(e) => tracing::warn!("DID lookup via {} failed: {}", path, e),
            }
        }

        if let Some(did) = verida_token::extract_did(&token.token) {
            return did;
        }

        match &self.default_did {
            Some(did) => {
                tracing::info!("Using default DID");
                did.clone()
            }
            None => UNKNOWN_DID.to_string(),
        }
    }
}

fn bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

fn count_field(body: &Value) -> f64 {
    body.get("count").and_then(Value::as_f64).unwrap_or(0.0)
}

fn list_field<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

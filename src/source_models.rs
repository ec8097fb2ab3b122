//! Typed metrics extracted from collaborator payloads.
//!
//! Twitter, wallet and Verida data arrive as loosely shaped JSON. Extraction
//! here never fails: a missing, null or malformed field becomes 0 / empty so
//! the affected metric simply contributes nothing to the score.

use crate::keywords::KeywordMatchResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============ Helpers ============

/// Reads a number that may be encoded as a JSON number or a numeric string.
fn as_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|n| !n.is_nan()).unwrap_or(0.0)
}

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}

fn as_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============ Twitter ============

/// Metrics read from a Twitter/X profile object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitterMetrics {
    pub followers_count: f64,
    pub friends_count: f64,
    pub statuses_count: f64,
    pub favourites_count: f64,
    pub media_count: f64,
    pub listed_count: f64,
    pub is_blue_verified: bool,
    pub creator_subscriptions_count: f64,
}

impl TwitterMetrics {
    /// Accepts the `{result: {...}}` envelope or the bare profile, with the
    /// counters either under `legacy` or at the top level.
    pub fn from_value(value: &Value) -> Self {
        let profile = match value.get("result") {
            Some(inner) if inner.is_object() => inner,
            _ => value,
        };
        let legacy = profile
            .get("legacy")
            .filter(|l| l.is_object())
            .unwrap_or(profile);

        Self {
            followers_count: as_number(legacy.get("followers_count")),
            friends_count: as_number(
                legacy
                    .get("friends_count")
                    .or_else(|| legacy.get("following_count")),
            ),
            statuses_count: as_number(legacy.get("statuses_count")),
            favourites_count: as_number(legacy.get("favourites_count")),
            media_count: as_number(legacy.get("media_count")),
            listed_count: as_number(legacy.get("listed_count")),
            is_blue_verified: as_flag(
                profile
                    .get("is_blue_verified")
                    .or_else(|| profile.get("verified")),
            ),
            creator_subscriptions_count: as_number(profile.get("creator_subscriptions_count")),
        }
    }

    /// Favourites + media + listed.
    pub fn activity(&self) -> f64 {
        self.favourites_count + self.media_count + self.listed_count
    }
}

// ============ Wallet ============

/// Metrics read from a wallet indexer summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetrics {
    pub active_chains: usize,
    pub native_balance: f64,
    pub defi_positions: usize,
    pub nft_count: usize,
    pub dapps_interacted: usize,
    pub lend_borrow_stake: f64,
    pub airdrops: f64,
    pub total_gas_spent: f64,
    pub web3_domains: usize,
}

impl WalletMetrics {
    pub fn from_value(value: &Value) -> Self {
        let nft_count = match array_len(value.get("walletNFTs").and_then(|n| n.get("result"))) {
            0 => array_len(value.get("nfts")),
            n => n,
        };

        Self {
            active_chains: array_len(value.get("activeChains")),
            native_balance: as_number(value.get("nativeBalance")),
            defi_positions: array_len(
                value
                    .get("defiPositionsSummary")
                    .and_then(|d| d.get("positions")),
            ),
            nft_count,
            dapps_interacted: array_len(value.get("dappsInteracted")),
            lend_borrow_stake: as_number(value.get("lendBorrowStake")),
            airdrops: as_number(value.get("airdrops")),
            total_gas_spent: as_number(value.get("totalGasSpent")),
            web3_domains: array_len(value.get("web3Domains")),
        }
    }
}

// ============ Telegram (Verida) ============

/// Count-or-items field: collaborators send either a number or the raw items.
#[derive(Debug, Clone, PartialEq)]
pub enum CountOrItems {
    Count(f64),
    Items(Vec<Value>),
}

impl Default for CountOrItems {
    fn default() -> Self {
        CountOrItems::Count(0.0)
    }
}

impl CountOrItems {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => CountOrItems::Items(items.clone()),
            other => CountOrItems::Count(as_number(other)),
        }
    }

    pub fn count(&self) -> f64 {
        match self {
            CountOrItems::Count(n) => *n,
            CountOrItems::Items(items) => items.len() as f64,
        }
    }

    pub fn items(&self) -> &[Value] {
        match self {
            CountOrItems::Count(_) => &[],
            CountOrItems::Items(items) => items,
        }
    }
}

/// Telegram activity as exported from a Verida vault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelegramMetrics {
    pub groups: CountOrItems,
    pub messages: CountOrItems,
    pub keyword_matches: Option<KeywordMatchResult>,
    pub did: Option<String>,
}

impl TelegramMetrics {
    /// Reads `groups`/`messages`/`keywordMatches` from the top level, falling
    /// back to the `data.telegram` / `data.keywordMatches` nesting.
    pub fn from_value(value: &Value) -> Self {
        let nested = value.get("data");
        let telegram = nested.and_then(|d| d.get("telegram"));

        let pick = |key: &str| {
            value
                .get(key)
                .filter(|v| !is_empty_count(v))
                .or_else(|| telegram.and_then(|t| t.get(key)))
        };

        let keyword_matches = value
            .get("keywordMatches")
            .or_else(|| nested.and_then(|d| d.get("keywordMatches")))
            .map(parse_keyword_matches);

        Self {
            groups: CountOrItems::from_value(pick("groups")),
            messages: CountOrItems::from_value(pick("messages")),
            keyword_matches,
            did: as_text(value.get("did")),
        }
    }

    /// Group items as free text: name, description and subject joined.
    pub fn group_texts(&self) -> Vec<String> {
        self.groups
            .items()
            .iter()
            .map(|g| joined_text(g, &["name", "description", "subject"]))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Message items as free text: text, body and content joined.
    pub fn message_texts(&self) -> Vec<String> {
        self.messages
            .items()
            .iter()
            .map(|m| joined_text(m, &["text", "body", "content"]))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn has_items(&self) -> bool {
        !self.groups.items().is_empty() || !self.messages.items().is_empty()
    }
}

/// Permission flags that mark a user as a group lead.
pub fn group_has_leadership(group: &Value) -> bool {
    let permissions = group.get("permissions");
    as_flag(permissions.and_then(|p| p.get("can_pin_messages")))
        || as_flag(permissions.and_then(|p| p.get("can_create_topics")))
}

/// Whether any of the group's positions is pinned.
pub fn group_has_pinned(group: &Value) -> bool {
    group
        .get("positions")
        .and_then(Value::as_array)
        .is_some_and(|positions| positions.iter().any(|p| as_flag(p.get("is_pinned"))))
}

fn is_empty_count(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn joined_text(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| as_text(item.get(*k)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_keyword_matches(value: &Value) -> KeywordMatchResult {
    let keywords: BTreeMap<String, u32> = value
        .get("keywords")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.to_lowercase(), as_number(Some(v)).max(0.0) as u32))
                .collect()
        })
        .unwrap_or_default();

    KeywordMatchResult {
        total_count: as_number(value.get("totalCount")).max(0.0) as u32,
        keywords,
    }
}

use crate::health::HealthSnapshot;
use crate::keywords::KeywordMatchResult;
use crate::scoring::{
    self, badge_bonus, clamp_score, connection_mean, round1, ComponentScores, ConnectionFlags,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

// ============ Policies ============

/// How several wallet entries roll up into one `walletScore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletRollup {
    Sum,
    #[default]
    Average,
}

impl WalletRollup {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(WalletRollup::Sum),
            "average" | "avg" | "mean" => Some(WalletRollup::Average),
            _ => None,
        }
    }

    /// Rolls up wallet scores; the result is clamped to [0, 10].
    pub fn apply(&self, scores: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = scores.fold((0.0, 0usize), |(s, c), v| (s + clamp_score(v), c + 1));
        if count == 0 {
            return 0.0;
        }
        match self {
            WalletRollup::Sum => clamp_score(sum),
            WalletRollup::Average => clamp_score(sum / count as f64),
        }
    }
}

/// How `totalScore` is derived from the sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum AggregationMode {
    /// Sum of sub-scores plus the capped badge bonus.
    #[default]
    Detailed,
    /// Mean of the connected (non-zero) sub-scores.
    ConnectionFlags,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Detailed => "detailed",
            AggregationMode::ConnectionFlags => "connectionFlags",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "connectionFlags" => AggregationMode::ConnectionFlags,
            _ => AggregationMode::Detailed,
        }
    }
}

// ============ Persisted record ============

/// Last Twitter snapshot kept alongside the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitterSnapshot {
    pub username: Option<String>,
    pub followers: f64,
    pub following: f64,
    pub tweets: f64,
    #[serde(default)]
    pub badges: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// One scored wallet. Addresses compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletEntry {
    pub address: String,
    pub score: f64,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub badges: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl WalletEntry {
    pub fn new(address: impl Into<String>, score: f64, details: serde_json::Value) -> Self {
        Self {
            address: address.into(),
            score: clamp_score(score),
            details,
            badges: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_badges(mut self, badges: Vec<String>) -> Self {
        self.badges = badges;
        self
    }

    pub fn matches(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

/// Verida / Telegram metadata behind `fomoScore`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeridaMetadata {
    pub did: Option<String>,
    pub score: f64,
    pub groups: f64,
    pub messages: f64,
    pub engagement_rate: f64,
    #[serde(default)]
    pub keywords: KeywordMatchResult,
    #[serde(default)]
    pub badges: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate score record, one per external user id.
///
/// `wallet_score`, `total_score` and `badges` are derived: every mutation goes
/// through [`UserRecord::apply`] which ends in [`UserRecord::recompute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: Option<String>,
    pub twitter_score: f64,
    pub twitter: Option<TwitterSnapshot>,
    pub wallet_score: f64,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
    #[serde(alias = "veridaScore")]
    pub fomo_score: f64,
    pub verida: Option<VeridaMetadata>,
    #[serde(default)]
    pub mode: AggregationMode,
    pub total_score: f64,
    #[serde(default)]
    pub badges: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            username: None,
            twitter_score: 0.0,
            twitter: None,
            wallet_score: 0.0,
            wallets: Vec::new(),
            fomo_score: 0.0,
            verida: None,
            mode: AggregationMode::Detailed,
            total_score: 0.0,
            badges: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts or updates a wallet entry by address.
    pub fn upsert_wallet(&mut self, entry: WalletEntry) {
        // A real wallet supersedes the connection-flag placeholder.
        if !entry.matches(CONNECTED_WALLET_PLACEHOLDER) {
            self.wallets.retain(|w| !w.matches(CONNECTED_WALLET_PLACEHOLDER));
        }
        match self.wallets.iter_mut().find(|w| w.matches(&entry.address)) {
            Some(existing) => {
                existing.score = clamp_score(entry.score);
                existing.details = entry.details;
                existing.badges = entry.badges;
                existing.updated_at = entry.updated_at;
            }
            None => self.wallets.push(WalletEntry {
                score: clamp_score(entry.score),
                ..entry
            }),
        }
    }

    /// Re-derives `wallet_score`, `badges` and `total_score` from the sub-scores.
    pub fn recompute(&mut self, rollup: WalletRollup) {
        self.twitter_score = clamp_score(self.twitter_score);
        self.fomo_score = clamp_score(self.fomo_score);
        self.wallet_score = rollup.apply(self.wallets.iter().map(|w| w.score));

        let mut seen: HashSet<String> = HashSet::new();
        let twitter_badges = self.twitter.iter().flat_map(|t| t.badges.iter());
        let wallet_badges = self.wallets.iter().flat_map(|w| w.badges.iter());
        let verida_badges = self.verida.iter().flat_map(|v| v.badges.iter());
        self.badges = twitter_badges
            .chain(wallet_badges)
            .chain(verida_badges)
            .filter(|b| seen.insert(b.to_string()))
            .cloned()
            .collect();

        self.total_score = aggregate_total(
            self.mode,
            self.twitter_score,
            self.wallet_score,
            self.fomo_score,
            self.badges.len(),
        );
    }

    /// Applies one atomic update and recomputes the derived fields.
    pub fn apply(&mut self, update: &ScoreUpdate, rollup: WalletRollup) {
        if let Some(username) = &update.username {
            self.username = Some(username.clone());
        }
        if let Some(score) = update.twitter_score {
            self.twitter_score = clamp_score(score);
        }
        if let Some(snapshot) = &update.twitter {
            self.twitter = Some(snapshot.clone());
        }
        if let Some(wallet) = &update.wallet {
            self.upsert_wallet(wallet.clone());
        }
        if let Some(verida) = &update.verida {
            self.fomo_score = clamp_score(verida.score);
            self.verida = Some(verida.clone());
        }
        if let Some(score) = update.fomo_score {
            self.fomo_score = clamp_score(score);
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(flags) = &update.connections {
            self.fill_connection_defaults(flags, rollup);
        }

        self.updated_at = Utc::now();
        self.recompute(rollup);
    }

    /// Merges a full record into this one (scalars overwrite, wallets upsert).
    pub fn merge(&mut self, incoming: &UserRecord, rollup: WalletRollup) {
        if incoming.username.is_some() {
            self.username = incoming.username.clone();
        }
        self.twitter_score = incoming.twitter_score;
        if incoming.twitter.is_some() {
            self.twitter = incoming.twitter.clone();
        }
        for wallet in &incoming.wallets {
            self.upsert_wallet(wallet.clone());
        }
        self.fomo_score = incoming.fomo_score;
        if incoming.verida.is_some() {
            self.verida = incoming.verida.clone();
        }
        self.mode = incoming.mode;
        self.updated_at = Utc::now();
        self.recompute(rollup);
    }

    fn fill_connection_defaults(&mut self, flags: &ConnectionFlags, rollup: WalletRollup) {
        if flags.twitter && self.twitter_score <= 0.0 {
            self.twitter_score = scoring::DEFAULT_TWITTER_CONNECTED;
        }
        if flags.wallet && rollup.apply(self.wallets.iter().map(|w| w.score)) <= 0.0 {
            self.upsert_wallet(WalletEntry::new(
                CONNECTED_WALLET_PLACEHOLDER,
                scoring::DEFAULT_WALLET_CONNECTED,
                serde_json::Value::Null,
            ));
        }
        if flags.verida && self.fomo_score <= 0.0 {
            self.fomo_score = scoring::DEFAULT_VERIDA_CONNECTED;
        }
    }

    pub fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            twitter_score: round1(self.twitter_score),
            wallet_score: round1(self.wallet_score),
            fomo_score: round1(self.fomo_score),
        }
    }
}

/// Address used for a wallet that is known connected but was never scored.
pub const CONNECTED_WALLET_PLACEHOLDER: &str = "connected";

/// `totalScore` as a pure function of the sub-scores.
pub fn aggregate_total(
    mode: AggregationMode,
    twitter: f64,
    wallet: f64,
    fomo: f64,
    badge_count: usize,
) -> f64 {
    match mode {
        AggregationMode::Detailed => clamp_score(
            clamp_score(twitter) + clamp_score(wallet) + clamp_score(fomo) + badge_bonus(badge_count),
        ),
        AggregationMode::ConnectionFlags => connection_mean(&[twitter, wallet, fomo]),
    }
}

/// One atomic mutation of a user record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreUpdate {
    pub username: Option<String>,
    pub twitter_score: Option<f64>,
    pub twitter: Option<TwitterSnapshot>,
    pub wallet: Option<WalletEntry>,
    pub verida: Option<VeridaMetadata>,
    pub fomo_score: Option<f64>,
    pub mode: Option<AggregationMode>,
    pub connections: Option<ConnectionFlags>,
}

impl ScoreUpdate {
    pub fn twitter_score(score: f64) -> Self {
        Self {
            twitter_score: Some(score),
            ..Default::default()
        }
    }

    pub fn wallet(entry: WalletEntry) -> Self {
        Self {
            wallet: Some(entry),
            ..Default::default()
        }
    }

    pub fn verida(metadata: VeridaMetadata) -> Self {
        Self {
            verida: Some(metadata),
            ..Default::default()
        }
    }

    pub fn fomo_score(score: f64) -> Self {
        Self {
            fomo_score: Some(score),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ScoreUpdate::default()
    }
}

// ============ API Models ============

/// Per-source sub-scores, rounded for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub twitter_score: f64,
    pub wallet_score: f64,
    pub fomo_score: f64,
}

/// Body of `POST /api/score/compute`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComputeScoreRequest {
    pub privy_id: Option<String>,
    /// Twitter handle; also accepted as `userId`.
    #[serde(alias = "userId")]
    pub username: Option<String>,
    pub wallet_address: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub twitter_data: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub wallet_data: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub verida_data: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub connections: Option<ConnectionFlags>,
}

/// Result of a score computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub privy_id: String,
    pub total_score: f64,
    pub sub_scores: ScoreBreakdown,
    pub badges: Vec<String>,
    pub mode: AggregationMode,
    pub overall_percent: u32,
    pub title: String,
    pub category: String,
    /// Raw component points of this computation, rounded.
    #[schema(value_type = Option<Object>)]
    pub components: Option<ComponentScores>,
    #[schema(value_type = Option<Object>)]
    pub keyword_matches: Option<KeywordMatchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalScoreResponse {
    pub privy_id: String,
    pub total_score: f64,
}

/// Body of `POST /api/score/update-fomo-score`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFomoScoreRequest {
    pub privy_id: Option<String>,
    pub fomo_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFomoScoreResponse {
    pub success: bool,
    pub message: String,
    pub fomo_score: f64,
    pub total_score: f64,
}

/// Body of the Verida endpoints. `token` may be a JSON string, a URL or a bare token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VeridaScoreRequest {
    pub privy_id: Option<String>,
    #[serde(alias = "authToken", alias = "auth_token")]
    pub token: Option<String>,
    pub did: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VeridaTokenResponse {
    pub did: Option<String>,
    pub auth_token: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Backend the next store operation will use.
    pub backend: String,
    pub durable: HealthSnapshot,
}

/// Body of `POST /api/admin/reconnect`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectResponse {
    pub reconnected: bool,
    pub backend: String,
}

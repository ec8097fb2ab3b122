use crate::errors::{require_user_id, AppError, ResultExt};
use crate::fallback::FallbackCoordinator;
use crate::models::{
    AggregationMode, ComputeScoreRequest, ScoreBreakdown, ScoreResponse, ScoreUpdate,
    TwitterSnapshot, UpdateFomoScoreResponse, UserRecord, VeridaMetadata, VeridaScoreRequest,
    WalletEntry,
};
use crate::scoring::{
    fomo_category, normalize_raw, overall_percent, round1, score_title, ScoreCard,
    ScoreNormalizer,
};
use crate::source_models::{TelegramMetrics, TwitterMetrics, WalletMetrics};
use crate::verida_client::VeridaClient;
use crate::verida_token;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Address used when a wallet payload arrives without one.
pub const PRIMARY_WALLET: &str = "primary";

/// Orchestrates scoring and persistence.
///
/// Raw collaborator payloads are parsed leniently, scored by the
/// [`ScoreNormalizer`] and written as one atomic [`ScoreUpdate`] through the
/// [`FallbackCoordinator`].
pub struct ScoreService {
    store: Arc<FallbackCoordinator>,
    normalizer: ScoreNormalizer,
    verida: VeridaClient,
}

impl ScoreService {
    pub fn new(
        store: Arc<FallbackCoordinator>,
        normalizer: ScoreNormalizer,
        verida: VeridaClient,
    ) -> Self {
        Self {
            store,
            normalizer,
            verida,
        }
    }

    pub fn store(&self) -> &Arc<FallbackCoordinator> {
        &self.store
    }

    /// Scores whatever sources the request carries and persists the result.
    ///
    /// Detailed metric payloads take precedence over connection flags. A
    /// request with neither returns the current aggregate unchanged.
    pub async fn compute_and_persist(
        &self,
        request: &ComputeScoreRequest,
    ) -> Result<ScoreResponse, AppError> {
        let id = require_user_id(request.privy_id.as_deref())?;

        let twitter = object(request.twitter_data.as_ref()).map(TwitterMetrics::from_value);
        let wallet = object(request.wallet_data.as_ref()).map(WalletMetrics::from_value);
        let telegram = object(request.verida_data.as_ref()).map(TelegramMetrics::from_value);

        let detailed = twitter.is_some() || wallet.is_some() || telegram.is_some();
        let connections = request.connections.filter(|flags| flags.any());

        let (update, card) = if detailed {
            let card = self
                .normalizer
                .score(twitter.as_ref(), wallet.as_ref(), telegram.as_ref());
            let update = self.detailed_update(request, twitter.as_ref(), telegram.as_ref(), &card);
            tracing::info!(
                "Computed detailed score for {}: {:.2} ({} badges)",
                id,
                card.score,
                card.badges.len()
            );
            (Some(update), Some(card))
        } else if let Some(flags) = connections {
            tracing::info!("Computing connection-flag score for {}: {:?}", id, flags);
            let update = ScoreUpdate {
                username: request.username.clone(),
                mode: Some(AggregationMode::ConnectionFlags),
                connections: Some(flags),
                ..Default::default()
            };
            (Some(update), None)
        } else {
            (None, None)
        };

        let record = match update {
            Some(update) => self
                .store
                .apply_update(id, &update)
                .await
                .with_context(|| format!("persisting score for {}", id))?,
            None => {
                tracing::debug!("No score inputs for {}, returning current aggregate", id);
                self.store
                    .find_user(id)
                    .await?
                    .unwrap_or_else(|| UserRecord::new(id))
            }
        };

        Ok(score_response(&record, card.as_ref()))
    }

    fn detailed_update(
        &self,
        request: &ComputeScoreRequest,
        twitter: Option<&TwitterMetrics>,
        telegram: Option<&TelegramMetrics>,
        card: &ScoreCard,
    ) -> ScoreUpdate {
        let now = Utc::now();
        let mut update = ScoreUpdate {
            username: request.username.clone(),
            mode: Some(AggregationMode::Detailed),
            ..Default::default()
        };

        if let (Some(metrics), Some(scored)) = (twitter, &card.twitter) {
            update.twitter_score = Some(normalize_raw(scored.raw));
            update.twitter = Some(TwitterSnapshot {
                username: request.username.clone(),
                followers: metrics.followers_count,
                following: metrics.friends_count,
                tweets: metrics.statuses_count,
                badges: scored.badges.clone(),
                updated_at: now,
            });
        }

        if let Some(scored) = &card.wallet {
            let details = request.wallet_data.clone().unwrap_or(Value::Null);
            let address = wallet_address(request.wallet_address.as_deref(), &details);
            update.wallet = Some(
                WalletEntry::new(address, normalize_raw(scored.raw()), details)
                    .with_badges(scored.badges.clone()),
            );
        }

        if let (Some(metrics), Some(scored)) = (telegram, &card.telegram) {
            update.verida = Some(VeridaMetadata {
                did: metrics.did.clone(),
                score: normalize_raw(scored.raw),
                groups: metrics.groups.count(),
                messages: metrics.messages.count(),
                engagement_rate: engagement_rate(request.verida_data.as_ref()),
                keywords: card.keyword_matches.clone().unwrap_or_default(),
                badges: scored.badges.clone(),
                updated_at: Some(now),
            });
        }

        update
    }

    /// Total score for a user; 0 when the user is unknown.
    pub async fn get_total_score(&self, id: &str) -> Result<f64, AppError> {
        let id = require_user_id(Some(id))?;
        let total = self
            .store
            .find_user(id)
            .await?
            .map(|record| record.total_score)
            .unwrap_or(0.0);
        Ok(round1(total))
    }

    /// Per-source sub-scores; zeros when the user is unknown.
    pub async fn get_breakdown(&self, id: &str) -> Result<ScoreBreakdown, AppError> {
        let id = require_user_id(Some(id))?;
        Ok(self
            .store
            .find_user(id)
            .await?
            .map(|record| record.breakdown())
            .unwrap_or_default())
    }

    pub async fn update_fomo_score(
        &self,
        id: Option<&str>,
        score: Option<f64>,
    ) -> Result<UpdateFomoScoreResponse, AppError> {
        let id = require_user_id(id)?;
        let score = score
            .filter(|s| s.is_finite())
            .ok_or_else(|| AppError::BadRequest("Provide a numeric fomoScore".to_string()))?;

        let record = self.store.update_fomo_score(id, score).await?;
        tracing::info!("Updated FOMO score for {}: {:.2}", id, record.fomo_score);

        Ok(UpdateFomoScoreResponse {
            success: true,
            message: "FOMOscore updated successfully".to_string(),
            fomo_score: round1(record.fomo_score),
            total_score: round1(record.total_score),
        })
    }

    /// Fetches Telegram activity from the user's Verida vault, scores it and
    /// persists it as the user's `fomoScore`.
    pub async fn score_verida(
        &self,
        request: &VeridaScoreRequest,
    ) -> Result<ScoreResponse, AppError> {
        let id = require_user_id(request.privy_id.as_deref())?;
        let mut token = request
            .token
            .as_deref()
            .and_then(verida_token::parse_token)
            .ok_or_else(|| AppError::BadRequest("Provide a Verida auth token".to_string()))?;

        if let Some(did) = request.did.as_deref().filter(|d| !d.trim().is_empty()) {
            token.did = Some(did.trim().to_string());
        }
        if token.did.is_none() {
            token.did = Some(self.verida.resolve_did(&token).await);
        }

        let metrics = self.verida.telegram_activity(&token).await;
        let card = self.normalizer.score(None, None, Some(&metrics));

        let mut update = ScoreUpdate::default();
        if let Some(scored) = &card.telegram {
            update.verida = Some(VeridaMetadata {
                did: token.did.clone(),
                score: normalize_raw(scored.raw),
                groups: metrics.groups.count(),
                messages: metrics.messages.count(),
                engagement_rate: 0.0,
                keywords: card.keyword_matches.clone().unwrap_or_default(),
                badges: scored.badges.clone(),
                updated_at: Some(Utc::now()),
            });
        }

        let record = self
            .store
            .apply_update(id, &update)
            .await
            .context("persisting Verida score")?;
        Ok(score_response(&record, Some(&card)))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        self.store.get_all_users().await
    }
}

fn object(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| v.is_object())
}

/// Wallet address from the request, the payload, or [`PRIMARY_WALLET`].
fn wallet_address(explicit: Option<&str>, details: &Value) -> String {
    explicit
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .or_else(|| {
            ["address", "walletAddress"].iter().find_map(|key| {
                details
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| PRIMARY_WALLET.to_string())
}

fn engagement_rate(verida_data: Option<&Value>) -> f64 {
    let Some(data) = verida_data else {
        return 0.0;
    };
    data.get("engagementRate")
        .or_else(|| {
            data.get("data")
                .and_then(|d| d.get("telegram"))
                .and_then(|t| t.get("engagementRate"))
        })
        .and_then(Value::as_f64)
        .filter(|r| r.is_finite())
        .unwrap_or(0.0)
}

fn score_response(record: &UserRecord, card: Option<&ScoreCard>) -> ScoreResponse {
    let total = round1(record.total_score);
    let percent = overall_percent(record.total_score);

    ScoreResponse {
        privy_id: record.id.clone(),
        total_score: total,
        sub_scores: record.breakdown(),
        badges: record.badges.clone(),
        mode: record.mode,
        overall_percent: percent,
        title: score_title(percent).to_string(),
        category: fomo_category(record.total_score).to_string(),
        components: card.map(|c| c.components.rounded()),
        keyword_matches: card.and_then(|c| c.keyword_matches.clone()),
    }
}

//! Composite score normalizer.
//!
//! Every metric is scored with one primitive, [`tier`], against a metric
//! specific weight and threshold triple. Per-source scorers are independent
//! pure functions; [`ScoreNormalizer::score`] composes them and [`blend`]
//! folds the raw points into the bounded 0-10 score with a badge bonus.

use crate::keywords::{self, KeywordMatchResult};
use crate::source_models::{
    group_has_leadership, group_has_pinned, TelegramMetrics, TwitterMetrics, WalletMetrics,
};
use serde::{Deserialize, Serialize};

/// Upper bound for every score.
pub const MAX_SCORE: f64 = 10.0;
/// Raw points are divided by this before clamping (assumes a ~200 point ceiling).
pub const RAW_DIVISOR: f64 = 20.0;
/// Bonus added per badge.
pub const BADGE_BONUS_PER_BADGE: f64 = 0.5;
/// Cap on the total badge bonus.
pub const BADGE_BONUS_CAP: f64 = 2.0;

/// Default per-source scores used when only connection flags are known.
pub const DEFAULT_TWITTER_CONNECTED: f64 = 5.0;
pub const DEFAULT_WALLET_CONNECTED: f64 = 6.0;
pub const DEFAULT_VERIDA_CONNECTED: f64 = 8.0;

/// Strict `>` threshold triple for [`tier`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Thresholds {
    pub const fn new(low: f64, medium: f64, high: f64) -> Self {
        Self { low, medium, high }
    }
}

pub const FOLLOWERS: Thresholds = Thresholds::new(100_000.0, 1_000_000.0, 10_000_000.0);
pub const SOCIAL_ACTIVITY: Thresholds = Thresholds::new(10_000.0, 50_000.0, 100_000.0);
pub const SUBSCRIPTIONS: Thresholds = Thresholds::new(1.0, 3.0, 5.0);
pub const ACTIVE_CHAINS: Thresholds = Thresholds::new(1.0, 2.0, 3.0);
pub const NATIVE_BALANCE: Thresholds = Thresholds::new(0.5, 1.0, 5.0);
pub const DEFI_POSITIONS: Thresholds = Thresholds::new(1.0, 3.0, 5.0);
pub const NFTS: Thresholds = Thresholds::new(1.0, 5.0, 10.0);
pub const DAPPS: Thresholds = Thresholds::new(1.0, 3.0, 5.0);
pub const LEND_BORROW_STAKE: Thresholds = Thresholds::new(1.0, 2.0, 5.0);
pub const AIRDROPS: Thresholds = Thresholds::new(1.0, 2.0, 5.0);
pub const GAS_SPENT: Thresholds = Thresholds::new(10.0, 50.0, 100.0);
pub const WEB3_DOMAINS: Thresholds = Thresholds::new(1.0, 2.0, 5.0);
pub const TELEGRAM_GROUPS: Thresholds = Thresholds::new(1.0, 3.0, 5.0);
pub const TELEGRAM_MESSAGES: Thresholds = Thresholds::new(10.0, 100.0, 500.0);

/// The single scoring primitive.
///
/// Returns `weight` above `high`, `0.75 * weight` above `medium`,
/// `0.5 * weight` above `low`, otherwise 0. NaN scores 0.
pub fn tier(value: f64, weight: f64, thresholds: Thresholds) -> f64 {
    if value > thresholds.high {
        weight
    } else if value > thresholds.medium {
        weight * 0.75
    } else if value > thresholds.low {
        weight * 0.5
    } else {
        0.0
    }
}

/// Clamps into [0, 10]; NaN becomes 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_SCORE)
    }
}

/// Rounds to one decimal place for presentation.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Raw points to a bounded sub-score.
pub fn normalize_raw(raw: f64) -> f64 {
    clamp_score(raw / RAW_DIVISOR)
}

pub fn badge_bonus(badge_count: usize) -> f64 {
    (badge_count as f64 * BADGE_BONUS_PER_BADGE).min(BADGE_BONUS_CAP)
}

/// Weight per metric bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub social: f64,
    pub crypto: f64,
    pub nft: f64,
    pub community: f64,
    pub telegram: f64,
    pub verification: f64,
    pub telegram_engagement: f64,
    pub telegram_leadership: f64,
    pub telegram_pinned: f64,
    pub dapp_interaction: f64,
    pub lend_borrow_stake: f64,
    pub airdrop_participation: f64,
    pub gas_spent: f64,
    pub web3_domains: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            social: 40.0,
            crypto: 30.0,
            nft: 20.0,
            community: 10.0,
            telegram: 15.0,
            verification: 10.0,
            telegram_engagement: 5.0,
            telegram_leadership: 5.0,
            telegram_pinned: 3.0,
            dapp_interaction: 3.0,
            lend_borrow_stake: 4.0,
            airdrop_participation: 5.0,
            gas_spent: 2.0,
            web3_domains: 6.0,
        }
    }
}

/// Raw points plus badges earned by one scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceScore {
    pub raw: f64,
    pub badges: Vec<String>,
}

impl SourceScore {
    fn badge_if(&mut self, earned: bool, badge: &str) {
        if earned {
            self.badges.push(badge.to_string());
        }
    }
}

/// Unrounded raw points per component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    pub social_score: f64,
    pub community_score: f64,
    pub crypto_score: f64,
    pub nft_score: f64,
    pub dapp_score: f64,
    pub lend_borrow_stake_score: f64,
    pub airdrop_score: f64,
    pub gas_spent_score: f64,
    pub web3_domains_score: f64,
    pub telegram_score: f64,
}

impl ComponentScores {
    pub fn twitter_raw(&self) -> f64 {
        self.social_score + self.community_score
    }

    pub fn wallet_raw(&self) -> f64 {
        self.crypto_score
            + self.nft_score
            + self.dapp_score
            + self.lend_borrow_stake_score
            + self.airdrop_score
            + self.gas_spent_score
            + self.web3_domains_score
    }

    pub fn total_raw(&self) -> f64 {
        self.twitter_raw() + self.wallet_raw() + self.telegram_score
    }

    pub fn rounded(&self) -> Self {
        Self {
            social_score: round1(self.social_score),
            community_score: round1(self.community_score),
            crypto_score: round1(self.crypto_score),
            nft_score: round1(self.nft_score),
            dapp_score: round1(self.dapp_score),
            lend_borrow_stake_score: round1(self.lend_borrow_stake_score),
            airdrop_score: round1(self.airdrop_score),
            gas_spent_score: round1(self.gas_spent_score),
            web3_domains_score: round1(self.web3_domains_score),
            telegram_score: round1(self.telegram_score),
        }
    }
}

/// Wallet sub-scores kept apart so they can be reported per component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletScore {
    pub crypto: f64,
    pub nft: f64,
    pub dapp: f64,
    pub lend_borrow_stake: f64,
    pub airdrop: f64,
    pub gas_spent: f64,
    pub web3_domains: f64,
    pub badges: Vec<String>,
}

impl WalletScore {
    pub fn raw(&self) -> f64 {
        self.crypto
            + self.nft
            + self.dapp
            + self.lend_borrow_stake
            + self.airdrop
            + self.gas_spent
            + self.web3_domains
    }
}

/// Result of a detailed-mode computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCard {
    /// Final bounded score, unrounded.
    pub score: f64,
    pub badges: Vec<String>,
    pub components: ComponentScores,
    pub twitter: Option<SourceScore>,
    pub wallet: Option<WalletScore>,
    pub telegram: Option<SourceScore>,
    pub keyword_matches: Option<KeywordMatchResult>,
}

/// Social (Twitter) points: followers, activity composite and verification.
pub fn social_score(metrics: &TwitterMetrics, weights: &ScoringWeights) -> SourceScore {
    let mut score = SourceScore {
        raw: tier(metrics.followers_count, weights.social, FOLLOWERS)
            + tier(metrics.activity(), weights.social, SOCIAL_ACTIVITY),
        badges: Vec::new(),
    };
    if metrics.is_blue_verified {
        score.raw += weights.verification;
    }

    score.badge_if(score.raw > 30.0, "Crypto Communicator");
    score.badge_if(metrics.friends_count > 2000.0, "Social Connector");
    score.badge_if(metrics.statuses_count > 5000.0, "Twitter Veteran");
    score
}

/// Community points from creator subscriptions.
pub fn community_score(metrics: &TwitterMetrics, weights: &ScoringWeights) -> SourceScore {
    let mut score = SourceScore {
        raw: tier(
            metrics.creator_subscriptions_count,
            weights.community,
            SUBSCRIPTIONS,
        ),
        badges: Vec::new(),
    };
    score.badge_if(score.raw > 5.0, "DAO Diplomat");
    score
}

/// Crypto, NFT and on-chain activity points for one wallet.
pub fn wallet_score(metrics: &WalletMetrics, weights: &ScoringWeights) -> WalletScore {
    let active_chains = metrics.active_chains as f64;
    let defi_positions = metrics.defi_positions as f64;
    let nfts = metrics.nft_count as f64;
    let dapps = metrics.dapps_interacted as f64;
    let domains = metrics.web3_domains as f64;

    let mut badges = Vec::new();
    let mut badge_if = |earned: bool, badge: &str| {
        if earned {
            badges.push(badge.to_string());
        }
    };

    badge_if(defi_positions > 3.0, "Liquidity Laureate");
    badge_if(metrics.lend_borrow_stake > 3.0, "DeFi Master");
    badge_if(metrics.airdrops > 5.0, "Airdrop Veteran");
    badge_if(nfts > 10.0, "NFT Networker");
    badge_if(nfts > 20.0, "NFT Whale");
    badge_if(dapps > 5.0, "Dapp Diplomat");
    badge_if(metrics.lend_borrow_stake > 2.0, "Staking Storyteller");
    badge_if(metrics.total_gas_spent > 100.0, "Gas Gladiator");
    badge_if(domains > 0.0, "Verified Visionary");
    badge_if(active_chains > 5.0, "Chain Explorer");

    WalletScore {
        crypto: tier(active_chains, weights.crypto, ACTIVE_CHAINS)
            + tier(metrics.native_balance, weights.crypto, NATIVE_BALANCE)
            + tier(defi_positions, weights.crypto, DEFI_POSITIONS),
        nft: tier(nfts, weights.nft, NFTS),
        dapp: tier(dapps, weights.dapp_interaction, DAPPS),
        lend_borrow_stake: tier(
            metrics.lend_borrow_stake,
            weights.lend_borrow_stake,
            LEND_BORROW_STAKE,
        ),
        airdrop: tier(metrics.airdrops, weights.airdrop_participation, AIRDROPS),
        gas_spent: tier(metrics.total_gas_spent, weights.gas_spent, GAS_SPENT),
        web3_domains: tier(domains, weights.web3_domains, WEB3_DOMAINS),
        badges,
    }
}

/// Keyword matches for a Telegram export.
///
/// Item arrays are rescanned; otherwise any precomputed matches are used.
pub fn telegram_keyword_matches(metrics: &TelegramMetrics, keywords: &[String]) -> KeywordMatchResult {
    if metrics.has_items() {
        let group_texts = metrics.group_texts();
        let message_texts = metrics.message_texts();
        return keywords::scan_all(
            group_texts
                .iter()
                .chain(message_texts.iter())
                .map(String::as_str),
            keywords,
        );
    }
    metrics
        .keyword_matches
        .clone()
        .unwrap_or_else(|| KeywordMatchResult::empty(keywords))
}

/// Telegram points: groups, messages, keyword engagement and group roles.
pub fn telegram_score(
    metrics: &TelegramMetrics,
    matches: &KeywordMatchResult,
    weights: &ScoringWeights,
) -> SourceScore {
    let groups = metrics.groups.count();
    let mut raw = tier(groups, weights.telegram, TELEGRAM_GROUPS)
        + tier(metrics.messages.count(), weights.telegram, TELEGRAM_MESSAGES)
        + matches.total_count as f64 * weights.telegram_engagement;

    for group in metrics.groups.items() {
        if group_has_leadership(group) {
            raw += weights.telegram_leadership;
        }
        if group_has_pinned(group) {
            raw += weights.telegram_pinned;
        }
    }

    let mut score = SourceScore {
        raw,
        badges: Vec::new(),
    };
    score.badge_if(score.raw > 10.0, "Telegram Titan");
    score.badge_if(groups > 10.0, "Community Leader");
    score
}

/// Folds raw points and badge count into the bounded final score.
pub fn blend(raw_total: f64, badge_count: usize) -> f64 {
    clamp_score(normalize_raw(raw_total) + badge_bonus(badge_count))
}

/// Which sources are known to be connected, for the flag-only aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionFlags {
    #[serde(default)]
    pub twitter: bool,
    #[serde(default)]
    pub wallet: bool,
    #[serde(default)]
    pub verida: bool,
}

impl ConnectionFlags {
    pub fn any(&self) -> bool {
        self.twitter || self.wallet || self.verida
    }
}

/// Unweighted mean of the given sub-scores, ignoring zeros (not connected).
pub fn connection_mean(scores: &[f64]) -> f64 {
    let connected: Vec<f64> = scores
        .iter()
        .map(|s| clamp_score(*s))
        .filter(|s| *s > 0.0)
        .collect();
    if connected.is_empty() {
        return 0.0;
    }
    clamp_score(connected.iter().sum::<f64>() / connected.len() as f64)
}

/// Flag-only score: connected sources take their default constant.
pub fn connection_flag_score(flags: &ConnectionFlags) -> f64 {
    let pick = |connected: bool, default: f64| if connected { default } else { 0.0 };
    connection_mean(&[
        pick(flags.twitter, DEFAULT_TWITTER_CONNECTED),
        pick(flags.wallet, DEFAULT_WALLET_CONNECTED),
        pick(flags.verida, DEFAULT_VERIDA_CONNECTED),
    ])
}

/// Dashboard percentage (score ×10, rounded).
pub fn overall_percent(score: f64) -> u32 {
    (clamp_score(score) * 10.0).round() as u32
}

/// Dashboard title for a percentage.
pub fn score_title(percent: u32) -> &'static str {
    match percent {
        0..=29 => "BEGINNER",
        30..=59 => "INTERMEDIATE",
        60..=89 => "ADVANCED",
        _ => "EXPERT",
    }
}

/// FOMO category for a 0-10 score.
pub fn fomo_category(score: f64) -> &'static str {
    if score < 3.0 {
        "Noob"
    } else if score < 6.0 {
        "Intern"
    } else if score < 8.0 {
        "Associate"
    } else {
        "Pro"
    }
}

/// Detailed-mode scorer, parametrized by weights and engage keywords.
#[derive(Debug, Clone)]
pub struct ScoreNormalizer {
    weights: ScoringWeights,
    keywords: Vec<String>,
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), keywords::default_keywords())
    }
}

impl ScoreNormalizer {
    pub fn new(weights: ScoringWeights, keywords: Vec<String>) -> Self {
        Self { weights, keywords }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn score_wallet(&self, metrics: &WalletMetrics) -> WalletScore {
        wallet_score(metrics, &self.weights)
    }

    /// Telegram score together with the keyword matches it was built from.
    pub fn score_telegram(&self, metrics: &TelegramMetrics) -> (SourceScore, KeywordMatchResult) {
        let matches = telegram_keyword_matches(metrics, &self.keywords);
        (telegram_score(metrics, &matches, &self.weights), matches)
    }

    /// Scores whichever sources are present and blends them.
    pub fn score(
        &self,
        twitter: Option<&TwitterMetrics>,
        wallet: Option<&WalletMetrics>,
        telegram: Option<&TelegramMetrics>,
    ) -> ScoreCard {
        let mut card = ScoreCard::default();

        if let Some(metrics) = twitter {
            let social = social_score(metrics, &self.weights);
            let community = community_score(metrics, &self.weights);
            card.components.social_score = social.raw;
            card.components.community_score = community.raw;
            let mut badges = social.badges;
            badges.extend(community.badges);
            card.twitter = Some(SourceScore {
                raw: social.raw + community.raw,
                badges,
            });
        }

        if let Some(metrics) = wallet {
            let scored = self.score_wallet(metrics);
            card.components.crypto_score = scored.crypto;
            card.components.nft_score = scored.nft;
            card.components.dapp_score = scored.dapp;
            card.components.lend_borrow_stake_score = scored.lend_borrow_stake;
            card.components.airdrop_score = scored.airdrop;
            card.components.gas_spent_score = scored.gas_spent;
            card.components.web3_domains_score = scored.web3_domains;
            card.wallet = Some(scored);
        }

        if let Some(metrics) = telegram {
            let (scored, matches) = self.score_telegram(metrics);
            card.components.telegram_score = scored.raw;
            card.telegram = Some(scored);
            card.keyword_matches = Some(matches);
        }

        card.badges = card
            .twitter
            .iter()
            .flat_map(|s| s.badges.iter())
            .chain(card.wallet.iter().flat_map(|w| w.badges.iter()))
            .chain(card.telegram.iter().flat_map(|s| s.badges.iter()))
            .cloned()
            .collect();
        card.score = blend(card.components.total_raw(), card.badges.len());
        card
    }
}

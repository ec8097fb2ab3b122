/// Property-based tests using proptest
/// Invariants of the scoring primitives, the keyword scanner and record aggregation
use fomo_score::keywords::{default_keywords, scan};
use fomo_score::models::{AggregationMode, ScoreUpdate, UserRecord, WalletEntry, WalletRollup};
use fomo_score::scoring::{
    blend, clamp_score, connection_mean, tier, ScoreNormalizer, Thresholds, FOLLOWERS,
};
use fomo_score::source_models::{TelegramMetrics, TwitterMetrics, WalletMetrics};
use fomo_score::verida_token::parse_token;
use proptest::prelude::*;
use serde_json::json;

// Property: tier is a non-decreasing step function
proptest! {
    #[test]
    fn tier_is_monotonic(a in 0.0f64..20_000_000.0, b in 0.0f64..20_000_000.0, weight in 0.0f64..100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(tier(lo, weight, FOLLOWERS) <= tier(hi, weight, FOLLOWERS));
    }

    #[test]
    fn tier_of_zero_is_zero(weight in 0.0f64..100.0, low in 0.0f64..10.0) {
        let thresholds = Thresholds::new(low, low + 1.0, low + 2.0);
        prop_assert_eq!(tier(0.0, weight, thresholds), 0.0);
    }

    #[test]
    fn tier_only_returns_known_fractions(value in proptest::num::f64::ANY, weight in 0.0f64..100.0) {
        let result = tier(value, weight, FOLLOWERS);
        prop_assert!(
            result == 0.0 || result == weight * 0.5 || result == weight * 0.75 || result == weight
        );
    }
}

// Property: every exposed score stays within [0, 10]
proptest! {
    #[test]
    fn clamp_is_bounded(value in proptest::num::f64::ANY) {
        let clamped = clamp_score(value);
        prop_assert!((0.0..=10.0).contains(&clamped));
    }

    #[test]
    fn blend_is_bounded(raw in -1_000.0f64..10_000.0, badges in 0usize..50) {
        let score = blend(raw, badges);
        prop_assert!((0.0..=10.0).contains(&score));
    }

    #[test]
    fn connection_mean_is_bounded(scores in proptest::collection::vec(-5.0f64..50.0, 0..4)) {
        let mean = connection_mean(&scores);
        prop_assert!((0.0..=10.0).contains(&mean));
    }

    #[test]
    fn detailed_score_is_bounded(
        followers in 0u64..50_000_000,
        favourites in 0u64..500_000,
        chains in 0usize..10,
        nfts in 0usize..40,
        gas in 0.0f64..500.0,
        groups in 0u32..30,
        messages in 0u32..2_000,
    ) {
        let twitter = TwitterMetrics::from_value(&json!({
            "legacy": {"followers_count": followers, "favourites_count": favourites},
            "is_blue_verified": true,
            "creator_subscriptions_count": 6
        }));
        let wallet = WalletMetrics::from_value(&json!({
            "activeChains": vec![1; chains],
            "nfts": vec![json!({}); nfts],
            "totalGasSpent": gas
        }));
        let telegram = TelegramMetrics::from_value(&json!({
            "groups": groups,
            "messages": messages
        }));

        let card = ScoreNormalizer::default().score(Some(&twitter), Some(&wallet), Some(&telegram));
        prop_assert!((0.0..=10.0).contains(&card.score));
    }

    #[test]
    fn record_total_is_bounded(
        twitter in -20.0f64..40.0,
        wallets in proptest::collection::vec(-5.0f64..30.0, 0..5),
        fomo in -20.0f64..40.0,
        flags_mode in proptest::bool::ANY,
    ) {
        let mut record = UserRecord::new("prop-user");
        let mode = if flags_mode { AggregationMode::ConnectionFlags } else { AggregationMode::Detailed };
        record.apply(&ScoreUpdate { mode: Some(mode), ..Default::default() }, WalletRollup::Sum);
        record.apply(&ScoreUpdate::twitter_score(twitter), WalletRollup::Sum);
        for (i, score) in wallets.iter().enumerate() {
            let entry = WalletEntry::new(format!("0x{}", i), *score, json!(null))
                .with_badges(vec![format!("badge-{}", i)]);
            record.apply(&ScoreUpdate::wallet(entry), WalletRollup::Sum);
        }
        record.apply(&ScoreUpdate::fomo_score(fomo), WalletRollup::Sum);

        prop_assert!((0.0..=10.0).contains(&record.total_score));
        prop_assert!((0.0..=10.0).contains(&record.wallet_score));
    }
}

// Property: scanners and parsers never panic on arbitrary input
proptest! {
    #[test]
    fn keyword_scan_never_panics(text in "\\PC*") {
        let result = scan(&text, &default_keywords());
        prop_assert!(result.total_count as usize <= default_keywords().len());
    }

    #[test]
    fn keyword_inside_longer_word_never_counts(prefix in "[a-z]{1,6}", suffix in "[a-z]{1,6}") {
        let text = format!("{}cluster{}", prefix, suffix);
        prop_assert_eq!(scan(&text, &["cluster".to_string()]).total_count, 0);
    }

    #[test]
    fn token_parser_never_panics(raw in "\\PC*") {
        let _ = parse_token(&raw);
    }
}

#[test]
fn empty_text_has_no_matches() {
    assert_eq!(scan("", &default_keywords()).total_count, 0);
}

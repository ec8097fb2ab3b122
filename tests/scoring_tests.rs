/// Scoring behaviour over realistic collaborator payloads
use fomo_score::keywords::{scan, scan_all};
use fomo_score::scoring::{
    connection_flag_score, fomo_category, overall_percent, score_title, ConnectionFlags,
    ScoreNormalizer, ScoringWeights,
};
use fomo_score::source_models::{TelegramMetrics, TwitterMetrics, WalletMetrics};
use serde_json::json;

fn keywords() -> Vec<String> {
    vec!["cluster".into(), "protocol".into(), "ai".into()]
}

#[test]
fn test_two_million_followers_hit_the_medium_tier() {
    let twitter = TwitterMetrics::from_value(&json!({
        "result": {"legacy": {"followers_count": 2_000_000}}
    }));
    let card = ScoreNormalizer::default().score(Some(&twitter), None, None);
    let weights = ScoringWeights::default();

    assert_eq!(card.components.social_score, 0.75 * weights.social);
    // 30 raw points normalize to 1.5; 30 is not above the communicator cutoff
    assert_eq!(card.badges, Vec::<String>::new());
    assert!((card.score - 1.5).abs() < 1e-9);
}

#[test]
fn test_verified_influencer_earns_badges_and_bonus() {
    let twitter = TwitterMetrics::from_value(&json!({
        "is_blue_verified": true,
        "creator_subscriptions_count": 6,
        "legacy": {
            "followers_count": 12_000_000,
            "friends_count": 2_500,
            "statuses_count": 9_000,
            "favourites_count": 80_000,
            "media_count": 20_000,
            "listed_count": 5_000
        }
    }));
    let card = ScoreNormalizer::default().score(Some(&twitter), None, None);

    // followers 40 + activity 40 + verification 10 + community 10
    let twitter_score = card.twitter.as_ref().map(|t| t.raw);
    assert_eq!(twitter_score, Some(100.0));
    for badge in [
        "Crypto Communicator",
        "Social Connector",
        "Twitter Veteran",
        "DAO Diplomat",
    ] {
        assert!(card.badges.iter().any(|b| b == badge), "missing {}", badge);
    }
    // 100 / 20 = 5, plus the capped 2 point badge bonus
    assert!((card.score - 7.0).abs() < 1e-9);
}

#[test]
fn test_heavy_wallet_badges() {
    let wallet = WalletMetrics::from_value(&json!({
        "activeChains": [1, 10, 56, 137, 250, 42161],
        "nativeBalance": 6,
        "defiPositionsSummary": {"positions": [{}, {}, {}, {}, {}, {}]},
        "walletNFTs": {"result": vec![json!({}); 21]},
        "dappsInteracted": [{}, {}, {}, {}, {}, {}],
        "lendBorrowStake": 4,
        "airdrops": 6,
        "totalGasSpent": 150,
        "web3Domains": ["me.eth"]
    }));
    let scored = ScoreNormalizer::default().score_wallet(&wallet);

    assert_eq!(scored.crypto, 90.0);
    assert_eq!(scored.nft, 20.0);
    for badge in [
        "Liquidity Laureate",
        "DeFi Master",
        "Airdrop Veteran",
        "NFT Networker",
        "NFT Whale",
        "Dapp Diplomat",
        "Staking Storyteller",
        "Gas Gladiator",
        "Verified Visionary",
        "Chain Explorer",
    ] {
        assert!(scored.badges.iter().any(|b| b == badge), "missing {}", badge);
    }
}

#[test]
fn test_telegram_items_are_rescanned_for_keywords() {
    let telegram = TelegramMetrics::from_value(&json!({
        "data": {
            "telegram": {
                "groups": [
                    {"name": "Cluster builders", "permissions": {"can_pin_messages": true}},
                    {"name": "Weekend chat", "positions": [{"is_pinned": true}]}
                ],
                "messages": [
                    {"text": "new #protocol release"},
                    {"text": "clustering is not a match"}
                ]
            }
        }
    }));
    let normalizer = ScoreNormalizer::new(ScoringWeights::default(), keywords());
    let (scored, matches) = normalizer.score_telegram(&telegram);

    assert_eq!(matches.total_count, 2);
    assert_eq!(matches.keywords.get("cluster"), Some(&1));
    assert_eq!(matches.keywords.get("protocol"), Some(&1));
    assert_eq!(matches.keywords.get("ai"), Some(&0));
    // groups 7.5, messages 0, keywords 2 x 5, leadership 5, pinned 3
    assert_eq!(scored.raw, 25.5);
    assert!(scored.badges.iter().any(|b| b == "Telegram Titan"));
}

#[test]
fn test_telegram_counts_use_precomputed_matches() {
    let telegram = TelegramMetrics::from_value(&json!({
        "groups": 4,
        "messages": 150,
        "keywordMatches": {"totalCount": 3, "keywords": {"ai": 3}}
    }));
    let (scored, matches) = ScoreNormalizer::default().score_telegram(&telegram);

    assert_eq!(matches.total_count, 3);
    // groups 11.25 + messages 11.25 + 3 x 5
    assert_eq!(scored.raw, 37.5);
}

#[test]
fn test_keyword_scanner_boundaries() {
    let k = keywords();
    assert_eq!(scan("#protocol rocks", &k).total_count, 1);
    assert_eq!(scan("clustering", &k).total_count, 0);
    assert_eq!(scan("AI and ai and Ai", &k).total_count, 1);
    assert_eq!(scan("said", &k).total_count, 0);
    assert_eq!(scan_all(["ai", "ai."], &k).total_count, 2);
}

#[test]
fn test_connection_flag_defaults() {
    let all = ConnectionFlags {
        twitter: true,
        wallet: true,
        verida: true,
    };
    assert!((connection_flag_score(&all) - 19.0 / 3.0).abs() < 1e-9);

    let only_verida = ConnectionFlags {
        verida: true,
        ..Default::default()
    };
    assert_eq!(connection_flag_score(&only_verida), 8.0);
    assert_eq!(connection_flag_score(&ConnectionFlags::default()), 0.0);
}

#[test]
fn test_presentation_bands() {
    assert_eq!(overall_percent(6.34), 63);
    assert_eq!(score_title(63), "ADVANCED");
    assert_eq!(score_title(29), "BEGINNER");
    assert_eq!(score_title(100), "EXPERT");
    assert_eq!(fomo_category(2.9), "Noob");
    assert_eq!(fomo_category(5.0), "Intern");
    assert_eq!(fomo_category(7.9), "Associate");
    assert_eq!(fomo_category(8.0), "Pro");
}

//! End-to-end tests for the prediction engine

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use edgecast::calibration::{
        CalibrationSnapshot, CalibrationStore, InMemoryCalibrationRepository, ResolvedPrediction,
    };
    use edgecast::config::{AppConfig, CalibrationConfig, TierConfig, ValueConfig};
    use edgecast::detector::{evaluate_edge, ArbitrageScanner};
    use edgecast::engine::PredictionEngine;
    use edgecast::odds;
    use edgecast::tiering::TierAllocator;
    use edgecast::types::{
        GameContext, GameKey, GameOdds, HistoricalResult, MarketType, OddsQuote, Pick, Side,
        Sport, Tier, ValueLabel,
    };

    fn game(id: &str, sport: Sport) -> GameContext {
        GameContext {
            id: Some(id.to_string()),
            home: format!("{id} Home"),
            away: format!("{id} Away"),
            sport,
            start_time: Utc.with_ymd_and_hms(2025, 11, 2, 18, 0, 0).unwrap(),
            venue: None,
        }
    }

    fn moneyline(book: &str, side: Side, odds: i32) -> OddsQuote {
        OddsQuote {
            bookmaker: book.to_string(),
            market: MarketType::Moneyline,
            side,
            american_odds: odds,
            line: None,
            captured_at: Utc.with_ymd_and_hms(2025, 11, 2, 15, 0, 0).unwrap(),
        }
    }

    fn scored_pick(score: f64) -> Pick {
        Pick {
            id: Uuid::new_v4(),
            game: GameKey(format!("G{score}")),
            sport: Sport::Nba,
            market: MarketType::Moneyline,
            side: Side::Home,
            line: None,
            bookmaker: "book".to_string(),
            american_odds: -110,
            confidence: score,
            market_implied_probability: 0.5,
            edge: 0.0,
            expected_value: 0.0,
            value_label: ValueLabel::Low,
            kelly_fraction: 0.0,
            recommended_stake: 10.0,
            factors: Vec::new(),
            composite_score: 0.0,
            tier: None,
            generated_at: Utc::now(),
        }
    }

    fn confidence_only_allocator() -> TierAllocator {
        TierAllocator::new(TierConfig {
            confidence_weight: 1.0,
            edge_weight: 0.0,
            factor_weight: 0.0,
            ..TierConfig::default()
        })
        .unwrap()
    }

    // ============================================================================
    // Odds math
    // ============================================================================

    #[test]
    fn test_implied_probability_bounded_and_payout_identity() {
        for o in (-2000..=2000).step_by(7).filter(|o| *o != 0) {
            let p = odds::implied_probability(o).unwrap();
            assert!(p > 0.0 && p < 1.0, "odds {o} gave {p}");

            let decimal = odds::decimal_multiplier(o).unwrap();
            let payout = odds::payout(50.0, o).unwrap();
            assert!((payout - 50.0 * decimal).abs() < 1e-9);
        }
        assert!(odds::implied_probability(0).is_err());
    }

    // ============================================================================
    // Arbitrage
    // ============================================================================

    #[test]
    fn test_two_book_arbitrage_scenario() {
        let g1 = game("G1", Sport::Nfl);
        let quotes = vec![
            moneyline("A", Side::Home, -150),
            moneyline("B", Side::Away, 160),
        ];
        let scanner = ArbitrageScanner::new(AppConfig::default().arbitrage);
        let found = scanner.scan_quotes(&g1, &quotes);

        assert_eq!(found.len(), 1);
        let arb = &found[0];
        assert!((arb.implied_sum - (0.6 + 100.0 / 260.0)).abs() < 1e-9);
        assert!((arb.profit_pct - 1.5625).abs() < 0.01);

        let home = arb.legs.iter().find(|l| l.side == Side::Home).unwrap();
        let away = arb.legs.iter().find(|l| l.side == Side::Away).unwrap();
        assert_eq!(home.bookmaker, "A");
        assert_eq!(away.bookmaker, "B");
        assert!((home.stake / away.stake - 0.6 / (100.0 / 260.0)).abs() < 1e-9);
        assert!((home.payout - away.payout).abs() < 1e-6);
    }

    #[test]
    fn test_no_arbitrage_is_empty_not_error() {
        let g = game("G2", Sport::Nba);
        let quotes = vec![
            moneyline("A", Side::Home, -110),
            moneyline("A", Side::Away, -110),
            moneyline("B", Side::Home, -115),
            moneyline("B", Side::Away, -105),
        ];
        let scanner = ArbitrageScanner::new(AppConfig::default().arbitrage);
        assert!(scanner.scan_quotes(&g, &quotes).is_empty());
    }

    // ============================================================================
    // Value & Kelly
    // ============================================================================

    #[test]
    fn test_value_scenario_edge_13() {
        let config = ValueConfig::default();
        let quote = evaluate_edge(78.0, 0.65, &config);

        assert!((quote.edge - 13.0).abs() < 1e-9);
        assert!(quote.meets_threshold);
        assert!(quote.kelly.stake >= config.min_stake && quote.kelly.stake <= config.max_stake);
        // (0.78 - 0.65) / 0.35 * 0.25 * 100 = 9.29, lifted to the minimum
        assert_eq!(quote.kelly.stake, config.min_stake);
    }

    // ============================================================================
    // Simulation through the batch engine
    // ============================================================================

    #[test]
    fn test_confidence_clamped_and_seed_deterministic() {
        let config = AppConfig::default();
        let engine = PredictionEngine::new(&config).unwrap();
        let games: Vec<GameOdds> = [(-900, 600), (-150, 130), (-110, -110), (400, -550)]
            .iter()
            .enumerate()
            .flat_map(|(i, (h, a))| {
                Sport::ALL.into_iter().map(move |sport| GameOdds {
                    game: game(&format!("{}-{i}", sport.key()), sport),
                    quotes: vec![moneyline("A", Side::Home, *h), moneyline("A", Side::Away, *a)],
                })
            })
            .collect();
        let snapshot = CalibrationSnapshot::neutral(&config.calibration.model_version);

        let first = engine.run_batch(&games, &snapshot, Some(2024));
        let second = engine.run_batch(&games, &snapshot, Some(2024));

        assert_eq!(first.predictions.len(), games.len());
        for (a, b) in first.predictions.iter().zip(&second.predictions) {
            assert!(a.confidence >= config.confidence.floor);
            assert!(a.confidence <= config.confidence.ceiling);
            assert_eq!(
                a.simulation.home_win_probability.to_bits(),
                b.simulation.home_win_probability.to_bits()
            );
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[test]
    fn test_batch_manifest_isolates_bad_games() {
        let engine = PredictionEngine::new(&AppConfig::default()).unwrap();
        let games = vec![
            GameOdds {
                game: game("G1", Sport::Nfl),
                quotes: vec![
                    moneyline("A", Side::Home, -150),
                    moneyline("A", Side::Away, 130),
                    moneyline("B", Side::Home, 140),
                    moneyline("B", Side::Away, -160),
                    moneyline("C", Side::Away, 50),
                ],
            },
            GameOdds {
                game: game("G2", Sport::Nba),
                quotes: vec![moneyline("A", Side::Home, -200)],
            },
        ];
        let report = engine.run_batch(&games, &CalibrationSnapshot::neutral("mc-v1"), Some(5));

        assert_eq!(report.manifest.succeeded, vec![GameKey("G1".to_string())]);
        assert_eq!(report.manifest.skipped.len(), 1);
        assert_eq!(report.manifest.skipped[0].game, GameKey("G2".to_string()));
        assert_eq!(report.manifest.skipped[0].kind, "INSUFFICIENT_DATA");
        // +50 is not a real American price
        assert_eq!(report.manifest.rejected_quotes.len(), 1);
        assert_eq!(report.manifest.rejected_quotes[0].bookmaker, "C");
        // B home +140 with A away +130 sums well under one
        assert_eq!(report.arbitrage.len(), 1);
        assert_eq!(report.manifest.arbitrage_found, 1);
    }

    // ============================================================================
    // Calibration
    // ============================================================================

    fn resolved(i: i64, home: u32, away: u32) -> ResolvedPrediction {
        ResolvedPrediction {
            result: HistoricalResult {
                game: GameKey(format!("H{i}")),
                sport: Sport::Nba,
                home_score: home,
                away_score: away,
                closing_home_odds: None,
                closing_away_odds: None,
                resolved_at: Utc::now() - Duration::hours(i),
            },
            predicted_home_score: 112.0,
            predicted_away_score: 110.0,
            predicted_home_win_probability: 0.55,
        }
    }

    #[test]
    fn test_calibration_underflow_keeps_previous_state() {
        let config = CalibrationConfig::default();
        let store = CalibrationStore::new(InMemoryCalibrationRepository::new(), config.clone());

        let history: Vec<_> = (0..30).map(|i| resolved(i, 115, 110)).collect();
        let learned = store.recompute(Sport::Nba, &history).unwrap();
        assert_eq!(learned.version, 1);
        assert!(learned.spread_bias > 0.0);

        let short: Vec<_> = (0..config.min_samples as i64 - 1)
            .map(|i| resolved(i, 90, 120))
            .collect();
        let kept = store.recompute(Sport::Nba, &short).unwrap();
        assert_eq!(kept, learned);
        assert_eq!(store.get_calibration(Sport::Nba).unwrap(), learned);

        // Again: still a no-op
        let kept_again = store.recompute(Sport::Nba, &short).unwrap();
        assert_eq!(kept_again, learned);
    }

    #[test]
    fn test_snapshot_carries_calibration_into_batch() {
        let config = AppConfig::default();
        let store = CalibrationStore::new(
            InMemoryCalibrationRepository::new(),
            config.calibration.clone(),
        );
        let history: Vec<_> = (0..25).map(|i| resolved(i, 118, 108)).collect();
        store.recompute(Sport::Nba, &history).unwrap();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.state(Sport::Nba).version, 1);
        assert!(snapshot.state(Sport::Nfl).is_neutral());

        let engine = PredictionEngine::new(&config).unwrap();
        let games = vec![GameOdds {
            game: game("N1", Sport::Nba),
            quotes: vec![moneyline("A", Side::Home, -120), moneyline("A", Side::Away, 100)],
        }];
        let report = engine.run_batch(&games, &snapshot, Some(11));
        assert_eq!(report.predictions[0].calibration_version, 1);
    }

    // ============================================================================
    // Tiering
    // ============================================================================

    #[test]
    fn test_twenty_pick_borrow_scenario() {
        // 3 elite-band, 3 pro-band, 14 free-band scores between 40 and 90
        let mut scores = vec![90.0, 85.0, 82.0, 78.0, 76.0, 74.0];
        scores.extend((0..14).map(|i| 62.0 - 1.5 * i as f64));
        let picks: Vec<Pick> = scores.iter().map(|s| scored_pick(*s)).collect();

        let allocation = confidence_only_allocator().allocate(picks);
        let score_of = |tier| -> Vec<f64> {
            allocation
                .picks(tier)
                .iter()
                .map(|p| p.composite_score)
                .collect()
        };

        // Elite borrows the two best pro-band picks
        assert_eq!(score_of(Tier::Elite), vec![90.0, 85.0, 82.0, 78.0, 76.0]);
        // Pro keeps 74 and borrows the two best free-band picks
        assert_eq!(score_of(Tier::Pro), vec![74.0, 62.0, 60.5]);
        // Free hits its cap of 10
        assert_eq!(allocation.picks(Tier::Free).len(), 10);
        // 14 free-band picks, 2 lent to pro, 10 kept
        assert_eq!(allocation.unallocated.len(), 2);
        assert_eq!(allocation.total_allocated() + allocation.unallocated.len(), 20);
        assert!(allocation.total_allocated() <= 20);

        let mut ids: Vec<_> = allocation.all_picks().map(|p| p.id).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_empty_candidate_pool() {
        let allocation = TierAllocator::new(TierConfig::default())
            .unwrap()
            .allocate(Vec::new());
        assert_eq!(allocation.total_allocated(), 0);
        assert!(allocation.tiers.iter().all(|b| b.picks.is_empty()));
    }
}

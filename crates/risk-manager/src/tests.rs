#[cfg(test)]
mod risk_manager_tests {
    use crate::daily_pnl::DailyPnLTracker;
    use crate::models::*;
    use crate::pyramid::PyramidLadder;
    use analysis_core::{AnalysisError, Bias};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Kolkata;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn tracker() -> DailyPnLTracker {
        DailyPnLTracker::new(PnLLimits::default(), Kolkata).unwrap()
    }

    // ---- pyramid ladder ----

    #[test]
    fn test_ladder_opens_with_one_tranche() {
        let ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
        assert_eq!(ladder.total_size_pct(), 25);
        assert_eq!(ladder.entries().len(), 1);
        assert_relative_eq!(ladder.avg_entry_price(), 100.0);
        assert_relative_eq!(ladder.improvement_pct(), 0.0);
        assert!(ladder.history().is_empty());
    }

    #[test]
    fn test_ladder_rejects_bad_signal_price() {
        assert!(matches!(
            PyramidLadder::new(0.0, Bias::Bullish),
            Err(AnalysisError::InvalidData(_))
        ));
        assert!(PyramidLadder::new(f64::NAN, Bias::Bearish).is_err());
    }

    #[test]
    fn test_add_requires_two_percent_favourable_move() {
        let mut ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
        assert!(!ladder.add_entry(101.9));
        assert!(!ladder.add_entry(95.0));
        assert!(ladder.add_entry(102.0));

        assert_eq!(ladder.total_size_pct(), 50);
        assert_relative_eq!(ladder.avg_entry_price(), 101.0);
        let event = ladder.history()[0];
        assert_eq!(event.action, LadderAction::Add);
        assert_eq!(event.total_size_pct, 50);
        assert_relative_eq!(event.move_pct, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ladder_caps_at_full_size() {
        let mut ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
        assert!(ladder.add_entry(103.0));
        assert!(ladder.add_entry(104.0));
        assert!(ladder.add_entry(105.0));
        assert_eq!(ladder.total_size_pct(), 100);
        assert!(!ladder.add_entry(110.0));
        assert_eq!(ladder.entries().len(), 4);
        assert_eq!(ladder.entries()[3].seq, 4);
    }

    #[test]
    fn test_reduce_is_lifo_and_keeps_first_tranche() {
        let mut ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
        assert!(!ladder.reduce_entry(90.0));

        ladder.add_entry(102.0);
        ladder.add_entry(104.0);
        assert!(!ladder.reduce_entry(99.0));
        assert!(ladder.reduce_entry(97.0));

        let prices: Vec<f64> = ladder.entries().iter().map(|e| e.price).collect();
        assert_eq!(prices, vec![100.0, 102.0]);
        assert_eq!(ladder.history().last().unwrap().action, LadderAction::Reduce);
    }

    #[test]
    fn test_bearish_ladder_moves_the_other_way() {
        let mut ladder = PyramidLadder::new(200.0, Bias::Bearish).unwrap();
        assert!(!ladder.add_entry(205.0));
        assert!(ladder.add_entry(196.0));
        assert_relative_eq!(ladder.avg_entry_price(), 198.0);
        // a short averaged below its signal price is worse off
        assert_relative_eq!(ladder.improvement_pct(), -1.0, epsilon = 1e-9);

        assert!(ladder.reduce_entry(204.0));
        assert_eq!(ladder.total_size_pct(), 25);
    }

    #[test]
    fn test_improvement_for_long() {
        let mut ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
        ladder.add_entry(102.0);
        ladder.add_entry(104.0);
        // avg 102 against a 100 signal
        assert_relative_eq!(ladder.improvement_pct(), -2.0, epsilon = 1e-9);
        let snap = ladder.snapshot();
        assert_eq!(snap.total_size_pct, 75);
        assert_eq!(snap.entries.len(), 3);
    }

    // ---- daily P&L ----

    #[test]
    fn test_target_reached_exactly_stops_trading() {
        let t = tracker();
        t.add_trade_result_on(day(4), dec!(60000));
        assert!(t.can_trade_on(day(4)));

        let state = t.add_trade_result_on(day(4), dec!(40000));
        assert!(state.target_achieved);
        assert_eq!(state.trade_count, 2);
        assert!(!t.can_trade_on(day(4)));
        assert_eq!(t.surplus_for_scalps_on(day(4)), Decimal::ZERO);
    }

    #[test]
    fn test_target_is_sticky_within_the_day() {
        let t = tracker();
        t.add_trade_result_on(day(4), dec!(120000));
        assert_eq!(t.surplus_for_scalps_on(day(4)), dec!(20000));

        let state = t.add_trade_result_on(day(4), dec!(-70000));
        assert!(state.target_achieved);
        assert_eq!(state.realized_pnl, dec!(50000));
        assert!(!t.can_trade_on(day(4)));
        assert_eq!(t.surplus_for_scalps_on(day(4)), Decimal::ZERO);
    }

    #[test]
    fn test_loss_limit_blocks_trading() {
        let t = tracker();
        t.add_trade_result_on(day(5), dec!(-49999.99));
        assert!(t.can_trade_on(day(5)));
        t.add_trade_result_on(day(5), dec!(-0.01));
        assert!(!t.can_trade_on(day(5)));
        assert!(!t.snapshot_on(day(5)).target_achieved);
    }

    #[test]
    fn test_new_day_resets_state() {
        let t = tracker();
        t.add_trade_result_on(day(4), dec!(150000));
        assert!(!t.can_trade_on(day(4)));

        assert!(t.can_trade_on(day(5)));
        let state = t.snapshot_on(day(5));
        assert_eq!(state.date, day(5));
        assert_eq!(state.realized_pnl, Decimal::ZERO);
        assert_eq!(state.trade_count, 0);
    }

    #[test]
    fn test_earlier_date_does_not_reset_the_day() {
        let t = tracker();
        t.add_trade_result_on(day(5), dec!(120000));

        assert!(!t.can_trade_on(day(4)));
        let state = t.add_trade_result_on(day(4), dec!(-1000));
        assert_eq!(state.date, day(5));
        assert!(state.target_achieved);

        let state = t.snapshot_on(day(5));
        assert_eq!(state.realized_pnl, dec!(119000));
        assert_eq!(state.trade_count, 2);
        assert!(state.target_achieved);
        assert!(!t.can_trade_on(day(5)));
    }

    #[test]
    fn test_tracker_rejects_non_positive_limits() {
        let limits = PnLLimits {
            daily_target: Decimal::ZERO,
            ..PnLLimits::default()
        };
        assert!(DailyPnLTracker::new(limits, Kolkata).is_err());

        let limits = PnLLimits {
            max_daily_loss: dec!(-1),
            ..PnLLimits::default()
        };
        assert!(DailyPnLTracker::new(limits, Kolkata).is_err());
    }

    #[test]
    fn test_shared_tracker_counts_every_trade() {
        use std::sync::Arc;

        let t = Arc::new(tracker());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&t);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        t.add_trade_result_on(day(6), dec!(10));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let state = t.snapshot_on(day(6));
        assert_eq!(state.trade_count, 200);
        assert_eq!(state.realized_pnl, dec!(2000));
    }

    #[derive(Debug, Clone)]
    enum LadderOp {
        Add(f64),
        Reduce(f64),
    }

    fn ladder_op() -> impl Strategy<Value = LadderOp> {
        prop_oneof![
            (80.0f64..120.0).prop_map(LadderOp::Add),
            (80.0f64..120.0).prop_map(LadderOp::Reduce),
        ]
    }

    proptest! {
        #[test]
        fn prop_ladder_size_tracks_entries(
            bullish in any::<bool>(),
            ops in prop::collection::vec(ladder_op(), 0..30),
        ) {
            let bias = if bullish { Bias::Bullish } else { Bias::Bearish };
            let mut ladder = PyramidLadder::new(100.0, bias).unwrap();
            for op in ops {
                match op {
                    LadderOp::Add(p) => { ladder.add_entry(p); }
                    LadderOp::Reduce(p) => { ladder.reduce_entry(p); }
                }
                let total = ladder.total_size_pct();
                prop_assert!((25..=100).contains(&total));
                prop_assert_eq!(total % 25, 0);
                prop_assert_eq!(ladder.entries().len() as u32 * 25, total);
            }
        }

        #[test]
        fn prop_add_then_reduce_restores_ladder(
            up in 102.0f64..120.0,
            down in 60.0f64..98.0,
        ) {
            let mut ladder = PyramidLadder::new(100.0, Bias::Bullish).unwrap();
            let before = ladder.snapshot();
            prop_assert!(ladder.add_entry(up));
            prop_assert!(ladder.reduce_entry(down));
            let after = ladder.snapshot();
            prop_assert_eq!(before.total_size_pct, after.total_size_pct);
            prop_assert_eq!(before.avg_entry_price, after.avg_entry_price);
            prop_assert_eq!(before.entries, after.entries);
        }

        #[test]
        fn prop_target_sticky_until_next_day(
            pnls in prop::collection::vec(-60000i64..60000, 1..20),
        ) {
            let t = tracker();
            let mut reached = false;
            for p in pnls {
                let state = t.add_trade_result_on(day(7), Decimal::from(p));
                reached |= state.realized_pnl >= Decimal::from(100_000);
                prop_assert_eq!(state.target_achieved, reached);
            }
            prop_assert!(!t.snapshot_on(day(8)).target_achieved);
        }
    }
}

use chrono::{DateTime, Duration, Utc};

use crate::engine::{GameError, PointLedger};
use crate::models::{
    Bet, BetAmount, BetReceipt, BettingRound, HistoryEntry, OptionSnapshot, RoundPhase,
    RoundRecord, RoundSnapshot, SettlementOutcome, WinnerRecord,
};

/// Smallest stake accepted in a round
pub const MIN_BET: i64 = 10;

/// Rounds must offer between 2 and 5 options
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 5;

/// Deadline advisories, in seconds remaining, each announced once
const CLOSE_WARNINGS: [i64; 3] = [60, 30, 10];

/// What one timer tick produced
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Advisory checkpoints (seconds remaining) that fired on this tick
    pub warnings: Vec<i64>,
    /// Whether the deadline auto-closed the round
    pub closed: bool,
}

/// Pari-mutuel betting rounds: Idle -> Open -> Closed -> Idle.
///
/// Stakes are escrowed against the ledger at placement; settlement credits
/// each winner `floor(stake * odds)` where `odds = max(1.0, total_pool /
/// winning_pool)`. When nobody picked the winning option the pool is
/// forfeited: odds 1.0, no payouts, no refunds.
#[derive(Debug, Default)]
pub struct BettingEngine {
    round: Option<BettingRound>,
    history: Vec<RoundRecord>,
}

impl BettingEngine {
    pub fn new() -> Self {
        BettingEngine::default()
    }

    /// Rebuild with the persisted history; rounds never survive a restart
    pub fn from_history(history: Vec<RoundRecord>) -> Self {
        BettingEngine {
            round: None,
            history,
        }
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn round(&self) -> Option<&BettingRound> {
        self.round.as_ref()
    }

    /// Whether a round is currently accepting bets
    pub fn is_open(&self) -> bool {
        self.round
            .as_ref()
            .map(|r| r.phase == RoundPhase::Open)
            .unwrap_or(false)
    }

    /// Open a new round. Rejected while any round is open or unsettled.
    pub fn start_round(
        &mut self,
        topic: &str,
        options: Vec<String>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<&BettingRound, GameError> {
        if self.round.is_some() {
            return Err(GameError::StateConflict(
                "a betting round is already in progress".to_string(),
            ));
        }

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(GameError::Validation("betting topic is empty".to_string()));
        }

        let options: Vec<String> = options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
            return Err(GameError::Validation(format!(
                "betting needs {MIN_OPTIONS} to {MAX_OPTIONS} options"
            )));
        }

        if duration_minutes < 1 {
            return Err(GameError::Validation(
                "betting duration must be at least 1 minute".to_string(),
            ));
        }

        Ok(self.round.insert(BettingRound {
            topic: topic.to_string(),
            options,
            started_at: now,
            ends_at: now + Duration::minutes(duration_minutes),
            phase: RoundPhase::Open,
            bets: Default::default(),
            warned: Vec::new(),
        }))
    }

    /// Place a bet for `user`. The stake leaves the balance immediately.
    pub fn place_bet(
        &mut self,
        user: &str,
        option_no: usize,
        amount: BetAmount,
        ledger: &mut PointLedger,
        now: DateTime<Utc>,
    ) -> Result<BetReceipt, GameError> {
        let round = self.round.as_mut().ok_or(GameError::NoActiveRound)?;

        if round.phase != RoundPhase::Open || now >= round.ends_at {
            return Err(GameError::BettingClosed);
        }

        if round.bets.contains_key(user) {
            return Err(GameError::DuplicateBet);
        }

        if option_no < 1 || option_no > round.options.len() {
            return Err(GameError::InvalidOption {
                max: round.options.len(),
            });
        }

        let amount = match amount {
            BetAmount::AllIn => {
                let balance = ledger.balance(user);
                if balance == 0 {
                    return Err(GameError::NoFunds);
                }
                balance
            }
            BetAmount::Points(points) => points,
        };

        if amount < MIN_BET {
            return Err(GameError::BelowMinimum { min: MIN_BET });
        }

        ledger.debit(user, amount)?;

        round.bets.insert(
            user.to_string(),
            Bet {
                option: option_no - 1,
                amount,
                placed_at: now,
            },
        );

        Ok(BetReceipt {
            option_name: round.options[option_no - 1].clone(),
            amount,
            balance: ledger.balance(user),
        })
    }

    /// Advance the countdown: fire due advisories once each and auto-close
    /// at the deadline. A no-op unless a round is open.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        let Some(round) = self.round.as_mut() else {
            return outcome;
        };
        if round.phase != RoundPhase::Open {
            return outcome;
        }

        let remaining = (round.ends_at - now).num_seconds();
        if remaining <= 0 {
            round.phase = RoundPhase::Closed;
            outcome.closed = true;
            return outcome;
        }

        for checkpoint in CLOSE_WARNINGS {
            if remaining <= checkpoint && !round.warned.contains(&checkpoint) {
                round.warned.push(checkpoint);
                outcome.warnings.push(checkpoint);
            }
        }

        outcome
    }

    /// Freeze bet intake. Rejected when no round is open (including a
    /// second close on an already-closed round).
    pub fn close_round(&mut self) -> Result<&BettingRound, GameError> {
        match self.round.as_mut() {
            Some(round) if round.phase == RoundPhase::Open => {
                round.phase = RoundPhase::Closed;
                Ok(round)
            }
            _ => Err(GameError::StateConflict(
                "no open betting round".to_string(),
            )),
        }
    }

    /// Settle the closed round with the winning option (1-based).
    ///
    /// Credits every winner, archives the record, and returns to Idle.
    pub fn settle(
        &mut self,
        winning_no: usize,
        ledger: &mut PointLedger,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, GameError> {
        let round = self.round.take().ok_or(GameError::NoActiveRound)?;

        if round.phase != RoundPhase::Closed {
            self.round = Some(round);
            return Err(GameError::StateConflict(
                "close the round before settling".to_string(),
            ));
        }

        if winning_no < 1 || winning_no > round.options.len() {
            let max = round.options.len();
            self.round = Some(round);
            return Err(GameError::InvalidOption { max });
        }
        let winning_idx = winning_no - 1;

        let total_pool: i64 = round.bets.values().map(|b| b.amount).sum();
        let winning_pool: i64 = round
            .bets
            .values()
            .filter(|b| b.option == winning_idx)
            .map(|b| b.amount)
            .sum();

        let odds = if winning_pool > 0 {
            (total_pool as f64 / winning_pool as f64).max(1.0)
        } else {
            1.0
        };

        let mut winners = Vec::new();
        for (user, bet) in &round.bets {
            if bet.option != winning_idx {
                continue;
            }
            let win_amount = (bet.amount as f64 * odds) as i64;
            ledger.credit(user, win_amount);
            winners.push(WinnerRecord {
                user_id: user.clone(),
                bet_amount: bet.amount,
                win_amount,
            });
        }
        winners.sort_by(|a, b| b.win_amount.cmp(&a.win_amount));

        let record = RoundRecord {
            topic: round.topic,
            winning_option: round.options[winning_idx].clone(),
            options: round.options,
            started_at: round.started_at,
            settled_at: now,
            winning_option_idx: winning_idx,
            total_pool,
            odds,
            winners,
        };
        self.history.push(record.clone());

        Ok(SettlementOutcome { record })
    }

    /// Read-only view of the active round; odds here are display odds
    /// (`total / option`, 2 decimals, 0 with no bets), never the
    /// settlement odds.
    pub fn snapshot(&self, now: DateTime<Utc>) -> RoundSnapshot {
        let Some(round) = self.round.as_ref() else {
            return RoundSnapshot::inactive();
        };

        let total_points: i64 = round.bets.values().map(|b| b.amount).sum();
        let time_left = match round.phase {
            RoundPhase::Open => (round.ends_at - now).num_seconds().max(0),
            RoundPhase::Closed => 0,
        };

        let options = round
            .options
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let bets: i64 = round
                    .bets
                    .values()
                    .filter(|b| b.option == idx)
                    .map(|b| b.amount)
                    .sum();
                let participants = round.bets.values().filter(|b| b.option == idx).count();
                let odds = if bets > 0 && total_points > 0 {
                    ((total_points as f64 / bets as f64) * 100.0).round() / 100.0
                } else {
                    0.0
                };

                OptionSnapshot {
                    idx: idx + 1,
                    name: name.clone(),
                    bets,
                    participants,
                    odds,
                }
            })
            .collect();

        RoundSnapshot {
            active: true,
            message: None,
            topic: Some(round.topic.clone()),
            time_left,
            total_points,
            options,
        }
    }

    /// The most recent settled rounds, oldest first, capped at `limit`
    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let start = self.history.len().saturating_sub(limit);
        self.history[start..].iter().map(HistoryEntry::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_round(engine: &mut BettingEngine, now: DateTime<Utc>) {
        engine
            .start_round(
                "오늘 게임 승리?",
                vec!["A".to_string(), "B".to_string()],
                5,
                now,
            )
            .unwrap();
    }

    #[test]
    fn test_settlement_scenario() {
        // Round with options A/B, X bets 100 on 1, Y bets 300 on 2,
        // winner is option 1.
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 1000);
        ledger.credit("y", 1000);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("y", 2, BetAmount::Points(300), &mut ledger, now)
            .unwrap();

        assert_eq!(ledger.balance("x"), 900);
        assert_eq!(ledger.balance("y"), 700);

        engine.close_round().unwrap();
        let outcome = engine.settle(1, &mut ledger, now).unwrap();

        assert_eq!(outcome.record.total_pool, 400);
        assert_eq!(outcome.record.odds, 4.0);
        assert_eq!(outcome.record.winning_option, "A");
        assert_eq!(outcome.record.winners.len(), 1);
        assert_eq!(outcome.record.winners[0].win_amount, 400);

        // X gains floor(100 * 4.0) = 400; Y gets nothing back
        assert_eq!(ledger.balance("x"), 1300);
        assert_eq!(ledger.balance("y"), 700);

        // Round is gone; history has the record
        assert!(engine.round().is_none());
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_conservation() {
        // Points destroyed by a settlement equal the pool minus the
        // payouts; nothing else leaks in or out.
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        for (user, funds) in [("a", 500), ("b", 700), ("c", 900)] {
            ledger.credit(user, funds);
        }
        let before: i64 = 500 + 700 + 900;

        open_round(&mut engine, now);
        engine
            .place_bet("a", 1, BetAmount::Points(130), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("b", 1, BetAmount::Points(70), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("c", 2, BetAmount::Points(500), &mut ledger, now)
            .unwrap();

        engine.close_round().unwrap();
        let outcome = engine.settle(1, &mut ledger, now).unwrap();

        let paid: i64 = outcome.record.winners.iter().map(|w| w.win_amount).sum();
        let after: i64 = ["a", "b", "c"].iter().map(|u| ledger.balance(u)).sum();

        assert_eq!(after + (outcome.record.total_pool - paid), before);
    }

    #[test]
    fn test_no_double_betting() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 1000);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();

        let err = engine
            .place_bet("x", 2, BetAmount::Points(50), &mut ledger, now)
            .unwrap_err();
        assert_eq!(err, GameError::DuplicateBet);
        assert_eq!(ledger.balance("x"), 900);
        assert_eq!(engine.round().unwrap().bets.len(), 1);
    }

    #[test]
    fn test_all_in_with_zero_balance() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();

        open_round(&mut engine, now);
        let err = engine
            .place_bet("z", 1, BetAmount::AllIn, &mut ledger, now)
            .unwrap_err();

        assert_eq!(err, GameError::NoFunds);
        assert!(engine.round().unwrap().bets.is_empty());
    }

    #[test]
    fn test_all_in_stakes_full_balance() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 345);

        open_round(&mut engine, now);
        let receipt = engine
            .place_bet("x", 2, BetAmount::AllIn, &mut ledger, now)
            .unwrap();

        assert_eq!(receipt.amount, 345);
        assert_eq!(ledger.balance("x"), 0);
    }

    #[test]
    fn test_bet_validation_order() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);

        let err = engine
            .place_bet("x", 3, BetAmount::Points(50), &mut ledger, now)
            .unwrap_err();
        assert_eq!(err, GameError::InvalidOption { max: 2 });

        let err = engine
            .place_bet("x", 1, BetAmount::Points(5), &mut ledger, now)
            .unwrap_err();
        assert_eq!(err, GameError::BelowMinimum { min: MIN_BET });

        let err = engine
            .place_bet("x", 1, BetAmount::Points(150), &mut ledger, now)
            .unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientFunds {
                have: 100,
                need: 150
            }
        );

        assert_eq!(ledger.balance("x"), 100);
    }

    #[test]
    fn test_closed_round_rejects_bets() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);
        engine.close_round().unwrap();

        let err = engine
            .place_bet("x", 1, BetAmount::Points(50), &mut ledger, now)
            .unwrap_err();
        assert_eq!(err, GameError::BettingClosed);
    }

    #[test]
    fn test_bet_after_deadline_rejected() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);

        // Deadline passed but the timer has not ticked yet
        let late = now + Duration::minutes(5);
        let err = engine
            .place_bet("x", 1, BetAmount::Points(50), &mut ledger, late)
            .unwrap_err();
        assert_eq!(err, GameError::BettingClosed);
    }

    #[test]
    fn test_idempotent_close() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(50), &mut ledger, now)
            .unwrap();
        engine.close_round().unwrap();

        let err = engine.close_round().unwrap_err();
        assert!(matches!(err, GameError::StateConflict(_)));

        // Bets and pool untouched by the rejected close
        let round = engine.round().unwrap();
        assert_eq!(round.bets.len(), 1);
        assert_eq!(round.bets["x"].amount, 50);
    }

    #[test]
    fn test_settle_requires_closed() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();

        let err = engine.settle(1, &mut ledger, now).unwrap_err();
        assert_eq!(err, GameError::NoActiveRound);

        open_round(&mut engine, now);
        let err = engine.settle(1, &mut ledger, now).unwrap_err();
        assert!(matches!(err, GameError::StateConflict(_)));
        assert!(engine.round().is_some());
    }

    #[test]
    fn test_no_winner_forfeits_pool() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 2, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine.close_round().unwrap();

        let outcome = engine.settle(1, &mut ledger, now).unwrap();

        // Nobody picked option 1: odds floor at 1.0, nothing is paid out,
        // the loser is not refunded.
        assert_eq!(outcome.record.odds, 1.0);
        assert!(outcome.record.winners.is_empty());
        assert_eq!(ledger.balance("x"), 0);
    }

    #[test]
    fn test_odds_floor() {
        // A single bettor on the winning option: total == winning pool,
        // odds stay at the 1.0 floor and the stake comes straight back.
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine.close_round().unwrap();

        let outcome = engine.settle(1, &mut ledger, now).unwrap();
        assert!(outcome.record.odds >= 1.0);
        assert_eq!(outcome.record.odds, 1.0);
        assert_eq!(ledger.balance("x"), 100);
    }

    #[test]
    fn test_payouts_floor_fractions() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 100);
        ledger.credit("y", 100);
        ledger.credit("z", 100);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("y", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("z", 2, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine.close_round().unwrap();

        let outcome = engine.settle(1, &mut ledger, now).unwrap();

        // odds = 300 / 200 = 1.5, payout = floor(100 * 1.5) = 150 each
        assert_eq!(outcome.record.odds, 1.5);
        assert_eq!(ledger.balance("x"), 150);
        assert_eq!(ledger.balance("y"), 150);
        assert_eq!(ledger.balance("z"), 0);
    }

    #[test]
    fn test_start_round_validation() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();

        // One non-empty option is not enough
        let err = engine
            .start_round("t", vec!["A".to_string(), "  ".to_string()], 5, now)
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        // Six options is too many
        let six = (0..6).map(|i| format!("opt{i}")).collect();
        let err = engine.start_round("t", six, 5, now).unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        // Zero duration
        let err = engine
            .start_round("t", vec!["A".to_string(), "B".to_string()], 0, now)
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));

        // A valid round blocks any second round until settled
        open_round(&mut engine, now);
        let err = engine
            .start_round("t2", vec!["A".to_string(), "B".to_string()], 5, now)
            .unwrap_err();
        assert!(matches!(err, GameError::StateConflict(_)));

        engine.close_round().unwrap();
        let err = engine
            .start_round("t3", vec!["A".to_string(), "B".to_string()], 5, now)
            .unwrap_err();
        assert!(matches!(err, GameError::StateConflict(_)));
    }

    #[test]
    fn test_tick_warnings_fire_once_then_close() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        open_round(&mut engine, now);

        // Nothing due at 4 minutes remaining
        let outcome = engine.tick(now + Duration::minutes(1));
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.closed);

        // 60s checkpoint fires once
        let at_60 = now + Duration::minutes(4);
        let outcome = engine.tick(at_60);
        assert_eq!(outcome.warnings, vec![60]);
        let outcome = engine.tick(at_60 + Duration::seconds(1));
        assert!(outcome.warnings.is_empty());

        // 30s and 10s fire at their checkpoints
        let outcome = engine.tick(now + Duration::seconds(270));
        assert_eq!(outcome.warnings, vec![30]);
        let outcome = engine.tick(now + Duration::seconds(290));
        assert_eq!(outcome.warnings, vec![10]);

        // Deadline auto-closes; later ticks are no-ops
        let outcome = engine.tick(now + Duration::minutes(5));
        assert!(outcome.closed);
        let outcome = engine.tick(now + Duration::minutes(6));
        assert!(!outcome.closed);
        assert!(engine.round().unwrap().phase == RoundPhase::Closed);
    }

    #[test]
    fn test_skipped_checkpoints_catch_up_once() {
        // A stalled timer that lands at 25s remaining fires the missed
        // 60s and 30s advisories together, once.
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        open_round(&mut engine, now);

        let outcome = engine.tick(now + Duration::seconds(275));
        assert_eq!(outcome.warnings, vec![60, 30]);
    }

    #[test]
    fn test_display_odds_snapshot() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();
        ledger.credit("x", 1000);
        ledger.credit("y", 1000);

        assert!(!engine.snapshot(now).active);

        open_round(&mut engine, now);
        engine
            .place_bet("x", 1, BetAmount::Points(100), &mut ledger, now)
            .unwrap();
        engine
            .place_bet("y", 2, BetAmount::Points(200), &mut ledger, now)
            .unwrap();

        let snapshot = engine.snapshot(now + Duration::minutes(2));
        assert!(snapshot.active);
        assert_eq!(snapshot.total_points, 300);
        assert_eq!(snapshot.time_left, 180);
        assert_eq!(snapshot.options[0].odds, 3.0);
        assert_eq!(snapshot.options[1].odds, 1.5);
        assert_eq!(snapshot.options[0].participants, 1);

        // An option with no bets displays 0, not the settlement floor
        let mut empty = BettingEngine::new();
        open_round(&mut empty, now);
        assert_eq!(empty.snapshot(now).options[0].odds, 0.0);
    }

    #[test]
    fn test_recent_history_caps_at_limit() {
        let now = Utc::now();
        let mut engine = BettingEngine::new();
        let mut ledger = PointLedger::new();

        for i in 0..12 {
            engine
                .start_round(&format!("round {i}"), vec!["A".into(), "B".into()], 5, now)
                .unwrap();
            engine.close_round().unwrap();
            engine.settle(1, &mut ledger, now).unwrap();
        }

        let recent = engine.recent_history(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].topic, "round 2");
        assert_eq!(recent[9].topic, "round 11");
        assert_eq!(engine.history().len(), 12);
    }
}

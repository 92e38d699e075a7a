//! Accountant — per-run P&L, pass reports and session totals.
//!
//! Reconciles each scheduler pass: nets every martingale run against the
//! instrument payout and accumulates the result into session statistics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

use crate::strategy::martingale::{MartingaleRun, RunState};
use crate::types::{AttemptStatus, Outcome, StakeAttempt};

/// Net result of one run at the given payout percentage.
///
/// A win pays `amount * payout / 100` on top of the returned stake, a tie
/// returns the stake, a loss forfeits it. Attempts that never settled are
/// not counted.
pub fn run_net(run: &MartingaleRun, payout: u8) -> Decimal {
    attempts_net(&run.attempts, payout)
}

/// Net result of a sequence of attempts, see [`run_net`].
pub fn attempts_net(attempts: &[StakeAttempt], payout: u8) -> Decimal {
    let rate = Decimal::from(payout) / dec!(100);
    attempts
        .iter()
        .map(|attempt| match attempt.status {
            AttemptStatus::Settled(Outcome::Win) => attempt.amount * rate,
            AttemptStatus::Settled(Outcome::Loss) => -attempt.amount,
            AttemptStatus::Settled(Outcome::Tie) | AttemptStatus::Pending => Decimal::ZERO,
        })
        .sum()
}

// ---------------------------------------------------------------------------
// Pass report
// ---------------------------------------------------------------------------

/// Summary of one pass over the eligible instruments.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_number: u64,
    pub instruments_considered: usize,
    pub skipped: usize,
    pub signals: usize,
    pub runs_won: usize,
    pub runs_capped: usize,
    pub failures: usize,
    pub wagers_placed: usize,
    pub net_pnl: Decimal,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PassReport {
    pub fn new(pass_number: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            pass_number,
            instruments_considered: 0,
            skipped: 0,
            signals: 0,
            runs_won: 0,
            runs_capped: 0,
            failures: 0,
            wagers_placed: 0,
            net_pnl: Decimal::ZERO,
            started_at,
            finished_at: None,
        }
    }

    /// Book a completed run; returns its net result.
    pub fn record_run(&mut self, run: &MartingaleRun, payout: u8) -> Decimal {
        let net = run_net(run, payout);
        match run.state {
            RunState::WonAtLevel(_) => self.runs_won += 1,
            RunState::CappedLoss => self.runs_capped += 1,
            RunState::Level(_) => {}
        }
        self.wagers_placed += run.attempts.len();
        self.net_pnl += net;
        net
    }

    /// Book the settled part of a run that was abandoned on an execution
    /// failure; returns its net result.
    pub fn record_abandoned(&mut self, attempts: &[StakeAttempt], payout: u8) -> Decimal {
        let net = attempts_net(attempts, payout);
        self.failures += 1;
        self.wagers_placed += attempts.iter().filter(|a| a.outcome().is_some()).count();
        self.net_pnl += net;
        net
    }
}

// ---------------------------------------------------------------------------
// Session statistics
// ---------------------------------------------------------------------------

/// Running totals across all passes of this process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub passes: u64,
    pub runs_won: u64,
    pub runs_capped: u64,
    pub failures: u64,
    pub wagers_placed: u64,
    pub net_pnl: Decimal,
    /// Lowest cumulative P&L seen at a pass boundary.
    pub worst_pnl: Decimal,
}

impl SessionStats {
    pub fn runs(&self) -> u64 {
        self.runs_won + self.runs_capped
    }

    /// Fraction of runs that ended on a non-losing outcome.
    pub fn run_win_rate(&self) -> Option<f64> {
        let runs = self.runs();
        (runs > 0).then(|| self.runs_won as f64 / runs as f64)
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Accountant {
    stats: SessionStats,
}

impl Accountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Fold a finished pass into the session totals.
    pub fn reconcile(&mut self, report: &PassReport) -> &SessionStats {
        let stats = &mut self.stats;
        stats.passes += 1;
        stats.runs_won += report.runs_won as u64;
        stats.runs_capped += report.runs_capped as u64;
        stats.failures += report.failures as u64;
        stats.wagers_placed += report.wagers_placed as u64;
        stats.net_pnl += report.net_pnl;
        stats.worst_pnl = stats.worst_pnl.min(stats.net_pnl);

        if report.runs_capped > 0 {
            warn!(
                pass = report.pass_number,
                capped = report.runs_capped,
                "Martingale cap hit this pass"
            );
        }
        info!(
            pass = report.pass_number,
            instruments = report.instruments_considered,
            signals = report.signals,
            won = report.runs_won,
            capped = report.runs_capped,
            failures = report.failures,
            pass_pnl = %report.net_pnl,
            session_pnl = %stats.net_pnl,
            "Pass reconciled"
        );
        &self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn run(outcomes: &[Outcome], state: RunState) -> MartingaleRun {
        let attempts = outcomes
            .iter()
            .enumerate()
            .map(|(i, &outcome)| {
                let level = i as u32 + 1;
                let mut attempt = StakeAttempt::pending(level, Decimal::from(1u32 << i));
                attempt.trade_id = Some(format!("T{level}"));
                attempt.status = AttemptStatus::Settled(outcome);
                attempt
            })
            .collect();
        MartingaleRun {
            instrument: "EURUSD_otc".to_string(),
            action: Action::Call,
            attempts,
            state,
        }
    }

    fn report() -> PassReport {
        PassReport::new(1, Utc::now())
    }

    #[test]
    fn test_first_level_win() {
        let r = run(&[Outcome::Win], RunState::WonAtLevel(1));
        assert_eq!(run_net(&r, 92), dec!(0.92));
    }

    #[test]
    fn test_win_after_losses_nets_earlier_stakes() {
        // -1 - 2 + 4 * 0.92
        let r = run(&[Outcome::Loss, Outcome::Loss, Outcome::Win], RunState::WonAtLevel(3));
        assert_eq!(run_net(&r, 92), dec!(0.68));
    }

    #[test]
    fn test_capped_loss_forfeits_all_stakes() {
        let r = run(&[Outcome::Loss; 4], RunState::CappedLoss);
        assert_eq!(run_net(&r, 92), dec!(-15));
    }

    #[test]
    fn test_tie_returns_stake() {
        let r = run(&[Outcome::Loss, Outcome::Tie], RunState::WonAtLevel(2));
        assert_eq!(run_net(&r, 92), dec!(-1));
    }

    #[test]
    fn test_pending_attempt_not_counted() {
        let mut r = run(&[Outcome::Loss], RunState::Level(2));
        r.attempts.push(StakeAttempt::pending(2, dec!(2)));
        assert_eq!(run_net(&r, 92), dec!(-1));
    }

    #[test]
    fn test_report_records_runs() {
        let mut report = report();
        report.record_run(&run(&[Outcome::Win], RunState::WonAtLevel(1)), 90);
        report.record_run(&run(&[Outcome::Loss; 4], RunState::CappedLoss), 90);
        assert_eq!(report.runs_won, 1);
        assert_eq!(report.runs_capped, 1);
        assert_eq!(report.wagers_placed, 5);
        assert_eq!(report.net_pnl, dec!(-14.1));
    }

    #[test]
    fn test_abandoned_run_books_settled_losses() {
        let mut attempts = run(&[Outcome::Loss], RunState::Level(2)).attempts;
        attempts.push(StakeAttempt::pending(2, dec!(2)));

        let mut report = report();
        let net = report.record_abandoned(&attempts, 92);
        assert_eq!(net, dec!(-1));
        assert_eq!(report.failures, 1);
        assert_eq!(report.wagers_placed, 1);
        assert_eq!(report.runs_won + report.runs_capped, 0);
        assert_eq!(report.net_pnl, dec!(-1));
    }

    #[test]
    fn test_reconcile_accumulates() {
        let mut accountant = Accountant::new();

        let mut first = report();
        first.record_run(&run(&[Outcome::Loss; 4], RunState::CappedLoss), 92);
        first.failures = 1;
        accountant.reconcile(&first);

        let mut second = PassReport::new(2, Utc::now());
        second.record_run(&run(&[Outcome::Win], RunState::WonAtLevel(1)), 92);
        let stats = accountant.reconcile(&second);

        assert_eq!(stats.passes, 2);
        assert_eq!(stats.runs(), 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.net_pnl, dec!(-14.08));
        assert_eq!(stats.worst_pnl, dec!(-15));
        assert_eq!(stats.run_win_rate(), Some(0.5));
    }

    #[test]
    fn test_empty_session() {
        let accountant = Accountant::new();
        assert_eq!(accountant.stats().run_win_rate(), None);
        assert_eq!(accountant.stats().net_pnl, Decimal::ZERO);
    }
}

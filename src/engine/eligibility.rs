//! Eligibility filter — which instruments may be traded this pass.
//!
//! Applies broker payout quotes to the eligibility map incrementally:
//! instruments that are not quoted keep their previous entry.

use tracing::{debug, info};

use crate::config::EligibilityConfig;
use crate::types::{Eligibility, InstrumentInfo, PayoutQuote};

/// Length of the currency-pair code ahead of the suffix, e.g. `EURUSD`.
const PAIR_LEN: usize = 6;

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub admitted: usize,
    pub removed: usize,
}

pub struct EligibilityFilter {
    config: EligibilityConfig,
}

impl EligibilityFilter {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn min_payout(&self) -> u8 {
        self.config.min_payout
    }

    /// Instruments in pass order.
    pub fn watchlist(&self) -> &[String] {
        &self.config.watchlist
    }

    /// Whether a quote refers to a watched, tradable instrument.
    pub fn admits(&self, quote: &PayoutQuote) -> bool {
        quote.enabled
            && quote.instrument.ends_with(&self.config.suffix)
            && quote.instrument.len() == PAIR_LEN + self.config.suffix.len()
            && self.config.watchlist.iter().any(|w| *w == quote.instrument)
    }

    /// Fold `quotes` into `eligibility`.
    ///
    /// Admitted quotes at or above the minimum payout are inserted or
    /// updated; admitted quotes below it remove the instrument.
    pub fn apply(&self, eligibility: &mut Eligibility, quotes: &[PayoutQuote]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for quote in quotes.iter().filter(|q| self.admits(q)) {
            if quote.payout >= self.config.min_payout {
                eligibility.insert(
                    quote.instrument.clone(),
                    InstrumentInfo {
                        payout: quote.payout,
                        kind: quote.kind.clone(),
                    },
                );
                summary.admitted += 1;
            } else if eligibility.remove(&quote.instrument).is_some() {
                debug!(
                    instrument = %quote.instrument,
                    payout = quote.payout,
                    min = self.config.min_payout,
                    "Payout below minimum — instrument dropped"
                );
                summary.removed += 1;
            }
        }

        info!(
            quotes = quotes.len(),
            admitted = summary.admitted,
            removed = summary.removed,
            eligible = eligibility.len(),
            "Eligibility refreshed"
        );
        summary
    }
}

//! Running scores folded from the round log.

use serde::{Deserialize, Serialize};

use super::state::{AgentRole, Round};

/// Upper bound of the derived tension value.
pub const MAX_TENSION: u32 = 100;

/// Per-side totals for a round log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTotals {
    pub sentinel: i64,
    pub governor: i64,
}

impl SentimentTotals {
    /// `min(100, |sentinel - governor| * 2)`. Presentation only.
    pub fn tension(&self) -> u32 {
        let gap = self.sentinel.abs_diff(self.governor).saturating_mul(2);
        gap.min(MAX_TENSION as u64) as u32
    }
}

/// Pure fold over a round log.
pub struct SentimentAccumulator;

impl SentimentAccumulator {
    /// Sum shifts per side. Arbiter rounds never count, whatever shift they carry.
    pub fn fold(rounds: &[Round]) -> SentimentTotals {
        rounds
            .iter()
            .fold(SentimentTotals::default(), |mut totals, round| {
                match round.agent {
                    AgentRole::Sentinel => totals.sentinel += round.sentiment_shift as i64,
                    AgentRole::Governor => totals.governor += round.sentiment_shift as i64,
                    AgentRole::Arbiter => {}
                }
                totals
            })
    }
}

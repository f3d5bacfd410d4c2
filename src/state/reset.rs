//! Daily reset rules: when a reset is due and what it writes.

use serde::Deserialize;

use crate::{
    dao::models::{BoardDocument, MatchEntity},
    state::board::MatchSlot,
};

/// Which deliveries of the reset marker may trigger a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetGuard {
    /// Every delivery is evaluated, including the first one of the session.
    #[default]
    EveryDelivery,
    /// The first delivery of a session only records the marker; later ones are evaluated.
    SkipFirstDelivery,
}

impl ResetGuard {
    /// Whether the `delivery`-th marker delivery (1-based) of a session is evaluated.
    pub fn evaluates(self, delivery: u64) -> bool {
        match self {
            ResetGuard::EveryDelivery => true,
            ResetGuard::SkipFirstDelivery => delivery > 1,
        }
    }
}

/// A reset is due whenever the stored marker is not exactly today's date key.
pub fn reset_due(marker: &str, today: &str) -> bool {
    marker != today
}

/// Document written over the whole tree by a reset: every slot with empty rosters, stamped
/// with `today`.
pub fn fresh_document(slots: &[MatchSlot], today: &str) -> BoardDocument {
    BoardDocument {
        matches: slots
            .iter()
            .map(|slot| (slot.key.clone(), MatchEntity::empty(slot.time.clone())))
            .collect(),
        last_reset_date: today.to_string(),
    }
}

use std::collections::BTreeMap;

use strum::Display;

/// Live state of one submitted image on the requesting side.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SlotState {
    Pending,
    Succeeded { text: String, elapsed_ms: u64 },
    Failed { error: String },
}

impl SlotState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlotState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub label: String,
    pub state: SlotState,
}

/// One generation of submitted jobs. Recreated whole on every batch change.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub id: i64,
    pub total: usize,
    pub completed: usize,
    pub slots: BTreeMap<i32, Slot>,
}

impl Batch {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A batch with no submissions has not started yet.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    pub fn next_index(&self) -> i32 {
        i32::try_from(self.total).unwrap_or(i32::MAX)
    }
}

/// What [`BatchTracker::on_result`](crate::services::batch_tracker::BatchTracker::on_result)
/// did with a delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResultDisposition {
    /// First terminal result for a pending slot.
    Accepted,
    /// Slot was already terminal; value overwritten, progress unchanged.
    Duplicate,
    /// Belongs to a superseded batch; dropped.
    Stale,
    /// Index never issued in the current batch; dropped.
    UnknownIndex,
}

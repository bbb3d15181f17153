use crate::models::batch::{Batch, ResultDisposition, Slot, SlotState};
use crate::models::job::{Job, JobResult};

/// First batch id handed out by a fresh tracker.
pub const INITIAL_BATCH_ID: i64 = 1;

/// Fire-and-forget delivery of jobs to whatever runs them.
///
/// Implementations must return immediately; the matching [`JobResult`]
/// comes back later through the requester's own channel.
pub trait JobSink {
    fn dispatch(&self, job: Job);
}

/// Requester-side bookkeeping for batches of submitted images.
///
/// Results may arrive in any order and may belong to batches the requester
/// has already moved past. Only the batch id and the per-batch index are used
/// to match them; a new [`Batch`] (with fresh slots) replaces the old one on
/// every batch change.
pub struct BatchTracker<S> {
    sink: S,
    batch: Batch,
}

impl<S: JobSink> BatchTracker<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            batch: Batch::new(INITIAL_BATCH_ID),
        }
    }

    /// Open a new batch if the current one is finished.
    ///
    /// Returns `true` when a new batch id was issued. A batch with no
    /// submissions yet keeps its id: nothing was ever sent under it, so no
    /// late result can be confused with the new work.
    pub fn begin_batch_if_ready(&mut self) -> bool {
        if !self.batch.is_complete() {
            return false;
        }
        self.open_next_batch();
        true
    }

    /// Give up on the current batch, even with results outstanding.
    ///
    /// In-flight jobs keep running; their results will be discarded as stale.
    pub fn abandon_batch(&mut self) {
        if self.batch.total > self.batch.completed {
            tracing::info!(
                batch_id = self.batch.id,
                outstanding = self.batch.total - self.batch.completed,
                "Abandoning batch with results outstanding"
            );
        }
        self.open_next_batch();
    }

    fn open_next_batch(&mut self) {
        let next = self.batch.id + 1;
        self.batch = Batch::new(next);
        tracing::debug!(batch_id = next, "Opened new batch");
    }

    /// Register one image in the current batch and send it off.
    ///
    /// Returns the index assigned to it.
    pub fn submit(&mut self, label: impl Into<String>, payload: Vec<u8>) -> i32 {
        let label = label.into();
        let index = self.batch.next_index();

        self.batch.total += 1;
        self.batch.slots.insert(
            index,
            Slot {
                label: label.clone(),
                state: SlotState::Pending,
            },
        );

        self.sink.dispatch(Job {
            batch_id: self.batch.id,
            index,
            label,
            payload,
        });

        index
    }

    /// Fold one delivered result into the current batch.
    pub fn on_result(&mut self, result: JobResult) -> ResultDisposition {
        if result.batch_id != self.batch.id {
            tracing::debug!(
                batch_id = result.batch_id,
                current = self.batch.id,
                index = result.index,
                "Dropping result from superseded batch"
            );
            return ResultDisposition::Stale;
        }

        let Some(slot) = self.batch.slots.get_mut(&result.index) else {
            tracing::warn!(
                batch_id = result.batch_id,
                index = result.index,
                "Result for an index that was never issued"
            );
            return ResultDisposition::UnknownIndex;
        };

        let first = !slot.state.is_terminal();
        slot.state = if result.ok {
            SlotState::Succeeded {
                text: result.text,
                elapsed_ms: result.elapsed_ms,
            }
        } else {
            SlotState::Failed {
                error: result.error_message,
            }
        };

        if first {
            self.batch.completed += 1;
            ResultDisposition::Accepted
        } else {
            ResultDisposition::Duplicate
        }
    }

    /// Integer percentage of completed jobs; only 100 once all are done.
    pub fn progress_percent(&self) -> u8 {
        if self.batch.total == 0 {
            return 0;
        }
        let percent = 100 * self.batch.completed / self.batch.total;
        u8::try_from(percent).unwrap_or(100)
    }

    pub fn batch_id(&self) -> i64 {
        self.batch.id
    }

    pub fn total(&self) -> usize {
        self.batch.total
    }

    pub fn completed(&self) -> usize {
        self.batch.completed
    }

    pub fn is_complete(&self) -> bool {
        self.batch.is_complete()
    }

    pub fn slot(&self, index: i32) -> Option<&Slot> {
        self.batch.slots.get(&index)
    }

    /// Slots of the current batch in index order.
    pub fn slots(&self) -> impl Iterator<Item = (i32, &Slot)> {
        self.batch.slots.iter().map(|(index, slot)| (*index, slot))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

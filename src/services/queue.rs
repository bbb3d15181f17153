use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Outcome of [`JobQueue::pop`].
#[derive(Debug, PartialEq, Eq)]
pub enum Popped<T> {
    Item(T),
    /// Queue is closed and fully drained.
    Shutdown,
}

struct State<T> {
    items: VecDeque<T>,
    open: bool,
}

/// Unbounded FIFO hand-off between any number of producers and a fixed set
/// of blocking consumers.
///
/// `push` never blocks. After [`shutdown`](Self::shutdown), consumers drain
/// what is left and then observe [`Popped::Shutdown`]; producers get
/// [`QueueError::Closed`] back together with the rejected item.
pub struct JobQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                open: true,
            }),
            available: Condvar::new(),
        }
    }

    // Nothing in here can leave the state half-updated, so a poisoned lock
    // is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item, waking one waiting consumer.
    pub fn push(&self, item: T) -> Result<(), QueueError<T>> {
        {
            let mut state = self.lock();
            if !state.open {
                return Err(QueueError::Closed(item));
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Block until an item is available or the queue is closed and empty.
    pub fn pop(&self) -> Popped<T> {
        let mut state = self
            .available
            .wait_while(self.lock(), |s| s.items.is_empty() && s.open)
            .unwrap_or_else(PoisonError::into_inner);

        match state.items.pop_front() {
            Some(item) => Popped::Item(item),
            None => Popped::Shutdown,
        }
    }

    /// Close the queue and wake every blocked consumer. Idempotent.
    pub fn shutdown(&self) {
        self.lock().open = false;
        self.available.notify_all();
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Current queue depth (pending items).
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError<T> {
    #[error("Job queue is closed")]
    Closed(T),
}

impl<T> QueueError<T> {
    /// Recover the item that was refused.
    pub fn into_inner(self) -> T {
        match self {
            QueueError::Closed(item) => item,
        }
    }
}

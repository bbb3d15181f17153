/// One unit of recognition work, tied to a batch and an index within it.
///
/// Immutable once built; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub batch_id: i64,
    pub index: i32,
    /// Opaque display label, usually the original filename.
    pub label: String,
    /// Encoded image bytes. Never interpreted by the dispatch layer.
    pub payload: Vec<u8>,
}

/// Outcome of processing one [`Job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub batch_id: i64,
    pub index: i32,
    pub label: String,
    /// Recognized text; empty when `ok` is false.
    pub text: String,
    pub elapsed_ms: u64,
    pub ok: bool,
    /// Empty when `ok` is true.
    pub error_message: String,
}

/// Error message for jobs whose worker has no usable engine.
pub const ENGINE_UNAVAILABLE: &str = "engine unavailable";

/// Error message for jobs the engine ran on but could not read.
pub const RECOGNITION_FAILED: &str = "recognition failed";

impl JobResult {
    pub fn success(job: &Job, text: String, elapsed_ms: u64) -> Self {
        Self {
            batch_id: job.batch_id,
            index: job.index,
            label: job.label.clone(),
            text,
            elapsed_ms,
            ok: true,
            error_message: String::new(),
        }
    }

    /// Failure that never reached the engine (elapsed is 0).
    pub fn failure(job: &Job, message: impl Into<String>) -> Self {
        Self::failure_after(job, message, 0)
    }

    /// Failure reported after the engine ran for `elapsed_ms`.
    pub fn failure_after(job: &Job, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            batch_id: job.batch_id,
            index: job.index,
            label: job.label.clone(),
            text: String::new(),
            elapsed_ms,
            ok: false,
            error_message: message.into(),
        }
    }
}

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::models::job::{Job, JobResult};
use crate::models::recognition::{RecognizeRequest, RecognizeResponse};
use crate::services::worker_pool::{WorkerPool, SHUTTING_DOWN};

/// Bridges one-request-in, one-response-out calls onto the worker pool.
///
/// Every call gets its own oneshot completion slot, so any number of
/// concurrent callers share the pool's fixed workers without cross-talk.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    /// Run one recognition request through the pool and wait for its result.
    pub async fn handle(&self, request: RecognizeRequest) -> RecognizeResponse {
        tracing::info!(
            batch_id = request.batch_id,
            index = request.image_index,
            filename = %request.filename,
            bytes = request.image_data.len(),
            "Received recognition request"
        );

        let result = self.dispatch(Job::from(request)).await;

        tracing::debug!(
            batch_id = result.batch_id,
            index = result.index,
            success = result.ok,
            "Sending recognition response"
        );

        result.into()
    }

    /// Enqueue a job and suspend until its result arrives.
    ///
    /// Always yields exactly one result: a closed pool or a worker that
    /// dropped the slot both produce a failure result instead of hanging.
    pub async fn dispatch(&self, job: Job) -> JobResult {
        let (reply, completion) = oneshot::channel();
        // Correlation fields only, kept in case the slot is dropped.
        let marker = Job {
            batch_id: job.batch_id,
            index: job.index,
            label: job.label.clone(),
            payload: Vec::new(),
        };

        if let Err(e) = self.pool.submit(job, reply) {
            let job = e.into_inner();
            tracing::warn!(
                batch_id = job.batch_id,
                index = job.index,
                "Rejected job: worker pool is closed"
            );
            return JobResult::failure(&job, SHUTTING_DOWN);
        }
        metrics::counter!("ocr_jobs_submitted_total").increment(1);

        match completion.await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    batch_id = marker.batch_id,
                    index = marker.index,
                    "Completion slot dropped without a result"
                );
                JobResult::failure(&marker, SHUTTING_DOWN)
            }
        }
    }
}

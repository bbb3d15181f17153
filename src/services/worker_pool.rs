use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::models::job::{Job, JobResult, ENGINE_UNAVAILABLE, RECOGNITION_FAILED};
use crate::services::engine::{
    build_guarded, recognize_guarded, EngineError, EngineFactory, RecognitionEngine,
};
use crate::services::queue::{JobQueue, Popped, QueueError};

/// Message returned to callers whose job was still queued when every worker
/// had already gone away.
pub const SHUTTING_DOWN: &str = "service shutting down";

/// A queued job together with the completion slot its result goes to.
pub struct Task {
    pub job: Job,
    pub reply: oneshot::Sender<JobResult>,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    /// Extra sleep after each recognition, for demos.
    pub artificial_delay: Duration,
}

/// Fixed set of OS threads pulling [`Task`]s from one shared queue.
///
/// Each worker builds its own engine through the factory on startup. The pool
/// lives for the whole service lifetime; [`shutdown`](Self::shutdown) (or
/// drop) closes the queue, lets workers drain it, and joins them.
pub struct WorkerPool {
    queue: Arc<JobQueue<Task>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig, factory: EngineFactory) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let queue = Arc::new(JobQueue::new());
        let mut handles = Vec::with_capacity(config.workers);

        for id in 0..config.workers {
            let worker_queue = Arc::clone(&queue);
            let factory = Arc::clone(&factory);
            let delay = config.artificial_delay;

            let spawned = thread::Builder::new()
                .name(format!("ocr-worker-{id}"))
                .spawn(move || run_worker(id, &worker_queue, &factory, delay));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Stop the ones already running before bailing out.
                    queue.shutdown();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        tracing::info!(workers = config.workers, "Worker pool started");

        Ok(Self {
            queue,
            workers: Mutex::new(handles),
            size: config.workers,
        })
    }

    /// Hand a job to the pool. The result is delivered to `reply`.
    ///
    /// Fails once the pool is shutting down; the job is returned untouched.
    pub fn submit(
        &self,
        job: Job,
        reply: oneshot::Sender<JobResult>,
    ) -> Result<(), QueueError<Job>> {
        self.queue
            .push(Task { job, reply })
            .map_err(|e| QueueError::Closed(e.into_inner().job))?;

        metrics::gauge!("ocr_queue_depth").set(self.queue.len() as f64);
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_accepting(&self) -> bool {
        self.queue.is_open()
    }

    /// Close the queue, let workers finish what is queued and in flight, and
    /// join them. Safe to call more than once.
    pub fn shutdown(&self) {
        self.queue.shutdown();

        let handles = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *workers)
        };
        if handles.is_empty() {
            return;
        }

        tracing::info!(workers = handles.len(), "Shutting down worker pool");
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked outside of recognition");
            }
        }

        // Only reachable if workers died early: nobody is left to serve these.
        while let Popped::Item(task) = self.queue.pop() {
            let _ = task.reply.send(JobResult::failure(&task.job, SHUTTING_DOWN));
        }

        tracing::info!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(id: usize, queue: &JobQueue<Task>, factory: &EngineFactory, delay: Duration) {
    let mut engine = match build_guarded(factory, id) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::error!(
                worker = id,
                error = %e,
                "Engine failed to initialize; jobs on this worker will fail"
            );
            None
        }
    };

    tracing::debug!(worker = id, "Worker ready");

    while let Popped::Item(task) = queue.pop() {
        metrics::gauge!("ocr_queue_depth").set(queue.len() as f64);

        let result = process_job(id, engine.as_mut(), &task.job, delay);

        if result.ok {
            metrics::counter!("ocr_jobs_completed_total").increment(1);
        } else {
            metrics::counter!("ocr_jobs_failed_total").increment(1);
        }

        if task.reply.send(result).is_err() {
            tracing::debug!(worker = id, "Caller stopped waiting; result dropped");
        }
    }

    tracing::debug!(worker = id, "Worker exiting");
}

fn process_job(
    worker: usize,
    engine: Option<&mut Box<dyn RecognitionEngine>>,
    job: &Job,
    delay: Duration,
) -> JobResult {
    let Some(engine) = engine else {
        return JobResult::failure(job, ENGINE_UNAVAILABLE);
    };

    let start = Instant::now();
    let outcome = recognize_guarded(&mut **engine, &job.payload);
    let elapsed = start.elapsed();
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    metrics::histogram!("ocr_processing_seconds").record(elapsed.as_secs_f64());

    if !delay.is_zero() {
        thread::sleep(delay);
    }

    match outcome {
        Ok(text) => {
            tracing::info!(
                worker,
                batch_id = job.batch_id,
                index = job.index,
                filename = %job.label,
                elapsed_ms,
                "Recognition succeeded"
            );
            JobResult::success(job, text, elapsed_ms)
        }
        Err(e) => {
            tracing::warn!(
                worker,
                batch_id = job.batch_id,
                index = job.index,
                filename = %job.label,
                error = %e,
                "Recognition failed"
            );
            let message = match e {
                EngineError::Unavailable(_) => ENGINE_UNAVAILABLE,
                _ => RECOGNITION_FAILED,
            };
            JobResult::failure_after(job, message, elapsed_ms)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool needs at least one worker")]
    NoWorkers,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

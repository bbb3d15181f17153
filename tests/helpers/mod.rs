//! Test engines, sinks and pool builders shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{ImageBuffer, ImageFormat, Luma};
use ocr_dispatch::models::job::{Job, JobResult};
use ocr_dispatch::services::batch_tracker::JobSink;
use ocr_dispatch::services::dispatcher::Dispatcher;
use ocr_dispatch::services::engine::{EngineError, EngineFactory, RecognitionEngine};
use ocr_dispatch::services::worker_pool::{WorkerPool, WorkerPoolConfig};
use tokio::sync::mpsc;

/// Text that makes [`ScriptedEngine`] return a recognition error.
pub const FAIL: &str = "<fail>";

/// Text that makes [`ScriptedEngine`] panic mid-recognition.
pub const PANIC: &str = "<panic>";

/// Build a payload understood by [`ScriptedEngine`]: sleep `delay_ms`, then
/// "recognize" `text`.
pub fn payload(text: &str, delay_ms: u64) -> Vec<u8> {
    format!("{delay_ms}|{text}").into_bytes()
}

pub fn job(batch_id: i64, index: i32, text: &str, delay_ms: u64) -> Job {
    Job {
        batch_id,
        index,
        label: format!("image_{index}.png"),
        payload: payload(text, delay_ms),
    }
}

/// Observations shared by every engine a factory hands out.
#[derive(Default)]
pub struct EngineProbe {
    pub created: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
}

impl EngineProbe {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

/// Engine whose behaviour is dictated by the payload (see [`payload`]).
pub struct ScriptedEngine {
    probe: Arc<EngineProbe>,
}

impl ScriptedEngine {
    pub fn new(probe: Arc<EngineProbe>) -> Self {
        probe.created.fetch_add(1, Ordering::SeqCst);
        Self { probe }
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn recognize(&mut self, image: &[u8]) -> Result<String, EngineError> {
        let raw = String::from_utf8_lossy(image).into_owned();
        let (delay, text) = raw
            .split_once('|')
            .ok_or_else(|| EngineError::Recognition("not a scripted payload".to_string()))?;
        let delay: u64 = delay
            .parse()
            .map_err(|_| EngineError::Recognition("bad delay".to_string()))?;

        self.probe.seen.lock().unwrap().push(text.to_string());

        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(delay));
        self.probe.active.fetch_sub(1, Ordering::SeqCst);

        match text {
            FAIL => Err(EngineError::Recognition("scripted failure".to_string())),
            PANIC => panic!("scripted panic"),
            _ => Ok(text.to_string()),
        }
    }
}

pub fn scripted_factory(probe: &Arc<EngineProbe>) -> EngineFactory {
    let probe = Arc::clone(probe);
    Arc::new(
        move |_worker: usize| -> Result<Box<dyn RecognitionEngine>, EngineError> {
            Ok(Box::new(ScriptedEngine::new(Arc::clone(&probe))))
        },
    )
}

pub fn broken_factory() -> EngineFactory {
    Arc::new(
        |_worker: usize| -> Result<Box<dyn RecognitionEngine>, EngineError> {
            Err(EngineError::Unavailable("no model files".to_string()))
        },
    )
}

pub fn panicking_factory() -> EngineFactory {
    Arc::new(
        |_worker: usize| -> Result<Box<dyn RecognitionEngine>, EngineError> {
            panic!("model load exploded")
        },
    )
}

pub fn pool(workers: usize, factory: EngineFactory) -> Arc<WorkerPool> {
    let config = WorkerPoolConfig {
        workers,
        artificial_delay: Duration::ZERO,
    };
    Arc::new(WorkerPool::new(config, factory).expect("pool should start"))
}

/// Records dispatched jobs without running them.
#[derive(Default)]
pub struct RecordingSink {
    pub jobs: RefCell<Vec<Job>>,
}

impl JobSink for RecordingSink {
    fn dispatch(&self, job: Job) {
        self.jobs.borrow_mut().push(job);
    }
}

/// Runs jobs through an in-process dispatcher, one task per job.
pub struct LocalSink {
    pub dispatcher: Dispatcher,
    pub results: mpsc::UnboundedSender<JobResult>,
}

impl JobSink for LocalSink {
    fn dispatch(&self, job: Job) {
        let dispatcher = self.dispatcher.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = dispatcher.dispatch(job).await;
            let _ = results.send(result);
        });
    }
}

/// A small, valid grayscale PNG.
pub fn tiny_png() -> Vec<u8> {
    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(16, 16, |x, y| {
        if (x + y) % 2 == 0 {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("PNG encoding should succeed");
    out
}

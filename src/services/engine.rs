use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Deserialize;
use strum::Display;

/// Text recognition capability invoked by pool workers.
///
/// Takes `&mut self`: an engine instance is never entered by two threads at
/// once. Either each worker owns its own instance, or instances are
/// [`SharedEngine`] handles that serialize on one mutex.
pub trait RecognitionEngine: Send {
    fn recognize(&mut self, image: &[u8]) -> Result<String, EngineError>;
}

impl<E: RecognitionEngine + ?Sized> RecognitionEngine for Box<E> {
    fn recognize(&mut self, image: &[u8]) -> Result<String, EngineError> {
        (**self).recognize(image)
    }
}

/// How worker engines relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EngineSharing {
    /// One instance per worker, full parallelism.
    #[default]
    PerWorker,
    /// One instance behind a mutex, at most one recognition at a time.
    Shared,
}

/// Builds the engine a worker will use. Called once per worker, on that
/// worker's own thread, with the worker's index.
pub type EngineFactory =
    Arc<dyn Fn(usize) -> Result<Box<dyn RecognitionEngine>, EngineError> + Send + Sync>;

/// Handle to a single engine shared by all workers.
///
/// Every call takes the same lock for its whole duration.
pub struct SharedEngine<E> {
    inner: Arc<Mutex<E>>,
}

impl<E> Clone for SharedEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: RecognitionEngine> SharedEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }
}

impl<E: RecognitionEngine> RecognitionEngine for SharedEngine<E> {
    fn recognize(&mut self, image: &[u8]) -> Result<String, EngineError> {
        // A panic in a previous call poisons the lock; the engine is still
        // the only copy we have, so keep using it.
        let mut engine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        engine.recognize(image)
    }
}

/// Wrap a factory according to the configured sharing policy.
///
/// With [`EngineSharing::Shared`] the inner factory runs once, on whichever
/// worker asks first; a failure there leaves every worker without an engine.
pub fn with_sharing(factory: EngineFactory, sharing: EngineSharing) -> EngineFactory {
    match sharing {
        EngineSharing::PerWorker => factory,
        EngineSharing::Shared => {
            let cell: Arc<OnceLock<Result<SharedEngine<Box<dyn RecognitionEngine>>, String>>> =
                Arc::new(OnceLock::new());
            let shared_factory: EngineFactory = Arc::new(move |worker: usize| {
                let shared = cell.get_or_init(|| {
                    factory(worker)
                        .map(SharedEngine::new)
                        .map_err(|e| e.to_string())
                });
                match shared {
                    Ok(engine) => Ok(Box::new(engine.clone()) as Box<dyn RecognitionEngine>),
                    Err(reason) => Err(EngineError::Unavailable(reason.clone())),
                }
            });
            shared_factory
        }
    }
}

/// Build a worker's engine, treating a panicking factory as an unavailable
/// engine so the worker stays alive to fail its jobs fast.
pub fn build_guarded(
    factory: &EngineFactory,
    worker: usize,
) -> Result<Box<dyn RecognitionEngine>, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(|| factory(worker)))
        .unwrap_or_else(|payload| Err(EngineError::Unavailable(panic_reason(payload.as_ref()))))
}

/// Run one recognition, turning a panic inside the engine into an error.
pub fn recognize_guarded(
    engine: &mut dyn RecognitionEngine,
    image: &[u8],
) -> Result<String, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(|| engine.recognize(image)))
        .unwrap_or_else(|payload| Err(EngineError::Recognition(panic_reason(payload.as_ref()))))
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "engine panicked".to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Recognition engine unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition produced no usable output: {0}")]
    Recognition(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse recognition response: {0}")]
    Parse(#[from] serde_json::Error),
}

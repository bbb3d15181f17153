pub mod batch_tracker;
pub mod client;
pub mod dispatcher;
pub mod engine;
pub mod ocr;
pub mod queue;
pub mod worker_pool;

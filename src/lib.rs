//! OCR dispatch service
//!
//! This library provides the job-dispatch core of a text-recognition service:
//! a fixed pool of worker threads fed from one FIFO queue, a dispatcher that
//! turns each inbound request into a job and waits on its own completion slot,
//! and the requester-side batch tracker that reconciles out-of-order results.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

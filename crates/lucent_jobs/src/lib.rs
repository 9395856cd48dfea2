//! # lucent_jobs
//!
//! Asynchronous job orchestration for the explanation pipeline.
//!
//! [`JobService`] accepts submissions without blocking, runs them on a single
//! background worker thread, and caches completed results by a content
//! fingerprint so identical resubmissions finish synchronously. The job table
//! only moves forward: `Queued -> Running -> Succeeded | Failed`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod fingerprint;
mod job;
mod orchestrator;
mod result_cache;

pub use fingerprint::{fingerprint, FingerprintInput};
pub use job::{
    ClassScore, ExplainParams, JobRecord, JobResult, JobStatus, Timings, TOP_K_MAX, TOP_K_MIN,
};
pub use orchestrator::JobService;
pub use result_cache::ResultCache;

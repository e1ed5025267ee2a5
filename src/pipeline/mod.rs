//! Pipeline controller: orchestrates the three-stage import (spec §4.8,
//! §5 concurrency).

pub mod controller;
pub mod worker_pool;

pub use controller::PipelineController;

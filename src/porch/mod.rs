//! # Porch Task Queue
//!
//! Client for the porch durable task queue, which decouples the producers
//! that discover notification events from the consumers that send the
//! notifications.

pub mod client;
pub mod types;

pub use client::{PorchClient, PorchClientConfig};
pub use types::{BatchCounts, PipelineSpec, TaskEnvelope, TaskStatus, TaskView};

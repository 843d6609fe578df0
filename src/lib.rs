//! # Seqnotify
//!
//! Customer notifications for sequencing platforms. Emails study contacts
//! when a PacBio well completes its manual QC review and when something
//! happens to an ONT run, such as its data arriving in iRODS. Both flows
//! coordinate their work through a porch task server, which guarantees
//! each notification is produced once even when producers and consumers
//! run on independent schedules.

pub mod baton;
pub mod config;
pub mod error;
pub mod mail;
pub mod mlwh;
pub mod ont;
pub mod pacbio;
pub mod porch;

// Re-export commonly used types for convenience
pub use config::NotifyConfig;
pub use error::{NotifyError, NotifyResult};
pub use porch::{BatchCounts, PorchClient, PorchClientConfig, TaskStatus};

/// The version of this crate, reported to porch as the pipeline version
/// unless the configuration pins one.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

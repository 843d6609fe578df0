//! # PacBio QC Notifications
//!
//! Emails customers when the manual QC review of a PacBio well completes.
//! QC states come from the LangQC service, task coordination goes through
//! porch, and study contacts come from the ml warehouse.

pub mod email;
pub mod langqc;
pub mod tasks;

pub use email::generate_qc_email;
pub use langqc::{LangQcClient, Library, QcState, WellLibraries};
pub use tasks::{process_next_task, register_qc_tasks};

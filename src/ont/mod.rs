//! # ONT Run-Event Notifications
//!
//! Emails study contacts when something happens to an Oxford Nanopore
//! run, such as its data arriving in iRODS or being basecalled. Runs are
//! identified by the metadata on their iRODS collections; task
//! coordination goes through porch.

pub mod event;
pub mod tasks;

pub use event::{ContactEmail, EventType};
pub use tasks::{add_email_tasks, run_email_tasks};

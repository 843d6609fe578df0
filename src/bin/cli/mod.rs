//! CLI module for the seqnotify tool
//!
//! Organizes the command handlers for the two notification platforms.

pub mod commands;

pub use commands::{handle_ont_command, handle_pacbio_command};

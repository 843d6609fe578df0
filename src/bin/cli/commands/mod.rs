//! Command handlers for the seqnotify CLI, one module per platform

pub mod ont;
pub mod pacbio;

pub use ont::handle_ont_command;
pub use pacbio::handle_pacbio_command;

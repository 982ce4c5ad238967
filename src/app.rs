//! Entry-point plumbing: command line and logging.

pub mod cli;
pub mod logging;

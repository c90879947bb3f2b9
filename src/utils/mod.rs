//! Logging and console helpers shared by the service and the command line

pub mod logger;
pub(crate) mod progress;

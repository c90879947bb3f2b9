//! Command pattern interfaces

use clap::ArgMatches;

use crate::api::EoWcs;
use crate::errors::WcsResult;

/// An executable command line operation
pub trait Command {
    /// Execute the command
    ///
    /// # Returns
    /// Result indicating success or the service error that ended the command
    fn execute(&self) -> WcsResult<()>;
}

/// Builds the command selected by the command line arguments
pub trait CommandFactory<'a> {
    /// Create a new Command instance based on CLI arguments
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `service` - Service the command runs against
    ///
    /// # Returns
    /// A command that implements the Command trait, or an error
    fn create_command(&self, args: &ArgMatches, service: &'a EoWcs) -> WcsResult<Box<dyn Command + 'a>>;
}

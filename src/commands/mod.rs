//! CLI command implementations
//!
//! The binary runs one request per invocation, much like the CGI program it
//! stands in for: either a GetCoverage extraction or a coverage description.

pub mod command_traits;
pub mod describe_command;
pub mod get_coverage_command;

pub use command_traits::{Command, CommandFactory};
pub use describe_command::DescribeCommand;
pub use get_coverage_command::GetCoverageCommand;

use clap::ArgMatches;

use crate::api::EoWcs;
use crate::errors::WcsResult;

/// Picks the command for the parsed arguments
#[derive(Debug, Default)]
pub struct WcsCommandFactory;

impl WcsCommandFactory {
    pub fn new() -> Self {
        WcsCommandFactory
    }
}

impl<'a> CommandFactory<'a> for WcsCommandFactory {
    fn create_command(&self, args: &ArgMatches, service: &'a EoWcs) -> WcsResult<Box<dyn Command + 'a>> {
        if args.get_flag("describe") {
            Ok(Box::new(DescribeCommand::new(args, service)?))
        } else {
            Ok(Box::new(GetCoverageCommand::new(args, service)?))
        }
    }
}

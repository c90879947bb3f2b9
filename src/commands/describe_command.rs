//! Coverage description command

use std::io::{self, Write};

use clap::ArgMatches;
use log::info;

use crate::api::EoWcs;
use crate::commands::command_traits::Command;
use crate::commands::get_coverage_command::read_request_argument;
use crate::errors::WcsResult;

/// Prints what the service knows about one coverage
pub struct DescribeCommand<'a> {
    coverage_id: String,
    service: &'a EoWcs,
}

impl<'a> DescribeCommand<'a> {
    pub fn new(args: &ArgMatches, service: &'a EoWcs) -> WcsResult<Self> {
        let coverage_id = read_request_argument(args)?.trim().to_string();
        Ok(DescribeCommand { coverage_id, service })
    }
}

impl<'a> Command for DescribeCommand<'a> {
    fn execute(&self) -> WcsResult<()> {
        info!("Describing {}", self.coverage_id);
        let description = self.service.describe(&self.coverage_id)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        write!(out, "{}", description)?;
        Ok(())
    }
}

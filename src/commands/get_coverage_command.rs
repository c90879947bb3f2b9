//! GetCoverage command
//!
//! Parses a KVP or XML request and extracts the coverage, either into a file
//! named on the command line or as a CGI style response on stdout.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::api::EoWcs;
use crate::commands::command_traits::Command;
use crate::errors::{WcsError, WcsResult};
use crate::pipeline::OutputTarget;
use crate::request::ServiceRequest;

/// Request text given directly or as `@path`
pub(crate) fn read_request_argument(args: &ArgMatches) -> WcsResult<String> {
    let raw = args
        .get_one::<String>("request")
        .ok_or_else(|| WcsError::missing("request", "Missing request argument"))?;
    match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            WcsError::no_applicable("request", format!("Failed to read request file {}: {}", path, e))
        }),
        None => Ok(raw.clone()),
    }
}

/// Command for extracting one coverage
pub struct GetCoverageCommand<'a> {
    request_text: String,
    xml: bool,
    output_file: Option<PathBuf>,
    service: &'a EoWcs,
}

impl<'a> GetCoverageCommand<'a> {
    /// Create a new GetCoverage command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `service` - Service that runs the extraction
    pub fn new(args: &ArgMatches, service: &'a EoWcs) -> WcsResult<Self> {
        let request_text = read_request_argument(args)?;
        let xml = args.get_flag("xml");
        let output_file = args.get_one::<String>("output").map(PathBuf::from);
        info!("GetCoverage request ({}), output {:?}", if xml { "XML" } else { "KVP" }, output_file);

        Ok(GetCoverageCommand { request_text, xml, output_file, service })
    }

    fn target(&self) -> OutputTarget {
        match &self.output_file {
            Some(path) => OutputTarget::File(path.clone()),
            None => OutputTarget::Respond,
        }
    }
}

impl<'a> Command for GetCoverageCommand<'a> {
    fn execute(&self) -> WcsResult<()> {
        let request = match self.service.parse_request(&self.request_text, self.xml)? {
            ServiceRequest::GetCoverage(request) => request,
            ServiceRequest::DescribeCoverage { coverage_ids } => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                for id in coverage_ids {
                    let description = self.service.describe(&id)?;
                    write!(out, "{}", description)?;
                }
                return Ok(());
            }
        };

        let target = self.target();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let extraction = self.service.get_coverage(&request, &target, &mut out)?;

        if let OutputTarget::File(path) = &target {
            writeln!(out, "Coverage {} written to {}", request.coverage_id, path.display())?;
            writeln!(out, "  {}", extraction.plan)?;
        }
        info!("Request for {} completed", request.coverage_id);
        Ok(())
    }
}

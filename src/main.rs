use clap::{Arg, ArgAction, Command as ClapCommand};
use log::error;
use std::io;
use std::path::PathBuf;
use std::process;

use eowcs::commands::{CommandFactory, WcsCommandFactory};
use eowcs::config::ServiceConfig;
use eowcs::errors::WcsError;
use eowcs::pipeline::delivery::report_error;
use eowcs::utils::logger::Logger;
use eowcs::EoWcs;

const DEFAULT_CONFIG_FILE: &str = "eowcs.toml";

/// `eowcs.toml` next to the executable
fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(DEFAULT_CONFIG_FILE))
}

fn load_config(explicit: Option<&String>) -> Result<ServiceConfig, WcsError> {
    match explicit {
        Some(path) => ServiceConfig::load(&PathBuf::from(path)),
        None => match default_config_path() {
            Some(path) if path.exists() => ServiceConfig::load(&path),
            _ => Ok(ServiceConfig::default()),
        },
    }
}

fn fail(error: &WcsError, respond: bool) -> ! {
    error!("Request failed: {}", error);
    if respond {
        report_error(&mut io::stdout().lock(), error);
    }
    eprintln!("Error: {}", error);
    process::exit(1);
}

fn main() {
    let matches = ClapCommand::new("eowcs")
        .version("0.1.0")
        .author("Maurice Schilpp")
        .about("Extract HDF-EOS, TRMM, NITF and GOES coverages through WCS 2.0 requests")
        .arg(
            Arg::new("request")
                .help("KVP query string, XML request, or @FILE holding either")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Service configuration file")
                .value_name("FILE")
                .required(false),
        )
        .arg(
            Arg::new("xml")
                .short('x')
                .long("xml")
                .help("Treat the request as an XML document")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write the coverage to this file instead of responding on stdout")
                .value_name("FILE")
                .required(false),
        )
        .arg(
            Arg::new("describe")
                .short('d')
                .long("describe")
                .help("Describe the coverage named by REQUEST instead of extracting it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let respond = matches.get_one::<String>("output").is_none() && !matches.get_flag("describe");

    let config = match load_config(matches.get_one::<String>("config")) {
        Ok(config) => config,
        Err(e) => fail(&e, respond),
    };

    let log_file = config.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    if let Err(e) = Logger::init_global_logger(log_file.as_deref(), verbose) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    // Spinners would corrupt a response written to stdout
    let service = match EoWcs::new(config, verbose && !respond) {
        Ok(service) => service,
        Err(e) => fail(&e, respond),
    };

    let factory = WcsCommandFactory::new();
    match factory.create_command(&matches, &service) {
        Ok(command) => {
            if let Err(e) = command.execute() {
                fail(&e, respond);
            }
        }
        Err(e) => fail(&e, respond),
    };
}

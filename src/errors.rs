//! Error types for coverage resolution and extraction
//!
//! Every failure a request can hit maps onto one of the four OWS exception
//! codes. The variant carries the locator (the offending parameter or
//! stage) and a human readable message that ends up in the exception report.

use std::fmt;
use std::io;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::coordinate::CrsError;

/// OWS exception codes understood by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    NoSuchCoverage,
    NoApplicableCode,
}

impl ExceptionCode {
    /// Name used in the `exceptionCode` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::NoSuchCoverage => "NoSuchCoverage",
            ExceptionCode::NoApplicableCode => "NoApplicableCode",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Service error types
#[derive(Debug)]
pub enum WcsError {
    /// A mandatory parameter was absent
    MissingParameterValue { locator: String, message: String },
    /// A parameter was present but unusable
    InvalidParameterValue { locator: String, message: String },
    /// The coverage identifier does not name a coverage we can open
    NoSuchCoverage { locator: String, message: String },
    /// Everything else: unreadable granules, failed tools, bad georeferencing
    NoApplicableCode { locator: String, message: String },
    /// I/O error while staging or delivering artifacts
    IoError(io::Error),
}

impl WcsError {
    pub fn missing(locator: &str, message: impl Into<String>) -> Self {
        WcsError::MissingParameterValue { locator: locator.to_string(), message: message.into() }
    }

    pub fn invalid(locator: &str, message: impl Into<String>) -> Self {
        WcsError::InvalidParameterValue { locator: locator.to_string(), message: message.into() }
    }

    pub fn no_such_coverage(locator: &str, message: impl Into<String>) -> Self {
        WcsError::NoSuchCoverage { locator: locator.to_string(), message: message.into() }
    }

    pub fn no_applicable(locator: &str, message: impl Into<String>) -> Self {
        WcsError::NoApplicableCode { locator: locator.to_string(), message: message.into() }
    }

    /// The OWS exception code this error is reported under
    pub fn code(&self) -> ExceptionCode {
        match self {
            WcsError::MissingParameterValue { .. } => ExceptionCode::MissingParameterValue,
            WcsError::InvalidParameterValue { .. } => ExceptionCode::InvalidParameterValue,
            WcsError::NoSuchCoverage { .. } => ExceptionCode::NoSuchCoverage,
            WcsError::NoApplicableCode { .. } | WcsError::IoError(_) => ExceptionCode::NoApplicableCode,
        }
    }

    pub fn locator(&self) -> &str {
        match self {
            WcsError::MissingParameterValue { locator, .. }
            | WcsError::InvalidParameterValue { locator, .. }
            | WcsError::NoSuchCoverage { locator, .. }
            | WcsError::NoApplicableCode { locator, .. } => locator,
            WcsError::IoError(_) => "IO",
        }
    }

    pub fn message(&self) -> String {
        match self {
            WcsError::MissingParameterValue { message, .. }
            | WcsError::InvalidParameterValue { message, .. }
            | WcsError::NoSuchCoverage { message, .. }
            | WcsError::NoApplicableCode { message, .. } => message.clone(),
            WcsError::IoError(e) => e.to_string(),
        }
    }

    /// Render the error as an OWS 2.0 exception report document
    pub fn to_exception_report(&self) -> String {
        match self.write_exception_report() {
            Ok(xml) => xml,
            // Writing into a Vec only fails on invalid UTF-8, which our inputs never are
            Err(_) => format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><ExceptionReport><Exception exceptionCode=\"{}\"/></ExceptionReport>",
                self.code()
            ),
        }
    }

    fn write_exception_report(&self) -> Result<String, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let code = self.code();
        let locator = self.locator().to_string();

        let mut report = BytesStart::new("ExceptionReport");
        report.push_attribute(("xmlns", "http://www.opengis.net/ows/2.0"));
        report.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        report.push_attribute((
            "xsi:schemaLocation",
            "http://www.opengis.net/ows/2.0 http://schemas.opengis.net/ows/2.0/owsExceptionReport.xsd",
        ));
        report.push_attribute(("version", "2.0.0"));
        report.push_attribute(("xml:lang", "en"));

        let mut exception = BytesStart::new("Exception");
        exception.push_attribute(("exceptionCode", code.as_str()));
        exception.push_attribute(("locator", locator.as_str()));

        let message = self.message();
        let events = [
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
            Event::Start(report),
            Event::Start(exception),
            Event::Start(BytesStart::new("ExceptionText")),
            Event::Text(BytesText::new(&message)),
            Event::End(BytesEnd::new("ExceptionText")),
            Event::End(BytesEnd::new("Exception")),
            Event::End(BytesEnd::new("ExceptionReport")),
        ];
        for event in events {
            writer.write_event(event).map_err(|e| e.to_string())?;
        }

        String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
    }
}

impl fmt::Display for WcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WcsError::IoError(e) => write!(f, "I/O error: {}", e),
            other => write!(f, "{} [{}]: {}", other.code(), other.locator(), other.message()),
        }
    }
}

impl std::error::Error for WcsError {}

impl From<io::Error> for WcsError {
    fn from(error: io::Error) -> Self {
        WcsError::IoError(error)
    }
}

impl From<CrsError> for WcsError {
    fn from(error: CrsError) -> Self {
        WcsError::no_applicable("CRS", error.to_string())
    }
}

/// Result type for service operations
pub type WcsResult<T> = Result<T, WcsError>;

//! Response streams
//!
//! Responses are written CGI style: header lines, a blank line, then the
//! body. The writers take any [`Write`] so the command line can point them at
//! stdout and tests at a buffer.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use log::{error, info};

use super::eo_metadata::coverages_reference;
use crate::errors::{WcsError, WcsResult};
use crate::request::SubsetRequest;

pub const MULTIPART_BOUNDARY: &str = "gmueowcs";

/// How the artifact reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The artifact bytes as the response body
    Direct,
    /// The artifact followed by the EO metadata document
    Multipart,
    /// A reference to the artifact published under the output URL
    Store,
}

impl DeliveryMode {
    pub fn for_request(request: &SubsetRequest) -> Self {
        if request.store {
            DeliveryMode::Store
        } else if request.multipart {
            DeliveryMode::Multipart
        } else {
            DeliveryMode::Direct
        }
    }

    /// Whether the artifact must outlive the request
    pub fn keeps_artifact(&self) -> bool {
        !matches!(self, DeliveryMode::Direct)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn open_artifact(path: &Path) -> WcsResult<(File, u64)> {
    let file = File::open(path).map_err(|e| {
        WcsError::no_applicable("Delivery", format!("Failed to open output file {}: {}", path.display(), e))
    })?;
    let length = file.metadata()?.len();
    Ok((file, length))
}

fn write_file_part<W: Write + ?Sized>(out: &mut W, path: &Path, content_type: &str) -> WcsResult<u64> {
    let (mut file, length) = open_artifact(path)?;
    write!(out, "Content-Length: {}\r\n", length)?;
    write!(out, "Content-Type: {}\r\n", content_type)?;
    write!(out, "Content-Disposition: attachment; filename={}\r\n\r\n", file_name(path))?;
    let copied = io::copy(&mut file, out)?;
    Ok(copied)
}

/// Stream the artifact as the whole response
pub fn deliver_direct<W: Write + ?Sized>(out: &mut W, path: &Path, content_type: &str) -> WcsResult<u64> {
    let copied = write_file_part(out, path, content_type)?;
    out.flush()?;
    info!("Delivered {} bytes of {}", copied, path.display());
    Ok(copied)
}

/// Stream the artifact followed by its EO metadata
pub fn deliver_multipart<W: Write + ?Sized>(out: &mut W, path: &Path, content_type: &str, eo_metadata: &str) -> WcsResult<u64> {
    write!(out, "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n", MULTIPART_BOUNDARY)?;
    write!(out, "--{}\r\n", MULTIPART_BOUNDARY)?;
    let copied = write_file_part(out, path, content_type)?;
    write!(out, "\r\n--{}\r\n", MULTIPART_BOUNDARY)?;
    write!(out, "Content-Type: text/xml\r\n\r\n")?;
    write!(out, "{}\r\n\r\n", eo_metadata)?;
    write!(out, "--{}--\r\n", MULTIPART_BOUNDARY)?;
    out.flush()?;
    info!("Delivered {} bytes of {} with EO metadata", copied, path.display());
    Ok(copied)
}

/// Answer with a reference to the stored artifact
pub fn deliver_store<W: Write + ?Sized>(out: &mut W, path: &Path, output_prefix_url: &str) -> WcsResult<String> {
    let url = format!("{}{}", output_prefix_url, file_name(path));
    let document = coverages_reference(&url)?;
    write!(out, "Content-Type: text/xml\r\n\r\n{}\r\n", document)?;
    out.flush()?;
    info!("Stored coverage published as {}", url);
    Ok(url)
}

/// Answer with an OWS exception report
pub fn deliver_error<W: Write + ?Sized>(out: &mut W, error: &WcsError) -> io::Result<()> {
    write!(out, "Content-Type: text/xml\r\n\r\n{}\r\n", error.to_exception_report())?;
    out.flush()
}

/// Send the exception report, logging a response that could not be written
pub fn report_error<W: Write + ?Sized>(out: &mut W, error: &WcsError) -> bool {
    match deliver_error(out, error) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to write the exception report for \"{}\": {}", error, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn artifact(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("cov.tif");
        fs::write(&path, b"TIFFDATA").unwrap();
        path
    }

    #[test]
    fn test_direct_headers_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let mut out = Vec::new();
        assert_eq!(deliver_direct(&mut out, &path, "image/tiff").unwrap(), 8);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Content-Length: 8\r\nContent-Type: image/tiff\r\nContent-Disposition: attachment; filename=cov.tif\r\n\r\nTIFFDATA"
        );
    }

    #[test]
    fn test_multipart_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let mut out = Vec::new();
        deliver_multipart(&mut out, &path, "image/tiff", "<wcseo:RectifiedDataset/>").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Content-Type: multipart/mixed; boundary=\"gmueowcs\""));
        assert_eq!(text.matches("--gmueowcs\r\n").count(), 2);
        assert!(text.contains("TIFFDATA"));
        assert!(text.contains("Content-Type: text/xml\r\n\r\n<wcseo:RectifiedDataset/>"));
        assert!(text.ends_with("--gmueowcs--\r\n"));
    }

    #[test]
    fn test_store_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(dir.path());
        let mut out = Vec::new();
        let url = deliver_store(&mut out, &path, "http://localhost/output/").unwrap();
        assert_eq!(url, "http://localhost/output/cov.tif");
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Content-Type: text/xml\r\n\r\n<?xml"));
    }

    #[test]
    fn test_missing_artifact() {
        let mut out = Vec::new();
        assert!(deliver_direct(&mut out, Path::new("/nonexistent/cov.tif"), "image/tiff").is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_error_report() {
        let mut out = Vec::new();
        deliver_error(&mut out, &WcsError::invalid("FORMAT", "The specified format is not supported.")).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Content-Type: text/xml\r\n\r\n"));
        assert!(text.contains("exceptionCode=\"InvalidParameterValue\""));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_error_on_closed_output() {
        let error = WcsError::missing("FORMAT", "No FORMAT Value.");
        assert!(!report_error(&mut ClosedPipe, &error));

        let mut out = Vec::<u8>::new();
        assert!(report_error(&mut out, &error));
        assert!(String::from_utf8(out).unwrap().starts_with("Content-Type: text/xml\r\n\r\n"));
    }

    #[test]
    fn test_mode_selection() {
        let mut request = SubsetRequest::new("cov", "image/tiff");
        assert_eq!(DeliveryMode::for_request(&request), DeliveryMode::Direct);
        request.multipart = true;
        assert_eq!(DeliveryMode::for_request(&request), DeliveryMode::Multipart);
        request.store = true;
        assert_eq!(DeliveryMode::for_request(&request), DeliveryMode::Store);
        assert!(DeliveryMode::Store.keeps_artifact());
    }
}

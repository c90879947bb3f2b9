//! Output format table

use crate::errors::{WcsError, WcsResult};

/// An output encoding the service can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Format code reported back to clients
    pub code: &'static str,
    /// Raster driver used for the final copy
    pub driver: &'static str,
    pub content_type: &'static str,
    pub suffix: &'static str,
}

const FORMATS: &[(&[&str], OutputFormat)] = &[
    (&["tiff", "geotiff", "gtiff"], OutputFormat { code: "GTIFF", driver: "GTiff", content_type: "image/tiff", suffix: ".tif" }),
    (&["netcdf", "x-netcdf"], OutputFormat { code: "netCDF", driver: "netCDF", content_type: "application/x-netcdf", suffix: ".nc" }),
    (&["jpeg2000", "jp2"], OutputFormat { code: "JPEG2000", driver: "JPEG2000", content_type: "image/jp2", suffix: ".jp2" }),
    (&["jp2kak"], OutputFormat { code: "JP2KAK", driver: "JP2KAK", content_type: "image/jp2", suffix: ".j2k" }),
    (&["jpeg"], OutputFormat { code: "JPEG", driver: "JPEG", content_type: "image/jpeg", suffix: ".jpg" }),
    (&["png"], OutputFormat { code: "PNG", driver: "PNG", content_type: "image/png", suffix: ".png" }),
    (&["hdf4", "hdf4image", "hdf", "x-hdf"], OutputFormat { code: "HDF4Image", driver: "HDF4Image", content_type: "application/x-hdf", suffix: ".hdf" }),
    (&["hdf5", "hdf5image"], OutputFormat { code: "HDF5", driver: "HDF5", content_type: "application/x-hdf", suffix: ".he5" }),
    (&["gif"], OutputFormat { code: "GIF", driver: "GIF", content_type: "image/gif", suffix: ".gif" }),
    (&["nitf", "vnd.iptc.nitf"], OutputFormat { code: "NITF", driver: "NITF", content_type: "text/vnd.iptc.nitf", suffix: ".ntf" }),
    (&["x-hdfeos"], OutputFormat { code: "HDFEOS", driver: "HDF4Image", content_type: "application/x-hdfeos", suffix: ".hdf" }),
];

impl OutputFormat {
    /// Look up a requested format such as `image/tiff` or `application/x-netcdf`
    ///
    /// Only the part after the last `/` is compared, case-insensitively.
    pub fn from_request(format: &str) -> WcsResult<OutputFormat> {
        let subtype = format.rsplit('/').next().unwrap_or(format).trim().to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|(names, _)| names.contains(&subtype.as_str()))
            .map(|(_, fmt)| *fmt)
            .ok_or_else(|| WcsError::invalid("FORMAT", "The specified format is not supported."))
    }

    /// Whether encoding goes through the external JPEG 2000 compressor
    pub fn uses_compressor(&self) -> bool {
        self.code == "JPEG2000"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExceptionCode;

    #[test]
    fn test_lookup_ignores_type_and_case() {
        let tiff = OutputFormat::from_request("image/GeoTIFF").unwrap();
        assert_eq!(tiff.driver, "GTiff");
        assert_eq!(tiff.suffix, ".tif");
        assert_eq!(OutputFormat::from_request("application/x-netcdf").unwrap().code, "netCDF");
        assert_eq!(OutputFormat::from_request("PNG").unwrap().content_type, "image/png");
        assert!(OutputFormat::from_request("image/jpeg2000").unwrap().uses_compressor());
    }

    #[test]
    fn test_hdfeos_is_written_as_hdf4() {
        let fmt = OutputFormat::from_request("application/x-hdfeos").unwrap();
        assert_eq!(fmt.driver, "HDF4Image");
        assert_eq!(fmt.content_type, "application/x-hdfeos");
    }

    #[test]
    fn test_unknown_format() {
        let err = OutputFormat::from_request("image/bmp").unwrap_err();
        assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.message(), "The specified format is not supported.");
    }
}

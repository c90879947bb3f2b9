//! Coverage identifier grammar
//!
//! Identifiers are colon separated; colons inside double quotes belong to the
//! segment (quoted file paths).

use crate::errors::{WcsError, WcsResult};

const ID_ERROR: &str = "Coverage ID Error.";

/// Product family an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageFamily {
    He4Grid,
    He4Swath,
    He5Grid,
    He5Swath,
    Trmm,
    Goes,
    Nitf,
}

impl CoverageFamily {
    /// Classify an identifier by prefix
    pub fn classify(identifier: &str) -> WcsResult<CoverageFamily> {
        let id = identifier.trim();
        if id.is_empty() {
            return Err(WcsError::no_such_coverage("COVERAGEID", "The value of coverage identifier is null."));
        }
        let upper = id.to_ascii_uppercase();

        let family = if upper.starts_with("HDF4_EOS:EOS_SWATH:") {
            CoverageFamily::He4Swath
        } else if upper.starts_with("HDF4_EOS:EOS_GRID:") {
            CoverageFamily::He4Grid
        } else if upper.starts_with("TRMM:") {
            CoverageFamily::Trmm
        } else if upper.starts_with("HDF5:") && upper.contains("HDFEOS/GRIDS") {
            CoverageFamily::He5Grid
        } else if upper.starts_with("HDF5:") && upper.contains("HDFEOS/SWATHS") {
            CoverageFamily::He5Swath
        } else if upper.starts_with("GOES:NETCDF") {
            CoverageFamily::Goes
        } else if upper.starts_with("NITF") {
            CoverageFamily::Nitf
        } else {
            return Err(WcsError::no_applicable(
                "COVERAGEID",
                format!("The coverage \"{}\" is not supported.", id),
            ));
        };
        Ok(family)
    }

    pub fn product_description(&self) -> &'static str {
        match self {
            CoverageFamily::He4Grid => "The data was created by WCS from HDF4_EOS_GRID data.",
            CoverageFamily::He4Swath => "The data was created by WCS from HDF4_EOS SWATH data.",
            CoverageFamily::He5Grid => "The data was created by WCS from HDF-EOS5 GRID data.",
            CoverageFamily::He5Swath => "The data was created by WCS from HDF-EOS5 SWATH data.",
            CoverageFamily::Trmm => "The data was created by GMU WCS from TRMM daily data.",
            CoverageFamily::Goes => "The data was created by WCS from GOES data.",
            CoverageFamily::Nitf => "The data was created by WCS from NITF data.",
        }
    }

    /// Missing value used when the first band declares none
    pub fn default_missing_value(&self) -> f64 {
        match self {
            CoverageFamily::Trmm => -9999.9,
            CoverageFamily::Nitf => 0.0,
            _ => -9999.0,
        }
    }

    /// Driver the raster library must report for the family
    pub fn required_driver(&self) -> Option<&'static str> {
        match self {
            CoverageFamily::He4Grid | CoverageFamily::He4Swath => Some("HDF4Image"),
            CoverageFamily::He5Grid | CoverageFamily::He5Swath => Some("HDF5Image"),
            _ => None,
        }
    }

    pub fn is_hdf_eos5(&self) -> bool {
        matches!(self, CoverageFamily::He5Grid | CoverageFamily::He5Swath)
    }
}

/// A parsed coverage identifier
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageIdentifier {
    pub family: CoverageFamily,
    /// Identifier handed to the raster library
    pub library_id: String,
    /// Path of the granule file
    pub file: String,
    /// Grid or swath name
    pub data_type: String,
    /// Field or dataset name
    pub dataset: String,
}

impl CoverageIdentifier {
    pub fn parse(identifier: &str) -> WcsResult<CoverageIdentifier> {
        let family = CoverageFamily::classify(identifier)?;
        let id = identifier.trim().replace('\'', "\"");
        let segments = split_segments(&id);

        match family {
            CoverageFamily::He4Grid | CoverageFamily::He4Swath => {
                let [prefix, kind, file, data_type, field] = expect_segments::<5>(&segments)?;
                let dataset = if field.contains(' ') && !field.starts_with('"') {
                    format!("\"{}\"", field)
                } else {
                    field.clone()
                };
                Ok(CoverageIdentifier {
                    family,
                    library_id: format!("{}:{}:{}:{}:{}", prefix, kind, file, data_type, dataset),
                    file: trim_file(&file),
                    data_type: data_type.clone(),
                    dataset,
                })
            }
            CoverageFamily::He5Grid | CoverageFamily::He5Swath => {
                let [_, file, path] = expect_segments::<3>(&segments)?;
                let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
                let (data_type, dataset) = match (parts.get(2), parts.get(4)) {
                    (Some(data_type), Some(dataset)) => (data_type.to_string(), dataset.to_string()),
                    _ => return Err(WcsError::no_such_coverage("COVERAGEID", ID_ERROR)),
                };
                Ok(CoverageIdentifier { family, library_id: id.clone(), file: trim_file(&file), data_type, dataset })
            }
            CoverageFamily::Trmm => {
                let [_, file, dataset] = expect_segments::<3>(&segments)?;
                let file = trim_file(&file);
                Ok(CoverageIdentifier {
                    family,
                    library_id: file.clone(),
                    file,
                    data_type: "TRMM".to_string(),
                    dataset: dataset.clone(),
                })
            }
            CoverageFamily::Nitf => {
                let [_, file, dataset] = expect_segments::<3>(&segments)?;
                let file = trim_file(&file);
                Ok(CoverageIdentifier {
                    family,
                    library_id: file.clone(),
                    file,
                    data_type: "NITF".to_string(),
                    dataset: dataset.clone(),
                })
            }
            CoverageFamily::Goes => {
                if !(3..=4).contains(&segments.len()) {
                    return Err(WcsError::no_such_coverage("COVERAGEID", ID_ERROR));
                }
                Ok(CoverageIdentifier {
                    family,
                    library_id: identifier.trim().to_string(),
                    file: trim_file(&segments[2]),
                    data_type: "GOES".to_string(),
                    dataset: segments.get(3).cloned().unwrap_or_default(),
                })
            }
        }
    }

    /// TRMM daily product
    pub fn is_daily(&self) -> bool {
        self.family == CoverageFamily::Trmm && self.dataset.eq_ignore_ascii_case("Daily")
    }
}

fn trim_file(file: &str) -> String {
    file.trim_matches(|c| c == ' ' || c == '"' || c == '\'').to_string()
}

fn expect_segments<const N: usize>(segments: &[String]) -> WcsResult<[String; N]> {
    <[String; N]>::try_from(segments.to_vec())
        .map_err(|_| WcsError::no_such_coverage("COVERAGEID", ID_ERROR))
}

/// Split on ':' outside double quotes
pub fn split_segments(identifier: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in identifier.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ':' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

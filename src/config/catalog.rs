//! Dataset catalog
//!
//! Maps the coverage names published by the service to the identifiers the
//! raster library opens. Catalog files list `<Dataset>` records, either at
//! the top level or grouped under `<DatasetSeries><Datasets>`.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::coordinate::BoundingBox;
use crate::errors::{WcsError, WcsResult};

/// One granule published by the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: String,
    pub coverage_id: String,
    pub west: Option<f64>,
    pub east: Option<f64>,
    pub south: Option<f64>,
    pub north: Option<f64>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
}

impl CatalogEntry {
    /// Advertised extent, when all four edges are present
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        Some(BoundingBox::from_edges(self.west?, self.east?, self.south?, self.north?))
    }

    fn set_field(&mut self, field: &str, text: &str) {
        let number = || text.trim().parse::<f64>().ok();
        match field {
            "name" => self.name = text.to_string(),
            "path" => self.path = text.to_string(),
            "coverageID" | "coverageId" => self.coverage_id = text.to_string(),
            "west" => self.west = number(),
            "east" => self.east = number(),
            "south" => self.south = number(),
            "north" => self.north = number(),
            "beginTime" => self.begin_time = Some(text.to_string()),
            "endTime" => self.end_time = Some(text.to_string()),
            _ => {}
        }
    }
}

/// All datasets known to the service
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    entries: Vec<CatalogEntry>,
}

impl DatasetCatalog {
    pub fn load(path: &Path) -> WcsResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WcsError::no_applicable("DatasetCatalog", format!("Cannot read catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::parse(&content)?;
        debug!("Catalog {} lists {} datasets", path.display(), catalog.len());
        Ok(catalog)
    }

    /// Parse catalog XML
    pub fn parse(xml: &str) -> WcsResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut current: Option<CatalogEntry> = None;
        let mut field: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| WcsError::no_applicable("DatasetCatalog", format!("Malformed catalog: {}", e)))?;
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "Dataset" {
                        current = Some(CatalogEntry::default());
                    } else if current.is_some() {
                        field = Some(name);
                    }
                }
                Event::Text(e) => {
                    if let (Some(entry), Some(name)) = (current.as_mut(), field.as_deref()) {
                        let text = e.unescape().map_err(|err| {
                            WcsError::no_applicable("DatasetCatalog", format!("Malformed catalog text: {}", err))
                        })?;
                        entry.set_field(name, text.trim());
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"Dataset" {
                        match current.take() {
                            Some(entry) if !entry.name.is_empty() => entries.push(entry),
                            Some(_) => warn!("Skipping catalog dataset without a name"),
                            None => {}
                        }
                    }
                    field = None;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(DatasetCatalog { entries })
    }

    pub fn merge(&mut self, other: DatasetCatalog) {
        self.entries.extend(other.entries);
    }

    /// Entry registered under a coverage name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Read-only table of replacement projections for HDF-EOS grids
//!
//! The table is parsed once from the embedded `projections.toml` and shared by
//! every request in the process.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::crs::{CrsError, CrsResolver, SpatialReference};

lazy_static! {
    static ref PROJECTION_TABLE: ProjectionTable = {
        let content = include_str!("../../projections.toml");
        ProjectionTable::from_str(content).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse projection definitions: {}", e);
            ProjectionTable::default()
        })
    };
}

/// One replacement projection
#[derive(Debug, Clone)]
pub struct ProjectionDefinition {
    pub name: String,
    pub authority: String,
    pub wkt: String,
}

impl ProjectionDefinition {
    pub fn spatial_reference(&self) -> Result<SpatialReference, CrsError> {
        CrsResolver::from_wkt(&self.wkt)
    }
}

/// Projection definitions keyed by GCTP projection code
#[derive(Debug, Default)]
pub struct ProjectionTable {
    definitions: Vec<ProjectionDefinition>,
    by_code: HashMap<u32, usize>,
}

impl ProjectionTable {
    /// The process-wide table
    pub fn global() -> &'static ProjectionTable {
        &PROJECTION_TABLE
    }

    /// Parse a table from TOML text
    pub fn from_str(content: &str) -> Result<Self, String> {
        let toml_value: toml::Value = content
            .parse()
            .map_err(|e| format!("Failed to parse TOML: {}", e))?;

        let mut table = ProjectionTable::default();
        let entries = match toml_value.get("projection").and_then(|v| v.as_array()) {
            Some(entries) => entries,
            None => return Ok(table),
        };

        for entry in entries {
            let name = entry.get("name").and_then(|v| v.as_str());
            let wkt = entry.get("wkt").and_then(|v| v.as_str());
            let (name, wkt) = match (name, wkt) {
                (Some(name), Some(wkt)) => (name, wkt),
                _ => return Err("Projection entry needs 'name' and 'wkt'".to_string()),
            };
            let authority = entry
                .get("authority")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let index = table.definitions.len();
            table.definitions.push(ProjectionDefinition {
                name: name.to_string(),
                authority,
                wkt: wkt.trim().to_string(),
            });

            if let Some(codes) = entry.get("gctp_codes").and_then(|v| v.as_array()) {
                for code in codes.iter().filter_map(|c| c.as_integer()) {
                    if let Ok(code) = u32::try_from(code) {
                        table.by_code.insert(code, index);
                    }
                }
            }
        }

        Ok(table)
    }

    /// Definition registered for a GCTP projection code
    pub fn lookup(&self, gctp_code: u32) -> Option<&ProjectionDefinition> {
        self.by_code.get(&gctp_code).map(|&i| &self.definitions[i])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

use log::info;

use super::fixed_grid::FixedGridAdapter;
use super::grid::GridAdapter;
use super::identifier::{CoverageFamily, CoverageIdentifier};
use super::passthrough::PassthroughAdapter;
use super::swath::SwathAdapter;
use super::FormatAdapter;
use crate::errors::WcsResult;
use crate::raster::{GeolocationMode, RasterIo};

/// Builds the adapter matching a coverage identifier
pub struct CoverageDispatcher<'a> {
    io: &'a dyn RasterIo,
}

impl<'a> CoverageDispatcher<'a> {
    pub fn new(io: &'a dyn RasterIo) -> Self {
        CoverageDispatcher { io }
    }

    /// Classify `identifier`, open the granule and resolve its georeferencing
    ///
    /// # Arguments
    /// * `identifier` - Native coverage identifier
    /// * `mode` - `Full` geolocation for extraction, `Partial` for describing
    ///
    /// # Returns
    /// The initialized adapter, or the first error hit while opening it
    pub fn dispatch(&self, identifier: &str, mode: GeolocationMode) -> WcsResult<FormatAdapter> {
        let id = CoverageIdentifier::parse(identifier)?;
        info!("Opening {:?} coverage {}", id.family, id.library_id);

        let adapter = match id.family {
            CoverageFamily::He4Grid | CoverageFamily::He5Grid => {
                FormatAdapter::Grid(GridAdapter::open(self.io, id, mode)?)
            }
            CoverageFamily::He4Swath | CoverageFamily::He5Swath => {
                FormatAdapter::Swath(SwathAdapter::open(self.io, id, mode)?)
            }
            CoverageFamily::Trmm => FormatAdapter::FixedGrid(FixedGridAdapter::open(self.io, id, mode)?),
            CoverageFamily::Goes | CoverageFamily::Nitf => {
                FormatAdapter::Passthrough(PassthroughAdapter::open(self.io, id, mode)?)
            }
        };
        Ok(adapter)
    }
}

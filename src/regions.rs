//! Region overlays: catalog filtering and DS9 region-file rendering.
//!
//! A [`RegionSet`] holds the sky positions that survive the flux
//! significance cut for one image and writes them out as a DS9 region
//! file: a fixed three-line header followed by one circular-aperture
//! directive per position, in fk5 degrees.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use itertools::izip;

use crate::catalog::{CatalogError, CatalogReader};

/// Flux proxy significance cut: detections at or below it are dropped.
pub const FLUX_THRESHOLD: f64 = 100.0;
/// Aperture radius on the detector [pixel].
pub const APERTURE_RADIUS_PX: f64 = 3.0;
/// Plate scale [arcsec/pixel].
pub const ARCSEC_PER_PX: f64 = 5.0;
/// Rendered aperture radius [arcsec].
pub const APERTURE_RADIUS_ARCSEC: f64 = APERTURE_RADIUS_PX * ARCSEC_PER_PX;

const REGION_HEADER: &str = "# Region file format: DS9 version 4.1\n\
global color=green dashlist=8 3 width=1 font=\"helvetica 10 normal roman\" \
select=1 highlite=1 dash=0 fixed=0 edit=1 move=1 delete=1 include=1 source=1\n\
fk5\n";

#[derive(thiserror::Error, Debug)]
pub enum RegionError {
    #[error("Failed to load the photometry catalog")]
    Catalog(#[from] CatalogError),
    #[error("Catalog column lengths differ: ra {ra}, dec {dec}, flux {flux}")]
    ColumnLengthMismatch { ra: usize, dec: usize, flux: usize },
    #[error("Failed to write the overlay file")]
    Io(#[from] std::io::Error),
}

/// Keeps the (ra, dec) of every detection whose flux proxy exceeds
/// `threshold`, in input order. The three columns describe one detection
/// per index; unequal lengths mean the catalog contract is broken.
pub fn filter_detections(
    ra: &[f64],
    dec: &[f64],
    flux: &[f64],
    threshold: f64,
) -> Result<Vec<(f64, f64)>, RegionError> {
    if ra.len() != dec.len() || ra.len() != flux.len() {
        return Err(RegionError::ColumnLengthMismatch {
            ra: ra.len(),
            dec: dec.len(),
            flux: flux.len(),
        });
    }
    Ok(izip!(ra, dec, flux)
        .filter(|(_, _, &flux)| flux > threshold)
        .map(|(&ra, &dec, _)| (ra, dec))
        .collect())
}

/// The surviving sky positions for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    regions: Vec<(f64, f64)>,
}

impl RegionSet {
    /// Wraps already-filtered (ra, dec) pairs [degree].
    pub fn from_coordinates(regions: Vec<(f64, f64)>) -> Self {
        log::info!("Constructing a set of {} regions", regions.len());
        Self { regions }
    }

    /// Reads the photometry columns from `path` and keeps the detections
    /// that pass [`FLUX_THRESHOLD`]. The cut is applied here, once; the
    /// set never re-evaluates it.
    pub fn from_catalog<R: CatalogReader>(reader: &R, path: &Path) -> Result<Self, RegionError> {
        log::info!("Loading regions from file {:?}", path);
        let table = reader.read_table(path)?;
        let regions = filter_detections(&table.ra, &table.dec, &table.flux, FLUX_THRESHOLD)?;
        Ok(Self::from_coordinates(regions))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn coordinates(&self) -> &[(f64, f64)] {
        &self.regions
    }

    /// Renders the full region file text. Coordinates are written with a
    /// fixed 6-decimal convention so output is deterministic.
    pub fn render(&self) -> String {
        let mut text = String::from(REGION_HEADER);
        for &(ra, dec) in &self.regions {
            text.push_str(&aperture(ra, dec));
            text.push('\n');
        }
        text
    }

    /// Writes the rendered region file to `path`. An empty set produces a
    /// valid header-only file.
    pub fn write_overlay(&self, path: &Path) -> Result<(), RegionError> {
        log::info!("Rendering region file {:?}", path);
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(self.render().as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn aperture(ra: f64, dec: f64) -> String {
    format!(
        "circle({:.6},{:.6},{:.1}\")",
        ra, dec, APERTURE_RADIUS_ARCSEC
    )
}

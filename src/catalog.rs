//! Read access to the per-image photometry catalogs.
//!
//! A catalog is a binary tabular file with at least three named numeric
//! columns: right ascension, declination and the flux proxy used for the
//! significance cut. The [`CatalogReader`] trait is the seam between the
//! region pipeline and the storage format; [`FitsCatalogReader`] is the
//! production implementation.

use std::path::{Path, PathBuf};

mod fits;
pub use fits::FitsCatalogReader;

/// Right ascension column name [degree].
pub const RA_COLUMN: &str = "ra";
/// Declination column name [degree].
pub const DEC_COLUMN: &str = "dec";
/// Flux proxy column used for the significance cut.
pub const FLUX_COLUMN: &str = "core3_flux";

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read the catalog file {path:?}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed FITS header in {path:?}: {reason}")]
    MalformedHeader { path: PathBuf, reason: String },
    #[error("No binary table extension in {path:?}")]
    MissingTable { path: PathBuf },
    #[error("Column {column:?} missing from {path:?}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Column {column:?} in {path:?} has unsupported format {tform:?}")]
    UnsupportedColumn {
        path: PathBuf,
        column: String,
        tform: String,
    },
}

/// The three photometry columns, read in full from one catalog file.
#[derive(Debug, Default, Clone)]
pub struct PhotometryTable {
    /// Right ascension [degree]
    pub ra: Vec<f64>,
    /// Declination [degree]
    pub dec: Vec<f64>,
    /// Flux proxy
    pub flux: Vec<f64>,
}

/// Column-oriented read access to a photometry catalog.
pub trait CatalogReader {
    fn read_table(&self, path: &Path) -> Result<PhotometryTable, CatalogError>;
}

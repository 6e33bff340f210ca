use crate::{catalog::CatalogError, regions::RegionError, viewer::ViewerError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `catalog` module")]
    Catalog(#[from] CatalogError),
    #[error("Error in the `regions` module")]
    Region(#[from] RegionError),
    #[error("Error in the `viewer` module")]
    Viewer(#[from] ViewerError),
    #[error("Invalid image glob pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("Failed to read a directory entry")]
    Glob(#[from] glob::GlobError),
}

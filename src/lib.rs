//! Visual verification of aperture positions from an image-reduction
//! pipeline run.
//!
//! Given a directory of reduced, WCS-solved images (`proc*.fits`) and a
//! directory of per-image photometry catalogs (`*.phot`), this crate
//! drives a running DS9 session interactively: each sampled image is put
//! on screen and the catalog detections that pass the flux significance
//! cut are overlaid as fixed-radius circular apertures in equatorial
//! coordinates, so an operator can confirm the WCS solution by eye.

pub mod catalog;
mod error;
pub mod regions;
pub mod review;
pub mod viewer;

pub use error::Error;

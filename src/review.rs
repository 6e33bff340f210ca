//! The operator-facing review loop.
//!
//! Pairs every reduced image with its derived photometry catalog, then
//! walks the pairs in lexical image-name order, putting every stride-th
//! one on screen with its filtered region overlay and pausing between
//! frames so the operator can inspect each WCS solution.

use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crate::{
    catalog::CatalogReader,
    regions::RegionError,
    viewer::{ViewerControl, ViewerError, ViewerSession},
    Error,
};

/// Glob pattern selecting the reduced, solved images.
pub const IMAGE_PATTERN: &str = "proc*.fits";
/// Suffix appended to an image file name to derive its catalog name.
pub const CATALOG_SUFFIX: &str = ".phot";
/// Every `DISPLAY_STRIDE`-th image is put on screen; sampling keeps a
/// review session tractable over large batches.
pub const DISPLAY_STRIDE: usize = 100;
/// Operator pacing pause between displayed cycles.
pub const CYCLE_PAUSE: Duration = Duration::from_secs(2);
/// Zoom level applied to every displayed image.
pub const REVIEW_ZOOM: u32 = 2;

/// One unit of review work: an indexed image paired with its catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCycle {
    pub index: usize,
    pub image: PathBuf,
    pub catalog: PathBuf,
}

/// Builder-configured driver of the review session.
pub struct ReviewLoop {
    images_dir: PathBuf,
    catalogs_dir: PathBuf,
    stride: usize,
    pause: Duration,
    hide_ui: bool,
}

impl ReviewLoop {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(images_dir: P, catalogs_dir: Q) -> Self {
        Self {
            images_dir: images_dir.as_ref().to_path_buf(),
            catalogs_dir: catalogs_dir.as_ref().to_path_buf(),
            stride: DISPLAY_STRIDE,
            pause: CYCLE_PAUSE,
            hide_ui: false,
        }
    }

    pub fn stride(self, stride: usize) -> Self {
        Self { stride, ..self }
    }

    pub fn pause(self, pause: Duration) -> Self {
        Self { pause, ..self }
    }

    pub fn hide_ui(self, hide_ui: bool) -> Self {
        Self { hide_ui, ..self }
    }

    /// Pairs every image with its derived catalog path, in lexical
    /// image-name order (directory enumeration order is not portable, so
    /// the order is pinned here). The catalog file is not required to
    /// exist yet; a missing one surfaces when its cycle is displayed.
    pub fn cycles(&self) -> Result<Vec<DisplayCycle>, Error> {
        let pattern = self.images_dir.join(IMAGE_PATTERN);
        let mut images = glob::glob(&pattern.to_string_lossy())?
            .collect::<Result<Vec<PathBuf>, glob::GlobError>>()?;
        images.sort();
        Ok(images
            .into_iter()
            .enumerate()
            .map(|(index, image)| {
                let catalog = self.catalog_path(&image);
                DisplayCycle {
                    index,
                    image,
                    catalog,
                }
            })
            .collect())
    }

    fn catalog_path(&self, image: &Path) -> PathBuf {
        let mut name = image
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(CATALOG_SUFFIX);
        self.catalogs_dir.join(name)
    }

    /// Runs the review session over every stride-th cycle: open the
    /// image, optionally hide the chrome, set the review zoom, overlay
    /// the regions, pause. A catalog failure is reported and its cycle
    /// skipped; viewer failures abort the run. The viewer is left
    /// running when the enumeration is exhausted.
    pub fn run<C, R>(&self, session: &mut ViewerSession<C>, reader: &R) -> Result<(), Error>
    where
        C: ViewerControl,
        R: CatalogReader,
    {
        for cycle in self.cycles()? {
            if cycle.index % self.stride != 0 {
                continue;
            }
            log::info!("Showing file {}: {:?}", cycle.index, cycle.image);
            session.open_file(&cycle.image)?;
            if self.hide_ui {
                session.hide_ui()?;
            }
            session.zoom_level(REVIEW_ZOOM)?;
            match session.load_regions(reader, &cycle.catalog) {
                Ok(_) => (),
                Err(ViewerError::Region(RegionError::Catalog(error))) => {
                    log::warn!("Skipping overlay for cycle {}: {}", cycle.index, error);
                }
                Err(error) => return Err(error.into()),
            }
            if !self.pause.is_zero() {
                log::info!("Pausing for {:?}", self.pause);
                thread::sleep(self.pause);
            }
        }
        Ok(())
    }
}

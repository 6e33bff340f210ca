//! Control of the external image viewer.
//!
//! The viewer is an already-running DS9 process driven through a textual
//! directive protocol. [`ViewerControl`] names the discrete directives the
//! review loop needs; [`XpaViewer`] is the production adapter and a
//! recording double stands in for it under test. [`ViewerSession`] owns
//! one control channel for the whole run and keeps the pan, zoom and
//! chrome state consistent with what has actually been issued.

use std::{fmt, path::Path};

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::{
    catalog::CatalogReader,
    regions::{RegionError, RegionSet},
};

mod xpa;
pub use xpa::{XpaViewer, DEFAULT_TARGET};

#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    #[error("No viewer answering at XPA target {target:?}")]
    Unavailable { target: String },
    #[error("Viewer rejected the directive {directive:?}")]
    Directive { directive: String },
    #[error("Failed to reach the viewer control channel")]
    Io(#[from] std::io::Error),
    #[error("Failed to prepare the region overlay")]
    Region(#[from] RegionError),
}

/// Viewer UI elements hidden during full-frame review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ChromeElement {
    Buttons,
    Panner,
    Magnifier,
    Filename,
    Object,
    Info,
}

impl fmt::Display for ChromeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromeElement::Buttons => write!(f, "buttons"),
            ChromeElement::Panner => write!(f, "panner"),
            ChromeElement::Magnifier => write!(f, "magnifier"),
            ChromeElement::Filename => write!(f, "filename"),
            ChromeElement::Object => write!(f, "object"),
            ChromeElement::Info => write!(f, "info"),
        }
    }
}

/// The discrete directives understood by the external viewer. Each call
/// is one synchronous round-trip on the control channel.
pub trait ViewerControl {
    /// Declares the equatorial fk5 degree convention used by overlays.
    fn set_coordinate_system(&mut self) -> Result<(), ViewerError>;
    fn load_image(&mut self, path: &Path) -> Result<(), ViewerError>;
    fn set_pan(&mut self, x: f64, y: f64) -> Result<(), ViewerError>;
    fn set_zscale(&mut self) -> Result<(), ViewerError>;
    fn set_zoom(&mut self, level: u32) -> Result<(), ViewerError>;
    fn zoom_to_fit(&mut self) -> Result<(), ViewerError>;
    fn hide_element(&mut self, element: ChromeElement) -> Result<(), ViewerError>;
    /// Lets the viewer settle after a burst of fire-and-forget directives.
    fn settle(&mut self) -> Result<(), ViewerError>;
    fn load_overlay(&mut self, path: &Path) -> Result<(), ViewerError>;
}

/// A stateful wrapper over one live viewer control channel.
///
/// Constructed once per run; the external viewer outlives it.
#[derive(Debug)]
pub struct ViewerSession<C: ViewerControl> {
    control: C,
    x: f64,
    y: f64,
    zoom: u32,
    chrome_hidden: bool,
}

impl<C: ViewerControl> ViewerSession<C> {
    /// Pan target applied when the caller does not supply one.
    pub const DEFAULT_PAN: (f64, f64) = (1024., 1024.);

    /// Opens the session and declares the sky display convention, once.
    /// Fails if the viewer does not answer; there is no retry.
    pub fn open(
        mut control: C,
        x: Option<f64>,
        y: Option<f64>,
        zoom: u32,
    ) -> Result<Self, ViewerError> {
        log::info!("Opening viewer session");
        control.set_coordinate_system()?;
        let (default_x, default_y) = Self::DEFAULT_PAN;
        Ok(Self {
            control,
            x: x.unwrap_or(default_x),
            y: y.unwrap_or(default_y),
            zoom,
            chrome_hidden: false,
        })
    }

    pub fn pan(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn chrome_hidden(&self) -> bool {
        self.chrome_hidden
    }

    /// Hides every chrome element, then lets the viewer settle. The
    /// directives are fire-and-forget; element order is not significant.
    pub fn hide_ui(&mut self) -> Result<&mut Self, ViewerError> {
        log::info!("Hiding viewer chrome, this may take a while");
        for element in ChromeElement::iter() {
            self.control.hide_element(element)?;
        }
        self.control.settle()?;
        self.chrome_hidden = true;
        Ok(self)
    }

    /// Loads an image, then reasserts pan, intensity scaling and the
    /// current zoom: the viewer resets all three on every load.
    pub fn open_file(&mut self, path: &Path) -> Result<&mut Self, ViewerError> {
        log::info!("Opening file {:?}", path);
        self.control.load_image(path)?;
        let (x, y) = self.pan();
        self.pan_to(x, y)?;
        self.set_zscale()?;
        let zoom = self.zoom;
        self.zoom_level(zoom)?;
        Ok(self)
    }

    pub fn pan_to(&mut self, x: f64, y: f64) -> Result<&mut Self, ViewerError> {
        self.control.set_pan(x, y)?;
        self.x = x;
        self.y = y;
        Ok(self)
    }

    pub fn set_zscale(&mut self) -> Result<&mut Self, ViewerError> {
        self.control.set_zscale()?;
        Ok(self)
    }

    pub fn zoom_to_fit(&mut self) -> Result<&mut Self, ViewerError> {
        self.control.zoom_to_fit()?;
        Ok(self)
    }

    pub fn zoom_level(&mut self, level: u32) -> Result<&mut Self, ViewerError> {
        self.control.set_zoom(level)?;
        self.zoom = level;
        Ok(self)
    }

    /// Builds the filtered region overlay for `catalog` and hands it to
    /// the viewer through a scoped temporary file. The file is removed on
    /// every exit path, directive failure included.
    pub fn load_regions<R: CatalogReader>(
        &mut self,
        reader: &R,
        catalog: &Path,
    ) -> Result<&mut Self, ViewerError> {
        log::info!("Loading regions from {:?}", catalog);
        let regions = RegionSet::from_catalog(reader, catalog)?;
        let overlay = tempfile::Builder::new()
            .prefix("regions.")
            .suffix(".reg")
            .tempfile()?;
        regions.write_overlay(overlay.path())?;
        self.control.load_overlay(overlay.path())?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, PhotometryTable};
    use std::{cell::RefCell, path::PathBuf, rc::Rc};

    #[derive(Debug, Default)]
    struct Recording {
        directives: Vec<String>,
        fail_overlay: bool,
    }

    #[derive(Clone, Debug, Default)]
    struct RecordingControl(Rc<RefCell<Recording>>);

    impl RecordingControl {
        fn directives(&self) -> Vec<String> {
            self.0.borrow().directives.clone()
        }

        fn record(&mut self, directive: String) -> Result<(), ViewerError> {
            self.0.borrow_mut().directives.push(directive);
            Ok(())
        }
    }

    impl ViewerControl for RecordingControl {
        fn set_coordinate_system(&mut self) -> Result<(), ViewerError> {
            self.record("coordsys".into())
        }
        fn load_image(&mut self, path: &Path) -> Result<(), ViewerError> {
            self.record(format!("file {}", path.display()))
        }
        fn set_pan(&mut self, x: f64, y: f64) -> Result<(), ViewerError> {
            self.record(format!("pan {} {}", x, y))
        }
        fn set_zscale(&mut self) -> Result<(), ViewerError> {
            self.record("zscale".into())
        }
        fn set_zoom(&mut self, level: u32) -> Result<(), ViewerError> {
            self.record(format!("zoom {}", level))
        }
        fn zoom_to_fit(&mut self) -> Result<(), ViewerError> {
            self.record("zoom to fit".into())
        }
        fn hide_element(&mut self, element: ChromeElement) -> Result<(), ViewerError> {
            self.record(format!("hide {}", element))
        }
        fn settle(&mut self) -> Result<(), ViewerError> {
            self.record("settle".into())
        }
        fn load_overlay(&mut self, path: &Path) -> Result<(), ViewerError> {
            self.record(format!("regions {}", path.display()))?;
            if self.0.borrow().fail_overlay {
                return Err(ViewerError::Directive {
                    directive: "regions".into(),
                });
            }
            Ok(())
        }
    }

    struct FixedCatalog(PhotometryTable);

    impl CatalogReader for FixedCatalog {
        fn read_table(&self, _path: &Path) -> Result<PhotometryTable, CatalogError> {
            Ok(self.0.clone())
        }
    }

    fn catalog() -> FixedCatalog {
        FixedCatalog(PhotometryTable {
            ra: vec![10., 11.],
            dec: vec![20., 21.],
            flux: vec![150., 50.],
        })
    }

    fn overlay_path(directives: &[String]) -> PathBuf {
        let line = directives
            .iter()
            .find(|d| d.starts_with("regions "))
            .expect("no overlay directive issued");
        PathBuf::from(line.trim_start_matches("regions "))
    }

    #[test]
    fn open_declares_coordinate_system_once() {
        let control = RecordingControl::default();
        let session = ViewerSession::open(control.clone(), None, None, 2).unwrap();
        assert_eq!(control.directives(), vec!["coordsys"]);
        assert_eq!(session.pan(), ViewerSession::<RecordingControl>::DEFAULT_PAN);
        assert_eq!(session.zoom(), 2);
    }

    #[test]
    fn open_file_reasserts_pan_zscale_zoom() {
        let control = RecordingControl::default();
        let mut session =
            ViewerSession::open(control.clone(), Some(512.), Some(256.), 4).unwrap();
        session.open_file(Path::new("proc0001.fits")).unwrap();
        assert_eq!(
            control.directives(),
            vec![
                "coordsys",
                "file proc0001.fits",
                "pan 512 256",
                "zscale",
                "zoom 4"
            ]
        );
    }

    #[test]
    fn hide_ui_covers_every_element_then_settles() {
        let control = RecordingControl::default();
        let mut session = ViewerSession::open(control.clone(), None, None, 1).unwrap();
        session.hide_ui().unwrap();
        let directives = control.directives();
        for element in ["buttons", "panner", "magnifier", "filename", "object", "info"] {
            assert!(directives.contains(&format!("hide {}", element)));
        }
        assert_eq!(directives.last().map(String::as_str), Some("settle"));
        assert!(session.chrome_hidden());
    }

    #[test]
    fn load_regions_issues_overlay_and_removes_temp_file() {
        let control = RecordingControl::default();
        let mut session = ViewerSession::open(control.clone(), None, None, 1).unwrap();
        session
            .load_regions(&catalog(), Path::new("proc0001.fits.phot"))
            .unwrap();
        let overlay = overlay_path(&control.directives());
        assert!(!overlay.exists());
    }

    #[test]
    fn load_regions_removes_temp_file_on_directive_failure() {
        let control = RecordingControl::default();
        control.0.borrow_mut().fail_overlay = true;
        let mut session = ViewerSession::open(control.clone(), None, None, 1).unwrap();
        let error = session
            .load_regions(&catalog(), Path::new("proc0001.fits.phot"))
            .unwrap_err();
        assert!(matches!(error, ViewerError::Directive { .. }));
        let overlay = overlay_path(&control.directives());
        assert!(!overlay.exists());
    }
}

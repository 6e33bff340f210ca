//! XPA adapter for a running DS9 session.

use std::{path::Path, process::Command};

use super::{ChromeElement, ViewerControl, ViewerError};

/// XPA access point of a stock DS9 session.
pub const DEFAULT_TARGET: &str = "ds9";

/// Drives a running DS9 instance over its XPA messaging channel, one
/// `xpaset` round-trip per directive.
pub struct XpaViewer {
    target: String,
}

impl XpaViewer {
    /// Connects to the viewer at `target`, failing if no XPA access point
    /// answers there.
    pub fn connect<S: Into<String>>(target: S) -> Result<Self, ViewerError> {
        let target = target.into();
        log::info!("Probing for a viewer at XPA target {}", target);
        let probe = Command::new("xpaaccess").arg(&target).output()?;
        if !probe.status.success() || !String::from_utf8_lossy(&probe.stdout).starts_with("yes") {
            return Err(ViewerError::Unavailable { target });
        }
        log::info!("Viewer session at {} is up", target);
        Ok(Self { target })
    }

    fn set(&mut self, directive: &str) -> Result<(), ViewerError> {
        log::debug!("xpaset {}: {}", self.target, directive);
        let status = Command::new("xpaset")
            .arg("-p")
            .arg(&self.target)
            .args(directive.split_whitespace())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(ViewerError::Directive {
                directive: directive.to_owned(),
            })
        }
    }
}

impl ViewerControl for XpaViewer {
    fn set_coordinate_system(&mut self) -> Result<(), ViewerError> {
        self.set("regions system wcs sky fk5 skyformat degrees")
    }

    fn load_image(&mut self, path: &Path) -> Result<(), ViewerError> {
        self.set(&format!("file {}", path.display()))
    }

    fn set_pan(&mut self, x: f64, y: f64) -> Result<(), ViewerError> {
        self.set(&format!("pan to {} {} physical", x, y))
    }

    fn set_zscale(&mut self) -> Result<(), ViewerError> {
        self.set("zscale")
    }

    fn set_zoom(&mut self, level: u32) -> Result<(), ViewerError> {
        self.set(&format!("zoom {}", level))
    }

    fn zoom_to_fit(&mut self) -> Result<(), ViewerError> {
        self.set("zoom to fit")
    }

    fn hide_element(&mut self, element: ChromeElement) -> Result<(), ViewerError> {
        self.set(&format!("view {} no", element))
    }

    fn settle(&mut self) -> Result<(), ViewerError> {
        self.set("sleep")
    }

    fn load_overlay(&mut self, path: &Path) -> Result<(), ViewerError> {
        self.set(&format!("regions {}", path.display()))
    }
}

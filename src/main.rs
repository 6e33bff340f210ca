use anyhow::Context;
use structopt::StructOpt;
use verify_apertures::{
    catalog::FitsCatalogReader,
    review::ReviewLoop,
    viewer::{ViewerSession, XpaViewer, DEFAULT_TARGET},
};

/// Verify aperture positions from a pipeline run
///
/// Given a directory of reduced solved images (proc*.fits) and a directory
/// of photometry files (*.phot), drive DS9 interactively and plot the
/// regions over the images. Regions are plotted in equatorial coordinates
/// to test the WCS solution.
#[derive(Debug, StructOpt)]
#[structopt(name = "verify-apertures")]
struct Opt {
    /// Directory holding the reduced proc*.fits images
    images_dir: String,
    /// Directory holding the per-image .phot catalogs
    #[structopt(short = "p", long)]
    photfiles_dir: String,
    /// Zoom level
    #[structopt(short, long, default_value = "2")]
    zoom: u32,
    /// X coordinate to pan to
    #[structopt(short = "x", long)]
    xcoord: Option<f64>,
    /// Y coordinate to pan to
    #[structopt(short = "y", long)]
    ycoord: Option<f64>,
    /// Hide the viewer chrome before each display
    #[structopt(long)]
    hide_ui: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let control = XpaViewer::connect(DEFAULT_TARGET)
        .context("no running DS9 session to drive")?;
    let mut session = ViewerSession::open(control, opt.xcoord, opt.ycoord, opt.zoom)?;

    ReviewLoop::new(&opt.images_dir, &opt.photfiles_dir)
        .hide_ui(opt.hide_ui)
        .run(&mut session, &FitsCatalogReader)?;

    Ok(())
}

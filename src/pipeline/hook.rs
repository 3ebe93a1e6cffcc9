use anyhow::Result;
use rayon::prelude::*;

use crate::camera::{self, CameraProfile};
use crate::raster::Raster;

/// A hook invoked between rendering and decoding in a [`roundtrip`](super::roundtrip).
///
/// Implement this trait to put something between the printer and the
/// scanner: a camera simulation, a real print-and-scan step, or a file dump
/// for manual inspection.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use bitpaper::{PipelineHook, Raster};
///
/// struct PrintAndScan;
///
/// impl PipelineHook for PrintAndScan {
///     fn after_encode(&self, pages: Vec<Raster>) -> Result<Vec<Raster>> {
///         // print pages, photograph them, load the photos ...
///         Ok(pages) // placeholder
///     }
/// }
/// ```
pub trait PipelineHook {
    /// Called with the rendered pages in order. Return the pages the decoder
    /// should read; order does not matter.
    fn after_encode(&self, pages: Vec<Raster>) -> Result<Vec<Raster>>;
}

/// A no-op hook that passes the rendered pages through unchanged.
pub struct NoopHook;

impl PipelineHook for NoopHook {
    fn after_encode(&self, pages: Vec<Raster>) -> Result<Vec<Raster>> {
        Ok(pages)
    }
}

/// Photographs every page with a simulated camera. Page `i` uses the
/// profile's seed plus `i`, so pages do not share noise.
pub struct CameraHook {
    pub profile: CameraProfile,
}

impl CameraHook {
    pub fn new(profile: CameraProfile) -> Self {
        Self { profile }
    }
}

impl PipelineHook for CameraHook {
    fn after_encode(&self, pages: Vec<Raster>) -> Result<Vec<Raster>> {
        Ok(pages
            .par_iter()
            .enumerate()
            .map(|(i, page)| {
                let profile = self.profile.with_seed(self.profile.seed().wrapping_add(i as u64));
                camera::apply(page, &profile)
            })
            .collect())
    }
}

//! Reading cells back out of a captured page.
//!
//! Decoding a raster happens in two steps:
//!
//! 1. [`locate`] finds the four solid corner markers and solves a perspective
//!    transform from grid coordinates (in cells) to raster pixels.
//! 2. [`sample`] projects every cell centre through that transform, averages
//!    a small neighbourhood around it and decides black or white against a
//!    locally adaptive threshold, so uneven lighting and blur only shift the
//!    decision point instead of flipping whole regions.
//!
//! Nothing here knows about codewords or frames; the output is the raw data
//! bit sequence plus an estimate of how trustworthy it is.

pub mod homography;
pub mod markers;
pub mod threshold;

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{self, BitpaperConfig};
use crate::grid::{self, BitSequence};
use crate::raster::{Point, Raster};

pub use homography::Homography;
pub use markers::Corner;

#[derive(Error, Debug, PartialEq)]
pub enum AlignmentError {
    #[error("found {found} of 4 alignment markers, missing {missing:?}")]
    MarkersNotFound { found: usize, missing: Vec<Corner> },
    #[error("alignment markers are degenerate, cannot solve page perspective")]
    Degenerate,
}

/// Mapping from grid coordinates to raster pixels for one captured page.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTransform {
    homography: Homography,
    cell_pitch: f64,
    markers: [Point; config::MARKER_COUNT],
}

impl GridTransform {
    /// Solve the transform from the raster positions of the four marker
    /// centres (top-left, top-right, bottom-left, bottom-right).
    pub fn from_markers(
        rows: usize,
        cols: usize,
        markers: [Point; config::MARKER_COUNT],
    ) -> Result<Self, AlignmentError> {
        if grid::data_capacity(rows, cols) == 0 {
            return Err(AlignmentError::Degenerate);
        }

        let centers = grid::marker_centers(rows, cols).map(|(x, y)| Point::new(x, y));
        let homography = Homography::from_points(&centers, &markers).ok_or(AlignmentError::Degenerate)?;

        let span_x = (cols - config::MARKER_CELLS) as f64;
        let span_y = (rows - config::MARKER_CELLS) as f64;
        let [tl, tr, bl, br] = markers;
        let cell_pitch = (tl.distance(&tr) / span_x
            + bl.distance(&br) / span_x
            + tl.distance(&bl) / span_y
            + tr.distance(&br) / span_y)
            / 4.0;
        if !cell_pitch.is_finite() || cell_pitch <= 0.0 {
            return Err(AlignmentError::Degenerate);
        }

        Ok(Self {
            homography,
            cell_pitch,
            markers,
        })
    }

    /// Raster position of a point given in grid units.
    pub fn to_raster(&self, gx: f64, gy: f64) -> Point {
        self.homography.apply(Point::new(gx, gy))
    }

    /// Raster position of the centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> Point {
        self.to_raster(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Mean cell edge length in pixels.
    pub fn cell_pitch(&self) -> f64 {
        self.cell_pitch
    }

    pub fn markers(&self) -> &[Point; config::MARKER_COUNT] {
        &self.markers
    }
}

/// How confident the sampler was about the bits it produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEstimate {
    pub sampled_cells: usize,
    /// Cells whose value sat close to the decision threshold.
    pub low_confidence_cells: usize,
    pub mean_confidence: f64,
}

impl ErrorEstimate {
    pub fn low_confidence_ratio(&self) -> f64 {
        if self.sampled_cells == 0 {
            return 0.0;
        }
        self.low_confidence_cells as f64 / self.sampled_cells as f64
    }
}

/// Find the corner markers and solve the grid-to-raster transform.
pub fn locate(raster: &Raster, rows: usize, cols: usize, cell_size: u32) -> Result<GridTransform, AlignmentError> {
    if grid::data_capacity(rows, cols) == 0 || cell_size == 0 {
        return Err(AlignmentError::Degenerate);
    }

    let otsu = threshold::otsu(raster.pixels());

    // Markers are searched at the scale the page was captured at
    let nominal_width = cols as f64 * cell_size as f64 + 2.0 * config::PAGE_MARGIN as f64;
    let scale = raster.width() as f64 / nominal_width;
    let expected_side = config::MARKER_CELLS as f64 * cell_size as f64 * scale;

    let found: Vec<Option<Point>> = Corner::ALL
        .par_iter()
        .map(|&corner| markers::find_marker(raster, otsu.threshold, corner, expected_side).map(|b| b.centroid()))
        .collect();

    let missing: Vec<Corner> = Corner::ALL
        .iter()
        .zip(&found)
        .filter(|(_, p)| p.is_none())
        .map(|(&c, _)| c)
        .collect();
    if !missing.is_empty() {
        return Err(AlignmentError::MarkersNotFound {
            found: config::MARKER_COUNT - missing.len(),
            missing,
        });
    }

    let points: Vec<Point> = found.into_iter().flatten().collect();
    let markers = [points[0], points[1], points[2], points[3]];
    let transform = GridTransform::from_markers(rows, cols, markers)?;

    debug!(
        "markers at ({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1}), pitch {:.3} px, threshold {}",
        markers[0].x,
        markers[0].y,
        markers[1].x,
        markers[1].y,
        markers[2].x,
        markers[2].y,
        markers[3].x,
        markers[3].y,
        transform.cell_pitch(),
        otsu.threshold
    );

    Ok(transform)
}

/// Mean intensity of the `(2r + 1)^2` pixel square around `center`.
fn cell_mean(raster: &Raster, center: Point, radius: i64) -> f64 {
    let cx = center.x.floor() as i64;
    let cy = center.y.floor() as i64;
    let mut sum = 0u64;
    for y in cy - radius..=cy + radius {
        for x in cx - radius..=cx + radius {
            sum += raster.get_or_white(x, y) as u64;
        }
    }
    let side = (2 * radius + 1) as f64;
    sum as f64 / (side * side)
}

/// Sample every data cell and classify it as black or white.
///
/// Bits are returned in the same order [`grid::GridEncoder`] placed them.
pub fn sample(raster: &Raster, transform: &GridTransform, rows: usize, cols: usize) -> (BitSequence, ErrorEstimate) {
    let otsu = threshold::otsu(raster.pixels());
    let global_threshold = otsu.midpoint();
    let global_contrast = otsu.contrast();
    let radius = (transform.cell_pitch() / 4.0).floor().max(0.0) as i64;

    let means: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            (0..cols)
                .map(|c| cell_mean(raster, transform.cell_center(r, c), radius))
                .collect()
        })
        .collect();

    let window = config::THRESHOLD_WINDOW_CELLS;
    let classified: Vec<Vec<(bool, f64)>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let r0 = r.saturating_sub(window);
            let r1 = (r + window).min(rows - 1);
            (0..cols)
                .filter(|&c| !grid::is_reserved(r, c, rows, cols))
                .map(|c| {
                    let c0 = c.saturating_sub(window);
                    let c1 = (c + window).min(cols - 1);
                    let (mut lo, mut hi) = (f64::MAX, f64::MIN);
                    for row in &means[r0..=r1] {
                        for &v in &row[c0..=c1] {
                            lo = lo.min(v);
                            hi = hi.max(v);
                        }
                    }

                    let range = hi - lo;
                    let (threshold, half_range) = if range > 0.0 && range >= 0.5 * global_contrast {
                        ((lo + hi) / 2.0, range / 2.0)
                    } else {
                        (global_threshold, (global_contrast / 2.0).max(1.0))
                    };

                    let value = means[r][c];
                    let confidence = ((value - threshold).abs() / half_range).min(1.0);
                    (value < threshold, confidence)
                })
                .collect()
        })
        .collect();

    let mut bits = Vec::with_capacity(grid::data_capacity(rows, cols));
    let mut estimate = ErrorEstimate::default();
    let mut confidence_sum = 0.0;
    for (bit, confidence) in classified.into_iter().flatten() {
        bits.push(bit);
        estimate.sampled_cells += 1;
        confidence_sum += confidence;
        if confidence < config::LOW_CONFIDENCE {
            estimate.low_confidence_cells += 1;
        }
    }
    if estimate.sampled_cells > 0 {
        estimate.mean_confidence = confidence_sum / estimate.sampled_cells as f64;
    }

    (bits, estimate)
}

/// Grid geometry for one configuration, bundled with the locate/sample steps.
#[derive(Debug, Clone)]
pub struct GridDecoder {
    cell_size: u32,
    rows: usize,
    cols: usize,
}

impl GridDecoder {
    pub fn new(cfg: &BitpaperConfig) -> Self {
        let layout = cfg.page_layout();
        Self {
            cell_size: cfg.cell_size,
            rows: layout.rows,
            cols: layout.cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn locate(&self, raster: &Raster) -> Result<GridTransform, AlignmentError> {
        locate(raster, self.rows, self.cols, self.cell_size)
    }

    pub fn sample(&self, raster: &Raster, transform: &GridTransform) -> (BitSequence, ErrorEstimate) {
        sample(raster, transform, self.rows, self.cols)
    }

    /// Locate then sample.
    pub fn decode(&self, raster: &Raster) -> Result<(BitSequence, ErrorEstimate), AlignmentError> {
        let transform = self.locate(raster)?;
        Ok(self.sample(raster, &transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::render::render;
    use crate::grid::{data_capacity, GridEncoder};
    use crate::raster::{BLACK, WHITE};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn small_config() -> BitpaperConfig {
        BitpaperConfig {
            page_width: 400,
            page_height: 400,
            ..Default::default()
        }
    }

    fn random_bits(n: usize, seed: u64) -> Vec<bool> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen::<bool>()).collect()
    }

    fn rendered_page(cfg: &BitpaperConfig, bits: &[bool]) -> Raster {
        let layout = cfg.page_layout();
        let grid = GridEncoder::new(cfg).encode(bits, layout.rows, layout.cols).unwrap();
        render(&grid, cfg.page_width, cfg.page_height)
    }

    #[test]
    fn test_locate_clean_page() {
        let cfg = small_config();
        let decoder = GridDecoder::new(&cfg);
        assert_eq!((decoder.rows(), decoder.cols()), (50, 50));

        let bits = random_bits(data_capacity(50, 50), 1);
        let raster = rendered_page(&cfg, &bits);
        let transform = decoder.locate(&raster).unwrap();

        // Marker centre is 2 cells into the grid, which starts at the margin
        let m = config::PAGE_MARGIN as f64;
        assert!(transform.markers()[0].distance(&Point::new(m + 12.0, m + 12.0)) < 1e-9);
        assert!(transform.markers()[3].distance(&Point::new(m + 288.0, m + 288.0)) < 1e-9);
        assert!((transform.cell_pitch() - 6.0).abs() < 1e-9);
        assert!(transform.cell_center(0, 0).distance(&Point::new(m + 3.0, m + 3.0)) < 1e-6);
    }

    #[test]
    fn test_sample_clean_page() {
        let cfg = small_config();
        let bits = random_bits(data_capacity(50, 50), 2);
        let raster = rendered_page(&cfg, &bits);

        let (decoded, estimate) = GridDecoder::new(&cfg).decode(&raster).unwrap();
        assert_eq!(decoded, bits);
        assert_eq!(estimate.sampled_cells, bits.len());
        assert_eq!(estimate.low_confidence_cells, 0);
        assert_eq!(estimate.low_confidence_ratio(), 0.0);
        assert!(estimate.mean_confidence > 0.99);
    }

    #[test]
    fn test_sample_partially_filled_page() {
        // Long white runs fall back to the global threshold
        let cfg = small_config();
        let mut bits = random_bits(300, 3);
        bits.resize(data_capacity(50, 50), false);
        let raster = rendered_page(&cfg, &bits);

        let (decoded, estimate) = GridDecoder::new(&cfg).decode(&raster).unwrap();
        assert_eq!(decoded, bits);
        assert_eq!(estimate.low_confidence_cells, 0);
    }

    #[test]
    fn test_sample_shifted_and_dimmed_page() {
        let cfg = small_config();
        let bits = random_bits(data_capacity(50, 50), 4);
        let page = rendered_page(&cfg, &bits);

        // Paste the page 7 px right and 5 px down onto a larger sheet, and wash it out
        let mut raster = Raster::new(420, 420, 230);
        for y in 0..400 {
            for x in 0..400 {
                let v = if page.get(x, y) == BLACK { 60 } else { 230 };
                raster.set(x + 7, y + 5, v);
            }
        }

        let decoder = GridDecoder::new(&cfg);
        let transform = decoder.locate(&raster).unwrap();
        let m = config::PAGE_MARGIN as f64;
        assert!(transform.markers()[0].distance(&Point::new(m + 19.0, m + 17.0)) < 1e-9);

        let (decoded, _) = decoder.sample(&raster, &transform);
        assert_eq!(decoded, bits);
    }

    #[test]
    fn test_smudge_lowers_confidence() {
        let cfg = small_config();
        let bits = random_bits(data_capacity(50, 50), 5);
        let mut raster = rendered_page(&cfg, &bits);
        for y in 150..250 {
            for x in 150..250 {
                raster.set(x, y, 128);
            }
        }

        let (_, estimate) = GridDecoder::new(&cfg).decode(&raster).unwrap();
        assert!(estimate.low_confidence_cells > 0);
        assert!(estimate.low_confidence_ratio() < 0.5);
    }

    #[test]
    fn test_blank_page_has_no_markers() {
        let raster = Raster::new(400, 400, WHITE);
        let err = GridDecoder::new(&small_config()).locate(&raster).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::MarkersNotFound {
                found: 0,
                missing: Corner::ALL.to_vec()
            }
        );
    }

    #[test]
    fn test_missing_corner_reported() {
        let cfg = small_config();
        let bits = vec![false; data_capacity(50, 50)];
        let mut raster = rendered_page(&cfg, &bits);
        // Cover the top-right marker with white paper
        for y in 40..80 {
            for x in 320..352 {
                raster.set(x, y, WHITE);
            }
        }

        match GridDecoder::new(&cfg).locate(&raster) {
            Err(AlignmentError::MarkersNotFound { found, missing }) => {
                assert_eq!(found, 3);
                assert_eq!(missing, vec![Corner::TopRight]);
            }
            other => panic!("expected MarkersNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_markers() {
        let p = Point::new(10.0, 10.0);
        assert_eq!(
            GridTransform::from_markers(50, 50, [p; 4]),
            Err(AlignmentError::Degenerate)
        );
        assert_eq!(
            GridTransform::from_markers(4, 4, [p; 4]),
            Err(AlignmentError::Degenerate)
        );
    }
}

//! Bit-to-cell placement.
//!
//! A grid is a row-major matrix of square cells, black for `1` and white for
//! `0`. Each corner holds a reserved 5x5 footprint: a solid 4x4 alignment
//! marker flush with the grid corner and a one-cell white separator towards
//! the interior, so the marker never touches a data cell. Data bits fill every
//! other cell left-to-right, top-to-bottom.

pub mod render;

use thiserror::Error;

use crate::config::{self, BitpaperConfig};

/// A sequence of bits, one per data cell; `true` is a black cell.
pub type BitSequence = Vec<bool>;

#[derive(Error, Debug, PartialEq)]
pub enum CapacityError {
    #[error("{bits} bits do not fit in a {rows}x{cols} grid with {capacity} data cells")]
    GridFull {
        bits: usize,
        capacity: usize,
        rows: usize,
        cols: usize,
    },
    #[error("payload needs {needed} pages but at most {max} are allowed")]
    TooManyPages { needed: usize, max: usize },
}

/// Cell matrix of one page, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub cell_size: u32,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<bool>,
}

impl Grid {
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.cols + col]
    }

    /// Read the data cells back in placement order.
    pub fn data_bits(&self) -> BitSequence {
        data_cells(self.rows, self.cols)
            .map(|(r, c)| self.get(r, c))
            .collect()
    }
}

/// Compute the grid dimensions `(rows, cols)` that fit a page.
///
/// The page loses [`config::PAGE_MARGIN`] pixels on every side; the rest is
/// divided into whole cells.
pub fn capacity(cell_size: u32, page_w: u32, page_h: u32) -> (usize, usize) {
    if cell_size == 0 {
        return (0, 0);
    }
    let usable_w = page_w.saturating_sub(2 * config::PAGE_MARGIN);
    let usable_h = page_h.saturating_sub(2 * config::PAGE_MARGIN);
    ((usable_h / cell_size) as usize, (usable_w / cell_size) as usize)
}

/// Number of cells left for data once the corner footprints are reserved.
/// Zero when the grid is too small for four non-overlapping footprints.
pub fn data_capacity(rows: usize, cols: usize) -> usize {
    let fp = config::MARKER_FOOTPRINT;
    if rows < 2 * fp || cols < 2 * fp {
        return 0;
    }
    rows * cols - config::MARKER_COUNT * fp * fp
}

/// Whether a cell belongs to one of the four corner footprints.
pub fn is_reserved(row: usize, col: usize, rows: usize, cols: usize) -> bool {
    let fp = config::MARKER_FOOTPRINT;
    let top = row < fp;
    let bottom = row + fp >= rows;
    let left = col < fp;
    let right = col + fp >= cols;
    (top || bottom) && (left || right)
}

/// Whether a reserved cell is part of a solid marker (as opposed to its separator).
pub fn is_marker(row: usize, col: usize, rows: usize, cols: usize) -> bool {
    let m = config::MARKER_CELLS;
    let top = row < m;
    let bottom = row + m >= rows;
    let left = col < m;
    let right = col + m >= cols;
    (top || bottom) && (left || right)
}

/// Marker centres in grid units, ordered top-left, top-right, bottom-left, bottom-right.
pub fn marker_centers(rows: usize, cols: usize) -> [(f64, f64); config::MARKER_COUNT] {
    let half = config::MARKER_CELLS as f64 / 2.0;
    let (w, h) = (cols as f64, rows as f64);
    [
        (half, half),
        (w - half, half),
        (half, h - half),
        (w - half, h - half),
    ]
}

/// Iterate over data cell coordinates in placement order.
pub fn data_cells(rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..rows)
        .flat_map(move |r| (0..cols).map(move |c| (r, c)))
        .filter(move |&(r, c)| !is_reserved(r, c, rows, cols))
}

/// Places bit sequences onto grids of a fixed cell size.
#[derive(Debug, Clone)]
pub struct GridEncoder {
    cell_size: u32,
}

impl GridEncoder {
    pub fn new(cfg: &BitpaperConfig) -> Self {
        Self {
            cell_size: cfg.cell_size,
        }
    }

    /// Burn the markers and place `bits` row-major over the data cells.
    /// Cells past the end of `bits` stay white.
    pub fn encode(&self, bits: &[bool], rows: usize, cols: usize) -> Result<Grid, CapacityError> {
        let capacity = data_capacity(rows, cols);
        if bits.len() > capacity {
            return Err(CapacityError::GridFull {
                bits: bits.len(),
                capacity,
                rows,
                cols,
            });
        }

        let mut cells = vec![false; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                if is_marker(r, c, rows, cols) {
                    cells[r * cols + c] = true;
                }
            }
        }
        for ((r, c), &bit) in data_cells(rows, cols).zip(bits) {
            cells[r * cols + c] = bit;
        }

        Ok(Grid {
            cell_size: self.cell_size,
            rows,
            cols,
            cells,
        })
    }
}

/// Expand bytes into bits, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> BitSequence {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for pos in (0..8).rev() {
            bits.push((byte >> pos) & 1 == 1);
        }
    }
    bits
}

/// Pack bits into bytes, MSB first. A trailing partial byte is dropped.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
        .collect()
}

use rayon::prelude::*;

use crate::config;
use crate::grid::Grid;
use crate::raster::{Raster, BLACK, WHITE};

/// Rasterise a grid onto a white page.
///
/// The grid's top-left corner sits at `(PAGE_MARGIN, PAGE_MARGIN)` and each cell
/// covers `cell_size x cell_size` pixels. Cells falling outside the page are clipped.
pub fn render(grid: &Grid, page_width: u32, page_height: u32) -> Raster {
    let mut raster = Raster::new(page_width, page_height, WHITE);
    let width = page_width as usize;
    let cell = grid.cell_size as usize;
    let origin = config::PAGE_MARGIN as usize;

    raster
        .pixels_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, line)| {
            if y < origin || cell == 0 {
                return;
            }
            let row = (y - origin) / cell;
            if row >= grid.rows {
                return;
            }
            for col in 0..grid.cols {
                if !grid.get(row, col) {
                    continue;
                }
                let x0 = origin + col * cell;
                if x0 >= width {
                    break;
                }
                let x1 = (x0 + cell).min(width);
                line[x0..x1].fill(BLACK);
            }
        });

    raster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{data_capacity, GridEncoder};

    #[test]
    fn test_render_places_cells() {
        let (rows, cols) = (12, 14);
        let mut bits = vec![false; data_capacity(rows, cols)];
        bits[0] = true; // cell (0, 5)
        let grid = GridEncoder { cell_size: 4 }.encode(&bits, rows, cols).unwrap();
        let raster = render(&grid, 200, 200);

        let m = config::PAGE_MARGIN;
        // Quiet zone stays white
        assert_eq!(raster.get(m - 1, m - 1), WHITE);
        // Marker corner pixel
        assert_eq!(raster.get(m, m), BLACK);
        assert_eq!(raster.get(m + 15, m + 15), BLACK);
        // Separator column
        assert_eq!(raster.get(m + 16, m + 1), WHITE);
        // First data cell spans x in [m+20, m+24)
        assert_eq!(raster.get(m + 20, m), BLACK);
        assert_eq!(raster.get(m + 23, m + 3), BLACK);
        assert_eq!(raster.get(m + 24, m), WHITE);
        // Below the grid
        assert_eq!(raster.get(m + 20, m + 12 * 4), WHITE);
    }

    #[test]
    fn test_render_clips_to_page() {
        let grid = Grid {
            cell_size: 10,
            rows: 20,
            cols: 20,
            cells: vec![true; 400],
        };
        let raster = render(&grid, 100, 100);
        assert_eq!(raster.width(), 100);
        assert_eq!(raster.get(99, 99), BLACK);
    }
}

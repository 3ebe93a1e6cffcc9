use std::fmt;

use crate::raster::{Point, Raster};

/// The four page corners, in marker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    fn is_right(self) -> bool {
        matches!(self, Corner::TopRight | Corner::BottomRight)
    }

    fn is_bottom(self) -> bool {
        matches!(self, Corner::BottomLeft | Corner::BottomRight)
    }

    /// Pixel bounds `(x0, y0, x1, y1)` (exclusive end) of this corner's image quadrant.
    pub fn quadrant(self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (hw, hh) = (width / 2, height / 2);
        let (x0, x1) = if self.is_right() { (hw, width) } else { (0, hw) };
        let (y0, y1) = if self.is_bottom() { (hh, height) } else { (0, hh) };
        (x0, y0, x1, y1)
    }

    /// The image corner itself, in continuous coordinates.
    pub fn image_point(self, width: u32, height: u32) -> Point {
        Point::new(
            if self.is_right() { width as f64 } else { 0.0 },
            if self.is_bottom() { height as f64 } else { 0.0 },
        )
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        };
        f.write_str(name)
    }
}

/// A 4-connected region of dark pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub area: u64,
    sum_x: u64,
    sum_y: u64,
}

impl Blob {
    fn seed(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
        self.sum_x += x as u64;
        self.sum_y += y as u64;
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Mean pixel centre.
    pub fn centroid(&self) -> Point {
        let n = self.area.max(1) as f64;
        Point::new(self.sum_x as f64 / n + 0.5, self.sum_y as f64 / n + 0.5)
    }

    /// Fraction of the bounding box covered by the blob.
    pub fn fill_ratio(&self) -> f64 {
        self.area as f64 / (self.width() as f64 * self.height() as f64)
    }

    /// Long side over short side of the bounding box, always >= 1.
    pub fn aspect(&self) -> f64 {
        let (w, h) = (self.width() as f64, self.height() as f64);
        w.max(h) / w.min(h)
    }

    /// The bounding-box corner facing `corner`.
    pub fn outer_point(&self, corner: Corner) -> Point {
        Point::new(
            if corner.is_right() { self.max_x as f64 + 1.0 } else { self.min_x as f64 },
            if corner.is_bottom() { self.max_y as f64 + 1.0 } else { self.min_y as f64 },
        )
    }

    /// Whether the blob has the size and shape of a solid square marker of side `expected` px.
    pub fn looks_like_marker(&self, expected: f64) -> bool {
        let (lo, hi) = (expected * 0.5, expected * 2.0);
        let (w, h) = (self.width() as f64, self.height() as f64);
        (lo..=hi).contains(&w) && (lo..=hi).contains(&h) && self.aspect() <= 1.5 && self.fill_ratio() >= 0.6
    }
}

/// Collect every 4-connected blob of pixels darker than `threshold` within
/// the rectangle `[x0, x1) x [y0, y1)`.
pub fn find_blobs(raster: &Raster, threshold: u8, bounds: (u32, u32, u32, u32)) -> Vec<Blob> {
    let (x0, y0, x1, y1) = bounds;
    let (x1, y1) = (x1.min(raster.width()), y1.min(raster.height()));
    if x0 >= x1 || y0 >= y1 {
        return Vec::new();
    }
    let (w, h) = ((x1 - x0) as usize, (y1 - y0) as usize);
    let dark = |x: u32, y: u32| raster.get(x, y) < threshold;

    let mut visited = vec![false; w * h];
    let mut blobs = Vec::new();
    let mut stack = Vec::new();

    for y in y0..y1 {
        for x in x0..x1 {
            let idx = (y - y0) as usize * w + (x - x0) as usize;
            if visited[idx] || !dark(x, y) {
                continue;
            }

            visited[idx] = true;
            stack.push((x, y));
            let mut blob = Blob::seed(x, y);

            while let Some((px, py)) = stack.pop() {
                blob.add(px, py);

                let neighbours = [
                    (px > x0).then(|| (px - 1, py)),
                    (px + 1 < x1).then(|| (px + 1, py)),
                    (py > y0).then(|| (px, py - 1)),
                    (py + 1 < y1).then(|| (px, py + 1)),
                ];
                for (nx, ny) in neighbours.into_iter().flatten() {
                    let nidx = (ny - y0) as usize * w + (nx - x0) as usize;
                    if !visited[nidx] && dark(nx, ny) {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            blobs.push(blob);
        }
    }

    blobs
}

/// Find the marker candidate in `corner`'s quadrant closest to the image corner.
pub fn find_marker(raster: &Raster, threshold: u8, corner: Corner, expected_side: f64) -> Option<Blob> {
    let (width, height) = (raster.width(), raster.height());
    let target = corner.image_point(width, height);

    find_blobs(raster, threshold, corner.quadrant(width, height))
        .into_iter()
        .filter(|b| b.looks_like_marker(expected_side))
        .min_by(|a, b| {
            let da = a.outer_point(corner).distance(&target);
            let db = b.outer_point(corner).distance(&target);
            da.total_cmp(&db)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BLACK, WHITE};

    fn fill_rect(r: &mut Raster, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                r.set(xx, yy, BLACK);
            }
        }
    }

    #[test]
    fn test_quadrants_cover_image() {
        let (w, h) = (101, 77);
        let total: u64 = Corner::ALL
            .iter()
            .map(|c| {
                let (x0, y0, x1, y1) = c.quadrant(w, h);
                (x1 - x0) as u64 * (y1 - y0) as u64
            })
            .sum();
        assert_eq!(total, 101 * 77);
    }

    #[test]
    fn test_find_blobs_separates_regions() {
        let mut r = Raster::new(40, 40, WHITE);
        fill_rect(&mut r, 2, 2, 5, 5);
        fill_rect(&mut r, 20, 10, 3, 8);
        // Diagonal contact does not join 4-connected blobs
        r.set(30, 30, BLACK);
        r.set(31, 31, BLACK);

        let mut blobs = find_blobs(&r, 128, (0, 0, 40, 40));
        blobs.sort_by_key(|b| (b.min_y, b.min_x));
        assert_eq!(blobs.len(), 4);
        assert_eq!(blobs[0].area, 25);
        assert_eq!((blobs[0].width(), blobs[0].height()), (5, 5));
        assert_eq!(blobs[0].centroid(), Point::new(4.5, 4.5));
        assert_eq!(blobs[1].area, 24);
        assert_eq!(blobs[1].aspect(), 8.0 / 3.0);
    }

    #[test]
    fn test_blobs_clipped_to_bounds() {
        let mut r = Raster::new(20, 20, WHITE);
        fill_rect(&mut r, 5, 5, 10, 2);
        let blobs = find_blobs(&r, 128, (0, 0, 10, 10));
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].max_x, 9);
        assert_eq!(blobs[0].area, 10);
    }

    #[test]
    fn test_marker_shape_filter() {
        let mut r = Raster::new(60, 60, WHITE);
        fill_rect(&mut r, 0, 0, 24, 24); // marker
        fill_rect(&mut r, 30, 0, 24, 4); // bar
        fill_rect(&mut r, 0, 30, 4, 4); // speck
        let blobs = find_blobs(&r, 128, (0, 0, 60, 60));
        let markers: Vec<_> = blobs.iter().filter(|b| b.looks_like_marker(24.0)).collect();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].area, 576);
    }

    #[test]
    fn test_find_marker_prefers_outer_candidate() {
        let mut r = Raster::new(200, 200, WHITE);
        fill_rect(&mut r, 60, 60, 24, 24);
        fill_rect(&mut r, 10, 12, 24, 24);
        fill_rect(&mut r, 170, 170, 24, 24);

        let tl = find_marker(&r, 128, Corner::TopLeft, 24.0).unwrap();
        assert_eq!((tl.min_x, tl.min_y), (10, 12));
        let br = find_marker(&r, 128, Corner::BottomRight, 24.0).unwrap();
        assert_eq!((br.min_x, br.min_y), (170, 170));
        assert!(find_marker(&r, 128, Corner::TopRight, 24.0).is_none());
    }

    #[test]
    fn test_corner_display() {
        assert_eq!(Corner::BottomLeft.to_string(), "bottom-left");
    }
}

use image::GrayImage;

pub const WHITE: u8 = 255;
pub const BLACK: u8 = 0;

/// A point in continuous raster coordinates. Pixel `(i, j)` covers
/// `[i, i + 1) x [j, j + 1)`, so its centre is `(i + 0.5, j + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An 8-bit grayscale image stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Create a raster filled with a single value.
    pub fn new(width: u32, height: u32, fill: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Wrap an existing pixel buffer. Returns `None` if the length does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.pixels[y as usize * self.width as usize + x as usize] = value;
    }

    /// Read a pixel by signed coordinates; anything off the raster is white paper.
    pub fn get_or_white(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return WHITE;
        }
        self.get(x as u32, y as u32)
    }

    /// Bilinear sample at a continuous coordinate (pixel centres at `+0.5`).
    pub fn sample_bilinear(&self, p: Point) -> f64 {
        let fx = p.x - 0.5;
        let fy = p.y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.get_or_white(x0, y0) as f64;
        let p10 = self.get_or_white(x0 + 1, y0) as f64;
        let p01 = self.get_or_white(x0, y0 + 1) as f64;
        let p11 = self.get_or_white(x0 + 1, y0 + 1) as f64;

        let top = p00 + (p10 - p00) * tx;
        let bottom = p01 + (p11 - p01) * tx;
        top + (bottom - top) * ty
    }

    /// Convert into an `image` buffer for PNG export.
    pub fn into_gray_image(self) -> GrayImage {
        // Length is checked on construction, so `from_raw` cannot fail.
        GrayImage::from_raw(self.width, self.height, self.pixels)
            .unwrap_or_else(|| GrayImage::new(0, 0))
    }
}

impl From<GrayImage> for Raster {
    fn from(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

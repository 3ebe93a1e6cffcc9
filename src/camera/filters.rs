use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::raster::{Point, Raster};
use crate::sampler::Homography;

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Normalised 1-D Gaussian kernel covering ±3σ.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian blur with edge replication.
pub fn gaussian_blur(src: &Raster, sigma: f64) -> Raster {
    if sigma <= 0.0 || src.pixels().is_empty() {
        return src.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let (w, h) = (src.width() as usize, src.height() as usize);
    let pixels = src.pixels();

    let mut horizontal = vec![0.0f64; w * h];
    horizontal
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, line)| {
            let row = &pixels[y * w..(y + 1) * w];
            for (x, out) in line.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - radius).clamp(0, w as i64 - 1) as usize;
                    acc += weight * row[sx] as f64;
                }
                *out = acc;
            }
        });

    let mut blurred = Raster::new(src.width(), src.height(), 0);
    blurred
        .pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, line)| {
            for (x, out) in line.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y as i64 + k as i64 - radius).clamp(0, h as i64 - 1) as usize;
                    acc += weight * horizontal[sy * w + x];
                }
                *out = to_u8(acc);
            }
        });

    blurred
}

/// Add zero-mean Gaussian noise, one draw per pixel in raster order.
pub fn add_noise<R: Rng>(raster: &mut Raster, sigma: f64, rng: &mut R) {
    if sigma <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0, sigma) else {
        return;
    };
    for p in raster.pixels_mut() {
        *p = to_u8(*p as f64 + normal.sample(rng));
    }
}

/// `v' = ((v - 128)(1 + contrast) + 128)(1 + brightness)`, clamped to 0..=255.
pub fn adjust_levels(raster: &mut Raster, contrast_delta: f64, brightness_delta: f64) {
    raster.pixels_mut().par_iter_mut().for_each(|p| {
        let v = *p as f64;
        *p = to_u8(((v - 128.0) * (1.0 + contrast_delta) + 128.0) * (1.0 + brightness_delta));
    });
}

/// Move each image corner inward by `(dx, dy)` and resample. Corner order is
/// top-left, top-right, bottom-left, bottom-right; uncovered area becomes white.
pub fn perspective_warp(src: &Raster, shifts: &[(f64, f64); 4]) -> Raster {
    let (w, h) = (src.width() as f64, src.height() as f64);
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(0.0, h),
        Point::new(w, h),
    ];
    let moved = [
        Point::new(shifts[0].0, shifts[0].1),
        Point::new(w - shifts[1].0, shifts[1].1),
        Point::new(shifts[2].0, h - shifts[2].1),
        Point::new(w - shifts[3].0, h - shifts[3].1),
    ];

    // Map output pixels back into the source
    let Some(inverse) = Homography::from_points(&corners, &moved).and_then(|h| h.inverse()) else {
        return src.clone();
    };

    let mut warped = Raster::new(src.width(), src.height(), 0);
    let width = src.width() as usize;
    warped
        .pixels_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, line)| {
            for (x, out) in line.iter_mut().enumerate() {
                let p = inverse.apply(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                *out = to_u8(src.sample_bilinear(p));
            }
        });

    warped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BLACK, WHITE};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_kernel_is_normalised() {
        for sigma in [0.3, 1.0, 2.5] {
            let k = gaussian_kernel(sigma);
            assert_eq!(k.len() % 2, 1);
            assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_blur_keeps_uniform_image() {
        let r = Raster::new(30, 20, 200);
        assert_eq!(gaussian_blur(&r, 1.4), r);
    }

    #[test]
    fn test_blur_softens_edge() {
        let mut r = Raster::new(20, 1, WHITE);
        for x in 0..10 {
            r.set(x, 0, BLACK);
        }
        let b = gaussian_blur(&r, 1.0);
        assert_eq!(b.get(0, 0), BLACK);
        assert_eq!(b.get(19, 0), WHITE);
        assert!(b.get(9, 0) > 50 && b.get(9, 0) < 128);
        assert!(b.get(10, 0) > 128 && b.get(10, 0) < 205);
    }

    #[test]
    fn test_noise_is_seeded() {
        let base = Raster::new(16, 16, 128);
        let mut a = base.clone();
        let mut b = base.clone();
        add_noise(&mut a, 8.0, &mut ChaCha8Rng::seed_from_u64(1));
        add_noise(&mut b, 8.0, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
        assert_ne!(a, base);

        let mut c = base.clone();
        add_noise(&mut c, 0.0, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(c, base);
    }

    #[test]
    fn test_adjust_levels_formula() {
        let mut r = Raster::from_pixels(3, 1, vec![0, 128, 255]).unwrap();
        adjust_levels(&mut r, -0.15, -0.10);
        // ((0 - 128) * 0.85 + 128) * 0.9 = 17.28, (128) * 0.9 = 115.2, (127 * 0.85 + 128) * 0.9 = 212.355
        assert_eq!(r.pixels(), &[17, 115, 212]);

        let mut r = Raster::from_pixels(2, 1, vec![0, 255]).unwrap();
        adjust_levels(&mut r, 0.5, 0.5);
        assert_eq!(r.pixels(), &[0, 255]);
    }

    #[test]
    fn test_warp_without_shift_is_identity() {
        let mut r = Raster::new(12, 9, WHITE);
        r.set(3, 4, BLACK);
        r.set(11, 8, 77);
        assert_eq!(perspective_warp(&r, &[(0.0, 0.0); 4]), r);
    }

    #[test]
    fn test_warp_pulls_corners_in() {
        let r = Raster::new(100, 80, BLACK);
        let warped = perspective_warp(&r, &[(5.0, 4.0), (3.0, 6.0), (6.0, 2.0), (4.0, 5.0)]);
        assert_eq!(warped.get(0, 0), WHITE);
        assert_eq!(warped.get(99, 79), WHITE);
        assert_eq!(warped.get(50, 40), BLACK);
    }
}

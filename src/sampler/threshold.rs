use rayon::prelude::*;

/// Result of Otsu's method: the split point and the mean of each class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Otsu {
    /// Pixels strictly below this value are dark.
    pub threshold: u8,
    pub dark_mean: f64,
    pub light_mean: f64,
}

impl Otsu {
    /// Distance between the class means; zero for a uniform image.
    pub fn contrast(&self) -> f64 {
        (self.light_mean - self.dark_mean).max(0.0)
    }

    /// Halfway between the class means. Unlike `threshold` this does not
    /// collapse onto the dark level for a perfectly binary image.
    pub fn midpoint(&self) -> f64 {
        (self.light_mean + self.dark_mean) / 2.0
    }
}

/// Build an intensity histogram.
pub fn histogram(pixels: &[u8]) -> [u64; 256] {
    pixels
        .par_chunks(1 << 16)
        .fold(
            || [0u64; 256],
            |mut hist, chunk| {
                for &p in chunk {
                    hist[p as usize] += 1;
                }
                hist
            },
        )
        .reduce(
            || [0u64; 256],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += y;
                }
                a
            },
        )
}

/// Otsu's optimal global threshold (maximum between-class variance).
pub fn otsu(pixels: &[u8]) -> Otsu {
    let hist = histogram(pixels);
    let total = pixels.len() as f64;
    let total_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut best = Otsu {
        threshold: 128,
        dark_mean: if total > 0.0 { total_sum / total } else { 0.0 },
        light_mean: if total > 0.0 { total_sum / total } else { 0.0 },
    };
    let mut max_variance = 0.0;

    // Running sums for the dark class [0, t)
    let mut dark_count = 0.0;
    let mut dark_sum = 0.0;
    for t in 1..256usize {
        dark_count += hist[t - 1] as f64;
        dark_sum += (t - 1) as f64 * hist[t - 1] as f64;

        let light_count = total - dark_count;
        if dark_count == 0.0 || light_count == 0.0 {
            continue;
        }

        let dark_mean = dark_sum / dark_count;
        let light_mean = (total_sum - dark_sum) / light_count;
        let variance = (dark_count / total) * (light_count / total) * (light_mean - dark_mean).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best = Otsu {
                threshold: t as u8,
                dark_mean,
                light_mean,
            };
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts() {
        let pixels = [0u8, 0, 255, 17, 17, 17];
        let hist = histogram(&pixels);
        assert_eq!(hist[0], 2);
        assert_eq!(hist[17], 3);
        assert_eq!(hist[255], 1);
        assert_eq!(hist.iter().sum::<u64>(), 6);
    }

    #[test]
    fn test_bimodal_split() {
        let mut pixels = vec![30u8; 1000];
        pixels.extend(vec![220u8; 3000]);
        let result = otsu(&pixels);
        assert!(result.threshold > 30 && result.threshold <= 220);
        assert_eq!(result.dark_mean, 30.0);
        assert_eq!(result.light_mean, 220.0);
        assert_eq!(result.contrast(), 190.0);
    }

    #[test]
    fn test_uniform_image_has_no_contrast() {
        let result = otsu(&[200u8; 500]);
        assert_eq!(result.contrast(), 0.0);
        assert_eq!(otsu(&[]).contrast(), 0.0);
    }

    #[test]
    fn test_noisy_classes() {
        let mut pixels = Vec::new();
        for i in 0..2000u32 {
            pixels.push(20 + (i % 21) as u8);
            pixels.push(200 + (i % 31) as u8);
        }
        let result = otsu(&pixels);
        assert!(result.threshold > 40 && result.threshold <= 200, "{}", result.threshold);
    }
}

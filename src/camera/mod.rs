//! Deterministic simulation of photographing a printed page.
//!
//! Used by tests and the `simulate` command to check how far the decoder
//! holds up; the decode path never calls into it.

pub mod filters;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::raster::Raster;

pub const DEFAULT_SEED: u64 = 0x5EED;

/// Named capture-quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Perfect,
    Good,
    Average,
    Challenging,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Perfect, Preset::Good, Preset::Average, Preset::Challenging];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Perfect => "perfect",
            Preset::Good => "good",
            Preset::Average => "average",
            Preset::Challenging => "challenging",
        }
    }

    pub fn profile(self) -> CameraProfile {
        CameraProfile::preset(self)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown camera preset '{s}'"))
    }
}

/// Parameters of one simulated capture. Immutable; use [`CameraProfile::with_seed`]
/// to derive variations.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    name: String,
    blur_sigma: f64,
    noise_sigma: f64,
    contrast_delta: f64,
    brightness_delta: f64,
    max_corner_shift: f64,
    seed: u64,
}

impl CameraProfile {
    pub fn new(
        name: impl Into<String>,
        blur_sigma: f64,
        noise_sigma: f64,
        contrast_delta: f64,
        brightness_delta: f64,
        max_corner_shift: f64,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            blur_sigma,
            noise_sigma,
            contrast_delta,
            brightness_delta,
            max_corner_shift,
            seed,
        }
    }

    pub fn preset(preset: Preset) -> Self {
        let (blur, noise, contrast, brightness, shift) = match preset {
            Preset::Perfect => (0.0, 0.0, 0.0, 0.0, 0.0),
            Preset::Good => (0.6, 4.0, -0.05, -0.05, 8.0),
            Preset::Average => (1.2, 8.0, -0.15, -0.10, 24.0),
            // Blur close to half a default cell: isolated cells start to flip
            Preset::Challenging => (2.5, 20.0, -0.25, -0.15, 40.0),
        };
        Self::new(preset.name(), blur, noise, contrast, brightness, shift, DEFAULT_SEED)
    }

    pub fn with_seed(&self, seed: u64) -> Self {
        Self { seed, ..self.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blur_sigma(&self) -> f64 {
        self.blur_sigma
    }

    pub fn noise_sigma(&self) -> f64 {
        self.noise_sigma
    }

    pub fn contrast_delta(&self) -> f64 {
        self.contrast_delta
    }

    pub fn brightness_delta(&self) -> f64 {
        self.brightness_delta
    }

    pub fn max_corner_shift(&self) -> f64 {
        self.max_corner_shift
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Apply perspective skew, lens blur, level shift and sensor noise, in that
/// order, so the noise is not smoothed away by the later stages.
///
/// The same raster and profile always produce the same output. The corner
/// shifts are drawn before the per-pixel noise.
pub fn apply(raster: &Raster, profile: &CameraProfile) -> Raster {
    let mut rng = ChaCha8Rng::seed_from_u64(profile.seed);

    let max_shift = profile.max_corner_shift.max(0.0);
    let mut shifts = [(0.0, 0.0); 4];
    if max_shift > 0.0 {
        for shift in shifts.iter_mut() {
            *shift = (rng.gen_range(0.0..=max_shift), rng.gen_range(0.0..=max_shift));
        }
    }

    let warped;
    let skewed = if max_shift > 0.0 {
        warped = filters::perspective_warp(raster, &shifts);
        &warped
    } else {
        raster
    };

    let mut out = filters::gaussian_blur(skewed, profile.blur_sigma);
    if profile.contrast_delta != 0.0 || profile.brightness_delta != 0.0 {
        filters::adjust_levels(&mut out, profile.contrast_delta, profile.brightness_delta);
    }
    if profile.noise_sigma > 0.0 {
        filters::add_noise(&mut out, profile.noise_sigma, &mut rng);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BLACK, WHITE};

    fn checkerboard(w: u32, h: u32, cell: u32) -> Raster {
        let mut r = Raster::new(w, h, WHITE);
        for y in 0..h {
            for x in 0..w {
                if (x / cell + y / cell) % 2 == 0 {
                    r.set(x, y, BLACK);
                }
            }
        }
        r
    }

    #[test]
    fn test_perfect_is_identity() {
        let r = checkerboard(64, 48, 6);
        assert_eq!(apply(&r, &Preset::Perfect.profile()), r);
    }

    #[test]
    fn test_deterministic() {
        let r = checkerboard(64, 48, 6);
        let profile = Preset::Challenging.profile().with_seed(11);
        assert_eq!(apply(&r, &profile), apply(&r, &profile));
    }

    #[test]
    fn test_seed_changes_output() {
        let r = checkerboard(64, 48, 6);
        let profile = Preset::Average.profile();
        assert_ne!(apply(&r, &profile.with_seed(1)), apply(&r, &profile.with_seed(2)));
    }

    #[test]
    fn test_with_seed_keeps_parameters() {
        let base = Preset::Good.profile();
        let reseeded = base.with_seed(99);
        assert_eq!(reseeded.seed(), 99);
        assert_eq!(reseeded.name(), "good");
        assert_eq!(reseeded.blur_sigma(), base.blur_sigma());
        assert_eq!(reseeded.max_corner_shift(), base.max_corner_shift());
        assert_eq!(base.seed(), DEFAULT_SEED);
    }

    #[test]
    fn test_presets_get_harsher() {
        let profiles: Vec<_> = Preset::ALL.iter().map(|p| p.profile()).collect();
        for pair in profiles.windows(2) {
            assert!(pair[0].blur_sigma() < pair[1].blur_sigma());
            assert!(pair[0].noise_sigma() < pair[1].noise_sigma());
            assert!(pair[0].contrast_delta() > pair[1].contrast_delta());
            assert!(pair[0].max_corner_shift() < pair[1].max_corner_shift());
        }
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("average".parse::<Preset>(), Ok(Preset::Average));
        assert_eq!("Challenging".parse::<Preset>(), Ok(Preset::Challenging));
        assert!("blurry".parse::<Preset>().is_err());
        assert_eq!(Preset::Good.to_string(), "good");
    }

    #[test]
    fn test_noise_is_applied_last() {
        // A flat mid-grey page: levels are the identity there, so any
        // deviation from 128 is the noise alone and must keep its spread
        let r = Raster::new(64, 64, 128);
        let profile = CameraProfile::new("noisy", 2.0, 10.0, 0.0, 0.0, 0.0, 3);
        let out = apply(&r, &profile);
        let n = out.pixels().len() as f64;
        let var = out.pixels().iter().map(|&p| (p as f64 - 128.0).powi(2)).sum::<f64>() / n;
        assert!(var.sqrt() > 8.0, "noise spread {}", var.sqrt());
    }

    #[test]
    fn test_uniform_page_survives_blur_and_levels() {
        let r = Raster::new(40, 40, 200);
        let profile = CameraProfile::new("flat", 1.2, 0.0, 0.0, 0.0, 0.0, 0);
        assert_eq!(apply(&r, &profile), r);
    }
}

//! Integer Haar wavelet transform: forward/inverse butterfly, multi-level
//! iteration, precision-control rescale and hard/soft thresholding.
//! Grounded in `qowi/wavelet.py`'s `Wavelet` class.

use log::debug;

use crate::integers::rescale;

/// Detail sub-band. LL has no variant: it lives implicitly at the
/// coarsest decomposed level as position `(i, j)` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Hl,
    Lh,
    Hh,
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        (n - 1).ilog2() + 1
    }
}

/// Forward Haar butterfly: `a b / c d` -> `(LL, HL, LH, HH)`.
pub fn haar_forward(a: i64, b: i64, c: i64, d: i64) -> (i64, i64, i64, i64) {
    (a + b + c + d, a + b - c - d, a - b + c - d, a - b - c + d)
}

/// Inverse Haar butterfly: exact for integer inputs produced by `haar_forward`.
pub fn haar_inverse(ll: i64, hl: i64, lh: i64, hh: i64) -> (i64, i64, i64, i64) {
    (
        (ll + hl + lh + hh) / 4,
        (ll + hl - lh - hh) / 4,
        (ll - hl + lh - hh) / 4,
        (ll - hl - lh + hh) / 4,
    )
}

/// An N x N x C plane of signed wavelet coefficients, wide enough to hold
/// `max_sample_value * 4^L`.
pub struct Wavelet {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub length: usize,
    /// Full decomposition depth required to cover `width` x `height`.
    pub num_levels: u32,
    /// Levels actually transformed, counted from the finest resolution
    /// toward the root; `lowest_level` below is the coarsest level reached.
    pub wavelet_levels: u32,
    pub precision_digits: u8,
    coeffs: Vec<i64>,
}

impl Wavelet {
    /// Coarsest level actually produced by the transform. Levels below this
    /// one hold raw, un-decomposed values (see SPEC_FULL.md §4.5).
    pub fn lowest_level(&self) -> u32 {
        self.num_levels.saturating_sub(self.wavelet_levels)
    }

    fn index(&self, i: usize, j: usize, c: usize) -> usize {
        (i * self.length + j) * self.channels + c
    }

    pub fn pixel(&self, i: usize, j: usize) -> &[i64] {
        let start = self.index(i, j, 0);
        &self.coeffs[start..start + self.channels]
    }

    pub fn set_pixel(&mut self, i: usize, j: usize, values: &[i64]) {
        let start = self.index(i, j, 0);
        self.coeffs[start..start + self.channels].copy_from_slice(values);
    }

    /// Absolute plane coordinates for a (level, band, i, j) coefficient.
    pub fn band_coords(level: u32, band: Band, i: usize, j: usize) -> (usize, usize) {
        let d = 1usize << level;
        match band {
            Band::Hl => (i, d + j),
            Band::Lh => (d + i, j),
            Band::Hh => (d + i, d + j),
        }
    }

    pub fn band(&self, level: u32, band: Band, i: usize, j: usize) -> &[i64] {
        let (pi, pj) = Self::band_coords(level, band, i, j);
        self.pixel(pi, pj)
    }

    pub fn set_band(&mut self, level: u32, band: Band, i: usize, j: usize, values: &[i64]) {
        let (pi, pj) = Self::band_coords(level, band, i, j);
        self.set_pixel(pi, pj, values);
    }

    /// Allocates an empty plane ready to be filled from an image (encoder
    /// side) or by the decoder's traversal.
    pub fn new(width: usize, height: usize, channels: usize, wavelet_levels: u8, precision_digits: u8) -> Self {
        let num_levels = if width <= 1 && height <= 1 {
            0
        } else {
            ceil_log2(width.max(height) as u32)
        };
        let length = 1usize << num_levels;
        Wavelet {
            width,
            height,
            channels,
            length,
            num_levels,
            wavelet_levels: (wavelet_levels as u32).min(num_levels),
            precision_digits,
            coeffs: vec![0i64; length * length * channels],
        }
    }

    /// Pads to an N x N square (top-left is the image, the rest zero) and
    /// runs the forward transform.
    pub fn from_image(
        width: usize,
        height: usize,
        channels: usize,
        samples: &[u8],
        wavelet_levels: u8,
        precision_digits: u8,
    ) -> Self {
        let mut wavelet = Self::new(width, height, channels, wavelet_levels, precision_digits);
        for y in 0..height {
            for x in 0..width {
                let base = (y * width + x) * channels;
                let values: Vec<i64> = samples[base..base + channels].iter().map(|&s| s as i64).collect();
                wavelet.set_pixel(y, x, &values);
            }
        }
        wavelet.forward();
        wavelet
    }

    fn scaling_digits(&self, level: u32) -> i32 {
        ((self.num_levels - level) * 2) as i32
    }

    fn rescale_digits(&self, level: u32) -> i32 {
        let scaling = self.scaling_digits(level);
        if self.precision_digits > 0 {
            scaling - self.precision_digits as i32
        } else {
            0
        }
    }

    /// Runs the forward Haar transform level-by-level from the finest
    /// resolution down to `lowest_level()`.
    pub fn forward(&mut self) {
        let lowest = self.lowest_level();
        for dest_level in (lowest..self.num_levels).rev() {
            self.forward_level(dest_level);
            debug!("forward transform applied at level {dest_level}");
        }
    }

    fn forward_level(&mut self, dest_level: u32) {
        let d = 1usize << dest_level;
        let region = 2 * d;
        let mut scratch = vec![0i64; region * region * self.channels];
        let rescale_digits = self.rescale_digits(dest_level);

        for i in 0..d {
            for j in 0..d {
                for c in 0..self.channels {
                    let mut a = self.pixel(2 * i, 2 * j)[c];
                    let mut b = self.pixel(2 * i, 2 * j + 1)[c];
                    let mut cc = self.pixel(2 * i + 1, 2 * j)[c];
                    let mut dd = self.pixel(2 * i + 1, 2 * j + 1)[c];

                    if rescale_digits > 0 {
                        a = rescale(a, -rescale_digits);
                        b = rescale(b, -rescale_digits);
                        cc = rescale(cc, -rescale_digits);
                        dd = rescale(dd, -rescale_digits);
                    }

                    let (ll, hl, lh, hh) = haar_forward(a, b, cc, dd);
                    let stride = region * self.channels;
                    scratch[i * stride + j * self.channels + c] = ll;
                    scratch[i * stride + (d + j) * self.channels + c] = hl;
                    scratch[(d + i) * stride + j * self.channels + c] = lh;
                    scratch[(d + i) * stride + (d + j) * self.channels + c] = hh;
                }
            }
        }

        for i in 0..region {
            for j in 0..region {
                let src = (i * region + j) * self.channels;
                let dst = self.index(i, j, 0);
                self.coeffs[dst..dst + self.channels]
                    .copy_from_slice(&scratch[src..src + self.channels]);
            }
        }
    }

    /// Runs the inverse Haar transform from `lowest_level()` up to the
    /// finest resolution and returns the cropped H x W x C sample matrix.
    pub fn into_image(mut self) -> Vec<u8> {
        let lowest = self.lowest_level();
        for source_level in lowest..self.num_levels {
            self.inverse_level(source_level);
            debug!("inverse transform applied at level {source_level}");
        }

        let mut out = vec![0u8; self.height * self.width * self.channels];
        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = self.pixel(y, x);
                let base = (y * self.width + x) * self.channels;
                for c in 0..self.channels {
                    out[base + c] = pixel[c].clamp(0, 255) as u8;
                }
            }
        }
        out
    }

    fn inverse_level(&mut self, source_level: u32) {
        let d = 1usize << source_level;
        let region = 2 * d;
        let mut scratch = vec![0i64; region * region * self.channels];
        let rescale_digits = self.rescale_digits(source_level);

        for i in 0..d {
            for j in 0..d {
                for c in 0..self.channels {
                    let ll = self.pixel(i, j)[c];
                    let hl = self.pixel(i, d + j)[c];
                    let lh = self.pixel(d + i, j)[c];
                    let hh = self.pixel(d + i, d + j)[c];

                    let (mut a, mut b, mut cc, mut dd) = haar_inverse(ll, hl, lh, hh);

                    if rescale_digits > 0 {
                        a = rescale(a, rescale_digits);
                        b = rescale(b, rescale_digits);
                        cc = rescale(cc, rescale_digits);
                        dd = rescale(dd, rescale_digits);
                    }

                    let stride = region * self.channels;
                    scratch[(2 * i) * stride + (2 * j) * self.channels + c] = a;
                    scratch[(2 * i) * stride + (2 * j + 1) * self.channels + c] = b;
                    scratch[(2 * i + 1) * stride + (2 * j) * self.channels + c] = cc;
                    scratch[(2 * i + 1) * stride + (2 * j + 1) * self.channels + c] = dd;
                }
            }
        }

        for i in 0..region {
            for j in 0..region {
                let src = (i * region + j) * self.channels;
                let dst = self.index(i, j, 0);
                self.coeffs[dst..dst + self.channels]
                    .copy_from_slice(&scratch[src..src + self.channels]);
            }
        }
    }

    fn level_threshold(&self, level: u32, threshold: i32) -> i64 {
        let scaling = self.scaling_digits(level);
        let rescale_digits = self.rescale_digits(level);
        let digits = if rescale_digits > 0 {
            scaling - rescale_digits
        } else {
            scaling
        };
        (threshold as i64) << digits
    }

    /// Zeroes detail coefficients whose magnitude is below the
    /// level-scaled threshold. A threshold `<= 0` is a no-op.
    pub fn apply_hard_threshold(&mut self, threshold: i32) {
        if threshold <= 0 {
            return;
        }
        let lowest = self.lowest_level();
        for level in lowest..self.num_levels {
            let t = self.level_threshold(level, threshold);
            let d = 1usize << level;
            for i in 0..d {
                for j in 0..d {
                    for band in [Band::Hl, Band::Lh, Band::Hh] {
                        let values: Vec<i64> = self
                            .band(level, band, i, j)
                            .iter()
                            .map(|&v| if v.abs() < t { 0 } else { v })
                            .collect();
                        self.set_band(level, band, i, j, &values);
                    }
                }
            }
        }
    }

    /// Shrinks detail coefficients toward zero by the level-scaled
    /// threshold. A threshold `<= 0` is a no-op.
    pub fn apply_soft_threshold(&mut self, threshold: i32) {
        if threshold <= 0 {
            return;
        }
        let lowest = self.lowest_level();
        for level in lowest..self.num_levels {
            let t = self.level_threshold(level, threshold);
            let d = 1usize << level;
            for i in 0..d {
                for j in 0..d {
                    for band in [Band::Hl, Band::Lh, Band::Hh] {
                        let values: Vec<i64> = self
                            .band(level, band, i, j)
                            .iter()
                            .map(|&v| v.signum() * (v.abs() - t).max(0))
                            .collect();
                        self.set_band(level, band, i, j, &values);
                    }
                }
            }
        }
    }
}

//! Depth-first coefficient traversal linking the wavelet plane to the
//! entropy coder. Grounded in `qowi_encoder.py::_write_coefficients` and
//! `qowi_decoder.py::_read_coefficients`: an explicit stack of
//! `(level, band, i, j)` records, never recursion.

use crate::wavelet::{Band, Wavelet};

struct Frame {
    level: u32,
    band: Band,
    i: usize,
    j: usize,
}

/// Builds the initial stack so that popping proceeds HL, LH, HH per cell,
/// one cell at a time, in raster order over the coarsest decomposed block.
/// `start_level` is `Wavelet::lowest_level()`; with full decomposition the
/// block is a single cell and this is exactly the three-entry stack in
/// SPEC_FULL.md §4.6.
///
/// When `start_level == num_levels` the root block spans the entire plane
/// (no level remains to hold HL/LH/HH bands for it — a single-pixel image,
/// or `wavelet_levels == 0`), so there is nothing to traverse: an empty
/// stack, matching `coefficient_count`'s `length² − block² == 0`.
fn seed_stack(start_level: u32, num_levels: u32, block: usize) -> Vec<Frame> {
    if start_level >= num_levels {
        return Vec::new();
    }
    let mut stack = Vec::with_capacity(block * block * 3);
    for i in (0..block).rev() {
        for j in (0..block).rev() {
            stack.push(Frame { level: start_level, band: Band::Hh, i, j });
            stack.push(Frame { level: start_level, band: Band::Lh, i, j });
            stack.push(Frame { level: start_level, band: Band::Hl, i, j });
        }
    }
    stack
}

fn push_children(stack: &mut Vec<Frame>, frame: &Frame) {
    let (i, j) = (frame.i, frame.j);
    for (ci, cj) in [(2 * i, 2 * j), (2 * i, 2 * j + 1), (2 * i + 1, 2 * j), (2 * i + 1, 2 * j + 1)] {
        stack.push(Frame { level: frame.level + 1, band: Band::Hh, i: ci, j: cj });
    }
    // The loop above pushed HH for all four children; now push LH then HL
    // for all four so HL ends up on top. Matches "HH, LH, HL pushed last".
    for (ci, cj) in [(2 * i, 2 * j), (2 * i, 2 * j + 1), (2 * i + 1, 2 * j), (2 * i + 1, 2 * j + 1)] {
        stack.push(Frame { level: frame.level + 1, band: Band::Lh, i: ci, j: cj });
    }
    for (ci, cj) in [(2 * i, 2 * j), (2 * i, 2 * j + 1), (2 * i + 1, 2 * j), (2 * i + 1, 2 * j + 1)] {
        stack.push(Frame { level: frame.level + 1, band: Band::Hl, i: ci, j: cj });
    }
}

/// Calls `emit` with every non-root-block coefficient in depth-first
/// traversal order.
pub fn walk<'a>(wavelet: &'a Wavelet, mut emit: impl FnMut(&'a [i64])) {
    let start_level = wavelet.lowest_level();
    let block = 1usize << start_level;
    let mut stack = seed_stack(start_level, wavelet.num_levels, block);

    while let Some(frame) = stack.pop() {
        emit(wavelet.band(frame.level, frame.band, frame.i, frame.j));
        if frame.level + 1 < wavelet.num_levels {
            push_children(&mut stack, &frame);
        }
    }
}

/// Calls `next` once per non-root-block coefficient position, in the same
/// order `walk` would emit them, and writes the returned triplet back into
/// the wavelet. Used by the decoder, which builds the plane from the
/// bitstream instead of reading one that already exists.
pub fn fill(wavelet: &mut Wavelet, mut next: impl FnMut() -> Vec<i64>) {
    let start_level = wavelet.lowest_level();
    let block = 1usize << start_level;
    let num_levels = wavelet.num_levels;
    let mut stack = seed_stack(start_level, num_levels, block);

    while let Some(frame) = stack.pop() {
        let values = next();
        wavelet.set_band(frame.level, frame.band, frame.i, frame.j, &values);
        if frame.level + 1 < num_levels {
            push_children(&mut stack, &frame);
        }
    }
}

/// Number of non-root-block coefficients a traversal over `wavelet` visits.
pub fn coefficient_count(wavelet: &Wavelet) -> usize {
    let block = 1usize << wavelet.lowest_level();
    wavelet.length * wavelet.length - block * block
}

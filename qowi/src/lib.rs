#![allow(dead_code)]

//! QOWI: a lossless/lossy still-image codec built on an integer Haar
//! wavelet decomposition and a recency-and-delta entropy coder.
//!
//! This crate is the core: the wavelet transform, the coefficient
//! traversal, the entropy coder and the bitstream/header. Image file I/O
//! and the command-line driver live in `qowi-cli`.

use std::error;
use std::fmt;

pub mod bitstream;
pub mod cache;
pub mod entropy;
pub mod header;
pub mod integers;
pub mod traversal;
pub mod universal;
pub mod wavelet;

use bitstream::{BitReader, BitWriter};
use header::Header;
use integers::{unzigzag_tuple, zigzag_tuple};
use wavelet::Wavelet;

#[derive(Debug)]
pub enum CodecError {
    InvalidInput(String),
    MalformedHeader(String),
    TruncatedStream(String),
    InvalidOpcode(u64),
    CacheIndexOutOfRange { position: u32, cache_size: u32 },
    InternalInvariant(String),
}

impl error::Error for CodecError {}
impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::MalformedHeader(msg) => write!(f, "malformed header: {msg}"),
            Self::TruncatedStream(msg) => write!(f, "truncated stream: {msg}"),
            Self::InvalidOpcode(code) => write!(f, "invalid opcode {code:#04b}"),
            Self::CacheIndexOutOfRange { position, cache_size } => write!(
                f,
                "cache index {position} out of range for cache of size {cache_size}"
            ),
            Self::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
        }
    }
}

/// Options accepted by [`encode`]. Clamped to the ranges the header can
/// represent; out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// `-1` disables hard thresholding; otherwise a threshold `>= 0`.
    pub hard_threshold: i32,
    /// `-1` disables soft thresholding; otherwise a threshold `>= 0`.
    pub soft_threshold: i32,
    pub cache_size: u16,
    /// Number of wavelet levels to transform, clamped to `[0, 15]`.
    pub wavelet_levels: u8,
    pub precision_digits: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            hard_threshold: -1,
            soft_threshold: -1,
            cache_size: 65533,
            wavelet_levels: 10,
            precision_digits: 0,
        }
    }
}

/// A decoded image: an H x W x C matrix of unsigned samples, row-major,
/// channels innermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub channels: u8,
    pub samples: Vec<u8>,
}

fn validate_input(width: usize, height: usize, channels: usize) -> Result<(), CodecError> {
    if width == 0 || width > 65535 || height == 0 || height > 65535 {
        return Err(CodecError::InvalidInput(format!(
            "width and height must be in [1, 65535], got {width}x{height}"
        )));
    }
    if !(1..=4).contains(&channels) {
        return Err(CodecError::InvalidInput(format!(
            "channel count must be in [1, 4], got {channels}"
        )));
    }
    Ok(())
}

/// Encodes an H x W x C matrix of 8-bit samples into a QOWI bitstream.
pub fn encode(
    width: u16,
    height: u16,
    channels: u8,
    samples: &[u8],
    options: EncodeOptions,
) -> Result<Vec<u8>, CodecError> {
    validate_input(width as usize, height as usize, channels as usize)?;
    let wavelet_levels = options.wavelet_levels.min(15);

    let mut wavelet = Wavelet::from_image(
        width as usize,
        height as usize,
        channels as usize,
        samples,
        wavelet_levels,
        options.precision_digits,
    );

    if options.hard_threshold >= 0 {
        wavelet.apply_hard_threshold(options.hard_threshold);
    }
    if options.soft_threshold >= 0 {
        wavelet.apply_soft_threshold(options.soft_threshold);
    }

    let header = Header {
        width,
        height,
        channels,
        cache_size: options.cache_size,
        wavelet_levels,
        wavelet_precision_digits: options.precision_digits,
    };

    let mut writer = BitWriter::new();
    header.write(&mut writer);

    let block = 1usize << wavelet.lowest_level();
    for i in 0..block {
        for j in 0..block {
            for z in zigzag_tuple(wavelet.pixel(i, j)) {
                universal::encode(&mut writer, z);
            }
        }
    }

    let mut coder = entropy::Encoder::new(header.cache_size as usize, channels as usize);
    traversal::walk(&wavelet, |triplet| coder.encode_next(&mut writer, triplet));
    coder.finish(&mut writer);

    Ok(writer.finish())
}

/// Decodes a QOWI bitstream back into an H x W x C matrix of 8-bit samples.
pub fn decode(bytes: &[u8]) -> Result<Image, CodecError> {
    let mut reader = BitReader::new(bytes);
    let header = Header::read(&mut reader)?;

    let mut wavelet = Wavelet::new(
        header.width as usize,
        header.height as usize,
        header.channels as usize,
        header.wavelet_levels,
        header.wavelet_precision_digits,
    );

    let block = 1usize << wavelet.lowest_level();
    let truncated = |e: bitstream::BitstreamError| CodecError::TruncatedStream(e.to_string());
    for i in 0..block {
        for j in 0..block {
            let mut zz = vec![0u64; header.channels as usize];
            for z in zz.iter_mut() {
                *z = universal::decode(&mut reader).map_err(truncated)?;
            }
            wavelet.set_pixel(i, j, &unzigzag_tuple(&zz));
        }
    }

    let mut coder = entropy::Decoder::new(header.cache_size as usize, header.channels as usize);
    let mut decode_err = None;
    traversal::fill(&mut wavelet, || match coder.decode_next(&mut reader) {
        Ok(triplet) => triplet,
        Err(e) => {
            decode_err.get_or_insert(e);
            vec![0i64; header.channels as usize]
        }
    });
    if let Some(e) = decode_err {
        return Err(e);
    }

    let samples = wavelet.into_image();
    Ok(Image {
        width: header.width,
        height: header.height,
        channels: header.channels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(width: u16, height: u16, channels: u8, samples: &[u8], options: EncodeOptions) -> Image {
        let bytes = encode(width, height, channels, samples, options).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn checkerboard_round_trips_losslessly() {
        let samples = [
            255, 255, 255, 255, 255, 255, // row 0: white, white
            0, 0, 0, 0, 0, 0, // row 1: black, black
        ];
        let image = round_trip(2, 2, 3, &samples, EncodeOptions::default());
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn gradient_round_trips_losslessly() {
        let mut samples = Vec::new();
        for row in [0u8, 4, 8, 16] {
            for _ in 0..4 {
                samples.extend_from_slice(&[row, row, row]);
            }
        }
        let image = round_trip(4, 4, 3, &samples, EncodeOptions::default());
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn single_pixel_image_emits_only_the_root() {
        let samples = [123u8, 45, 200];
        let bytes = encode(1, 1, 3, &samples, EncodeOptions::default()).unwrap();
        let image = decode(&bytes).unwrap();
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn uniform_image_body_is_small() {
        let samples = vec![255u8; 16 * 16 * 3];
        let bytes = encode(16, 16, 3, &samples, EncodeOptions::default()).unwrap();
        // 62-bit header + root + a handful of opcode records, nowhere near
        // one record per of the 255 non-root coefficients.
        assert!(bytes.len() < 64, "got {} bytes", bytes.len());
        let image = decode(&bytes).unwrap();
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn minimal_zero_image_round_trips() {
        let samples = [0u8; 12];
        let image = round_trip(2, 2, 3, &samples, EncodeOptions::default());
        assert_eq!(image.samples, samples);
    }

    #[test]
    fn thresholded_image_round_trips_through_the_full_pipeline() {
        let width = 4;
        let height = 4;
        let channels = 3;
        let mut samples = vec![0u8; width * height * channels];
        for (idx, s) in samples.iter_mut().enumerate() {
            *s = ((idx * 41 + 13) % 256) as u8;
        }

        let options = EncodeOptions {
            hard_threshold: 2,
            wavelet_levels: 2,
            ..EncodeOptions::default()
        };
        let bytes = encode(width as u16, height as u16, channels as u8, &samples, options).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width, width as u16);
        assert_eq!(decoded.height, height as u16);
        assert_eq!(decoded.samples.len(), samples.len());
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        let samples = [0u8; 3];
        let err = encode(0, 1, 3, &samples, EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn invalid_channel_count_is_rejected() {
        let samples = [0u8; 5];
        let err = encode(1, 1, 5, &samples, EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn malformed_header_is_reported() {
        // A full 62-bit (8-byte) all-zero header: width decodes to 0, which
        // is caught by Header::read before any further field is needed.
        let bytes = vec![0u8; 8];
        assert!(matches!(decode(&bytes), Err(CodecError::MalformedHeader(_))));
    }

    #[test]
    fn truncated_header_is_reported() {
        // Only 32 of the header's 62 bits are present; width/height decode
        // fine but the channels field runs out of stream.
        let bytes = vec![0u8; 4];
        assert!(matches!(decode(&bytes), Err(CodecError::TruncatedStream(_))));
    }
}

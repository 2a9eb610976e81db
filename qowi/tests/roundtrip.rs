use qowi::{decode, encode, EncodeOptions};

fn lossless_round_trip(width: u16, height: u16, channels: u8, samples: &[u8]) {
    let bytes = encode(width, height, channels, samples, EncodeOptions::default()).unwrap();
    let image = decode(&bytes).unwrap();
    assert_eq!(image.width, width);
    assert_eq!(image.height, height);
    assert_eq!(image.channels, channels);
    assert_eq!(image.samples, samples);
}

#[test]
fn checkerboard_2x2_is_lossless() {
    let samples = [255u8, 255, 255, 255, 255, 255, 0, 0, 0, 0, 0, 0];
    lossless_round_trip(2, 2, 3, &samples);
}

#[test]
fn gradient_4x4_is_lossless() {
    let mut samples = Vec::new();
    for row in [0u8, 4, 8, 16] {
        for _ in 0..4 {
            samples.extend_from_slice(&[row, row, row]);
        }
    }
    lossless_round_trip(4, 4, 3, &samples);
}

#[test]
fn uniform_16x16_image_has_a_compact_body() {
    let samples = vec![255u8; 16 * 16 * 3];
    let bytes = encode(16, 16, 3, &samples, EncodeOptions::default()).unwrap();
    assert!(bytes.len() < 64, "expected a compact run-dominated stream, got {} bytes", bytes.len());
    let image = decode(&bytes).unwrap();
    assert_eq!(image.samples, samples);
}

#[test]
fn single_pixel_image_needs_no_traversal() {
    let samples = [123u8, 45, 200];
    let bytes = encode(1, 1, 3, &samples, EncodeOptions::default()).unwrap();
    let image = decode(&bytes).unwrap();
    assert_eq!(image.width, 1);
    assert_eq!(image.height, 1);
    assert_eq!(image.samples, samples);
}

#[test]
fn all_zero_2x2_image_starts_with_a_run() {
    let samples = [0u8; 12];
    lossless_round_trip(2, 2, 3, &samples);
}

#[test]
fn grayscale_and_rgba_channel_counts_round_trip() {
    let gray: Vec<u8> = (0..8 * 8).map(|v| (v * 3) as u8).collect();
    lossless_round_trip(8, 8, 1, &gray);

    let rgba: Vec<u8> = (0..8 * 8 * 4).map(|v| (v * 7) as u8).collect();
    lossless_round_trip(8, 8, 4, &rgba);
}

#[test]
fn non_power_of_two_dimensions_round_trip() {
    let width = 5;
    let height = 3;
    let channels = 3;
    let samples: Vec<u8> = (0..width * height * channels).map(|v| (v * 13 + 1) as u8).collect();
    lossless_round_trip(width as u16, height as u16, channels as u8, &samples);
}

#[test]
fn natural_looking_image_under_hard_threshold_decodes() {
    let width = 8;
    let height = 8;
    let channels = 3;
    let mut samples = vec![0u8; width * height * channels];
    for (idx, s) in samples.iter_mut().enumerate() {
        let x = (idx / channels) % width;
        let y = (idx / channels) / width;
        *s = ((x * 17 + y * 29 + idx) % 256) as u8;
    }

    let options = EncodeOptions {
        hard_threshold: 2,
        wavelet_levels: 2,
        ..EncodeOptions::default()
    };
    let bytes = encode(width as u16, height as u16, channels as u8, &samples, options).unwrap();
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.samples.len(), samples.len());
}

#[test]
fn soft_threshold_decodes_to_the_right_shape() {
    let width = 8;
    let height = 8;
    let channels = 3;
    let samples = vec![200u8; width * height * channels];
    let options = EncodeOptions {
        soft_threshold: 3,
        ..EncodeOptions::default()
    };
    let bytes = encode(width as u16, height as u16, channels as u8, &samples, options).unwrap();
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.width, width as u16);
    assert_eq!(decoded.height, height as u16);
}

#[test]
fn truncated_stream_is_reported_not_panicked() {
    let samples = vec![128u8; 8 * 8 * 3];
    let bytes = encode(8, 8, 3, &samples, EncodeOptions::default()).unwrap();
    let truncated = &bytes[..bytes.len() / 2];
    assert!(decode(truncated).is_err());
}

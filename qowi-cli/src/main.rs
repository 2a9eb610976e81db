#![allow(dead_code)]

use clap::{Parser, Subcommand};
use image::{DynamicImage, GenericImageView};
use log::info;
use std::error;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use qowi::EncodeOptions;

#[derive(Debug)]
enum CliError {
    UnsupportedExtension { extension: String },
    BufferSizeMismatch { width: u32, height: u32, channels: u8 },
}

impl error::Error for CliError {}
impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnsupportedExtension { extension } => {
                write!(f, "unsupported extension {extension}")
            }
            Self::BufferSizeMismatch { width, height, channels } => write!(
                f,
                "decoded sample buffer does not match {width}x{height}x{channels}"
            ),
        }
    }
}

#[derive(Parser)]
#[command(name = "qowi")]
#[command(about = "Encode and decode QOWI (Quite OK Wavelet Image) files", long_about = None)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode an image file to a .qowi bitstream
    Encode {
        src: PathBuf,
        dst: PathBuf,

        /// Hard threshold on detail coefficients (-1 disables)
        #[arg(short = 't', long, default_value_t = -1)]
        hard: i32,

        /// Soft threshold on detail coefficients (-1 disables)
        #[arg(short, long, default_value_t = -1)]
        soft: i32,

        /// Number of wavelet levels to transform, clamped to [0, 15]
        #[arg(short, long, default_value_t = 10)]
        levels: u8,

        /// Fractional precision digits retained per level (lossy if > 0 is insufficient)
        #[arg(short, long, default_value_t = 0)]
        precision: u8,
    },
    /// Decode a .qowi bitstream back to an image file
    Decode { src: PathBuf, dst: PathBuf },
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(OsStr::to_str).unwrap_or("")
}

fn channels_of(image: &DynamicImage) -> u8 {
    image.color().channel_count()
}

fn run_encode(src: &Path, dst: &Path, hard: i32, soft: i32, levels: u8, precision: u8) -> Result<(), Box<dyn Error>> {
    let image = image::open(src)?;
    let (width, height) = image.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(qowi::CodecError::InvalidInput(format!(
            "image dimensions {width}x{height} exceed the 65535 header field width"
        ))
        .into());
    }

    let channels = channels_of(&image);
    let samples = match channels {
        1 => image.to_luma8().into_raw(),
        2 => image.to_luma_alpha8().into_raw(),
        3 => image.to_rgb8().into_raw(),
        4 => image.to_rgba8().into_raw(),
        other => {
            return Err(qowi::CodecError::InvalidInput(format!("unsupported channel count {other}")).into())
        }
    };

    let options = EncodeOptions {
        hard_threshold: hard,
        soft_threshold: soft,
        wavelet_levels: levels,
        precision_digits: precision,
        ..EncodeOptions::default()
    };

    let bytes = qowi::encode(width as u16, height as u16, channels, &samples, options)?;
    info!("encoded {width}x{height}x{channels} image into {} bytes", bytes.len());
    fs::write(dst, bytes)?;
    Ok(())
}

fn run_decode(src: &Path, dst: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(src)?;
    let decoded = qowi::decode(&bytes)?;
    info!(
        "decoded {}x{}x{} image",
        decoded.width, decoded.height, decoded.channels
    );

    let size_mismatch = || CliError::BufferSizeMismatch {
        width: decoded.width as u32,
        height: decoded.height as u32,
        channels: decoded.channels,
    };
    let image: DynamicImage = match decoded.channels {
        1 => image::GrayImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.samples)
            .ok_or_else(size_mismatch)?
            .into(),
        2 => image::GrayAlphaImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.samples)
            .ok_or_else(size_mismatch)?
            .into(),
        3 => image::RgbImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.samples)
            .ok_or_else(size_mismatch)?
            .into(),
        4 => image::RgbaImage::from_raw(decoded.width as u32, decoded.height as u32, decoded.samples)
            .ok_or_else(size_mismatch)?
            .into(),
        other => return Err(qowi::CodecError::InvalidInput(format!("unsupported channel count {other}")).into()),
    };

    image.save(dst)?;
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts = Opts::parse();
    match opts.command {
        Command::Encode { src, dst, hard, soft, levels, precision } => {
            if extension_of(&dst) != "qowi" {
                log::warn!("destination extension is not .qowi, writing anyway");
            }
            run_encode(&src, &dst, hard, soft, levels, precision)
        }
        Command::Decode { src, dst } => run_decode(&src, &dst),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(()) => Ok(()),
    }
}

//! Fixed-width 62-bit header. Grounded in `qowi/header.py::Header`.

use crate::bitstream::{BitReader, BitWriter};
use crate::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u16,
    pub height: u16,
    pub channels: u8,
    pub cache_size: u16,
    pub wavelet_levels: u8,
    pub wavelet_precision_digits: u8,
}

impl Header {
    pub fn write(&self, writer: &mut BitWriter) {
        writer.write_bits(self.width as u64, 16);
        writer.write_bits(self.height as u64, 16);
        writer.write_bits((self.channels - 1) as u64, 2);
        writer.write_bits(self.cache_size as u64, 16);
        writer.write_bits(self.wavelet_levels as u64, 4);
        writer.write_bits(self.wavelet_precision_digits as u64, 8);
    }

    pub fn read(reader: &mut BitReader) -> Result<Header, CodecError> {
        let truncated = |e: crate::bitstream::BitstreamError| CodecError::TruncatedStream(e.to_string());

        let width = reader.read_bits(16).map_err(truncated)? as u16;
        let height = reader.read_bits(16).map_err(truncated)? as u16;
        let channels = reader.read_bits(2).map_err(truncated)? as u8 + 1;
        let cache_size = reader.read_bits(16).map_err(truncated)? as u16;
        let wavelet_levels = reader.read_bits(4).map_err(truncated)? as u8;
        let wavelet_precision_digits = reader.read_bits(8).map_err(truncated)? as u8;

        if width == 0 || height == 0 {
            return Err(CodecError::MalformedHeader(format!(
                "width and height must be non-zero, got {width}x{height}"
            )));
        }

        Ok(Header {
            width,
            height,
            channels,
            cache_size,
            wavelet_levels,
            wavelet_precision_digits,
        })
    }
}

pub const HEADER_BITS: u32 = 16 + 16 + 2 + 16 + 4 + 8;

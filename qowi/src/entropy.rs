//! The four-opcode entropy coder: RUN / CACHE / DELTA / VALUE.
//!
//! Grounded in `qowi/integer_encoder.py::IntegerEncoder` and
//! `qowi/integer_decoder.py::IntegerDecoder`. Encoder and decoder carry
//! parallel state (`cache`, `last`, a run counter) the same way
//! `MqEncoder`/`MqDecoder` pair up in `jpc/src/coder.rs`.

use log::debug;

use crate::bitstream::{BitReader, BitWriter};
use crate::cache::RecencyCache;
use crate::integers::{subtract_tuples, unzigzag_tuple, zigzag_tuple};
use crate::universal;
use crate::CodecError;

const OPCODE_RUN: u64 = 0b00;
const OPCODE_CACHE: u64 = 0b01;
const OPCODE_DELTA: u64 = 0b10;
const OPCODE_VALUE: u64 = 0b11;

fn universal_code_len(value: u64) -> usize {
    let order = (value + 2).ilog2();
    (2 * order) as usize
}

enum Candidate {
    Cache(u64),
    Delta(Vec<u64>),
    Value(Vec<u64>),
}

impl Candidate {
    fn bit_len(&self) -> usize {
        2 + match self {
            Candidate::Cache(pos) => universal_code_len(*pos),
            Candidate::Delta(zz) | Candidate::Value(zz) => {
                zz.iter().map(|z| universal_code_len(*z)).sum()
            }
        }
    }

    fn write(&self, writer: &mut BitWriter) {
        match self {
            Candidate::Cache(pos) => {
                writer.write_bits(OPCODE_CACHE, 2);
                universal::encode(writer, *pos);
            }
            Candidate::Delta(zz) => {
                writer.write_bits(OPCODE_DELTA, 2);
                for z in zz {
                    universal::encode(writer, *z);
                }
            }
            Candidate::Value(zz) => {
                writer.write_bits(OPCODE_VALUE, 2);
                for z in zz {
                    universal::encode(writer, *z);
                }
            }
        }
    }
}

/// Encoder-side state machine: recency cache, last-emitted triplet, and an
/// in-progress run length.
pub struct Encoder {
    cache: RecencyCache,
    last: Vec<i64>,
    run: u64,
}

impl Encoder {
    pub fn new(cache_size: usize, channels: usize) -> Self {
        Encoder {
            cache: RecencyCache::new(cache_size, channels),
            last: vec![0i64; channels],
            run: 0,
        }
    }

    /// Encodes one triplet, possibly just extending an in-progress run.
    pub fn encode_next(&mut self, writer: &mut BitWriter, triplet: &[i64]) {
        if triplet == self.last.as_slice() {
            self.run += 1;
            return;
        }

        self.flush_run(writer);

        let cache_candidate = self
            .cache
            .index_of(triplet)
            .map(|pos| Candidate::Cache(pos as u64));
        let delta = subtract_tuples(&self.last, triplet);
        let delta_candidate = Candidate::Delta(zigzag_tuple(&delta));
        let value_candidate = Candidate::Value(zigzag_tuple(triplet));

        let mut best = &delta_candidate;
        let mut best_len = delta_candidate.bit_len();
        if value_candidate.bit_len() < best_len {
            best = &value_candidate;
            best_len = value_candidate.bit_len();
        }
        if let Some(ref c) = cache_candidate {
            if c.bit_len() <= best_len {
                best = c;
            }
        }
        best.write(writer);

        self.cache.observe(triplet);
        self.last = triplet.to_vec();
    }

    fn flush_run(&mut self, writer: &mut BitWriter) {
        if self.run > 0 {
            writer.write_bits(OPCODE_RUN, 2);
            universal::encode(writer, self.run - 1);
            debug!("flushed run of length {}", self.run);
            self.run = 0;
        }
    }

    /// Must be called after the last `encode_next` to flush any trailing run.
    pub fn finish(&mut self, writer: &mut BitWriter) {
        self.flush_run(writer);
    }
}

/// Decoder-side mirror of `Encoder`.
pub struct Decoder {
    cache: RecencyCache,
    last: Vec<i64>,
    pending_run: u64,
    channels: usize,
}

impl Decoder {
    pub fn new(cache_size: usize, channels: usize) -> Self {
        Decoder {
            cache: RecencyCache::new(cache_size, channels),
            last: vec![0i64; channels],
            pending_run: 0,
            channels,
        }
    }

    pub fn decode_next(&mut self, reader: &mut BitReader) -> Result<Vec<i64>, CodecError> {
        if self.pending_run > 0 {
            self.pending_run -= 1;
            return Ok(self.last.clone());
        }

        let opcode = reader
            .read_bits(2)
            .map_err(|e| CodecError::TruncatedStream(e.to_string()))?;

        match opcode {
            OPCODE_RUN => {
                let n = universal::decode(reader)
                    .map_err(|e| CodecError::TruncatedStream(e.to_string()))?;
                self.pending_run = n;
                Ok(self.last.clone())
            }
            OPCODE_CACHE => {
                let pos = universal::decode(reader)
                    .map_err(|e| CodecError::TruncatedStream(e.to_string()))?
                    as usize;
                let triplet = self
                    .cache
                    .at(pos)
                    .ok_or(CodecError::CacheIndexOutOfRange {
                        position: pos as u32,
                        cache_size: self.cache.len() as u32,
                    })?
                    .to_vec();
                self.cache.observe(&triplet);
                self.last = triplet.clone();
                Ok(triplet)
            }
            OPCODE_DELTA => {
                let deltas_zz = self.read_channel_codes(reader)?;
                let delta = unzigzag_tuple(&deltas_zz);
                let triplet = subtract_tuples(&self.last, &delta);
                self.cache.observe(&triplet);
                self.last = triplet.clone();
                Ok(triplet)
            }
            OPCODE_VALUE => {
                let values_zz = self.read_channel_codes(reader)?;
                let triplet = unzigzag_tuple(&values_zz);
                self.cache.observe(&triplet);
                self.last = triplet.clone();
                Ok(triplet)
            }
            _ => unreachable!("2-bit opcode can only be 0..=3"),
        }
    }

    fn read_channel_codes(&self, reader: &mut BitReader) -> Result<Vec<u64>, CodecError> {
        (0..self.channels)
            .map(|_| universal::decode(reader).map_err(|e| CodecError::TruncatedStream(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(triplets: &[Vec<i64>], channels: usize) -> Vec<Vec<i64>> {
        let mut writer = BitWriter::new();
        let mut encoder = Encoder::new(65533, channels);
        for t in triplets {
            encoder.encode_next(&mut writer, t);
        }
        encoder.finish(&mut writer);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let mut decoder = Decoder::new(65533, channels);
        (0..triplets.len())
            .map(|_| decoder.decode_next(&mut reader).unwrap())
            .collect()
    }

    #[test]
    fn round_trips_mixed_stream() {
        let triplets = vec![
            vec![0, 0, 0],
            vec![0, 0, 0],
            vec![0, 0, 0],
            vec![5, -2, 1],
            vec![5, -1, 1],
            vec![100, 100, 100],
            vec![100, 100, 100],
            vec![5, -2, 1],
        ];
        assert_eq!(round_trip(&triplets, 3), triplets);
    }

    #[test]
    fn single_repeat_does_not_need_a_run_record() {
        // Two identical triplets should still decode correctly whether or
        // not a RUN record was used to represent the second one.
        let triplets = vec![vec![9, 9, 9], vec![9, 9, 9]];
        assert_eq!(round_trip(&triplets, 3), triplets);
    }

    #[test]
    fn long_run_is_compact() {
        let mut writer = BitWriter::new();
        let mut encoder = Encoder::new(65533, 3);
        let triplets: Vec<Vec<i64>> = (0..1000).map(|_| vec![0, 0, 0]).collect();
        for t in &triplets {
            encoder.encode_next(&mut writer, t);
        }
        encoder.finish(&mut writer);
        let bytes = writer.finish();
        // one VALUE/CACHE record plus one short RUN record, nowhere near
        // 1000 * per-triplet cost
        assert!(bytes.len() < 16, "got {} bytes", bytes.len());
    }

    #[test]
    fn cache_index_out_of_range_is_reported() {
        // Hand-build a stream: opcode CACHE (01) followed by a universal
        // code for a position that cannot exist in a cache of size 1.
        let mut writer = BitWriter::new();
        writer.write_bits(OPCODE_CACHE, 2);
        universal::encode(&mut writer, 50);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let mut decoder = Decoder::new(1, 3);
        assert!(matches!(
            decoder.decode_next(&mut reader),
            Err(CodecError::CacheIndexOutOfRange { .. })
        ));
    }
}

//! TIFF and PNG predictors
//!
//! Rows are collected across `apply` calls so that a row split between two
//! input buffers is processed as a whole. PNG predictors also keep the
//! previous raw row, which the Up, Average and Paeth algorithms refer to.

use super::codec::{ByteCodec, Spill};
use super::params::{Direction, PredictorParams};
use crate::error::{Error, Result};

/// PNG per-row algorithm tags
const PNG_NONE: u8 = 0;
const PNG_SUB: u8 = 1;
const PNG_UP: u8 = 2;
const PNG_AVERAGE: u8 = 3;
const PNG_PAETH: u8 = 4;

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = i16::from(left) + i16::from(up) - i16::from(up_left);
    let pa = (p - i16::from(left)).abs();
    let pb = (p - i16::from(up)).abs();
    let pc = (p - i16::from(up_left)).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

/// Value the PNG algorithm `tag` predicts for byte `i` of `row`
fn png_prediction(tag: u8, row: &[u8], prev: &[u8], i: usize, bpp: usize) -> u8 {
    let left = if i >= bpp { row[i - bpp] } else { 0 };
    let up = prev[i];
    let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
    match tag {
        PNG_SUB => left,
        PNG_UP => up,
        PNG_AVERAGE => ((u16::from(left) + u16::from(up)) / 2) as u8,
        PNG_PAETH => paeth(left, up, up_left),
        _ => 0,
    }
}

/// Sample accessor for rows packed at 1, 2, 4, 8 or 16 bits per component
#[derive(Debug, Clone, Copy)]
struct Samples {
    bits: usize,
}

impl Samples {
    fn mask(&self) -> u16 {
        if self.bits == 16 {
            u16::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    fn count(&self, row_len: usize) -> usize {
        row_len * 8 / self.bits
    }

    fn get(&self, row: &[u8], index: usize) -> u16 {
        match self.bits {
            8 => u16::from(row[index]),
            16 => u16::from_be_bytes([row[2 * index], row[2 * index + 1]]),
            bits => {
                let offset = index * bits;
                let shift = 8 - bits - offset % 8;
                (u16::from(row[offset / 8]) >> shift) & self.mask()
            }
        }
    }

    fn set(&self, row: &mut [u8], index: usize, value: u16) {
        match self.bits {
            8 => row[index] = value as u8,
            16 => row[2 * index..2 * index + 2].copy_from_slice(&value.to_be_bytes()),
            bits => {
                let offset = index * bits;
                let shift = 8 - bits - offset % 8;
                let mask = (self.mask() as u8) << shift;
                let byte = &mut row[offset / 8];
                *byte = (*byte & !mask) | (((value as u8) << shift) & mask);
            }
        }
    }
}

/// Empty vector with room for `capacity` bytes, reporting allocation failure
fn try_alloc(capacity: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| Error::OutOfMemory { requested: capacity })?;
    Ok(buf)
}

/// Predictor encoder or decoder, one row at a time
#[derive(Debug)]
pub(crate) struct PredictorCodec {
    direction: Direction,
    params: PredictorParams,
    row_bytes: usize,
    bpp: usize,
    row: Vec<u8>,
    prev: Vec<u8>,
}

impl PredictorCodec {
    pub(crate) fn new(direction: Direction, params: &PredictorParams) -> Result<Self> {
        params.validate()?;
        let row_bytes = params.row_bytes();
        Ok(Self {
            direction,
            params: *params,
            row_bytes,
            bpp: params.pixel_bytes(),
            row: try_alloc(row_bytes.saturating_add(1))?,
            prev: {
                let mut prev = try_alloc(row_bytes)?;
                prev.resize(row_bytes, 0);
                prev
            },
        })
    }

    fn is_png(&self) -> bool {
        self.params.predictor >= 10
    }

    /// Bytes in one incoming row, including the tag byte when decoding PNG
    fn incoming_row_len(&self) -> usize {
        if self.is_png() && self.direction == Direction::Decode {
            self.row_bytes + 1
        } else {
            self.row_bytes
        }
    }

    fn process_row(&mut self, out: &mut Spill) -> Result<()> {
        match (self.params.predictor, self.direction) {
            (1, _) => out.extend(&self.row),
            (2, Direction::Decode) => {
                self.tiff_decode();
                out.extend(&self.row);
            }
            (2, Direction::Encode) => {
                self.tiff_encode();
                out.extend(&self.row);
            }
            (_, Direction::Decode) => self.png_decode(out)?,
            (_, Direction::Encode) => self.png_encode(out),
        }
        self.row.clear();
        Ok(())
    }

    fn tiff_decode(&mut self) {
        let samples = Samples {
            bits: self.params.bits_per_component as usize,
        };
        let colors = self.params.colors as usize;
        let n = samples.count(self.row.len()).min(colors * self.params.columns as usize);
        for s in colors..n {
            let value = samples.get(&self.row, s).wrapping_add(samples.get(&self.row, s - colors));
            samples.set(&mut self.row, s, value & samples.mask());
        }
    }

    fn tiff_encode(&mut self) {
        let samples = Samples {
            bits: self.params.bits_per_component as usize,
        };
        let colors = self.params.colors as usize;
        let n = samples.count(self.row.len()).min(colors * self.params.columns as usize);
        for s in (colors..n).rev() {
            let value = samples.get(&self.row, s).wrapping_sub(samples.get(&self.row, s - colors));
            samples.set(&mut self.row, s, value & samples.mask());
        }
    }

    fn png_decode(&mut self, out: &mut Spill) -> Result<()> {
        let Some((&tag, data)) = self.row.split_first() else {
            return Ok(());
        };
        if tag > PNG_PAETH {
            return Err(Error::bad_data(
                "PredictorDecode",
                format!("unknown PNG row tag {}", tag),
            ));
        }

        let mut raw = data.to_vec();
        for i in 0..raw.len() {
            let predicted = png_prediction(tag, &raw, &self.prev, i, self.bpp);
            raw[i] = raw[i].wrapping_add(predicted);
        }
        out.extend(&raw);
        self.prev[..raw.len()].copy_from_slice(&raw);
        Ok(())
    }

    fn png_encode(&mut self, out: &mut Spill) {
        let tag = match self.params.predictor {
            15 => self.optimum_tag(),
            code => code - 10,
        };
        out.push(tag);
        for i in 0..self.row.len() {
            let predicted = png_prediction(tag, &self.row, &self.prev, i, self.bpp);
            out.push(self.row[i].wrapping_sub(predicted));
        }
        let len = self.row.len();
        self.prev[..len].copy_from_slice(&self.row);
    }

    /// Tag whose residuals have the smallest sum of magnitudes
    fn optimum_tag(&self) -> u8 {
        (PNG_NONE..=PNG_PAETH)
            .min_by_key(|&tag| {
                (0..self.row.len())
                    .map(|i| {
                        let predicted = png_prediction(tag, &self.row, &self.prev, i, self.bpp);
                        u32::from((self.row[i].wrapping_sub(predicted) as i8).unsigned_abs())
                    })
                    .sum::<u32>()
            })
            .unwrap_or(PNG_NONE)
    }
}

impl ByteCodec for PredictorCodec {
    const NAME: &'static str = "Predictor";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.row.push(byte);
        if self.row.len() == self.incoming_row_len() {
            self.process_row(out)?;
        }
        Ok(())
    }

    /// A trailing partial row is processed as far as it goes
    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        if !self.row.is_empty() {
            self.process_row(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{transform, FilterSpec};

    fn spec(direction: Direction, params: PredictorParams) -> FilterSpec {
        FilterSpec::Predictor { direction, params }
    }

    fn roundtrip(params: PredictorParams, data: &[u8]) -> Vec<u8> {
        let encoded = transform(&spec(Direction::Encode, params), data).unwrap();
        transform(&spec(Direction::Decode, params), &encoded).unwrap()
    }

    #[test]
    fn test_png_up_decode() {
        let params = PredictorParams::new(12, 1, 8, 3);
        let encoded = [2, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(
            transform(&spec(Direction::Decode, params), &encoded).unwrap(),
            vec![1, 2, 3, 2, 3, 4]
        );
    }

    #[test]
    fn test_png_sub_encode() {
        let params = PredictorParams::new(11, 1, 8, 4);
        assert_eq!(
            transform(&spec(Direction::Encode, params), &[10, 20, 30, 40]).unwrap(),
            vec![1, 10, 10, 10, 10]
        );
    }

    #[test]
    fn test_png_roundtrip_all_tags() {
        let data: Vec<u8> = (0..90u32).map(|i| (i * 7 % 251) as u8).collect();
        for predictor in 10..=15 {
            let params = PredictorParams::new(predictor, 3, 8, 5);
            assert_eq!(roundtrip(params, &data), data, "predictor {}", predictor);
        }
    }

    #[test]
    fn test_png_partial_last_row() {
        let params = PredictorParams::new(14, 1, 8, 4);
        let data = [9, 8, 7, 6, 5, 4];
        assert_eq!(roundtrip(params, &data), data);
    }

    #[test]
    fn test_png_optimum_prefers_flat_residuals() {
        let params = PredictorParams::new(15, 1, 8, 6);
        let encoded = transform(&spec(Direction::Encode, params), &[5, 10, 15, 20, 25, 30]).unwrap();
        assert_eq!(encoded[0], PNG_SUB);
    }

    #[test]
    fn test_png_unknown_tag() {
        let params = PredictorParams::new(12, 1, 8, 2);
        let err = transform(&spec(Direction::Decode, params), &[7, 1, 2]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadData);
    }

    #[test]
    fn test_oversized_row_is_out_of_memory() {
        let params = PredictorParams::new(12, 255, 16, u32::MAX);
        let err = PredictorCodec::new(Direction::Decode, &params).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NoMem);
        assert!(matches!(err, Error::OutOfMemory { .. }));
    }

    #[test]
    fn test_row_bytes_rounds_up() {
        assert_eq!(PredictorParams::new(2, 3, 1, 5).row_bytes(), 2);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(PredictorParams::new(12, 255, 16, u32::MAX).row_bytes(), 2_190_433_320_450);
    }

    #[test]
    fn test_tiff_decode_8bit() {
        let params = PredictorParams::new(2, 1, 8, 4);
        assert_eq!(
            transform(&spec(Direction::Decode, params), &[10, 1, 1, 1, 5, 2, 2, 2]).unwrap(),
            vec![10, 11, 12, 13, 5, 7, 9, 11]
        );
    }

    #[test]
    fn test_tiff_roundtrip_depths() {
        let data: Vec<u8> = (0..64u32).map(|i| (i * 37 % 256) as u8).collect();
        for bits in [1, 2, 4, 8, 16] {
            let params = PredictorParams::new(2, 2, bits, 16);
            assert_eq!(roundtrip(params, &data), data, "{} bits", bits);
        }
    }

    #[test]
    fn test_tiff_rgb_distance() {
        let params = PredictorParams::new(2, 3, 8, 2);
        assert_eq!(
            transform(&spec(Direction::Encode, params), &[10, 20, 30, 11, 22, 33]).unwrap(),
            vec![10, 20, 30, 1, 2, 3]
        );
    }

    #[test]
    fn test_identity_predictor() {
        let params = PredictorParams::new(1, 1, 8, 4);
        assert_eq!(roundtrip(params, b"unchanged"), b"unchanged");
    }

    #[test]
    fn test_samples_accessors() {
        let samples = Samples { bits: 4 };
        let mut row = [0xAB, 0xCD];
        assert_eq!(samples.get(&row, 0), 0xA);
        assert_eq!(samples.get(&row, 3), 0xD);
        samples.set(&mut row, 1, 0x3);
        assert_eq!(row, [0xA3, 0xCD]);
    }
}

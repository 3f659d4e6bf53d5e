//! LZWDecode filter
//!
//! Variable-width codes (9 to 12 bits, most significant bit first) over a
//! dictionary seeded with the 256 single bytes. Code 256 clears the
//! dictionary and 257 ends the data. With early change, the code width grows
//! one code before the dictionary actually needs the extra bit.

use super::codec::{ByteCodec, Spill};
use super::params::LzwParams;
use crate::error::{Error, Result};
use std::collections::HashMap;

const CLEAR: u16 = 256;
const EOD: u16 = 257;
const FIRST_FREE: u16 = 258;
const TABLE_SIZE: u16 = 4096;
const NO_PREFIX: u16 = u16::MAX;

/// Code width the decoder uses when its next free code is `next`
fn width_for(next: u16) -> u32 {
    match next {
        2048.. => 12,
        1024.. => 11,
        512.. => 10,
        _ => 9,
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    prefix: u16,
    suffix: u8,
    first: u8,
}

/// Rebuilds the dictionary from the code stream
#[derive(Debug)]
pub(crate) struct LzwDecoder {
    early: u16,
    table: Vec<Entry>,
    next_code: u16,
    prev: Option<u16>,
    bits: u32,
    nbits: u32,
    scratch: Vec<u8>,
    eod: bool,
}

impl LzwDecoder {
    pub(crate) fn new(params: &LzwParams) -> Self {
        let mut table = Vec::with_capacity(TABLE_SIZE as usize);
        table.extend((0..=255u8).map(|b| Entry {
            prefix: NO_PREFIX,
            suffix: b,
            first: b,
        }));
        // CLEAR and EOD never appear as dictionary strings
        table.resize(
            TABLE_SIZE as usize,
            Entry {
                prefix: NO_PREFIX,
                suffix: 0,
                first: 0,
            },
        );
        Self {
            early: u16::from(params.early_change),
            table,
            next_code: FIRST_FREE,
            prev: None,
            bits: 0,
            nbits: 0,
            scratch: Vec::new(),
            eod: false,
        }
    }

    fn width(&self) -> u32 {
        width_for(self.next_code + self.early)
    }

    fn write_string(&mut self, code: u16, out: &mut Spill) {
        self.scratch.clear();
        let mut code = code;
        loop {
            let entry = self.table[code as usize];
            self.scratch.push(entry.suffix);
            if entry.prefix == NO_PREFIX {
                break;
            }
            code = entry.prefix;
        }
        self.scratch.reverse();
        out.extend(&self.scratch);
    }

    fn add(&mut self, prefix: u16, suffix: u8) {
        if self.next_code < TABLE_SIZE {
            self.table[self.next_code as usize] = Entry {
                prefix,
                suffix,
                first: self.table[prefix as usize].first,
            };
            self.next_code += 1;
        }
    }

    fn process(&mut self, code: u16, out: &mut Spill) -> Result<()> {
        match code {
            CLEAR => {
                self.next_code = FIRST_FREE;
                self.prev = None;
                return Ok(());
            }
            EOD => {
                self.eod = true;
                return Ok(());
            }
            _ => {}
        }

        match self.prev {
            None if code < CLEAR => {
                out.push(code as u8);
            }
            None => {
                return Err(Error::bad_data(
                    "LZWDecode",
                    format!("code {} before any literal", code),
                ))
            }
            Some(prev) if code < self.next_code => {
                self.write_string(code, out);
                let first = self.table[code as usize].first;
                self.add(prev, first);
            }
            Some(prev) if code == self.next_code => {
                let first = self.table[prev as usize].first;
                self.add(prev, first);
                self.write_string(code, out);
            }
            Some(_) => {
                return Err(Error::bad_data(
                    "LZWDecode",
                    format!("code {} beyond dictionary size {}", code, self.next_code),
                ))
            }
        }
        self.prev = Some(code);
        Ok(())
    }
}

impl ByteCodec for LzwDecoder {
    const NAME: &'static str = "LZWDecode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        if self.eod {
            return Ok(());
        }
        self.bits = (self.bits << 8) | u32::from(byte);
        self.nbits += 8;

        while !self.eod {
            let width = self.width();
            if self.nbits < width {
                break;
            }
            self.nbits -= width;
            let code = (self.bits >> self.nbits) as u16 & ((1 << width) - 1);
            self.bits &= (1 << self.nbits) - 1;
            self.process(code, out)?;
        }
        Ok(())
    }

    fn flush(&mut self, _out: &mut Spill) -> Result<()> {
        Ok(())
    }
}

/// Builds the dictionary from input strings and emits codes
#[derive(Debug)]
pub(crate) struct LzwEncoder {
    early: u16,
    table: HashMap<u32, u16>,
    next_code: u16,
    prefix: Option<u16>,
    /// Next free code as the decoder will see it
    decoder_next: u16,
    primed: bool,
    started: bool,
    bits: u32,
    nbits: u32,
}

impl LzwEncoder {
    pub(crate) fn new(params: &LzwParams) -> Self {
        Self {
            early: u16::from(params.early_change),
            table: HashMap::new(),
            next_code: FIRST_FREE,
            prefix: None,
            decoder_next: FIRST_FREE,
            primed: false,
            started: false,
            bits: 0,
            nbits: 0,
        }
    }

    fn put_bits(&mut self, code: u16, out: &mut Spill) {
        let width = width_for(self.decoder_next + self.early);
        self.bits = (self.bits << width) | u32::from(code);
        self.nbits += width;
        while self.nbits >= 8 {
            self.nbits -= 8;
            out.push((self.bits >> self.nbits) as u8);
        }
        self.bits &= (1 << self.nbits) - 1;
    }

    fn emit_code(&mut self, code: u16, out: &mut Spill) {
        self.put_bits(code, out);
        // The decoder adds an entry for every code but the first after a clear
        if self.primed && self.decoder_next < TABLE_SIZE {
            self.decoder_next += 1;
        }
        self.primed = true;
    }

    fn emit_clear(&mut self, out: &mut Spill) {
        self.put_bits(CLEAR, out);
        self.table.clear();
        self.next_code = FIRST_FREE;
        self.decoder_next = FIRST_FREE;
        self.primed = false;
    }

    fn start(&mut self, out: &mut Spill) {
        if !self.started {
            self.emit_clear(out);
            self.started = true;
        }
    }
}

impl ByteCodec for LzwEncoder {
    const NAME: &'static str = "LZWEncode";

    fn feed(&mut self, byte: u8, out: &mut Spill) -> Result<()> {
        self.start(out);
        let Some(prefix) = self.prefix else {
            self.prefix = Some(u16::from(byte));
            return Ok(());
        };

        let key = (u32::from(prefix) << 8) | u32::from(byte);
        if let Some(&code) = self.table.get(&key) {
            self.prefix = Some(code);
            return Ok(());
        }

        self.emit_code(prefix, out);
        self.table.insert(key, self.next_code);
        self.next_code += 1;
        if self.next_code == TABLE_SIZE {
            self.emit_clear(out);
        }
        self.prefix = Some(u16::from(byte));
        Ok(())
    }

    fn flush(&mut self, out: &mut Spill) -> Result<()> {
        self.start(out);
        if let Some(prefix) = self.prefix.take() {
            self.emit_code(prefix, out);
        }
        self.put_bits(EOD, out);
        if self.nbits > 0 {
            out.push((self.bits << (8 - self.nbits)) as u8);
            self.bits = 0;
            self.nbits = 0;
        }
        Ok(())
    }
}

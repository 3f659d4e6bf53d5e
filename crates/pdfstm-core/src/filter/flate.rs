//! FlateDecode (zlib/deflate) filter
//!
//! The deflate context buffers internally; this codec only tracks how much of
//! each buffer the context consumed and produced.

use super::params::{Direction, FlateParams};
use super::FilterStatus;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

enum Context {
    Deflate(Compress),
    Inflate(Decompress),
}

/// Streaming zlib compressor or decompressor
pub(crate) struct FlateCodec {
    context: Context,
    done: bool,
}

impl FlateCodec {
    pub(crate) fn new(direction: Direction, params: &FlateParams) -> Result<Self> {
        if params.level > 9 {
            return Err(Error::invalid_parameter(
                "FlateDecode",
                format!("compression level {} is not in 0..=9", params.level),
            ));
        }
        let context = match direction {
            Direction::Encode => Context::Deflate(Compress::new(Compression::new(params.level), true)),
            Direction::Decode => Context::Inflate(Decompress::new(true)),
        };
        Ok(Self {
            context,
            done: false,
        })
    }

    pub(crate) fn apply(
        &mut self,
        input: &mut Buffer,
        output: &mut Buffer,
        finish: bool,
    ) -> Result<FilterStatus> {
        match &mut self.context {
            Context::Deflate(ctx) => deflate(ctx, &mut self.done, input, output, finish),
            Context::Inflate(ctx) => inflate(ctx, &mut self.done, input, output, finish),
        }
    }
}

fn deflate(
    ctx: &mut Compress,
    done: &mut bool,
    input: &mut Buffer,
    output: &mut Buffer,
    finish: bool,
) -> Result<FilterStatus> {
    loop {
        if *done {
            if !input.is_empty() {
                return Err(Error::filter("FlateEncode", "input supplied after finish"));
            }
            return Ok(FilterStatus::Done);
        }
        if output.free() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }
        if input.is_empty() && !finish {
            return Ok(FilterStatus::NeedInput);
        }

        let flush = if finish {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };
        let (in_before, out_before) = (ctx.total_in(), ctx.total_out());
        let status = ctx
            .compress(input.unread(), output.spare_mut(), flush)
            .map_err(|e| Error::filter("FlateEncode", e.to_string()))?;
        let consumed = (ctx.total_in() - in_before) as usize;
        let produced = (ctx.total_out() - out_before) as usize;
        input.consume(consumed);
        output.commit(produced);

        match status {
            Status::StreamEnd => *done = true,
            _ if consumed == 0 && produced == 0 && output.free() > 0 => {
                return Err(Error::filter("FlateEncode", "compressor made no progress"));
            }
            _ => {}
        }
    }
}

fn inflate(
    ctx: &mut Decompress,
    done: &mut bool,
    input: &mut Buffer,
    output: &mut Buffer,
    finish: bool,
) -> Result<FilterStatus> {
    loop {
        if *done {
            // Bytes after the end of the zlib stream are discarded
            input.consume(input.available());
            return Ok(if finish {
                FilterStatus::Done
            } else {
                FilterStatus::NeedInput
            });
        }
        if output.free() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }

        let was_empty = input.is_empty();
        let (in_before, out_before) = (ctx.total_in(), ctx.total_out());
        let status = ctx
            .decompress(input.unread(), output.spare_mut(), FlushDecompress::None)
            .map_err(|e| Error::bad_data("FlateDecode", e.to_string()))?;
        let consumed = (ctx.total_in() - in_before) as usize;
        let produced = (ctx.total_out() - out_before) as usize;
        input.consume(consumed);
        output.commit(produced);

        if status == Status::StreamEnd {
            *done = true;
            continue;
        }
        if consumed == 0 && produced == 0 && output.free() > 0 {
            if !was_empty {
                return Err(Error::bad_data("FlateDecode", "decompressor made no progress"));
            }
            if finish {
                return Err(Error::bad_data("FlateDecode", "truncated stream"));
            }
            return Ok(FilterStatus::NeedInput);
        }
    }
}

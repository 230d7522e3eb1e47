//! A whitespace interpreter.
//!
//! Sources are decoded by an incremental state machine into a [`Program`], which a stack based
//! [`Vm`] then executes against runtime input and output streams.

pub mod source;
pub mod ws;

pub use source::{Source, SourceError};
pub use ws::{
    decode, decode_with, DecodeError, Decoder, DecoderConfig, Heap, HeapPolicy, ImpKind,
    Instruction, Label, LineEndings, Program, Vm, VmConfig, VmError,
};

use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("runtime error: {0}")]
    Vm(#[from] VmError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Decodes `source` and runs it to completion.
///
/// Nothing executes unless the whole source decodes.
pub fn interpret<R: BufRead, W: Write>(
    source: &[u8],
    decoder: DecoderConfig,
    vm: VmConfig,
    input: R,
    output: W,
) -> Result<W, Error> {
    let program = decode_with(source, decoder)?;
    let mut vm = Vm::new(program, vm, input, output);
    vm.run()?;

    Ok(vm.into_output())
}

pub mod decoder;
pub mod heap;
pub mod instruction;
pub mod trace;
pub mod vm;

pub use decoder::{
    decode, decode_with, DecodeError, Decoder, DecoderConfig, Instructions, LineEndings,
};
pub use heap::{Heap, HeapPolicy};
pub use instruction::{ImpKind, Instruction, Label, Program};
pub use vm::{Vm, VmConfig, VmError};

//! Human readable dumps of a decoded program and of live machine state.

use crate::ws::heap::Heap;
use crate::ws::instruction::{Instruction, Program};
use std::io::{self, Write};

/// Writes the instruction listing followed by the label table, ordered by target index
pub fn program<W: Write>(out: &mut W, program: &Program) -> io::Result<()> {
    for (index, instr) in program.instructions().iter().enumerate() {
        writeln!(out, "{:>6}  {}", index, instr)?;
    }

    let mut labels: Vec<_> = program.labels().iter().collect();
    labels.sort_by_key(|(_, index)| **index);
    writeln!(out, "labels: {}", labels.len())?;
    for (label, index) in labels {
        writeln!(out, "  L{} -> {}", label, index)?;
    }

    Ok(())
}

/// Writes the instruction about to execute together with both stacks
pub fn step<W: Write>(
    out: &mut W,
    ip: usize,
    instr: &Instruction,
    stack: &[i64],
    call_stack: &[usize],
) -> io::Result<()> {
    writeln!(
        out,
        "[{:>6}] {:<16} stack: {:?} calls: {:?}",
        ip,
        instr.to_string(),
        stack,
        call_stack
    )
}

pub fn heap<W: Write>(out: &mut W, heap: &Heap) -> io::Result<()> {
    writeln!(out, "heap: {:?}", heap.snapshot())
}

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

pub const SPACE: u8 = b' ';
pub const TAB: u8 = b'\t';
pub const LINE_FEED: u8 = b'\n';
pub const CARRIAGE_RETURN: u8 = b'\r';

/// The instruction family selected by the first one or two tokens of an instruction
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ImpKind {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    IO,
}

impl Display for ImpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImpKind::Stack => "stack",
            ImpKind::Arithmetic => "arithmetic",
            ImpKind::Heap => "heap",
            ImpKind::Flow => "flow",
            ImpKind::IO => "io",
        };
        f.write_str(name)
    }
}

/// Identifier of a jump or call target.
///
/// The value is the unbounded integer formed by a leading 1 bit followed by the label's bits,
/// stored as little-endian 64-bit limbs. Two labels are the same exactly when their bit strings
/// are, which includes leading zero bits and the empty label.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct Label {
    limbs: Arc<[u64]>,
}

impl Label {
    /// Builds a label from its bits, most significant first
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Label {
        let mut builder = LabelBuilder::new();
        for bit in bits {
            builder.push_bit(bit);
        }
        builder.finish()
    }

    /// The label value if it fits into 64 bits.
    pub fn value(&self) -> Option<u64> {
        match *self.limbs {
            [value] => Some(value),
            _ => None,
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = self.value() {
            return write!(f, "{}", value);
        }
        let mut limbs = self.limbs.iter().rev();
        if let Some(top) = limbs.next() {
            write!(f, "{:#x}", top)?;
        }
        for limb in limbs {
            write!(f, "{:016x}", limb)?;
        }
        Ok(())
    }
}

/// Accumulates label bits one at a time while the decoder is in the operand stage
#[derive(Debug, Clone)]
pub(crate) struct LabelBuilder {
    limbs: Vec<u64>,
}

impl LabelBuilder {
    pub(crate) fn new() -> LabelBuilder {
        LabelBuilder { limbs: vec![1] }
    }

    pub(crate) fn push_bit(&mut self, bit: bool) {
        let mut carry = bit as u64;
        for limb in self.limbs.iter_mut() {
            let next = *limb >> 63;
            *limb = (*limb << 1) | carry;
            carry = next;
        }
        if carry != 0 {
            self.limbs.push(carry);
        }
    }

    pub(crate) fn finish(self) -> Label {
        Label {
            limbs: self.limbs.into(),
        }
    }
}

/// A single decoded instruction. Operands live inside the variants.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    Push(i64),
    Duplicate,
    Copy(i64),
    Swap,
    Discard,
    Slide(i64),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Store,
    Retrieve,
    Mark(Label),
    Call(Label),
    Jump(Label),
    JumpIfZero(Label),
    JumpIfNegative(Label),
    Return,
    End,
    OutChar,
    OutNum,
    InChar,
    InNum,
}

impl Instruction {
    pub fn imp(&self) -> ImpKind {
        match self {
            Instruction::Push(_)
            | Instruction::Duplicate
            | Instruction::Copy(_)
            | Instruction::Swap
            | Instruction::Discard
            | Instruction::Slide(_) => ImpKind::Stack,
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod => ImpKind::Arithmetic,
            Instruction::Store | Instruction::Retrieve => ImpKind::Heap,
            Instruction::Mark(_)
            | Instruction::Call(_)
            | Instruction::Jump(_)
            | Instruction::JumpIfZero(_)
            | Instruction::JumpIfNegative(_)
            | Instruction::Return
            | Instruction::End => ImpKind::Flow,
            Instruction::OutChar
            | Instruction::OutNum
            | Instruction::InChar
            | Instruction::InNum => ImpKind::IO,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Push(_) => "push",
            Instruction::Duplicate => "dup",
            Instruction::Copy(_) => "copy",
            Instruction::Swap => "swap",
            Instruction::Discard => "discard",
            Instruction::Slide(_) => "slide",
            Instruction::Add => "add",
            Instruction::Sub => "sub",
            Instruction::Mul => "mul",
            Instruction::Div => "div",
            Instruction::Mod => "mod",
            Instruction::Store => "store",
            Instruction::Retrieve => "retrieve",
            Instruction::Mark(_) => "mark",
            Instruction::Call(_) => "call",
            Instruction::Jump(_) => "jump",
            Instruction::JumpIfZero(_) => "jz",
            Instruction::JumpIfNegative(_) => "jn",
            Instruction::Return => "ret",
            Instruction::End => "end",
            Instruction::OutChar => "outc",
            Instruction::OutNum => "outn",
            Instruction::InChar => "inc",
            Instruction::InNum => "inn",
        }
    }

    /// The label this instruction declares or targets, if any
    pub fn label(&self) -> Option<&Label> {
        match self {
            Instruction::Mark(label)
            | Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpIfZero(label)
            | Instruction::JumpIfNegative(label) => Some(label),
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(n) | Instruction::Copy(n) | Instruction::Slide(n) => {
                write!(f, "{} {}", self.mnemonic(), n)
            }
            _ => match self.label() {
                Some(label) => write!(f, "{} L{}", self.mnemonic(), label),
                None => f.write_str(self.mnemonic()),
            },
        }
    }
}

/// A fully decoded program: the instruction sequence and its label table
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<Label, usize>,
}

impl Program {
    /// Creates a program from already decoded instructions, registering every mark.
    ///
    /// A label marked more than once resolves to its last mark.
    pub fn new(instructions: Vec<Instruction>) -> Program {
        let mut program = Program::default();
        for instr in instructions {
            program.push(instr);
        }
        program
    }

    pub(crate) fn push(&mut self, instr: Instruction) {
        if let Instruction::Mark(label) = &instr {
            self.labels.insert(label.clone(), self.instructions.len());
        }
        self.instructions.push(instr);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &HashMap<Label, usize> {
        &self.labels
    }

    /// Returns the index of the mark instruction registered for `label`
    pub fn resolve(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

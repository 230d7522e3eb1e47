use crate::ws::heap::{Heap, HeapPolicy};
use crate::ws::instruction::{Instruction, Label, Program};
use crate::ws::trace;
use std::io::{self, stderr, stdin, stdout, BufRead, Read, StdinLock, Stdout, Write};
use thiserror::Error;

/// Runtime errors. Each one stops the program; `at` is the index of the failing instruction.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow at instruction {at}")]
    StackUnderflow { at: usize },

    #[error("copy index {index} out of range (stack depth {depth}) at instruction {at}")]
    CopyOutOfRange { at: usize, index: i64, depth: usize },

    #[error("negative slide count {count} at instruction {at}")]
    InvalidSlide { at: usize, count: i64 },

    #[error("division by zero at instruction {at}")]
    DivisionByZero { at: usize },

    #[error("heap address {addr} read before it was written at instruction {at}")]
    HeapKeyError { at: usize, addr: i64 },

    #[error("return with empty call stack at instruction {at}")]
    CallStackUnderflow { at: usize },

    #[error("label L{label} is not marked, referenced at instruction {at}")]
    UnknownLabel { at: usize, label: Label },

    #[error("{value} is not a character, output at instruction {at}")]
    InvalidCharacter { at: usize, value: i64 },

    #[error("input exhausted at instruction {at}")]
    InputExhausted { at: usize },

    #[error("cannot parse {input:?} as a number at instruction {at}")]
    InvalidNumber { at: usize, input: String },

    #[error("i/o failure at instruction {at}: {source}")]
    Io {
        at: usize,
        #[source]
        source: io::Error,
    },
}

impl VmError {
    /// Index of the instruction that failed
    pub fn at(&self) -> usize {
        match self {
            VmError::StackUnderflow { at }
            | VmError::CopyOutOfRange { at, .. }
            | VmError::InvalidSlide { at, .. }
            | VmError::DivisionByZero { at }
            | VmError::HeapKeyError { at, .. }
            | VmError::CallStackUnderflow { at }
            | VmError::UnknownLabel { at, .. }
            | VmError::InvalidCharacter { at, .. }
            | VmError::InputExhausted { at }
            | VmError::InvalidNumber { at, .. }
            | VmError::Io { at, .. } => *at,
        }
    }
}

/// Configuration options for the virtual machine
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct VmConfig {
    pub heap_policy: HeapPolicy,
    pub debug: bool,
    pub debug_heap: bool,
}

impl VmConfig {
    /// Creates a new machine config with the given arguments
    ///
    /// - `heap_policy` what reading an unwritten heap address yields
    /// - `debug` print the instruction and both stacks to stderr before each instruction
    /// - `debug_heap` print a heap dump to stderr before each instruction
    pub fn new(heap_policy: HeapPolicy, debug: bool, debug_heap: bool) -> VmConfig {
        VmConfig {
            heap_policy,
            debug,
            debug_heap,
        }
    }

    /// Returns the default configuration with unwritten heap cells reading as zero
    pub fn zero_heap() -> VmConfig {
        VmConfig::default().heap_policy(HeapPolicy::ZeroFill)
    }

    /// Returns the default configuration with instruction tracing
    pub fn debug() -> VmConfig {
        VmConfig {
            debug: true,
            ..VmConfig::default()
        }
    }

    /// Returns the default configuration with instruction tracing and heap dumps
    pub fn debug_heap() -> VmConfig {
        VmConfig {
            debug: true,
            debug_heap: true,
            ..VmConfig::default()
        }
    }

    pub fn heap_policy(mut self, heap_policy: HeapPolicy) -> VmConfig {
        self.heap_policy = heap_policy;
        self
    }
}

enum Flow {
    Next,
    Goto(usize),
    Halt,
}

/// The root component for the virtual machine
#[derive(Debug)]
pub struct Vm<R, W> {
    config: VmConfig,
    program: Program,
    stack: Vec<i64>,
    call_stack: Vec<usize>,
    heap: Heap,
    instruction_pointer: usize,
    done: bool,
    input: R,
    output: W,
}

impl Vm<StdinLock<'static>, Stdout> {
    /// Creates a machine wired to the process' standard input and output
    pub fn stdio(program: Program, config: VmConfig) -> Self {
        Vm::new(program, config, stdin().lock(), stdout())
    }
}

impl<R: BufRead, W: Write> Vm<R, W> {
    /// Creates a new machine for a decoded program
    ///
    /// - `program` the instructions and label table to execute
    /// - `config` the configuration of the machine
    /// - `input` the stream read by character and number input
    /// - `output` the stream character and number output is written to
    pub fn new(program: Program, config: VmConfig, input: R, output: W) -> Vm<R, W> {
        Vm {
            config,
            program,
            stack: vec![],
            call_stack: vec![],
            heap: Heap::new(config.heap_policy),
            instruction_pointer: 0,
            done: false,
            input,
            output,
        }
    }

    /// Returns the next instruction to be executed in a `Some` variant. None if the program has
    /// reached its end.
    pub fn next_instruction(&self) -> Option<usize> {
        if self.done || self.instruction_pointer >= self.program.len() {
            return None;
        }

        Some(self.instruction_pointer)
    }

    /// Executes all instructions - runs the program.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.step()? {}

        Ok(())
    }

    /// Executes a single instruction. Returns false once there is nothing left to execute.
    ///
    /// An error halts the machine; later calls return `Ok(false)`.
    pub fn step(&mut self) -> Result<bool, VmError> {
        let ip = match self.next_instruction() {
            Some(ip) => ip,
            None => return Ok(false),
        };
        match self.exec(ip) {
            Ok(Flow::Next) => self.instruction_pointer = ip + 1,
            Ok(Flow::Goto(target)) => self.instruction_pointer = target,
            Ok(Flow::Halt) => self.done = true,
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        }

        Ok(self.next_instruction().is_some())
    }

    /// Resets the internal machine state without re-decoding the program
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.heap.clear();
        self.instruction_pointer = 0;
        self.done = false;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    pub fn is_halted(&self) -> bool {
        self.next_instruction().is_none()
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn pop(&mut self, at: usize) -> Result<i64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow { at })
    }

    fn require(&self, depth: usize, at: usize) -> Result<(), VmError> {
        if self.stack.len() < depth {
            return Err(VmError::StackUnderflow { at });
        }

        Ok(())
    }

    fn target(&self, label: &Label, at: usize) -> Result<usize, VmError> {
        self.program
            .resolve(label)
            .ok_or_else(|| VmError::UnknownLabel {
                at,
                label: label.clone(),
            })
    }

    fn binary<F>(&mut self, at: usize, op: F) -> Result<Flow, VmError>
    where
        F: FnOnce(i64, i64) -> Result<i64, VmError>,
    {
        self.require(2, at)?;
        let right = self.pop(at)?;
        let left = self.pop(at)?;
        self.stack.push(op(left, right)?);

        Ok(Flow::Next)
    }

    fn write_output(&mut self, at: usize, text: std::fmt::Arguments) -> Result<(), VmError> {
        self.output
            .write_fmt(text)
            .and_then(|_| self.output.flush())
            .map_err(|source| VmError::Io { at, source })
    }

    fn trace(&self, ip: usize, instr: &Instruction) -> io::Result<()> {
        let mut err = stderr().lock();
        if self.config.debug {
            trace::step(&mut err, ip, instr, &self.stack, &self.call_stack)?;
        }
        if self.config.debug_heap {
            trace::heap(&mut err, &self.heap)?;
        }

        Ok(())
    }

    fn exec(&mut self, at: usize) -> Result<Flow, VmError> {
        let instr = match self.program.get(at) {
            Some(instr) => instr.clone(),
            None => return Ok(Flow::Halt),
        };
        if self.config.debug || self.config.debug_heap {
            self.trace(at, &instr)
                .map_err(|source| VmError::Io { at, source })?;
        }

        match instr {
            Instruction::Push(val) => self.stack.push(val),
            Instruction::Duplicate => {
                let top = *self.stack.last().ok_or(VmError::StackUnderflow { at })?;
                self.stack.push(top);
            }
            Instruction::Copy(index) => {
                let depth = self.stack.len();
                let slot = usize::try_from(index)
                    .ok()
                    .filter(|index| *index < depth)
                    .ok_or(VmError::CopyOutOfRange { at, index, depth })?;
                self.stack.push(self.stack[depth - 1 - slot]);
            }
            Instruction::Swap => {
                self.require(2, at)?;
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            Instruction::Discard => {
                self.pop(at)?;
            }
            Instruction::Slide(count) => {
                let slide =
                    usize::try_from(count).map_err(|_| VmError::InvalidSlide { at, count })?;
                if slide >= self.stack.len() {
                    return Err(VmError::StackUnderflow { at });
                }
                let top = self.pop(at)?;
                self.stack.truncate(self.stack.len() - slide);
                self.stack.push(top);
            }
            Instruction::Add => return self.binary(at, |a, b| Ok(a.wrapping_add(b))),
            Instruction::Sub => return self.binary(at, |a, b| Ok(a.wrapping_sub(b))),
            Instruction::Mul => return self.binary(at, |a, b| Ok(a.wrapping_mul(b))),
            Instruction::Div => {
                return self.binary(at, |a, b| match b {
                    0 => Err(VmError::DivisionByZero { at }),
                    _ => Ok(a.wrapping_div(b)),
                })
            }
            // truncating: the result takes the sign of the dividend
            Instruction::Mod => {
                return self.binary(at, |a, b| match b {
                    0 => Err(VmError::DivisionByZero { at }),
                    _ => Ok(a.wrapping_rem(b)),
                })
            }
            Instruction::Store => {
                self.require(2, at)?;
                let val = self.pop(at)?;
                let addr = self.pop(at)?;
                self.heap.store(addr, val);
            }
            Instruction::Retrieve => {
                let addr = self.pop(at)?;
                let val = self
                    .heap
                    .retrieve(addr)
                    .ok_or(VmError::HeapKeyError { at, addr })?;
                self.stack.push(val);
            }
            Instruction::Mark(_) => {}
            Instruction::Call(label) => {
                let target = self.target(&label, at)?;
                self.call_stack.push(at + 1);
                return Ok(Flow::Goto(target));
            }
            Instruction::Jump(label) => return Ok(Flow::Goto(self.target(&label, at)?)),
            Instruction::JumpIfZero(label) => {
                if self.pop(at)? == 0 {
                    return Ok(Flow::Goto(self.target(&label, at)?));
                }
            }
            Instruction::JumpIfNegative(label) => {
                if self.pop(at)? < 0 {
                    return Ok(Flow::Goto(self.target(&label, at)?));
                }
            }
            Instruction::Return => {
                let ret = self
                    .call_stack
                    .pop()
                    .ok_or(VmError::CallStackUnderflow { at })?;
                return Ok(Flow::Goto(ret));
            }
            Instruction::End => return Ok(Flow::Halt),
            Instruction::OutChar => {
                let value = self.pop(at)?;
                let character = u32::try_from(value)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(VmError::InvalidCharacter { at, value })?;
                self.write_output(at, format_args!("{}", character))?;
            }
            Instruction::OutNum => {
                let value = self.pop(at)?;
                self.write_output(at, format_args!("{}", value))?;
            }
            Instruction::InChar => {
                let character = read_char(&mut self.input)
                    .map_err(|source| VmError::Io { at, source })?
                    .ok_or(VmError::InputExhausted { at })?;
                let addr = self.pop(at)?;
                self.heap.store(addr, character as i64);
            }
            Instruction::InNum => {
                let mut line = String::new();
                let read = self
                    .input
                    .read_line(&mut line)
                    .map_err(|source| VmError::Io { at, source })?;
                if read == 0 {
                    return Err(VmError::InputExhausted { at });
                }
                let trimmed = line.trim();
                let num = trimmed.parse::<i64>().map_err(|_| VmError::InvalidNumber {
                    at,
                    input: trimmed.to_string(),
                })?;
                let addr = self.pop(at)?;
                self.heap.store(addr, num);
            }
        }

        Ok(Flow::Next)
    }
}

/// Reads a single UTF-8 encoded character, `None` at end of input
fn read_char<R: Read>(input: &mut R) -> io::Result<Option<char>> {
    let mut buf = [0u8; 4];
    if input.read(&mut buf[..1])? == 0 {
        return Ok(None);
    }
    let width = match buf[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 0,
    };
    if width > 1 {
        input.read_exact(&mut buf[1..width])?;
    }

    std::str::from_utf8(&buf[..width])
        .ok()
        .and_then(|s| s.chars().next())
        .map(Some)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "input is not valid utf-8"))
}

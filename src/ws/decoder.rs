//! Incremental decoder turning the three significant characters into instructions.
//!
//! The decoder is a push-style state machine: every source byte is fed through [`Decoder::feed`],
//! which yields a complete [`Instruction`] whenever one is finished. Bytes other than space, tab,
//! carriage return and line feed are skipped without touching the state.

use crate::ws::instruction::{
    ImpKind, Instruction, Label, LabelBuilder, Program, CARRIAGE_RETURN, LINE_FEED, SPACE, TAB,
};
use std::fmt::{self, Display};
use thiserror::Error;

/// Errors raised while decoding. Decoding stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The tokens following an instruction family select no command.
    #[error("invalid {imp} command `{sequence}` at offset {offset} (instruction {instruction})")]
    InvalidCommand {
        imp: ImpKind,
        sequence: String,
        offset: usize,
        instruction: usize,
    },

    /// A numeric operand started with a line terminator instead of a sign.
    #[error("number without sign at offset {offset} (instruction {instruction})")]
    MissingSign { offset: usize, instruction: usize },

    /// A numeric operand does not fit into a signed 64 bit integer.
    #[error("number overflows 64 bits at offset {offset} (instruction {instruction})")]
    NumberOverflow { offset: usize, instruction: usize },

    /// The source ended in the middle of an instruction.
    #[error("unexpected end of input in {stage} at offset {offset} (instruction {instruction})")]
    UnexpectedEof {
        stage: &'static str,
        offset: usize,
        instruction: usize,
    },
}

/// How carriage returns count as line terminators
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LineEndings {
    /// LF, CR and CR LF are each a single terminator
    #[default]
    Collapse,
    /// CR and LF are terminators on their own, so CR LF counts twice
    PerByte,
}

/// Configuration options for the decoder
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct DecoderConfig {
    pub line_endings: LineEndings,
}

impl DecoderConfig {
    pub fn per_byte() -> DecoderConfig {
        DecoderConfig {
            line_endings: LineEndings::PerByte,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Token {
    Space,
    Tab,
    LineFeed,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Token::Space => 'S',
            Token::Tab => 'T',
            Token::LineFeed => 'L',
        };
        write!(f, "{}", c)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum NumberOp {
    Push,
    Copy,
    Slide,
}

impl NumberOp {
    fn build(self, n: i64) -> Instruction {
        match self {
            NumberOp::Push => Instruction::Push(n),
            NumberOp::Copy => Instruction::Copy(n),
            NumberOp::Slide => Instruction::Slide(n),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum LabelOp {
    Mark,
    Call,
    Jump,
    JumpIfZero,
    JumpIfNegative,
}

impl LabelOp {
    fn build(self, label: Label) -> Instruction {
        match self {
            LabelOp::Mark => Instruction::Mark(label),
            LabelOp::Call => Instruction::Call(label),
            LabelOp::Jump => Instruction::Jump(label),
            LabelOp::JumpIfZero => Instruction::JumpIfZero(label),
            LabelOp::JumpIfNegative => Instruction::JumpIfNegative(label),
        }
    }
}

#[derive(Debug, Clone)]
enum Stage {
    Imp {
        after_tab: bool,
    },
    Command {
        imp: ImpKind,
        first: Option<Token>,
    },
    Number {
        op: NumberOp,
        negative: Option<bool>,
        magnitude: u64,
    },
    Label {
        op: LabelOp,
        bits: LabelBuilder,
    },
}

impl Stage {
    fn start() -> Stage {
        Stage::Imp { after_tab: false }
    }

    fn name(&self) -> &'static str {
        match self {
            Stage::Imp { .. } => "instruction family",
            Stage::Command { .. } => "command",
            Stage::Number { .. } => "number",
            Stage::Label { .. } => "label",
        }
    }

    fn is_start(&self) -> bool {
        matches!(self, Stage::Imp { after_tab: false })
    }
}

enum Selection {
    Pending,
    Complete(Instruction),
    Number(NumberOp),
    Label(LabelOp),
    Invalid,
}

fn select(imp: ImpKind, first: Option<Token>, token: Token) -> Selection {
    use Token::{LineFeed, Space, Tab};
    match (imp, first, token) {
        (ImpKind::Stack, None, Space) => Selection::Number(NumberOp::Push),
        (ImpKind::Stack, None, _) => Selection::Pending,
        (ImpKind::Stack, Some(LineFeed), Space) => Selection::Complete(Instruction::Duplicate),
        (ImpKind::Stack, Some(LineFeed), Tab) => Selection::Complete(Instruction::Swap),
        (ImpKind::Stack, Some(LineFeed), LineFeed) => Selection::Complete(Instruction::Discard),
        (ImpKind::Stack, Some(Tab), Space) => Selection::Number(NumberOp::Copy),
        (ImpKind::Stack, Some(Tab), LineFeed) => Selection::Number(NumberOp::Slide),

        (ImpKind::Arithmetic, None, Space | Tab) => Selection::Pending,
        (ImpKind::Arithmetic, Some(Space), Space) => Selection::Complete(Instruction::Add),
        (ImpKind::Arithmetic, Some(Space), Tab) => Selection::Complete(Instruction::Sub),
        (ImpKind::Arithmetic, Some(Space), LineFeed) => Selection::Complete(Instruction::Mul),
        (ImpKind::Arithmetic, Some(Tab), Space) => Selection::Complete(Instruction::Div),
        (ImpKind::Arithmetic, Some(Tab), Tab) => Selection::Complete(Instruction::Mod),

        (ImpKind::Heap, None, Space) => Selection::Complete(Instruction::Store),
        (ImpKind::Heap, None, Tab) => Selection::Complete(Instruction::Retrieve),

        (ImpKind::Flow, None, _) => Selection::Pending,
        (ImpKind::Flow, Some(Space), Space) => Selection::Label(LabelOp::Mark),
        (ImpKind::Flow, Some(Space), Tab) => Selection::Label(LabelOp::Call),
        (ImpKind::Flow, Some(Space), LineFeed) => Selection::Label(LabelOp::Jump),
        (ImpKind::Flow, Some(Tab), Space) => Selection::Label(LabelOp::JumpIfZero),
        (ImpKind::Flow, Some(Tab), Tab) => Selection::Label(LabelOp::JumpIfNegative),
        (ImpKind::Flow, Some(Tab), LineFeed) => Selection::Complete(Instruction::Return),
        (ImpKind::Flow, Some(LineFeed), LineFeed) => Selection::Complete(Instruction::End),

        (ImpKind::IO, None, Space | Tab) => Selection::Pending,
        (ImpKind::IO, Some(Space), Space) => Selection::Complete(Instruction::OutChar),
        (ImpKind::IO, Some(Space), Tab) => Selection::Complete(Instruction::OutNum),
        (ImpKind::IO, Some(Tab), Space) => Selection::Complete(Instruction::InChar),
        (ImpKind::IO, Some(Tab), Tab) => Selection::Complete(Instruction::InNum),

        _ => Selection::Invalid,
    }
}

enum Transition {
    Stay(Stage),
    Emit(Instruction),
}

/// The component responsible for turning source bytes into instructions
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
    stage: Stage,
    offset: usize,
    decoded: usize,
    after_cr: bool,
}

impl Default for Decoder {
    fn default() -> Decoder {
        Decoder::new(DecoderConfig::default())
    }
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Decoder {
        Decoder {
            config,
            stage: Stage::start(),
            offset: 0,
            decoded: 0,
            after_cr: false,
        }
    }

    /// Number of bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of instructions completed so far
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// True when no instruction is partially decoded
    pub fn is_idle(&self) -> bool {
        self.stage.is_start()
    }

    /// Feeds one source byte, returning the instruction it completes, if any.
    ///
    /// After an error the partial instruction is dropped and the decoder starts over at the
    /// instruction family stage.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Instruction>, DecodeError> {
        let offset = self.offset;
        self.offset += 1;
        let token = match self.token(byte) {
            Some(token) => token,
            None => return Ok(None),
        };

        let stage = std::mem::replace(&mut self.stage, Stage::start());
        match self.advance(stage, token, offset)? {
            Transition::Stay(stage) => {
                self.stage = stage;
                Ok(None)
            }
            Transition::Emit(instr) => {
                self.decoded += 1;
                Ok(Some(instr))
            }
        }
    }

    /// Signals the end of the source. Fails if an instruction is incomplete.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.is_idle() {
            return Ok(());
        }

        Err(DecodeError::UnexpectedEof {
            stage: self.stage.name(),
            offset: self.offset,
            instruction: self.decoded,
        })
    }

    fn token(&mut self, byte: u8) -> Option<Token> {
        let after_cr = std::mem::replace(&mut self.after_cr, byte == CARRIAGE_RETURN);
        match byte {
            SPACE => Some(Token::Space),
            TAB => Some(Token::Tab),
            CARRIAGE_RETURN => Some(Token::LineFeed),
            LINE_FEED if after_cr && self.config.line_endings == LineEndings::Collapse => None,
            LINE_FEED => Some(Token::LineFeed),
            _ => None,
        }
    }

    fn advance(
        &self,
        stage: Stage,
        token: Token,
        offset: usize,
    ) -> Result<Transition, DecodeError> {
        let transition = match stage {
            Stage::Imp { after_tab: false } => match token {
                Token::Space => Transition::Stay(Stage::Command {
                    imp: ImpKind::Stack,
                    first: None,
                }),
                Token::Tab => Transition::Stay(Stage::Imp { after_tab: true }),
                Token::LineFeed => Transition::Stay(Stage::Command {
                    imp: ImpKind::Flow,
                    first: None,
                }),
            },
            Stage::Imp { after_tab: true } => {
                let imp = match token {
                    Token::Space => ImpKind::Arithmetic,
                    Token::Tab => ImpKind::Heap,
                    Token::LineFeed => ImpKind::IO,
                };
                Transition::Stay(Stage::Command { imp, first: None })
            }
            Stage::Command { imp, first } => match select(imp, first, token) {
                Selection::Pending => Transition::Stay(Stage::Command {
                    imp,
                    first: Some(token),
                }),
                Selection::Complete(instr) => Transition::Emit(instr),
                Selection::Number(op) => Transition::Stay(Stage::Number {
                    op,
                    negative: None,
                    magnitude: 0,
                }),
                Selection::Label(op) => Transition::Stay(Stage::Label {
                    op,
                    bits: LabelBuilder::new(),
                }),
                Selection::Invalid => {
                    let sequence = match first {
                        Some(first) => format!("{}{}", first, token),
                        None => token.to_string(),
                    };
                    return Err(DecodeError::InvalidCommand {
                        imp,
                        sequence,
                        offset,
                        instruction: self.decoded,
                    });
                }
            },
            Stage::Number {
                op,
                negative: None,
                ..
            } => {
                let negative = match token {
                    Token::Space => false,
                    Token::Tab => true,
                    Token::LineFeed => {
                        return Err(DecodeError::MissingSign {
                            offset,
                            instruction: self.decoded,
                        })
                    }
                };
                Transition::Stay(Stage::Number {
                    op,
                    negative: Some(negative),
                    magnitude: 0,
                })
            }
            Stage::Number {
                op,
                negative: Some(negative),
                magnitude,
            } => {
                let overflow = DecodeError::NumberOverflow {
                    offset,
                    instruction: self.decoded,
                };
                let bit = match token {
                    Token::Space => 0,
                    Token::Tab => 1,
                    Token::LineFeed => {
                        let value = if negative {
                            -(magnitude as i128)
                        } else {
                            magnitude as i128
                        };
                        let value = i64::try_from(value).map_err(|_| overflow)?;
                        return Ok(Transition::Emit(op.build(value)));
                    }
                };
                let magnitude = magnitude
                    .checked_mul(2)
                    .and_then(|m| m.checked_add(bit))
                    .ok_or(overflow)?;
                Transition::Stay(Stage::Number {
                    op,
                    negative: Some(negative),
                    magnitude,
                })
            }
            Stage::Label { op, mut bits } => match token {
                Token::Space | Token::Tab => {
                    bits.push_bit(token == Token::Tab);
                    Transition::Stay(Stage::Label { op, bits })
                }
                Token::LineFeed => Transition::Emit(op.build(bits.finish())),
            },
        };

        Ok(transition)
    }
}

/// Iterator over the instructions of a source buffer. Stops after the first error.
#[derive(Debug)]
pub struct Instructions<'a> {
    decoder: Decoder,
    source: &'a [u8],
    done: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(source: &'a [u8], config: DecoderConfig) -> Instructions<'a> {
        Instructions {
            decoder: Decoder::new(config),
            source,
            done: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(&byte) = self.source.get(self.decoder.offset()) {
            match self.decoder.feed(byte) {
                Ok(Some(instr)) => return Some(Ok(instr)),
                Ok(None) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        self.decoder.finish().err().map(Err)
    }
}

/// Decodes a whole source buffer with the default configuration
pub fn decode(source: &[u8]) -> Result<Program, DecodeError> {
    decode_with(source, DecoderConfig::default())
}

/// Decodes a whole source buffer into a program, registering every mark on the way
pub fn decode_with(source: &[u8], config: DecoderConfig) -> Result<Program, DecodeError> {
    let mut program = Program::default();
    for instr in Instructions::new(source, config) {
        program.push(instr?);
    }

    Ok(program)
}

//! Instructions of the in-memory object model.
//!
//! Unlike the byte stream, an [`Instruction`] does not know its own offset. Branch operands
//! name their target by index into the owning instruction list, so inserting instructions
//! only requires shifting indices, never re-computing displacements. Byte offsets are derived
//! again when the body is encoded.

use std::fmt;

use crate::{
    assembly::opcodes::{FlowType, OpCode, OperandType},
    metadata::token::Token,
};

/// Immediate constant operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit immediate value
    Int8(i8),
    /// Unsigned 8-bit immediate value
    UInt8(u8),
    /// Signed 32-bit immediate value
    Int32(i32),
    /// Signed 64-bit immediate value
    Int64(i64),
    /// 32-bit floating point immediate value
    Float32(f32),
    /// 64-bit floating point immediate value
    Float64(f64),
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value}"),
            Immediate::UInt8(value) => write!(f, "{value}"),
            Immediate::Int32(value) => write!(f, "{value}"),
            Immediate::Int64(value) => write!(f, "{value}"),
            Immediate::Float32(value) => write!(f, "{value}"),
            Immediate::Float64(value) => write!(f, "{value}"),
        }
    }
}

/// Operand of an [`Instruction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Metadata token reference
    Token(Token),
    /// Literal of `ldstr`, interned into the `#US` heap when encoded
    String(String),
    /// Branch target, as index into the instruction list
    Target(usize),
    /// Switch table, one index per case
    Switch(Vec<usize>),
    /// Local variable index
    Local(u16),
    /// Method argument index
    Argument(u16),
}

impl Operand {
    /// Returns true if this operand fits the encoding `op_type` expects.
    #[must_use]
    pub fn matches(&self, op_type: OperandType) -> bool {
        matches!(
            (self, op_type),
            (Operand::None, OperandType::None)
                | (Operand::Immediate(Immediate::Int8(_)), OperandType::Int8)
                | (Operand::Immediate(Immediate::UInt8(_)), OperandType::UInt8)
                | (Operand::Immediate(Immediate::Int32(_)), OperandType::Int32)
                | (Operand::Immediate(Immediate::Int64(_)), OperandType::Int64)
                | (Operand::Immediate(Immediate::Float32(_)), OperandType::Float32)
                | (Operand::Immediate(Immediate::Float64(_)), OperandType::Float64)
                | (Operand::Token(_), OperandType::Token)
                | (Operand::String(_), OperandType::String)
                | (
                    Operand::Target(_),
                    OperandType::ShortBranch | OperandType::Branch
                )
                | (Operand::Switch(_), OperandType::Switch)
                | (
                    Operand::Argument(_),
                    OperandType::ShortArgument | OperandType::Argument
                )
                | (Operand::Local(_), OperandType::ShortLocal | OperandType::Local)
        )
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(value) => write!(f, "{value}"),
            Operand::Token(token) => write!(f, "{token}"),
            Operand::String(value) => write!(f, "{value:?}"),
            Operand::Target(index) => write!(f, "IL_{index:04}"),
            Operand::Switch(targets) => {
                write!(f, "(")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "IL_{target:04}")?;
                }
                write!(f, ")")
            }
            Operand::Local(index) => write!(f, "V_{index}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
        }
    }
}

/// One CIL instruction: an opcode plus its operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand, its variant must match `opcode.operand_type()`
    pub operand: Operand,
}

impl Instruction {
    /// Instruction without operand
    #[must_use]
    pub fn new(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Instruction with operand
    #[must_use]
    pub fn with(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// Control flow of the opcode
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.opcode.flow()
    }

    /// Callee token of a `call`, `callvirt` or `newobj`.
    #[must_use]
    pub fn call_target(&self) -> Option<Token> {
        match (&self.operand, self.opcode.is_call_site()) {
            (Operand::Token(token), true) => Some(*token),
            _ => None,
        }
    }

    /// Every branch target index referenced by this instruction
    #[must_use]
    pub fn targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Target(index) => vec![*index],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Rewrite every branch target index through `f`.
    pub fn remap_targets(&mut self, mut f: impl FnMut(usize) -> usize) {
        match &mut self.operand {
            Operand::Target(index) => *index = f(*index),
            Operand::Switch(targets) => {
                for target in targets.iter_mut() {
                    *target = f(*target);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode.mnemonic()),
            _ => write!(f, "{} {}", self.opcode.mnemonic(), self.operand),
        }
    }
}

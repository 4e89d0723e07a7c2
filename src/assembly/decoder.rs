//! CIL bytecode to instruction list.
//!
//! Decoding runs in two passes. The first pass walks the byte stream linearly and records the
//! byte offset of every instruction together with the absolute byte offsets its branches point
//! at. The second pass maps those byte offsets onto instruction indices. A branch that lands in
//! the middle of an instruction, or outside of the code, makes the body malformed.

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{Immediate, Instruction, Operand},
        opcodes::{OpCode, OperandType},
    },
    file::parser::Parser,
    metadata::{strings::UserStrings, token::Token},
    Result,
};

/// Raw branch operand before byte offsets are mapped to indices
enum RawTargets {
    None,
    Single(i64),
    Switch(Vec<i64>),
}

/// A decoded instruction list together with the byte offset of every instruction.
///
/// `offsets` has one more entry than `instructions`: the final entry is the code size, so
/// exception handler byte ranges ending at the end of the code map to index `len`.
#[derive(Debug)]
pub struct DecodedStream {
    /// The instructions, branch operands already converted to indices
    pub instructions: Vec<Instruction>,
    /// Byte offset of every instruction, plus the code size
    pub offsets: Vec<u32>,
}

impl DecodedStream {
    /// Map a byte offset onto an instruction index. The code size maps to `len`.
    #[must_use]
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        self.offsets.binary_search(&offset).ok()
    }
}

/// Decode a complete method body.
///
/// `strings` resolves the `#US` tokens of `ldstr`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes, truncated operands, unresolvable
/// user strings or branches that do not land on an instruction boundary.
pub fn decode_stream(code: &[u8], strings: &UserStrings) -> Result<DecodedStream> {
    let mut parser = Parser::new(code);
    let mut offsets = Vec::new();
    let mut pending = Vec::new();

    while parser.has_more_data() {
        let offset = parser.pos();
        let (instruction, raw) = decode_instruction(&mut parser, strings)?;
        offsets.push(offset as u32);
        pending.push((instruction, raw));
    }
    offsets.push(code.len() as u32);

    let by_offset: HashMap<i64, usize> = offsets[..offsets.len() - 1]
        .iter()
        .enumerate()
        .map(|(index, offset)| (i64::from(*offset), index))
        .collect();

    let map_target = |source: usize, target: i64| -> Result<usize> {
        by_offset.get(&target).copied().ok_or_else(|| {
            malformed_error!(
                "Branch at IL_{:04x} targets 0x{:x}, which is not an instruction boundary",
                offsets[source],
                target
            )
        })
    };

    let mut instructions = Vec::with_capacity(pending.len());
    for (index, (mut instruction, raw)) in pending.into_iter().enumerate() {
        match raw {
            RawTargets::None => {}
            RawTargets::Single(target) => {
                instruction.operand = Operand::Target(map_target(index, target)?);
            }
            RawTargets::Switch(targets) => {
                let targets = targets
                    .into_iter()
                    .map(|target| map_target(index, target))
                    .collect::<Result<Vec<_>>>()?;
                instruction.operand = Operand::Switch(targets);
            }
        }
        instructions.push(instruction);
    }

    Ok(DecodedStream {
        instructions,
        offsets,
    })
}

/// Decode the instruction under the cursor. Branch operands are returned as absolute byte
/// offsets in the second tuple element.
fn decode_instruction(
    parser: &mut Parser,
    strings: &UserStrings,
) -> Result<(Instruction, RawTargets)> {
    let start = parser.pos();
    let first_byte = parser.read_le::<u8>()?;

    let opcode = match first_byte {
        0xFE => {
            let second_byte = parser.read_le::<u8>()?;
            OpCode::from_bytes(0xFE, second_byte)
                .ok_or_else(|| malformed_error!("Invalid opcode: FE {:02X}", second_byte))?
        }
        _ => OpCode::from_bytes(0x00, first_byte)
            .ok_or_else(|| malformed_error!("Invalid opcode: {:02X}", first_byte))?,
    };

    let mut raw = RawTargets::None;
    let operand = match opcode.operand_type() {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::String => {
            let token = Token::new(parser.read_le::<u32>()?);
            Operand::String(strings.get(token)?.to_string())
        }
        OperandType::ShortBranch => {
            let displacement = i64::from(parser.read_le::<i8>()?);
            raw = RawTargets::Single(parser.pos() as i64 + displacement);
            Operand::Target(0)
        }
        OperandType::Branch => {
            let displacement = i64::from(parser.read_le::<i32>()?);
            raw = RawTargets::Single(parser.pos() as i64 + displacement);
            Operand::Target(0)
        }
        OperandType::Switch => {
            let count = parser.read_le::<u32>()? as usize;
            if count.saturating_mul(4) > parser.remaining() {
                return Err(malformed_error!(
                    "Switch at IL_{:04x} declares {} cases",
                    start,
                    count
                ));
            }

            let mut displacements = Vec::with_capacity(count);
            for _ in 0..count {
                displacements.push(i64::from(parser.read_le::<i32>()?));
            }

            let base = parser.pos() as i64;
            raw = RawTargets::Switch(displacements.into_iter().map(|d| base + d).collect());
            Operand::Switch(Vec::new())
        }
        OperandType::ShortArgument => Operand::Argument(u16::from(parser.read_le::<u8>()?)),
        OperandType::Argument => Operand::Argument(parser.read_le::<u16>()?),
        OperandType::ShortLocal => Operand::Local(u16::from(parser.read_le::<u8>()?)),
        OperandType::Local => Operand::Local(parser.read_le::<u16>()?),
    };

    Ok((Instruction::with(opcode, operand), raw))
}

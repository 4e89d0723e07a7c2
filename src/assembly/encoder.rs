//! Instruction list to CIL bytecode.
//!
//! The encoder is the inverse of [`crate::assembly::decoder`]. It lays the instructions out,
//! converts index based branch targets back into byte displacements and interns `ldstr`
//! literals into the `#US` heap being built for the image.
//!
//! Splicing can push a short branch out of its signed 8-bit range. Layout therefore iterates:
//! every short branch whose displacement does not fit is promoted to its long form, and the
//! layout is recomputed until no further promotion is necessary. Promotion only grows
//! instructions, so the loop terminates after at most one pass per short branch.
//!
//! # Examples
//!
//! ```rust
//! use cilsplice::assembly::{encode_stream, Instruction, OpCode, Operand};
//! use cilsplice::metadata::strings::UserStrings;
//!
//! let instructions = vec![
//!     Instruction::with(OpCode::BrS, Operand::Target(2)),
//!     Instruction::new(OpCode::Nop),
//!     Instruction::new(OpCode::Ret),
//! ];
//!
//! let encoded = encode_stream(&instructions, &mut UserStrings::new())?;
//! assert_eq!(encoded.code, vec![0x2B, 0x01, 0x00, 0x2A]);
//! # Ok::<(), cilsplice::Error>(())
//! ```

use crate::{
    assembly::{
        instruction::{Immediate, Instruction, Operand},
        opcodes::{OpCode, OperandType},
    },
    file::writer::Writer,
    metadata::strings::UserStrings,
    Error, Result,
};

/// Result of encoding an instruction list.
#[derive(Debug)]
pub struct EncodedStream {
    /// The bytecode
    pub code: Vec<u8>,
    /// Byte offset of every instruction, plus the code size as final entry
    pub offsets: Vec<u32>,
    /// Indices of short branches that had to be promoted to their long form
    pub promoted: Vec<usize>,
}

/// Encode `instructions`, interning string literals into `strings`.
///
/// # Errors
/// Returns [`crate::Error::Encoding`] if an operand does not match its opcode, a branch targets
/// an index outside of the list, or a short variable index exceeds 255.
pub fn encode_stream(instructions: &[Instruction], strings: &mut UserStrings) -> Result<EncodedStream> {
    let len = instructions.len();
    for (index, instruction) in instructions.iter().enumerate() {
        if !instruction.operand.matches(instruction.opcode.operand_type()) {
            return Err(Error::Encoding(format!(
                "IL_{index:04}: operand {:?} does not fit {}",
                instruction.operand,
                instruction.opcode.mnemonic()
            )));
        }

        if let Some(target) = instruction.targets().into_iter().find(|t| *t >= len) {
            return Err(Error::Encoding(format!(
                "IL_{index:04}: branch target {target} outside of {len} instructions"
            )));
        }
    }

    let mut opcodes: Vec<OpCode> = instructions.iter().map(|i| i.opcode).collect();
    let mut promoted = Vec::new();

    let offsets = loop {
        let offsets = layout(instructions, &opcodes)?;

        let mut changed = false;
        for (index, instruction) in instructions.iter().enumerate() {
            if opcodes[index].operand_type() != OperandType::ShortBranch {
                continue;
            }

            let Operand::Target(target) = instruction.operand else {
                continue;
            };

            let displacement = i64::from(offsets[target]) - i64::from(offsets[index + 1]);
            if i8::try_from(displacement).is_err() {
                if let Some(long) = opcodes[index].long_form() {
                    log::trace!(
                        "IL_{index:04}: promoting {} to {} (displacement {displacement})",
                        opcodes[index].mnemonic(),
                        long.mnemonic()
                    );
                    opcodes[index] = long;
                    promoted.push(index);
                    changed = true;
                }
            }
        }

        if !changed {
            break offsets;
        }
    };

    let mut writer = Writer::new();
    for (index, instruction) in instructions.iter().enumerate() {
        let opcode = opcodes[index];
        if opcode.prefix() != 0 {
            writer.write_le(opcode.prefix());
        }
        writer.write_le(opcode.code());

        let next = i64::from(offsets[index + 1]);
        match (&instruction.operand, opcode.operand_type()) {
            (Operand::None, _) => {}
            (Operand::Immediate(value), _) => match *value {
                Immediate::Int8(v) => writer.write_le(v),
                Immediate::UInt8(v) => writer.write_le(v),
                Immediate::Int32(v) => writer.write_le(v),
                Immediate::Int64(v) => writer.write_le(v),
                Immediate::Float32(v) => writer.write_le(v),
                Immediate::Float64(v) => writer.write_le(v),
            },
            (Operand::Token(token), _) => writer.write_le(token.value()),
            (Operand::String(value), _) => writer.write_le(strings.intern(value).value()),
            (Operand::Target(target), OperandType::ShortBranch) => {
                let displacement = i64::from(offsets[*target]) - next;
                writer.write_le(displacement as i8);
            }
            (Operand::Target(target), _) => {
                let displacement = i64::from(offsets[*target]) - next;
                writer.write_le(displacement as i32);
            }
            (Operand::Switch(targets), _) => {
                writer.write_le(targets.len() as u32);
                for target in targets {
                    let displacement = i64::from(offsets[*target]) - next;
                    writer.write_le(displacement as i32);
                }
            }
            (Operand::Argument(value) | Operand::Local(value), short)
                if matches!(short, OperandType::ShortArgument | OperandType::ShortLocal) =>
            {
                let value = u8::try_from(*value).map_err(|_| {
                    Error::Encoding(format!(
                        "IL_{index:04}: {} operand {value} exceeds 255",
                        opcode.mnemonic()
                    ))
                })?;
                writer.write_le(value);
            }
            (Operand::Argument(value) | Operand::Local(value), _) => writer.write_le(*value),
        }
    }

    Ok(EncodedStream {
        code: writer.into_inner(),
        offsets,
        promoted,
    })
}

/// Byte offset of every instruction under the current opcode choice, plus the code size.
fn layout(instructions: &[Instruction], opcodes: &[OpCode]) -> Result<Vec<u32>> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut offset = 0_usize;

    for (instruction, opcode) in instructions.iter().zip(opcodes) {
        offsets.push(
            u32::try_from(offset)
                .map_err(|_| Error::Encoding("Method body exceeds 4 GiB".to_string()))?,
        );

        let operand_size = match (opcode.operand_type().size(), &instruction.operand) {
            (Some(size), _) => size,
            (None, Operand::Switch(targets)) => 4 + 4 * targets.len(),
            (None, _) => 4,
        };
        offset += opcode.size() + operand_size;
    }

    offsets.push(
        u32::try_from(offset)
            .map_err(|_| Error::Encoding("Method body exceeds 4 GiB".to_string()))?,
    );
    Ok(offsets)
}

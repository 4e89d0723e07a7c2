//! CIL instruction streams.
//!
//! This module converts between raw CIL bytecode and the index based instruction model the
//! splice engine operates on:
//!
//! - [`opcodes`] - The complete ECMA-335 opcode table
//! - [`instruction`] - [`Instruction`], [`Operand`] and [`Immediate`]
//! - [`decoder`] - Bytecode to instructions, byte offsets to indices
//! - [`encoder`] - Instructions to bytecode, with short branch promotion
//! - [`emitter`] - Fluent payload builder with named labels

pub mod decoder;
pub mod emitter;
pub mod encoder;
pub mod instruction;
pub mod opcodes;

pub use decoder::{decode_stream, DecodedStream};
pub use emitter::Emitter;
pub use encoder::{encode_stream, EncodedStream};
pub use instruction::{Immediate, Instruction, Operand};
pub use opcodes::{FlowType, OpCode, OperandType};

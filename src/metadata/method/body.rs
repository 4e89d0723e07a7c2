//! Method bodies.
//!
//! A [`MethodBody`] owns the instruction list of one method along with its exception clauses,
//! stack bound and locals. Each successful splice advances the body's generation, which
//! invalidates every [`StreamPosition`] handed out before.
//!
//! Image layout of a body:
//!
//! | Field              | Encoding                          |
//! |--------------------|-----------------------------------|
//! | `max_stack`        | `u16`                             |
//! | flags              | `u8`, bit 0 = init locals         |
//! | locals             | count + type signatures           |
//! | code               | blob of CIL bytecode              |
//! | exception clauses  | count + 24 byte fat clauses       |

use crate::{
    assembly::{decode_stream, encode_stream, Instruction},
    file::{parser::Parser, writer::Writer},
    metadata::{
        method::exceptions::ExceptionHandler, signatures::TypeSignature, strings::UserStrings,
        token::Token,
    },
    Error, Result,
};

const BODY_INIT_LOCALS: u8 = 0x01;

/// The instruction stream of a method and everything that describes it.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    /// Instructions in execution order. Branch operands index into this list.
    pub instructions: Vec<Instruction>,
    /// Exception clauses, regions by instruction index
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Zero-initialize locals on entry
    pub init_locals: bool,
    /// Types of the local variables
    pub locals: Vec<TypeSignature>,
    generation: u64,
}

/// A resolved location inside a method body, valid until the body is spliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPosition {
    /// The method the position belongs to
    pub method: Token,
    /// Insertion index, `0..=len`
    pub index: usize,
    /// Body generation at resolution time
    pub generation: u64,
}

impl MethodBody {
    /// Body with the given instructions and a stack bound of 8
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        MethodBody {
            instructions,
            max_stack: 8,
            ..MethodBody::default()
        }
    }

    /// Number of instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true for a body without instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Splice generation. Starts at 0, increases by one per splice.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }

    /// Create a position at `index` for the current generation.
    #[must_use]
    pub fn position(&self, method: Token, index: usize) -> StreamPosition {
        StreamPosition {
            method,
            index,
            generation: self.generation,
        }
    }

    /// Validate `position` against the current state and return its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::StalePosition`] if the body was spliced since the position was
    /// resolved, and [`crate::Error::IndexOutOfRange`] if the index exceeds the stream.
    pub fn check(&self, position: &StreamPosition) -> Result<usize> {
        if position.generation != self.generation {
            return Err(Error::StalePosition {
                method: position.method,
                expected: position.generation,
                actual: self.generation,
            });
        }

        if position.index > self.len() {
            return Err(Error::IndexOutOfRange {
                index: i64::try_from(position.index).unwrap_or(i64::MAX),
                len: self.len(),
            });
        }

        Ok(position.index)
    }

    /// Check every branch target and exception region.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let len = self.len();
        for (index, instruction) in self.instructions.iter().enumerate() {
            if !instruction.operand.matches(instruction.opcode.operand_type()) {
                return Err(malformed_error!(
                    "IL_{:04}: operand does not fit {}",
                    index,
                    instruction.opcode.mnemonic()
                ));
            }

            if let Some(target) = instruction.targets().into_iter().find(|t| *t >= len) {
                return Err(malformed_error!(
                    "IL_{:04}: branch target {} outside of {} instructions",
                    index,
                    target,
                    len
                ));
            }
        }

        for handler in &self.exception_handlers {
            handler.validate(len)?;
        }

        Ok(())
    }

    /// Decode a body from the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for damaged bodies.
    pub fn decode(parser: &mut Parser, strings: &UserStrings) -> Result<MethodBody> {
        let max_stack = parser.read_le::<u16>()?;
        let flags = parser.read_le::<u8>()?;

        let local_count = parser.read_count(1)?;
        let mut locals = Vec::with_capacity(local_count);
        for _ in 0..local_count {
            locals.push(TypeSignature::decode(parser)?);
        }

        let code = parser.read_blob()?;
        let stream = decode_stream(code, strings)?;

        let clause_count = parser.read_count(24)?;
        let mut exception_handlers = Vec::with_capacity(clause_count);
        for _ in 0..clause_count {
            exception_handlers.push(ExceptionHandler::decode(parser, |offset| {
                stream.index_of(offset)
            })?);
        }

        let body = MethodBody {
            instructions: stream.instructions,
            exception_handlers,
            max_stack,
            init_locals: flags & BODY_INIT_LOCALS != 0,
            locals,
            generation: 0,
        };
        body.validate()?;

        Ok(body)
    }

    /// Encode the body into the image, interning literals into `strings`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the instruction stream cannot be encoded.
    pub fn encode(&self, writer: &mut Writer, strings: &mut UserStrings) -> Result<()> {
        let encoded = encode_stream(&self.instructions, strings)?;

        writer.write_le(self.max_stack);
        writer.write_le(if self.init_locals { BODY_INIT_LOCALS } else { 0 });
        writer.write_count(self.locals.len())?;
        for local in &self.locals {
            local.encode(writer)?;
        }

        writer.write_blob(&encoded.code)?;
        writer.write_count(self.exception_handlers.len())?;
        for handler in &self.exception_handlers {
            handler.encode(writer, &encoded.offsets)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{OpCode, Operand},
        metadata::method::exceptions::ExceptionHandlerFlags,
    };

    fn guarded_body() -> MethodBody {
        let mut body = MethodBody::new(vec![
            Instruction::with(OpCode::Ldstr, Operand::String("try".into())),
            Instruction::new(OpCode::Pop),
            Instruction::with(OpCode::LeaveS, Operand::Target(5)),
            Instruction::new(OpCode::Pop),
            Instruction::with(OpCode::LeaveS, Operand::Target(5)),
            Instruction::new(OpCode::Ret),
        ]);
        body.locals = vec![TypeSignature::I4];
        body.init_locals = true;
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: 0,
            try_end: 3,
            handler_start: 3,
            handler_end: 5,
            catch_type: Some(Token(0x0100_0001)),
            filter_start: None,
        });
        body
    }

    #[test]
    fn image_round_trip() {
        let body = guarded_body();
        let mut strings = UserStrings::new();
        let mut writer = Writer::new();
        body.encode(&mut writer, &mut strings).unwrap();
        let data = writer.into_inner();

        let mut parser = Parser::new(&data);
        let decoded = MethodBody::decode(&mut parser, &strings).unwrap();
        assert!(!parser.has_more_data());
        assert_eq!(decoded.instructions, body.instructions);
        assert_eq!(decoded.exception_handlers, body.exception_handlers);
        assert_eq!(decoded.locals, body.locals);
        assert!(decoded.init_locals);
        assert_eq!(decoded.max_stack, 8);
    }

    #[test]
    fn validate_catches_dangling_branch() {
        let mut body = guarded_body();
        assert!(body.validate().is_ok());

        body.instructions[2].operand = Operand::Target(6);
        assert!(matches!(body.validate(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn positions_go_stale() {
        let mut body = guarded_body();
        let method = Token(0x0600_0001);
        let position = body.position(method, 2);
        assert_eq!(body.check(&position).unwrap(), 2);

        body.advance_generation();
        assert!(matches!(
            body.check(&position),
            Err(Error::StalePosition {
                expected: 0,
                actual: 1,
                ..
            })
        ));

        let beyond = body.position(method, 7);
        assert!(matches!(
            body.check(&beyond),
            Err(Error::IndexOutOfRange { index: 7, len: 6 })
        ));

        let far = body.position(method, usize::MAX);
        assert!(matches!(
            body.check(&far),
            Err(Error::IndexOutOfRange { index: i64::MAX, len: 6 })
        ));
    }
}

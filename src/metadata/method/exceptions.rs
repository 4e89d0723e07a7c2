//! Exception handling clauses of a method body.
//!
//! Within the object model a clause delimits its protected and handler regions by instruction
//! index, so regions move together with the instructions when payloads are spliced in. Byte
//! offsets are only used in the image (ECMA-335 II.25.4.6 fat clause layout).

use bitflags::bitflags;

use crate::{
    file::{parser::Parser, writer::Writer},
    metadata::token::Token,
    Error, Result,
};

bitflags! {
    /// Kind of an exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u32 {
        /// A typed catch clause, `catch_type` names the caught type
        const EXCEPTION = 0x0000;
        /// A filter clause, `filter_start` points at the filter code
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause
        const FAULT = 0x0004;
    }
}

/// One exception handling clause.
///
/// `try_end` and `handler_end` are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Kind of clause
    pub flags: ExceptionHandlerFlags,
    /// First instruction of the protected region
    pub try_start: usize,
    /// One past the last instruction of the protected region
    pub try_end: usize,
    /// First instruction of the handler
    pub handler_start: usize,
    /// One past the last instruction of the handler
    pub handler_end: usize,
    /// Caught type for [`ExceptionHandlerFlags::EXCEPTION`]
    pub catch_type: Option<Token>,
    /// First instruction of the filter for [`ExceptionHandlerFlags::FILTER`]
    pub filter_start: Option<usize>,
}

impl ExceptionHandler {
    /// Check the clause against a body of `len` instructions.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for empty, reversed or out of range regions.
    pub fn validate(&self, len: usize) -> Result<()> {
        if self.try_start >= self.try_end || self.try_end > len {
            return Err(malformed_error!(
                "Protected region {}..{} invalid for {} instructions",
                self.try_start,
                self.try_end,
                len
            ));
        }

        if self.handler_start >= self.handler_end || self.handler_end > len {
            return Err(malformed_error!(
                "Handler region {}..{} invalid for {} instructions",
                self.handler_start,
                self.handler_end,
                len
            ));
        }

        if let Some(filter) = self.filter_start {
            if filter >= len {
                return Err(malformed_error!("Filter start {} out of range", filter));
            }
        }

        Ok(())
    }

    /// Apply `shift` to every region boundary.
    ///
    /// `shift` receives the boundary and whether it is an exclusive end.
    pub fn remap(&mut self, mut shift: impl FnMut(usize, bool) -> usize) {
        self.try_start = shift(self.try_start, false);
        self.try_end = shift(self.try_end, true);
        self.handler_start = shift(self.handler_start, false);
        self.handler_end = shift(self.handler_end, true);
        if let Some(filter) = self.filter_start {
            self.filter_start = Some(shift(filter, false));
        }
    }

    /// Decode a fat clause, mapping byte offsets through `index_of`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an offset does not fall on an instruction boundary.
    pub fn decode(parser: &mut Parser, index_of: impl Fn(u32) -> Option<usize>) -> Result<Self> {
        let flags = ExceptionHandlerFlags::from_bits_truncate(parser.read_le::<u32>()?);
        let try_offset = parser.read_le::<u32>()?;
        let try_length = parser.read_le::<u32>()?;
        let handler_offset = parser.read_le::<u32>()?;
        let handler_length = parser.read_le::<u32>()?;
        let class_or_filter = parser.read_le::<u32>()?;

        let map = |offset: u32| {
            index_of(offset).ok_or_else(|| {
                malformed_error!("Exception clause offset 0x{:x} is not an instruction", offset)
            })
        };
        let end = |offset: u32, length: u32| {
            offset
                .checked_add(length)
                .ok_or_else(|| malformed_error!("Exception clause range overflows"))
        };

        Ok(ExceptionHandler {
            flags,
            try_start: map(try_offset)?,
            try_end: map(end(try_offset, try_length)?)?,
            handler_start: map(handler_offset)?,
            handler_end: map(end(handler_offset, handler_length)?)?,
            catch_type: if flags == ExceptionHandlerFlags::EXCEPTION {
                Some(Token::new(class_or_filter))
            } else {
                None
            },
            filter_start: if flags.contains(ExceptionHandlerFlags::FILTER) {
                Some(map(class_or_filter)?)
            } else {
                None
            },
        })
    }

    /// Encode as fat clause, `offsets` maps instruction indices to byte offsets.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if a boundary has no offset.
    pub fn encode(&self, writer: &mut Writer, offsets: &[u32]) -> Result<()> {
        let offset = |index: usize| {
            offsets.get(index).copied().ok_or_else(|| {
                Error::Encoding(format!("Exception clause boundary {index} has no offset"))
            })
        };

        let try_offset = offset(self.try_start)?;
        let handler_offset = offset(self.handler_start)?;
        writer.write_le(self.flags.bits());
        writer.write_le(try_offset);
        writer.write_le(offset(self.try_end)? - try_offset);
        writer.write_le(handler_offset);
        writer.write_le(offset(self.handler_end)? - handler_offset);
        writer.write_le(match (self.catch_type, self.filter_start) {
            (_, Some(filter)) => offset(filter)?,
            (Some(token), None) => token.value(),
            (None, None) => 0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finally(try_start: usize, try_end: usize, handler_end: usize) -> ExceptionHandler {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start,
            try_end,
            handler_start: try_end,
            handler_end,
            catch_type: None,
            filter_start: None,
        }
    }

    #[test]
    fn validate_regions() {
        assert!(finally(0, 2, 4).validate(4).is_ok());
        assert!(finally(0, 2, 5).validate(4).is_err());
        assert!(finally(2, 2, 4).validate(4).is_err());
    }

    #[test]
    fn clause_bytes() {
        let clause = ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: 0,
            try_end: 2,
            handler_start: 2,
            handler_end: 3,
            catch_type: Some(Token(0x0100_0004)),
            filter_start: None,
        };

        let offsets = [0_u32, 1, 6, 8];
        let mut writer = Writer::new();
        clause.encode(&mut writer, &offsets).unwrap();
        let data = writer.into_inner();
        assert_eq!(data.len(), 24);

        let mut parser = Parser::new(&data);
        let decoded =
            ExceptionHandler::decode(&mut parser, |o| offsets.iter().position(|x| *x == o))
                .unwrap();
        assert_eq!(decoded, clause);
    }

    #[test]
    fn decode_rejects_misaligned_offsets() {
        let mut writer = Writer::new();
        for value in [2_u32, 0, 3, 3, 1, 0] {
            writer.write_le(value);
        }
        let data = writer.into_inner();

        let offsets = [0_u32, 2, 4];
        let mut parser = Parser::new(&data);
        let result = ExceptionHandler::decode(&mut parser, |o| offsets.iter().position(|x| *x == o));
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}

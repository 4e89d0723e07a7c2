//! Append-only byte sink, the write-side counterpart of [`crate::file::parser::Parser`].

use widestring::U16String;

use crate::{
    file::io::{write_le_at, CilIO},
    Error, Result,
};

/// A growable little-endian output buffer.
#[derive(Debug, Default)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Writer { data: Vec::new() }
    }

    /// Number of bytes written so far
    #[must_use]
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    /// Append a little-endian value
    pub fn write_le<T: CilIO>(&mut self, value: T) {
        self.data.extend_from_slice(value.to_le_bytes().as_ref());
    }

    /// Overwrite a previously written little-endian value at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the slot was never written.
    pub fn patch_le<T: CilIO>(&mut self, offset: usize, value: T) -> Result<()> {
        let mut offset = offset;
        write_le_at(&mut self.data, &mut offset, value)
    }

    /// Append a compressed unsigned integer (ECMA-335 II.23.2).
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] for values above `0x1FFF_FFFF`.
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<()> {
        match value {
            0..=0x7F => self.data.push(value as u8),
            0x80..=0x3FFF => {
                self.data.push(0x80 | (value >> 8) as u8);
                self.data.push(value as u8);
            }
            0x4000..=0x1FFF_FFFF => {
                self.data.push(0xC0 | (value >> 24) as u8);
                self.data.push((value >> 16) as u8);
                self.data.push((value >> 8) as u8);
                self.data.push(value as u8);
            }
            _ => {
                return Err(Error::Encoding(format!(
                    "Value {value:#x} exceeds compressed integer range"
                )))
            }
        }

        Ok(())
    }

    /// Append a count, see [`crate::file::parser::Parser::read_count`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the count is not representable.
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| Error::Encoding(format!("Count {count} is not representable")))?;
        self.write_compressed_uint(count)
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a blob (compressed length + bytes).
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the blob is too large.
    pub fn write_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_count(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    /// Append a length prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the string is too large.
    pub fn write_prefixed_string_utf8(&mut self, value: &str) -> Result<()> {
        self.write_blob(value.as_bytes())
    }

    /// Append a length prefixed UTF-16LE string, the prefix counts bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the string is too large.
    pub fn write_prefixed_string_utf16(&mut self, value: &str) -> Result<()> {
        let units = U16String::from_str(value).into_vec();
        self.write_count(units.len() * 2)?;
        for unit in units {
            self.write_le(unit);
        }
        Ok(())
    }

    /// Consume the writer and return the written bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

//! The `#US` user string heap.
//!
//! `ldstr` operands live inline in the object model as [`crate::assembly::Operand::String`].
//! The heap only exists at the image boundary: the decoder resolves `ldstr` tokens through it,
//! and the encoder interns literals into a fresh heap, so strings added by payloads never need
//! to be registered up front.

use std::collections::HashMap;

use crate::{metadata::token::Token, Result};

/// Interned user strings, addressed by `0x70` tokens with one based rows.
#[derive(Debug, Default, Clone)]
pub struct UserStrings {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl UserStrings {
    /// Create an empty heap
    #[must_use]
    pub fn new() -> Self {
        UserStrings::default()
    }

    /// Resolve a `ldstr` token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the token is not a user string token or its row is
    /// outside of the heap.
    pub fn get(&self, token: Token) -> Result<&str> {
        if !token.is_table(Token::USER_STRING) {
            return Err(malformed_error!("Token {} is not a user string", token));
        }

        token
            .index()
            .and_then(|index| self.strings.get(index))
            .map(String::as_str)
            .ok_or_else(|| malformed_error!("User string {} not in heap", token))
    }

    /// Add `value` if not yet present and return its token.
    pub fn intern(&mut self, value: &str) -> Token {
        if let Some(row) = self.lookup.get(value) {
            return Token::from_parts(Token::USER_STRING, *row);
        }

        self.strings.push(value.to_string());
        let row = self.strings.len() as u32;
        self.lookup.insert(value.to_string(), row);
        Token::from_parts(Token::USER_STRING, row)
    }

    /// Number of strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if the heap has no strings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Strings in row order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

impl FromIterator<String> for UserStrings {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut heap = UserStrings::new();
        for value in iter {
            heap.strings.push(value.clone());
            let row = heap.strings.len() as u32;
            heap.lookup.entry(value).or_insert(row);
        }
        heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates() {
        let mut heap = UserStrings::new();
        let a = heap.intern("Hello");
        let b = heap.intern("World");
        let c = heap.intern("Hello");

        assert_eq!(a, Token(0x7000_0001));
        assert_eq!(b, Token(0x7000_0002));
        assert_eq!(a, c);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get(b).unwrap(), "World");
    }

    #[test]
    fn rejects_foreign_tokens() {
        let heap: UserStrings = vec!["x".to_string()].into_iter().collect();
        assert_eq!(heap.get(Token(0x7000_0001)).unwrap(), "x");
        assert!(heap.get(Token(0x7000_0002)).is_err());
        assert!(heap.get(Token(0x7000_0000)).is_err());
        assert!(heap.get(Token(0x0600_0001)).is_err());
    }
}

//! Metadata tokens.
//!
//! A token packs a table id into its high byte and a one based row number into the lower
//! 24 bits. Call instructions carry `MethodDef` or `MemberRef` tokens, `ldstr` carries a
//! `UserString` token, type operands carry `TypeDef` or `TypeRef` tokens.
//!
//! ```rust
//! use cilsplice::Token;
//!
//! let token = Token::from_parts(Token::MEMBER_REF, 3);
//! assert_eq!(token.value(), 0x0A00_0003);
//! assert_eq!(token.to_string(), "0x0a000003");
//! ```

use std::fmt;

/// A metadata token: `table << 24 | row`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Module table
    pub const MODULE: u8 = 0x00;
    /// `TypeRef` table
    pub const TYPE_REF: u8 = 0x01;
    /// `TypeDef` table
    pub const TYPE_DEF: u8 = 0x02;
    /// `MethodDef` table
    pub const METHOD_DEF: u8 = 0x06;
    /// `MemberRef` table
    pub const MEMBER_REF: u8 = 0x0A;
    /// `ModuleRef` table
    pub const MODULE_REF: u8 = 0x1A;
    /// `AssemblyRef` table
    pub const ASSEMBLY_REF: u8 = 0x23;
    /// `ManifestResource` table
    pub const MANIFEST_RESOURCE: u8 = 0x28;
    /// Pseudo table of the `#US` heap
    pub const USER_STRING: u8 = 0x70;

    /// Wrap a raw token value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Build a token from its table id and a one based row.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Raw value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Table id (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// One based row within the table
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Row converted to a zero based index, `None` for the null row
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.row().checked_sub(1).map(|row| row as usize)
    }

    /// True if the token refers to nothing
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }

    /// True if this token lives in `table`
    #[must_use]
    pub fn is_table(&self, table: u8) -> bool {
        self.table() == table
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

//! Methods of a compiled module.
//!
//! A [`MethodDef`] carries the identity of a method (token, name, signature) and, unless the
//! method is abstract or extern, its [`MethodBody`].

pub mod body;
pub mod exceptions;

pub use body::{MethodBody, StreamPosition};
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};

use bitflags::bitflags;

use crate::metadata::{signatures::MethodSignature, token::Token};

bitflags! {
    /// Method attributes (ECMA-335 II.23.1.10), subset relevant to patching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u16 {
        /// Accessible by everyone
        const PUBLIC = 0x0006;
        /// Static method
        const STATIC = 0x0010;
        /// Virtual method
        const VIRTUAL = 0x0040;
        /// No implementation in this type
        const ABSTRACT = 0x0400;
        /// Special name, e.g. constructors and property accessors
        const SPECIAL_NAME = 0x0800;
        /// Implementation provided by the runtime or a native library
        const PINVOKE_IMPL = 0x2000;
        /// Runtime special name
        const RT_SPECIAL_NAME = 0x1000;
    }
}

/// A method defined in the module.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// `MethodDef` token
    pub token: Token,
    /// Simple name, e.g. `Update` or `.ctor`
    pub name: String,
    /// Attributes
    pub flags: MethodAttributes,
    /// Calling convention and types
    pub signature: MethodSignature,
    /// The instruction stream, `None` for abstract or extern methods
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// True if the method has an instruction stream
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// True if the method is static
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }
}

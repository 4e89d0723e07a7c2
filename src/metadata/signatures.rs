//! Type and method signatures.
//!
//! Signatures are the logical identity the resolver matches on: a method is found by its
//! declaring type, its name and the fully qualified names of its parameter types. The blob
//! encoding follows ECMA-335 II.23.2 for primitives, with one deviation: class and value type
//! references carry the qualified type name inline instead of a `TypeDefOrRef` coded index, so
//! a signature stays meaningful when it is copied between modules.
//!
//! ```rust
//! use cilsplice::metadata::signatures::{MethodSignature, TypeSignature};
//!
//! let sig = MethodSignature::static_method(
//!     TypeSignature::Void,
//!     vec![TypeSignature::parse("System.String")],
//! );
//! assert_eq!(sig.to_string(), "System.Void (System.String)");
//! assert_eq!(sig.param_names(), vec!["System.String".to_string()]);
//! ```

use std::fmt;

use crate::{
    file::{parser::Parser, writer::Writer},
    Result,
};

const ELEMENT_VOID: u8 = 0x01;
const ELEMENT_BOOLEAN: u8 = 0x02;
const ELEMENT_CHAR: u8 = 0x03;
const ELEMENT_I1: u8 = 0x04;
const ELEMENT_U1: u8 = 0x05;
const ELEMENT_I2: u8 = 0x06;
const ELEMENT_U2: u8 = 0x07;
const ELEMENT_I4: u8 = 0x08;
const ELEMENT_U4: u8 = 0x09;
const ELEMENT_I8: u8 = 0x0A;
const ELEMENT_U8: u8 = 0x0B;
const ELEMENT_R4: u8 = 0x0C;
const ELEMENT_R8: u8 = 0x0D;
const ELEMENT_STRING: u8 = 0x0E;
const ELEMENT_VALUETYPE: u8 = 0x11;
const ELEMENT_CLASS: u8 = 0x12;
const ELEMENT_I: u8 = 0x18;
const ELEMENT_U: u8 = 0x19;
const ELEMENT_OBJECT: u8 = 0x1C;
const ELEMENT_SZARRAY: u8 = 0x1D;

const CALLCONV_HASTHIS: u8 = 0x20;

/// The type of a parameter, return value or local.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    /// `System.Void`
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    I1,
    /// `System.Byte`
    U1,
    /// `System.Int16`
    I2,
    /// `System.UInt16`
    U2,
    /// `System.Int32`
    I4,
    /// `System.UInt32`
    U4,
    /// `System.Int64`
    I8,
    /// `System.UInt64`
    U8,
    /// `System.Single`
    R4,
    /// `System.Double`
    R8,
    /// `System.IntPtr`
    I,
    /// `System.UIntPtr`
    U,
    /// `System.String`
    String,
    /// `System.Object`
    Object,
    /// Reference type, by qualified name
    Class(String),
    /// Value type, by qualified name
    ValueType(String),
    /// Single dimensional, zero based array
    SzArray(Box<TypeSignature>),
}

const PRIMITIVES: &[(TypeSignature, &str)] = &[
    (TypeSignature::Void, "System.Void"),
    (TypeSignature::Boolean, "System.Boolean"),
    (TypeSignature::Char, "System.Char"),
    (TypeSignature::I1, "System.SByte"),
    (TypeSignature::U1, "System.Byte"),
    (TypeSignature::I2, "System.Int16"),
    (TypeSignature::U2, "System.UInt16"),
    (TypeSignature::I4, "System.Int32"),
    (TypeSignature::U4, "System.UInt32"),
    (TypeSignature::I8, "System.Int64"),
    (TypeSignature::U8, "System.UInt64"),
    (TypeSignature::R4, "System.Single"),
    (TypeSignature::R8, "System.Double"),
    (TypeSignature::I, "System.IntPtr"),
    (TypeSignature::U, "System.UIntPtr"),
    (TypeSignature::String, "System.String"),
    (TypeSignature::Object, "System.Object"),
];

impl TypeSignature {
    /// Parse a qualified type name such as `System.Int32` or `Terraria.Item[]`.
    ///
    /// Names that are not primitives become [`TypeSignature::Class`].
    #[must_use]
    pub fn parse(name: &str) -> TypeSignature {
        let name = name.trim();
        if let Some(element) = name.strip_suffix("[]") {
            return TypeSignature::SzArray(Box::new(TypeSignature::parse(element)));
        }

        PRIMITIVES
            .iter()
            .find(|(_, primitive)| *primitive == name)
            .map_or_else(|| TypeSignature::Class(name.to_string()), |(sig, _)| sig.clone())
    }

    /// Qualified name of the type
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            TypeSignature::Class(name) | TypeSignature::ValueType(name) => name.clone(),
            TypeSignature::SzArray(element) => format!("{}[]", element.name()),
            primitive => PRIMITIVES
                .iter()
                .find(|(sig, _)| sig == primitive)
                .map_or_else(String::new, |(_, name)| (*name).to_string()),
        }
    }

    /// Decode from a signature blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unsupported element types.
    pub fn decode(parser: &mut Parser) -> Result<TypeSignature> {
        let element = parser.read_le::<u8>()?;
        Ok(match element {
            ELEMENT_VOID => TypeSignature::Void,
            ELEMENT_BOOLEAN => TypeSignature::Boolean,
            ELEMENT_CHAR => TypeSignature::Char,
            ELEMENT_I1 => TypeSignature::I1,
            ELEMENT_U1 => TypeSignature::U1,
            ELEMENT_I2 => TypeSignature::I2,
            ELEMENT_U2 => TypeSignature::U2,
            ELEMENT_I4 => TypeSignature::I4,
            ELEMENT_U4 => TypeSignature::U4,
            ELEMENT_I8 => TypeSignature::I8,
            ELEMENT_U8 => TypeSignature::U8,
            ELEMENT_R4 => TypeSignature::R4,
            ELEMENT_R8 => TypeSignature::R8,
            ELEMENT_I => TypeSignature::I,
            ELEMENT_U => TypeSignature::U,
            ELEMENT_STRING => TypeSignature::String,
            ELEMENT_OBJECT => TypeSignature::Object,
            ELEMENT_CLASS => TypeSignature::Class(parser.read_prefixed_string_utf8()?),
            ELEMENT_VALUETYPE => TypeSignature::ValueType(parser.read_prefixed_string_utf8()?),
            ELEMENT_SZARRAY => TypeSignature::SzArray(Box::new(TypeSignature::decode(parser)?)),
            _ => {
                return Err(malformed_error!(
                    "Unsupported element type 0x{:02X} at offset {}",
                    element,
                    parser.pos() - 1
                ))
            }
        })
    }

    /// Encode into a signature blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if a type name is too long.
    pub fn encode(&self, writer: &mut Writer) -> Result<()> {
        let element = match self {
            TypeSignature::Void => ELEMENT_VOID,
            TypeSignature::Boolean => ELEMENT_BOOLEAN,
            TypeSignature::Char => ELEMENT_CHAR,
            TypeSignature::I1 => ELEMENT_I1,
            TypeSignature::U1 => ELEMENT_U1,
            TypeSignature::I2 => ELEMENT_I2,
            TypeSignature::U2 => ELEMENT_U2,
            TypeSignature::I4 => ELEMENT_I4,
            TypeSignature::U4 => ELEMENT_U4,
            TypeSignature::I8 => ELEMENT_I8,
            TypeSignature::U8 => ELEMENT_U8,
            TypeSignature::R4 => ELEMENT_R4,
            TypeSignature::R8 => ELEMENT_R8,
            TypeSignature::I => ELEMENT_I,
            TypeSignature::U => ELEMENT_U,
            TypeSignature::String => ELEMENT_STRING,
            TypeSignature::Object => ELEMENT_OBJECT,
            TypeSignature::Class(name) => {
                writer.write_le(ELEMENT_CLASS);
                return writer.write_prefixed_string_utf8(name);
            }
            TypeSignature::ValueType(name) => {
                writer.write_le(ELEMENT_VALUETYPE);
                return writer.write_prefixed_string_utf8(name);
            }
            TypeSignature::SzArray(element) => {
                writer.write_le(ELEMENT_SZARRAY);
                return element.encode(writer);
            }
        };

        writer.write_le(element);
        Ok(())
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Calling convention, return type and parameters of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Instance method, `this` is argument 0
    pub has_this: bool,
    /// Return type
    pub return_type: TypeSignature,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeSignature>,
}

impl MethodSignature {
    /// Signature of a static method
    #[must_use]
    pub fn static_method(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        MethodSignature {
            has_this: false,
            return_type,
            params,
        }
    }

    /// Signature of an instance method
    #[must_use]
    pub fn instance_method(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        MethodSignature {
            has_this: true,
            return_type,
            params,
        }
    }

    /// Qualified names of the parameter types, in order
    #[must_use]
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(TypeSignature::name).collect()
    }

    /// True if the parameter types match `params` exactly, by qualified name.
    #[must_use]
    pub fn matches_params<S: AsRef<str>>(&self, params: &[S]) -> bool {
        self.params.len() == params.len()
            && self
                .params
                .iter()
                .zip(params)
                .all(|(sig, name)| sig.name() == name.as_ref().trim())
    }

    /// Decode a method signature blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob is truncated or contains unsupported
    /// element types.
    pub fn decode(data: &[u8]) -> Result<MethodSignature> {
        let mut parser = Parser::new(data);
        let convention = parser.read_le::<u8>()?;
        let count = parser.read_count(1)?;
        let return_type = TypeSignature::decode(&mut parser)?;

        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            params.push(TypeSignature::decode(&mut parser)?);
        }

        Ok(MethodSignature {
            has_this: convention & CALLCONV_HASTHIS != 0,
            return_type,
            params,
        })
    }

    /// Encode into a signature blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if the signature is not representable.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.write_le(if self.has_this { CALLCONV_HASTHIS } else { 0 });
        writer.write_count(self.params.len())?;
        self.return_type.encode(&mut writer)?;
        for param in &self.params {
            param.encode(&mut writer)?;
        }
        Ok(writer.into_inner())
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_this {
            write!(f, "instance ")?;
        }
        write!(f, "{} (", self.return_type)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!(TypeSignature::parse("System.Int32"), TypeSignature::I4);
        assert_eq!(
            TypeSignature::parse(" Terraria.Item "),
            TypeSignature::Class("Terraria.Item".into())
        );
        assert_eq!(
            TypeSignature::parse("System.String[][]"),
            TypeSignature::SzArray(Box::new(TypeSignature::SzArray(Box::new(
                TypeSignature::String
            ))))
        );
        assert_eq!(TypeSignature::parse("System.Byte[]").name(), "System.Byte[]");
    }

    #[test]
    fn blob_layout() {
        let sig = MethodSignature::instance_method(
            TypeSignature::Boolean,
            vec![TypeSignature::I4, TypeSignature::Class("A.B".into())],
        );
        let blob = sig.encode().unwrap();
        assert_eq!(
            blob,
            vec![0x20, 0x02, 0x02, 0x08, 0x12, 0x03, b'A', b'.', b'B']
        );
        assert_eq!(MethodSignature::decode(&blob).unwrap(), sig);
    }

    #[test]
    fn decode_rejects_unknown_elements() {
        assert!(MethodSignature::decode(&[0x00, 0x01, 0x01, 0x15]).is_err());
        assert!(MethodSignature::decode(&[0x00, 0x05, 0x01]).is_err());
    }

    #[test]
    fn match_params() {
        let sig = MethodSignature::static_method(
            TypeSignature::Void,
            vec![TypeSignature::String, TypeSignature::I4],
        );
        assert!(sig.matches_params(&["System.String", "System.Int32"]));
        assert!(!sig.matches_params(&["System.String"]));
        assert!(!sig.matches_params(&["System.Int32", "System.String"]));
        assert_eq!(
            sig.to_string(),
            "System.Void (System.String, System.Int32)"
        );
    }
}

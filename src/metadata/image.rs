//! Module image codec.
//!
//! [`ModuleCodec`] is the seam between the object model and a binary format. [`ImageCodec`] is
//! the format shipped with the crate: a little-endian container that reuses the ECMA-335
//! building blocks (compressed integers, signature blobs, CIL bytecode with byte displacement
//! branches, fat exception clauses and a UTF-16 `#US` heap).
//!
//! | Section        | Content                                                        |
//! |----------------|----------------------------------------------------------------|
//! | header         | magic `CSPL`, version `u16`, flags `u16`, MVID (16 bytes)      |
//! | name           | UTF-8                                                          |
//! | module refs    | count, names                                                   |
//! | type refs      | count, (scope token, namespace, name)                          |
//! | member refs    | count, (parent token, name, signature blob)                    |
//! | types          | count, (namespace, name, methods)                              |
//! | user strings   | count, UTF-16 strings                                          |
//! | resources      | count, (name, blob)                                            |
//! | debug symbols  | blob, only if header flag bit 0 is set                         |
//!
//! Method bodies are stored as blobs and decoded after the user string heap has been read.
//! The heap is rebuilt from the live `ldstr` literals on every write, so literals that were
//! spliced in are always present and literals that are no longer used are dropped.

use crate::{
    file::{parser::Parser, writer::Writer},
    metadata::{
        method::{MethodAttributes, MethodBody, MethodDef},
        module::{CompiledModule, MemberRef, ModuleRef, Resource, TypeRef},
        signatures::MethodSignature,
        strings::UserStrings,
        token::Token,
    },
    Error, Result,
};

use uguid::Guid;

/// Image magic
pub const IMAGE_MAGIC: &[u8; 4] = b"CSPL";
/// Current image version
pub const IMAGE_VERSION: u16 = 1;
/// File extension of module images
pub const MODULE_EXTENSION: &str = ".cmod";
/// File extension of debug symbol companions
pub const SYMBOL_EXTENSION: &str = ".pdb";

const FLAG_DEBUG_SYMBOLS: u16 = 0x0001;

/// Converts between a [`CompiledModule`] and its binary image.
pub trait ModuleCodec: Send + Sync {
    /// Decode an image.
    ///
    /// # Errors
    /// Returns a format error if the image is not valid.
    fn decode(&self, data: &[u8]) -> Result<CompiledModule>;

    /// Encode a module. Must not modify the module.
    ///
    /// # Errors
    /// Returns an encoding error if a part of the module is not representable.
    fn encode(&self, module: &CompiledModule) -> Result<Vec<u8>>;
}

/// The crate's native image format.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

/// A method whose body is not decoded yet
struct PendingMethod<'a> {
    type_index: usize,
    method: MethodDef,
    body: Option<&'a [u8]>,
}

impl ModuleCodec for ImageCodec {
    fn decode(&self, data: &[u8]) -> Result<CompiledModule> {
        let mut parser = Parser::new(data);

        if data.len() < IMAGE_MAGIC.len() || parser.read_bytes(IMAGE_MAGIC.len())? != IMAGE_MAGIC {
            return Err(Error::NotSupported);
        }

        let version = parser.read_le::<u16>()?;
        if version != IMAGE_VERSION {
            return Err(Error::NotSupported);
        }

        let flags = parser.read_le::<u16>()?;
        let mut mvid = [0_u8; 16];
        mvid.copy_from_slice(parser.read_bytes(16)?);
        let name = parser.read_prefixed_string_utf8()?;

        let mut module = CompiledModule::with_mvid(&name, Guid::from_bytes(mvid));

        let count = parser.read_count(1)?;
        let mut module_refs = Vec::with_capacity(count);
        for row in 1..=count {
            module_refs.push(ModuleRef {
                token: Token::from_parts(Token::MODULE_REF, row as u32),
                name: parser.read_prefixed_string_utf8()?,
            });
        }

        let count = parser.read_count(6)?;
        let mut type_refs = Vec::with_capacity(count);
        for row in 1..=count {
            type_refs.push(TypeRef {
                token: Token::from_parts(Token::TYPE_REF, row as u32),
                scope: Token::new(parser.read_le::<u32>()?),
                namespace: parser.read_prefixed_string_utf8()?,
                name: parser.read_prefixed_string_utf8()?,
            });
        }

        let count = parser.read_count(6)?;
        let mut member_refs = Vec::with_capacity(count);
        for row in 1..=count {
            member_refs.push(MemberRef {
                token: Token::from_parts(Token::MEMBER_REF, row as u32),
                parent: Token::new(parser.read_le::<u32>()?),
                name: parser.read_prefixed_string_utf8()?,
                signature: MethodSignature::decode(parser.read_blob()?)?,
            });
        }

        let type_count = parser.read_count(3)?;
        let mut pending = Vec::new();
        for type_index in 0..type_count {
            let namespace = parser.read_prefixed_string_utf8()?;
            let type_name = parser.read_prefixed_string_utf8()?;
            let token = module.add_type(&namespace, &type_name);
            if token.index() != Some(type_index) {
                return Err(malformed_error!("TypeDef {} out of sequence", token));
            }

            let method_count = parser.read_count(9)?;
            for _ in 0..method_count {
                let token = Token::new(parser.read_le::<u32>()?);
                if !token.is_table(Token::METHOD_DEF) || token.is_null() {
                    return Err(malformed_error!("Invalid MethodDef token {}", token));
                }

                let name = parser.read_prefixed_string_utf8()?;
                let flags = MethodAttributes::from_bits_retain(parser.read_le::<u16>()?);
                let signature = MethodSignature::decode(parser.read_blob()?)?;
                let body = match parser.read_le::<u8>()? {
                    0 => None,
                    1 => Some(parser.read_blob()?),
                    other => return Err(malformed_error!("Invalid body marker {}", other)),
                };

                pending.push(PendingMethod {
                    type_index,
                    method: MethodDef {
                        token,
                        name,
                        flags,
                        signature,
                        body: None,
                    },
                    body,
                });
            }
        }

        let count = parser.read_count(1)?;
        let mut strings = Vec::with_capacity(count);
        for _ in 0..count {
            strings.push(parser.read_prefixed_string_utf16()?);
        }
        let strings: UserStrings = strings.into_iter().collect();

        for PendingMethod {
            type_index,
            mut method,
            body,
        } in pending
        {
            if module.method(method.token).is_some() {
                return Err(malformed_error!("Duplicate MethodDef {}", method.token));
            }

            if let Some(body) = body {
                let mut body_parser = Parser::new(body);
                method.body = Some(MethodBody::decode(&mut body_parser, &strings)?);
                if body_parser.has_more_data() {
                    return Err(malformed_error!(
                        "Trailing data in body of {}",
                        method.token
                    ));
                }
            }
            module.push_decoded_method(type_index, method);
        }

        let count = parser.read_count(2)?;
        let mut resources = Vec::with_capacity(count);
        for _ in 0..count {
            resources.push(Resource {
                name: parser.read_prefixed_string_utf8()?,
                data: parser.read_blob()?.to_vec(),
            });
        }

        if flags & FLAG_DEBUG_SYMBOLS != 0 {
            module.set_debug_symbols(Some(parser.read_blob()?.to_vec()));
        }

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} bytes of trailing data",
                parser.remaining()
            ));
        }

        module.push_decoded(module_refs, type_refs, member_refs, resources);
        Ok(module)
    }

    fn encode(&self, module: &CompiledModule) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        let mut strings = UserStrings::new();

        writer.write_bytes(IMAGE_MAGIC);
        writer.write_le(IMAGE_VERSION);
        writer.write_le(if module.debug_symbols().is_some() {
            FLAG_DEBUG_SYMBOLS
        } else {
            0
        });
        writer.write_bytes(&module.mvid().to_bytes());
        writer.write_prefixed_string_utf8(module.name())?;

        writer.write_count(module.module_refs().len())?;
        for module_ref in module.module_refs() {
            writer.write_prefixed_string_utf8(&module_ref.name)?;
        }

        writer.write_count(module.type_refs().len())?;
        for type_ref in module.type_refs() {
            writer.write_le(type_ref.scope.value());
            writer.write_prefixed_string_utf8(&type_ref.namespace)?;
            writer.write_prefixed_string_utf8(&type_ref.name)?;
        }

        writer.write_count(module.member_refs().len())?;
        for member_ref in module.member_refs() {
            writer.write_le(member_ref.parent.value());
            writer.write_prefixed_string_utf8(&member_ref.name)?;
            writer.write_blob(&member_ref.signature.encode()?)?;
        }

        writer.write_count(module.types().len())?;
        for type_def in module.types() {
            writer.write_prefixed_string_utf8(&type_def.namespace)?;
            writer.write_prefixed_string_utf8(&type_def.name)?;
            writer.write_count(type_def.methods.len())?;

            for method in &type_def.methods {
                writer.write_le(method.token.value());
                writer.write_prefixed_string_utf8(&method.name)?;
                writer.write_le(method.flags.bits());
                writer.write_blob(&method.signature.encode()?)?;

                match &method.body {
                    None => writer.write_le(0_u8),
                    Some(body) => {
                        let mut body_writer = Writer::new();
                        body.encode(&mut body_writer, &mut strings).map_err(|e| {
                            Error::Encoding(format!(
                                "{}::{} ({}) - {e}",
                                type_def.full_name(),
                                method.name,
                                method.token
                            ))
                        })?;
                        writer.write_le(1_u8);
                        writer.write_blob(&body_writer.into_inner())?;
                    }
                }
            }
        }

        writer.write_count(strings.len())?;
        for value in strings.iter() {
            writer.write_prefixed_string_utf16(value)?;
        }

        writer.write_count(module.resources().len())?;
        for resource in module.resources() {
            writer.write_prefixed_string_utf8(&resource.name)?;
            writer.write_blob(&resource.data)?;
        }

        if let Some(symbols) = module.debug_symbols() {
            writer.write_blob(symbols)?;
        }

        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{factories::game_module, token_of};

    #[test]
    fn round_trip_preserves_model() {
        let mut module = game_module();
        module.add_resource("Readme.txt", b"hello".to_vec());
        module.set_debug_symbols(Some(vec![1, 2, 3]));

        let data = ImageCodec.encode(&module).unwrap();
        assert_eq!(&data[..4], IMAGE_MAGIC);

        let decoded = ImageCodec.decode(&data).unwrap();
        assert_eq!(decoded.name(), module.name());
        assert_eq!(decoded.mvid(), module.mvid());
        assert_eq!(decoded.module_refs(), module.module_refs());
        assert_eq!(decoded.type_refs(), module.type_refs());
        assert_eq!(decoded.member_refs(), module.member_refs());
        assert_eq!(decoded.resources(), module.resources());
        assert_eq!(decoded.debug_symbols(), Some(&[1_u8, 2, 3][..]));

        for original in module.methods() {
            let copy = decoded.method(original.token).unwrap();
            assert_eq!(copy.name, original.name);
            assert_eq!(copy.signature, original.signature);
            assert_eq!(
                copy.body.as_ref().map(|b| b.instructions.clone()),
                original.body.as_ref().map(|b| b.instructions.clone())
            );
        }

        let update = token_of(&decoded, "Terraria.Main", "Update");
        assert!(decoded.method(update).is_some());
    }

    #[test]
    fn encode_is_deterministic() {
        let module = game_module();
        assert_eq!(
            ImageCodec.encode(&module).unwrap(),
            ImageCodec.encode(&module).unwrap()
        );
    }

    #[test]
    fn rejects_foreign_images() {
        assert!(matches!(
            ImageCodec.decode(b"MZ\x90\x00"),
            Err(Error::NotSupported)
        ));

        let mut data = ImageCodec.encode(&game_module()).unwrap();
        data[4] = 9;
        assert!(matches!(ImageCodec.decode(&data), Err(Error::NotSupported)));
    }

    #[test]
    fn rejects_truncated_and_padded_images() {
        let data = ImageCodec.encode(&game_module()).unwrap();
        assert!(ImageCodec.decode(&data[..data.len() - 1]).is_err());

        let mut padded = data.clone();
        padded.push(0);
        assert!(matches!(
            ImageCodec.decode(&padded),
            Err(Error::Malformed { .. })
        ));
    }
}

//! The compiled module model.
//!
//! A [`CompiledModule`] is the in-memory, mutable form of one module image: its identity, the
//! reference tables that point into other modules, the types it defines together with their
//! methods and bodies, embedded resources and optional debug symbols.
//!
//! Modules are either loaded from an image or built programmatically:
//!
//! ```rust
//! use cilsplice::metadata::{
//!     method::{MethodAttributes, MethodBody},
//!     signatures::{MethodSignature, TypeSignature},
//! };
//! use cilsplice::{assembly::{Instruction, OpCode}, CompiledModule};
//!
//! let mut module = CompiledModule::new("Game");
//! let player = module.add_type("Game", "Player");
//! module.add_method(
//!     player,
//!     "Update",
//!     MethodAttributes::PUBLIC,
//!     MethodSignature::instance_method(TypeSignature::Void, vec![]),
//!     Some(MethodBody::new(vec![Instruction::new(OpCode::Ret)])),
//! )?;
//!
//! let update = module.function("Game.Player", "Update", &[] as &[&str]).unwrap();
//! assert_eq!(update.body.as_ref().unwrap().len(), 1);
//! # Ok::<(), cilsplice::Error>(())
//! ```

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    path::Path,
};

use uguid::Guid;

use crate::{
    file::File,
    metadata::{
        image::{ImageCodec, ModuleCodec},
        method::{MethodAttributes, MethodBody, MethodDef},
        signatures::MethodSignature,
        token::Token,
    },
    Error, Result,
};

/// Split `Namespace.Name` at the last dot.
#[must_use]
pub fn split_qualified(qualified: &str) -> (&str, &str) {
    match qualified.rfind('.') {
        Some(pos) => (&qualified[..pos], &qualified[pos + 1..]),
        None => ("", qualified),
    }
}

fn join_qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Reference to another module by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
    /// `ModuleRef` token
    pub token: Token,
    /// Module name without extension
    pub name: String,
}

/// Reference to a type defined in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// `TypeRef` token
    pub token: Token,
    /// Resolution scope, the `ModuleRef` of the defining module
    pub scope: Token,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
}

impl TypeRef {
    /// `Namespace.Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        join_qualified(&self.namespace, &self.name)
    }
}

/// Reference to a method of a referenced type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// `MemberRef` token
    pub token: Token,
    /// The `TypeRef` declaring the member
    pub parent: Token,
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: MethodSignature,
}

/// A type defined in the module.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Methods in definition order
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// `Namespace.Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        join_qualified(&self.namespace, &self.name)
    }

    /// True if this type is `qualified`
    #[must_use]
    pub fn is(&self, qualified: &str) -> bool {
        let (namespace, name) = split_qualified(qualified);
        self.namespace == namespace && self.name == name
    }
}

/// An embedded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Manifest name
    pub name: String,
    /// Raw content
    pub data: Vec<u8>,
}

/// The in-memory model of a compiled module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    name: String,
    mvid: Guid,
    module_refs: Vec<ModuleRef>,
    type_refs: Vec<TypeRef>,
    member_refs: Vec<MemberRef>,
    types: Vec<TypeDef>,
    resources: Vec<Resource>,
    debug_symbols: Option<Vec<u8>>,
    method_index: HashMap<Token, (usize, usize)>,
    method_count: u32,
    metadata_generation: u64,
}

impl CompiledModule {
    /// Create an empty module. The MVID is derived from the name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        let low = hasher.finish();
        low.rotate_left(17).hash(&mut hasher);
        let high = hasher.finish();

        let mut mvid = [0_u8; 16];
        mvid[..8].copy_from_slice(&low.to_le_bytes());
        mvid[8..].copy_from_slice(&high.to_le_bytes());

        Self::with_mvid(name, Guid::from_bytes(mvid))
    }

    /// Create an empty module with an explicit MVID.
    #[must_use]
    pub fn with_mvid(name: &str, mvid: Guid) -> Self {
        CompiledModule {
            name: name.to_string(),
            mvid,
            module_refs: Vec::new(),
            type_refs: Vec::new(),
            member_refs: Vec::new(),
            types: Vec::new(),
            resources: Vec::new(),
            debug_symbols: None,
            method_index: HashMap::new(),
            method_count: 0,
            metadata_generation: 0,
        }
    }

    /// Load and decode the image at `path` with the default [`ImageCodec`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Load`] wrapping the I/O or format failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &ImageCodec)
    }

    /// Load and decode the image at `path` with `codec`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Load`] wrapping the I/O or format failure.
    pub fn load_with(path: impl AsRef<Path>, codec: &dyn ModuleCodec) -> Result<Self> {
        let path = path.as_ref();
        let module = File::from_file(path)
            .and_then(|file| codec.decode(file.data()))
            .map_err(|source| Error::Load {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;

        log::debug!(
            "Loaded module '{}' from {} ({} types)",
            module.name,
            path.display(),
            module.types.len()
        );
        Ok(module)
    }

    /// Decode an in-memory image with the default [`ImageCodec`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer or the format failure.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let file = File::from_mem(data)?;
        ImageCodec.decode(file.data())
    }

    /// Encode the module with the default [`ImageCodec`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Encoding`] if a body cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        ImageCodec.encode(self)
    }

    /// Encode the module and write it to `path`. The model is not modified, so this may be
    /// called repeatedly.
    ///
    /// # Errors
    /// Returns [`crate::Error::Write`] wrapping the encoding or I/O failure.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_with(path, &ImageCodec)
    }

    /// Encode the module with `codec` and write it to `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Write`] wrapping the encoding or I/O failure.
    pub fn write_with(&self, path: impl AsRef<Path>, codec: &dyn ModuleCodec) -> Result<()> {
        let path = path.as_ref();
        codec
            .encode(self)
            .and_then(|data| std::fs::write(path, data).map_err(Error::FileError))
            .map_err(|source| Error::Write {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;

        log::debug!("Wrote module '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Module name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version id
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    /// Counter that advances whenever a type, method or reference is added.
    #[must_use]
    pub fn metadata_generation(&self) -> u64 {
        self.metadata_generation
    }

    /// Module references
    #[must_use]
    pub fn module_refs(&self) -> &[ModuleRef] {
        &self.module_refs
    }

    /// Type references
    #[must_use]
    pub fn type_refs(&self) -> &[TypeRef] {
        &self.type_refs
    }

    /// Member references
    #[must_use]
    pub fn member_refs(&self) -> &[MemberRef] {
        &self.member_refs
    }

    /// Defined types
    #[must_use]
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// Embedded resources
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Debug symbols attached to the module
    #[must_use]
    pub fn debug_symbols(&self) -> Option<&[u8]> {
        self.debug_symbols.as_deref()
    }

    /// Attach debug symbols, e.g. the companion resource of an embedded module.
    pub fn set_debug_symbols(&mut self, symbols: Option<Vec<u8>>) {
        self.debug_symbols = symbols;
    }

    /// Define a new type and return its token.
    pub fn add_type(&mut self, namespace: &str, name: &str) -> Token {
        let token = Token::from_parts(Token::TYPE_DEF, self.types.len() as u32 + 1);
        self.types.push(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            methods: Vec::new(),
        });
        self.metadata_generation += 1;
        token
    }

    /// Define a new method on `declaring_type` and return its token.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if `declaring_type` is not defined here,
    /// or [`crate::Error::Malformed`] if `body` violates the body invariant.
    pub fn add_method(
        &mut self,
        declaring_type: Token,
        name: &str,
        flags: MethodAttributes,
        signature: MethodSignature,
        body: Option<MethodBody>,
    ) -> Result<Token> {
        let type_index = self
            .type_index(declaring_type)
            .ok_or_else(|| Error::UnresolvedReference(format!("Type {declaring_type}")))?;

        if let Some(body) = &body {
            body.validate()?;
        }

        self.method_count += 1;
        let token = Token::from_parts(Token::METHOD_DEF, self.method_count);
        let methods = &mut self.types[type_index].methods;
        self.method_index
            .insert(token, (type_index, methods.len()));
        methods.push(MethodDef {
            token,
            name: name.to_string(),
            flags,
            signature,
            body,
        });
        self.metadata_generation += 1;
        Ok(token)
    }

    /// Return the reference to module `name`, adding it if needed.
    pub fn add_module_ref(&mut self, name: &str) -> Token {
        if let Some(existing) = self.module_refs.iter().find(|m| m.name == name) {
            return existing.token;
        }

        let token = Token::from_parts(Token::MODULE_REF, self.module_refs.len() as u32 + 1);
        self.module_refs.push(ModuleRef {
            token,
            name: name.to_string(),
        });
        self.metadata_generation += 1;
        token
    }

    /// Return the reference to type `Namespace.Name` in `scope`, adding it if needed.
    pub fn add_type_ref(&mut self, scope: Token, qualified: &str) -> Token {
        let (namespace, name) = split_qualified(qualified);
        if let Some(existing) = self
            .type_refs
            .iter()
            .find(|t| t.scope == scope && t.namespace == namespace && t.name == name)
        {
            return existing.token;
        }

        let token = Token::from_parts(Token::TYPE_REF, self.type_refs.len() as u32 + 1);
        self.type_refs.push(TypeRef {
            token,
            scope,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.metadata_generation += 1;
        token
    }

    /// Return the reference to member `name` of `parent`, adding it if needed.
    pub fn add_member_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: MethodSignature,
    ) -> Token {
        if let Some(existing) = self
            .member_refs
            .iter()
            .find(|m| m.parent == parent && m.name == name && m.signature == signature)
        {
            return existing.token;
        }

        let token = Token::from_parts(Token::MEMBER_REF, self.member_refs.len() as u32 + 1);
        self.member_refs.push(MemberRef {
            token,
            parent,
            name: name.to_string(),
            signature,
        });
        self.metadata_generation += 1;
        token
    }

    /// Embed a resource, replacing one with the same name.
    pub fn add_resource(&mut self, name: &str, data: Vec<u8>) {
        match self.resources.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.data = data,
            None => self.resources.push(Resource {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Resource by exact name
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    fn type_index(&self, token: Token) -> Option<usize> {
        if !token.is_table(Token::TYPE_DEF) {
            return None;
        }
        token.index().filter(|index| *index < self.types.len())
    }

    /// Type definition by token
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        self.type_index(token).map(|index| &self.types[index])
    }

    /// Type definition by qualified name
    #[must_use]
    pub fn find_type(&self, qualified: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.is(qualified))
    }

    /// Type reference by qualified name
    #[must_use]
    pub fn find_type_ref(&self, qualified: &str) -> Option<&TypeRef> {
        let (namespace, name) = split_qualified(qualified);
        self.type_refs
            .iter()
            .find(|t| t.namespace == namespace && t.name == name)
    }

    /// Type reference by token
    #[must_use]
    pub fn type_ref(&self, token: Token) -> Option<&TypeRef> {
        if !token.is_table(Token::TYPE_REF) {
            return None;
        }
        token.index().and_then(|index| self.type_refs.get(index))
    }

    /// Member reference by token
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberRef> {
        if !token.is_table(Token::MEMBER_REF) {
            return None;
        }
        token.index().and_then(|index| self.member_refs.get(index))
    }

    /// Module reference by token
    #[must_use]
    pub fn module_ref(&self, token: Token) -> Option<&ModuleRef> {
        if !token.is_table(Token::MODULE_REF) {
            return None;
        }
        token.index().and_then(|index| self.module_refs.get(index))
    }

    /// Method by token
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        self.method_index
            .get(&token)
            .map(|(t, m)| &self.types[*t].methods[*m])
    }

    /// Mutable method by token
    pub fn method_mut(&mut self, token: Token) -> Option<&mut MethodDef> {
        let (t, m) = *self.method_index.get(&token)?;
        Some(&mut self.types[t].methods[m])
    }

    /// Declaring type of a method
    #[must_use]
    pub fn declaring_type(&self, method: Token) -> Option<&TypeDef> {
        self.method_index.get(&method).map(|(t, _)| &self.types[*t])
    }

    /// All methods of all types, in definition order
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.types.iter().flat_map(|t| t.methods.iter())
    }

    /// Method of `qualified_type` named `name` whose parameter types are exactly `params`.
    #[must_use]
    pub fn function<S: AsRef<str>>(
        &self,
        qualified_type: &str,
        name: &str,
        params: &[S],
    ) -> Option<&MethodDef> {
        self.find_type(qualified_type)?
            .methods
            .iter()
            .find(|m| m.name == name && m.signature.matches_params(params))
    }

    /// Restore table state while decoding an image.
    pub(crate) fn push_decoded(
        &mut self,
        module_refs: Vec<ModuleRef>,
        type_refs: Vec<TypeRef>,
        member_refs: Vec<MemberRef>,
        resources: Vec<Resource>,
    ) {
        self.module_refs = module_refs;
        self.type_refs = type_refs;
        self.member_refs = member_refs;
        self.resources = resources;
    }

    /// Define a decoded method with its original token.
    pub(crate) fn push_decoded_method(&mut self, type_index: usize, method: MethodDef) {
        let methods = &mut self.types[type_index].methods;
        self.method_index
            .insert(method.token, (type_index, methods.len()));
        self.method_count = self.method_count.max(method.token.row());
        methods.push(method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::TypeSignature;

    #[test]
    fn references_are_deduplicated() {
        let mut module = CompiledModule::new("Game");
        let before = module.metadata_generation();

        let scope = module.add_module_ref("Prism");
        assert_eq!(module.add_module_ref("Prism"), scope);

        let hooks = module.add_type_ref(scope, "Prism.Hooks");
        assert_eq!(module.add_type_ref(scope, "Prism.Hooks"), hooks);
        assert_eq!(hooks, Token(0x0100_0001));

        let sig = MethodSignature::static_method(TypeSignature::Void, vec![]);
        let member = module.add_member_ref(hooks, "OnUpdate", sig.clone());
        assert_eq!(module.add_member_ref(hooks, "OnUpdate", sig), member);
        assert_eq!(member, Token(0x0A00_0001));

        assert_eq!(module.metadata_generation(), before + 3);
        assert_eq!(module.member_ref(member).unwrap().name, "OnUpdate");
        assert_eq!(
            module.type_ref(hooks).unwrap().full_name(),
            "Prism.Hooks"
        );
    }

    #[test]
    fn function_requires_exact_params() {
        let mut module = CompiledModule::new("Game");
        let item = module.add_type("Terraria", "Item");
        for params in [vec![], vec![TypeSignature::I4]] {
            module
                .add_method(
                    item,
                    "SetDefaults",
                    MethodAttributes::PUBLIC,
                    MethodSignature::instance_method(TypeSignature::Void, params),
                    Some(MethodBody::new(vec![])),
                )
                .unwrap();
        }

        let by_int = module
            .function("Terraria.Item", "SetDefaults", &["System.Int32"])
            .unwrap();
        assert_eq!(by_int.token, Token(0x0600_0002));
        assert_eq!(module.declaring_type(by_int.token).unwrap().token, item);
        assert!(module
            .function("Terraria.Item", "SetDefaults", &["System.Int64"])
            .is_none());
        assert!(module
            .function("Terraria.Npc", "SetDefaults", &[] as &[&str])
            .is_none());
    }

    #[test]
    fn add_method_to_unknown_type() {
        let mut module = CompiledModule::new("Game");
        let result = module.add_method(
            Token(0x0200_0001),
            "Nope",
            MethodAttributes::STATIC,
            MethodSignature::static_method(TypeSignature::Void, vec![]),
            None,
        );
        assert!(matches!(result, Err(Error::UnresolvedReference(_))));
    }

    #[test]
    fn qualified_names() {
        assert_eq!(split_qualified("A.B.C"), ("A.B", "C"));
        assert_eq!(split_qualified("Main"), ("", "Main"));
        assert_eq!(join_qualified("", "Main"), "Main");
    }

    #[test]
    fn load_missing_file_reports_path() {
        let result = CompiledModule::load("/nonexistent/Game.cmod");
        match result {
            Err(Error::Load { path, source }) => {
                assert!(path.ends_with("Game.cmod"));
                assert!(matches!(*source, Error::FileError(_)));
            }
            _ => panic!("Expected Load error"),
        }
    }
}

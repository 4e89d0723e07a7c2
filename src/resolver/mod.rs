//! Resolution of logical type and method references.
//!
//! The [`Resolver`] turns names (`Terraria.Main`, `Update`, `[System.Int32]`) into tokens that
//! are valid inside one target module. Types and methods of the target module resolve to their
//! definitions. Anything defined elsewhere resolves through a [`ModuleResolver`] strategy and
//! is imported into the target module as a module reference, a type reference and, for
//! methods, a member reference. Imports are deduplicated, resolving the same name twice yields
//! the same token.
//!
//! Results are cached per target module. The cache is dropped whenever the module's metadata
//! generation moved on without the resolver's involvement.
//!
//! ```rust
//! use std::sync::Arc;
//! use cilsplice::prelude::*;
//! use cilsplice::resolver::{HostMethod, StaticModules};
//!
//! let mut hooks = CompiledModule::new("Prism");
//! let ty = hooks.add_type("Prism", "Hooks");
//! hooks.add_method(
//!     ty,
//!     "OnLog",
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     MethodSignature::static_method(TypeSignature::Void, vec![TypeSignature::String]),
//!     Some(MethodBody::new(vec![Instruction::new(OpCode::Ret)])),
//! )?;
//!
//! let mut game = CompiledModule::new("Game");
//! let mut resolver = Resolver::new(Arc::new(StaticModules::new().with(hooks)));
//!
//! let on_log = resolver.method_of(
//!     &mut game,
//!     &HostMethod::of::<fn(String)>("Prism", "Prism.Hooks", "OnLog"),
//! )?;
//! assert_eq!(on_log.token, Token(0x0A00_0001));
//! assert_eq!(game.module_refs()[0].name, "Prism");
//! # Ok::<(), cilsplice::Error>(())
//! ```

mod host;
mod modules;

pub use host::{HostMethod, HostSignature, HostType, Object};
pub use modules::{
    ChainResolver, DirectoryResolver, ModuleResolver, RedirectResolver, ResourceResolver,
    StaticModules,
};

use std::{collections::HashMap, sync::Arc};

use uguid::Guid;

use crate::{
    metadata::{module::CompiledModule, signatures::MethodSignature, token::Token},
    Error, Result,
};

/// A type usable from the target module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    /// `TypeDef` or `TypeRef` token in the target module
    pub token: Token,
    /// `Namespace.Name`
    pub qualified: String,
    /// Name of the defining module, `None` for types defined in the target module
    pub external: Option<String>,
}

/// A method usable from the target module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// `MethodDef` or `MemberRef` token in the target module, the operand of a call
    pub token: Token,
    /// Declaring type
    pub declaring_type: TypeHandle,
    /// Method name
    pub name: String,
    /// Signature of the resolved method
    pub signature: MethodSignature,
}

type TypeKey = (String, Option<String>);
type MethodKey = (String, String, Vec<String>, Option<String>);

/// Resolves names against a target module and the modules it can reach.
pub struct Resolver {
    modules: Arc<dyn ModuleResolver>,
    types: HashMap<TypeKey, TypeHandle>,
    methods: HashMap<MethodKey, MethodHandle>,
    state: Option<(Guid, u64)>,
}

impl Resolver {
    /// Create a resolver that finds other modules through `modules`
    #[must_use]
    pub fn new(modules: Arc<dyn ModuleResolver>) -> Self {
        Resolver {
            modules,
            types: HashMap::new(),
            methods: HashMap::new(),
            state: None,
        }
    }

    /// A resolver that only sees the target module and its existing references
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(Arc::new(StaticModules::new()))
    }

    /// The module resolution strategy
    #[must_use]
    pub fn modules(&self) -> &Arc<dyn ModuleResolver> {
        &self.modules
    }

    /// Drop all cached results
    pub fn invalidate(&mut self) {
        self.types.clear();
        self.methods.clear();
        self.state = None;
    }

    fn sync(&mut self, module: &CompiledModule) {
        let current = (module.mvid(), module.metadata_generation());
        if self.state.is_some_and(|state| state != current) {
            log::trace!("Metadata of '{}' changed, dropping resolver cache", module.name());
            self.types.clear();
            self.methods.clear();
        }
    }

    fn record(&mut self, module: &CompiledModule) {
        self.state = Some((module.mvid(), module.metadata_generation()));
    }

    /// Resolve `qualified` (`Namespace.Name`) to a type usable in `module`.
    ///
    /// Search order: types defined in `module`, its existing type references, then the types
    /// of other modules, first those `module` already references, then the modules the
    /// strategy knows.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if no module defines the type.
    pub fn resolve_type(
        &mut self,
        module: &mut CompiledModule,
        qualified: &str,
    ) -> Result<TypeHandle> {
        self.resolve_type_hinted(module, qualified, None)
    }

    fn resolve_type_hinted(
        &mut self,
        module: &mut CompiledModule,
        qualified: &str,
        hint: Option<&str>,
    ) -> Result<TypeHandle> {
        self.sync(module);
        let key: TypeKey = (qualified.to_string(), hint.map(str::to_string));
        if let Some(cached) = self.types.get(&key) {
            return Ok(cached.clone());
        }

        let handle = self.lookup_type(module, qualified, hint)?;
        log::trace!("Resolved type {qualified} to {}", handle.token);

        self.types.insert(key, handle.clone());
        self.record(module);
        Ok(handle)
    }

    fn lookup_type(
        &self,
        module: &mut CompiledModule,
        qualified: &str,
        hint: Option<&str>,
    ) -> Result<TypeHandle> {
        if let Some(def) = module.find_type(qualified) {
            return Ok(TypeHandle {
                token: def.token,
                qualified: qualified.to_string(),
                external: None,
            });
        }

        // With a hint, only a reference into the hinted module counts
        let existing = match hint {
            Some(hint) => module.type_refs().iter().find(|t| {
                t.full_name() == qualified
                    && module.module_ref(t.scope).is_some_and(|m| m.name == hint)
            }),
            None => module.find_type_ref(qualified),
        };
        if let Some(existing) = existing {
            return Ok(TypeHandle {
                token: existing.token,
                qualified: qualified.to_string(),
                external: module.module_ref(existing.scope).map(|m| m.name.clone()),
            });
        }

        let mut candidates: Vec<String> = hint.map(str::to_string).into_iter().collect();
        for name in module
            .module_refs()
            .iter()
            .map(|m| m.name.clone())
            .chain(self.modules.known_modules())
        {
            if name != module.name() && !candidates.contains(&name) {
                candidates.push(name);
            }
        }

        for candidate in candidates {
            let Some(external) = self.modules.resolve_module(&candidate) else {
                continue;
            };

            if external.find_type(qualified).is_some() {
                let scope = module.add_module_ref(&candidate);
                let token = module.add_type_ref(scope, qualified);
                log::debug!("Imported type {qualified} from '{candidate}' as {token}");

                return Ok(TypeHandle {
                    token,
                    qualified: qualified.to_string(),
                    external: Some(candidate),
                });
            }
        }

        Err(Error::UnresolvedReference(format!("Type {qualified}")))
    }

    /// Resolve the method `name` of `qualified_type` whose parameter types are exactly
    /// `params` (qualified names).
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if the type or the method cannot be found.
    pub fn resolve_method<S: AsRef<str>>(
        &mut self,
        module: &mut CompiledModule,
        qualified_type: &str,
        name: &str,
        params: &[S],
    ) -> Result<MethodHandle> {
        self.resolve_method_hinted(module, qualified_type, name, params, None)
    }

    fn resolve_method_hinted<S: AsRef<str>>(
        &mut self,
        module: &mut CompiledModule,
        qualified_type: &str,
        name: &str,
        params: &[S],
        hint: Option<&str>,
    ) -> Result<MethodHandle> {
        self.sync(module);
        let key: MethodKey = (
            qualified_type.to_string(),
            name.to_string(),
            params.iter().map(|p| p.as_ref().trim().to_string()).collect(),
            hint.map(str::to_string),
        );
        if let Some(cached) = self.methods.get(&key) {
            return Ok(cached.clone());
        }

        let declaring_type = self.resolve_type_hinted(module, qualified_type, hint)?;
        let handle = self.lookup_method(module, declaring_type, name, params)?;
        log::trace!(
            "Resolved method {qualified_type}::{name} {} to {}",
            handle.signature,
            handle.token
        );

        self.methods.insert(key, handle.clone());
        self.record(module);
        Ok(handle)
    }

    fn lookup_method<S: AsRef<str>>(
        &self,
        module: &mut CompiledModule,
        declaring_type: TypeHandle,
        name: &str,
        params: &[S],
    ) -> Result<MethodHandle> {
        let unresolved = || {
            Error::UnresolvedReference(format!(
                "Method {}::{}({})",
                declaring_type.qualified,
                name,
                params
                    .iter()
                    .map(|p| p.as_ref().to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ))
        };

        let Some(external) = declaring_type.external.clone() else {
            let method = module
                .function(&declaring_type.qualified, name, params)
                .ok_or_else(unresolved)?;
            return Ok(MethodHandle {
                token: method.token,
                name: name.to_string(),
                signature: method.signature.clone(),
                declaring_type,
            });
        };

        if let Some(existing) = module.member_refs().iter().find(|m| {
            m.parent == declaring_type.token && m.name == name && m.signature.matches_params(params)
        }) {
            return Ok(MethodHandle {
                token: existing.token,
                name: name.to_string(),
                signature: existing.signature.clone(),
                declaring_type,
            });
        }

        let signature = self
            .modules
            .resolve_module(&external)
            .and_then(|m| {
                m.function(&declaring_type.qualified, name, params)
                    .map(|f| f.signature.clone())
            })
            .ok_or_else(unresolved)?;

        let token = module.add_member_ref(declaring_type.token, name, signature.clone());
        log::debug!(
            "Imported method {}::{name} from '{external}' as {token}",
            declaring_type.qualified
        );

        Ok(MethodHandle {
            token,
            name: name.to_string(),
            signature,
            declaring_type,
        })
    }

    /// Resolve the method a host function stands for.
    ///
    /// The module named by `host` is searched first. The resolved method must agree with the
    /// host signature in its return type and calling convention.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if no such method exists.
    pub fn method_of(
        &mut self,
        module: &mut CompiledModule,
        host: &HostMethod,
    ) -> Result<MethodHandle> {
        let hint = (host.module != module.name()).then_some(host.module.as_str());
        let params = host.param_names();
        let handle = self.resolve_method_hinted(
            module,
            &host.type_name,
            &host.name,
            params.as_slice(),
            hint,
        )?;

        if handle.signature != host.signature {
            return Err(Error::UnresolvedReference(format!(
                "Method {}::{} is '{}', expected '{}'",
                host.type_name, host.name, handle.signature, host.signature
            )));
        }

        Ok(handle)
    }
}

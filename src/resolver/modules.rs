//! Strategies that locate referenced modules by name.
//!
//! The [`super::Resolver`] never knows where modules live. It asks a [`ModuleResolver`],
//! which makes cross-module redirection (e.g. resolving `Terraria` to an already patched
//! `Prism.Terraria`) a matter of composing strategies:
//!
//! ```rust
//! use std::sync::Arc;
//! use cilsplice::{resolver::{ChainResolver, ModuleResolver, RedirectResolver, StaticModules}, CompiledModule};
//!
//! let patched = StaticModules::new().with(CompiledModule::new("Prism.Terraria"));
//! let strategy = ChainResolver::new()
//!     .push(RedirectResolver::new(patched).redirect("Terraria", "Prism.Terraria"))
//!     .push(StaticModules::new().with(CompiledModule::new("Prism")));
//!
//! assert_eq!(strategy.resolve_module("Terraria").unwrap().name(), "Prism.Terraria");
//! assert_eq!(strategy.resolve_module("Prism").unwrap().name(), "Prism");
//! assert!(strategy.resolve_module("mscorlib").is_none());
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;

use crate::metadata::{
    image::{MODULE_EXTENSION, SYMBOL_EXTENSION},
    module::CompiledModule,
};

/// Resolves a module name to a loaded module.
///
/// Implementations are shared between threads by [`crate::patch_parallel`].
pub trait ModuleResolver: Send + Sync {
    /// Return the module named `name` (without extension), `None` if unknown.
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>>;

    /// Names this strategy can resolve without probing, searched when a type is not
    /// reachable through the module references of the target module.
    fn known_modules(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<T: ModuleResolver + ?Sized> ModuleResolver for Arc<T> {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        (**self).resolve_module(name)
    }

    fn known_modules(&self) -> Vec<String> {
        (**self).known_modules()
    }
}

/// An explicit table of modules.
#[derive(Default)]
pub struct StaticModules {
    modules: HashMap<String, Arc<CompiledModule>>,
}

impl StaticModules {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `module` under its own name
    #[must_use]
    pub fn with(mut self, module: CompiledModule) -> Self {
        self.insert(Arc::new(module));
        self
    }

    /// Add or replace `module` under its own name
    pub fn insert(&mut self, module: Arc<CompiledModule>) {
        self.modules.insert(module.name().to_string(), module);
    }
}

impl ModuleResolver for StaticModules {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        self.modules.get(name).cloned()
    }

    fn known_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolves some names as other names, then delegates.
pub struct RedirectResolver<R> {
    inner: R,
    redirects: HashMap<String, String>,
}

impl<R: ModuleResolver> RedirectResolver<R> {
    /// Wrap `inner` without any redirects
    pub fn new(inner: R) -> Self {
        RedirectResolver {
            inner,
            redirects: HashMap::new(),
        }
    }

    /// Resolve `from` as `to`
    #[must_use]
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }
}

impl<R: ModuleResolver> ModuleResolver for RedirectResolver<R> {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        match self.redirects.get(name) {
            Some(target) => {
                log::trace!("Redirecting module '{name}' to '{target}'");
                self.inner.resolve_module(target)
            }
            None => self.inner.resolve_module(name),
        }
    }

    fn known_modules(&self) -> Vec<String> {
        self.inner.known_modules()
    }
}

/// Loads modules embedded as resources of container modules.
///
/// A module `Name` is found in the first container with a resource whose name ends in
/// `Name.cmod`. A resource ending in `Name.pdb` in the same container is attached as its
/// debug symbols.
pub struct ResourceResolver {
    containers: Vec<Arc<CompiledModule>>,
    cache: DashMap<String, Arc<CompiledModule>>,
}

impl ResourceResolver {
    /// Search `containers` in order
    #[must_use]
    pub fn new(containers: Vec<Arc<CompiledModule>>) -> Self {
        ResourceResolver {
            containers,
            cache: DashMap::new(),
        }
    }

    fn load_from(container: &CompiledModule, name: &str) -> Option<CompiledModule> {
        let file_name = format!("{name}{MODULE_EXTENSION}");
        let symbol_name = format!("{name}{SYMBOL_EXTENSION}");

        let resource = container
            .resources()
            .iter()
            .find(|r| r.name.ends_with(&file_name))?;

        let mut module = match CompiledModule::from_bytes(resource.data.clone()) {
            Ok(module) => module,
            Err(error) => {
                log::warn!(
                    "Resource '{}' of '{}' is not a loadable module - {error}",
                    resource.name,
                    container.name()
                );
                return None;
            }
        };

        if let Some(symbols) = container
            .resources()
            .iter()
            .find(|r| r.name.ends_with(&symbol_name))
        {
            module.set_debug_symbols(Some(symbols.data.clone()));
        }

        Some(module)
    }
}

impl ModuleResolver for ResourceResolver {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        if let Some(cached) = self.cache.get(name) {
            return Some(cached.clone());
        }

        let module = Arc::new(
            self.containers
                .iter()
                .find_map(|container| Self::load_from(container, name))?,
        );
        self.cache.insert(name.to_string(), module.clone());
        Some(module)
    }
}

/// Probes directories for `<name>.cmod` files.
pub struct DirectoryResolver {
    directories: Vec<PathBuf>,
    cache: DashMap<String, Arc<CompiledModule>>,
}

impl DirectoryResolver {
    /// Search `directories` in order
    #[must_use]
    pub fn new<P: AsRef<Path>>(directories: &[P]) -> Self {
        DirectoryResolver {
            directories: directories.iter().map(|d| d.as_ref().to_path_buf()).collect(),
            cache: DashMap::new(),
        }
    }

    fn load_from(directory: &Path, name: &str) -> Option<CompiledModule> {
        let path = directory.join(format!("{name}{MODULE_EXTENSION}"));
        if !path.is_file() {
            return None;
        }

        let mut module = match CompiledModule::load(&path) {
            Ok(module) => module,
            Err(error) => {
                log::warn!("Skipping {} - {error}", path.display());
                return None;
            }
        };

        let symbols = path.with_extension(SYMBOL_EXTENSION.trim_start_matches('.'));
        if let Ok(data) = std::fs::read(&symbols) {
            module.set_debug_symbols(Some(data));
        }

        Some(module)
    }
}

impl ModuleResolver for DirectoryResolver {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        if let Some(cached) = self.cache.get(name) {
            return Some(cached.clone());
        }

        let module = Arc::new(
            self.directories
                .iter()
                .find_map(|directory| Self::load_from(directory, name))?,
        );
        self.cache.insert(name.to_string(), module.clone());
        Some(module)
    }

    fn known_modules(&self) -> Vec<String> {
        let mut names = Vec::new();
        for directory in &self.directories {
            let Ok(entries) = std::fs::read_dir(directory) else {
                continue;
            };

            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if let Some(stem) = file_name.strip_suffix(MODULE_EXTENSION) {
                    if !names.iter().any(|n| n == stem) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        names.sort();
        names
    }
}

/// Tries strategies in order, the first hit wins. Later strategies are not consulted.
#[derive(Default)]
pub struct ChainResolver {
    strategies: Vec<Box<dyn ModuleResolver>>,
}

impl ChainResolver {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy
    #[must_use]
    pub fn push(mut self, strategy: impl ModuleResolver + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }
}

impl ModuleResolver for ChainResolver {
    fn resolve_module(&self, name: &str) -> Option<Arc<CompiledModule>> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.resolve_module(name))
    }

    fn known_modules(&self) -> Vec<String> {
        let mut names = Vec::new();
        for name in self.strategies.iter().flat_map(|s| s.known_modules()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test::factories::prism_module;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl ModuleResolver for Counting {
        fn resolve_module(&self, _name: &str) -> Option<Arc<CompiledModule>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[test]
    fn chain_stops_at_first_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ChainResolver::new()
            .push(StaticModules::new().with(prism_module()))
            .push(Counting {
                calls: calls.clone(),
            });

        assert!(chain.resolve_module("Prism").is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(chain.resolve_module("Other").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.known_modules(), vec!["Prism".to_string()]);
    }

    #[test]
    fn redirect_only_renames_listed_modules() {
        let modules = StaticModules::new()
            .with(CompiledModule::new("Prism.Terraria"))
            .with(CompiledModule::new("Terraria"));
        let resolver = RedirectResolver::new(modules).redirect("Terraria", "Prism.Terraria");

        assert_eq!(
            resolver.resolve_module("Terraria").unwrap().name(),
            "Prism.Terraria"
        );
        assert_eq!(
            resolver.resolve_module("Prism.Terraria").unwrap().name(),
            "Prism.Terraria"
        );
    }

    #[test]
    fn embedded_module_with_symbols() {
        let embedded = prism_module().to_bytes().unwrap();

        let mut container = CompiledModule::new("Launcher");
        container.add_resource("Launcher.Resources.Prism.cmod", embedded);
        container.add_resource("Launcher.Resources.Prism.pdb", vec![1, 2, 3]);
        container.add_resource("Launcher.Resources.Broken.cmod", vec![0xFF; 8]);

        let resolver = ResourceResolver::new(vec![Arc::new(container)]);
        let prism = resolver.resolve_module("Prism").unwrap();
        assert_eq!(prism.name(), "Prism");
        assert_eq!(prism.debug_symbols(), Some([1_u8, 2, 3].as_slice()));
        assert!(Arc::ptr_eq(&prism, &resolver.resolve_module("Prism").unwrap()));

        assert!(resolver.resolve_module("Broken").is_none());
        assert!(resolver.resolve_module("Missing").is_none());
    }

    #[test]
    fn directory_probe() {
        let dir = std::env::temp_dir().join(format!("cilsplice-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        prism_module().write(dir.join("Prism.cmod")).unwrap();
        std::fs::write(dir.join("Prism.pdb"), [9_u8]).unwrap();

        let resolver = DirectoryResolver::new(&[&dir]);
        assert_eq!(resolver.known_modules(), vec!["Prism".to_string()]);

        let prism = resolver.resolve_module("Prism").unwrap();
        assert_eq!(prism.types().len(), 1);
        assert_eq!(prism.debug_symbols(), Some([9_u8].as_slice()));
        assert!(resolver.resolve_module("Terraria").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

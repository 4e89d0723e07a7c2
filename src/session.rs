//! Patch sessions.
//!
//! A [`PatchSession`] owns one target module together with the [`Resolver`] that imports
//! references into it and the [`InjectionConfig`] its batches run with. It is the usual entry
//! point for a patch: open, resolve the methods to hook, inject, write.
//!
//! Sessions share nothing but the module resolution strategy, so independent modules can be
//! patched concurrently with [`patch_parallel`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;

use crate::{
    injection::{inject, InjectionConfig, InjectionReport, InjectionSpec},
    metadata::module::CompiledModule,
    resolver::{HostMethod, MethodHandle, ModuleResolver, Resolver, TypeHandle},
    Result,
};

/// One target module under patch.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cilsplice::prelude::*;
/// use cilsplice::resolver::{HostMethod, RedirectResolver, DirectoryResolver};
///
/// let modules = Arc::new(RedirectResolver::new(DirectoryResolver::new(&["lib"]))
///     .redirect("Terraria", "Prism.Terraria"));
/// let mut session = PatchSession::open("Terraria.cmod", modules)?;
///
/// let write_line = session.method_of(
///     &HostMethod::of::<fn(String)>("mscorlib", "System.Console", "WriteLine"),
/// )?;
/// let update = session.resolve_method("Terraria.Main", "Update", &[] as &[&str])?;
///
/// let hello = Emitter::new().ldstr("Hello, world").call(write_line.token).finish()?;
/// session.inject(vec![
///     InjectionSpec::method(update.token, InjectionPosition::Pre, hello.clone()),
///     InjectionSpec::at_index(update.token, 5, InjectionPosition::Post, hello),
/// ])?;
///
/// session.write("Prism.Terraria.cmod")?;
/// # Ok::<(), cilsplice::Error>(())
/// ```
pub struct PatchSession {
    module: CompiledModule,
    resolver: Resolver,
    config: InjectionConfig,
}

impl PatchSession {
    /// Start a session on `module`, resolving other modules through `modules`
    #[must_use]
    pub fn new(module: CompiledModule, modules: Arc<dyn ModuleResolver>) -> Self {
        PatchSession {
            module,
            resolver: Resolver::new(modules),
            config: InjectionConfig::default(),
        }
    }

    /// Load the module at `path` and start a session on it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Load`] if the module cannot be loaded.
    pub fn open(path: impl AsRef<Path>, modules: Arc<dyn ModuleResolver>) -> Result<Self> {
        Ok(Self::new(CompiledModule::load(path)?, modules))
    }

    /// Use `config` for every following batch
    #[must_use]
    pub fn with_config(mut self, config: InjectionConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    /// See [`Resolver::resolve_type`].
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if the type cannot be found.
    pub fn resolve_type(&mut self, qualified: &str) -> Result<TypeHandle> {
        self.resolver.resolve_type(&mut self.module, qualified)
    }

    /// See [`Resolver::resolve_method`].
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if the method cannot be found.
    pub fn resolve_method<S: AsRef<str>>(
        &mut self,
        qualified_type: &str,
        name: &str,
        params: &[S],
    ) -> Result<MethodHandle> {
        self.resolver
            .resolve_method(&mut self.module, qualified_type, name, params)
    }

    /// See [`Resolver::method_of`].
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedReference`] if the method cannot be found.
    pub fn method_of(&mut self, host: &HostMethod) -> Result<MethodHandle> {
        self.resolver.method_of(&mut self.module, host)
    }

    /// Apply a batch, see [`crate::inject`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Injection`] for the first failing spec.
    pub fn inject(
        &mut self,
        specs: impl IntoIterator<Item = InjectionSpec>,
    ) -> Result<InjectionReport> {
        inject(&mut self.module, specs, &self.config)
    }

    /// Write the current state of the module to `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Write`] if encoding or writing fails.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.module.write(path)
    }

    /// The module under patch
    #[must_use]
    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    /// Mutable access to the module under patch
    pub fn module_mut(&mut self) -> &mut CompiledModule {
        &mut self.module
    }

    /// End the session and return the module
    #[must_use]
    pub fn into_module(self) -> CompiledModule {
        self.module
    }
}

type BuildFn = dyn Fn(&mut PatchSession) -> Result<Vec<InjectionSpec>> + Send + Sync;

/// A load, patch, write job for [`patch_parallel`].
pub struct PatchJob {
    /// Module to load
    pub input: PathBuf,
    /// Destination of the patched module
    pub output: PathBuf,
    build: Box<BuildFn>,
}

impl PatchJob {
    /// Patch `input` into `output` with the specs `build` produces for the opened session.
    pub fn new<F>(input: impl Into<PathBuf>, output: impl Into<PathBuf>, build: F) -> Self
    where
        F: Fn(&mut PatchSession) -> Result<Vec<InjectionSpec>> + Send + Sync + 'static,
    {
        PatchJob {
            input: input.into(),
            output: output.into(),
            build: Box::new(build),
        }
    }

    fn run(
        &self,
        modules: Arc<dyn ModuleResolver>,
        config: InjectionConfig,
    ) -> Result<InjectionReport> {
        let mut session = PatchSession::open(&self.input, modules)?.with_config(config);
        let specs = (self.build)(&mut session)?;
        let report = session.inject(specs)?;
        session.write(&self.output)?;

        log::debug!(
            "Patched {} into {} ({} instructions added)",
            self.input.display(),
            self.output.display(),
            report.inserted()
        );
        Ok(report)
    }
}

/// Run independent jobs on the rayon pool.
///
/// Every job gets its own session. A job writes its output only if its whole batch succeeded.
/// Results are returned in job order.
pub fn patch_parallel(
    jobs: &[PatchJob],
    modules: Arc<dyn ModuleResolver>,
    config: &InjectionConfig,
) -> Vec<Result<InjectionReport>> {
    jobs.par_iter()
        .map(|job| job.run(modules.clone(), *config))
        .collect()
}

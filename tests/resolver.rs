//! Cross-module resolution and redirection.

mod common;

use std::sync::Arc;

use cilsplice::{
    prelude::*,
    resolver::{ChainResolver, HostMethod, RedirectResolver, ResourceResolver, StaticModules},
    Error,
};
use common::{prism, terraria};

#[test]
fn imports_are_deduplicated() -> Result<()> {
    let mut module = terraria();
    let mut resolver = Resolver::new(Arc::new(StaticModules::new().with(prism())));

    let first = resolver.resolve_method(&mut module, "Prism.Hooks", "OnLog", &["System.String"])?;
    let generation = module.metadata_generation();

    resolver.invalidate();
    let second = resolver.resolve_method(&mut module, "Prism.Hooks", "OnLog", &["System.String"])?;

    assert_eq!(first, second);
    assert_eq!(module.metadata_generation(), generation);
    assert_eq!(
        module.module_refs().iter().filter(|m| m.name == "Prism").count(),
        1
    );
    assert_eq!(first.declaring_type.external.as_deref(), Some("Prism"));
    Ok(())
}

#[test]
fn unresolvable_references() {
    let mut module = terraria();
    let mut resolver = Resolver::standalone();

    for (ty, name) in [("Prism.Hooks", "OnLog"), ("Terraria.Main", "Draw")] {
        let result = resolver.resolve_method(&mut module, ty, name, &["System.String"]);
        assert!(matches!(result, Err(Error::UnresolvedReference(_))));
    }

    // Overloads are told apart by their parameters
    assert!(resolver
        .resolve_method(&mut module, "Terraria.Main", "DrawMenu", &["System.Int64"])
        .is_err());
    assert!(resolver
        .resolve_method(&mut module, "Terraria.Main", "DrawMenu", &["System.Int32"])
        .is_ok());
}

#[test]
fn redirected_and_embedded_modules() -> Result<()> {
    // A launcher embedding the patched game and a library
    let mut patched = terraria();
    patched.add_type("Terraria", "Hooked");
    let mut launcher = CompiledModule::new("Prism.Launcher");
    launcher.add_resource("Prism.Launcher.Prism.Terraria.cmod", patched.to_bytes()?);
    launcher.add_resource("Prism.Launcher.Prism.cmod", prism().to_bytes()?);

    let embedded = Arc::new(ResourceResolver::new(vec![Arc::new(launcher)]));
    let strategy = ChainResolver::new()
        .push(RedirectResolver::new(embedded.clone()).redirect("Terraria", "Prism.Terraria"))
        .push(embedded);

    let mut library = CompiledModule::new("Prism.Mods");
    let scope = library.add_module_ref("Terraria");
    library.add_type_ref(scope, "Terraria.Main");

    let mut resolver = Resolver::new(Arc::new(strategy));
    let hooked = resolver.resolve_type(&mut library, "Terraria.Hooked")?;
    assert_eq!(hooked.external.as_deref(), Some("Terraria"));
    assert_eq!(library.type_ref(hooked.token).unwrap().scope, scope);

    let on_log = resolver.method_of(
        &mut library,
        &HostMethod::of::<fn(String)>("Prism", "Prism.Hooks", "OnLog"),
    )?;
    assert_eq!(library.member_ref(on_log.token).unwrap().name, "OnLog");
    Ok(())
}

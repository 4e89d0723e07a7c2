//! Load, patch, write and reload through the filesystem.

mod common;

use std::sync::Arc;

use cilsplice::{
    prelude::*,
    resolver::{DirectoryResolver, StaticModules},
    Error,
};
use common::{instructions, method, prism, scratch, terraria, WRITE_LINE};

#[test]
fn write_and_reload_preserves_methods() -> Result<()> {
    let dir = scratch("roundtrip");
    let path = dir.join("Terraria.cmod");

    let original = terraria();
    original.write(&path)?;
    let mut module = CompiledModule::load(&path)?;

    let update = method(&module, "Terraria.Main", "Update");
    let save = method(&module, "Terraria.Main", "Save");
    inject(
        &mut module,
        vec![
            InjectionSpec::method(
                update,
                InjectionPosition::Pre,
                Emitter::new().ldstr("Hello, world").call(WRITE_LINE).finish()?,
            ),
            InjectionSpec::at_index(
                save,
                0,
                InjectionPosition::Post,
                Emitter::new().ldstr("é ✓").pop().finish()?,
            ),
        ],
        &InjectionConfig::strict(),
    )?;

    let patched_path = dir.join("Prism.Terraria.cmod");
    module.write(&patched_path)?;
    module.write(&patched_path)?;
    let reloaded = CompiledModule::load(&patched_path)?;

    let names = |m: &CompiledModule| -> Vec<String> {
        m.methods().map(|method| method.name.clone()).collect()
    };
    assert_eq!(names(&reloaded), names(&original));
    assert_eq!(reloaded.mvid(), original.mvid());

    for method in module.methods() {
        assert_eq!(instructions(&reloaded, method.token).len(), instructions(&module, method.token).len());
    }
    assert_eq!(instructions(&reloaded, update).len(), 13);
    assert_eq!(
        instructions(&reloaded, save)[1].operand,
        Operand::String("é ✓".to_string())
    );

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn load_errors_name_the_path() {
    let dir = scratch("load-errors");
    let bogus = dir.join("Bogus.cmod");
    std::fs::write(&bogus, b"not a module").unwrap();

    match CompiledModule::load(&bogus) {
        Err(Error::Load { path, source }) => {
            assert_eq!(path, bogus);
            assert!(matches!(*source, Error::NotSupported));
        }
        other => panic!("Expected Load error, got {:?}", other.map(|m| m.name().to_string())),
    }

    let empty = dir.join("Empty.cmod");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(
        CompiledModule::load(&empty),
        Err(Error::Load { ref source, .. }) if matches!(**source, Error::Empty)
    ));

    let result = terraria().write(dir.join("missing").join("Terraria.cmod"));
    assert!(matches!(result, Err(Error::Write { .. })));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn session_patches_against_library_directory() -> Result<()> {
    let dir = scratch("session");
    prism().write(dir.join("Prism.cmod"))?;
    terraria().write(dir.join("Terraria.cmod"))?;

    let modules = Arc::new(DirectoryResolver::new(&[&dir]));
    let mut session = PatchSession::open(dir.join("Terraria.cmod"), modules)?;

    let on_update = session.method_of(&cilsplice::resolver::HostMethod::of::<fn()>(
        "Prism",
        "Prism.Hooks",
        "OnUpdate",
    ))?;
    let update = session.resolve_method("Terraria.Main", "Update", &[] as &[&str])?;
    session.inject(vec![InjectionSpec::method(
        update.token,
        InjectionPosition::Post,
        Emitter::new().call(on_update.token).finish()?,
    )])?;
    session.write(dir.join("Patched.cmod"))?;

    let patched = CompiledModule::load(dir.join("Patched.cmod"))?;
    assert!(patched.module_refs().iter().any(|m| m.name == "Prism"));
    let hooks = patched.find_type_ref("Prism.Hooks").unwrap();
    let member = patched.member_ref(on_update.token).unwrap();
    assert_eq!(member.parent, hooks.token);
    assert_eq!(member.name, "OnUpdate");

    let body = instructions(&patched, update.token);
    assert_eq!(body[body.len() - 2].call_target(), Some(on_update.token));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn parallel_jobs_are_independent() {
    let dir = scratch("parallel");
    for name in ["A", "B", "C"] {
        terraria().write(dir.join(format!("{name}.cmod"))).unwrap();
    }

    let jobs: Vec<PatchJob> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            PatchJob::new(
                dir.join(format!("{name}.cmod")),
                dir.join(format!("{name}.out.cmod")),
                move |session| {
                    let update = session.resolve_method("Terraria.Main", "Update", &[] as &[&str])?;
                    // The third job asks for a call site that does not exist
                    let occurrence = if i == 2 { 9 } else { 1 };
                    Ok(vec![InjectionSpec::call_site(
                        update.token,
                        WRITE_LINE,
                        InjectionPosition::Pre,
                        Emitter::new().ldc_i4(i as i32).pop().finish()?,
                    )
                    .occurrence(occurrence)])
                },
            )
        })
        .collect();

    let results = patch_parallel(&jobs, Arc::new(StaticModules::new()), &InjectionConfig::default());

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().inserted(), 2);
    assert_eq!(results[1].as_ref().unwrap().inserted(), 2);
    assert_eq!(
        results[2].as_ref().unwrap_err().kind(),
        ErrorKind::AnchorNotFound
    );

    assert!(dir.join("A.out.cmod").is_file());
    assert!(dir.join("B.out.cmod").is_file());
    assert!(!dir.join("C.out.cmod").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn debug_symbols_survive_a_write() -> Result<()> {
    let dir = scratch("symbols");
    let mut module = terraria();
    module.set_debug_symbols(Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    module.write(dir.join("Terraria.cmod"))?;

    let reloaded = CompiledModule::load(dir.join("Terraria.cmod"))?;
    assert_eq!(reloaded.debug_symbols(), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

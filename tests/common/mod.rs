//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use cilsplice::{
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags},
    prelude::*,
};

/// Token of `System.Console::WriteLine(string)` in [`terraria`]
pub const WRITE_LINE: Token = Token(0x0A00_0001);

/// `len - 1` nops followed by `ret`, with `call WRITE_LINE` at `calls`
pub fn body(len: usize, calls: &[usize]) -> MethodBody {
    let mut instructions = vec![Instruction::new(OpCode::Nop); len - 1];
    instructions.push(Instruction::new(OpCode::Ret));
    for index in calls {
        instructions[*index] = Instruction::with(OpCode::Call, Operand::Token(WRITE_LINE));
    }
    MethodBody::new(instructions)
}

/// A `Terraria` module.
///
/// - `Terraria.Main::Update()`: 11 instructions, `WriteLine` calls at 2, 7 and 9
/// - `Terraria.Main::DrawMenu(int32) -> bool`: returns from two places
/// - `Terraria.Main::Save()`: a try/catch around a `ldstr`
/// - `Terraria.Item::SetDefaults(int32)`: 5 instructions
pub fn terraria() -> CompiledModule {
    let mut module = CompiledModule::new("Terraria");
    let mscorlib = module.add_module_ref("mscorlib");
    let console = module.add_type_ref(mscorlib, "System.Console");
    let write_line = module.add_member_ref(
        console,
        "WriteLine",
        MethodSignature::static_method(TypeSignature::Void, vec![TypeSignature::String]),
    );
    assert_eq!(write_line, WRITE_LINE);

    let main = module.add_type("Terraria", "Main");
    module
        .add_method(
            main,
            "Update",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(body(11, &[2, 7, 9])),
        )
        .unwrap();

    let draw_menu = Emitter::new()
        .ldarg(1)
        .brfalse("zero")
        .ldc_i4(1)
        .ret()
        .label("zero")
        .ldc_i4(0)
        .ret()
        .finish()
        .unwrap();
    module
        .add_method(
            main,
            "DrawMenu",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Boolean, vec![TypeSignature::I4]),
            Some(MethodBody::new(draw_menu)),
        )
        .unwrap();

    let mut save = MethodBody::new(
        Emitter::new()
            .ldstr("saving")
            .call(WRITE_LINE)
            .emit_with(OpCode::LeaveS, Operand::Target(5))
            .pop()
            .emit_with(OpCode::LeaveS, Operand::Target(5))
            .ret()
            .finish()
            .unwrap(),
    );
    save.exception_handlers.push(ExceptionHandler {
        flags: ExceptionHandlerFlags::EXCEPTION,
        try_start: 0,
        try_end: 3,
        handler_start: 3,
        handler_end: 5,
        catch_type: Some(Token(0x0100_0002)),
        filter_start: None,
    });
    module.add_type_ref(mscorlib, "System.Exception");
    module
        .add_method(
            main,
            "Save",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(save),
        )
        .unwrap();

    let item = module.add_type("Terraria", "Item");
    module
        .add_method(
            item,
            "SetDefaults",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Void, vec![TypeSignature::I4]),
            Some(body(5, &[])),
        )
        .unwrap();

    module
}

/// A `Prism` module defining `Prism.Hooks::OnLog(string)` and `Prism.Hooks::OnUpdate()`
pub fn prism() -> CompiledModule {
    let mut module = CompiledModule::new("Prism");
    let hooks = module.add_type("Prism", "Hooks");
    for (name, params) in [("OnLog", vec![TypeSignature::String]), ("OnUpdate", vec![])] {
        module
            .add_method(
                hooks,
                name,
                MethodAttributes::PUBLIC | MethodAttributes::STATIC,
                MethodSignature::static_method(TypeSignature::Void, params),
                Some(body(1, &[])),
            )
            .unwrap();
    }
    module
}

/// Token of `name` on `qualified_type`
pub fn method(module: &CompiledModule, qualified_type: &str, name: &str) -> Token {
    module
        .find_type(qualified_type)
        .and_then(|t| t.methods.iter().find(|m| m.name == name))
        .map(|m| m.token)
        .unwrap()
}

/// Instructions of `token`
pub fn instructions(module: &CompiledModule, token: Token) -> Vec<Instruction> {
    module
        .method(token)
        .and_then(|m| m.body.as_ref())
        .map(|b| b.instructions.clone())
        .unwrap()
}

/// A fresh scratch directory for one test
pub fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cilsplice-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

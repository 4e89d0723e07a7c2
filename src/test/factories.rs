//! Factories for synthetic bodies and modules.

use crate::{
    assembly::{Emitter, Instruction, OpCode, Operand},
    metadata::{
        method::{ExceptionHandler, ExceptionHandlerFlags, MethodAttributes, MethodBody},
        module::CompiledModule,
        signatures::{MethodSignature, TypeSignature},
        token::Token,
    },
};

/// `len - 1` nops followed by `ret`
pub fn nop_body(len: usize) -> MethodBody {
    let mut instructions = vec![Instruction::new(OpCode::Nop); len.saturating_sub(1)];
    instructions.push(Instruction::new(OpCode::Ret));
    MethodBody::new(instructions)
}

/// A body of `len` instructions with `call callee` at `positions` and `ret` last.
pub fn call_site_body(callee: Token, positions: &[usize], len: usize) -> MethodBody {
    let mut body = nop_body(len);
    for position in positions {
        body.instructions[*position] = Instruction::with(OpCode::Call, Operand::Token(callee));
    }
    body
}

/// Two exits, the second one reached by a branch.
///
/// ```text
/// 0: ldarg.1
/// 1: brfalse.s 4
/// 2: ldc.i4.1
/// 3: ret
/// 4: ldc.i4.0
/// 5: ret
/// ```
pub fn multi_exit_body() -> MethodBody {
    MethodBody::new(vec![
        Instruction::new(OpCode::Ldarg1),
        Instruction::with(OpCode::BrfalseS, Operand::Target(4)),
        Instruction::new(OpCode::LdcI41),
        Instruction::new(OpCode::Ret),
        Instruction::new(OpCode::LdcI40),
        Instruction::new(OpCode::Ret),
    ])
}

/// Forward, backward and switch branches.
///
/// ```text
/// 0: ldarg.0
/// 1: brtrue 5
/// 2: nop
/// 3: ldarg.1
/// 4: switch (2, 6)
/// 5: br.s 2
/// 6: ret
/// ```
pub fn branchy_body() -> MethodBody {
    MethodBody::new(vec![
        Instruction::new(OpCode::Ldarg0),
        Instruction::with(OpCode::Brtrue, Operand::Target(5)),
        Instruction::new(OpCode::Nop),
        Instruction::new(OpCode::Ldarg1),
        Instruction::with(OpCode::Switch, Operand::Switch(vec![2, 6])),
        Instruction::with(OpCode::BrS, Operand::Target(2)),
        Instruction::new(OpCode::Ret),
    ])
}

/// A try/finally.
///
/// ```text
/// 0: nop          try
/// 1: ldstr "in"   try
/// 2: pop          try
/// 3: leave.s 6    try
/// 4: nop          finally
/// 5: endfinally   finally
/// 6: ret
/// ```
pub fn guarded_body() -> MethodBody {
    let mut body = MethodBody::new(vec![
        Instruction::new(OpCode::Nop),
        Instruction::with(OpCode::Ldstr, Operand::String("in".into())),
        Instruction::new(OpCode::Pop),
        Instruction::with(OpCode::LeaveS, Operand::Target(6)),
        Instruction::new(OpCode::Nop),
        Instruction::new(OpCode::Endfinally),
        Instruction::new(OpCode::Ret),
    ]);
    body.exception_handlers.push(ExceptionHandler {
        flags: ExceptionHandlerFlags::FINALLY,
        try_start: 0,
        try_end: 4,
        handler_start: 4,
        handler_end: 6,
        catch_type: None,
        filter_start: None,
    });
    body
}

/// A small game module.
///
/// | Method                        | Token        | Body                                  |
/// |-------------------------------|--------------|---------------------------------------|
/// | `Terraria.Main::Update()`     | `0x06000001` | 11 instructions, `WriteLine` at 2/7/9 |
/// | `Terraria.Main::DrawMenu(i4)` | `0x06000002` | [`multi_exit_body`]                   |
/// | `Terraria.Main::Loop()`       | `0x06000003` | [`branchy_body`]                      |
/// | `Terraria.Main::Save()`       | `0x06000004` | [`guarded_body`]                      |
/// | `Terraria.Item::SetDefaults(i4)` | `0x06000005` | [`nop_body`] of 5                  |
/// | `Terraria.Item::SetDefaults()`| `0x06000006` | [`nop_body`] of 3                     |
/// | `Terraria.Item::Use()`        | `0x06000007` | none (abstract)                       |
///
/// `System.Console::WriteLine(string)` is member ref `0x0a000001`, `Prism.Hooks::OnUpdate()`
/// is `0x0a000002`.
pub fn game_module() -> CompiledModule {
    let mut module = CompiledModule::new("Terraria");

    let mscorlib = module.add_module_ref("mscorlib");
    let console = module.add_type_ref(mscorlib, "System.Console");
    let write_line = module.add_member_ref(
        console,
        "WriteLine",
        MethodSignature::static_method(TypeSignature::Void, vec![TypeSignature::String]),
    );

    let prism = module.add_module_ref("Prism");
    let hooks = module.add_type_ref(prism, "Prism.Hooks");
    module.add_member_ref(
        hooks,
        "OnUpdate",
        MethodSignature::static_method(TypeSignature::Void, vec![]),
    );

    let main = module.add_type("Terraria", "Main");
    let mut update = call_site_body(write_line, &[2, 7, 9], 11);
    for index in [1, 6, 8] {
        update.instructions[index] = Instruction::with(OpCode::Ldstr, Operand::String(format!("line {index}")));
    }

    let methods = [
        (
            main,
            "Update",
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(update),
        ),
        (
            main,
            "DrawMenu",
            MethodSignature::instance_method(TypeSignature::Boolean, vec![TypeSignature::I4]),
            Some(multi_exit_body()),
        ),
        (
            main,
            "Loop",
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(branchy_body()),
        ),
        (
            main,
            "Save",
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(guarded_body()),
        ),
    ];

    for (owner, name, signature, body) in methods {
        module
            .add_method(owner, name, MethodAttributes::PUBLIC, signature, body)
            .unwrap();
    }

    let item = module.add_type("Terraria", "Item");
    module
        .add_method(
            item,
            "SetDefaults",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Void, vec![TypeSignature::I4]),
            Some(nop_body(5)),
        )
        .unwrap();
    module
        .add_method(
            item,
            "SetDefaults",
            MethodAttributes::PUBLIC,
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            Some(nop_body(3)),
        )
        .unwrap();
    module
        .add_method(
            item,
            "Use",
            MethodAttributes::PUBLIC | MethodAttributes::ABSTRACT | MethodAttributes::VIRTUAL,
            MethodSignature::instance_method(TypeSignature::Void, vec![]),
            None,
        )
        .unwrap();

    module
}

/// A library module `Prism` defining `Prism.Hooks` with two static hooks.
pub fn prism_module() -> CompiledModule {
    let mut module = CompiledModule::new("Prism");
    let hooks = module.add_type("Prism", "Hooks");

    module
        .add_method(
            hooks,
            "OnUpdate",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSignature::static_method(TypeSignature::Void, vec![]),
            Some(nop_body(1)),
        )
        .unwrap();
    module
        .add_method(
            hooks,
            "OnLog",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSignature::static_method(TypeSignature::Void, vec![TypeSignature::String]),
            Some(nop_body(1)),
        )
        .unwrap();

    module
}

/// `ldstr message; call hook`
pub fn log_payload(message: &str, hook: Token) -> Vec<Instruction> {
    Emitter::new().ldstr(message).call(hook).finish().unwrap()
}

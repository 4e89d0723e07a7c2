//! Shared functionality which is used in unit tests.

pub mod factories;

use crate::{
    assembly::OpCode,
    metadata::{method::MethodBody, module::CompiledModule, token::Token},
};

/// Token of the first method `name` on `qualified_type`.
pub fn token_of(module: &CompiledModule, qualified_type: &str, name: &str) -> Token {
    module
        .find_type(qualified_type)
        .and_then(|t| t.methods.iter().find(|m| m.name == name))
        .map(|m| m.token)
        .unwrap_or_else(|| panic!("{qualified_type}::{name} not defined"))
}

/// Opcodes of a body, in order
pub fn opcodes(body: &MethodBody) -> Vec<OpCode> {
    body.instructions.iter().map(|i| i.opcode).collect()
}

/// Body of the method `token`
pub fn body_of(module: &CompiledModule, token: Token) -> &MethodBody {
    module
        .method(token)
        .and_then(|m| m.body.as_ref())
        .unwrap_or_else(|| panic!("{token} has no body"))
}

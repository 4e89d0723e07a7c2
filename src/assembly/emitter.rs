//! Fluent construction of injection payloads.
//!
//! An [`Emitter`] appends instructions and resolves named labels into payload relative branch
//! targets. A label may be placed after the last instruction; a branch to it continues with
//! whatever follows the payload once it is spliced.
//!
//! ```rust
//! use cilsplice::assembly::{Emitter, OpCode, Operand};
//! use cilsplice::Token;
//!
//! let payload = Emitter::new()
//!     .ldarg(0)
//!     .brfalse("skip")
//!     .ldstr("Hello")
//!     .call(Token(0x0A00_0001))
//!     .label("skip")
//!     .finish()?;
//!
//! assert_eq!(payload.len(), 4);
//! assert_eq!(payload[1].operand, Operand::Target(4));
//! # Ok::<(), cilsplice::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{Immediate, Instruction, Operand},
        opcodes::OpCode,
    },
    metadata::token::Token,
    Error, Result,
};

/// Builder for self-contained instruction sequences.
#[derive(Debug, Default)]
pub struct Emitter {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    fixups: Vec<(usize, Vec<String>)>,
    errors: Vec<String>,
}

impl Emitter {
    /// Start an empty payload
    #[must_use]
    pub fn new() -> Self {
        Emitter::default()
    }

    /// Append an instruction without operand
    #[must_use]
    pub fn emit(self, opcode: OpCode) -> Self {
        self.emit_with(opcode, Operand::None)
    }

    /// Append an instruction with operand. `Target` and `Switch` operands are payload relative.
    #[must_use]
    pub fn emit_with(mut self, opcode: OpCode, operand: Operand) -> Self {
        self.instructions.push(Instruction::with(opcode, operand));
        self
    }

    /// Append already built instructions. Their branch targets are taken as relative to the
    /// start of this payload.
    #[must_use]
    pub fn append(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Bind `name` to the position of the next instruction.
    #[must_use]
    pub fn label(mut self, name: &str) -> Self {
        if self
            .labels
            .insert(name.to_string(), self.instructions.len())
            .is_some()
        {
            self.errors.push(format!("Label '{name}' defined twice"));
        }
        self
    }

    /// `nop`
    #[must_use]
    pub fn nop(self) -> Self {
        self.emit(OpCode::Nop)
    }

    /// `pop`
    #[must_use]
    pub fn pop(self) -> Self {
        self.emit(OpCode::Pop)
    }

    /// `dup`
    #[must_use]
    pub fn dup(self) -> Self {
        self.emit(OpCode::Dup)
    }

    /// `ret`
    #[must_use]
    pub fn ret(self) -> Self {
        self.emit(OpCode::Ret)
    }

    /// `ldnull`
    #[must_use]
    pub fn ldnull(self) -> Self {
        self.emit(OpCode::Ldnull)
    }

    /// `ldstr`
    #[must_use]
    pub fn ldstr(self, value: &str) -> Self {
        self.emit_with(OpCode::Ldstr, Operand::String(value.to_string()))
    }

    /// Load a 32-bit constant using the shortest encoding.
    #[must_use]
    pub fn ldc_i4(self, value: i32) -> Self {
        let opcode = match value {
            -1 => OpCode::LdcI4M1,
            0 => OpCode::LdcI40,
            1 => OpCode::LdcI41,
            2 => OpCode::LdcI42,
            3 => OpCode::LdcI43,
            4 => OpCode::LdcI44,
            5 => OpCode::LdcI45,
            6 => OpCode::LdcI46,
            7 => OpCode::LdcI47,
            8 => OpCode::LdcI48,
            _ => {
                return match i8::try_from(value) {
                    Ok(short) => {
                        self.emit_with(OpCode::LdcI4S, Operand::Immediate(Immediate::Int8(short)))
                    }
                    Err(_) => {
                        self.emit_with(OpCode::LdcI4, Operand::Immediate(Immediate::Int32(value)))
                    }
                }
            }
        };
        self.emit(opcode)
    }

    /// Load an argument using the shortest encoding.
    #[must_use]
    pub fn ldarg(self, index: u16) -> Self {
        match index {
            0 => self.emit(OpCode::Ldarg0),
            1 => self.emit(OpCode::Ldarg1),
            2 => self.emit(OpCode::Ldarg2),
            3 => self.emit(OpCode::Ldarg3),
            4..=255 => self.emit_with(OpCode::LdargS, Operand::Argument(index)),
            _ => self.emit_with(OpCode::Ldarg, Operand::Argument(index)),
        }
    }

    /// Load a local using the shortest encoding.
    #[must_use]
    pub fn ldloc(self, index: u16) -> Self {
        match index {
            0 => self.emit(OpCode::Ldloc0),
            1 => self.emit(OpCode::Ldloc1),
            2 => self.emit(OpCode::Ldloc2),
            3 => self.emit(OpCode::Ldloc3),
            4..=255 => self.emit_with(OpCode::LdlocS, Operand::Local(index)),
            _ => self.emit_with(OpCode::Ldloc, Operand::Local(index)),
        }
    }

    /// Store into a local using the shortest encoding.
    #[must_use]
    pub fn stloc(self, index: u16) -> Self {
        match index {
            0 => self.emit(OpCode::Stloc0),
            1 => self.emit(OpCode::Stloc1),
            2 => self.emit(OpCode::Stloc2),
            3 => self.emit(OpCode::Stloc3),
            4..=255 => self.emit_with(OpCode::StlocS, Operand::Local(index)),
            _ => self.emit_with(OpCode::Stloc, Operand::Local(index)),
        }
    }

    /// `call`
    #[must_use]
    pub fn call(self, method: Token) -> Self {
        self.emit_with(OpCode::Call, Operand::Token(method))
    }

    /// `callvirt`
    #[must_use]
    pub fn callvirt(self, method: Token) -> Self {
        self.emit_with(OpCode::Callvirt, Operand::Token(method))
    }

    /// `newobj`
    #[must_use]
    pub fn newobj(self, constructor: Token) -> Self {
        self.emit_with(OpCode::Newobj, Operand::Token(constructor))
    }

    /// Branch instruction `opcode` to `label`.
    #[must_use]
    pub fn branch(mut self, opcode: OpCode, label: &str) -> Self {
        if !opcode.is_branch() || opcode == OpCode::Switch {
            self.errors
                .push(format!("{} is not a single target branch", opcode.mnemonic()));
            return self;
        }

        self.fixups
            .push((self.instructions.len(), vec![label.to_string()]));
        self.emit_with(opcode, Operand::Target(0))
    }

    /// `br` to `label`
    #[must_use]
    pub fn br(self, label: &str) -> Self {
        self.branch(OpCode::Br, label)
    }

    /// `brtrue` to `label`
    #[must_use]
    pub fn brtrue(self, label: &str) -> Self {
        self.branch(OpCode::Brtrue, label)
    }

    /// `brfalse` to `label`
    #[must_use]
    pub fn brfalse(self, label: &str) -> Self {
        self.branch(OpCode::Brfalse, label)
    }

    /// `switch` over `labels`
    #[must_use]
    pub fn switch(mut self, labels: &[&str]) -> Self {
        self.fixups.push((
            self.instructions.len(),
            labels.iter().map(|label| (*label).to_string()).collect(),
        ));
        self.emit_with(OpCode::Switch, Operand::Switch(Vec::new()))
    }

    /// Number of instructions emitted so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if nothing was emitted yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Resolve labels and return the payload.
    ///
    /// # Errors
    /// Returns [`crate::Error::Emit`] for undefined or duplicate labels and misused branch
    /// helpers.
    pub fn finish(mut self) -> Result<Vec<Instruction>> {
        if let Some(error) = self.errors.first() {
            return Err(Error::Emit(error.clone()));
        }

        for (index, names) in std::mem::take(&mut self.fixups) {
            let targets = names
                .iter()
                .map(|name| {
                    self.labels
                        .get(name)
                        .copied()
                        .ok_or_else(|| Error::Emit(format!("Undefined label '{name}'")))
                })
                .collect::<Result<Vec<_>>>()?;

            let instruction = &mut self.instructions[index];
            instruction.operand = match instruction.operand {
                Operand::Switch(_) => Operand::Switch(targets),
                _ => Operand::Target(targets[0]),
            };
        }

        Ok(self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_forms() {
        let payload = Emitter::new()
            .ldc_i4(-1)
            .ldc_i4(100)
            .ldc_i4(1000)
            .ldarg(2)
            .ldarg(7)
            .ldloc(300)
            .stloc(0)
            .finish()
            .unwrap();

        let opcodes: Vec<_> = payload.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::LdcI4M1,
                OpCode::LdcI4S,
                OpCode::LdcI4,
                OpCode::Ldarg2,
                OpCode::LdargS,
                OpCode::Ldloc,
                OpCode::Stloc0,
            ]
        );
    }

    #[test]
    fn backward_and_forward_labels() {
        let payload = Emitter::new()
            .label("top")
            .nop()
            .brtrue("top")
            .switch(&["top", "end"])
            .label("end")
            .finish()
            .unwrap();

        assert_eq!(payload[1].operand, Operand::Target(0));
        assert_eq!(payload[2].operand, Operand::Switch(vec![0, 3]));
    }

    #[test]
    fn label_errors() {
        let undefined = Emitter::new().br("nowhere").finish();
        assert!(matches!(undefined, Err(Error::Emit(_))));

        let duplicate = Emitter::new().label("a").nop().label("a").finish();
        assert!(matches!(duplicate, Err(Error::Emit(_))));

        let misuse = Emitter::new().branch(OpCode::Call, "a").label("a").finish();
        assert!(misuse.is_err());
    }
}

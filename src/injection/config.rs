//! Injection configuration
//!
//! Controls how anchors are matched and how far a splice goes beyond the plain
//! insert-and-shift rule.

use crate::{
    assembly::{Instruction, OpCode},
    metadata::token::Token,
};

/// How a call-site anchor matches instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallSiteMatching {
    /// `call`, `callvirt` and `newobj` whose token operand equals the callee token
    #[default]
    ExactOperand,
    /// Only `call` instructions with an equal token operand
    DirectCallOnly,
}

/// Configuration for [`crate::inject`] and [`crate::PatchSession`].
///
/// Virtual dispatch is never followed: a call-site anchor only matches instructions that name
/// the callee token itself, never overrides or interface implementations of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionConfig {
    /// Which instructions count as a call site of the anchor's callee
    pub call_site_matching: CallSiteMatching,

    /// For method-exit anchors, redirect branches that targeted an anchored `ret` to the
    /// injected payload, so every path that leaves through that exit runs it.
    /// Without this, a branch to the `ret` skips the payload.
    pub capture_exit_branches: bool,

    /// Re-check branch targets and exception regions of the spliced body before committing
    /// it. The splice is applied to a copy and discarded on failure.
    pub verify_after_splice: bool,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            call_site_matching: CallSiteMatching::ExactOperand,
            capture_exit_branches: true,
            verify_after_splice: false,
        }
    }
}

impl InjectionConfig {
    /// Creates a configuration that verifies every spliced body
    #[must_use]
    pub fn strict() -> Self {
        Self {
            verify_after_splice: true,
            ..Self::default()
        }
    }

    /// Creates a configuration applying the plain splice rule everywhere
    ///
    /// Existing branches to an anchored `ret` keep pointing at the `ret` and therefore bypass
    /// a method-exit payload.
    #[must_use]
    pub fn literal() -> Self {
        Self {
            capture_exit_branches: false,
            ..Self::default()
        }
    }

    /// Returns a copy using `matching` for call-site anchors
    #[must_use]
    pub fn with_call_site_matching(mut self, matching: CallSiteMatching) -> Self {
        self.call_site_matching = matching;
        self
    }

    /// Returns true if `instruction` is a call site of `callee` under this configuration
    #[must_use]
    pub(crate) fn is_call_site(&self, instruction: &Instruction, callee: Token) -> bool {
        match self.call_site_matching {
            CallSiteMatching::ExactOperand => instruction.call_target() == Some(callee),
            CallSiteMatching::DirectCallOnly => {
                instruction.opcode == OpCode::Call && instruction.call_target() == Some(callee)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Operand;

    #[test]
    fn presets() {
        let default = InjectionConfig::default();
        assert!(default.capture_exit_branches);
        assert!(!default.verify_after_splice);
        assert_eq!(default.call_site_matching, CallSiteMatching::ExactOperand);

        assert!(InjectionConfig::strict().verify_after_splice);
        assert!(!InjectionConfig::literal().capture_exit_branches);
    }

    #[test]
    fn call_site_matching_modes() {
        let callee = Token(0x0A00_0001);
        let call = Instruction::with(OpCode::Call, Operand::Token(callee));
        let callvirt = Instruction::with(OpCode::Callvirt, Operand::Token(callee));
        let ldftn = Instruction::with(OpCode::Ldftn, Operand::Token(callee));
        let other = Instruction::with(OpCode::Call, Operand::Token(Token(0x0A00_0002)));

        let exact = InjectionConfig::default();
        assert!(exact.is_call_site(&call, callee));
        assert!(exact.is_call_site(&callvirt, callee));
        assert!(!exact.is_call_site(&ldftn, callee));
        assert!(!exact.is_call_site(&other, callee));

        let direct = exact.with_call_site_matching(CallSiteMatching::DirectCallOnly);
        assert!(direct.is_call_site(&call, callee));
        assert!(!direct.is_call_site(&callvirt, callee));
    }
}

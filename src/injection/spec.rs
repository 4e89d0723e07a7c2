//! Injection requests.

use std::fmt;

use crate::{assembly::Instruction, metadata::token::Token};

/// Insert before or after the resolved point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPosition {
    /// Before the anchor. For a method anchor, before the first instruction.
    Pre,
    /// After the anchor. For a method anchor, before every `ret`.
    Post,
}

/// Where in a method body to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// The method boundary
    Method,
    /// An absolute instruction index, checked against the current stream
    Index(i64),
    /// The `occurrence`-th (1-based) call site of `callee`
    CallSite {
        /// Token of the called method, as it appears in the call operand
        callee: Token,
        /// Which match to use, starting at 1
        occurrence: usize,
    },
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Method => write!(f, "method"),
            Anchor::Index(index) => write!(f, "IL_{index:04}"),
            Anchor::CallSite { callee, occurrence } => write!(f, "call {callee} #{occurrence}"),
        }
    }
}

/// One requested mutation: inject `payload` into `target` at `anchor`.
///
/// Payload branch operands are payload-relative: `Operand::Target(0)` is the first payload
/// instruction and `Operand::Target(payload.len())` the instruction that follows the payload
/// once it is spliced in.
///
/// # Examples
///
/// ```rust
/// use cilsplice::{assembly::Emitter, InjectionPosition, InjectionSpec, Token};
///
/// let payload = Emitter::new().ldstr("hooked").call(Token(0x0A00_0002)).finish()?;
/// let spec = InjectionSpec::call_site(
///     Token(0x0600_0001),
///     Token(0x0A00_0001),
///     InjectionPosition::Post,
///     payload,
/// )
/// .occurrence(2);
/// assert_eq!(spec.payload.len(), 2);
/// # Ok::<(), cilsplice::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionSpec {
    /// The method to patch
    pub target: Token,
    /// Where to inject
    pub anchor: Anchor,
    /// Before or after the anchor
    pub position: InjectionPosition,
    /// The instructions to insert
    pub payload: Vec<Instruction>,
}

impl InjectionSpec {
    /// Inject at the boundary of `target`
    #[must_use]
    pub fn method(target: Token, position: InjectionPosition, payload: Vec<Instruction>) -> Self {
        InjectionSpec {
            target,
            anchor: Anchor::Method,
            position,
            payload,
        }
    }

    /// Inject around the instruction at `index`
    #[must_use]
    pub fn at_index(
        target: Token,
        index: i64,
        position: InjectionPosition,
        payload: Vec<Instruction>,
    ) -> Self {
        InjectionSpec {
            target,
            anchor: Anchor::Index(index),
            position,
            payload,
        }
    }

    /// Inject around the first call of `callee`. Use [`InjectionSpec::occurrence`] to pick
    /// another one.
    #[must_use]
    pub fn call_site(
        target: Token,
        callee: Token,
        position: InjectionPosition,
        payload: Vec<Instruction>,
    ) -> Self {
        InjectionSpec {
            target,
            anchor: Anchor::CallSite {
                callee,
                occurrence: 1,
            },
            position,
            payload,
        }
    }

    /// Select the `n`-th call site (1-based). Has no effect on other anchors.
    #[must_use]
    pub fn occurrence(mut self, n: usize) -> Self {
        if let Anchor::CallSite { occurrence, .. } = &mut self.anchor {
            *occurrence = n;
        }
        self
    }
}

impl fmt::Display for InjectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} in {} ({} instructions)",
            self.position,
            self.anchor,
            self.target,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpCode;

    #[test]
    fn occurrence_only_applies_to_call_sites() {
        let payload = vec![Instruction::new(OpCode::Nop)];
        let spec = InjectionSpec::method(Token(0x0600_0001), InjectionPosition::Pre, payload.clone())
            .occurrence(3);
        assert_eq!(spec.anchor, Anchor::Method);

        let spec = InjectionSpec::call_site(
            Token(0x0600_0001),
            Token(0x0A00_0001),
            InjectionPosition::Pre,
            payload,
        )
        .occurrence(3);
        assert_eq!(
            spec.anchor,
            Anchor::CallSite {
                callee: Token(0x0A00_0001),
                occurrence: 3
            }
        );
        assert_eq!(
            spec.to_string(),
            "Pre call 0x0a000001 #3 in 0x06000001 (1 instructions)"
        );
    }
}

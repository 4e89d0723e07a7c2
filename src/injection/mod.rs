//! Injection of instruction sequences into method bodies.
//!
//! An injection batch is an ordered list of [`InjectionSpec`]s against one
//! [`CompiledModule`]. Specs run one at a time: each anchor is resolved against the body as
//! the previous specs left it, then the payload is spliced in at every resolved point.
//!
//! The first failing spec aborts the batch. Specs before it stay applied, so callers that need
//! all-or-nothing behaviour work on a clone of the module and only write it after the batch
//! succeeded.
//!
//! # Examples
//!
//! ```rust
//! use cilsplice::prelude::*;
//!
//! let mut module = CompiledModule::new("Game");
//! let player = module.add_type("Game", "Player");
//! let update = module.add_method(
//!     player,
//!     "Update",
//!     MethodAttributes::PUBLIC,
//!     MethodSignature::instance_method(TypeSignature::Void, vec![]),
//!     Some(MethodBody::new(vec![Instruction::new(OpCode::Nop), Instruction::new(OpCode::Ret)])),
//! )?;
//!
//! let report = inject(
//!     &mut module,
//!     vec![
//!         InjectionSpec::method(update, InjectionPosition::Pre, Emitter::new().nop().finish()?),
//!         InjectionSpec::method(update, InjectionPosition::Post, Emitter::new().nop().finish()?),
//!     ],
//!     &InjectionConfig::default(),
//! )?;
//!
//! assert_eq!(report.inserted(), 2);
//! assert_eq!(module.method(update).unwrap().body.as_ref().unwrap().len(), 4);
//! # Ok::<(), cilsplice::Error>(())
//! ```

pub mod anchor;
pub mod config;
pub mod spec;
pub mod splice;

pub use anchor::{resolve_anchor, resolve_positions};
pub use config::{CallSiteMatching, InjectionConfig};
pub use spec::{Anchor, InjectionPosition, InjectionSpec};
pub use splice::{splice, splice_points, validate_payload, SplicePoint};

use crate::{metadata::module::CompiledModule, metadata::token::Token, Error, Result};

/// Outcome of one applied spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedInjection {
    /// The patched method
    pub target: Token,
    /// Insertion indices, as resolved against the body before this spec
    pub points: Vec<usize>,
    /// Number of instructions added to the body
    pub inserted: usize,
}

/// Outcome of a batch, one entry per spec in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Applied specs
    pub applied: Vec<AppliedInjection>,
}

impl InjectionReport {
    /// Total number of instructions added by the batch
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.applied.iter().map(|a| a.inserted).sum()
    }
}

/// Apply `specs` to `module` in order.
///
/// # Errors
/// Returns [`crate::Error::Injection`] carrying the index of the first failing spec and its
/// failure. [`crate::Error::kind`] reports the kind of that failure.
pub fn inject(
    module: &mut CompiledModule,
    specs: impl IntoIterator<Item = InjectionSpec>,
    config: &InjectionConfig,
) -> Result<InjectionReport> {
    let mut report = InjectionReport::default();

    for (index, spec) in specs.into_iter().enumerate() {
        let applied = apply(module, &spec, config).map_err(|source| {
            log::debug!("Injection {index} ({spec}) failed - {source}");
            Error::Injection {
                index,
                source: Box::new(source),
            }
        })?;

        log::debug!(
            "Injection {index} ({spec}) applied at {:?}",
            applied.points
        );
        report.applied.push(applied);
    }

    Ok(report)
}

/// Apply a single spec.
///
/// # Errors
/// [`crate::Error::UnresolvedReference`] if the target is not a method of `module`,
/// [`crate::Error::MissingBody`] if it has no body, and anchor or splice failures.
pub fn apply(
    module: &mut CompiledModule,
    spec: &InjectionSpec,
    config: &InjectionConfig,
) -> Result<AppliedInjection> {
    let method = module
        .method_mut(spec.target)
        .ok_or_else(|| Error::UnresolvedReference(format!("Method {}", spec.target)))?;
    let body = method
        .body
        .as_mut()
        .ok_or(Error::MissingBody(spec.target))?;

    let points = resolve_anchor(spec.target, body, &spec.anchor, spec.position, config)?;

    if config.verify_after_splice {
        let mut staged = body.clone();
        splice_points(&mut staged, &points, &spec.payload)?;
        staged.validate()?;
        *body = staged;
    } else {
        splice_points(body, &points, &spec.payload)?;
    }

    Ok(AppliedInjection {
        target: spec.target,
        inserted: points.len() * spec.payload.len(),
        points: points.iter().map(|p| p.index).collect(),
    })
}

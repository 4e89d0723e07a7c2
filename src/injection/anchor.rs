//! Anchor resolution.
//!
//! Turns the [`Anchor`] of an injection into concrete [`SplicePoint`]s of one body, always
//! against the body as it is right now. A batch therefore sees the effects of the specs that
//! ran before.

use crate::{
    assembly::OpCode,
    injection::{
        config::InjectionConfig,
        splice::SplicePoint,
        spec::{Anchor, InjectionPosition},
    },
    metadata::{
        method::{MethodBody, StreamPosition},
        token::Token,
    },
    Error, Result,
};

/// Resolve `anchor` inside `body`, the body of `method`.
///
/// | Anchor      | `Pre`                 | `Post`                          |
/// |-------------|-----------------------|---------------------------------|
/// | method      | 0                     | before every `ret`              |
/// | index `i`   | `i`                   | `i + 1`                         |
/// | call site   | before the n-th call  | after the n-th call             |
///
/// Method-exit points capture branches to their `ret` when
/// [`InjectionConfig::capture_exit_branches`] is set.
///
/// # Errors
/// - [`crate::Error::IndexOutOfRange`] for an index outside `0..len`
/// - [`crate::Error::AnchorNotFound`] for a missing call site, an occurrence beyond the number
///   of call sites, occurrence 0, or a method-exit anchor in a body without `ret`
pub fn resolve_anchor(
    method: Token,
    body: &MethodBody,
    anchor: &Anchor,
    position: InjectionPosition,
    config: &InjectionConfig,
) -> Result<Vec<SplicePoint>> {
    match (anchor, position) {
        (Anchor::Method, InjectionPosition::Pre) => Ok(vec![SplicePoint::at(0)]),
        (Anchor::Method, InjectionPosition::Post) => {
            let points: Vec<SplicePoint> = body
                .instructions
                .iter()
                .enumerate()
                .filter(|(_, i)| i.opcode == OpCode::Ret)
                .map(|(index, _)| SplicePoint {
                    index,
                    capture: config.capture_exit_branches,
                })
                .collect();

            if points.is_empty() {
                return Err(Error::AnchorNotFound {
                    method,
                    message: "no ret instruction to inject before".to_string(),
                });
            }

            Ok(points)
        }
        (Anchor::Index(index), position) => {
            let len = body.len();
            let resolved = usize::try_from(*index)
                .ok()
                .filter(|i| *i < len)
                .ok_or(Error::IndexOutOfRange { index: *index, len })?;

            Ok(vec![SplicePoint::at(match position {
                InjectionPosition::Pre => resolved,
                InjectionPosition::Post => resolved + 1,
            })])
        }
        (Anchor::CallSite { callee, occurrence }, position) => {
            let sites: Vec<usize> = body
                .instructions
                .iter()
                .enumerate()
                .filter(|(_, i)| config.is_call_site(i, *callee))
                .map(|(index, _)| index)
                .collect();

            let found = occurrence
                .checked_sub(1)
                .and_then(|nth| sites.get(nth).copied());

            let Some(index) = found else {
                return Err(Error::AnchorNotFound {
                    method,
                    message: format!(
                        "call to {} #{} requested, {} present",
                        callee,
                        occurrence,
                        sites.len()
                    ),
                });
            };

            Ok(vec![SplicePoint::at(match position {
                InjectionPosition::Pre => index,
                InjectionPosition::Post => index + 1,
            })])
        }
    }
}

/// Resolve `anchor` into positions that stay valid until the body is spliced again.
///
/// # Errors
/// See [`resolve_anchor`].
pub fn resolve_positions(
    method: Token,
    body: &MethodBody,
    anchor: &Anchor,
    position: InjectionPosition,
    config: &InjectionConfig,
) -> Result<Vec<StreamPosition>> {
    Ok(resolve_anchor(method, body, anchor, position, config)?
        .into_iter()
        .map(|point| body.position(method, point.index))
        .collect())
}

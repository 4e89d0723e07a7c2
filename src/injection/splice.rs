//! The splice engine.
//!
//! Splicing inserts a payload into a method body at an instruction index and repairs every
//! index-based reference of the body so it keeps designating the same logical instruction:
//!
//! - existing branch and switch targets at or after the insertion index move by the payload
//!   length, targets before it are untouched
//! - payload targets are payload-relative and get rebased onto the insertion index
//! - exception region starts at or after the index move, exclusive ends after it move, so a
//!   payload inserted strictly inside a region extends that region
//!
//! A splice validates everything before it touches the body. On error the body is unchanged.

use crate::{
    assembly::Instruction,
    metadata::method::MethodBody,
    Error, Result,
};

/// A concrete insertion point inside one body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplicePoint {
    /// Insertion index, `0..=len`
    pub index: usize,
    /// Keep existing branches to `index` pointing at `index`, i.e. at the payload.
    ///
    /// Used for method exits, where a branch to the anchored `ret` must run the payload.
    pub capture: bool,
}

impl SplicePoint {
    /// Plain insertion point
    #[must_use]
    pub fn at(index: usize) -> Self {
        SplicePoint {
            index,
            capture: false,
        }
    }

    /// Insertion point that captures branches to `index`
    #[must_use]
    pub fn capturing(index: usize) -> Self {
        SplicePoint {
            index,
            capture: true,
        }
    }
}

/// Check that `payload` is a self-contained instruction sequence.
///
/// # Errors
/// Returns [`crate::Error::InvalidPayload`] for an empty payload, an operand that does not fit
/// its opcode or a branch target beyond `payload.len()`.
pub fn validate_payload(payload: &[Instruction]) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::InvalidPayload("payload is empty".to_string()));
    }

    for (index, instruction) in payload.iter().enumerate() {
        if !instruction.operand.matches(instruction.opcode.operand_type()) {
            return Err(Error::InvalidPayload(format!(
                "{index}: operand '{}' does not fit {}",
                instruction.operand,
                instruction.opcode.mnemonic()
            )));
        }

        if let Some(target) = instruction
            .targets()
            .into_iter()
            .find(|t| *t > payload.len())
        {
            return Err(Error::InvalidPayload(format!(
                "{index}: branch target {target} outside of {} payload instructions",
                payload.len()
            )));
        }
    }

    Ok(())
}

/// Insert `payload` into `body` before the instruction at `index`.
///
/// `index == body.len()` appends.
///
/// # Errors
/// Returns [`crate::Error::IndexOutOfRange`] if `index > body.len()` and
/// [`crate::Error::InvalidPayload`] if the payload is not self-contained.
///
/// # Examples
///
/// ```rust
/// use cilsplice::{
///     assembly::{Instruction, OpCode, Operand},
///     injection::splice,
///     metadata::method::MethodBody,
/// };
///
/// let mut body = MethodBody::new(vec![
///     Instruction::with(OpCode::BrS, Operand::Target(2)),
///     Instruction::new(OpCode::Nop),
///     Instruction::new(OpCode::Ret),
/// ]);
///
/// splice(&mut body, 1, &[Instruction::new(OpCode::Nop), Instruction::new(OpCode::Nop)])?;
/// assert_eq!(body.len(), 5);
/// assert_eq!(body.instructions[0].operand, Operand::Target(4));
/// # Ok::<(), cilsplice::Error>(())
/// ```
pub fn splice(body: &mut MethodBody, index: usize, payload: &[Instruction]) -> Result<()> {
    splice_points(body, &[SplicePoint::at(index)], payload)
}

/// Insert a copy of `payload` at every point.
///
/// Points are applied from the highest index down, so each one refers to the body as it was
/// before the call. The stack bound grows once by the number of values the payload pushes.
/// Every insertion advances the body generation.
///
/// # Errors
/// Returns [`crate::Error::IndexOutOfRange`] if a point lies beyond the body and
/// [`crate::Error::InvalidPayload`] if the payload is not self-contained. Nothing is inserted
/// on error.
pub fn splice_points(
    body: &mut MethodBody,
    points: &[SplicePoint],
    payload: &[Instruction],
) -> Result<()> {
    validate_payload(payload)?;

    let len = body.len();
    let mut points = points.to_vec();
    points.sort_unstable_by(|a, b| b.cmp(a));
    points.dedup_by_key(|p| p.index);

    for point in &points {
        if point.index > len {
            return Err(Error::IndexOutOfRange {
                index: i64::try_from(point.index).unwrap_or(i64::MAX),
                len,
            });
        }

        // A target of payload.len() designates whatever follows the payload
        if point.index == len && payload.iter().any(|i| i.targets().contains(&payload.len())) {
            return Err(Error::InvalidPayload(
                "payload branches past the end of the method".to_string(),
            ));
        }
    }

    for point in &points {
        insert(body, *point, payload);
    }

    let pushes = payload
        .iter()
        .fold(0_u16, |acc, i| acc.saturating_add(i.opcode.pushes()));
    body.max_stack = body.max_stack.saturating_add(pushes);

    Ok(())
}

fn insert(body: &mut MethodBody, point: SplicePoint, payload: &[Instruction]) {
    let SplicePoint { index, capture } = point;
    let count = payload.len();

    for instruction in &mut body.instructions {
        instruction.remap_targets(|target| {
            if target > index || (target == index && !capture) {
                target + count
            } else {
                target
            }
        });
    }

    for handler in &mut body.exception_handlers {
        handler.remap(|boundary, is_end| {
            let shifts = if is_end {
                boundary > index
            } else {
                boundary >= index
            };
            if shifts {
                boundary + count
            } else {
                boundary
            }
        });
    }

    let rebased = payload.iter().cloned().map(|mut instruction| {
        instruction.remap_targets(|target| index + target);
        instruction
    });
    body.instructions.splice(index..index, rebased);
    body.advance_generation();

    log::trace!(
        "Spliced {} instructions at IL_{:04}{}, body now {} instructions",
        count,
        index,
        if capture { " (capturing)" } else { "" },
        body.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{OpCode, Operand},
        metadata::method::{ExceptionHandler, ExceptionHandlerFlags},
        test::{
            factories::{branchy_body, guarded_body, multi_exit_body, nop_body},
            opcodes,
        },
    };

    fn marker(value: i32) -> Vec<Instruction> {
        vec![
            Instruction::with(
                OpCode::LdcI4,
                Operand::Immediate(crate::assembly::Immediate::Int32(value)),
            ),
            Instruction::new(OpCode::Pop),
        ]
    }

    #[test]
    fn pre_injection_keeps_original_order() {
        let original = branchy_body();
        let payload = marker(7);

        let mut body = original.clone();
        splice(&mut body, 0, &payload).unwrap();

        assert_eq!(&body.instructions[..2], payload.as_slice());
        assert_eq!(opcodes(&body)[2..], opcodes(&original)[..]);
        assert_eq!(body.generation(), 1);
    }

    #[test]
    fn branch_targets_follow_their_instruction() {
        let mut body = branchy_body();
        splice(&mut body, 3, &marker(1)).unwrap();

        // 0 ldarg.0, 1 brtrue 5 -> 7, 2 nop, [3, 4 payload], 5 ldarg.1, 6 switch, 7 br.s 2, 8 ret
        assert_eq!(body.instructions[1].operand, Operand::Target(7));
        assert_eq!(body.instructions[6].operand, Operand::Switch(vec![2, 8]));
        assert_eq!(body.instructions[7].operand, Operand::Target(2));
        assert_eq!(body.instructions[7].opcode, OpCode::BrS);
        body.validate().unwrap();
    }

    #[test]
    fn target_at_index_moves_unless_captured() {
        let mut plain = multi_exit_body();
        splice(&mut plain, 4, &marker(1)).unwrap();
        assert_eq!(plain.instructions[1].operand, Operand::Target(6));

        let mut captured = multi_exit_body();
        splice_points(&mut captured, &[SplicePoint::capturing(4)], &marker(1)).unwrap();
        assert_eq!(captured.instructions[1].operand, Operand::Target(4));
        assert_eq!(captured.instructions[4].opcode, OpCode::LdcI4);
    }

    #[test]
    fn payload_targets_are_rebased() {
        let mut body = nop_body(4);
        let payload = vec![
            Instruction::new(OpCode::Ldarg0),
            Instruction::with(OpCode::BrfalseS, Operand::Target(3)),
            Instruction::new(OpCode::Nop),
        ];
        splice(&mut body, 2, &payload).unwrap();

        // Target 3 is the instruction after the payload: the original nop at 2, now at 5
        assert_eq!(body.instructions[3].operand, Operand::Target(5));
        assert_eq!(body.instructions[5].opcode, OpCode::Nop);
        body.validate().unwrap();
    }

    #[test]
    fn exception_regions() {
        let mut body = guarded_body();
        // Inside the try region
        splice(&mut body, 2, &marker(1)).unwrap();
        assert_eq!(
            body.exception_handlers[0],
            ExceptionHandler {
                flags: ExceptionHandlerFlags::FINALLY,
                try_start: 0,
                try_end: 6,
                handler_start: 6,
                handler_end: 8,
                catch_type: None,
                filter_start: None,
            }
        );

        // At the first handler instruction: lands between try and handler
        splice(&mut body, 6, &marker(2)).unwrap();
        let handler = &body.exception_handlers[0];
        assert_eq!((handler.try_start, handler.try_end), (0, 6));
        assert_eq!((handler.handler_start, handler.handler_end), (8, 10));

        // leave.s now jumps to the ret at 10
        assert_eq!(body.instructions[5].operand, Operand::Target(10));
        body.validate().unwrap();
    }

    #[test]
    fn failures_leave_body_untouched() {
        let mut body = nop_body(5);

        let result = splice(&mut body, 6, &marker(1));
        assert!(matches!(
            result,
            Err(Error::IndexOutOfRange { index: 6, len: 5 })
        ));
        assert!(matches!(
            splice(&mut body, usize::MAX, &marker(1)),
            Err(Error::IndexOutOfRange { index: i64::MAX, len: 5 })
        ));

        let dangling = vec![Instruction::with(OpCode::BrS, Operand::Target(2))];
        assert!(matches!(
            splice(&mut body, 0, &dangling),
            Err(Error::InvalidPayload(_))
        ));

        let mismatched = vec![Instruction::with(OpCode::Call, Operand::Target(0))];
        assert!(matches!(
            splice(&mut body, 0, &mismatched),
            Err(Error::InvalidPayload(_))
        ));

        let past_end = vec![Instruction::with(OpCode::BrS, Operand::Target(1))];
        assert!(matches!(
            splice(&mut body, 5, &past_end),
            Err(Error::InvalidPayload(_))
        ));

        assert!(matches!(
            splice(&mut body, 0, &[]),
            Err(Error::InvalidPayload(_))
        ));

        assert_eq!(body.len(), 5);
        assert_eq!(body.generation(), 0);
    }

    #[test]
    fn multiple_points_refer_to_original_body() {
        let mut body = multi_exit_body();
        let stack = body.max_stack;
        splice_points(
            &mut body,
            &[SplicePoint::capturing(3), SplicePoint::capturing(5)],
            &marker(9),
        )
        .unwrap();

        assert_eq!(
            opcodes(&body),
            vec![
                OpCode::Ldarg1,
                OpCode::BrfalseS,
                OpCode::LdcI41,
                OpCode::LdcI4,
                OpCode::Pop,
                OpCode::Ret,
                OpCode::LdcI40,
                OpCode::LdcI4,
                OpCode::Pop,
                OpCode::Ret,
            ]
        );
        assert_eq!(body.instructions[1].operand, Operand::Target(6));
        assert_eq!(body.generation(), 2);
        assert_eq!(body.max_stack, stack + 1);
    }

    #[test]
    fn append_at_end() {
        let mut body = nop_body(2);
        splice(&mut body, 2, &[Instruction::new(OpCode::Ret)]).unwrap();
        assert_eq!(body.len(), 3);
    }
}
